use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wxrelay::config::Config;
use wxrelay::store::NotionStore;

/// WeChat Official Account relay with AI replies and Notion archiving.
#[derive(Parser, Debug)]
#[command(name = "wxrelay", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gateway.
    Serve {
        /// Override the listen port.
        #[arg(long)]
        port: Option<u16>,
        /// Override the listen host.
        #[arg(long)]
        host: Option<String>,
    },
    /// Notion archive maintenance.
    #[command(subcommand)]
    Notion(NotionCommands),
}

#[derive(Subcommand, Debug)]
enum NotionCommands {
    /// Create the message database under `notion.parent_page_id`.
    CreateDatabase,
    /// Check the integration token, parent page and database access.
    Check,
    /// Print the most recent archived messages.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print message counts by kind and by day.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    wxrelay::logging::init(&config.logging.level);
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            wxrelay::gateway::run_gateway(config).await
        }
        Commands::Notion(cmd) => run_notion(&config, cmd).await,
    }
}

fn notion_store(config: &Config) -> Result<NotionStore> {
    if !config.notion.is_enabled() {
        bail!(
            "notion.token is not set. Create an integration at \
             https://www.notion.so/my-integrations and set NOTION_TOKEN"
        );
    }
    NotionStore::from_config(&config.notion)
}

async fn run_notion(config: &Config, cmd: NotionCommands) -> Result<()> {
    let store = notion_store(config)?;

    match cmd {
        NotionCommands::CreateDatabase => {
            if store.parent_page_id().is_none() {
                bail!(
                    "notion.parent_page_id is not set. Share a page with the integration \
                     and set NOTION_PARENT_PAGE_ID to the 32-character id from its URL"
                );
            }
            if let Some(existing) = store.database_id() {
                if store.validate_connection(false).await.is_ok() {
                    println!("Database {existing} is reachable; nothing to create.");
                    println!("Clear notion.database_id to create a new one.");
                    return Ok(());
                }
                println!("Database {existing} is not reachable; creating a new one.");
            }
            let id = store
                .create_message_database()
                .await
                .context("failed to create Notion database")?;
            println!("Created message database: {id}");
            println!("Set NOTION_DATABASE_ID={id} (or notion.database_id) to reuse it.");
        }
        NotionCommands::Check => {
            let me = store
                .check_integration()
                .await
                .context("integration token check failed")?;
            println!(
                "Integration: {} ({})",
                me.name.as_deref().unwrap_or("unknown"),
                me.kind
            );

            match store.parent_page_id() {
                Some(page_id) => match store.retrieve_page(page_id).await {
                    Ok(_) => println!("Parent page {page_id}: accessible"),
                    Err(e) => println!(
                        "Parent page {page_id}: not accessible ({e}). \
                         Add the integration under the page's Connections menu."
                    ),
                },
                None => println!("Parent page: not configured"),
            }

            match store.validate_connection(false).await {
                Ok(id) => println!("Database {id}: accessible"),
                Err(e) => println!("Database: not accessible ({e})"),
            }
        }
        NotionCommands::Recent { limit } => {
            let messages = store.query_messages(limit).await?;
            if messages.is_empty() {
                println!("No archived messages.");
            }
            for msg in messages {
                println!("[{}] ({}) {}", msg.timestamp, msg.message_kind, msg.content);
            }
        }
        NotionCommands::Stats => {
            let stats = store.statistics().await?;
            println!("Total messages: {}", stats.total_messages);
            println!("By kind:");
            for (kind, count) in &stats.message_kinds {
                println!("  {kind}: {count}");
            }
            println!("By day:");
            for (day, count) in &stats.daily {
                println!("  {day}: {count}");
            }
        }
    }
    Ok(())
}
