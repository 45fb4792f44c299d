use super::AppState;
use crate::commands::generate_help_text;
use crate::wechat::{format_text_reply, parse_inbound, verify_signature};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

const WELCOME_PREFIX: &str = "感谢关注！\n\n";

#[derive(Debug, Default, Deserialize)]
pub struct OfficialQuery {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub echostr: Option<String>,
}

impl OfficialQuery {
    fn signature_parts(&self) -> Option<(&str, &str, &str)> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        Some((
            present(&self.signature)?,
            present(&self.timestamp)?,
            present(&self.nonce)?,
        ))
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

/// `GET /api/official`: server URL verification from the Official Account
/// console. Echoes `echostr` when the signature matches.
pub async fn handle_verify(
    State(state): State<AppState>,
    Query(query): Query<OfficialQuery>,
) -> Response {
    let (Some((signature, timestamp, nonce)), Some(echostr)) = (
        query.signature_parts(),
        query.echostr.as_deref().filter(|s| !s.is_empty()),
    ) else {
        tracing::warn!("official verification missing parameters");
        return json_error(StatusCode::BAD_REQUEST, "缺少验证参数");
    };

    let Some(token) = state.official_token.as_deref() else {
        tracing::error!("official.token is not configured");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "服务器未配置Token");
    };

    if verify_signature(token, signature, timestamp, nonce) {
        tracing::info!("official URL verification succeeded");
        (StatusCode::OK, echostr.to_string()).into_response()
    } else {
        tracing::warn!("official URL verification failed: signature mismatch");
        json_error(StatusCode::FORBIDDEN, "签名验证失败")
    }
}

/// `POST /api/official`: message callback. Answers synchronously with a
/// passive XML reply, or `success` when there is nothing to say.
pub async fn handle_message(
    State(state): State<AppState>,
    Query(query): Query<OfficialQuery>,
    body: Bytes,
) -> Response {
    if state.verify_callbacks {
        if let Some(token) = state.official_token.as_deref() {
            let verified = query
                .signature_parts()
                .is_some_and(|(sig, ts, nonce)| verify_signature(token, sig, ts, nonce));
            if !verified {
                tracing::warn!("official callback rejected: signature mismatch");
                return json_error(StatusCode::FORBIDDEN, "签名验证失败");
            }
        }
    }

    let inbound = match std::str::from_utf8(&body)
        .ok()
        .and_then(|xml| parse_inbound(xml).map_err(|e| tracing::warn!("{e}")).ok())
    {
        Some(msg) => msg,
        None => return (StatusCode::BAD_REQUEST, "Invalid XML").into_response(),
    };

    tracing::info!(
        sender = %inbound.from_user_name,
        kind = %inbound.msg_type,
        msg_id = inbound.msg_id.as_deref().unwrap_or("-"),
        "official message received"
    );

    if inbound.is_text() {
        let processed = state
            .processor
            .process(
                inbound.content.as_deref(),
                &inbound.from_user_name,
                &inbound.to_user_name,
            )
            .await;
        return xml_response(processed.to_xml());
    }

    if inbound.is_event() {
        let event = inbound.event.as_deref().unwrap_or("");
        if event.eq_ignore_ascii_case("subscribe") {
            let welcome = format!(
                "{WELCOME_PREFIX}{}",
                generate_help_text(state.processor.registry())
            );
            return xml_response(format_text_reply(
                &inbound.from_user_name,
                &inbound.to_user_name,
                &welcome,
                Utc::now().timestamp(),
            ));
        }
        tracing::debug!(event, "official event ignored");
        return (StatusCode::OK, "success").into_response();
    }

    let processed = state.processor.process_unsupported(
        &inbound.msg_type,
        &inbound.from_user_name,
        &inbound.to_user_name,
    );
    xml_response(processed.to_xml())
}
