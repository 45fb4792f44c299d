use super::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct AiRequest {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AiResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub code: u16,
}

/// `POST /api/ai`: one-shot AI reply without command parsing or archiving.
pub async fn handle_ai(
    State(state): State<AppState>,
    Json(request): Json<AiRequest>,
) -> impl IntoResponse {
    let Some(content) = request.content.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AiResponse {
                message: "请输入内容",
                data: None,
                code: 4000,
            }),
        );
    };

    let reply = state.processor.complete(&content).await;
    (
        StatusCode::OK,
        Json(AiResponse {
            message: "回复成功",
            data: Some(reply),
            code: 2000,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn call(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/api/ai")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn replies_with_ai_text() {
        let store = Arc::new(RecordingStore::default());
        let app = test_router(None, EchoProvider::default(), store.clone());
        let (status, body) = call(app, json!({"content": "/ai 你好"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"message": "回复成功", "data": "reply:/ai 你好", "code": 2000})
        );
        tokio::task::yield_now().await;
        assert!(store.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        for payload in [json!({}), json!({"content": ""})] {
            let app = test_router(None, EchoProvider::default(), Arc::default());
            let (status, body) = call(app, payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({"message": "请输入内容", "code": 4000}));
        }
    }

    #[tokio::test]
    async fn ai_failure_is_folded_into_data() {
        let app = test_router(None, EchoProvider { fail: true }, Arc::default());
        let (status, body) = call(app, json!({"content": "hi"})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]
            .as_str()
            .unwrap()
            .starts_with("服务器开小差了:"));
    }
}
