//! Deployment webhook receiver.
//!
//! Requests are signed with HMAC-SHA256 over the raw body; the hex digest
//! arrives in `x-vercel-signature`. Failed deployments kick off a build
//! analysis in the background.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::Sha256;

use super::api::{ApiError, SharedState};

pub const SIGNATURE_HEADER: &str = "x-vercel-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    AnalysisStarted,
    Logged,
    Ignored,
}

impl WebhookAction {
    pub fn for_event(event: &str) -> Self {
        match event {
            "deployment.error" => Self::AnalysisStarted,
            "deployment.succeeded" | "deployment.ready" => Self::Logged,
            _ => Self::Ignored,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub event: String,
    pub action: WebhookAction,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub challenge: Option<String>,
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub async fn receive(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let Some(secret) = state.webhook_secret.as_deref() else {
        tracing::error!("Webhook received but no secret is configured");
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Webhook secret not configured" })),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if signature.is_empty() || !verify_signature(secret, &body, signature) {
        tracing::warn!("Rejected webhook with invalid signature");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid signature" })),
        ));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON payload: {}", e)))?;
    let event = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let action = WebhookAction::for_event(&event);
    let deployment_id = payload
        .pointer("/payload/deployment/id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    tracing::info!(event = %event, deployment_id, action = ?action, "Webhook received");

    match action {
        WebhookAction::AnalysisStarted => match state.build_monitor.clone() {
            Some(monitor) => {
                tokio::spawn(async move {
                    if let Err(e) = monitor.handle_webhook(payload).await {
                        tracing::error!(error = %e, "Build analysis failed");
                    }
                });
            }
            None => tracing::warn!("Build monitor disabled; skipping analysis"),
        },
        WebhookAction::Logged => {
            tracing::info!(deployment_id, "Deployment succeeded");
        }
        WebhookAction::Ignored => {}
    }

    let receipt = WebhookReceipt {
        received: true,
        event,
        action,
    };
    Ok((StatusCode::OK, Json(json!(receipt))))
}

/// Endpoint verification handshake.
pub async fn verify_endpoint(Query(query): Query<ChallengeQuery>) -> impl IntoResponse {
    match query.challenge {
        Some(challenge) => Json(json!({ "challenge": challenge })),
        None => Json(json!({ "status": "ok", "endpoint": "vercel-build" })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::api::tests::{body_json, test_app, test_app_with_secret};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn signed(body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/webhooks/vercel-build")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let sig = sign(SECRET, b"payload");
        assert_eq!(sig.len(), 64);
        assert!(verify_signature(SECRET, b"payload", &sig));
        assert!(!verify_signature(SECRET, b"other", &sig));
        assert!(!verify_signature("wrong", b"payload", &sig));
        assert!(!verify_signature(SECRET, b"payload", "not-hex"));
    }

    #[test]
    fn test_action_for_event() {
        assert_eq!(
            WebhookAction::for_event("deployment.error"),
            WebhookAction::AnalysisStarted
        );
        assert_eq!(
            WebhookAction::for_event("deployment.ready"),
            WebhookAction::Logged
        );
        assert_eq!(
            WebhookAction::for_event("deployment.created"),
            WebhookAction::Ignored
        );
    }

    #[tokio::test]
    async fn test_missing_secret_is_server_error() {
        let app = test_app();
        let response = app
            .router()
            .oneshot(signed("{}", Some("00".to_string())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "Webhook secret not configured");
    }

    #[tokio::test]
    async fn test_invalid_signature_rejected() {
        let app = test_app_with_secret(Some(SECRET));
        for sig in [None, Some("deadbeef".to_string())] {
            let response = app.router().oneshot(signed("{}", sig)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body: Value = body_json(response.into_body()).await;
            assert_eq!(body["error"], "Invalid signature");
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = test_app_with_secret(Some(SECRET));
        let body = "{not json";
        let response = app
            .router()
            .oneshot(signed(body, Some(sign(SECRET, body.as_bytes()))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_event_actions() {
        let app = test_app_with_secret(Some(SECRET));
        for (event, action) in [
            ("deployment.error", "analysis_started"),
            ("deployment.succeeded", "logged"),
            ("project.created", "ignored"),
        ] {
            let body = json!({
                "type": event,
                "payload": {"deployment": {"id": "dpl_1"}}
            })
            .to_string();
            let response = app
                .router()
                .oneshot(signed(&body, Some(sign(SECRET, body.as_bytes()))))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let receipt: Value = body_json(response.into_body()).await;
            assert_eq!(receipt["received"], true);
            assert_eq!(receipt["event"], event);
            assert_eq!(receipt["action"], action);
        }
    }

    #[tokio::test]
    async fn test_challenge_handshake() {
        let app = test_app();
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/webhooks/vercel-build?challenge=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["challenge"], "abc123");

        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/webhooks/vercel-build")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["endpoint"], "vercel-build");
    }
}
