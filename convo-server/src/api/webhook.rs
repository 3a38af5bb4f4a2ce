//! Post-call webhook handler.
//!
//! # Endpoints
//!
//! - `POST {path}` – authenticate, decode and persist a post-call transcript
//!
//! Any other method on the same path is answered `405` before the request
//! is looked at.

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use convo_core::entities::TranscriptRecord;
use convo_core::store::upsert_with_deadline;

use crate::api::extractors::{CallbackRejection, VerifiedCallback};
use crate::state::AppState;

/// Build the webhook router for the configured path.
pub fn router(path: &str) -> Router<AppState> {
    Router::new().route(path, post(receive_callback).fallback(method_not_allowed))
}

async fn method_not_allowed() -> CallbackRejection {
    CallbackRejection::MethodNotAllowed
}

/// `POST {path}` — persist a verified transcript.
///
/// The record is upserted on its identity, so a redelivered callback
/// overwrites the earlier row.
async fn receive_callback(
    State(state): State<AppState>,
    VerifiedCallback(event): VerifiedCallback,
) -> Result<impl IntoResponse, CallbackRejection> {
    let data = event.into_data();
    let turns = data.transcript.len();
    let record = TranscriptRecord::from_event(data);
    let record_id = record.id.clone();
    let agent_id = record.agent_id.clone();

    let outcome =
        upsert_with_deadline(state.store.as_ref(), record, state.config.store_timeout).await?;

    tracing::info!(%agent_id, %record_id, turns, ?outcome, "Transcript persisted");
    Ok((StatusCode::OK, "Webhook processed successfully"))
}

#[cfg(test)]
mod tests {
    use crate::config::runtime::{WebhookConfig, WebhookSecret};
    use crate::server::build_router;
    use crate::state::AppState;
    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{HeaderValue, Request, StatusCode},
    };
    use convo_core::entities::{TranscriptRecord, UpsertOutcome};
    use convo_core::store::{MemoryTranscriptStore, StoreError, TranscriptStore};
    use convo_sdk::signature::sign;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"whsec_test_secret";
    const PATH: &str = "/webhooks/conversation";
    const HEADER: &str = "ElevenLabs-Signature";

    fn config(secret: Option<&[u8]>) -> WebhookConfig {
        WebhookConfig {
            path: PATH.to_string(),
            signature_header: HEADER.to_ascii_lowercase(),
            secret: secret.and_then(|s| WebhookSecret::new(s.to_vec())),
            tolerance: time::Duration::minutes(30),
            max_body_bytes: 64 * 1024,
            store_timeout: Some(Duration::from_millis(200)),
        }
    }

    fn app_with(store: Arc<dyn TranscriptStore>, config: WebhookConfig) -> Router {
        build_router(AppState::new(store, config))
    }

    fn app(store: &MemoryTranscriptStore) -> Router {
        app_with(Arc::new(store.clone()), config(Some(SECRET)))
    }

    fn now() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    fn transcription_body(conversation_id: Option<&str>) -> String {
        let mut data = serde_json::json!({
            "agent_id": "agent_123",
            "metadata": { "call_duration_secs": 42 },
            "transcript": [
                { "role": "agent", "message": "hi" },
                { "role": "user", "message": "hello" }
            ]
        });
        if let Some(id) = conversation_id {
            data["conversation_id"] = serde_json::json!(id);
        }
        serde_json::json!({ "type": "post_call_transcription", "data": data }).to_string()
    }

    fn signed_request(body: impl Into<Vec<u8>>, timestamp: i64) -> Request<Body> {
        let body = body.into();
        Request::builder()
            .method("POST")
            .uri(PATH)
            .header("content-type", "application/json")
            .header(HEADER, sign(SECRET, timestamp, &body))
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    struct FailingStore;

    #[async_trait]
    impl TranscriptStore for FailingStore {
        async fn upsert(&self, _record: TranscriptRecord) -> Result<UpsertOutcome, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    struct HangingStore;

    #[async_trait]
    impl TranscriptStore for HangingStore {
        async fn upsert(&self, _record: TranscriptRecord) -> Result<UpsertOutcome, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_valid_callback_is_persisted() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);

        let request = signed_request(transcription_body(Some("conv_1")), now());
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Webhook processed successfully");

        let record = store.get("conv_1").await.unwrap();
        assert_eq!(record.agent_id, "agent_123");
        assert_eq!(record.transcript, "agent: hi\nuser: hello");
        assert_eq!(record.call_duration, 42.0);
    }

    #[tokio::test]
    async fn test_non_post_methods_are_rejected_first() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);

        for method in ["GET", "PUT", "DELETE", "PATCH"] {
            let mut request = signed_request(transcription_body(None), now());
            *request.method_mut() = method.parse().unwrap();
            let (status, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(body, "Method Not Allowed");
        }

        // Even without a secret the method gate answers first.
        let unconfigured = app_with(Arc::new(store.clone()), config(None));
        let request = Request::builder()
            .method("GET")
            .uri(PATH)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&unconfigured, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_secret_fails_closed() {
        let store = MemoryTranscriptStore::new();
        let app = app_with(Arc::new(store.clone()), config(None));

        let (status, body) = send(&app, signed_request(transcription_body(None), now())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Webhook secret not configured");

        let empty_secret = app_with(Arc::new(store.clone()), config(Some(b"".as_slice())));
        let request = signed_request(transcription_body(None), now());
        let (status, _) = send(&empty_secret, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_signature_header() {
        let store = MemoryTranscriptStore::new();
        let request = Request::builder()
            .method("POST")
            .uri(PATH)
            .body(Body::from(transcription_body(None)))
            .unwrap();
        let (status, body) = send(&app(&store), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Missing signature header");
    }

    #[tokio::test]
    async fn test_malformed_signature_header() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);
        let ts = now();

        for header in [
            format!("t={ts}"),
            "v0=abcdef".to_string(),
            format!("t={ts},v1=abcdef"),
            format!("t=soon,v0={}", "0".repeat(64)),
        ] {
            let request = Request::builder()
                .method("POST")
                .uri(PATH)
                .header(HEADER, header.as_str())
                .body(Body::from(transcription_body(None)))
                .unwrap();
            let (status, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{header}");
            assert_eq!(body, "Invalid signature format", "{header}");
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_utf8_signature_header() {
        let store = MemoryTranscriptStore::new();
        let request = Request::builder()
            .method("POST")
            .uri(PATH)
            .header(HEADER, HeaderValue::from_bytes(b"t=1,v0=\xff").unwrap())
            .body(Body::from(transcription_body(None)))
            .unwrap();
        let (status, body) = send(&app(&store), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid signature format");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_header_name_is_case_insensitive() {
        let store = MemoryTranscriptStore::new();
        let body = transcription_body(None);
        let request = Request::builder()
            .method("POST")
            .uri(PATH)
            .header("elevenlabs-signature", sign(SECRET, now(), body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let (status, _) = send(&app(&store), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_replay_window() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);

        let (status, body) = send(
            &app,
            signed_request(transcription_body(Some("old")), now() - 31 * 60),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Request expired");
        assert!(store.get("old").await.is_none());

        let (status, _) = send(
            &app,
            signed_request(transcription_body(Some("recent")), now() - 29 * 60),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.get("recent").await.is_some());
    }

    #[tokio::test]
    async fn test_future_timestamp_is_not_rejected() {
        let store = MemoryTranscriptStore::new();
        let (status, _) = send(
            &app(&store),
            signed_request(transcription_body(Some("future")), now() + 3600),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.get("future").await.is_some());
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid_signature() {
        let store = MemoryTranscriptStore::new();
        let body = transcription_body(None);
        let request = Request::builder()
            .method("POST")
            .uri(PATH)
            .header(HEADER, sign(b"another-secret", now(), body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let (status, text) = send(&app(&store), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(text, "Invalid signature");
        assert!(store.is_empty().await);
    }

    /// Security property: the MAC covers every bit of the raw body, and a
    /// mutated body is never decoded or stored.
    #[tokio::test]
    async fn test_every_body_bit_flip_is_rejected() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);
        let body = br#"{"type":"post_call_transcription","data":{"agent_id":"a","metadata":{"call_duration_secs":1},"transcript":[]}}"#;
        let ts = now();
        let header = sign(SECRET, ts, body);

        for i in 0..body.len() * 8 {
            let mut mutated = body.to_vec();
            mutated[i / 8] ^= 1 << (i % 8);
            let request = Request::builder()
                .method("POST")
                .uri(PATH)
                .header(HEADER, header.as_str())
                .body(Body::from(mutated))
                .unwrap();
            let (status, text) = send(&app, request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "bit {i}");
            assert_eq!(text, "Invalid signature", "bit {i}");
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_reserialized_body_breaks_signature() {
        let store = MemoryTranscriptStore::new();
        let original = transcription_body(None);
        let pretty = serde_json::to_string_pretty(
            &serde_json::from_str::<serde_json::Value>(&original).unwrap(),
        )
        .unwrap();
        let request = Request::builder()
            .method("POST")
            .uri(PATH)
            .header(HEADER, sign(SECRET, now(), original.as_bytes()))
            .body(Body::from(pretty))
            .unwrap();
        let (status, text) = send(&app(&store), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(text, "Invalid signature");
    }

    #[tokio::test]
    async fn test_unsupported_event_type() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);

        for body in [
            r#"{"type":"other_event","data":{"agent_id":"a","metadata":{"call_duration_secs":1},"transcript":[]}}"#,
            r#"{"type":"other_event","data":null}"#,
            r#"{"type":"post_call_audio","data":{}}"#,
            r#"{"data":{}}"#,
            r#"{"type":5,"data":{}}"#,
            r#"{"type":null,"data":{}}"#,
        ] {
            let (status, text) = send(&app, signed_request(body, now())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(text, "Invalid webhook type", "{body}");
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);

        for body in [
            "not json at all",
            "null",
            "[]",
            r#"{"type":"post_call_transcription","data":{"agent_id":"a"}}"#,
            r#"{"type":"post_call_transcription","data":{"agent_id":"a","metadata":{"call_duration_secs":"long"},"transcript":[]}}"#,
        ] {
            let (status, text) = send(&app, signed_request(body, now())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(text, "Bad Request", "{body}");
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fractional_duration_is_persisted() {
        let store = MemoryTranscriptStore::new();
        let body = r#"{"type":"post_call_transcription","data":{"agent_id":"a","conversation_id":"conv_f","metadata":{"call_duration_secs":12.5},"transcript":[{"role":"agent","message":"hi"}]}}"#;
        let (status, text) = send(&app(&store), signed_request(body, now())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "Webhook processed successfully");
        assert_eq!(store.get("conv_f").await.unwrap().call_duration, 12.5);
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let store = MemoryTranscriptStore::new();
        let body = format!(
            r#"{{"type":"post_call_transcription","padding":"{}"}}"#,
            "x".repeat(128 * 1024)
        );
        let (status, text) = send(&app(&store), signed_request(body, now())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, "Bad Request");
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let store = MemoryTranscriptStore::new();
        let app = app(&store);

        for conversation_id in [Some("conv_dup"), None] {
            let body = transcription_body(conversation_id);
            let before = store.len().await;
            for _ in 0..2 {
                let (status, _) = send(&app, signed_request(body.clone(), now())).await;
                assert_eq!(status, StatusCode::OK);
            }
            assert_eq!(store.len().await, before + 1);
        }
    }

    #[tokio::test]
    async fn test_persistence_failure() {
        let app = app_with(Arc::new(FailingStore), config(Some(SECRET)));
        let (status, text) = send(&app, signed_request(transcription_body(None), now())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_hung_store_times_out() {
        let app = app_with(Arc::new(HangingStore), config(Some(SECRET)));
        let (status, text) = send(&app, signed_request(transcription_body(None), now())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_health() {
        let store = MemoryTranscriptStore::new();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app(&store), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthy"));
    }
}
