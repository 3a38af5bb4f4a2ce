//! Custom Axum extractor for callback authentication.
//!
//! [`VerifiedCallback`] runs the verification pipeline over the raw request:
//!
//! 1. secret configured?
//! 2. signature header extracted and fresh
//! 3. raw body read and MAC checked
//! 4. event decoded and type whitelisted
//!
//! The body is read as bytes and handed to the verifier untouched; nothing
//! parses it before the MAC has been checked.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use convo_core::store::StoreError;
use convo_sdk::objects::{DecodeError, VerifiedEvent};
use convo_sdk::signature::{SignatureError, Verifier};

use crate::state::AppState;

/// An authenticated `post_call_transcription` event.
pub struct VerifiedCallback(pub VerifiedEvent);

/// Every way a callback can fail, with its response.
#[derive(Debug, thiserror::Error)]
pub enum CallbackRejection {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("webhook secret not configured")]
    SecretNotConfigured,
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("unsupported event type {0:?}")]
    UnsupportedEventType(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(serde_json::Error),
    #[error("failed to read request body")]
    BodyReadError,
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl From<DecodeError> for CallbackRejection {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::MalformedPayload(e) => Self::MalformedPayload(e),
            DecodeError::UnsupportedEventType(t) => Self::UnsupportedEventType(t),
        }
    }
}

impl CallbackRejection {
    /// Status and plain-text body of the response.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
            Self::SecretNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Webhook secret not configured",
            ),
            Self::Signature(e) => (
                StatusCode::UNAUTHORIZED,
                match e {
                    SignatureError::MissingHeader => "Missing signature header",
                    SignatureError::MalformedSignature => "Invalid signature format",
                    SignatureError::Expired => "Request expired",
                    SignatureError::InvalidSignature => "Invalid signature",
                },
            ),
            Self::UnsupportedEventType(_) => (StatusCode::BAD_REQUEST, "Invalid webhook type"),
            Self::MalformedPayload(_) | Self::BodyReadError => {
                (StatusCode::BAD_REQUEST, "Bad Request")
            }
            Self::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        }
    }
}

impl IntoResponse for CallbackRejection {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        match &self {
            Self::SecretNotConfigured | Self::Persistence(_) => {
                tracing::error!(error = %self, "Callback failed");
            }
            _ => tracing::warn!(error = %self, "Callback rejected"),
        }
        (status, message).into_response()
    }
}

impl FromRequest<AppState> for VerifiedCallback {
    type Rejection = CallbackRejection;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let config = &state.config;
        let secret = config
            .secret
            .as_ref()
            .ok_or(CallbackRejection::SecretNotConfigured)?;
        let verifier = Verifier::new(secret.secret_bytes(), config.tolerance);

        let (parts, body) = req.into_parts();
        let header_value = parts
            .headers
            .get(config.signature_header.as_str())
            .map(|v| v.to_str().map_err(|_| SignatureError::MalformedSignature))
            .transpose()?;

        let header = verifier.check_header(header_value, time::OffsetDateTime::now_utc())?;

        let body_bytes = axum::body::to_bytes(body, config.max_body_bytes)
            .await
            .map_err(|_| CallbackRejection::BodyReadError)?;

        let verified = verifier.verify_body(&header, body_bytes)?;
        let event = VerifiedEvent::decode(&verified)?;

        Ok(VerifiedCallback(event))
    }
}
