//! Callback envelope and post-call transcription payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::signature::VerifiedBody;

/// The only event type the webhook acts on.
pub const POST_CALL_TRANSCRIPTION: &str = "post_call_transcription";

/// Errors produced while decoding an authenticated callback.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),
}

/// One speaker turn in a call transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    /// Any JSON number; fractional durations are kept as-is.
    pub call_duration_secs: f64,
}

/// `data` of a `post_call_transcription` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionData {
    pub agent_id: String,
    /// Provider-assigned call id. Older payloads may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub metadata: CallMetadata,
    pub transcript: Vec<TranscriptTurn>,
}

/// A decoded, authenticated event.
///
/// Built only from a [`VerifiedBody`], so an unverified request can never
/// reach this type.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEvent {
    event_type: String,
    data: TranscriptionData,
}

impl VerifiedEvent {
    /// Decode an authenticated body.
    ///
    /// The body must be a JSON object. Its `type` is checked against the
    /// whitelist before `data` is interpreted, so an unsupported event is
    /// reported as such whatever its payload looks like. A missing or
    /// non-string `type` is unsupported too.
    pub fn decode(body: &VerifiedBody) -> Result<Self, DecodeError> {
        let mut envelope: Map<String, Value> = serde_json::from_slice(body.as_bytes())?;
        match envelope.remove("type") {
            Some(Value::String(t)) if t == POST_CALL_TRANSCRIPTION => {}
            Some(Value::String(t)) => return Err(DecodeError::UnsupportedEventType(t)),
            Some(other) => return Err(DecodeError::UnsupportedEventType(other.to_string())),
            None => return Err(DecodeError::UnsupportedEventType("null".to_string())),
        }
        let data = serde_json::from_value(envelope.remove("data").unwrap_or(Value::Null))?;
        Ok(Self {
            event_type: POST_CALL_TRANSCRIPTION.to_string(),
            data,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn into_data(self) -> TranscriptionData {
        self.data
    }
}
