//! Signature parsing and verification for post-call webhooks.
//!
//! The provider signs every callback with HMAC-SHA256 and sends the result
//! in a composite header:
//!
//! ```text
//! ElevenLabs-Signature: t={unix_timestamp},v0={hex_hmac}
//! ```
//!
//! The signed message is `"{t}.{raw_body}"`, where `{t}` is the exact text
//! of the `t=` token and `{raw_body}` the bytes received on the wire. The
//! body must not be decoded or re-serialized before verification.
//!
//! Verification runs in three stages, each with its own error:
//!
//! * **extract** – [`SignatureHeader::parse`]
//! * **freshness** – [`check_timestamp`]
//! * **MAC** – [`verify_mac`]
//!
//! [`Verifier`] chains them and hands out a [`VerifiedBody`], the only input
//! accepted by the event decoder.

use bytes::Bytes;
use time::{Duration, OffsetDateTime};

/// Default header carrying the composite signature.
pub const SIGNATURE_HEADER: &str = "ElevenLabs-Signature";

/// Prefix of the signature token.
pub const SIGNATURE_PREFIX: &str = "v0=";

/// Prefix of the timestamp token.
pub const TIMESTAMP_PREFIX: &str = "t=";

/// Default maximum age of a signed request.
pub const DEFAULT_TOLERANCE: Duration = Duration::minutes(30);

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Errors produced by signature operations.
///
/// The `Display` text of each variant is what the webhook answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,
    #[error("Invalid signature format")]
    MalformedSignature,
    #[error("Request expired")]
    Expired,
    #[error("Invalid signature")]
    InvalidSignature,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::InvalidSignature
    }
}

// ---------------------------------------------------------------------------
// Header parsing / formatting
// ---------------------------------------------------------------------------

/// The components of a parsed signature header.
///
/// Borrows from the header value; the timestamp text is kept verbatim
/// because it is part of the signed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    timestamp_text: &'a str,
    timestamp: i64,
    digest_hex: &'a str,
}

impl<'a> SignatureHeader<'a> {
    /// Parse a header value of comma-separated `key=value` tokens.
    ///
    /// Exactly one `t=` token and exactly one `v0=` token must be present,
    /// and `t` must be a base-10 integer. Other tokens are ignored.
    pub fn parse(value: &'a str) -> Result<Self, SignatureError> {
        let mut timestamp_text = None;
        let mut digest_hex = None;

        for token in value.split(',').map(str::trim) {
            if let Some(t) = token.strip_prefix(TIMESTAMP_PREFIX) {
                if timestamp_text.replace(t).is_some() {
                    return Err(SignatureError::MalformedSignature);
                }
            } else if let Some(v0) = token.strip_prefix(SIGNATURE_PREFIX) {
                if digest_hex.replace(v0).is_some() {
                    return Err(SignatureError::MalformedSignature);
                }
            }
        }

        let (Some(timestamp_text), Some(digest_hex)) = (timestamp_text, digest_hex) else {
            return Err(SignatureError::MalformedSignature);
        };
        let timestamp = timestamp_text
            .parse()
            .map_err(|_| SignatureError::MalformedSignature)?;

        Ok(Self {
            timestamp_text,
            timestamp,
            digest_hex,
        })
    }

    /// Parse an optional header value, treating absence as
    /// [`SignatureError::MissingHeader`].
    pub fn from_header(value: Option<&'a str>) -> Result<Self, SignatureError> {
        Self::parse(value.ok_or(SignatureError::MissingHeader)?)
    }

    /// Declared timestamp, seconds since the epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Timestamp exactly as it appeared in the header.
    pub fn timestamp_text(&self) -> &'a str {
        self.timestamp_text
    }

    /// Declared digest, with the `v0=` prefix stripped.
    pub fn digest_hex(&self) -> &'a str {
        self.digest_hex
    }
}

/// Format a header value from a timestamp and raw digest bytes.
pub fn format_signature_header(timestamp: i64, digest: &[u8]) -> String {
    format!(
        "{TIMESTAMP_PREFIX}{timestamp},{SIGNATURE_PREFIX}{}",
        hex::encode(digest)
    )
}

// ---------------------------------------------------------------------------
// Timestamp validation
// ---------------------------------------------------------------------------

/// Reject timestamps older than `now - tolerance`.
///
/// The window is one-sided: a timestamp in the future always passes, so a
/// sender whose clock runs ahead is not locked out. The comparison is done
/// in milliseconds.
pub fn check_timestamp(
    timestamp: i64,
    now: OffsetDateTime,
    tolerance: Duration,
) -> Result<(), SignatureError> {
    let timestamp_ms = i128::from(timestamp) * 1000;
    let oldest_ms = now.unix_timestamp_nanos() / 1_000_000 - tolerance.whole_milliseconds();
    if timestamp_ms < oldest_ms {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MAC
// ---------------------------------------------------------------------------

fn signed_message(timestamp_text: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp_text.len() + 1 + body.len());
    message.extend_from_slice(timestamp_text.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    message
}

/// Compute `HMAC-SHA256("{timestamp}.{body}", secret)`.
pub fn compute_digest(secret: &[u8], timestamp_text: &str, body: &[u8]) -> ring::hmac::Tag {
    ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret),
        &signed_message(timestamp_text, body),
    )
}

/// Sign `body` at `timestamp` and return the full header value.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
    let digest = compute_digest(secret, &timestamp.to_string(), body);
    format_signature_header(timestamp, digest.as_ref())
}

/// Verify a declared hex digest against the raw body.
///
/// The digest is expected in lowercase hex, the only form the provider
/// emits. The comparison itself is done by `ring::hmac::verify`, which is
/// constant time in the secret-derived tag.
pub fn verify_mac(
    secret: &[u8],
    timestamp_text: &str,
    body: &[u8],
    digest_hex: &str,
) -> Result<(), SignatureError> {
    if digest_hex.len() != DIGEST_HEX_LEN
        || !digest_hex
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Err(SignatureError::InvalidSignature);
    }
    let declared = hex::decode(digest_hex).map_err(|_| SignatureError::InvalidSignature)?;
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret),
        &signed_message(timestamp_text, body),
        &declared,
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Raw request bytes whose MAC has been checked.
///
/// Only [`Verifier::verify`] constructs this, so holding one proves the
/// body came from a holder of the shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedBody(Bytes);

impl VerifiedBody {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Runs header extraction, freshness and MAC checks in order.
pub struct Verifier<'k> {
    secret: &'k [u8],
    tolerance: Duration,
}

impl<'k> Verifier<'k> {
    pub fn new(secret: &'k [u8], tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Extract the header and check its freshness. Needs no body, so
    /// callers can reject before reading one.
    pub fn check_header<'h>(
        &self,
        header_value: Option<&'h str>,
        now: OffsetDateTime,
    ) -> Result<SignatureHeader<'h>, SignatureError> {
        let header = SignatureHeader::from_header(header_value)?;
        check_timestamp(header.timestamp(), now, self.tolerance)?;
        Ok(header)
    }

    /// Check the MAC of `body` against an already checked header.
    pub fn verify_body(
        &self,
        header: &SignatureHeader<'_>,
        body: Bytes,
    ) -> Result<VerifiedBody, SignatureError> {
        verify_mac(
            self.secret,
            header.timestamp_text(),
            &body,
            header.digest_hex(),
        )?;
        Ok(VerifiedBody(body))
    }

    /// Authenticate a callback.
    ///
    /// * `header_value` – the signature header, `None` if absent.
    /// * `body` – raw request body, exactly as received.
    /// * `now` – the current time used for the freshness bound.
    pub fn verify(
        &self,
        header_value: Option<&str>,
        body: Bytes,
        now: OffsetDateTime,
    ) -> Result<VerifiedBody, SignatureError> {
        let header = self.check_header(header_value, now)?;
        self.verify_body(&header, body)
    }
}
