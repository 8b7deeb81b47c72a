//! Responses for `POST /api/assets`.
//!
//! Built as plain values so the relayed status, marker header and body can be
//! checked without a live session.

use bytes::Bytes;

use crate::constants::{ASSET_STATUS_HEADER, REQUEST_ID_HEADER};
use crate::error::UploadError;
use crate::forwarder::ForwardOutcome;

/// Seconds a client is asked to wait after a 503
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl UploadResponse {
    /// The backend's status and body, untouched, plus the asset status marker
    pub fn from_outcome(outcome: ForwardOutcome, request_id: &str) -> Self {
        Self {
            status: outcome.status_code,
            content_type: outcome
                .content_type
                .unwrap_or_else(|| "application/json".to_string()),
            headers: vec![
                (ASSET_STATUS_HEADER, outcome.status_tag.as_str().to_string()),
                (REQUEST_ID_HEADER, request_id.to_string()),
            ],
            body: Bytes::from(outcome.body_text),
        }
    }

    /// JSON error body with the status the error maps to
    pub fn from_error(err: &UploadError, request_id: &str) -> Self {
        let mut headers = vec![(REQUEST_ID_HEADER, request_id.to_string())];
        if matches!(err, UploadError::Overloaded) {
            headers.push(("Retry-After", RETRY_AFTER_SECS.to_string()));
        }

        Self {
            status: err.status_code(),
            content_type: "application/json".to_string(),
            headers,
            body: Bytes::from(err.to_json_body()),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
