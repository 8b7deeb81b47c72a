// Error types module

use thiserror::Error;

use crate::image_optimizer::ImageError;

/// Everything that can end an upload before the backend's answer is relayed.
///
/// Each variant maps to exactly one HTTP status. Backend responses that were
/// received (any status) are not errors and are relayed as-is.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The identity endpoint did not answer 2xx
    #[error("Invalid or missing Immich token")]
    Auth,

    /// No `assetData` part, or the request is not multipart at all
    #[error("No file uploaded")]
    MissingUpload,

    /// Multipart framing could not be parsed
    #[error("Malformed multipart body: {0}")]
    InvalidMultipart(String),

    /// Body exceeded `max_upload_size`
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// Decode, resize or encode failed
    #[error("Failed to process file")]
    Processing(#[source] ImageError),

    /// The backend could not be reached
    #[error("Failed to contact Immich")]
    Forward(#[source] reqwest::Error),

    /// A stage exceeded its deadline
    #[error("The {stage} stage timed out")]
    Timeout { stage: &'static str },

    /// Concurrent upload limit reached
    #[error("Too many uploads in progress")]
    Overloaded,

    /// Reading the request body from the client failed
    #[error("Failed to read the request body: {0}")]
    Body(String),
}

impl UploadError {
    pub fn status_code(&self) -> u16 {
        match self {
            UploadError::Auth => 401,
            UploadError::MissingUpload | UploadError::InvalidMultipart(_) => 400,
            UploadError::PayloadTooLarge { .. } => 413,
            UploadError::Processing(_) => 500,
            UploadError::Forward(_) => 502,
            UploadError::Timeout { .. } => 504,
            UploadError::Overloaded => 503,
            UploadError::Body(_) => 400,
        }
    }

    /// Short label used in logs and the JSON error body
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Auth => "Unauthorized",
            UploadError::MissingUpload => "Bad Request",
            UploadError::InvalidMultipart(_) => "Bad Request",
            UploadError::PayloadTooLarge { .. } => "Payload Too Large",
            UploadError::Processing(_) => "Internal Server Error",
            UploadError::Forward(_) => "Bad Gateway",
            UploadError::Timeout { .. } => "Gateway Timeout",
            UploadError::Overloaded => "Service Temporarily Unavailable",
            UploadError::Body(_) => "Bad Request",
        }
    }

    /// JSON body written to the client.
    ///
    /// Internal details (decoder messages, connection errors) stay in the logs.
    pub fn to_json_body(&self) -> String {
        serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
            "status": self.status_code()
        })
        .to_string()
    }
}

impl From<ImageError> for UploadError {
    fn from(err: ImageError) -> Self {
        UploadError::Processing(err)
    }
}
