//! Forwarding of (possibly normalized) uploads to the backend.
//!
//! The outgoing request is a fresh multipart body: the asset under
//! `assetData`, then every other file part, then every text field in arrival
//! order. Only credential headers travel with it.

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use std::collections::HashMap;
use uuid::Uuid;

use crate::constants::{ASSET_FIELD_NAME, ASSET_UPLOAD_PATH};
use crate::image_optimizer::{NormalizationResult, CANONICAL_FORMAT};
use crate::multipart::FilePart;

/// Inbound headers that carry the caller's identity to the backend
pub const FORWARDED_HEADERS: &[&str] = &[
    "cookie",
    "authorization",
    "x-api-key",
    "x-immich-user-token",
    "x-immich-session-token",
    "x-immich-share-key",
    "x-immich-share-slug",
];

/// Whether the forwarded asset was recompressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTag {
    Compressed,
    Passthrough,
}

impl StatusTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTag::Compressed => "Compressed",
            StatusTag::Passthrough => "Passthrough",
        }
    }
}

impl std::fmt::Display for StatusTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend's answer, relayed verbatim
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub status_code: u16,
    pub body_text: String,
    pub content_type: Option<String>,
    pub status_tag: StatusTag,
}

/// Everything that accompanies the asset
pub struct ForwardParts<'a> {
    pub original_filename: &'a str,
    pub extra_fields: &'a [(String, String)],
    pub extra_files: &'a [FilePart],
    pub inbound_headers: &'a HashMap<String, String>,
}

pub struct MultipartForwarder {
    client: reqwest::Client,
    url: String,
}

impl MultipartForwarder {
    pub fn new(client: reqwest::Client, backend_url: &str) -> Self {
        Self {
            client,
            url: format!(
                "{}{}",
                backend_url.trim_end_matches('/'),
                ASSET_UPLOAD_PATH
            ),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the upload to `{backend}/api/assets`.
    ///
    /// Any HTTP status from the backend is a successful forward. Only
    /// transport failures are errors, and they are not retried.
    pub async fn forward(
        &self,
        normalized: NormalizationResult,
        parts: ForwardParts<'_>,
    ) -> Result<ForwardOutcome, reqwest::Error> {
        let status_tag = if normalized.was_transformed {
            StatusTag::Compressed
        } else {
            StatusTag::Passthrough
        };
        let filename = if normalized.was_transformed {
            generated_filename()
        } else {
            parts.original_filename.to_string()
        };

        let form = build_form(normalized, filename, &parts)?;

        let mut request = self.client.post(&self.url).multipart(form);
        for (name, value) in allowed_headers(parts.inbound_headers) {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body_text = response.text().await?;

        tracing::debug!(
            status_code = status_code,
            status_tag = %status_tag,
            "Backend answered forwarded upload"
        );

        Ok(ForwardOutcome {
            status_code,
            body_text,
            content_type,
            status_tag,
        })
    }
}

/// Assemble the outbound form. Every part has a known length, so reqwest
/// sends a `Content-Length` instead of chunked encoding.
fn build_form(
    normalized: NormalizationResult,
    filename: String,
    parts: &ForwardParts<'_>,
) -> Result<Form, reqwest::Error> {
    let asset = Part::stream_with_length(
        reqwest::Body::from(normalized.output_bytes.clone()),
        normalized.output_bytes.len() as u64,
    )
    .file_name(filename)
    .mime_str(&normalized.output_mime_type)?;

    let mut form = Form::new().part(ASSET_FIELD_NAME, asset);

    for file in parts.extra_files {
        let part = Part::stream_with_length(
            reqwest::Body::from(file.data.clone()),
            file.data.len() as u64,
        )
        .file_name(file.filename.clone())
        .mime_str(&file.mime_type)?;
        form = form.part(file.field_name.clone(), part);
    }

    for (name, value) in parts.extra_fields {
        form = form.text(name.clone(), value.clone());
    }

    Ok(form)
}

/// Inbound headers on the credential allow-list, matched case-insensitively
pub fn allowed_headers(headers: &HashMap<String, String>) -> Vec<(&str, &str)> {
    headers
        .iter()
        .filter(|(name, _)| {
            FORWARDED_HEADERS
                .iter()
                .any(|allowed| name.eq_ignore_ascii_case(allowed))
        })
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// `{yyyymmddHHMMSSmmm}-{8 hex}.webp`
pub fn generated_filename() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}.{}",
        timestamp,
        &suffix[..8],
        CANONICAL_FORMAT.extension()
    )
}
