//! Inbound multipart parsing.
//!
//! Splits an `/api/assets` upload into the asset file, any other file parts
//! (e.g. an XMP `sidecarData`), and the ordered text fields. A part counts as
//! a file when it carries a filename.

use bytes::Bytes;
use std::collections::HashMap;

use crate::constants::ASSET_FIELD_NAME;
use crate::error::UploadError;
use crate::image_optimizer::extension_of;

/// A file part other than the asset, forwarded untouched
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field_name: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Parsed upload, alive for a single request
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub original_filename: String,
    /// Lower-cased, without the dot; empty when the filename has none
    pub extension: String,
    pub raw_bytes: Bytes,
    pub declared_mime_type: String,
    /// Text fields in arrival order; repeated names keep every value
    pub extra_fields: Vec<(String, String)>,
    pub extra_files: Vec<FilePart>,
    pub inbound_headers: HashMap<String, String>,
}

/// Parse a buffered multipart body.
///
/// A non-multipart request, or one without an `assetData` file part, is a
/// missing upload. A second `assetData` file or broken framing is malformed.
pub async fn parse_upload(
    content_type: Option<&str>,
    body: Bytes,
    inbound_headers: HashMap<String, String>,
) -> Result<UploadRequest, UploadError> {
    let boundary = match content_type.and_then(|ct| multer::parse_boundary(ct).ok()) {
        Some(boundary) => boundary,
        None => return Err(UploadError::MissingUpload),
    };

    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut asset: Option<FilePart> = None;
    let mut extra_fields = Vec::new();
    let mut extra_files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::InvalidMultipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        match filename {
            Some(filename) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::InvalidMultipart(e.to_string()))?;
                let part = FilePart {
                    field_name: name,
                    filename,
                    mime_type,
                    data,
                };

                if part.field_name == ASSET_FIELD_NAME {
                    if asset.is_some() {
                        return Err(UploadError::InvalidMultipart(format!(
                            "more than one '{}' file",
                            ASSET_FIELD_NAME
                        )));
                    }
                    asset = Some(part);
                } else {
                    extra_files.push(part);
                }
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UploadError::InvalidMultipart(e.to_string()))?;
                extra_fields.push((name, value));
            }
        }
    }

    let asset = asset.ok_or(UploadError::MissingUpload)?;

    Ok(UploadRequest {
        extension: extension_of(&asset.filename),
        original_filename: asset.filename,
        raw_bytes: asset.data,
        declared_mime_type: asset.mime_type,
        extra_fields,
        extra_files,
        inbound_headers,
    })
}
