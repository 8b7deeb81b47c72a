// Request pipeline module - request context and the upload pipeline
//
// An upload runs strictly in order: identity check, multipart parse,
// normalization, forward. Each backend call and the normalization step have
// their own deadline.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::auth::{AuthChecker, BackendAuthChecker};
use crate::config::Config;
use crate::error::UploadError;
use crate::forwarder::{ForwardOutcome, ForwardParts, MultipartForwarder, StatusTag};
use crate::image_optimizer::{self, ImageConfig, ImageError, NormalizationResult};
use crate::metrics::Metrics;
use crate::multipart::parse_upload;

/// Request context that holds all information about an HTTP request
/// as it flows through the proxy
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    started_at: Instant,
    status_tag: Option<StatusTag>,
}

impl RequestContext {
    /// Create a new RequestContext from HTTP request information
    /// Automatically generates a unique request ID (UUID v4)
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            started_at: Instant::now(),
            status_tag: None,
        }
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fill in method and path once the request header is available
    pub fn set_request_line(&mut self, method: String, path: String) {
        self.method = method;
        self.path = path;
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }

    pub fn set_status_tag(&mut self, tag: StatusTag) {
        self.status_tag = Some(tag);
    }

    /// Set only for uploads the backend answered
    pub fn status_tag(&self) -> Option<StatusTag> {
        self.status_tag
    }
}

/// Deadlines for the three blocking stages of an upload
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub auth: Duration,
    pub processing: Duration,
    pub forward: Duration,
}

impl StageTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth: Duration::from_secs(config.backend.auth_timeout),
            processing: Duration::from_secs(config.image.processing_timeout),
            forward: Duration::from_secs(config.backend.forward_timeout),
        }
    }
}

/// Composition root for `POST /api/assets`
pub struct UploadPipeline {
    auth: Arc<dyn AuthChecker>,
    forwarder: MultipartForwarder,
    image_config: Arc<ImageConfig>,
    timeouts: StageTimeouts,
    upload_slots: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl UploadPipeline {
    pub fn new(
        auth: Arc<dyn AuthChecker>,
        forwarder: MultipartForwarder,
        image_config: ImageConfig,
        timeouts: StageTimeouts,
        max_concurrent_uploads: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            auth,
            forwarder,
            image_config: Arc::new(image_config),
            timeouts,
            upload_slots: Arc::new(Semaphore::new(max_concurrent_uploads)),
            metrics,
        }
    }

    /// Wire the backend-backed auth checker and forwarder from configuration.
    ///
    /// Both share one HTTP client (and its connection pool). Per-call
    /// deadlines are applied by the pipeline, not the client.
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.backend.connect_timeout))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        let auth = BackendAuthChecker::with_client(client.clone(), &config.backend.url);
        let forwarder = MultipartForwarder::new(client, &config.backend.url);

        Ok(Self::new(
            Arc::new(auth),
            forwarder,
            config.image.clone(),
            StageTimeouts::from_config(config),
            config.server.max_concurrent_uploads,
            metrics,
        ))
    }

    /// Reserve an upload slot, or fail fast when all are taken.
    ///
    /// Held for the whole upload, including reading the body.
    pub fn try_acquire_slot(&self) -> Result<OwnedSemaphorePermit, UploadError> {
        Arc::clone(&self.upload_slots)
            .try_acquire_owned()
            .map_err(|_| UploadError::Overloaded)
    }

    /// Run one buffered upload through auth → parse → normalize → forward.
    ///
    /// Authentication happens before the body is interpreted, so an
    /// unauthenticated request is always 401, even when it is also malformed.
    pub async fn handle(
        &self,
        request_id: &str,
        headers: HashMap<String, String>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<ForwardOutcome, UploadError> {
        self.metrics.increment_uploads();

        // 1. Identity check; missing the deadline counts as a rejection
        let verify = self.auth.verify(&headers);
        let authenticated = match tokio::time::timeout(self.timeouts.auth, verify).await {
            Ok(authenticated) => authenticated,
            Err(_) => {
                tracing::warn!(request_id = %request_id, "Identity check timed out");
                false
            }
        };
        if !authenticated {
            tracing::info!(request_id = %request_id, "Upload rejected by identity check");
            return Err(UploadError::Auth);
        }

        // 2. Multipart
        let upload = parse_upload(content_type, body, headers).await?;
        tracing::debug!(
            request_id = %request_id,
            filename = %upload.original_filename,
            extension = %upload.extension,
            size = upload.raw_bytes.len(),
            extra_fields = upload.extra_fields.len(),
            "Parsed upload"
        );

        // 3. Normalize off the async workers
        let bytes_in = upload.raw_bytes.len();
        let normalized = self
            .normalize(
                upload.raw_bytes.clone(),
                upload.extension.clone(),
                upload.declared_mime_type.clone(),
            )
            .await?;
        self.metrics
            .record_normalization(bytes_in, normalized.output_bytes.len());

        tracing::info!(
            request_id = %request_id,
            filename = %upload.original_filename,
            extension = %upload.extension,
            transformed = normalized.was_transformed,
            original_size = ?normalized.original_size,
            output_size = ?normalized.output_size,
            bytes_in = bytes_in,
            bytes_out = normalized.output_bytes.len(),
            "Normalized upload"
        );

        // 4. Forward
        let parts = ForwardParts {
            original_filename: &upload.original_filename,
            extra_fields: &upload.extra_fields,
            extra_files: &upload.extra_files,
            inbound_headers: &upload.inbound_headers,
        };
        let outcome = tokio::time::timeout(
            self.timeouts.forward,
            self.forwarder.forward(normalized, parts),
        )
        .await
        .map_err(|_| UploadError::Timeout { stage: "forward" })?
        .map_err(UploadError::Forward)?;

        self.metrics.record_forwarded(outcome.status_tag);
        Ok(outcome)
    }

    async fn normalize(
        &self,
        raw: Bytes,
        extension: String,
        declared_mime_type: String,
    ) -> Result<NormalizationResult, UploadError> {
        let config = Arc::clone(&self.image_config);
        // A timed-out task keeps its blocking thread until it finishes; only
        // the request stops waiting for it.
        let task = tokio::task::spawn_blocking(move || {
            image_optimizer::normalize(raw, &extension, &declared_mime_type, &config)
        });

        let joined = tokio::time::timeout(self.timeouts.processing, task)
            .await
            .map_err(|_| UploadError::Timeout {
                stage: "processing",
            })?;

        match joined {
            Ok(result) => result.map_err(UploadError::Processing),
            Err(e) => Err(UploadError::Processing(ImageError::decode_failed(format!(
                "normalization task failed: {}",
                e
            )))),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }
}
