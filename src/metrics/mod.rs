// Metrics module - Prometheus-compatible metrics tracking
// Counters for the upload pipeline plus generic request counters

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::UploadError;
use crate::forwarder::StatusTag;

/// Metrics struct tracks counters for Prometheus export
/// Thread-safe via atomic operations and mutexes
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,

    // Status code counters (e.g., 200, 401, 502)
    status_counts: Mutex<HashMap<u16, u64>>,

    // HTTP method counters (GET, POST, etc.)
    method_counts: Mutex<HashMap<String, u64>>,

    // Duration tracking (microseconds)
    duration_sum_us: AtomicU64,
    duration_count: AtomicU64,

    // Upload outcomes
    uploads_total: AtomicU64,
    uploads_compressed: AtomicU64,
    uploads_passthrough: AtomicU64,

    // Upload failures by stage
    auth_failures: AtomicU64,
    invalid_uploads: AtomicU64,
    payload_too_large: AtomicU64,
    processing_failures: AtomicU64,
    forward_failures: AtomicU64,
    timeouts: Mutex<HashMap<&'static str, u64>>,
    concurrency_limit_rejections: AtomicU64,

    // Normalization volume
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,

    // In-flight uploads gauge
    active_uploads: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Metrics {
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(HashMap::new()),
            method_counts: Mutex::new(HashMap::new()),
            duration_sum_us: AtomicU64::new(0),
            duration_count: AtomicU64::new(0),
            uploads_total: AtomicU64::new(0),
            uploads_compressed: AtomicU64::new(0),
            uploads_passthrough: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            invalid_uploads: AtomicU64::new(0),
            payload_too_large: AtomicU64::new(0),
            processing_failures: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
            timeouts: Mutex::new(HashMap::new()),
            concurrency_limit_rejections: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            active_uploads: AtomicU64::new(0),
        }
    }

    /// Record a finished request
    pub fn record_request(&self, method: &str, status: u16, duration_ms: f64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut counts) = self.status_counts.lock() {
            *counts.entry(status).or_insert(0) += 1;
        }
        if let Ok(mut counts) = self.method_counts.lock() {
            *counts.entry(method.to_uppercase()).or_insert(0) += 1;
        }
        self.duration_sum_us
            .fetch_add((duration_ms * 1000.0) as u64, Ordering::Relaxed);
        self.duration_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_uploads(&self) {
        self.uploads_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload the backend answered
    pub fn record_forwarded(&self, tag: StatusTag) {
        match tag {
            StatusTag::Compressed => self.uploads_compressed.fetch_add(1, Ordering::Relaxed),
            StatusTag::Passthrough => self.uploads_passthrough.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record normalizer input and output sizes
    pub fn record_normalization(&self, bytes_in: usize, bytes_out: usize) {
        self.bytes_in.fetch_add(bytes_in as u64, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes_out as u64, Ordering::Relaxed);
    }

    /// Count a failed upload under its failure stage
    pub fn record_upload_error(&self, err: &UploadError) {
        let counter = match err {
            UploadError::Auth => &self.auth_failures,
            UploadError::MissingUpload | UploadError::InvalidMultipart(_) | UploadError::Body(_) => {
                &self.invalid_uploads
            }
            UploadError::PayloadTooLarge { .. } => &self.payload_too_large,
            UploadError::Processing(_) => &self.processing_failures,
            UploadError::Forward(_) => &self.forward_failures,
            UploadError::Overloaded => &self.concurrency_limit_rejections,
            UploadError::Timeout { stage } => {
                if let Ok(mut timeouts) = self.timeouts.lock() {
                    *timeouts.entry(*stage).or_insert(0) += 1;
                }
                return;
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_active_uploads(&self) {
        self.active_uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_uploads(&self) {
        // Saturating so a stray decrement cannot wrap the gauge
        let _ = self
            .active_uploads
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn uploads_total(&self) -> u64 {
        self.uploads_total.load(Ordering::Relaxed)
    }

    pub fn uploads_compressed(&self) -> u64 {
        self.uploads_compressed.load(Ordering::Relaxed)
    }

    pub fn uploads_passthrough(&self) -> u64 {
        self.uploads_passthrough.load(Ordering::Relaxed)
    }

    pub fn auth_failures(&self) -> u64 {
        self.auth_failures.load(Ordering::Relaxed)
    }

    pub fn processing_failures(&self) -> u64 {
        self.processing_failures.load(Ordering::Relaxed)
    }

    pub fn forward_failures(&self) -> u64 {
        self.forward_failures.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self, stage: &str) -> u64 {
        self.timeouts
            .lock()
            .ok()
            .and_then(|t| t.get(stage).copied())
            .unwrap_or(0)
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        write_counter(
            &mut output,
            "http_requests_total",
            "Total number of HTTP requests received",
            self.request_count.load(Ordering::Relaxed),
        );

        // Sorted for stable output
        output.push_str("\n# HELP http_requests_by_status_total HTTP requests by status code\n");
        output.push_str("# TYPE http_requests_by_status_total counter\n");
        if let Ok(counts) = self.status_counts.lock() {
            let sorted: BTreeMap<_, _> = counts.iter().collect();
            for (status, count) in sorted {
                output.push_str(&format!(
                    "http_requests_by_status_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        output.push_str("\n# HELP http_requests_by_method_total HTTP requests by method\n");
        output.push_str("# TYPE http_requests_by_method_total counter\n");
        if let Ok(counts) = self.method_counts.lock() {
            let sorted: BTreeMap<_, _> = counts.iter().collect();
            for (method, count) in sorted {
                output.push_str(&format!(
                    "http_requests_by_method_total{{method=\"{}\"}} {}\n",
                    method, count
                ));
            }
        }

        output.push_str("\n# HELP http_request_duration_seconds Request duration\n");
        output.push_str("# TYPE http_request_duration_seconds summary\n");
        output.push_str(&format!(
            "http_request_duration_seconds_sum {}\n",
            self.duration_sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
        ));
        output.push_str(&format!(
            "http_request_duration_seconds_count {}\n",
            self.duration_count.load(Ordering::Relaxed)
        ));

        output.push('\n');
        write_counter(
            &mut output,
            "uploads_total",
            "Asset uploads received",
            self.uploads_total(),
        );
        output.push_str("\n# HELP uploads_forwarded_total Uploads answered by the backend, by asset status\n");
        output.push_str("# TYPE uploads_forwarded_total counter\n");
        output.push_str(&format!(
            "uploads_forwarded_total{{status=\"compressed\"}} {}\n",
            self.uploads_compressed()
        ));
        output.push_str(&format!(
            "uploads_forwarded_total{{status=\"passthrough\"}} {}\n",
            self.uploads_passthrough()
        ));

        output.push('\n');
        write_counter(
            &mut output,
            "upload_auth_failures_total",
            "Uploads rejected by the identity check",
            self.auth_failures(),
        );
        output.push('\n');
        write_counter(
            &mut output,
            "upload_invalid_total",
            "Uploads without an asset or with a malformed body",
            self.invalid_uploads.load(Ordering::Relaxed),
        );
        output.push('\n');
        write_counter(
            &mut output,
            "upload_payload_too_large_total",
            "Uploads over the size limit",
            self.payload_too_large.load(Ordering::Relaxed),
        );
        output.push('\n');
        write_counter(
            &mut output,
            "upload_processing_failures_total",
            "Uploads the normalizer could not process",
            self.processing_failures(),
        );
        output.push('\n');
        write_counter(
            &mut output,
            "upload_forward_failures_total",
            "Uploads that could not reach the backend",
            self.forward_failures(),
        );
        output.push('\n');
        write_counter(
            &mut output,
            "upload_concurrency_limit_rejections_total",
            "Uploads rejected because too many were in progress",
            self.concurrency_limit_rejections.load(Ordering::Relaxed),
        );

        output.push_str("\n# HELP upload_timeouts_total Upload stages that exceeded their deadline\n");
        output.push_str("# TYPE upload_timeouts_total counter\n");
        if let Ok(timeouts) = self.timeouts.lock() {
            let sorted: BTreeMap<_, _> = timeouts.iter().collect();
            for (stage, count) in sorted {
                output.push_str(&format!(
                    "upload_timeouts_total{{stage=\"{}\"}} {}\n",
                    stage, count
                ));
            }
        }

        output.push('\n');
        write_counter(
            &mut output,
            "normalizer_bytes_in_total",
            "Bytes passed to the normalizer",
            self.bytes_in.load(Ordering::Relaxed),
        );
        output.push('\n');
        write_counter(
            &mut output,
            "normalizer_bytes_out_total",
            "Bytes produced by the normalizer",
            self.bytes_out.load(Ordering::Relaxed),
        );

        output.push_str("\n# HELP uploads_active Uploads currently in progress\n");
        output.push_str("# TYPE uploads_active gauge\n");
        output.push_str(&format!(
            "uploads_active {}\n",
            self.active_uploads.load(Ordering::Relaxed)
        ));

        output
    }
}

fn write_counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}
