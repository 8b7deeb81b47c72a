// Constants module - centralized default values for configuration
//
// Defaults mirror the environment-level settings the proxy has always
// shipped with (IMMICH_URL, SIZE_W, SIZE_H, port 3000).

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default maximum upload body size (512 MB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

/// Default maximum number of uploads processed at the same time
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 16;

// =============================================================================
// Backend defaults
// =============================================================================

/// Default Immich base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:2283";

/// Default identity check timeout in seconds
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Default asset forward timeout in seconds
pub const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 300;

/// Default connect timeout for backend calls in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Identity endpoint used to validate the caller's session
pub const AUTH_CHECK_PATH: &str = "/api/users/me";

/// Asset ingest endpoint (inbound route and outbound target)
pub const ASSET_UPLOAD_PATH: &str = "/api/assets";

// =============================================================================
// Image defaults
// =============================================================================

/// Default bounding box width (landscape orientation)
pub const DEFAULT_MAX_WIDTH: u32 = 2560;

/// Default bounding box height (landscape orientation)
pub const DEFAULT_MAX_HEIGHT: u32 = 1440;

/// Default WebP quality (1-100)
pub const DEFAULT_WEBP_QUALITY: u8 = 100;

/// Default WebP effort / method (0-6, 6 is slowest and smallest)
pub const DEFAULT_WEBP_EFFORT: u8 = 6;

/// Default image bomb limit (200 megapixels)
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 200_000_000;

/// Default transcoding timeout in seconds
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Wire names
// =============================================================================

/// Multipart field carrying the asset bytes
pub const ASSET_FIELD_NAME: &str = "assetData";

/// Response header marking whether the asset was recompressed
pub const ASSET_STATUS_HEADER: &str = "X-AssetStatus";

/// Response header carrying the request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
