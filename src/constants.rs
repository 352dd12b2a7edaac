// Constants module - centralized default values for configuration
//
// Using constants instead of magic numbers keeps defaults in one place.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// Derivative defaults
// =============================================================================

/// Default cap on derivatives per source image (0 disables the cap)
pub const DEFAULT_MAX_DERIVATIVES: usize = 100;

/// Default upper bound on a single Image Processor invocation
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 30;

/// Default JPEG quality for lossy output
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Default upper bound on a requested output width or height
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// Default limit on decoded source pixels (100 megapixels)
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

/// Directory appended to a source root when no derivative root is given
pub const DEFAULT_DERIVATIVE_DIR: &str = "_derivatives";

// =============================================================================
// Request handling
// =============================================================================

/// Query parameter carrying the signing token
pub const TOKEN_QUERY_PARAM: &str = "token";
