//! Error types for the sanitization pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while acquiring and sanitizing an image
///
/// The fallback logic downstream matches on these variants, never on message
/// strings: only [`Error::TaintedCanvas`] triggers the proxy retry.
#[derive(Error, Debug)]
pub enum Error {
    /// The resource could not be fetched, returned a non-2xx status, or is
    /// not a decodable raster image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Pixel readback was denied for a cross-origin resource: the response
    /// carried no permissive `Access-Control-Allow-Origin` header
    #[error("Cross-origin pixel readback denied for {url}")]
    TaintedCanvas { url: String },

    /// Both the direct load and the proxy fallback failed; callers must not
    /// retry a third time
    #[error("Sanitization unavailable for {url}: direct load failed ({direct}); proxy fallback failed ({proxy})")]
    SanitizationUnavailable {
        url: String,
        direct: Box<Error>,
        proxy: Box<Error>,
    },

    /// The corrected raster could not be re-encoded as PNG
    #[error("Failed to encode sanitized image: {0}")]
    Encode(String),

    /// Failed to construct the HTTP client
    #[error("Pipeline initialization failed: {0}")]
    Initialization(String),

    /// Unusable configuration (e.g. a relative URL with no origin to
    /// resolve against)
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this failure kind triggers the proxy fallback.
    pub fn is_tainted_canvas(&self) -> bool {
        matches!(self, Error::TaintedCanvas { .. })
    }
}
