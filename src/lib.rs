//! pixsan — transparent-PNG sanitization pipeline
//!
//! Repairs corrupted transparent-PNG pixel data (non-premultiplied-alpha
//! artifacts that leave stray dark RGB values under transparent and
//! near-transparent pixels, causing halos over non-white backgrounds) and
//! delivers the result as a displayable URL.
//!
//! # Features
//!
//! - **Alpha correction**: zeroes RGB under fully transparent pixels and
//!   rescales the near-transparent band in place
//! - **Resilient acquisition**: direct credential-less load, with a single
//!   same-origin proxy retry when cross-origin policy denies pixel readback
//! - **Single-flight caching**: at most one pipeline run per source URL, no
//!   matter how many callers request it concurrently
//! - **Fail-open**: every failure degrades to the original URL; callers
//!   never see an error
//!
//! # Example
//!
//! ```no_run
//! use pixsan::{PipelineConfig, SanitizationPipeline};
//!
//! # async fn demo() -> pixsan::Result<()> {
//! let config = PipelineConfig {
//!     origin: Some("https://shop.example.com".to_string()),
//!     ..Default::default()
//! };
//!
//! let pipeline = SanitizationPipeline::new(config)?;
//! let display = pipeline
//!     .get_sanitized_image("https://cdn.example.net/tee-front.png")
//!     .await;
//! println!("src: {display}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

// Pixel-buffer transform (pure, synchronous)
pub mod alpha;

// HTTP acquisition and decode
pub mod acquire;

// Same-origin proxy fallback for readback-denied resources
pub mod proxy;

// Single-flight result memoization
pub mod cache;

// Orchestration and the process-wide instance
pub mod pipeline;

pub use acquire::RasterAcquirer;
pub use cache::SanitizationCache;
pub use pipeline::{
    get_sanitized_image, init, preload_critical_images, SanitizationPipeline,
};
pub use proxy::ProxyFallbackStrategy;

/// Configuration for the sanitization pipeline
///
/// The defaults are chosen to be conservative: no document origin (which
/// disables the cross-origin readback rule) and a same-origin-root proxy
/// base.
///
/// # Examples
///
/// ```
/// let cfg = pixsan::PipelineConfig::default();
/// assert!(cfg.proxy_base.is_empty());
/// assert!(cfg.user_agent.contains("pixsan"));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Origin/path prefix used to build proxy URLs. Empty means the
    /// same-origin root, resolved against `origin`.
    pub proxy_base: String,
    /// Document origin the pipeline runs under: the basis for the
    /// same-origin check and for resolving relative URLs. `None` disables
    /// the readback rule.
    pub origin: Option<String>,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Timeout for each fetch in milliseconds
    pub timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            proxy_base: String::new(),
            origin: None,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 pixsan/0.1"
                .to_string(),
            timeout_ms: 30000,
        }
    }
}

/// Outcome of one sanitization run for a source URL
///
/// `Degraded` is observably identical to `Ready` through
/// [`display_url`](SanitizedResult::display_url) — it simply hands back the
/// original URL — but stays distinguishable for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizedResult {
    /// Corrected pixels, encoded as a `data:image/png;base64,...` URL
    Ready { url: String },
    /// Sanitization was unavailable; the original URL is served unchanged
    Degraded { url: String, reason: String },
}

impl SanitizedResult {
    /// The URL a consumer should render, regardless of outcome.
    pub fn display_url(&self) -> &str {
        match self {
            SanitizedResult::Ready { url } | SanitizedResult::Degraded { url, .. } => url,
        }
    }

    /// Whether this result fell back to the original URL.
    pub fn is_degraded(&self) -> bool {
        matches!(self, SanitizedResult::Degraded { .. })
    }

    pub(crate) fn degraded(url: impl Into<String>, reason: impl Into<String>) -> Self {
        SanitizedResult::Degraded {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.proxy_base.is_empty());
        assert!(config.origin.is_none());
        assert_eq!(config.timeout_ms, 30000);
    }

    #[test]
    fn degraded_serves_the_original_url() {
        let result = SanitizedResult::degraded("https://cdn.example.net/a.png", "HTTP 404");
        assert!(result.is_degraded());
        assert_eq!(result.display_url(), "https://cdn.example.net/a.png");
    }
}
