//! Proxy fallback for cross-origin resources that deny pixel readback
//!
//! When a direct load fails with [`Error::TaintedCanvas`], the same bytes
//! are requested once more through a same-origin proxy endpoint that
//! re-serves them with permissive headers. Any other direct failure is
//! final, and a failed proxy attempt is never retried.

use crate::acquire::RasterAcquirer;
use crate::{Error, Result};
use image::RgbaImage;
use log::debug;
use url::Url;

/// Path of the proxy endpoint, appended to the configured proxy base.
const PROXY_ENDPOINT: &str = "/api/proxy-image";

/// Builds proxy request URLs and drives the direct-then-proxy load.
#[derive(Clone)]
pub struct ProxyFallbackStrategy {
    proxy_base: String,
}

impl ProxyFallbackStrategy {
    pub fn new(proxy_base: impl Into<String>) -> Self {
        Self {
            proxy_base: proxy_base.into(),
        }
    }

    /// Build the proxy request URL for `url`:
    /// `{proxy_base}/api/proxy-image?url={percent-encoded url}`.
    ///
    /// An empty or relative proxy base resolves against the acquirer's
    /// configured origin (same-origin root by default).
    pub fn proxy_url(&self, acquirer: &RasterAcquirer, url: &str) -> Result<Url> {
        let endpoint = format!("{}{}", self.proxy_base.trim_end_matches('/'), PROXY_ENDPOINT);
        let mut resolved = acquirer.resolve(&endpoint)?;
        resolved.query_pairs_mut().append_pair("url", url);
        Ok(resolved)
    }

    /// Load `url` directly, falling back to the proxy on readback denial.
    ///
    /// A direct [`Error::Decode`] is returned as-is — only a tainted canvas
    /// justifies re-fetching the same bytes. When the single proxy attempt
    /// also fails, the combined operation fails with
    /// [`Error::SanitizationUnavailable`] carrying both causes.
    pub async fn load_with_fallback(
        &self,
        acquirer: &RasterAcquirer,
        url: &str,
    ) -> Result<RgbaImage> {
        let direct_err = match acquirer.load(url).await {
            Ok(raster) => return Ok(raster),
            Err(err) if err.is_tainted_canvas() => err,
            Err(err) => return Err(err),
        };

        debug!("direct load of {url} denied pixel readback; retrying via proxy");
        let proxy_attempt = match self.proxy_url(acquirer, url) {
            Ok(proxy_url) => acquirer.load(proxy_url.as_str()).await,
            Err(err) => Err(err),
        };

        proxy_attempt.map_err(|proxy_err| Error::SanitizationUnavailable {
            url: url.to_string(),
            direct: Box::new(direct_err),
            proxy: Box::new(proxy_err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineConfig;

    fn acquirer(origin: Option<&str>) -> RasterAcquirer {
        let config = PipelineConfig {
            origin: origin.map(str::to_string),
            ..Default::default()
        };
        RasterAcquirer::new(&config).expect("failed to build acquirer")
    }

    #[test]
    fn builds_proxy_url_with_percent_encoded_source() {
        let strategy = ProxyFallbackStrategy::new("http://shop.example.com");
        let url = strategy
            .proxy_url(&acquirer(None), "https://cdn.example.net/tee front.png")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://shop.example.com/api/proxy-image?url=https%3A%2F%2Fcdn.example.net%2Ftee+front.png"
        );
    }

    #[test]
    fn trailing_slash_on_proxy_base_is_tolerated() {
        let strategy = ProxyFallbackStrategy::new("http://shop.example.com/");
        let url = strategy
            .proxy_url(&acquirer(None), "https://cdn.example.net/a.png")
            .unwrap();
        assert!(url.as_str().starts_with("http://shop.example.com/api/proxy-image?url="));
    }

    #[test]
    fn empty_proxy_base_resolves_against_origin() {
        let strategy = ProxyFallbackStrategy::new("");
        let url = strategy
            .proxy_url(
                &acquirer(Some("http://shop.example.com")),
                "https://cdn.example.net/a.png",
            )
            .unwrap();
        assert!(url.as_str().starts_with("http://shop.example.com/api/proxy-image?url="));
    }

    #[test]
    fn empty_proxy_base_without_origin_is_a_config_error() {
        let strategy = ProxyFallbackStrategy::new("");
        assert!(matches!(
            strategy.proxy_url(&acquirer(None), "https://cdn.example.net/a.png"),
            Err(Error::Config(_))
        ));
    }
}
