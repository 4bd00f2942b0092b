//! Raster acquisition: fetch an image resource and decode it to RGBA
//!
//! The acquirer performs a credential-less GET (the equivalent of loading an
//! `<img>` with `crossOrigin = "anonymous"`) and enforces the cross-origin
//! pixel-readback rule itself: a cross-origin response must carry a
//! permissive `Access-Control-Allow-Origin` header or the pixels may not be
//! read back, which surfaces as [`Error::TaintedCanvas`] — the one failure
//! kind the proxy fallback reacts to.

use crate::{Error, PipelineConfig, Result};
use image::RgbaImage;
use log::debug;
use reqwest::header;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetches and decodes image resources.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct RasterAcquirer {
    client: Client,
    origin: Option<Url>,
    user_agent: String,
}

impl RasterAcquirer {
    /// Build an acquirer from the pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let origin = match &config.origin {
            Some(raw) => Some(
                Url::parse(raw)
                    .map_err(|e| Error::Config(format!("invalid origin {raw:?}: {e}")))?,
            ),
            None => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Initialization(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            origin,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Resolve a possibly-relative URL against the configured origin.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        if let Ok(parsed) = Url::parse(url) {
            return Ok(parsed);
        }
        match &self.origin {
            Some(origin) => origin
                .join(url)
                .map_err(|e| Error::Config(format!("cannot resolve {url:?} against origin: {e}"))),
            None => Err(Error::Config(format!(
                "relative URL {url:?} with no origin configured"
            ))),
        }
    }

    fn is_cross_origin(&self, target: &Url) -> bool {
        match &self.origin {
            Some(origin) => origin.origin() != target.origin(),
            // No document context to taint against.
            None => false,
        }
    }

    fn readback_permitted(&self, headers: &header::HeaderMap) -> bool {
        let allowed = headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok());
        match (allowed, &self.origin) {
            (Some("*"), _) => true,
            (Some(allowed), Some(origin)) => allowed == origin.origin().ascii_serialization(),
            _ => false,
        }
    }

    /// Fetch `url` and decode it into an RGBA raster.
    ///
    /// Fails with [`Error::Decode`] when the resource cannot be fetched or
    /// is not a decodable image, and with [`Error::TaintedCanvas`] when a
    /// cross-origin response denies pixel readback. Transient fetch/decode
    /// buffers do not outlive the call.
    pub async fn load(&self, url: &str) -> Result<RgbaImage> {
        let resolved = self.resolve(url)?;
        let cross_origin = self.is_cross_origin(&resolved);

        let mut request = self
            .client
            .get(resolved.clone())
            .header(header::USER_AGENT, self.user_agent.clone());
        if cross_origin {
            if let Some(origin) = &self.origin {
                request = request.header(header::ORIGIN, origin.origin().ascii_serialization());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Decode(format!("fetch failed for {resolved}: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Decode(format!(
                "HTTP {} for {resolved}",
                response.status().as_u16()
            )));
        }

        let readback_denied = cross_origin && !self.readback_permitted(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Decode(format!("failed to read body of {resolved}: {e}")))?;

        if readback_denied {
            debug!("readback denied for cross-origin resource {resolved}");
            return Err(Error::TaintedCanvas {
                url: url.to_string(),
            });
        }

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| Error::Decode(format!("undecodable image at {resolved}: {e}")))?;
        Ok(decoded.to_rgba8())
    }

    /// Fetch `url` and drain the body, warming any caches between the client
    /// and the bytes. Decode is skipped; the outcome is advisory only.
    pub async fn warm(&self, url: &str) -> Result<()> {
        let resolved = self.resolve(url)?;
        let response = self
            .client
            .get(resolved.clone())
            .header(header::USER_AGENT, self.user_agent.clone())
            .send()
            .await
            .map_err(|e| Error::Decode(format!("fetch failed for {resolved}: {e}")))?;
        let _ = response.bytes().await;
        Ok(())
    }
}
