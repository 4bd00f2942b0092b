//! Sanitization pipeline: acquire -> correct -> encode -> cache
//!
//! The pipeline is fail-open: every failure degrades to the original source
//! URL, so a broken pipeline never blocks product imagery from rendering.
//! The only observable effect of failure is the absence of correction,
//! never an error.

use crate::acquire::RasterAcquirer;
use crate::alpha;
use crate::cache::SanitizationCache;
use crate::proxy::ProxyFallbackStrategy;
use crate::{Error, PipelineConfig, Result, SanitizedResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use log::{debug, warn};
use std::io::Cursor;
use std::sync::OnceLock;

/// Orchestrates acquisition, correction, encoding, and caching.
pub struct SanitizationPipeline {
    acquirer: RasterAcquirer,
    fallback: ProxyFallbackStrategy,
    cache: SanitizationCache,
}

impl SanitizationPipeline {
    /// Create a pipeline with the given configuration.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let acquirer = RasterAcquirer::new(&config)?;
        let fallback = ProxyFallbackStrategy::new(config.proxy_base);
        Ok(Self {
            acquirer,
            fallback,
            cache: SanitizationCache::new(),
        })
    }

    /// Sanitized display URL for `url`.
    ///
    /// Resolves to a `data:image/png;base64,...` URL of the corrected image,
    /// or to `url` itself when sanitization is unavailable. Never errors;
    /// concurrent calls for one URL share a single pipeline run.
    pub async fn get_sanitized_image(&self, url: &str) -> String {
        self.sanitize(url).await.display_url().to_string()
    }

    /// Same orchestration as [`get_sanitized_image`], returning the internal
    /// result so callers can distinguish a degraded settle for diagnostics.
    ///
    /// [`get_sanitized_image`]: SanitizationPipeline::get_sanitized_image
    pub async fn sanitize(&self, url: &str) -> SanitizedResult {
        let acquirer = self.acquirer.clone();
        let fallback = self.fallback.clone();
        let source = url.to_string();
        self.cache
            .get_or_compute(url, move || run_sanitization(acquirer, fallback, source))
            .await
    }

    /// Settled result for `url`, if the pipeline has one.
    pub fn cached(&self, url: &str) -> Option<SanitizedResult> {
        self.cache.get(url)
    }

    /// Eagerly warm upstream caches for `urls` without running sanitization.
    ///
    /// Fire-and-forget: spawns one fetch per URL on the current runtime and
    /// returns immediately. Does not block, does not panic, and feeds
    /// nothing into the sanitization cache. Outside a tokio runtime there is
    /// nowhere to park the work, so the call logs and does nothing.
    pub fn preload_critical_images<I>(&self, urls: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("preload skipped: no async runtime on this thread");
                return;
            }
        };

        for url in urls {
            let url = url.as_ref().to_string();
            let acquirer = self.acquirer.clone();
            handle.spawn(async move {
                if let Err(err) = acquirer.warm(&url).await {
                    debug!("preload of {url} skipped: {err}");
                }
            });
        }
    }
}

async fn run_sanitization(
    acquirer: RasterAcquirer,
    fallback: ProxyFallbackStrategy,
    url: String,
) -> SanitizedResult {
    match sanitize_uncached(&acquirer, &fallback, &url).await {
        Ok(display_url) => {
            debug!("sanitized {url} ({} bytes as data URL)", display_url.len());
            SanitizedResult::Ready { url: display_url }
        }
        Err(err) => {
            warn!("image sanitization degraded for {url}: {err}");
            SanitizedResult::degraded(url, err.to_string())
        }
    }
}

async fn sanitize_uncached(
    acquirer: &RasterAcquirer,
    fallback: &ProxyFallbackStrategy,
    url: &str,
) -> Result<String> {
    let mut raster = fallback.load_with_fallback(acquirer, url).await?;
    alpha::correct_in_place(&mut raster);
    encode_display_url(&raster)
}

/// Encode a raster as a displayable `data:image/png;base64,...` URL.
pub(crate) fn encode_display_url(raster: &RgbaImage) -> Result<String> {
    let mut png = Cursor::new(Vec::new());
    raster
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64.encode(png.get_ref())
    ))
}

// ---------------------------------------------------------------------------
// Process-wide instance
// ---------------------------------------------------------------------------

static GLOBAL: OnceLock<SanitizationPipeline> = OnceLock::new();

/// Initialize the process-wide pipeline. The first successful call wins;
/// later calls observe the existing instance regardless of their config.
pub fn init(config: PipelineConfig) -> Result<&'static SanitizationPipeline> {
    if let Some(existing) = GLOBAL.get() {
        return Ok(existing);
    }
    let pipeline = SanitizationPipeline::new(config)?;
    Ok(GLOBAL.get_or_init(|| pipeline))
}

/// The process-wide pipeline, initialized with defaults on first use.
pub fn global() -> Result<&'static SanitizationPipeline> {
    init(PipelineConfig::default())
}

/// Sanitize via the process-wide pipeline. Fail-open even when the pipeline
/// itself cannot be initialized.
pub async fn get_sanitized_image(url: &str) -> String {
    match global() {
        Ok(pipeline) => pipeline.get_sanitized_image(url).await,
        Err(err) => {
            warn!("sanitization pipeline unavailable: {err}");
            url.to_string()
        }
    }
}

/// Preload via the process-wide pipeline. No-op when unavailable.
pub fn preload_critical_images<I>(urls: I)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    match global() {
        Ok(pipeline) => pipeline.preload_critical_images(urls),
        Err(err) => debug!("preload skipped, pipeline unavailable: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use image::Rgba;

    #[test]
    fn display_url_round_trips_through_png() {
        let mut raster = RgbaImage::new(2, 1);
        raster.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        raster.put_pixel(1, 0, Rgba([0, 0, 0, 0]));

        let display = encode_display_url(&raster).unwrap();
        let payload = display
            .strip_prefix("data:image/png;base64,")
            .expect("display URL should be a base64 PNG data URL");

        let bytes = BASE64.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn invalid_origin_fails_initialization() {
        let config = PipelineConfig {
            origin: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(
            SanitizationPipeline::new(config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn preload_outside_a_runtime_is_a_noop() {
        let config = PipelineConfig::default();
        let pipeline = SanitizationPipeline::new(config).unwrap();
        // Must neither panic nor block.
        pipeline.preload_critical_images(["http://127.0.0.1:1/a.png"]);
    }
}
