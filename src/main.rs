use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use pixsan::{PipelineConfig, SanitizationPipeline, SanitizedResult};
use serde::Serialize;
use std::path::PathBuf;

/// Repair alpha artifacts in transparent PNGs and print or save the result.
#[derive(Parser)]
#[command(name = "pixsan", version, about)]
struct Args {
    /// Image URLs to sanitize
    #[arg(required = true)]
    urls: Vec<String>,

    /// Document origin; enables the cross-origin readback rule and
    /// resolution of relative URLs
    #[arg(long)]
    origin: Option<String>,

    /// Origin/path prefix for the proxy endpoint (empty = same-origin root)
    #[arg(long, default_value = "")]
    proxy_base: String,

    /// Write corrected PNGs into this directory instead of printing data URLs
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Emit one JSON object per URL
    #[arg(long)]
    json: bool,

    /// Fetch timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,
}

#[derive(Serialize)]
struct Report<'a> {
    url: &'a str,
    status: &'static str,
    display_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// Filename-safe stem from the last path segment of a URL.
fn output_name(url: &str) -> String {
    let stem = url
        .rsplit('/')
        .next()
        .unwrap_or("image")
        .split(['?', '#'])
        .next()
        .unwrap_or("image");
    let stem: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.to_ascii_lowercase().ends_with(".png") {
        stem
    } else {
        format!("{stem}.png")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = PipelineConfig {
        proxy_base: args.proxy_base.clone(),
        origin: args.origin.clone(),
        timeout_ms: args.timeout_ms,
        ..Default::default()
    };
    let pipeline = SanitizationPipeline::new(config).context("failed to initialize pipeline")?;

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    for url in &args.urls {
        let result = pipeline.sanitize(url).await;
        let (status, reason) = match &result {
            SanitizedResult::Ready { .. } => ("ready", None),
            SanitizedResult::Degraded { reason, .. } => ("degraded", Some(reason.as_str())),
        };

        if args.json {
            let report = Report {
                url,
                status,
                display_url: result.display_url(),
                reason,
            };
            println!("{}", serde_json::to_string(&report)?);
        } else if let Some(reason) = reason {
            eprintln!("{url}: degraded ({reason})");
        }

        match (&args.out_dir, &result) {
            (Some(dir), SanitizedResult::Ready { url: display }) => {
                let payload = display
                    .strip_prefix("data:image/png;base64,")
                    .context("unexpected display URL format")?;
                let bytes = BASE64.decode(payload).context("corrupt display URL payload")?;
                let path = dir.join(output_name(url));
                std::fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                if !args.json {
                    println!("{url} -> {}", path.display());
                }
            }
            (None, SanitizedResult::Ready { url: display }) if !args.json => {
                println!("{display}");
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_keeps_png_extension() {
        assert_eq!(output_name("https://cdn.example.net/a/tee-front.png"), "tee-front.png");
        assert_eq!(output_name("https://cdn.example.net/tee.png?v=3"), "tee.png");
    }

    #[test]
    fn output_name_sanitizes_and_appends_extension() {
        assert_eq!(output_name("https://cdn.example.net/tee front"), "tee_front.png");
    }
}
