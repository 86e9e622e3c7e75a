//! CLI binary for edgequake-pdfthumb.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ThumbnailConfig`, runs the pipeline once and prints the JSON response.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfthumb::config::{DEFAULT_BUCKET, DEFAULT_KEY_PREFIX, DEFAULT_PUBLIC_BASE_URL};
use edgequake_pdfthumb::{
    HttpFetcher, ObjectStorageUploader, PdfiumDecoder, ThumbnailConfig, ThumbnailPipeline,
    ThumbnailRequest,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render and upload to R2 (credentials from the environment)
  pdfthumb https://example.com/report.pdf

  # Render without uploading; the response shows the would-be key and URL
  pdfthumb --dry-run https://example.com/report.pdf

  # Custom destination folder and an S3-compatible endpoint (MinIO)
  pdfthumb --endpoint http://localhost:9000 --bucket media \
           --key-prefix thumbnails https://example.com/a%20b.PDF

OUTPUT:
  A single JSON object on stdout:
    { "success": true, "path": "test/thumb-report.png",
      "publicUrl": "https://media.recollect.so/test/thumb-report.png" }
    { "success": false, "error": "Failed to load PDF document", "details": "..." }

EXIT CODES:
  0  thumbnail stored (200)
  2  source rejected: non-success HTTP status or non-PDF URL (400)
  1  any other failure (500) or invalid configuration

ENVIRONMENT VARIABLES:
  R2_ACCOUNT_ID           Cloudflare account id (derives the R2 endpoint)
  R2_ACCESS_KEY_ID        Access key id
  R2_SECRET_ACCESS_KEY    Secret access key
  R2_MAIN_BUCKET_NAME     Destination bucket (default: recollect)
  R2_PUBLIC_BUCKET_URL    Public base URL (default: https://media.recollect.so)
  PDFIUM_LIB_PATH         Path to libpdfium; system library if unset
  RUST_LOG                Overrides the log filter
"#;

/// Render the first page of a remote PDF to PNG and upload it.
#[derive(Parser, Debug)]
#[command(
    name = "pdfthumb",
    version,
    about = "Render the first page of a remote PDF to a PNG thumbnail and upload it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTTP/HTTPS URL of the PDF.
    url: String,

    /// Cloudflare account id; the endpoint becomes https://<id>.r2.cloudflarestorage.com.
    #[arg(long, env = "R2_ACCOUNT_ID", default_value = "")]
    account_id: String,

    /// Storage access key id.
    #[arg(long, env = "R2_ACCESS_KEY_ID", default_value = "")]
    access_key_id: String,

    /// Storage secret access key.
    #[arg(long, env = "R2_SECRET_ACCESS_KEY", default_value = "", hide_env_values = true)]
    secret_access_key: String,

    /// Explicit S3 endpoint; overrides the account-id derived endpoint.
    #[arg(long, env = "PDFTHUMB_S3_ENDPOINT")]
    endpoint: Option<String>,

    /// Region used for request signing.
    #[arg(long, env = "PDFTHUMB_S3_REGION", default_value = "auto")]
    region: String,

    /// Destination bucket.
    #[arg(long, env = "R2_MAIN_BUCKET_NAME", default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Base URL the bucket is publicly readable under.
    #[arg(long, env = "R2_PUBLIC_BUCKET_URL", default_value = DEFAULT_PUBLIC_BASE_URL)]
    public_base_url: String,

    /// Folder thumbnails are written under.
    #[arg(long, env = "PDFTHUMB_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,

    /// Source download timeout in seconds.
    #[arg(long, env = "PDFTHUMB_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Maximum source size in bytes.
    #[arg(long, env = "PDFTHUMB_MAX_SOURCE_BYTES", default_value_t = 50 * 1024 * 1024)]
    max_source_bytes: u64,

    /// Maximum redirects followed when fetching the source.
    #[arg(long, env = "PDFTHUMB_MAX_REDIRECTS", default_value_t = 10)]
    max_redirects: usize,

    /// Decode + render timeout in seconds.
    #[arg(long, env = "PDFTHUMB_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Upload timeout in seconds.
    #[arg(long, env = "PDFTHUMB_UPLOAD_TIMEOUT", default_value_t = 60)]
    upload_timeout: u64,

    /// Largest accepted viewport edge in pixels.
    #[arg(long, env = "PDFTHUMB_MAX_VIEWPORT_EDGE", default_value_t = 10_000)]
    max_viewport_edge: u32,

    /// Reject URLs that are not http(s) with a .pdf path before fetching.
    #[arg(long, env = "PDFTHUMB_REQUIRE_PDF_URL")]
    require_pdf_url: bool,

    /// Include raw storage backend errors in `details`.
    #[arg(long, env = "PDFTHUMB_EXPOSE_STORAGE_ERRORS")]
    expose_storage_errors: bool,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Upload to an in-memory store instead of object storage.
    #[arg(long)]
    dry_run: bool,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pretty: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTHUMB_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "PDFTHUMB_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // stdout carries the JSON response only; logs go to stderr.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build pipeline ───────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let pipeline = if cli.dry_run {
        let uploader = ObjectStorageUploader::in_memory(
            config.storage.bucket.clone(),
            config.storage.public_base_url.clone(),
        );
        let fetcher = HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?;
        let decoder = PdfiumDecoder::new(config.pdfium_lib_path.clone());
        ThumbnailPipeline::new(config, Arc::new(fetcher), Arc::new(decoder), uploader)
    } else {
        ThumbnailPipeline::from_config(config).context("Failed to initialise pipeline")?
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let result = pipeline.run(&ThumbnailRequest::new(cli.url.clone())).await;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result.response)
    } else {
        serde_json::to_string(&result.response)
    }
    .context("Failed to serialise response")?;
    println!("{json}");

    Ok(match result.status {
        200 => ExitCode::SUCCESS,
        400 => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    })
}

/// Map CLI args to `ThumbnailConfig`.
fn build_config(cli: &Cli) -> Result<ThumbnailConfig> {
    let mut builder = ThumbnailConfig::builder()
        .account_id(cli.account_id.clone())
        .credentials(cli.access_key_id.clone(), cli.secret_access_key.clone())
        .region(cli.region.clone())
        .bucket(cli.bucket.clone())
        .public_base_url(cli.public_base_url.clone())
        .key_prefix(cli.key_prefix.clone())
        .fetch_timeout_secs(cli.fetch_timeout)
        .max_source_bytes(cli.max_source_bytes)
        .max_redirects(cli.max_redirects)
        .render_timeout_secs(cli.render_timeout)
        .upload_timeout_secs(cli.upload_timeout)
        .max_viewport_edge(cli.max_viewport_edge)
        .require_pdf_url(cli.require_pdf_url)
        .expose_storage_errors(cli.expose_storage_errors);

    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_map_to_config() {
        let cli = Cli::try_parse_from(["pdfthumb", "https://example.com/a.pdf"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.key_prefix, "test");
        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(!cli.dry_run);
    }

    #[test]
    fn cli_destination_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["pdfthumb", "https://example.com/a.pdf"]).unwrap();
        let config = build_config(&cli).unwrap();
        let library = ThumbnailConfig::default();
        if std::env::var_os("R2_MAIN_BUCKET_NAME").is_none() {
            assert_eq!(config.storage.bucket, library.storage.bucket);
        }
        if std::env::var_os("R2_PUBLIC_BUCKET_URL").is_none() {
            assert_eq!(config.storage.public_base_url, library.storage.public_base_url);
        }
        if std::env::var_os("PDFTHUMB_KEY_PREFIX").is_none() {
            assert_eq!(config.key_prefix, library.key_prefix);
        }
    }

    #[test]
    fn cli_overrides_prefix_and_endpoint() {
        let cli = Cli::try_parse_from([
            "pdfthumb",
            "--key-prefix",
            "/thumbs/",
            "--endpoint",
            "http://localhost:9000",
            "--dry-run",
            "https://example.com/a.pdf",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.key_prefix, "thumbs");
        assert_eq!(
            config.storage.resolved_endpoint().as_deref(),
            Some("http://localhost:9000")
        );
        assert!(cli.dry_run);
    }
}
