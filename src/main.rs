//! Response override CLI entry point.
//!
//! Validates configurations, rewrites JSON documents offline and fetches URLs
//! through the interceptor.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zentinel_response_override::transport::{ReqwestFetch, RequestInput};
use zentinel_response_override::{
    FetchResponse, FetchTransport, ResponseInterceptor, TransformConfig,
};

#[derive(Parser, Debug)]
#[command(name = "zentinel-response-override")]
#[command(
    author,
    version,
    about = "Force status codes and rewrite JSON reply fields"
)]
struct Args {
    /// Configuration file path (YAML or JSON). Defaults to the built-in rules.
    #[arg(short, long, env = "RESPONSE_OVERRIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Rewrite a JSON document ("-" for stdin) and print the result
    #[arg(long, value_name = "FILE")]
    transform: Option<String>,

    /// Fetch a URL through the interceptor and print status and body
    #[arg(long, value_name = "URL")]
    fetch: Option<String>,

    /// Request timeout for --fetch, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    validate: bool,
}

fn print_example_config() {
    let example = r#"# Response Override Configuration Example
version: "1"

settings:
  # Report this status from every status accessor, and ok = true
  force_status: true
  forced_status: 200
  # Status phrase of rebuilt fetch replies
  forced_status_text: "OK"
  # Rewrite JSON bodies with the rules below
  rewrite_json: true
  # A reply is JSON when its Content-Type contains one of these
  json_content_types:
    - "application/json"

# Each rule replaces the value of a field with this name at any depth.
# "data": null always becomes "data": {} regardless of these rules.
rules:
  - name: "success"
    replacement: "1"
  - name: "errorCode"
    replacement: ""
"#;
    println!("{}", example);
}

fn load_config(path: &Path) -> Result<TransformConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = if path
        .extension()
        .is_some_and(|e| e == "yaml" || e == "yml")
    {
        TransformConfig::from_yaml(&content)?
    } else {
        TransformConfig::from_json(&content)?
    };
    Ok(config)
}

fn read_document(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read document from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read document: {}", source))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if args.example_config {
        print_example_config();
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TransformConfig::builtin(),
    };

    let interceptor = ResponseInterceptor::new(config).context("Invalid configuration")?;

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    if let Some(source) = &args.transform {
        let document = read_document(source)?;
        let output = interceptor
            .transformer()
            .transform_text(&document)
            .context("Document is not valid JSON")?;
        println!("{}", output);
        return Ok(());
    }

    if let Some(url) = &args.fetch {
        let transport = ReqwestFetch::new(Duration::from_secs(args.timeout_secs))?;
        let fetch = interceptor.wrap_fetch(Arc::new(transport));

        let mut response = fetch
            .fetch(RequestInput::from(url.as_str()), None)
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        println!("{} {}", response.status(), response.status_text());
        println!("{}", response.text().await?);

        let stats = interceptor.stats();
        info!(
            bodies_transformed = stats.bodies_transformed,
            transform_failures = stats.transform_failures,
            "Fetch complete"
        );
        return Ok(());
    }

    bail!("nothing to do: pass --transform, --fetch, --validate or --example-config");
}
