use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use offerscan_core::{load_app_config_from_env, OffersResult, ProductUrl};
use offerscan_scraper::{run_pipeline, ChunkMatcher, ScrapeClient};

#[derive(Debug, Parser)]
#[command(name = "offerscan")]
#[command(about = "Extract marketplace seller offers for one product page")]
struct Cli {
    /// Product page URL; prompted for interactively when omitted
    url: Option<String>,

    /// Where to write the offers payload (default: OFFERSCAN_OUTPUT_PATH or result.json)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_app_config_from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let raw_url = match cli.url {
        Some(url) => url,
        None => prompt_for_url()?,
    };
    // Fail fast on a malformed URL, before any network call.
    let url = ProductUrl::parse(&raw_url)?;
    let output_path = cli.output.unwrap_or_else(|| config.output_path.clone());

    let client = ScrapeClient::new(&config)?;
    let matcher = ChunkMatcher::default();

    let started = Instant::now();
    let result = run_pipeline(&client, &matcher, &url)
        .await
        .context("extraction failed")?;

    write_result(&output_path, &result)?;
    tracing::info!(
        path = %output_path.display(),
        offers = result.offers.len(),
        elapsed_secs = format!("{:.2}", started.elapsed().as_secs_f64()),
        "seller offers saved"
    );
    Ok(())
}

fn prompt_for_url() -> anyhow::Result<String> {
    let mut stdout = std::io::stdout();
    stdout.write_all(b"Enter the product link: ")?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Serialize the upstream payload, overwriting any prior result file.
fn write_result(path: &Path, result: &OffersResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&result.payload)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
