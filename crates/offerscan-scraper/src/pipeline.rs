//! Sequential extraction pipeline: page → SKU → token → offers.
//!
//! Stages run strictly in order (SKU and token are both required before the
//! offers request can be built) and the first non-success outcome halts the
//! run. Nothing is retried automatically: blind retries against anti-bot
//! defenses are unproductive and risk further restriction, so a `Blocked`
//! outcome is surfaced to the caller instead.

use std::fmt;

use offerscan_core::{OffersResult, ProductUrl};

use crate::client::ScrapeClient;
use crate::error::ScrapeError;
use crate::token::ChunkMatcher;
use crate::{offers, sku, token};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PageFetch,
    SkuExtract,
    TokenLocate,
    OffersFetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PageFetch => "page-fetch",
            Stage::SkuExtract => "sku-extract",
            Stage::TokenLocate => "token-locate",
            Stage::OffersFetch => "offers-fetch",
        };
        f.write_str(name)
    }
}

/// A stage's non-success outcome, tagged with where the pipeline halted.
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed at {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ScrapeError,
}

/// Run the full extraction for one product URL.
///
/// SKU extraction and token location both consume the same fetched HTML;
/// the page is retrieved once.
///
/// # Errors
///
/// Returns [`PipelineError`] naming the stage that produced the first
/// non-success outcome. A `Blocked` outcome is logged as a warning before
/// being returned; everything else logs as an error.
pub async fn run_pipeline(
    client: &ScrapeClient,
    matcher: &ChunkMatcher,
    url: &ProductUrl,
) -> Result<OffersResult, PipelineError> {
    tracing::info!(url = %url, "fetching product page");
    let html = client
        .fetch_product_page(url)
        .await
        .map_err(|e| fail(Stage::PageFetch, e))?;
    tracing::info!(bytes = html.len(), "product page fetched");

    let sku = sku::extract_sku(&html).map_err(|e| fail(Stage::SkuExtract, e))?;
    tracing::info!(sku = %sku, "SKU extracted from JSON-LD");

    let offers_token = token::locate_token(client, matcher, url, &html)
        .await
        .map_err(|e| fail(Stage::TokenLocate, e))?;
    tracing::info!("offers token located");

    let result = offers::fetch_offers(client, &url.origin(), &sku, &offers_token)
        .await
        .map_err(|e| fail(Stage::OffersFetch, e))?;
    tracing::info!(offers = result.offers.len(), "seller offers fetched");

    Ok(result)
}

fn fail(stage: Stage, source: ScrapeError) -> PipelineError {
    if source.is_blocked() {
        tracing::warn!(stage = %stage, error = %source, "anti-bot challenge detected; aborting without retry");
    } else {
        tracing::error!(stage = %stage, error = %source, "stage failed");
    }
    PipelineError { stage, source }
}
