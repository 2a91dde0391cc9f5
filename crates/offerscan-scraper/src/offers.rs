//! Authenticated request to the marketplace-offers endpoint and response
//! classification.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::json;
use uuid::Uuid;

use offerscan_core::{OffersResult, OffersToken, Sku};

use crate::client::{challenge_marker, ScrapeClient, CHALLENGE_STATUSES};
use crate::error::ScrapeError;

/// Percent-encoding for the `variables` query parameter: unreserved
/// characters pass through, everything else is escaped.
const VARIABLES_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const SESSION_ID_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_";
const SESSION_ID_LEN: usize = 20;

/// Fetch all seller offers for a SKU using the located token.
///
/// The endpoint origin is derived from the product URL, so the pipeline has
/// a single source for the target site.
///
/// # Errors
///
/// - [`ScrapeError::Http`] / [`ScrapeError::UnexpectedStatus`] — transport.
/// - [`ScrapeError::Blocked`] — challenge status or challenge-signature body.
/// - [`ScrapeError::NotFound`] — body is not JSON, or the JSON lacks the
///   `data.marketplace` envelope. An empty or absent offers array inside a
///   present envelope is NOT an error: "no competing sellers" is a
///   legitimate outcome and yields zero records.
pub async fn fetch_offers(
    client: &ScrapeClient,
    origin: &str,
    sku: &Sku,
    token: &OffersToken,
) -> Result<OffersResult, ScrapeError> {
    let url = offers_url(origin, sku, token);
    let session_id = session_id();
    let render_view_id = Uuid::new_v4().to_string();
    let baggage = format!(
        "trafficType=customer,deviceType=desktop,renderScope=SSR,\
         webRequestSource=Browser,pageName=itemPage,\
         isomorphicSessionId={session_id},renderViewId={render_view_id}"
    );

    let response = client
        .client
        .get(&url)
        .header("accept", "application/json")
        .header("accept-language", &client.accept_language)
        .header("baggage", baggage)
        .header("content-type", "application/json")
        .header("referer", &url)
        .header("user-agent", &client.user_agent)
        .header("wm_mp", "true")
        .header("wm_page_url", &url)
        .header("x-apollo-operation-name", "GetAllSellerOffers")
        .header("x-o-bu", "WALMART-US")
        .header("x-o-gql-query", "query GetAllSellerOffers")
        .header("x-o-mart", "B2C")
        .header("x-o-platform", "rweb")
        .header("x-o-segment", "oaoh")
        .send()
        .await?;

    let status = response.status().as_u16();
    if CHALLENGE_STATUSES.contains(&status) {
        return Err(ScrapeError::Blocked {
            url,
            marker: format!("http {status}"),
        });
    }
    if !response.status().is_success() {
        return Err(ScrapeError::UnexpectedStatus { status, url });
    }

    let body = response.text().await?;
    if let Some(marker) = challenge_marker(&body) {
        return Err(ScrapeError::Blocked {
            url,
            marker: marker.to_string(),
        });
    }

    classify_offers_body(sku, &body)
}

/// Build the offers endpoint URL: token as a path segment, request
/// variables as a percent-encoded compact-JSON query parameter.
pub(crate) fn offers_url(origin: &str, sku: &Sku, token: &OffersToken) -> String {
    let variables = json!({
        "itemId": sku.as_str(),
        "isSubscriptionEligible": true,
        "conditionCodes": [1],
        "allOffersSource": "MORE_SELLER_OPTIONS",
    });
    let encoded = utf8_percent_encode(&variables.to_string(), VARIABLES_ENCODE_SET).to_string();
    format!(
        "{origin}/orchestra/home/graphql/GetAllSellerOffers/{token}?variables={encoded}",
        token = token.as_str()
    )
}

/// Classify a 2xx offers-endpoint body.
pub(crate) fn classify_offers_body(sku: &Sku, body: &str) -> Result<OffersResult, ScrapeError> {
    let payload: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ScrapeError::NotFound {
            what: "offers payload",
            detail: format!("response is not valid JSON: {e}"),
        })?;

    let Some(marketplace) = payload.get("data").and_then(|d| d.get("marketplace")) else {
        return Err(ScrapeError::NotFound {
            what: "offers payload",
            detail: "response JSON lacks the data.marketplace envelope".to_string(),
        });
    };

    // Upstream order preserved; absent array means zero competing sellers.
    let offers = marketplace
        .get("offers")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(OffersResult {
        sku: sku.clone(),
        offers,
        payload,
    })
}

/// Per-request random session identifier carried in the `baggage` header.
fn session_id() -> String {
    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rand::random_range(0..SESSION_ID_CHARS.len());
            SESSION_ID_CHARS[idx] as char
        })
        .collect()
}

#[cfg(test)]
#[path = "offers_test.rs"]
mod tests;
