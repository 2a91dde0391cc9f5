//! HTTP client with a browser-like identity.
//!
//! The target site serves degraded markup (or a challenge page) to default
//! client identities, so every request carries the header set a desktop
//! Chrome would send.

use std::time::Duration;

use offerscan_core::{AppConfig, ProductUrl};

use crate::error::ScrapeError;

const SEC_CH_UA: &str = r#""Not)A;Brand";v="8", "Chromium";v="138", "Google Chrome";v="138""#;

/// Response body markers of known anti-bot challenge pages.
///
/// Matched case-insensitively against 2xx bodies: the defense substitutes a
/// challenge page for real content rather than failing the request.
const CHALLENGE_MARKERS: &[&str] = &[
    "robot or human",
    "px-captcha",
    "/blocked?url=",
    "press & hold",
    "are you a human",
];

/// HTTP statuses the anti-bot layer answers with instead of content.
pub(crate) const CHALLENGE_STATUSES: &[u16] = &[403, 412];

pub struct ScrapeClient {
    pub(crate) client: reqwest::Client,
    pub(crate) user_agent: String,
    pub(crate) accept_language: String,
}

impl ScrapeClient {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(config: &AppConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        })
    }

    /// Fetch the product page HTML.
    ///
    /// No retries here; retry policy (there is none) belongs to the
    /// orchestrator.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Http`] — transport failure or timeout.
    /// - [`ScrapeError::UnexpectedStatus`] — non-2xx outside the challenge set.
    /// - [`ScrapeError::Blocked`] — challenge status, or a 2xx body carrying a
    ///   challenge signature.
    pub async fn fetch_product_page(&self, url: &ProductUrl) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url.as_str())
            .header("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("accept-language", &self.accept_language)
            .header("cache-control", "no-cache")
            .header("pragma", "no-cache")
            .header("referer", format!("{}/", url.origin()))
            .header("sec-ch-ua", SEC_CH_UA)
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", "\"Windows\"")
            .header("sec-fetch-dest", "document")
            .header("sec-fetch-mode", "navigate")
            .header("sec-fetch-site", "none")
            .header("user-agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status().as_u16();
        if CHALLENGE_STATUSES.contains(&status) {
            return Err(ScrapeError::Blocked {
                url: url.as_str().to_string(),
                marker: format!("http {status}"),
            });
        }
        if !response.status().is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status,
                url: url.as_str().to_string(),
            });
        }

        let body = response.text().await?;
        if let Some(marker) = challenge_marker(&body) {
            return Err(ScrapeError::Blocked {
                url: url.as_str().to_string(),
                marker: marker.to_string(),
            });
        }
        Ok(body)
    }

    /// Fetch a script-chunk body referenced by the product page.
    ///
    /// # Errors
    ///
    /// Same classification as [`Self::fetch_product_page`].
    pub async fn fetch_script_chunk(
        &self,
        url: &str,
        referer: &str,
    ) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .header("accept", "*/*")
            .header("accept-language", &self.accept_language)
            .header("referer", referer)
            .header("sec-fetch-dest", "script")
            .header("sec-fetch-mode", "no-cors")
            .header("user-agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status().as_u16();
        if CHALLENGE_STATUSES.contains(&status) {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
                marker: format!("http {status}"),
            });
        }
        if !response.status().is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status,
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        if let Some(marker) = challenge_marker(&body) {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
                marker: marker.to_string(),
            });
        }
        Ok(body)
    }
}

/// Return the challenge signature a body matches, if any.
pub(crate) fn challenge_marker(body: &str) -> Option<&'static str> {
    let lowered = body.to_ascii_lowercase();
    CHALLENGE_MARKERS
        .iter()
        .find(|marker| lowered.contains(**marker))
        .copied()
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
