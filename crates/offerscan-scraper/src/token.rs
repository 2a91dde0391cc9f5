//! Offers-token discovery inside dynamically-named script chunks.
//!
//! The token is not in the main document: it lives in one of the feature
//! chunks the page references by hashed filename. The naming convention is
//! versioned and undocumented, so the matching rules are isolated in
//! [`ChunkMatcher`] and can be updated without touching pipeline control
//! flow.

use regex::Regex;

use offerscan_core::{OffersToken, ProductUrl};

use crate::client::ScrapeClient;
use crate::error::ScrapeError;

/// Pluggable matching rules for the token hunt: which script srcs are
/// candidates, and what a token looks like inside a chunk body.
pub struct ChunkMatcher {
    src: Regex,
    token: Vec<Regex>,
}

impl Default for ChunkMatcher {
    fn default() -> Self {
        // Filename prefix match: the marketplace feature chunks carry a
        // deployment-specific hash segment, so only the prefix is stable.
        let src = Regex::new(r"(?:^|/)marketplace[^/]*\.js(?:[?#][^/]*)?$").expect("valid regex");

        // The token is the persisted-query hash registered next to the
        // GetAllSellerOffers operation name; field order varies by bundler.
        let token = vec![
            Regex::new(r#"(?s)["']GetAllSellerOffers["'][^{}]{0,200}?hash\s*:\s*["']([A-Za-z0-9]{8,})["']"#)
                .expect("valid regex"),
            Regex::new(r#"(?s)hash\s*:\s*["']([A-Za-z0-9]{8,})["'][^{}]{0,200}?["']GetAllSellerOffers["']"#)
                .expect("valid regex"),
        ];

        Self { src, token }
    }
}

impl ChunkMatcher {
    #[must_use]
    pub fn new(src: Regex, token: Vec<Regex>) -> Self {
        Self { src, token }
    }

    /// Script srcs referenced by the page that match the candidate pattern,
    /// in document order.
    #[must_use]
    pub fn candidate_srcs(&self, html: &str) -> Vec<String> {
        let script_src_re =
            Regex::new(r#"(?is)<script[^>]+src\s*=\s*["']([^"']+)["']"#).expect("valid regex");

        script_src_re
            .captures_iter(html)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|src| self.src.is_match(src))
            .collect()
    }

    /// First token captured from a chunk body, if any pattern matches.
    #[must_use]
    pub fn match_token(&self, body: &str) -> Option<String> {
        self.token
            .iter()
            .filter_map(|re| re.captures(body))
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
            .next()
    }
}

/// Locate the offers-access token for the given product page.
///
/// Fetches candidate chunks strictly in document order and stops at the
/// first body a token pattern matches — later candidates are never
/// consulted (first-match policy, trading exhaustiveness for latency).
///
/// # Errors
///
/// - [`ScrapeError::NotFound`] — no candidate srcs in the page, or every
///   fetched chunk lacked the token pattern.
/// - [`ScrapeError::Blocked`] — a chunk response was a challenge page;
///   propagated immediately.
/// - Transport errors on individual candidates are skipped; if every fetch
///   failed at the transport level the last such error is returned.
pub async fn locate_token(
    client: &ScrapeClient,
    matcher: &ChunkMatcher,
    page_url: &ProductUrl,
    html: &str,
) -> Result<OffersToken, ScrapeError> {
    let candidates = matcher.candidate_srcs(html);
    if candidates.is_empty() {
        return Err(ScrapeError::NotFound {
            what: "offers token",
            detail: "page references no marketplace script chunks".to_string(),
        });
    }
    tracing::debug!(count = candidates.len(), "marketplace chunk candidates found");

    let mut fetched_any = false;
    let mut last_transport: Option<ScrapeError> = None;

    for src in candidates {
        let chunk_url = resolve_src(page_url, &src);
        match client.fetch_script_chunk(&chunk_url, page_url.as_str()).await {
            Ok(body) => {
                fetched_any = true;
                if let Some(raw) = matcher.match_token(&body) {
                    tracing::debug!(chunk = %chunk_url, "token pattern matched");
                    return OffersToken::parse(&raw).map_err(|e| ScrapeError::NotFound {
                        what: "offers token",
                        detail: e.to_string(),
                    });
                }
                tracing::debug!(chunk = %chunk_url, "no token in chunk; trying next candidate");
            }
            Err(err) if err.is_blocked() => return Err(err),
            Err(err) => {
                tracing::debug!(chunk = %chunk_url, error = %err, "chunk fetch failed; trying next candidate");
                last_transport = Some(err);
            }
        }
    }

    match last_transport {
        Some(err) if !fetched_any => Err(err),
        _ => Err(ScrapeError::NotFound {
            what: "offers token",
            detail: "no candidate chunk contained the token pattern".to_string(),
        }),
    }
}

/// Resolve a script src against the page it was referenced from.
fn resolve_src(page_url: &ProductUrl, src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }
    let origin = page_url.origin();
    if let Some(rest) = src.strip_prefix("//") {
        let scheme = origin.split("://").next().unwrap_or("https");
        return format!("{scheme}://{rest}");
    }
    if src.starts_with('/') {
        return format!("{origin}{src}");
    }
    format!("{origin}/{src}")
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
