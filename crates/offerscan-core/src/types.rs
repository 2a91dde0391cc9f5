//! Domain types shared across the extraction pipeline.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid product URL \"{url}\": {reason}")]
    InvalidProductUrl { url: String, reason: String },

    #[error("invalid SKU \"{value}\": {reason}")]
    InvalidSku { value: String, reason: String },

    #[error("invalid offers token: {reason}")]
    InvalidToken { reason: String },
}

/// A validated product-page URL.
///
/// Only URLs with the product-page path shape `/ip/<slug>/<numeric item id>`
/// are accepted, so malformed input is rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUrl(String);

impl ProductUrl {
    /// Validate and wrap a raw URL string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidProductUrl`] when the URL is not http(s),
    /// has no host, or its path does not look like a product page.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| CoreError::InvalidProductUrl {
            url: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| invalid("expected an http(s) URL"))?;

        let (host, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing product page path"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        // Drop query string and fragment before inspecting the path.
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["ip", middle @ .., item_id] if !middle.is_empty() => {
                if item_id.is_empty() || !item_id.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("item id segment is not numeric"));
                }
            }
            _ => return Err(invalid("path does not match /ip/<slug>/<item id>")),
        }

        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme plus host (and port, if any), without a trailing slash.
    #[must_use]
    pub fn origin(&self) -> String {
        let (scheme, rest) = self
            .0
            .split_once("://")
            .unwrap_or(("https", self.0.as_str()));
        let host = rest.split('/').next().unwrap_or(rest);
        format!("{scheme}://{host}")
    }

    /// The numeric item-id segment at the end of the path.
    #[must_use]
    pub fn item_id(&self) -> &str {
        self.0
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.0)
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

impl std::fmt::Display for ProductUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The retailer's catalog identifier for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sku(String);

impl Sku {
    const MAX_LEN: usize = 32;

    /// Validate a raw identifier against the expected SKU shape:
    /// non-empty, alphanumeric (hyphens allowed), length-capped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSku`] when the shape does not hold.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let value = raw.trim();
        let invalid = |reason: &str| CoreError::InvalidSku {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if value.is_empty() {
            return Err(invalid("empty"));
        }
        if value.len() > Self::MAX_LEN {
            return Err(invalid("longer than expected for a catalog identifier"));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(invalid("contains characters outside [A-Za-z0-9-]"));
        }

        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived credential for the marketplace-offers sub-API.
///
/// Scoped to one pipeline run; never cached across invocations.
#[derive(Clone, PartialEq, Eq)]
pub struct OffersToken(String);

impl OffersToken {
    /// Validate a raw token: non-empty and alphanumeric.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidToken`] when the shape does not hold.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(CoreError::InvalidToken {
                reason: "empty".to_string(),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidToken {
                reason: "contains non-alphanumeric characters".to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Credential: keep the full value out of Debug output.
impl std::fmt::Debug for OffersToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown: String = self.0.chars().take(6).collect();
        write!(f, "OffersToken({shown}…)")
    }
}

/// The terminal artifact of one run: the upstream offers payload plus the
/// SKU it was fetched for.
///
/// `payload` is the API response passed through verbatim; `offers` is the
/// array found at `data.marketplace.offers`, in upstream order. The offer
/// schema is owned by the external API and treated as opaque.
#[derive(Debug, Clone, Serialize)]
pub struct OffersResult {
    pub sku: Sku,
    pub offers: Vec<serde_json::Value>,
    pub payload: serde_json::Value,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
