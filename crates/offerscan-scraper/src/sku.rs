//! SKU extraction from schema.org JSON-LD product markup.

use regex::Regex;

use offerscan_core::Sku;

use crate::error::ScrapeError;

/// Extract the product SKU from the page's JSON-LD structured data.
///
/// Scans `<script type="application/ld+json">` blocks in document order,
/// parses each as JSON (accepting a top-level object, array, or `@graph`
/// container), and returns the first `"sku"` value found, validated against
/// the SKU shape.
///
/// # Errors
///
/// Returns [`ScrapeError::NotFound`] when no JSON-LD block exists, none
/// parses as JSON, no node carries a `sku` key, or the value fails shape
/// validation. The `detail` distinguishes the cases for diagnosis.
pub fn extract_sku(html: &str) -> Result<Sku, ScrapeError> {
    let script_re = Regex::new(
        r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
    )
    .expect("valid regex");

    let not_found = |detail: String| ScrapeError::NotFound {
        what: "product SKU",
        detail,
    };

    let mut saw_block = false;
    let mut parse_failure: Option<String> = None;

    for cap in script_re.captures_iter(html) {
        let Some(json_text) = cap.get(1) else {
            continue;
        };
        saw_block = true;

        let value: serde_json::Value = match serde_json::from_str(json_text.as_str().trim()) {
            Ok(v) => v,
            Err(e) => {
                parse_failure = Some(e.to_string());
                continue;
            }
        };

        for node in candidate_nodes(value) {
            if let Some(raw) = node.get("sku").and_then(sku_value) {
                return Sku::parse(&raw).map_err(|e| not_found(e.to_string()));
            }
        }
    }

    if !saw_block {
        return Err(not_found(
            "no application/ld+json block in page".to_string(),
        ));
    }
    if let Some(parse_error) = parse_failure {
        return Err(not_found(format!(
            "JSON-LD block is not valid JSON: {parse_error}"
        )));
    }
    Err(not_found("no sku field in JSON-LD data".to_string()))
}

/// Flatten a parsed JSON-LD document into the nodes that may carry a SKU.
///
/// Top-level arrays are walked element-by-element; `@graph` containers are
/// expanded one level, which is how sites commonly wrap structured data.
fn candidate_nodes(value: serde_json::Value) -> Vec<serde_json::Value> {
    let mut nodes: Vec<serde_json::Value> = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut expanded = Vec::new();
    for node in &nodes {
        if let Some(graph) = node.get("@graph").and_then(serde_json::Value::as_array) {
            expanded.extend(graph.iter().cloned());
        }
    }
    nodes.extend(expanded);
    nodes
}

/// The `sku` field may be a string or a bare integer in the wild.
fn sku_value(v: &serde_json::Value) -> Option<String> {
    v.as_str()
        .map(str::to_string)
        .or_else(|| v.as_u64().map(|n| n.to_string()))
}

#[cfg(test)]
#[path = "sku_test.rs"]
mod tests;
