use thiserror::Error;

/// Outcome taxonomy shared by every pipeline stage.
///
/// Each stage returns this through an ordinary `Result` so the orchestrator
/// can apply one decision rule everywhere: transport failures and unexpected
/// statuses abort, `Blocked` aborts with a warning (never retried), and
/// `NotFound` means the response was served but lacked the expected data.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("blocked by anti-bot challenge at {url} (matched \"{marker}\")")]
    Blocked { url: String, marker: String },

    #[error("{what} not found: {detail}")]
    NotFound {
        what: &'static str,
        detail: String,
    },
}

impl ScrapeError {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::UnexpectedStatus { .. })
    }
}
