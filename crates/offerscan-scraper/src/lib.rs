pub mod client;
pub mod error;
pub mod offers;
pub mod pipeline;
pub mod sku;
pub mod token;

pub use client::ScrapeClient;
pub use error::ScrapeError;
pub use pipeline::{run_pipeline, PipelineError, Stage};
pub use token::ChunkMatcher;
