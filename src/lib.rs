//! # Winepress - wine listing export
//!
//! Pulls wine listings produced by a hosted scraping actor, flattens each
//! nested listing into a fixed set of text columns, downloads the label and
//! bottle images, and writes everything to a CSV table.
//!
//! ## Modules
//!
//! - **normalize**: path lookups, list flattening, record mapping and CSV writing
//! - **assets**: image file naming and download
//! - **actor**: starting actor runs, polling their status, paging through datasets
//! - **ingest**: reading a saved dataset from disk
//! - **pipeline**: one complete run from source to table
//!
//! ## Quick Start
//!
//! ```rust
//! use winepress::normalize::{ExportConfig, Normalizer};
//! use winepress::assets::HttpFetcher;
//! use serde_json::json;
//!
//! let item = json!({
//!     "summary": {"name": "Rioja Reserva", "country": "Spain", "price": 18},
//!     "vintage": {"wine": {
//!         "region": {"name": "Rioja"},
//!         "style": {"grapes": [{"name": "Tempranillo"}, {"name": "Graciano"}]}
//!     }}
//! });
//!
//! let normalizer: Normalizer<HttpFetcher> = Normalizer::new(None, ExportConfig::default());
//! let record = normalizer.normalize(&item, 0).unwrap();
//!
//! assert_eq!(record.price, "18");
//! assert_eq!(record.grapes, "Tempranillo, Graciano");
//! ```

use anyhow::Result;
use std::path::Path;

pub mod actor;
pub mod assets;
pub mod config;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod pipeline;

// Re-export commonly used types for convenience
pub use actor::{ApifyClient, CancelToken, JobApi, RunStatus};
pub use assets::{AssetResolver, Fetcher, HttpFetcher};
pub use config::{ActorInput, ApiConfig, Config, PollPolicy};
pub use error::{ApiError, NormalizeError};
pub use normalize::{ExportConfig, HeaderLayout, NormalizedRecord, Normalizer, TextEncoding};
pub use pipeline::{Pipeline, RunSummary, Source};

/// Convert a saved dataset file straight to CSV without downloading images.
/// Returns the number of records written.
pub fn export_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &ExportConfig,
) -> Result<usize> {
    let items = ingest::load_items(input)?;
    let normalizer: Normalizer<HttpFetcher> = Normalizer::new(None, config.clone());
    let report = normalizer.normalize_all(&items);

    normalize::write_table(&report.records, output, config)?;
    Ok(report.records.len())
}
