//! One complete run: obtain raw items, normalize them, write the table

use crate::actor::{fetch_all_items, wait_for_completion, CancelToken, JobApi};
use crate::assets::{AssetResolver, Fetcher};
use crate::config::Config;
use crate::error::NormalizeError;
use crate::ingest::load_items;
use crate::normalize::{write_table, Normalizer};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info};

/// Where raw items come from
#[derive(Debug, Clone)]
pub enum Source {
    /// Start an actor run and read its dataset
    Remote,
    /// Read a previously saved dataset from disk
    LocalFile(PathBuf),
}

/// Totals of a finished run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Raw items obtained from the source
    pub fetched: usize,

    /// Records written to the table
    pub exported: usize,

    /// Items dropped during normalization, by input index
    pub skipped: Vec<(usize, NormalizeError)>,

    /// The table that was written, if any
    pub output: Option<PathBuf>,
}

/// Runs the scrape workflow against a job API and an image fetcher
pub struct Pipeline<A, F> {
    api: A,
    fetcher: F,
    config: Config,
    cancel: CancelToken,
}

impl<A: JobApi, F: Fetcher> Pipeline<A, F> {
    pub fn new(api: A, fetcher: F, config: Config) -> Self {
        Pipeline {
            api,
            fetcher,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops the status poll loop of this pipeline
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run start to finish. Only export I/O errors are returned; every other
    /// failure is logged and reflected in the summary.
    pub fn run(self, source: Source) -> Result<RunSummary> {
        info!("Starting Vivino wine scraping...");

        let raw_items = match self.obtain_items(&source) {
            Some(items) => items,
            None => return Ok(RunSummary::default()),
        };
        let mut summary = RunSummary {
            fetched: raw_items.len(),
            ..Default::default()
        };

        let Pipeline { fetcher, config, .. } = self;

        let assets = if config.download_images {
            Some(AssetResolver::new(fetcher, &config.images_dir)?)
        } else {
            None
        };

        info!("Processing wine data and downloading images...");
        let normalizer = Normalizer::new(assets, config.export.clone());
        let report = normalizer.normalize_all(&raw_items);
        summary.skipped = report.skipped;

        info!("Saving data to CSV...");
        if write_table(&report.records, &config.output_path, &config.export)? {
            summary.exported = report.records.len();
            summary.output = Some(config.output_path.clone());
        }

        info!(
            fetched = summary.fetched,
            exported = summary.exported,
            skipped = summary.skipped.len(),
            "Wine scraping completed"
        );
        if config.download_images {
            info!("Images saved to: {}", config.images_dir.display());
        }
        if let Some(output) = &summary.output {
            info!("CSV file saved as: {}", output.display());
        }

        Ok(summary)
    }

    fn obtain_items(&self, source: &Source) -> Option<Vec<Value>> {
        match source {
            Source::LocalFile(path) => match load_items(path) {
                Ok(items) => {
                    info!("Loaded {} items from {}", items.len(), path.display());
                    Some(items)
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "error loading dataset items from file");
                    None
                }
            },
            Source::Remote => self.fetch_remote(),
        }
    }

    fn fetch_remote(&self) -> Option<Vec<Value>> {
        let run_id = match self.api.start_run(&self.config.actor_input) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to start scraping!");
                return None;
            }
        };
        info!("Started scraping with run ID: {}", run_id);

        let Some(dataset_id) = wait_for_completion(&self.api, &run_id, &self.config.poll, &self.cancel)
        else {
            error!("Scraping did not complete successfully!");
            return None;
        };

        info!("Fetching wine data from dataset...");
        let items = fetch_all_items(&self.api, &dataset_id, self.config.page_limit);
        info!("Retrieved {} wine records", items.len());
        Some(items)
    }
}
