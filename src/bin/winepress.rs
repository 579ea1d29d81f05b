//! winepress: export wine listings from the scraping actor to CSV
//!
//! Usage:
//!   # Start an actor run (API_TOKEN from the environment or .env)
//!   winepress
//!
//!   # Convert a saved dataset instead of scraping
//!   winepress --input sample-response.json
//!
//!   # Skip image downloads, export both image columns
//!   winepress --input sample-response.json --no-images --extended-columns

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Result};
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use winepress::{
    ActorInput, ApiConfig, ApifyClient, Config, HeaderLayout, HttpFetcher, Pipeline, Source,
    TextEncoding,
};

#[derive(Parser, Debug)]
#[command(name = "winepress")]
#[command(about = "Export wine listings from the scraping actor to CSV", long_about = None)]
struct Args {
    /// Read items from a saved dataset file instead of starting an actor run
    #[arg(long, short = 'i', value_name = "FILE")]
    input: Option<PathBuf>,

    /// CSV file to write
    #[arg(long, short = 'o', default_value = "wines_data.csv")]
    output: PathBuf,

    /// Directory downloaded images are written to
    #[arg(long, default_value = "images")]
    images_dir: PathBuf,

    /// Don't download images; image columns stay empty
    #[arg(long)]
    no_images: bool,

    /// Write image_url and bottle_image_url instead of the single legacy image column
    #[arg(long)]
    extended_columns: bool,

    /// Replace non-ASCII characters in the export with '?'
    #[arg(long)]
    ascii: bool,

    /// API token (defaults to API_TOKEN)
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON file overriding the actor input parameters
    #[arg(long, value_name = "FILE")]
    actor_input: Option<PathBuf>,

    /// Seconds between run status checks
    #[arg(long, default_value_t = 30)]
    poll_interval: u64,

    /// Stop polling after this many status checks
    #[arg(long)]
    max_polls: Option<u32>,

    /// Items requested per dataset page
    #[arg(long, default_value = "1000")]
    page_size: NonZeroUsize,
}

fn main() -> Result<()> {
    // A missing .env is fine; the token may come from the environment or flags
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let args = Args::parse();

    let source = match &args.input {
        Some(path) => Source::LocalFile(path.clone()),
        None => Source::Remote,
    };
    let token = match (&source, args.token) {
        (_, Some(token)) => token,
        (Source::LocalFile(_), None) => String::new(),
        (Source::Remote, None) => bail!("API_TOKEN is not set; pass --token or use --input"),
    };

    // Build config
    let mut config = Config::new(ApiConfig::new(token));
    if let Some(path) = &args.actor_input {
        config.actor_input = ActorInput::from_file(path)?;
    }
    config.poll.interval = Duration::from_secs(args.poll_interval);
    config.poll.max_attempts = args.max_polls;
    config.page_limit = args.page_size.get();
    config.images_dir = args.images_dir;
    config.output_path = args.output;
    config.download_images = !args.no_images;
    if args.extended_columns {
        config.export.layout = HeaderLayout::Extended;
    }
    if args.ascii {
        config.export.encoding = TextEncoding::Ascii;
    }

    let api = ApifyClient::new(config.api.clone());
    let summary = Pipeline::new(api, HttpFetcher::default(), config).run(source)?;

    println!("Total wines processed: {}", summary.exported);
    if !summary.skipped.is_empty() {
        println!("Skipped {} malformed items", summary.skipped.len());
    }

    Ok(())
}
