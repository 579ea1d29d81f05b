use crate::normalize::ExportConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.apify.com/v2";
pub const DEFAULT_ACTOR_ID: &str = "canadesk~vivino-bulk";

/// Credentials and endpoint of the job control API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub token: String,
    pub base_url: String,
    pub actor_id: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(token: impl Into<String>) -> Self {
        ApiConfig {
            token: token.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            actor_id: DEFAULT_ACTOR_ID.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Proxy settings passed through to the actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    pub use_apify_proxy: bool,
    pub apify_proxy_groups: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            use_apify_proxy: true,
            apify_proxy_groups: vec!["RESIDENTIAL".to_string()],
        }
    }
}

/// Job parameters sent when starting the scraping actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorInput {
    pub process: String,
    pub market: String,
    pub winetypes: Vec<String>,
    pub grapetypes: Vec<String>,
    pub foodtypes: Vec<String>,
    pub proxy: ProxyConfig,
    pub sortby: String,

    /// Cap on the number of results
    pub maximum: u32,

    /// Politeness delay between actor requests, in seconds
    pub delay: u32,
    pub ratingmin: String,
    pub retries: u32,
    pub pricemax: u32,
    pub pricemin: u32,
    pub allreviews: bool,
}

impl Default for ActorInput {
    fn default() -> Self {
        ActorInput {
            process: "ge".to_string(),
            market: "SG".to_string(),
            winetypes: ["Red", "White", "Rose", "Sparkling", "Dessert", "Fortified"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            grapetypes: vec![],
            foodtypes: vec![],
            proxy: ProxyConfig::default(),
            sortby: "ratings_count".to_string(),
            maximum: 10000,
            delay: 2,
            ratingmin: "3.2".to_string(),
            retries: 3,
            pricemax: 70,
            pricemin: 10,
            allreviews: false,
        }
    }
}

impl ActorInput {
    /// Read actor input from a JSON file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read actor input: {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse actor input")
    }
}

/// How the status of a run is polled
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Fixed wait between status checks
    pub interval: Duration,

    /// Give up after this many checks (None = poll until a terminal status)
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

/// Everything a run needs, passed explicitly at construction
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub actor_input: ActorInput,
    pub poll: PollPolicy,

    /// Items requested per dataset page
    pub page_limit: usize,

    /// Directory downloaded images are written to
    pub images_dir: PathBuf,

    /// Destination of the CSV export
    pub output_path: PathBuf,

    /// Whether images are downloaded at all
    pub download_images: bool,

    pub export: ExportConfig,
}

impl Config {
    pub fn new(api: ApiConfig) -> Self {
        Config {
            api,
            actor_input: ActorInput::default(),
            poll: PollPolicy::default(),
            page_limit: 1000,
            images_dir: PathBuf::from("images"),
            output_path: PathBuf::from("wines_data.csv"),
            download_images: true,
            export: ExportConfig::default(),
        }
    }
}
