//! Image download and local file naming
//!
//! [`AssetResolver`] turns a remote image reference into a path under the
//! images directory. The byte transfer itself is behind [`Fetcher`] so the
//! naming rules can be exercised without a network.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

static NON_WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

static SEPARATOR_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Maximum length of the name part of a derived filename, in characters
pub const MAX_STEM_CHARS: usize = 50;

/// Extension used when the URL path has none
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Source of raw image bytes
pub trait Fetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain blocking HTTP fetcher
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        HttpFetcher {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher::new(Duration::from_secs(30))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("Failed to fetch {}", url))?;

        let mut data = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut data)
            .context("Failed to read response body")?;
        Ok(data)
    }
}

/// A remote image and the file name it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub url: String,
    pub file_name: String,
}

impl AssetReference {
    /// Repair the URL and derive the file name. Fails only when the URL
    /// cannot be parsed even after repair.
    pub fn new(raw_url: &str, display_name: &str) -> Result<Self> {
        let url = repair_scheme(raw_url);
        let parsed = Url::parse(&url).with_context(|| format!("Invalid image URL: {}", url))?;
        let file_name = format!("{}{}", file_stem(display_name), extension_of(&parsed));

        Ok(AssetReference {
            url: url.into_owned(),
            file_name,
        })
    }
}

/// Fix the `https//` prefix some listings carry. Nothing else is corrected.
pub fn repair_scheme(url: &str) -> Cow<'_, str> {
    match url.strip_prefix("https//") {
        Some(rest) => Cow::Owned(format!("https://{}", rest)),
        None => Cow::Borrowed(url),
    }
}

/// Derive a filesystem-safe stem from a display name
pub fn file_stem(display_name: &str) -> String {
    let cleaned = NON_WORD_REGEX.replace_all(display_name, "");
    let joined = SEPARATOR_RUN_REGEX.replace_all(&cleaned, "_");
    joined.chars().take(MAX_STEM_CHARS).collect()
}

/// Extension of the URL path including the dot, or `.jpg`
fn extension_of(url: &Url) -> String {
    let last_segment = url.path().rsplit('/').next().unwrap_or("");
    match Path::new(last_segment).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Downloads images into a directory, one file per reference
pub struct AssetResolver<F> {
    fetcher: F,
    images_dir: PathBuf,
}

impl<F: Fetcher> AssetResolver<F> {
    /// Create the resolver, creating `images_dir` if needed
    pub fn new<P: AsRef<Path>>(fetcher: F, images_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&images_dir).context("Failed to create images directory")?;

        Ok(AssetResolver {
            fetcher,
            images_dir: images_dir.as_ref().to_path_buf(),
        })
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Download `url` and return the local path, or an empty string when
    /// there is nothing to download or the download failed.
    pub fn resolve_asset(&self, url: &str, display_name: &str) -> String {
        if url.is_empty() {
            return String::new();
        }

        match self.download(url, display_name) {
            Ok(path) => {
                debug!(path = %path.display(), "saved image");
                path.to_string_lossy().into_owned()
            }
            Err(e) => {
                warn!(name = display_name, error = %format!("{:#}", e), "error downloading image");
                String::new()
            }
        }
    }

    fn download(&self, url: &str, display_name: &str) -> Result<PathBuf> {
        let asset = AssetReference::new(url, display_name)?;
        let data = self.fetcher.fetch_bytes(&asset.url)?;

        let path = self.images_dir.join(&asset.file_name);
        std::fs::write(&path, data)
            .with_context(|| format!("Failed to write image: {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;

    /// Records requested URLs and returns fixed bytes
    #[derive(Default)]
    struct RecordingFetcher {
        requests: RefCell<Vec<String>>,
        fail: bool,
        empty_body: bool,
    }

    impl Fetcher for &RecordingFetcher {
        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            if self.fail {
                bail!("connection reset");
            }
            if self.empty_body {
                return Ok(Vec::new());
            }
            Ok(b"\x89PNG".to_vec())
        }
    }

    #[test]
    fn test_empty_url_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RecordingFetcher::default();
        let resolver = AssetResolver::new(&fetcher, dir.path()).unwrap();

        assert_eq!(resolver.resolve_asset("", "Any Name"), "");
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[test]
    fn test_repairs_scheme_and_derives_name() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RecordingFetcher::default();
        let resolver = AssetResolver::new(&fetcher, dir.path()).unwrap();

        let path = resolver.resolve_asset("https//x.com/a.png", "My Wine!!");

        assert_eq!(path, dir.path().join("My_Wine.png").to_string_lossy());
        assert_eq!(*fetcher.requests.borrow(), vec!["https://x.com/a.png".to_string()]);
        assert_eq!(std::fs::read(dir.path().join("My_Wine.png")).unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_failed_download_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RecordingFetcher {
            fail: true,
            ..Default::default()
        };
        let resolver = AssetResolver::new(&fetcher, dir.path()).unwrap();

        assert_eq!(resolver.resolve_asset("https://x.com/a.png", "Wine"), "");
        assert!(!dir.path().join("Wine.png").exists());
    }

    #[test]
    fn test_empty_body_still_saved() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RecordingFetcher {
            empty_body: true,
            ..Default::default()
        };
        let resolver = AssetResolver::new(&fetcher, dir.path()).unwrap();

        let path = resolver.resolve_asset("https://x.com/a.png", "Wine");

        assert_eq!(path, dir.path().join("Wine.png").to_string_lossy());
        assert!(std::fs::read(dir.path().join("Wine.png")).unwrap().is_empty());
    }

    #[test]
    fn test_unparsable_url_returns_empty_without_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RecordingFetcher::default();
        let resolver = AssetResolver::new(&fetcher, dir.path()).unwrap();

        assert_eq!(resolver.resolve_asset("//images.example.com/a.png", "Wine"), "");
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[test]
    fn test_only_https_prefix_repaired() {
        assert_eq!(repair_scheme("https//x.com/a"), "https://x.com/a");
        assert_eq!(repair_scheme("https://x.com/a"), "https://x.com/a");
        assert_eq!(repair_scheme("http//x.com/a"), "http//x.com/a");
    }

    #[test]
    fn test_file_stem_rules() {
        assert_eq!(file_stem("My Wine!!"), "My_Wine");
        assert_eq!(file_stem("Château  Margaux - 2015"), "Château_Margaux_2015");
        assert_eq!(file_stem("bottle_Tignanello"), "bottle_Tignanello");
        assert_eq!(file_stem(&"a".repeat(80)).chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        let asset = AssetReference::new("https://x.com/thumbs/abc_pb_x300", "Wine").unwrap();
        assert_eq!(asset.file_name, "Wine.jpg");

        let asset = AssetReference::new("https://x.com/a.webp?size=2", "Wine").unwrap();
        assert_eq!(asset.file_name, "Wine.webp");
    }
}
