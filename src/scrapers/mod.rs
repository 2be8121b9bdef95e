pub mod espn_picks;
pub mod sportsbook;

pub use espn_picks::{consensus, ExpertPicksScraper};
pub use sportsbook::SportsbookScraper;

use crate::error::FetchError;
use crate::models::{RawPick, RawRow};
use crate::utils::data::{load_from_cache, save_to_cache};
use async_trait::async_trait;
use std::path::PathBuf;

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Where the pipeline gets its raw rows from
#[async_trait]
pub trait SlateSource: Send + Sync {
    /// Every game currently listed by the sportsbook
    async fn fetch_slate(&self) -> Result<Vec<RawRow>, FetchError>;

    /// Expert pick grid for the current week
    async fn fetch_expert_picks(&self) -> Result<Vec<RawPick>, FetchError>;
}

/// Live pages: sportsbook slate plus the expert picks grid
pub struct ScrapedSource {
    sportsbook: SportsbookScraper,
    picks: ExpertPicksScraper,
}

impl ScrapedSource {
    pub fn new(slate_url: &str, picks_url: &str) -> Result<Self, FetchError> {
        Ok(Self {
            sportsbook: SportsbookScraper::new(slate_url)?,
            picks: ExpertPicksScraper::new(picks_url)?,
        })
    }
}

#[async_trait]
impl SlateSource for ScrapedSource {
    async fn fetch_slate(&self) -> Result<Vec<RawRow>, FetchError> {
        self.sportsbook.fetch_rows().await
    }

    async fn fetch_expert_picks(&self) -> Result<Vec<RawPick>, FetchError> {
        self.picks.fetch_picks().await
    }
}

/// Fixed rows, e.g. a slate saved to disk earlier
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub rows: Vec<RawRow>,
    pub picks: Vec<RawPick>,
}

impl StaticSource {
    pub fn new(rows: Vec<RawRow>, picks: Vec<RawPick>) -> Self {
        Self { rows, picks }
    }
}

#[async_trait]
impl SlateSource for StaticSource {
    async fn fetch_slate(&self) -> Result<Vec<RawRow>, FetchError> {
        Ok(self.rows.clone())
    }

    async fn fetch_expert_picks(&self) -> Result<Vec<RawPick>, FetchError> {
        Ok(self.picks.clone())
    }
}

/// Serves from JSON cache files when `use_cache` is set and the file exists,
/// otherwise fetches from `inner` and refreshes the cache
pub struct CachedSource<S> {
    inner: S,
    cache_dir: PathBuf,
    use_cache: bool,
}

impl<S: SlateSource> CachedSource<S> {
    pub fn new(inner: S, cache_dir: impl Into<PathBuf>, use_cache: bool) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.into(),
            use_cache,
        }
    }

    fn slate_cache(&self) -> PathBuf {
        self.cache_dir.join("slate_cache.json")
    }

    fn picks_cache(&self) -> PathBuf {
        self.cache_dir.join("picks_cache.json")
    }
}

#[async_trait]
impl<S: SlateSource> SlateSource for CachedSource<S> {
    async fn fetch_slate(&self) -> Result<Vec<RawRow>, FetchError> {
        let cache_file = self.slate_cache();
        if self.use_cache && cache_file.exists() {
            tracing::info!("Loading slate from cache file: {}", cache_file.display());
            return load_from_cache(&cache_file).map_err(|e| FetchError::Cache(format!("{:#}", e)));
        }

        let rows = self.inner.fetch_slate().await?;
        if let Err(e) = save_to_cache(&rows, &cache_file) {
            tracing::warn!("Could not save slate cache: {:#}", e);
        }
        Ok(rows)
    }

    async fn fetch_expert_picks(&self) -> Result<Vec<RawPick>, FetchError> {
        let cache_file = self.picks_cache();
        if self.use_cache && cache_file.exists() {
            tracing::info!("Loading expert picks from cache file: {}", cache_file.display());
            return load_from_cache(&cache_file).map_err(|e| FetchError::Cache(format!("{:#}", e)));
        }

        let picks = self.inner.fetch_expert_picks().await?;
        if let Err(e) = save_to_cache(&picks, &cache_file) {
            tracing::warn!("Could not save picks cache: {:#}", e);
        }
        Ok(picks)
    }
}
