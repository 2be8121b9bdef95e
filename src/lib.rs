pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod store;
pub mod utils;

pub use config::AppConfig;
pub use error::*;
pub use history::{ChartData, FlattenedHistory, GameTooltip, Matchup, TeamSeries};
pub use models::*;
pub use pipeline::{CurrentBatch, DashboardData, Pipeline};
pub use scrapers::*;
pub use store::Store;
pub use utils::*;

use anyhow::{Context, Result};
use chrono::Local;

/// Open the store and wire the live scrapers (behind the JSON cache) into a pipeline
pub async fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let scraped = ScrapedSource::new(&config.slate_url, &config.picks_url)
        .context("Failed to build HTTP client")?;
    let source = CachedSource::new(scraped, &config.cache_dir, config.use_cache);

    Ok(Pipeline::new(Box::new(source), store))
}

/// Refresh the dashboard for the pool week containing today.
/// `Ok(None)` means another refresh was already running.
pub async fn refresh_current_week(pipeline: &Pipeline) -> Result<Option<DashboardData>> {
    let window = current_week_window(Local::now().date_naive());
    match pipeline.refresh(window).await {
        Some(result) => result
            .map(Some)
            .with_context(|| format!("Failed to refresh {}..{}", window.start, window.end)),
        None => Ok(None),
    }
}
