use crate::error::PipelineError;
use crate::history::{matchups, tooltip_for, ChartData, FlattenedHistory, GameTooltip, Matchup};
use crate::models::{ExpertConsensus, GameRecord};
use crate::scrapers::{consensus, SlateSource};
use crate::store::{LogReport, Store};
use crate::utils::{normalize_rows, rank_games, DateWindow, RowIssue};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::Mutex;

/// One scrape, normalized, ranked and logged
#[derive(Debug, Clone, Serialize)]
pub struct CurrentBatch {
    pub window: DateWindow,
    pub games: Vec<GameRecord>,
    pub issues: Vec<RowIssue>,
    pub log: LogReport,
}

/// Everything the dashboard shows after one refresh cycle
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub window: DateWindow,
    pub games: Vec<GameRecord>,
    pub tooltips: Vec<GameTooltip>,
    pub matchups: Vec<Matchup>,
    pub charts: ChartData,
    pub expert_picks: Vec<ExpertConsensus>,
    pub issues: Vec<RowIssue>,
    pub refreshed_at: NaiveDateTime,
}

pub struct Pipeline {
    source: Box<dyn SlateSource>,
    store: Store,
    in_flight: Mutex<()>,
}

impl Pipeline {
    pub fn new(source: Box<dyn SlateSource>, store: Store) -> Self {
        Self {
            source,
            store,
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Fetch, normalize and rank the slate for `start..=end` (ISO dates) and
    /// log every game whose odds or points changed
    pub async fn get_data(&self, start: &str, end: &str) -> Result<CurrentBatch, PipelineError> {
        let window = DateWindow::parse(start, end)?;
        self.get_batch_at(window, Local::now().naive_local()).await
    }

    pub async fn get_batch_at(
        &self,
        window: DateWindow,
        now: NaiveDateTime,
    ) -> Result<CurrentBatch, PipelineError> {
        let rows = self.source.fetch_slate().await?;
        let scraped = rows.len();

        let normalized = normalize_rows(rows, &window);
        for issue in &normalized.issues {
            if issue.dropped {
                tracing::warn!(
                    "Dropped {} vs {}: {}",
                    issue.home_team,
                    issue.away_team,
                    issue.reason
                );
            } else {
                tracing::warn!(
                    "{} vs {}: {}",
                    issue.home_team,
                    issue.away_team,
                    issue.reason
                );
            }
        }

        let games = rank_games(normalized.records);
        let log = self.store.record_if_changed_at(&games, now).await;

        tracing::info!(
            "Slate {}..{}: {} scraped, {} in window, {} new log entries",
            window.start,
            window.end,
            scraped,
            games.len(),
            log.inserted
        );

        Ok(CurrentBatch {
            window,
            games,
            issues: normalized.issues,
            log,
        })
    }

    /// Log entries observed between the start of `start` and the end of `end` (ISO dates)
    pub async fn load_historical_data(
        &self,
        start: &str,
        end: &str,
    ) -> Result<FlattenedHistory, PipelineError> {
        let window = DateWindow::parse(start, end)?;
        self.load_window(&window).await
    }

    async fn load_window(&self, window: &DateWindow) -> Result<FlattenedHistory, PipelineError> {
        let entries = self
            .store
            .entries_between(window.start, window.end)
            .await?;
        Ok(FlattenedHistory::new(entries))
    }

    /// Expert consensus for the week; a failed scrape yields no picks
    pub async fn expert_consensus(&self) -> Vec<ExpertConsensus> {
        match self.source.fetch_expert_picks().await {
            Ok(picks) => picks.iter().filter_map(consensus).collect(),
            Err(e) => {
                tracing::warn!("Could not fetch expert picks: {}", e);
                Vec::new()
            }
        }
    }

    /// Run one refresh cycle for `window`.
    ///
    /// Returns `None` when another cycle is still running; overlapping
    /// triggers are dropped rather than queued.
    pub async fn refresh(&self, window: DateWindow) -> Option<Result<DashboardData, PipelineError>> {
        self.refresh_at(window, Local::now().naive_local()).await
    }

    pub async fn refresh_at(
        &self,
        window: DateWindow,
        now: NaiveDateTime,
    ) -> Option<Result<DashboardData, PipelineError>> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Refresh already running, skipping this trigger");
            return None;
        };

        Some(self.build_dashboard(window, now).await)
    }

    async fn build_dashboard(
        &self,
        window: DateWindow,
        now: NaiveDateTime,
    ) -> Result<DashboardData, PipelineError> {
        let batch = self.get_batch_at(window, now).await?;
        let history = self.load_window(&window).await?;

        let mut tooltips = Vec::with_capacity(batch.games.len());
        for game in &batch.games {
            let past = match self.store.history_for_game(&game.game_id).await {
                Ok(past) => past,
                Err(e) => {
                    tracing::warn!("No tooltip history for {}: {}", game.game_id, e);
                    Vec::new()
                }
            };
            tooltips.push(tooltip_for(game, &past));
        }

        let expert_picks = self.expert_consensus().await;

        Ok(DashboardData {
            window,
            matchups: matchups(&batch.games),
            charts: history.charts(),
            games: batch.games,
            tooltips,
            expert_picks,
            issues: batch.issues,
            refreshed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::{RawPick, RawRow};
    use crate::scrapers::StaticSource;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn raw(home: &str, away: &str, home_ml: &str, away_ml: &str) -> RawRow {
        RawRow {
            date: "12/10/23".to_string(),
            time: "1:00 PM".to_string(),
            bets: "+ 412".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_moneyline: home_ml.to_string(),
            away_moneyline: away_ml.to_string(),
            home_spread: "-3.0 (-110)".to_string(),
            away_spread: "+3.0 (-110)".to_string(),
            total_over: "O 44.5 (-110)".to_string(),
            total_under: "U 44.5 (-110)".to_string(),
        }
    }

    fn slate() -> Vec<RawRow> {
        vec![
            raw("Detroit Lions", "Chicago Bears", "-150", "+130"),
            raw("Kansas City Chiefs", "Buffalo Bills", "-300", "+250"),
            raw("New York Jets", "Houston Texans", "+105", "-125"),
        ]
    }

    fn week() -> DateWindow {
        DateWindow::parse("2023-12-05", "2023-12-11").unwrap()
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 12, 6)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    async fn pipeline(rows: Vec<RawRow>, picks: Vec<RawPick>) -> Pipeline {
        let store = Store::in_memory().await.unwrap();
        Pipeline::new(Box::new(StaticSource::new(rows, picks)), store)
    }

    struct BrokenSource {
        slate_ok: bool,
    }

    #[async_trait]
    impl SlateSource for BrokenSource {
        async fn fetch_slate(&self) -> Result<Vec<RawRow>, FetchError> {
            if self.slate_ok {
                Ok(slate())
            } else {
                Err(FetchError::Shape("no coupons".to_string()))
            }
        }

        async fn fetch_expert_picks(&self) -> Result<Vec<RawPick>, FetchError> {
            Err(FetchError::Shape("no headline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_get_batch_ranks_and_logs() {
        let pipeline = pipeline(slate(), vec![]).await;
        let batch = pipeline.get_batch_at(week(), at(10)).await.unwrap();

        assert_eq!(batch.games.len(), 3);
        assert_eq!(batch.games[0].home_team, "Kansas City Chiefs");
        assert_eq!(batch.games[0].points, 2.0);
        assert_eq!(batch.games[0].day_of_week, "Sunday");
        assert_eq!(batch.log.inserted, 3);

        // same slate again: nothing new to log
        let again = pipeline.get_batch_at(week(), at(11)).await.unwrap();
        assert_eq!(again.log.inserted, 0);
        assert_eq!(again.log.unchanged, 3);
        assert_eq!(pipeline.store().count_entries().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_data_rejects_bad_window() {
        let pipeline = pipeline(slate(), vec![]).await;
        let result = pipeline.get_data("12/05/2023", "2023-12-11").await;
        assert!(matches!(result, Err(PipelineError::Parse(_))));
    }

    #[tokio::test]
    async fn test_games_outside_window_are_ignored() {
        let pipeline = pipeline(slate(), vec![]).await;
        let window = DateWindow::parse("2023-12-12", "2023-12-18").unwrap();
        let batch = pipeline.get_batch_at(window, at(10)).await.unwrap();

        assert!(batch.games.is_empty());
        assert_eq!(pipeline.store().count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_logging() {
        let store = Store::in_memory().await.unwrap();
        let pipeline = Pipeline::new(Box::new(BrokenSource { slate_ok: false }), store);

        let result = pipeline.refresh_at(week(), at(10)).await.unwrap();
        assert!(matches!(result, Err(PipelineError::Fetch(_))));
        assert_eq!(pipeline.store().count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_picks_failure_leaves_picks_empty() {
        let store = Store::in_memory().await.unwrap();
        let pipeline = Pipeline::new(Box::new(BrokenSource { slate_ok: true }), store);

        let dashboard = pipeline.refresh_at(week(), at(10)).await.unwrap().unwrap();
        assert_eq!(dashboard.games.len(), 3);
        assert!(dashboard.expert_picks.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_builds_dashboard() {
        let picks = vec![RawPick {
            week: "Week 14".to_string(),
            game: "Bears @ Lions".to_string(),
            time: "Sun 1:00 PM".to_string(),
            picks: vec!["det".to_string(), "det".to_string(), "chi".to_string()],
        }];
        let pipeline = pipeline(slate(), picks).await;

        let dashboard = pipeline.refresh_at(week(), at(10)).await.unwrap().unwrap();

        assert_eq!(dashboard.games.len(), 3);
        assert_eq!(dashboard.tooltips.len(), 3);
        assert_eq!(dashboard.matchups.len(), 3);
        assert_eq!(dashboard.refreshed_at, at(10));
        assert_eq!(dashboard.expert_picks[0].message, "66% of experts chose Lions");

        // six team lines, the biggest favorite first
        assert_eq!(dashboard.charts.points.len(), 6);
        assert_eq!(dashboard.charts.points[0].team, "Kansas City Chiefs");
        // a zero-point favorite is not a pick
        assert_eq!(dashboard.charts.picks.len(), 2);
    }

    #[tokio::test]
    async fn test_load_historical_data_flattens_entries() {
        let pipeline = pipeline(slate(), vec![]).await;
        pipeline.get_batch_at(week(), at(10)).await.unwrap();

        let history = pipeline
            .load_historical_data("2023-12-06", "2023-12-06")
            .await
            .unwrap();
        assert_eq!(history.entries().len(), 3);
        assert_eq!(history.iter().count(), 6);

        let empty = pipeline
            .load_historical_data("2023-12-07", "2023-12-08")
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_row_does_not_fail_refresh() {
        let pipeline = pipeline(slate(), vec![]).await;
        sqlx::query(
            "INSERT INTO nfl_data VALUES ('2023-12-06T09:00:00+00:00', 'other', '2023-12-10', 'A', 'B', -150, 130, 1.0)",
        )
        .execute(pipeline.store().pool())
        .await
        .unwrap();

        let dashboard = pipeline.refresh_at(week(), at(10)).await.unwrap().unwrap();
        assert_eq!(dashboard.games.len(), 3);
        assert_eq!(dashboard.tooltips.len(), 3);
        assert_eq!(dashboard.charts.points.len(), 6);

        let history = pipeline
            .load_historical_data("2023-12-06", "2023-12-06")
            .await
            .unwrap();
        assert_eq!(history.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let pipeline = pipeline(slate(), vec![]).await;

        let guard = pipeline.in_flight.try_lock().unwrap();
        assert!(pipeline.refresh_at(week(), at(10)).await.is_none());
        drop(guard);

        assert!(pipeline.refresh_at(week(), at(10)).await.is_some());
    }
}
