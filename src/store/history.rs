use super::Store;
use crate::error::{ParseError, PersistenceError};
use crate::models::{GameRecord, HistoryEntry, TIMESTAMP_FORMAT};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tokio_stream::StreamExt;

const SELECT_COLUMNS: &str =
    "SELECT datetime, game_id, date, home_team, away_team, home_win, away_win, points FROM nfl_data";

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    datetime: String,
    game_id: String,
    date: String,
    home_team: String,
    away_team: String,
    home_win: i32,
    away_win: i32,
    points: f64,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = PersistenceError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let observed_at = parse_timestamp(&row.datetime).map_err(|source| {
            PersistenceError::CorruptRow {
                game_id: row.game_id.clone(),
                source,
            }
        })?;

        Ok(HistoryEntry {
            observed_at,
            game_id: row.game_id,
            date: row.date,
            home_team: row.home_team,
            away_team: row.away_team,
            home_win: row.home_win,
            away_win: row.away_win,
            points: row.points,
        })
    }
}

/// Accepts ISO timestamps with or without fractional seconds, `T` or space separated
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ParseError> {
    value
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| ParseError::Timestamp(value.to_string()))
}

/// Convert a row, logging and dropping it when it is corrupt
fn readable(row: HistoryRow) -> Option<HistoryEntry> {
    match HistoryEntry::try_from(row) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("Skipping {}", e);
            None
        }
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// A game that could not be written to the log
#[derive(Debug, Clone, Serialize)]
pub struct LogFailure {
    pub game_id: String,
    pub error: String,
}

/// Outcome of logging one batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogReport {
    pub inserted: usize,
    pub unchanged: usize,
    pub failures: Vec<LogFailure>,
}

impl Store {
    /// Append every record whose tracked fields differ from its latest log entry
    pub async fn record_if_changed(&self, batch: &[GameRecord]) -> LogReport {
        self.record_if_changed_at(batch, Local::now().naive_local())
            .await
    }

    /// Same as `record_if_changed` with an explicit capture time
    pub async fn record_if_changed_at(
        &self,
        batch: &[GameRecord],
        observed_at: NaiveDateTime,
    ) -> LogReport {
        let mut report = LogReport::default();

        for record in batch {
            match self.record_one(record, observed_at).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    tracing::error!("Failed to log game {}: {}", record.game_id, e);
                    report.failures.push(LogFailure {
                        game_id: record.game_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            "Logged batch: {} inserted, {} unchanged, {} failed",
            report.inserted,
            report.unchanged,
            report.failures.len()
        );
        report
    }

    async fn record_one(
        &self,
        record: &GameRecord,
        observed_at: NaiveDateTime,
    ) -> Result<bool, PersistenceError> {
        if let Some(latest) = self.latest_entry(&record.game_id).await? {
            if latest.matches(record) {
                return Ok(false);
            }
        }

        self.insert_entry(&HistoryEntry::observe(record, observed_at))
            .await?;
        Ok(true)
    }

    pub async fn insert_entry(&self, entry: &HistoryEntry) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"INSERT INTO nfl_data (datetime, game_id, date, home_team, away_team, home_win, away_win, points)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(format_timestamp(&entry.observed_at))
        .bind(&entry.game_id)
        .bind(&entry.date)
        .bind(&entry.home_team)
        .bind(&entry.away_team)
        .bind(entry.home_win)
        .bind(entry.away_win)
        .bind(entry.points)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Most recent readable entry for a game, ties on timestamp go to the last
    /// inserted. Corrupt rows are skipped, so a bad row never blocks logging.
    pub async fn latest_entry(
        &self,
        game_id: &str,
    ) -> Result<Option<HistoryEntry>, PersistenceError> {
        let query = format!(
            "{} WHERE game_id = ? ORDER BY datetime DESC, rowid DESC",
            SELECT_COLUMNS
        );
        let mut rows = sqlx::query_as::<_, HistoryRow>(&query)
            .bind(game_id)
            .fetch(self.pool());

        while let Some(row) = rows.next().await {
            if let Some(entry) = readable(row?) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Every readable entry for a game, newest first
    pub async fn history_for_game(
        &self,
        game_id: &str,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let query = format!(
            "{} WHERE game_id = ? ORDER BY datetime DESC, rowid DESC",
            SELECT_COLUMNS
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&query)
            .bind(game_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().filter_map(readable).collect())
    }

    /// Readable entries observed between the start of `start` and the end of `end`,
    /// in insertion order
    pub async fn entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let from = start.and_time(NaiveTime::default());
        let until = (end + Duration::days(1)).and_time(NaiveTime::default());

        let query = format!("{} WHERE datetime >= ? AND datetime < ?", SELECT_COLUMNS);
        let rows: Vec<HistoryRow> = sqlx::query_as(&query)
            .bind(format_timestamp(&from))
            .bind(format_timestamp(&until))
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().filter_map(readable).collect())
    }

    pub async fn count_entries(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM nfl_data")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
