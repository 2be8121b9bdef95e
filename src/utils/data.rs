use crate::models::{GameRecord, Side, TeamObservation, TIMESTAMP_FORMAT};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Save any serializable data to a JSON cache file
pub fn save_to_cache<T: Serialize + ?Sized>(data: &T, cache_file: &Path) -> Result<()> {
    if let Some(dir) = cache_file.parent() {
        std::fs::create_dir_all(dir).context("Failed to create cache directory")?;
    }
    let json = serde_json::to_string_pretty(data).context("Failed to serialize cache data")?;
    std::fs::write(cache_file, json).context("Failed to write cache file")?;
    Ok(())
}

/// Load data from a JSON cache file
pub fn load_from_cache<T: DeserializeOwned>(cache_file: &Path) -> Result<T> {
    let json = std::fs::read_to_string(cache_file).context("Failed to read cache file")?;
    let data = serde_json::from_str(&json).context("Failed to deserialize cache data")?;
    Ok(data)
}

/// Write the flattened history to CSV, one row per team observation
pub fn save_history_to_csv<I>(observations: I, filename: &Path) -> Result<usize>
where
    I: IntoIterator<Item = TeamObservation>,
{
    let mut writer = csv::Writer::from_path(filename).context("Failed to create CSV file")?;
    writer.write_record(["DateTime", "GameId", "Team", "Win", "Type", "Points"])?;

    let mut written = 0;
    for obs in observations {
        let side = match obs.side {
            Side::Home => "Home Win",
            Side::Away => "Away Win",
        };
        writer.write_record([
            obs.observed_at.format(TIMESTAMP_FORMAT).to_string(),
            obs.game_id,
            obs.team,
            obs.win.to_string(),
            side.to_string(),
            obs.points.to_string(),
        ])?;
        written += 1;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(written)
}

/// Write the current ranked slate to CSV
pub fn save_games_to_csv(games: &[GameRecord], filename: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename).context("Failed to create CSV file")?;
    for game in games {
        writer.serialize(game)?;
    }
    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRow;
    use chrono::NaiveDate;

    #[test]
    fn test_cache_round_trip_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("slate.json");

        let rows = vec![RawRow::from_tokens(&["x"; 22]).unwrap()];
        save_to_cache(&rows, &path).unwrap();
        let loaded: Vec<RawRow> = load_from_cache(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_load_from_missing_cache_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(load_from_cache::<Vec<RawRow>>(&path).is_err());
    }

    #[test]
    fn test_save_history_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let observed_at = NaiveDate::from_ymd_opt(2023, 12, 6)
            .unwrap()
            .and_hms_opt(11, 7, 58)
            .unwrap();
        let obs = TeamObservation {
            observed_at,
            game_id: "g1".to_string(),
            team: "Lions".to_string(),
            win: -150,
            side: Side::Home,
            points: 1.5,
        };

        let written = save_history_to_csv(vec![obs], &path).unwrap();
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("DateTime,GameId,Team,Win,Type,Points"));
        assert_eq!(
            lines.next(),
            Some("2023-12-06T11:07:58.000000,g1,Lions,-150,Home Win,1.5")
        );
    }
}
