use crate::error::ParseError;
use crate::models::{GameRecord, RawRow};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Sentinel stored when a moneyline cannot be parsed
pub const MONEYLINE_SENTINEL: i32 = -1;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

/// Parse an American moneyline as shown by the sportsbook
/// "EVEN" is a pick'em line and maps to 0
pub fn parse_moneyline(value: &str) -> Result<i32, ParseError> {
    let value = value.trim();
    let invalid = || ParseError::Moneyline(value.to_string());

    if value == "EVEN" {
        return Ok(0);
    }

    if let Some(digits) = value.strip_prefix('+') {
        if !digits.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<i32>().map_err(|_| invalid())
    } else if let Some(digits) = value.strip_prefix('-') {
        if !digits.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<i32>().map(|n| -n).map_err(|_| invalid())
    } else {
        Err(invalid())
    }
}

/// Moneyline text to integer, falling back to the sentinel
pub fn convert_to_int(value: &str) -> i32 {
    match parse_moneyline(value) {
        Ok(odds) => odds,
        Err(e) => {
            tracing::warn!("{}, using {}", e, MONEYLINE_SENTINEL);
            MONEYLINE_SENTINEL
        }
    }
}

/// Stable identifier for a game: MD5 of "date_home_away" as lower-case hex
pub fn generate_game_id(date: &str, home_team: &str, away_team: &str) -> String {
    let identifier = format!("{}_{}_{}", date, home_team, away_team);
    format!("{:x}", md5::compute(identifier.as_bytes()))
}

pub fn parse_slate_date(value: &str) -> Result<NaiveDate, ParseError> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| ParseError::Date(value.to_string()))
}

/// Inclusive range of game dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse from ISO `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, ParseError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ParseError::Date(s.to_string()))
        };
        Ok(Self::new(parse(start)?, parse(end)?))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Pool week containing `today`: Tuesday through the following Monday
pub fn current_week_window(today: NaiveDate) -> DateWindow {
    let since_tuesday = (today.weekday().num_days_from_monday() + 6) % 7;
    let start = today - Duration::days(since_tuesday as i64);
    let end = if today.weekday() == Weekday::Mon {
        today
    } else {
        start + Duration::days(6)
    };
    DateWindow::new(start, end)
}

/// Something that went wrong with one scraped row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub home_team: String,
    pub away_team: String,
    pub dropped: bool,
    pub reason: String,
}

impl RowIssue {
    fn new(row: &RawRow, dropped: bool, error: &ParseError) -> Self {
        Self {
            home_team: row.home_team.clone(),
            away_team: row.away_team.clone(),
            dropped,
            reason: error.to_string(),
        }
    }
}

/// Result of normalizing one slate
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<GameRecord>,
    pub issues: Vec<RowIssue>,
}

/// Shape raw rows into unranked game records within the window.
/// Bad dates drop the row, bad moneylines keep it with the sentinel.
pub fn normalize_rows(rows: Vec<RawRow>, window: &DateWindow) -> Normalized {
    let mut normalized = Normalized::default();

    for row in rows {
        let date = match parse_slate_date(&row.date) {
            Ok(date) => date,
            Err(e) => {
                normalized.issues.push(RowIssue::new(&row, true, &e));
                continue;
            }
        };

        if !window.contains(date) {
            continue;
        }

        let mut moneyline = |text: &str| match parse_moneyline(text) {
            Ok(odds) => odds,
            Err(e) => {
                normalized.issues.push(RowIssue::new(&row, false, &e));
                MONEYLINE_SENTINEL
            }
        };
        let home_moneyline = moneyline(&row.home_moneyline);
        let away_moneyline = moneyline(&row.away_moneyline);

        let date_str = date.format("%Y-%m-%d").to_string();
        let game_id = generate_game_id(&date_str, &row.home_team, &row.away_team);

        normalized.records.push(GameRecord {
            game_id,
            date: date_str,
            day_of_week: date.format("%A").to_string(),
            time: row.time,
            bets: row.bets.trim_start_matches('+').trim().to_string(),
            home_team: row.home_team,
            away_team: row.away_team,
            home_moneyline,
            away_moneyline,
            home_spread: row.home_spread,
            away_spread: row.away_spread,
            total_over: row.total_over,
            total_under: row.total_under,
            points: 0.0,
        });
    }

    normalized
}
