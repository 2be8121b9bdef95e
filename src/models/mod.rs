use crate::error::ParseError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used for `observed_at` and chat timestamps in the store
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Number of text tokens a sportsbook coupon section must carry
pub const RAW_ROW_TOKENS: usize = 22;

/// One game as scraped from the sportsbook, all fields still text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: String,
    pub time: String,
    pub bets: String,
    pub home_team: String,
    pub away_team: String,
    pub home_moneyline: String,
    pub away_moneyline: String,
    pub home_spread: String,
    pub away_spread: String,
    pub total_over: String,
    pub total_under: String,
}

impl RawRow {
    /// Build a row from the ordered text tokens of one coupon section.
    ///
    /// Token layout: 0 date, 1 time, 2 bets, 6 home, 7 away, 10-13 spreads,
    /// 14-15 moneylines, 16-21 totals. The remaining tokens are labels.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ParseError> {
        if tokens.len() < RAW_ROW_TOKENS {
            return Err(ParseError::RowShape {
                expected: RAW_ROW_TOKENS,
                found: tokens.len(),
            });
        }

        let t = |i: usize| tokens[i].as_ref().trim().to_string();
        let joined = |idx: &[usize]| {
            idx.iter()
                .map(|&i| tokens[i].as_ref().trim())
                .collect::<Vec<_>>()
                .join(" ")
        };

        Ok(RawRow {
            date: t(0),
            time: t(1),
            bets: t(2),
            home_team: t(6),
            away_team: t(7),
            home_moneyline: t(14),
            away_moneyline: t(15),
            home_spread: joined(&[10, 11]),
            away_spread: joined(&[12, 13]),
            total_over: joined(&[16, 17, 18]),
            total_under: joined(&[19, 20, 21]),
        })
    }
}

/// A normalized, ranked game for the current slate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub date: String,
    pub day_of_week: String,
    pub time: String,
    pub bets: String,
    pub home_team: String,
    pub away_team: String,
    pub home_moneyline: i32, // American odds, 0 = EVEN, -1 = unparseable
    pub away_moneyline: i32,
    pub home_spread: String,
    pub away_spread: String,
    pub total_over: String,
    pub total_under: String,
    pub points: f64,
}

impl GameRecord {
    /// One-line summary for terminal output
    pub fn format(&self) -> String {
        format!(
            "{:+.1}  {} {} {}  {} ({}) vs {} ({})",
            self.points,
            self.day_of_week,
            self.date,
            self.time,
            self.home_team,
            format_moneyline(self.home_moneyline),
            self.away_team,
            format_moneyline(self.away_moneyline),
        )
    }
}

fn format_moneyline(odds: i32) -> String {
    match odds {
        0 => "EVEN".to_string(),
        n => format!("{:+}", n),
    }
}

/// One row of the `nfl_data` log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub observed_at: NaiveDateTime,
    pub game_id: String,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_win: i32,
    pub away_win: i32,
    pub points: f64,
}

impl HistoryEntry {
    pub fn observe(record: &GameRecord, observed_at: NaiveDateTime) -> Self {
        Self {
            observed_at,
            game_id: record.game_id.clone(),
            date: record.date.clone(),
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            home_win: record.home_moneyline,
            away_win: record.away_moneyline,
            points: record.points,
        }
    }

    /// True when every tracked field matches the record
    pub fn matches(&self, record: &GameRecord) -> bool {
        self.game_id == record.game_id
            && self.date == record.date
            && self.home_team == record.home_team
            && self.away_team == record.away_team
            && self.home_win == record.home_moneyline
            && self.away_win == record.away_moneyline
            && self.points == record.points
    }
}

/// Which side of a game an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "Home Win")]
    Home,
    #[serde(rename = "Away Win")]
    Away,
}

/// A history entry seen from one team's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamObservation {
    pub observed_at: NaiveDateTime,
    pub game_id: String,
    pub team: String,
    pub win: i32,
    pub side: Side,
    pub points: f64,
}

/// One row of the expert-picks grid, one team abbreviation per expert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPick {
    pub week: String,
    pub game: String,
    pub time: String,
    pub picks: Vec<String>,
}

/// Majority pick for one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertConsensus {
    pub week: String,
    pub game: String,
    pub time: String,
    pub pct: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub ip: String,
    pub username: String,
    pub message: String,
    pub timestamp: String,
}

impl ChatMessage {
    /// CSS colour for the message, taken from the username suffix
    pub fn color(&self) -> &str {
        self.username.rsplit('-').next().unwrap_or("black")
    }
}
