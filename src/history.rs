use crate::models::{GameRecord, HistoryEntry, Side, TeamObservation};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

/// Split one log entry into a home and an away observation.
///
/// The side with the lower moneyline (the favorite) carries `+points`, the
/// other side `-points`. On equal odds the away side counts as the favorite.
pub fn expand_entry(entry: &HistoryEntry) -> [TeamObservation; 2] {
    let (home_points, away_points) = if entry.home_win < entry.away_win {
        (entry.points, -entry.points)
    } else {
        (-entry.points, entry.points)
    };

    [
        TeamObservation {
            observed_at: entry.observed_at,
            game_id: entry.game_id.clone(),
            team: entry.home_team.clone(),
            win: entry.home_win,
            side: Side::Home,
            points: home_points,
        },
        TeamObservation {
            observed_at: entry.observed_at,
            game_id: entry.game_id.clone(),
            team: entry.away_team.clone(),
            win: entry.away_win,
            side: Side::Away,
            points: away_points,
        },
    ]
}

/// Log entries for a window, viewed per team side.
///
/// Expansion happens lazily in `iter`, which can be called again to restart.
/// Order follows the underlying query, not necessarily time.
#[derive(Debug, Clone, Default)]
pub struct FlattenedHistory {
    entries: Vec<HistoryEntry>,
}

impl FlattenedHistory {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of observations, two per entry
    pub fn len(&self) -> usize {
        self.entries.len() * 2
    }

    pub fn iter(&self) -> impl Iterator<Item = TeamObservation> + '_ {
        self.entries.iter().flat_map(expand_entry)
    }

    /// Signed points per team over time
    pub fn points_series(&self) -> Vec<TeamSeries> {
        build_series(self.iter(), |obs| obs.points)
    }

    /// Only the moments a team was a favorite with positive points
    pub fn picks_series(&self) -> Vec<TeamSeries> {
        build_series(self.iter().filter(|obs| obs.points > 0.0), |obs| {
            obs.points
        })
    }

    /// Moneyline per team over time
    pub fn odds_series(&self) -> Vec<TeamSeries> {
        build_series(self.iter(), |obs| obs.win as f64)
    }

    pub fn charts(&self) -> ChartData {
        ChartData {
            points: self.points_series(),
            picks: self.picks_series(),
            odds: self.odds_series(),
        }
    }
}

impl IntoIterator for FlattenedHistory {
    type Item = TeamObservation;
    type IntoIter = std::vec::IntoIter<TeamObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter().collect::<Vec<_>>().into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub observed_at: NaiveDateTime,
    pub value: f64,
}

/// One chart line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSeries {
    pub team: String,
    pub latest_points: f64,
    pub points: Vec<SeriesPoint>,
}

/// The three dashboard charts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub points: Vec<TeamSeries>,
    pub picks: Vec<TeamSeries>,
    pub odds: Vec<TeamSeries>,
}

/// Group observations by team, sort each line by time, and order the lines
/// by the team's most recent signed points (highest first)
fn build_series<I, F>(observations: I, value: F) -> Vec<TeamSeries>
where
    I: Iterator<Item = TeamObservation>,
    F: Fn(&TeamObservation) -> f64,
{
    let mut order: Vec<String> = Vec::new();
    let mut by_team: HashMap<String, Vec<TeamObservation>> = HashMap::new();

    for obs in observations {
        if !by_team.contains_key(&obs.team) {
            order.push(obs.team.clone());
        }
        by_team.entry(obs.team.clone()).or_default().push(obs);
    }

    let mut series: Vec<TeamSeries> = order
        .into_iter()
        .filter_map(|team| {
            let mut observations = by_team.remove(&team)?;
            observations.sort_by_key(|obs| obs.observed_at);
            let latest_points = observations.last().map_or(0.0, |obs| obs.points);
            let points = observations
                .iter()
                .map(|obs| SeriesPoint {
                    observed_at: obs.observed_at,
                    value: value(obs),
                })
                .collect();
            Some(TeamSeries {
                team,
                latest_points,
                points,
            })
        })
        .collect();

    series.sort_by(|a, b| b.latest_points.total_cmp(&a.latest_points));
    series
}

/// Hover text for the tracked columns of one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameTooltip {
    pub game_id: String,
    pub home_win: String,
    pub away_win: String,
    pub points: String,
}

fn column_tooltip(column: &str, current: String, history: Vec<String>) -> String {
    let mut changes: Vec<String> = Vec::new();
    for value in history {
        if value == current || changes.last() == Some(&value) {
            continue;
        }
        changes.push(value);
    }

    if changes.is_empty() {
        format!("{}: {}\nHistory: No changes", column, current)
    } else {
        format!("{}: {}\nHistory: {}", column, current, changes.join(", "))
    }
}

fn values<F: Fn(&HistoryEntry) -> String>(history: &[HistoryEntry], f: F) -> Vec<String> {
    history.iter().map(f).collect()
}

/// Current values of a game next to the earlier values it has taken.
/// `history` must be newest first; repeated values in a row collapse to one.
pub fn tooltip_for(record: &GameRecord, history: &[HistoryEntry]) -> GameTooltip {
    GameTooltip {
        game_id: record.game_id.clone(),
        home_win: column_tooltip(
            "home_win",
            record.home_moneyline.to_string(),
            values(history, |e| e.home_win.to_string()),
        ),
        away_win: column_tooltip(
            "away_win",
            record.away_moneyline.to_string(),
            values(history, |e| e.away_win.to_string()),
        ),
        points: column_tooltip(
            "points",
            record.points.to_string(),
            values(history, |e| e.points.to_string()),
        ),
    }
}

/// Row of the matchups table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matchup {
    pub matchup: String,
    pub date: String,
    pub time: String,
    pub projected_winner: String,
    pub ranking: f64,
}

/// Games soonest first with the favorite as projected winner
pub fn matchups(games: &[GameRecord]) -> Vec<Matchup> {
    let mut rows: Vec<Matchup> = games
        .iter()
        .map(|game| {
            let projected_winner = if game.home_moneyline < game.away_moneyline {
                &game.home_team
            } else {
                &game.away_team
            };
            Matchup {
                matchup: format!("{} vs {}", game.home_team, game.away_team),
                date: game.date.clone(),
                time: game.time.clone(),
                projected_winner: projected_winner.clone(),
                ranking: game.points,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.date.cmp(&b.date));
    rows
}
