use crate::models::{GameRecord, Side};

/// One team-side of the slate with its place on the ladder
#[derive(Debug, Clone, PartialEq)]
pub struct SideScore {
    pub game_index: usize,
    pub side: Side,
    pub team: String,
    pub moneyline: i32,
    pub rank: usize,
    pub score: f64,
}

/// Rank every side of the slate against every other side.
///
/// Sides are listed home-first then away, stably sorted by moneyline
/// descending, and the side at position `k` scores `k - N` for `N` games.
/// The returned vector is in ladder order.
pub fn side_scores(games: &[GameRecord]) -> Vec<SideScore> {
    let n = games.len();

    let home = games
        .iter()
        .enumerate()
        .map(|(i, g)| (i, Side::Home, &g.home_team, g.home_moneyline));
    let away = games
        .iter()
        .enumerate()
        .map(|(i, g)| (i, Side::Away, &g.away_team, g.away_moneyline));
    let mut sides: Vec<_> = home.chain(away).collect();

    // sort_by is stable, ties keep insertion order
    sides.sort_by(|a, b| b.3.cmp(&a.3));

    sides
        .into_iter()
        .enumerate()
        .map(|(rank, (game_index, side, team, moneyline))| SideScore {
            game_index,
            side,
            team: team.clone(),
            moneyline,
            rank,
            score: rank as f64 - n as f64,
        })
        .collect()
}

/// Assign `points` to every game and return the slate sorted by points descending.
///
/// A game's points are the score of whichever of its sides ranks later on the
/// ladder, i.e. its favorite.
pub fn rank_games(mut games: Vec<GameRecord>) -> Vec<GameRecord> {
    let scores = side_scores(&games);
    let mut best: Vec<Option<&SideScore>> = vec![None; games.len()];

    for side in &scores {
        let slot = &mut best[side.game_index];
        if slot.map_or(true, |prev| side.rank > prev.rank) {
            *slot = Some(side);
        }
    }

    let points: Vec<f64> = best
        .into_iter()
        .map(|side| side.map_or(0.0, |s| s.score))
        .collect();

    for (game, points) in games.iter_mut().zip(points) {
        game.points = points;
    }

    games.sort_by(|a, b| {
        b.points
            .partial_cmp(&a.points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    games
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(home: &str, away: &str, home_ml: i32, away_ml: i32) -> GameRecord {
        GameRecord {
            game_id: format!("{}_{}", home, away),
            date: "2023-12-10".to_string(),
            day_of_week: "Sunday".to_string(),
            time: "1:00 PM".to_string(),
            bets: "100".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_moneyline: home_ml,
            away_moneyline: away_ml,
            home_spread: String::new(),
            away_spread: String::new(),
            total_over: String::new(),
            total_under: String::new(),
            points: 0.0,
        }
    }

    fn slate() -> Vec<GameRecord> {
        vec![
            game("Lions", "Bears", -150, 130),
            game("Chiefs", "Bills", -300, 250),
            game("Jets", "Texans", 105, -125),
        ]
    }

    #[test]
    fn test_side_scores_form_ladder() {
        let games = slate();
        let n = games.len() as f64;
        let scores = side_scores(&games);

        assert_eq!(scores.len(), 6);
        for pair in scores.windows(2) {
            assert!(pair[0].moneyline > pair[1].moneyline);
            assert_eq!(pair[1].score - pair[0].score, 1.0);
        }
        assert_eq!(scores.first().unwrap().score, -n);
        assert_eq!(scores.last().unwrap().score, n - 1.0);
        assert_eq!(scores.first().unwrap().team, "Bills");
        assert_eq!(scores.last().unwrap().team, "Chiefs");
    }

    #[test]
    fn test_rank_games_uses_favorite_score() {
        let ranked = rank_games(slate());
        let by_home: Vec<(&str, f64)> = ranked
            .iter()
            .map(|g| (g.home_team.as_str(), g.points))
            .collect();

        // ladder: Bills, Bears, Jets, Texans, Lions, Chiefs
        assert_eq!(by_home, vec![("Chiefs", 2.0), ("Lions", 1.0), ("Jets", 0.0)]);
    }

    #[test]
    fn test_rank_games_equal_moneylines_keep_insertion_order() {
        let games = vec![game("A", "B", -110, -110), game("C", "D", -110, -110)];
        let scores = side_scores(&games);
        let teams: Vec<&str> = scores.iter().map(|s| s.team.as_str()).collect();
        assert_eq!(teams, vec!["A", "C", "B", "D"]);

        // each game takes its away side, which sits later on the ladder
        let ranked = rank_games(games);
        assert_eq!(ranked[0].home_team, "C");
        assert_eq!(ranked[0].points, 1.0);
        assert_eq!(ranked[1].home_team, "A");
        assert_eq!(ranked[1].points, 0.0);
    }

    #[test]
    fn test_rank_games_empty_slate() {
        assert!(rank_games(Vec::new()).is_empty());
        assert!(side_scores(&[]).is_empty());
    }

    #[test]
    fn test_rank_games_single_game() {
        let ranked = rank_games(vec![game("Lions", "Bears", -150, 130)]);
        assert_eq!(ranked[0].points, 0.0);
    }
}
