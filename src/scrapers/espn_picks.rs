use super::USER_AGENT;
use crate::error::FetchError;
use crate::models::{ExpertConsensus, RawPick};
use scraper::{ElementRef, Html, Selector};

pub const ESPN_PICKS_URL: &str = "https://www.espn.com/nfl/picks";

pub struct ExpertPicksScraper {
    client: reqwest::Client,
    url: String,
}

impl ExpertPicksScraper {
    pub fn new(url: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client: reqwest::Client::builder().user_agent(USER_AGENT).build()?,
            url: url.to_string(),
        })
    }

    /// Scrape the expert pick grid for the current week
    pub async fn fetch_picks(&self) -> Result<Vec<RawPick>, FetchError> {
        tracing::info!("Fetching expert picks from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: response.status(),
            });
        }

        let html = response.text().await?;
        parse_picks_html(&html)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Shape(format!("invalid selector {:?}: {}", css, e)))
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Team abbreviation from a logo URL such as ".../500/det.png&h=40"
fn team_from_logo(src: &str) -> Option<String> {
    let file = src.split('/').last()?;
    let team = file.split('.').next()?;
    (!team.is_empty()).then(|| team.to_string())
}

/// Parse the picks page: the fixed left table holds games, the scrolling
/// table holds one column per expert with a team logo per cell.
/// Rows with any missing pick are dropped.
pub fn parse_picks_html(html: &str) -> Result<Vec<RawPick>, FetchError> {
    let document = Html::parse_document(html);

    let headline = selector("h1.headline")?;
    let week = document
        .select(&headline)
        .next()
        .map(text_of)
        .and_then(|text| text.split("- ").nth(1).map(str::to_string))
        .ok_or_else(|| FetchError::Shape("missing week headline".to_string()))?;

    let game_rows = selector(".Table--fixed-left .Table__TBODY .Table__TR")?;
    let game_link = selector(".wrap-competition a")?;
    let game_time = selector(".competition-dates")?;

    let games: Vec<(String, String)> = document
        .select(&game_rows)
        .filter_map(|row| {
            let game = row.select(&game_link).next().map(text_of)?;
            let time = row.select(&game_time).next().map(text_of)?;
            Some((game, time))
        })
        .collect();

    let pick_rows = selector(".Table__Scroller .Table__TBODY .Table__TR")?;
    let pick_cell = selector(".Table__TD")?;
    let logo = selector("img")?;

    let grid: Vec<Vec<Option<String>>> = document
        .select(&pick_rows)
        .map(|row| {
            row.select(&pick_cell)
                .map(|cell| {
                    cell.select(&logo)
                        .next()
                        .and_then(|img| img.value().attr("src"))
                        .and_then(team_from_logo)
                })
                .collect()
        })
        .collect();

    let picks = games
        .into_iter()
        .zip(grid)
        .filter_map(|((game, time), cells)| {
            let picks: Option<Vec<String>> = cells.into_iter().collect();
            match picks {
                Some(picks) if !picks.is_empty() => Some(RawPick {
                    week: week.clone(),
                    game,
                    time,
                    picks,
                }),
                _ => None,
            }
        })
        .collect();

    Ok(picks)
}

/// Team nickname for an ESPN logo abbreviation
pub fn team_nickname(abbreviation: &str) -> Option<&'static str> {
    let name = match abbreviation {
        "ari" => "Cardinals",
        "atl" => "Falcons",
        "bal" => "Ravens",
        "buf" => "Bills",
        "car" => "Panthers",
        "chi" => "Bears",
        "cin" => "Bengals",
        "cle" => "Browns",
        "dal" => "Cowboys",
        "den" => "Broncos",
        "det" => "Lions",
        "gb" => "Packers",
        "hou" => "Texans",
        "ind" => "Colts",
        "jax" => "Jaguars",
        "kc" => "Chiefs",
        "lv" => "Raiders",
        "lac" => "Chargers",
        "lar" => "Rams",
        "mia" => "Dolphins",
        "min" => "Vikings",
        "ne" => "Patriots",
        "no" => "Saints",
        "nyg" => "Giants",
        "nyj" => "Jets",
        "phi" => "Eagles",
        "pit" => "Steelers",
        "sf" => "49ers",
        "sea" => "Seahawks",
        "tb" => "Buccaneers",
        "ten" => "Titans",
        "wsh" => "Commanders",
        _ => return None,
    };
    Some(name)
}

/// Majority pick for a game; ties go to the team picked first
pub fn consensus(pick: &RawPick) -> Option<ExpertConsensus> {
    let mut counts: Vec<(&str, u32)> = Vec::new();
    for team in &pick.picks {
        match counts.iter_mut().find(|(t, _)| *t == team.as_str()) {
            Some((_, n)) => *n += 1,
            None => counts.push((team.as_str(), 1)),
        }
    }

    let mut top: Option<(&str, u32)> = None;
    for &(team, n) in &counts {
        if top.map_or(true, |(_, best)| n > best) {
            top = Some((team, n));
        }
    }
    let (team, count) = top?;

    let pct = count * 100 / pick.picks.len() as u32;
    let name = team_nickname(team).unwrap_or(team);

    Some(ExpertConsensus {
        week: pick.week.clone(),
        game: pick.game.clone(),
        time: pick.time.clone(),
        pct,
        message: format!("{}% of experts chose {}", pct, name),
    })
}
