use super::USER_AGENT;
use crate::error::FetchError;
use crate::models::RawRow;
use scraper::{Html, Selector};

pub const SPORTSBOOK_URL: &str = "https://www.bovada.lv/sports/football/nfl";

const COUPON_SELECTOR: &str = "section.coupon-content.more-info";

pub struct SportsbookScraper {
    client: reqwest::Client,
    url: String,
}

impl SportsbookScraper {
    pub fn new(url: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client: reqwest::Client::builder().user_agent(USER_AGENT).build()?,
            url: url.to_string(),
        })
    }

    /// Fetch the sportsbook page and parse every game coupon on it
    pub async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        tracing::info!("Fetching slate from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: response.status(),
            });
        }

        let html = response.text().await?;
        parse_slate_html(&html)
    }
}

/// Parse coupon sections into raw rows.
///
/// Each section's non-empty text nodes, in document order, are the row tokens.
/// Sections that are too short are skipped with a warning; a page with no
/// coupon sections at all is an error, usually a page that did not render.
pub fn parse_slate_html(html: &str) -> Result<Vec<RawRow>, FetchError> {
    let document = Html::parse_document(html);
    let coupon_selector = Selector::parse(COUPON_SELECTOR)
        .map_err(|e| FetchError::Shape(format!("invalid selector: {}", e)))?;

    let mut sections = 0;
    let mut rows = Vec::new();

    for section in document.select(&coupon_selector) {
        sections += 1;
        let tokens: Vec<&str> = section
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        match RawRow::from_tokens(&tokens) {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!("Skipping coupon section {}: {}", sections, e),
        }
    }

    if sections == 0 {
        return Err(FetchError::Shape(format!(
            "no elements matching {:?}",
            COUPON_SELECTOR
        )));
    }

    Ok(rows)
}
