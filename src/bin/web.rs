use anyhow::Context;
use askama::Template;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Local;
use pickem_odds::{
    build_pipeline, current_week_window, refresh_current_week, AppConfig, DashboardData,
    ExpertConsensus, GameRecord, GameTooltip, Matchup, Pipeline, PipelineError,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

// Custom filters for formatting
mod filters {
    pub fn format_odds(odds: &i32) -> ::askama::Result<String> {
        Ok(match *odds {
            0 => "EVEN".to_string(),
            -1 => "n/a".to_string(),
            n => format!("{:+}", n),
        })
    }

    pub fn format_points(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:+.1}", value))
    }
}

struct GameRow {
    game: GameRecord,
    tooltip: GameTooltip,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    loaded: bool,
    window: String,
    refreshed_at: String,
    issue_count: usize,
    rows: Vec<GameRow>,
    matchups: Vec<Matchup>,
    expert_picks: Vec<ExpertConsensus>,
}

impl DashboardTemplate {
    fn new(data: Option<&DashboardData>) -> Self {
        let Some(data) = data else {
            let week = current_week_window(Local::now().date_naive());
            return Self {
                loaded: false,
                window: format!("{} to {}", week.start, week.end),
                refreshed_at: String::new(),
                issue_count: 0,
                rows: Vec::new(),
                matchups: Vec::new(),
                expert_picks: Vec::new(),
            };
        };

        let rows = data
            .games
            .iter()
            .cloned()
            .zip(data.tooltips.iter().cloned())
            .map(|(game, tooltip)| GameRow { game, tooltip })
            .collect();

        Self {
            loaded: true,
            window: format!("{} to {}", data.window.start, data.window.end),
            refreshed_at: data.refreshed_at.format("%a %H:%M:%S").to_string(),
            issue_count: data.issues.len(),
            rows,
            matchups: data.matchups.clone(),
            expert_picks: data.expert_picks.clone(),
        }
    }
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Shared state: last good snapshot plus the pipeline that refreshes it
type SharedData = Arc<RwLock<Option<DashboardData>>>;

#[derive(Clone)]
struct AppState {
    data: SharedData,
    pipeline: Arc<Pipeline>,
}

fn not_loaded() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Data not loaded yet").into_response()
}

async fn home(State(state): State<AppState>) -> impl IntoResponse {
    let data = state.data.read().await;
    HtmlTemplate(DashboardTemplate::new(data.as_ref()))
}

async fn api_games(State(state): State<AppState>) -> Response {
    match state.data.read().await.as_ref() {
        Some(data) => Json(data.games.clone()).into_response(),
        None => not_loaded(),
    }
}

async fn api_charts(State(state): State<AppState>) -> Response {
    match state.data.read().await.as_ref() {
        Some(data) => Json(data.charts.clone()).into_response(),
        None => not_loaded(),
    }
}

async fn api_picks(State(state): State<AppState>) -> Response {
    match state.data.read().await.as_ref() {
        Some(data) => Json(data.expert_picks.clone()).into_response(),
        None => not_loaded(),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    start: Option<String>,
    end: Option<String>,
}

/// Flattened history for a window, defaulting to the current pool week
async fn api_history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> Response {
    let week = current_week_window(Local::now().date_naive());
    let start = query.start.unwrap_or_else(|| week.start.to_string());
    let end = query.end.unwrap_or_else(|| week.end.to_string());

    match state.pipeline.load_historical_data(&start, &end).await {
        Ok(history) => Json(history.iter().collect::<Vec<_>>()).into_response(),
        Err(PipelineError::Parse(e)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!("Failed to load history: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history").into_response()
        }
    }
}

/// Kick off a refresh in the background; a cycle already running absorbs it
async fn api_refresh(State(state): State<AppState>) -> StatusCode {
    tokio::spawn(async move { refresh_once(&state).await });
    StatusCode::ACCEPTED
}

async fn read_chat(State(state): State<AppState>) -> Response {
    match state.pipeline.store().read_chat_log().await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => {
            tracing::error!("Failed to read chat log: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read chat").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatForm {
    message: String,
}

async fn post_chat(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<ChatForm>,
) -> Response {
    let ip = addr.ip().to_string();
    match state.pipeline.store().post_message(&ip, &form.message).await {
        Ok(Some(message)) => (StatusCode::CREATED, Json(message)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!("Failed to post chat message from {}: {}", ip, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to post message").into_response()
        }
    }
}

async fn refresh_once(state: &AppState) {
    match refresh_current_week(&state.pipeline).await {
        Ok(Some(data)) => {
            tracing::info!("Refreshed {} games", data.games.len());
            *state.data.write().await = Some(data);
        }
        Ok(None) => tracing::debug!("Refresh skipped, one is already running"),
        // keep showing the previous snapshot
        Err(e) => tracing::error!("{:#}", e),
    }
}

fn spawn_refresh_loop(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        while ticks.next().await.is_some() {
            refresh_once(&state).await;
        }
    });
}

fn app(state: AppState) -> Router {
    Router::new()
        // This will serve files from the "static" directory at the "/static" URL path
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(home))
        .route("/api/games", get(api_games))
        .route("/api/charts", get(api_charts))
        .route("/api/history", get(api_history))
        .route("/api/picks", get(api_picks))
        .route("/api/refresh", post(api_refresh))
        .route("/chat", get(read_chat).post(post_chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    let pipeline = Arc::new(build_pipeline(&config).await?);

    println!("Fetching this week's slate...");

    // Fetch data on startup
    let data = match refresh_current_week(&pipeline).await {
        Ok(Some(data)) => {
            println!("Data loaded successfully");
            println!("  - {} games", data.games.len());
            println!("  - {} expert picks", data.expert_picks.len());
            if !data.issues.is_empty() {
                println!("  - {} rows with problems", data.issues.len());
            }
            Some(data)
        }
        Ok(None) => None,
        Err(e) => {
            eprintln!("Error fetching data: {:#}", e);
            eprintln!("Server will start and retry every {:?}", config.refresh_interval);
            None
        }
    };

    let state = AppState {
        data: Arc::new(RwLock::new(data)),
        pipeline,
    };
    spawn_refresh_loop(state.clone(), config.refresh_interval);

    let address = config.bind_address();
    println!("\nStarting web server at http://{}", address);
    println!("Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::NaiveDate;
    use pickem_odds::{ChatMessage, DateWindow, RawRow, StaticSource, Store};
    use tower::ServiceExt;

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

    async fn state() -> AppState {
        let store = Store::in_memory().await.unwrap();
        let source = StaticSource::new(
            vec![
                raw("Detroit Lions", "Chicago Bears", "-150", "+130"),
                raw("Kansas City Chiefs", "Buffalo Bills", "-300", "+250"),
            ],
            vec![],
        );
        AppState {
            data: Arc::new(RwLock::new(None)),
            pipeline: Arc::new(Pipeline::new(Box::new(source), store)),
        }
    }

    async fn load(state: &AppState) {
        let window = DateWindow::parse("2023-12-05", "2023-12-11").unwrap();
        let now = NaiveDate::from_ymd_opt(2023, 12, 6)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let data = state.pipeline.refresh_at(window, now).await.unwrap().unwrap();
        *state.data.write().await = Some(data);
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_chat_request(message: &str) -> Request<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("message={}", message)))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 50000))));
        request
    }

    #[test]
    fn test_filters() {
        assert_eq!(filters::format_odds(&150).unwrap(), "+150");
        assert_eq!(filters::format_odds(&-110).unwrap(), "-110");
        assert_eq!(filters::format_odds(&0).unwrap(), "EVEN");
        assert_eq!(filters::format_points(&1.0).unwrap(), "+1.0");
    }

    #[tokio::test]
    async fn test_api_games_before_first_refresh() {
        let response = app(state().await).oneshot(get("/api/games")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_home_renders_while_loading() {
        let response = app(state().await).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("still loading"));
    }

    #[tokio::test]
    async fn test_home_and_games_after_refresh() {
        let state = state().await;
        load(&state).await;

        let response = app(state.clone()).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("Kansas City Chiefs"));
        assert!(html.contains("+250"));

        let response = app(state).oneshot(get("/api/games")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let games: Vec<GameRecord> = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_team, "Kansas City Chiefs");
    }

    #[tokio::test]
    async fn test_api_history_window() {
        let state = state().await;
        load(&state).await;

        let response = app(state.clone())
            .oneshot(get("/api/history?start=2023-12-06&end=2023-12-06"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let observations: Vec<serde_json::Value> =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(observations.len(), 4);

        let response = app(state)
            .oneshot(get("/api/history?start=yesterday&end=2023-12-06"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_post_then_read() {
        let state = state().await;

        let response = app(state.clone())
            .oneshot(post_chat_request("go+lions"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app(state.clone())
            .oneshot(post_chat_request("+++"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app(state).oneshot(get("/chat")).await.unwrap();
        let messages: Vec<ChatMessage> = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message, "go lions");
        assert_eq!(messages[0].ip, "10.0.0.7");
    }
}
