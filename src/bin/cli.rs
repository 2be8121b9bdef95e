use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use pickem_odds::utils::data::{load_from_cache, save_games_to_csv, save_history_to_csv};
use pickem_odds::{
    build_pipeline, current_week_window, AppConfig, Pipeline, RawRow, StaticSource, Store,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pickem")]
#[command(about = "NFL pick'em pool odds: scrape, rank and track moneylines", long_about = None)]
struct Cli {
    /// SQLite database, overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the slate, rank it and log any changes
    Refresh {
        /// First game date (YYYY-MM-DD), defaults to this week's Tuesday
        #[arg(long)]
        start: Option<String>,

        /// Last game date (YYYY-MM-DD), defaults to this week's Monday
        #[arg(long)]
        end: Option<String>,

        /// Read raw rows from a JSON file instead of the sportsbook
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Also write the ranked games to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show the logged odds history for a window
    History {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Write the per-team history to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show the expert consensus for this week
    Picks,

    /// Create the database tables
    InitDb,
}

/// Explicit window or the pool week containing today
fn window_args(start: Option<String>, end: Option<String>) -> (String, String) {
    let week = current_week_window(Local::now().date_naive());
    (
        start.unwrap_or_else(|| week.start.to_string()),
        end.unwrap_or_else(|| week.end.to_string()),
    )
}

async fn pipeline_for(config: &AppConfig, from_file: Option<PathBuf>) -> Result<Pipeline> {
    match from_file {
        Some(path) => {
            println!("Loading slate from file: {}\n", path.display());
            let rows: Vec<RawRow> = load_from_cache(&path)?;
            let store = Store::connect(&config.database_url)
                .await
                .with_context(|| format!("Failed to open database {}", config.database_url))?;
            Ok(Pipeline::new(
                Box::new(StaticSource::new(rows, Vec::new())),
                store,
            ))
        }
        None => build_pipeline(config).await,
    }
}

async fn refresh(
    config: &AppConfig,
    start: Option<String>,
    end: Option<String>,
    from_file: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let (start, end) = window_args(start, end);
    let pipeline = pipeline_for(config, from_file).await?;

    println!("Fetching slate for {} to {}...\n", start, end);
    let batch = pipeline
        .get_data(&start, &end)
        .await
        .context("Failed to refresh slate")?;

    if batch.games.is_empty() {
        println!("No games found in this window.");
    } else {
        println!("Ranked {} games:\n", batch.games.len());
        for (i, game) in batch.games.iter().enumerate() {
            println!("{:>2}. {}", i + 1, game.format());
        }
    }

    if !batch.issues.is_empty() {
        println!("\nRows with problems:");
        for issue in &batch.issues {
            let action = if issue.dropped { "dropped" } else { "kept" };
            println!(
                "  - {} vs {} ({}): {}",
                issue.home_team, issue.away_team, action, issue.reason
            );
        }
    }

    println!(
        "\nLogged {} new entries ({} unchanged, {} failed)",
        batch.log.inserted,
        batch.log.unchanged,
        batch.log.failures.len()
    );

    if let Some(path) = csv {
        save_games_to_csv(&batch.games, &path)?;
        println!("Saved games to {}", path.display());
    }

    Ok(())
}

async fn history(
    config: &AppConfig,
    start: Option<String>,
    end: Option<String>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let (start, end) = window_args(start, end);
    let store = Store::connect(&config.database_url).await?;
    // reading history never touches the network
    let pipeline = Pipeline::new(Box::new(StaticSource::default()), store);

    let history = pipeline
        .load_historical_data(&start, &end)
        .await
        .context("Failed to load history")?;

    if history.is_empty() {
        println!("No history logged between {} and {}.", start, end);
        return Ok(());
    }

    println!(
        "{} log entries between {} and {}\n",
        history.entries().len(),
        start,
        end
    );

    for series in history.points_series() {
        let values: Vec<String> = series
            .points
            .iter()
            .map(|p| format!("{:+.1}", p.value))
            .collect();
        println!("{:<24} {}", series.team, values.join(" "));
    }

    if let Some(path) = csv {
        let written = save_history_to_csv(history.iter(), &path)?;
        println!("\nSaved {} rows to {}", written, path.display());
    }

    Ok(())
}

async fn picks(config: &AppConfig) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let consensus_picks = pipeline.expert_consensus().await;

    if consensus_picks.is_empty() {
        println!("No expert picks available.");
        return Ok(());
    }

    println!("{}\n", consensus_picks[0].week);
    for pick in &consensus_picks {
        println!("{:<28} {:<14} {}", pick.game, pick.time, pick.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    match cli.command {
        Commands::Refresh {
            start,
            end,
            from_file,
            csv,
        } => refresh(&config, start, end, from_file, csv).await,
        Commands::History { start, end, csv } => history(&config, start, end, csv).await,
        Commands::Picks => picks(&config).await,
        Commands::InitDb => {
            Store::connect(&config.database_url).await?;
            println!("Database ready at {}", config.database_url);
            Ok(())
        }
    }
}
