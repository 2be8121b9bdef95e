use thiserror::Error;

/// A single scraped field or row that could not be converted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid moneyline: {0:?}")]
    Moneyline(String),

    #[error("invalid date: {0:?}")]
    Date(String),

    #[error("malformed slate row: expected at least {expected} fields, found {found}")]
    RowShape { expected: usize, found: usize },

    #[error("invalid timestamp: {0:?}")]
    Timestamp(String),
}

/// The raw data source could not deliver a usable slate
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected page shape: {0}")]
    Shape(String),

    #[error("cache error: {0}")]
    Cache(String),
}

/// Store read or write failure
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt history row for game {game_id}: {source}")]
    CorruptRow { game_id: String, source: ParseError },
}

/// Anything that stops a pipeline entry point from producing a result
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
