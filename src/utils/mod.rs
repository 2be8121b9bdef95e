pub mod data;
pub mod normalize;
pub mod ranking;

pub use normalize::{current_week_window, normalize_rows, DateWindow, Normalized, RowIssue};
pub use ranking::rank_games;
