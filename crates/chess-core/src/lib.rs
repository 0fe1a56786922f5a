//! Game model, PGN extraction and the review-side state that sits on top
//! of it: half-move navigation, move list, board view and coaching log.

pub mod board;
pub mod coaching;
pub mod format;
pub mod game_data;
pub mod move_list;
pub mod navigation;
pub mod pgn;
pub mod session;

pub use game_data::{flatten_moves, GameMetadata, GameRecord, KeyMoment, MoveRecord, STANDARD_START_FEN};
pub use navigation::{NavigationController, Step};
