//! Half-move navigation over a loaded game.
//!
//! The timeline has `2 * moves.len()` slots: slot 0 is the starting position,
//! slot `n >= 1` is the position after the `n`-th half-move. Every index that
//! enters the controller is clamped, never rejected.

use std::str::FromStr;
use std::sync::Arc;

use crate::game_data::{GameRecord, KeyMoment, MoveRecord, STANDARD_START_FEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    First,
    Previous,
    Next,
    Last,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Step::First),
            "previous" | "prev" => Ok(Step::Previous),
            "next" => Ok(Step::Next),
            "last" => Ok(Step::Last),
            other => Err(format!("unknown step direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub current_half_move: usize,
}

/// Single owner of the displayed half-move. Board, move list and key-moment
/// overlay all read from here so they cannot disagree.
#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    game: Option<Arc<GameRecord>>,
    state: NavigationState,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_game(&mut self, game: Arc<GameRecord>) {
        self.game = Some(game);
        self.state = NavigationState::default();
    }

    pub fn clear(&mut self) {
        self.game = None;
        self.state = NavigationState::default();
    }

    pub fn game(&self) -> Option<&GameRecord> {
        self.game.as_deref()
    }

    fn moves(&self) -> &[MoveRecord] {
        self.game.as_deref().map(|g| g.moves.as_slice()).unwrap_or(&[])
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn current_half_move(&self) -> usize {
        self.state.current_half_move
    }

    pub fn last_valid_half_move(&self) -> usize {
        (2 * self.moves().len()).saturating_sub(1)
    }

    pub fn select_half_move(&mut self, index: i64) {
        let last = self.last_valid_half_move() as i64;
        self.state.current_half_move = index.clamp(0, last) as usize;
    }

    pub fn step(&mut self, direction: Step) {
        let current = self.state.current_half_move as i64;
        match direction {
            Step::First => self.select_half_move(0),
            Step::Previous => self.select_half_move(current - 1),
            Step::Next => self.select_half_move(current + 1),
            Step::Last => self.select_half_move(self.last_valid_half_move() as i64),
        }
    }

    pub fn is_at_start(&self) -> bool {
        self.state.current_half_move == 0
    }

    pub fn is_at_end(&self) -> bool {
        self.state.current_half_move >= self.last_valid_half_move()
    }

    /// FEN to render for the current half-move. A game starting with Black
    /// to move has no White half in its first pair, so half-moves 1 and 2
    /// both show the position after Black's first move.
    pub fn current_position(&self) -> &str {
        let moves = self.moves();
        let n = self.state.current_half_move;
        if n == 0 || moves.is_empty() {
            return STANDARD_START_FEN;
        }

        let pair_index = (n - 1) / 2;
        let is_white_half = (n - 1) % 2 == 0;

        // Index computed against a game that has since been replaced.
        if pair_index > moves.len() - 1 {
            return &moves[moves.len() - 1].position_fen;
        }

        let record = &moves[pair_index];
        if is_white_half {
            record
                .position_after_white
                .as_deref()
                .unwrap_or(&record.position_fen)
        } else {
            &record.position_fen
        }
    }

    /// Row of the move list to emphasise. Agrees with the pair used by
    /// `current_position` for every half-move past the start.
    pub fn current_move_list_index(&self) -> usize {
        let len = self.moves().len() as i64;
        if len == 0 {
            return 0;
        }
        let n = self.state.current_half_move as i64;
        (n - 1).div_euclid(2).clamp(0, len - 1) as usize
    }

    /// Key moment for the current half-move. Looks up
    /// `(current_half_move + 1) / 2`, one ahead of the row formula at even
    /// indices; both lookups are kept as they drive different elements.
    pub fn current_key_moment(&self) -> Option<&KeyMoment> {
        let game = self.game.as_deref()?;
        let move_number = ((self.state.current_half_move + 1) / 2) as u32;
        game.key_moment_for(move_number)
    }

    /// `"3. Bb5"` / `"3... a6"` for the half-move just played.
    pub fn current_move_label(&self) -> Option<String> {
        let n = self.state.current_half_move;
        if n == 0 {
            return None;
        }
        let record = self.moves().get(self.current_move_list_index())?;
        if (n - 1) % 2 == 0 {
            record.white.as_ref().map(|san| format!("{}. {}", record.number, san))
        } else {
            record.black.as_ref().map(|san| format!("{}... {}", record.number, san))
        }
    }
}
