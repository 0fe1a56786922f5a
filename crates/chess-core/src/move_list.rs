//! Move list and key-moment overlay, derived from the navigation controller
//! on every render.

use serde::Serialize;

use crate::game_data::EvalTone;
use crate::navigation::{NavigationController, Step};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveListRow {
    pub index: usize,
    pub number: u32,
    pub white: Option<String>,
    pub black: Option<String>,
    pub full_move: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMomentCard {
    pub move_number: u32,
    pub move_text: String,
    pub analysis: String,
    pub evaluation: Option<String>,
    pub tone: EvalTone,
    pub active: bool,
}

/// Rows for the move list. Nothing is highlighted before the first half-move.
pub fn rows(nav: &NavigationController) -> Vec<MoveListRow> {
    let Some(game) = nav.game() else {
        return Vec::new();
    };
    let highlighted = (!nav.is_at_start()).then(|| nav.current_move_list_index());

    game.moves
        .iter()
        .enumerate()
        .map(|(index, m)| MoveListRow {
            index,
            number: m.number,
            white: m.white.clone(),
            black: m.black.clone(),
            full_move: m.full_move.clone(),
            highlighted: highlighted == Some(index),
        })
        .collect()
}

pub fn key_moment_cards(nav: &NavigationController) -> Vec<KeyMomentCard> {
    let Some(game) = nav.game() else {
        return Vec::new();
    };
    let active = nav.current_key_moment().map(|k| k.move_number);

    game.key_moments
        .iter()
        .map(|k| KeyMomentCard {
            move_number: k.move_number,
            move_text: k.move_text.clone(),
            analysis: k.analysis_text.clone(),
            evaluation: k.evaluation.clone(),
            tone: k.tone(),
            active: active == Some(k.move_number),
        })
        .collect()
}

/// Half-move selected by clicking row `row`: White's half of that pair.
pub fn row_click_target(row: usize) -> i64 {
    2 * row as i64 + 1
}

pub fn click_row(nav: &mut NavigationController, row: usize) {
    nav.select_half_move(row_click_target(row));
}

/// Half-move selected by clicking the card for `move_number`.
pub fn key_moment_click_target(move_number: u32) -> i64 {
    2 * move_number as i64 - 1
}

pub fn click_key_moment(nav: &mut NavigationController, move_number: u32) {
    nav.select_half_move(key_moment_click_target(move_number));
}

/// Keyboard shortcuts for the navigation buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavCommand(pub Step);

impl NavCommand {
    pub fn from_key(key: &str) -> Option<Self> {
        let step = match key {
            "ArrowLeft" | "Left" | "h" | "p" => Step::Previous,
            "ArrowRight" | "Right" | "l" | "n" => Step::Next,
            "Home" | "g" => Step::First,
            "End" | "G" => Step::Last,
            _ => return None,
        };
        Some(NavCommand(step))
    }

    pub fn apply(self, nav: &mut NavigationController) {
        nav.step(self.0);
    }
}
