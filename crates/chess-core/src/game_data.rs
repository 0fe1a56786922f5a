use serde::{Deserialize, Serialize};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// One numbered move pair, with the positions reached after each half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub number: u32,
    pub white: Option<String>,
    pub black: Option<String>,
    #[serde(default)]
    pub position_after_white: Option<String>,
    #[serde(default)]
    pub position_after_black: Option<String>,
    #[serde(default)]
    pub white_uci: Option<String>,
    #[serde(default)]
    pub black_uci: Option<String>,
    pub full_move: String, // "1. e4 e5"
    pub position_fen: String, // after the whole pair
    #[serde(default)]
    pub captured_piece_white: Option<String>,
    #[serde(default)]
    pub captured_piece_black: Option<String>,
    #[serde(default)]
    pub is_check_white: bool,
    #[serde(default)]
    pub is_check_black: bool,
    #[serde(default)]
    pub is_checkmate_white: bool,
    #[serde(default)]
    pub is_checkmate_black: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<String>,
}

impl MoveRecord {
    /// Empty record for move `number`, positioned at `fen` before either half is played.
    pub fn pending(number: u32, fen: String) -> Self {
        Self {
            number,
            white: None,
            black: None,
            position_after_white: None,
            position_after_black: None,
            white_uci: None,
            black_uci: None,
            full_move: format!("{number}."),
            position_fen: fen,
            captured_piece_white: None,
            captured_piece_black: None,
            is_check_white: false,
            is_check_black: false,
            is_checkmate_white: false,
            is_checkmate_black: false,
            analysis: None,
            evaluation: None,
        }
    }
}

/// Which side an evaluation tag favours. Only the sign characters matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalTone {
    White,
    Black,
    Balanced,
    Unknown,
}

impl EvalTone {
    pub fn classify(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return EvalTone::Unknown;
        };
        match tag.chars().find(|c| *c == '+' || *c == '-') {
            Some('+') => EvalTone::White,
            Some(_) => EvalTone::Black,
            None => EvalTone::Balanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    pub move_number: u32,
    #[serde(rename = "move")]
    pub move_text: String,
    #[serde(rename = "analysis")]
    pub analysis_text: String,
    #[serde(default)]
    pub evaluation: Option<String>, // "+=", "=", "-/+"
}

impl KeyMoment {
    pub fn tone(&self) -> EvalTone {
        EvalTone::classify(self.evaluation.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub opening_name: Option<String>,
    pub result: Option<String>,
    pub white_player: Option<String>,
    pub black_player: Option<String>,
    pub date: Option<String>,
}

/// A parsed and analysed game, as returned by `/analyze`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub moves: Vec<MoveRecord>,
    pub summary: String,
    pub key_moments: Vec<KeyMoment>,
    #[serde(flatten)]
    pub metadata: GameMetadata,
}

impl GameRecord {
    pub fn key_moment_for(&self, move_number: u32) -> Option<&KeyMoment> {
        self.key_moments.iter().find(|k| k.move_number == move_number)
    }
}

/// Moves joined one pair per line, the form the analysis and coaching prompts use.
pub fn flatten_moves(moves: &[MoveRecord]) -> String {
    moves
        .iter()
        .map(|m| m.full_move.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
