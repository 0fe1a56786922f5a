//! Board view: a FEN turned into something a renderer can draw.
//! Legality stays with shakmaty; this only lays pieces out.

use shakmaty::{fen::Fen, CastlingMode, Chess, Color, File, Piece, Position, Rank, Square};

use crate::game_data::STANDARD_START_FEN;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    White,
    Black,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoardMode {
    /// Display only; piece drags are refused.
    #[default]
    Analysis,
    Interactive,
}

#[derive(Debug, Clone)]
pub struct BoardView {
    position: Chess,
    fen: String,
    orientation: Orientation,
    mode: BoardMode,
}

impl BoardView {
    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        let position = Fen::from_ascii(fen.trim().as_bytes())
            .ok()
            .and_then(|f| f.into_position::<Chess>(CastlingMode::Chess960).ok())
            .ok_or_else(|| BoardError::InvalidFen(fen.to_string()))?;

        Ok(Self {
            position,
            fen: fen.trim().to_string(),
            orientation: Orientation::default(),
            mode: BoardMode::default(),
        })
    }

    /// Never fails: an unreadable FEN shows the starting position.
    pub fn for_display(fen: &str) -> Self {
        Self::from_fen(fen).unwrap_or_else(|e| {
            tracing::warn!("{e}; showing starting position");
            Self {
                position: Chess::default(),
                fen: STANDARD_START_FEN.to_string(),
                orientation: Orientation::default(),
                mode: BoardMode::default(),
            }
        })
    }

    pub fn with_mode(mut self, mode: BoardMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn flipped(mut self) -> Self {
        self.orientation = match self.orientation {
            Orientation::White => Orientation::Black,
            Orientation::Black => Orientation::White,
        };
        self
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square)
    }

    /// Ranks top to bottom as seen from the current orientation.
    pub fn grid(&self) -> Vec<Vec<Option<Piece>>> {
        let (ranks, files): (Vec<u32>, Vec<u32>) = match self.orientation {
            Orientation::White => ((0..8).rev().collect(), (0..8).collect()),
            Orientation::Black => ((0..8).collect(), (0..8).rev().collect()),
        };

        ranks
            .iter()
            .map(|&r| {
                files
                    .iter()
                    .map(|&f| self.piece_at(Square::from_coords(File::new(f), Rank::new(r))))
                    .collect()
            })
            .collect()
    }

    /// Text diagram with rank and file labels.
    pub fn render_ascii(&self) -> String {
        let (rank_labels, file_labels) = match self.orientation {
            Orientation::White => ("87654321", "abcdefgh"),
            Orientation::Black => ("12345678", "hgfedcba"),
        };

        let mut out = String::new();
        for (row, label) in self.grid().iter().zip(rank_labels.chars()) {
            out.push(label);
            out.push(' ');
            let cells: Vec<String> = row
                .iter()
                .map(|p| p.map(|p| p.char()).unwrap_or('.').to_string())
                .collect();
            out.push_str(&cells.join(" "));
            out.push('\n');
        }
        out.push_str("  ");
        out.push_str(&file_labels.chars().map(|c| c.to_string()).collect::<Vec<_>>().join(" "));
        out
    }

    /// Whether a drag from `from` to `to` would be accepted.
    pub fn try_drag(&self, from: &str, to: &str) -> bool {
        if self.mode == BoardMode::Analysis {
            return false;
        }
        let (Ok(from), Ok(to)) = (from.parse::<Square>(), to.parse::<Square>()) else {
            return false;
        };
        self.position
            .legal_moves()
            .iter()
            .any(|m| m.from() == Some(from) && m.to() == to)
    }
}
