//! PGN extraction: replays the mainline with shakmaty and records the
//! position after every half-move, grouped into numbered move pairs.

use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::{
    fen::Fen, san::San, CastlingMode, Chess, Color, EnPassantMode, Piece, Position,
};

use crate::game_data::{GameMetadata, MoveRecord};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("Empty PGN content")]
    Empty,

    #[error("Invalid PGN format - could not read game")]
    NoGame,

    #[error("No valid moves found in PGN")]
    NoMoves,

    #[error("Invalid FEN tag: {0}")]
    InvalidFen(String),

    #[error("Invalid moves in PGN: illegal move {san} at ply {ply}")]
    IllegalMove { ply: usize, san: String },

    #[error("Error reading PGN: {0}")]
    Read(String),
}

/// Move pairs and header metadata of the first game in a PGN string.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub moves: Vec<MoveRecord>,
    pub metadata: GameMetadata,
}

/// Parse the first game of `pgn` into move pairs plus metadata.
pub fn extract_moves_from_pgn(pgn: &str) -> Result<ParsedGame, PgnError> {
    if pgn.trim().is_empty() {
        return Err(PgnError::Empty);
    }

    let mut reader = Reader::new(pgn.as_bytes());
    let mut extractor = MoveExtractor;

    match reader.read_game(&mut extractor) {
        Ok(Some(result)) => result,
        Ok(None) => Err(PgnError::NoGame),
        Err(e) => Err(PgnError::Read(e.to_string())),
    }
}

/// Tags collected during header parsing.
#[derive(Default)]
struct GameTags {
    metadata: GameMetadata,
    start: Option<Result<Chess, PgnError>>,
}

/// State during movetext parsing.
struct MovetextState {
    pos: Chess,
    ply: usize,
    metadata: GameMetadata,
    moves: Vec<MoveRecord>,
    current: MoveRecord,
}

impl MovetextState {
    fn new(pos: Chess, metadata: GameMetadata) -> Self {
        let number = pos.fullmoves().get();
        let fen = fen_of(&pos);
        Self {
            pos,
            ply: 0,
            metadata,
            moves: Vec::new(),
            current: MoveRecord::pending(number, fen),
        }
    }
}

struct MoveExtractor;

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

impl Visitor for MoveExtractor {
    type Tags = GameTags;
    type Movetext = MovetextState;
    type Output = Result<ParsedGame, PgnError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, GameTags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(&mut self, tags: &mut GameTags, name: &[u8], value: RawTag<'_>) -> ControlFlow<Self::Output> {
        let text = || Some(value.decode_utf8_lossy().into_owned());
        match name {
            b"Opening" => tags.metadata.opening_name = text(),
            b"Result" => tags.metadata.result = text(),
            b"White" => tags.metadata.white_player = text(),
            b"Black" => tags.metadata.black_player = text(),
            b"Date" => tags.metadata.date = text(),
            b"FEN" => {
                let raw = value.decode_utf8_lossy().into_owned();
                let start = Fen::from_ascii(raw.as_bytes())
                    .ok()
                    .and_then(|fen| fen.into_position::<Chess>(CastlingMode::Chess960).ok())
                    .ok_or(PgnError::InvalidFen(raw));
                tags.start = Some(start);
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: GameTags) -> ControlFlow<Self::Output, MovetextState> {
        let pos = match tags.start {
            Some(Ok(pos)) => pos,
            Some(Err(e)) => return ControlFlow::Break(Err(e)),
            None => Chess::default(),
        };

        ControlFlow::Continue(MovetextState::new(pos, tags.metadata))
    }

    fn san(&mut self, state: &mut MovetextState, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        state.ply += 1;

        let mv = match san_plus.san.to_move(&state.pos) {
            Ok(mv) => mv,
            Err(_) => {
                return ControlFlow::Break(Err(PgnError::IllegalMove {
                    ply: state.ply,
                    san: san_plus.to_string(),
                }))
            }
        };

        let mover = state.pos.turn();
        let captured = mv.capture().map(|role| Piece { color: !mover, role }.char().to_string());
        let san = San::from_move(&state.pos, mv.clone()).to_string();
        let uci = mv.clone().to_uci(CastlingMode::Standard).to_string();

        state.pos.play_unchecked(mv);

        let is_checkmate = state.pos.is_checkmate();
        let is_check = state.pos.is_check();
        let san = if is_checkmate {
            format!("{san}#")
        } else if is_check {
            format!("{san}+")
        } else {
            san
        };
        let fen = fen_of(&state.pos);

        let current = &mut state.current;
        match mover {
            Color::White => {
                current.full_move = format!("{}. {}", current.number, san);
                current.white = Some(san);
                current.white_uci = Some(uci);
                current.position_after_white = Some(fen.clone());
                current.position_fen = fen;
                current.captured_piece_white = captured;
                current.is_check_white = is_check;
                current.is_checkmate_white = is_checkmate;
            }
            Color::Black => {
                current.full_move = match &current.white {
                    Some(white) => format!("{}. {} {}", current.number, white, san),
                    None => format!("{}... {}", current.number, san),
                };
                current.black = Some(san);
                current.black_uci = Some(uci);
                current.position_after_black = Some(fen.clone());
                current.position_fen = fen.clone();
                current.captured_piece_black = captured;
                current.is_check_black = is_check;
                current.is_checkmate_black = is_checkmate;

                let next = MoveRecord::pending(current.number + 1, fen);
                let finished = std::mem::replace(current, next);
                state.moves.push(finished);
            }
        }

        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _state: &mut MovetextState) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true)) // mainline only
    }

    fn end_game(&mut self, state: MovetextState) -> Self::Output {
        let MovetextState { mut moves, current, metadata, .. } = state;

        // Game ended after White's half of the last pair.
        if current.white.is_some() {
            moves.push(current);
        }

        if moves.is_empty() {
            return Err(PgnError::NoMoves);
        }

        Ok(ParsedGame { moves, metadata })
    }
}
