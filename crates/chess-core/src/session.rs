//! Top-level review session: owns the loaded game, navigation and the
//! coaching conversation, and applies the submission/error policy.

use std::path::Path;
use std::sync::Arc;

use crate::board::BoardView;
use crate::coaching::{
    AnalysisWithVoice, AudioStream, CoachRequest, CoachingReply, CoachingSession, SubmitRejected,
    VoiceCapture, VoiceRequest,
};
use crate::game_data::{flatten_moves, GameRecord, KeyMoment};
use crate::move_list::{self, KeyMomentCard, MoveListRow};
use crate::navigation::{NavigationController, Step};

pub const ANALYSIS_FAILED: &str = "Failed to analyze game. Please check your PGN and try again.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a PGN or choose a file")]
    EmptyPgn,

    #[error("Please upload a .pgn file")]
    NotPgnFile,
}

#[derive(Debug, Clone)]
pub enum SubmissionInput {
    Text(String),
    File { name: String, contents: String },
}

/// Check a form submission before anything is sent; returns the PGN text.
pub fn validate_submission(input: SubmissionInput) -> Result<String, InputError> {
    let pgn = match input {
        SubmissionInput::Text(text) => text,
        SubmissionInput::File { name, contents } => {
            let is_pgn = Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pgn"));
            if !is_pgn {
                return Err(InputError::NotPgnFile);
            }
            contents
        }
    };

    if pgn.trim().is_empty() {
        return Err(InputError::EmptyPgn);
    }
    Ok(pgn)
}

#[derive(Debug, Default)]
pub struct ReviewSession {
    game: Option<Arc<GameRecord>>,
    navigation: NavigationController,
    coaching: CoachingSession,
    loading: bool,
    error: Option<String>,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game(&self) -> Option<&GameRecord> {
        self.game.as_deref()
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    pub fn coaching(&self) -> &CoachingSession {
        &self.coaching
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Enter the loading state. Refused while an analysis is outstanding.
    pub fn begin_analysis(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.error = None;
        true
    }

    /// Apply the outcome of `/analyze`. A failure clears the previous game
    /// so stale analysis is never shown.
    pub fn finish_analysis(&mut self, outcome: Result<GameRecord, String>) {
        self.loading = false;
        match outcome {
            Ok(game) => {
                tracing::info!(moves = game.moves.len(), "game loaded");
                let game = Arc::new(game);
                self.navigation.set_game(game.clone());
                self.game = Some(game);
                self.error = None;
            }
            Err(reason) => {
                tracing::warn!("analysis failed: {reason}");
                self.game = None;
                self.navigation.clear();
                self.error = Some(ANALYSIS_FAILED.to_string());
            }
        }
    }

    pub fn game_context(&self) -> Option<String> {
        self.game.as_deref().map(|g| flatten_moves(&g.moves))
    }

    pub fn step(&mut self, direction: Step) {
        self.navigation.step(direction);
    }

    pub fn select_half_move(&mut self, index: i64) {
        self.navigation.select_half_move(index);
    }

    pub fn click_row(&mut self, row: usize) {
        move_list::click_row(&mut self.navigation, row);
    }

    pub fn click_key_moment(&mut self, move_number: u32) {
        move_list::click_key_moment(&mut self.navigation, move_number);
    }

    pub fn board(&self) -> BoardView {
        BoardView::for_display(self.navigation.current_position())
    }

    pub fn rows(&self) -> Vec<MoveListRow> {
        move_list::rows(&self.navigation)
    }

    pub fn key_moment_cards(&self) -> Vec<KeyMomentCard> {
        move_list::key_moment_cards(&self.navigation)
    }

    pub fn current_key_moment(&self) -> Option<&KeyMoment> {
        self.navigation.current_key_moment()
    }

    pub fn ask_coach(&mut self, text: &str) -> Result<CoachRequest, SubmitRejected> {
        let context = self.game_context();
        self.coaching.prepare_submission(text, context)
    }

    pub fn coach_replied(&mut self, outcome: Result<CoachingReply, String>) {
        match outcome {
            Ok(reply) => self.coaching.apply_response(reply),
            Err(reason) => self.coaching.apply_failure(&reason),
        }
    }

    /// Stop the recording and build the voice request. The microphone is
    /// released even when the request is refused.
    pub fn ask_coach_by_voice<S: AudioStream>(
        &mut self,
        pgn: &str,
        capture: VoiceCapture<S>,
    ) -> Result<VoiceRequest, SubmitRejected> {
        let encoding = capture.encoding();
        let audio = capture.finish();
        self.coaching.prepare_voice_submission(pgn, audio, encoding)
    }

    pub fn voice_replied(&mut self, outcome: Result<AnalysisWithVoice, String>) {
        match outcome {
            Ok(AnalysisWithVoice { coaching: Some(coaching), .. }) => {
                self.coaching.apply_voice_response(coaching)
            }
            Ok(_) => self.coaching.apply_failure("voice reply carried no coaching"),
            Err(reason) => self.coaching.apply_failure(&reason),
        }
    }

    pub fn coaching_mut(&mut self) -> &mut CoachingSession {
        &mut self.coaching
    }
}
