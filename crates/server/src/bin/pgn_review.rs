//! Terminal review client for a running PGN coach server.
//!
//! Usage: cargo run --bin pgn-review -- game.pgn
//!
//! Reads PGN_COACH_URL (default http://localhost:8000) for the server address.

use std::str::FromStr;

use anyhow::Context;
use chess_core::coaching::{
    start_recording, AnalysisWithVoice, AudioStream, CoachRequest, CoachingReply, Microphone, Role,
};
use chess_core::format::{format_coaching_text, render_plain};
use chess_core::move_list::NavCommand;
use chess_core::session::{validate_submission, ReviewSession, SubmissionInput};
use chess_core::{GameRecord, Step};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "Commands:
  n | p | g | G        next, previous, first, last half-move
  <number>             jump to that half-move
  row <n>              select move-list row n (0-based)
  km <move>            jump to the key moment on that move number
  moves                print the move list
  flip                 flip the board
  ask <question>       ask the coach about this game
  voice <file>         ask with a recorded question (.webm, .ogg or .wav)
  help | quit";

struct Api {
    client: reqwest::Client,
    base_url: String,
}

impl Api {
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, String> {
        let request = self.client.post(format!("{}{}", self.base_url, path)).multipart(form);
        Self::read(request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, String> {
        let request = self.client.post(format!("{}{}", self.base_url, path)).json(body);
        Self::read(request).await
    }

    async fn read<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, String> {
        let resp = request.send().await.map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            let detail = body["detail"].as_str().unwrap_or("request failed");
            return Err(format!("{status}: {detail}"));
        }
        resp.json().await.map_err(|e| e.to_string())
    }
}

/// Stands in for a microphone: a recording already on disk, accepted only
/// for the encoding its extension names.
struct RecordingFile {
    path: String,
}

struct RecordedStream(Vec<u8>);

impl AudioStream for RecordedStream {
    fn stop(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

impl Microphone for RecordingFile {
    type Stream = RecordedStream;

    fn open(&mut self, encoding: &str) -> Result<RecordedStream, String> {
        let extension = encoding.rsplit('/').next().unwrap_or_default();
        if !self.path.to_ascii_lowercase().ends_with(&format!(".{extension}")) {
            return Err(format!("{} is not {encoding}", self.path));
        }
        std::fs::read(&self.path).map(RecordedStream).map_err(|e| e.to_string())
    }
}

fn print_position(session: &ReviewSession, flipped: bool) {
    let board = session.board();
    let board = if flipped { board.flipped() } else { board };
    println!("\n{}", board.render_ascii());

    let nav = session.navigation();
    match nav.current_move_label() {
        Some(label) => println!("Half-move {}/{}: {label}", nav.current_half_move(), nav.last_valid_half_move()),
        None => println!("Start position"),
    }

    if let Some(moment) = session.current_key_moment() {
        let evaluation = moment.evaluation.as_deref().unwrap_or("");
        println!("Key moment {} {} {evaluation}", moment.move_number, moment.move_text);
        println!("  {}", moment.analysis_text);
    }
}

fn print_moves(session: &ReviewSession) {
    for row in session.rows() {
        let marker = if row.highlighted { ">" } else { " " };
        println!("{marker} {:>3}  {}", row.index, row.full_move);
    }
    let cards = session.key_moment_cards();
    if !cards.is_empty() {
        println!("Key moments:");
        for card in cards {
            let marker = if card.active { ">" } else { " " };
            println!("{marker} {}. {} ({:?})", card.move_number, card.move_text, card.tone);
        }
    }
}

async fn ask(api: &Api, session: &mut ReviewSession, question: &str) {
    let request: CoachRequest = match session.ask_coach(question) {
        Ok(request) => request,
        Err(rejected) => {
            println!("{rejected}");
            return;
        }
    };

    let before = session.coaching().messages().len();
    let outcome = api.post::<_, CoachingReply>("/coach", &request).await;
    session.coach_replied(outcome);

    for message in &session.coaching().messages()[before..] {
        if message.role == Role::User {
            continue;
        }
        println!("{}\n", render_plain(&format_coaching_text(&message.content)));
    }
}

async fn ask_by_voice(api: &Api, session: &mut ReviewSession, pgn: &str, path: &str) {
    let mut recording = RecordingFile { path: path.to_string() };
    let logged = session.coaching().messages().len();
    let Some(capture) = start_recording(&mut recording, session.coaching_mut()) else {
        print_new_messages(session, logged);
        return;
    };
    let request = match session.ask_coach_by_voice(pgn, capture) {
        Ok(request) => request,
        Err(rejected) => {
            println!("{rejected}");
            return;
        }
    };

    let before = session.coaching().messages().len();
    let outcome = async {
        let audio = reqwest::multipart::Part::bytes(request.audio.clone())
            .file_name(request.file_name())
            .mime_str(request.encoding)
            .map_err(|e| e.to_string())?;
        let form = reqwest::multipart::Form::new()
            .text("pgn", request.pgn.clone())
            .part("audio_file", audio)
            .text("conversation_history", request.conversation_history.clone());
        api.post_form::<AnalysisWithVoice>("/analyze-with-voice", form).await
    }
    .await;

    if let Ok(reply) = &outcome {
        if let Some(coaching) = &reply.coaching {
            println!("(spoken reply: {} base64 bytes)", coaching.audio_response.len());
        }
    }
    session.voice_replied(outcome);
    print_new_messages(session, before);
}

fn print_new_messages(session: &ReviewSession, from: usize) {
    for message in &session.coaching().messages()[from..] {
        let prefix = if message.role == Role::User { "you: " } else { "" };
        println!("{prefix}{}\n", render_plain(&format_coaching_text(&message.content)));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let path = std::env::args().nth(1).context("usage: pgn-review <game.pgn>")?;
    let contents = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let pgn = validate_submission(SubmissionInput::File { name: path.clone(), contents })?;

    let api = Api {
        client: reqwest::Client::new(),
        base_url: std::env::var("PGN_COACH_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:8000".to_string()),
    };

    let mut session = ReviewSession::new();
    session.begin_analysis();
    println!("Analyzing {path}...");
    let outcome = api.post::<_, GameRecord>("/analyze", &json!({ "pgn": pgn })).await;
    session.finish_analysis(outcome);

    if let Some(error) = session.error() {
        anyhow::bail!("{error}");
    }
    if let Some(game) = session.game() {
        println!("\n{}", game.summary);
    }

    let mut flipped = false;
    print_position(&session, flipped);
    println!("\n{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => continue,
            "quit" | "q" => break,
            "help" => {
                println!("{HELP}");
                continue;
            }
            "moves" => {
                print_moves(&session);
                continue;
            }
            "flip" => flipped = !flipped,
            "ask" => {
                ask(&api, &mut session, rest).await;
                continue;
            }
            "voice" => {
                ask_by_voice(&api, &mut session, &pgn, rest.trim()).await;
                continue;
            }
            "row" => match rest.trim().parse() {
                Ok(row) => session.click_row(row),
                Err(_) => println!("row needs a number"),
            },
            "km" => match rest.trim().parse() {
                Ok(move_number) => session.click_key_moment(move_number),
                Err(_) => println!("km needs a move number"),
            },
            other => {
                if let Some(command) = NavCommand::from_key(other) {
                    session.step(command.0);
                } else if let Ok(step) = Step::from_str(other) {
                    session.step(step);
                } else if let Ok(index) = other.parse::<i64>() {
                    session.select_half_move(index);
                } else {
                    println!("Unknown command {other:?}, try help");
                    continue;
                }
            }
        }
        print_position(&session, flipped);
    }

    Ok(())
}
