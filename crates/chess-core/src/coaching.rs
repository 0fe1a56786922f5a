//! Coaching conversation state: an append-only message log plus the
//! single-request-in-flight rule for the send control.

use serde::{Deserialize, Serialize};

use crate::game_data::GameRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Body of `POST /coach`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachRequest {
    pub message: String,
    #[serde(default)]
    pub game_context: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

/// Response of `POST /coach`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingReply {
    pub response: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<String>,
}

impl CoachingReply {
    /// Text form of a spoken reply.
    pub fn from_voice(coaching: VoiceCoaching) -> Self {
        Self {
            response: coaching.text_response,
            suggestions: coaching.suggestions,
            next_steps: coaching.next_steps,
            evaluation: coaching.evaluation,
        }
    }
}

/// `coaching` object of `POST /analyze-with-voice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCoaching {
    /// Base64 audio of `text_response`.
    pub audio_response: String,
    pub text_response: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub next_steps: Option<Vec<String>>,
    #[serde(default)]
    pub evaluation: Option<String>,
    /// What the player said, as transcribed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

/// Response of `POST /analyze-with-voice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWithVoice {
    pub game_analysis: GameRecord,
    #[serde(default)]
    pub coaching: Option<VoiceCoaching>,
}

/// Form fields for `POST /analyze-with-voice`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRequest {
    pub pgn: String,
    pub audio: Vec<u8>,
    /// MIME type the audio was recorded with.
    pub encoding: &'static str,
    /// Prior messages, JSON-encoded.
    pub conversation_history: String,
}

impl VoiceRequest {
    /// `recording.webm` for `audio/webm`, and so on.
    pub fn file_name(&self) -> String {
        let extension = self.encoding.rsplit('/').next().unwrap_or("wav");
        format!("recording.{extension}")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitRejected {
    #[error("message is empty")]
    Blank,

    #[error("a coaching request is already in flight")]
    InFlight,
}

pub const COACH_UNAVAILABLE: &str =
    "Sorry, I couldn't reach the coach just now. Please try again in a moment.";

#[derive(Debug, Clone, Default)]
pub struct CoachingSession {
    messages: Vec<ChatMessage>,
    in_flight: bool,
}

impl CoachingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Append the user's message and build the request for it. Blank text is
    /// never sent, and nothing is sent while a reply is pending.
    pub fn prepare_submission(
        &mut self,
        text: &str,
        game_context: Option<String>,
    ) -> Result<CoachRequest, SubmitRejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitRejected::Blank);
        }
        if self.in_flight {
            return Err(SubmitRejected::InFlight);
        }

        let request = CoachRequest {
            message: text.to_string(),
            game_context,
            conversation_history: self.messages.clone(),
        };
        self.messages.push(ChatMessage::user(text));
        self.in_flight = true;
        Ok(request)
    }

    /// Build a voice request from a finished recording. Same gate as text:
    /// an empty recording is never sent, and nothing is sent while a reply is pending.
    pub fn prepare_voice_submission(
        &mut self,
        pgn: &str,
        audio: Vec<u8>,
        encoding: &'static str,
    ) -> Result<VoiceRequest, SubmitRejected> {
        if audio.is_empty() {
            return Err(SubmitRejected::Blank);
        }
        if self.in_flight {
            return Err(SubmitRejected::InFlight);
        }

        let conversation_history = serde_json::to_string(&self.messages).unwrap_or_else(|e| {
            tracing::warn!("could not encode conversation history: {e}");
            "[]".to_string()
        });
        self.in_flight = true;
        Ok(VoiceRequest { pgn: pgn.to_string(), audio, encoding, conversation_history })
    }

    /// Append the transcribed question, then the reply as for text.
    pub fn apply_voice_response(&mut self, mut coaching: VoiceCoaching) {
        if let Some(question) = coaching.transcript.take().filter(|q| !q.trim().is_empty()) {
            self.messages.push(ChatMessage::user(question.trim()));
        }
        self.apply_response(CoachingReply::from_voice(coaching));
    }

    pub fn apply_response(&mut self, reply: CoachingReply) {
        self.messages.push(ChatMessage::assistant(reply.response));
        if !reply.suggestions.is_empty() {
            self.messages.push(ChatMessage::assistant(bulleted("Suggestions:", &reply.suggestions)));
        }
        if let Some(steps) = reply.next_steps.filter(|s| !s.is_empty()) {
            self.messages.push(ChatMessage::assistant(bulleted("Next steps:", &steps)));
        }
        self.in_flight = false;
    }

    /// Record a failed request as a panel message; earlier messages stay.
    pub fn apply_failure(&mut self, reason: &str) {
        tracing::warn!("coaching request failed: {reason}");
        self.messages.push(ChatMessage::assistant(COACH_UNAVAILABLE));
        self.in_flight = false;
    }

    /// Record a local problem (e.g. no microphone) without touching the in-flight flag.
    pub fn notice(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }
}

fn bulleted(title: &str, items: &[String]) -> String {
    let mut out = title.to_string();
    for item in items {
        out.push_str("\n- ");
        out.push_str(item);
    }
    out
}

/// Encodings tried for a voice recording, preferred first.
pub const RECORDING_ENCODINGS: [&str; 3] = ["audio/webm", "audio/ogg", "audio/wav"];

/// A platform microphone. `open` acquires a stream for one encoding.
pub trait Microphone {
    type Stream: AudioStream;

    fn open(&mut self, encoding: &str) -> Result<Self::Stream, String>;
}

pub trait AudioStream {
    fn stop(&mut self) -> Vec<u8>;
}

/// An active recording. The stream is released on `finish` and on drop, so
/// every exit path stops the microphone.
pub struct VoiceCapture<S: AudioStream> {
    stream: Option<S>,
    encoding: &'static str,
}

impl<S: AudioStream> VoiceCapture<S> {
    /// Try each encoding in order until the microphone accepts one.
    pub fn start<M>(mic: &mut M) -> Result<Self, String>
    where
        M: Microphone<Stream = S>,
    {
        let mut last_error = String::from("no supported recording encoding");
        for encoding in RECORDING_ENCODINGS {
            match mic.open(encoding) {
                Ok(stream) => {
                    return Ok(Self { stream: Some(stream), encoding });
                }
                Err(e) => {
                    tracing::warn!("recording with {encoding} failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.stream.take().map(|mut s| s.stop()).unwrap_or_default()
    }
}

impl<S: AudioStream> Drop for VoiceCapture<S> {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}

/// Start a recording, reporting failure into the coaching panel.
pub fn start_recording<M: Microphone>(
    mic: &mut M,
    session: &mut CoachingSession,
) -> Option<VoiceCapture<M::Stream>> {
    match VoiceCapture::start(mic) {
        Ok(capture) => Some(capture),
        Err(e) => {
            session.notice(format!("Voice recording is unavailable: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn reply() -> CoachingReply {
        CoachingReply {
            response: "Develop your pieces.".into(),
            suggestions: vec!["Play Nf3".into(), "Castle early".into()],
            next_steps: Some(vec!["Review the opening".into()]),
            evaluation: None,
        }
    }

    #[test]
    fn test_blank_messages_are_not_sent() {
        let mut session = CoachingSession::new();
        assert_eq!(session.prepare_submission("", None), Err(SubmitRejected::Blank));
        assert_eq!(session.prepare_submission("  \n\t ", None), Err(SubmitRejected::Blank));
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_one_request_in_flight() {
        let mut session = CoachingSession::new();
        let request = session
            .prepare_submission(" Why 3. Bb5? ", Some("1. e4 e5".into()))
            .unwrap();
        assert_eq!(request.message, "Why 3. Bb5?");
        assert!(request.conversation_history.is_empty());
        assert!(session.is_busy());

        assert_eq!(
            session.prepare_submission("again", None),
            Err(SubmitRejected::InFlight)
        );
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_response_appends_assistant_messages() {
        let mut session = CoachingSession::new();
        session.prepare_submission("help", None).unwrap();
        session.apply_response(reply());

        let messages = session.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], ChatMessage::assistant("Develop your pieces."));
        assert_eq!(messages[2].content, "Suggestions:\n- Play Nf3\n- Castle early");
        assert_eq!(messages[3].content, "Next steps:\n- Review the opening");
        assert!(!session.is_busy());

        let next = session.prepare_submission("and then?", None).unwrap();
        assert_eq!(next.conversation_history.len(), 4);
        assert_eq!(next.conversation_history[0].role, Role::User);
    }

    #[test]
    fn test_failure_keeps_history() {
        let mut session = CoachingSession::new();
        session.prepare_submission("first", None).unwrap();
        session.apply_failure("HTTP 500");

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].content, "first");
        assert_eq!(session.messages()[1].content, COACH_UNAVAILABLE);
        assert!(!session.is_busy());
    }

    fn voice_reply() -> VoiceCoaching {
        VoiceCoaching {
            audio_response: "AQID".into(),
            text_response: "Guard f7.".into(),
            suggestions: vec!["Play Qe7".into()],
            next_steps: None,
            evaluation: Some("+-".into()),
            transcript: Some(" What went wrong? ".into()),
        }
    }

    #[test]
    fn test_voice_round_trip_appends_messages() {
        let mut session = CoachingSession::new();
        session.prepare_submission("hello", None).unwrap();
        session.apply_response(reply());

        let request = session
            .prepare_voice_submission("1. e4 e5", vec![9, 9], "audio/webm")
            .unwrap();
        assert_eq!(request.pgn, "1. e4 e5");
        assert_eq!(request.file_name(), "recording.webm");
        let history: Vec<ChatMessage> = serde_json::from_str(&request.conversation_history).unwrap();
        assert_eq!(history.len(), 4);
        assert!(session.is_busy());

        session.apply_voice_response(voice_reply());
        let messages = session.messages();
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[4], ChatMessage::user("What went wrong?"));
        assert_eq!(messages[5], ChatMessage::assistant("Guard f7."));
        assert_eq!(messages[6].content, "Suggestions:\n- Play Qe7");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_voice_submission_gated_like_text() {
        let mut session = CoachingSession::new();
        assert_eq!(
            session.prepare_voice_submission("", Vec::new(), "audio/wav"),
            Err(SubmitRejected::Blank)
        );

        session.prepare_voice_submission("", vec![1], "audio/wav").unwrap();
        assert_eq!(
            session.prepare_voice_submission("", vec![1], "audio/wav"),
            Err(SubmitRejected::InFlight)
        );
        assert_eq!(session.prepare_submission("typed", None), Err(SubmitRejected::InFlight));

        session.apply_failure("HTTP 500");
        assert!(!session.is_busy());
        assert!(session.prepare_voice_submission("", vec![1], "audio/wav").is_ok());
    }

    #[test]
    fn test_voice_reply_wire_format() {
        let reply: AnalysisWithVoice = serde_json::from_value(serde_json::json!({
            "game_analysis": { "moves": [], "summary": "s", "key_moments": [] },
            "coaching": { "audio_response": "AQID", "text_response": "t", "suggestions": ["a"],
                          "next_steps": null, "evaluation": null }
        }))
        .unwrap();
        let coaching = reply.coaching.unwrap();
        assert_eq!(coaching.transcript, None);
        assert_eq!(CoachingReply::from_voice(coaching).suggestions, vec!["a"]);
    }

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    struct FakeStream {
        stopped: Rc<RefCell<u32>>,
    }

    impl AudioStream for FakeStream {
        fn stop(&mut self) -> Vec<u8> {
            *self.stopped.borrow_mut() += 1;
            vec![1, 2, 3]
        }
    }

    struct FakeMic {
        supported: Vec<&'static str>,
        stopped: Rc<RefCell<u32>>,
    }

    impl Microphone for FakeMic {
        type Stream = FakeStream;

        fn open(&mut self, encoding: &str) -> Result<FakeStream, String> {
            if self.supported.contains(&encoding) {
                Ok(FakeStream { stopped: self.stopped.clone() })
            } else {
                Err(format!("{encoding} unsupported"))
            }
        }
    }

    #[test]
    fn test_recording_falls_back_and_releases() {
        let stopped = Rc::new(RefCell::new(0));
        let mut mic = FakeMic { supported: vec!["audio/wav"], stopped: stopped.clone() };

        let capture = VoiceCapture::start(&mut mic).unwrap();
        assert_eq!(capture.encoding(), "audio/wav");
        assert_eq!(capture.finish(), vec![1, 2, 3]);
        assert_eq!(*stopped.borrow(), 1);

        // Dropped without finishing: still released exactly once.
        let capture = VoiceCapture::start(&mut mic).unwrap();
        drop(capture);
        assert_eq!(*stopped.borrow(), 2);
    }

    #[test]
    fn test_recording_failure_becomes_panel_message() {
        let mut mic = FakeMic { supported: vec![], stopped: Rc::new(RefCell::new(0)) };
        let mut session = CoachingSession::new();

        assert!(start_recording(&mut mic, &mut session).is_none());
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages()[0].content.contains("audio/wav unsupported"));
    }
}
