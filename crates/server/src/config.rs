use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub stt_model: String,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4-turbo-preview".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            stt_model: "whisper-1".to_string(),
            request_timeout_secs: 120,
            max_upload_bytes: 25 * 1024 * 1024,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            chat_model: env::var("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            tts_model: env::var("OPENAI_TTS_MODEL").unwrap_or(defaults.tts_model),
            tts_voice: env::var("OPENAI_TTS_VOICE").unwrap_or(defaults.tts_voice),
            stt_model: env::var("OPENAI_STT_MODEL").unwrap_or(defaults.stt_model),
            request_timeout_secs: env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}
