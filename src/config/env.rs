//! Environment variable loading.
//!
//! Keys are read through a lookup function so the same parsing code serves
//! both `std::env` and test fixtures.

use std::str::FromStr;

use super::{ConfigError, ConfigResult, ServerConfig};
use crate::core::llm::LlmProvider;

/// Read every known key and build a config on top of the defaults.
pub(super) fn load<F>(lookup: F) -> ConfigResult<ServerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut config = ServerConfig::default();

    if let Some(host) = get("HOST") {
        config.host = host;
    }
    if let Some(port) = parse(&get, "PORT")? {
        config.port = port;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.log_level = level;
    }
    config.cors_allowed_origins = get("CORS_ALLOWED_ORIGINS");

    if let Some(value) = get("LLM_TYPE") {
        config.llm_provider =
            LlmProvider::from_str(&value).map_err(|reason| ConfigError::Invalid {
                key: "LLM_TYPE",
                value,
                reason,
            })?;
    }
    config.llm_url = get("LLM_URL");
    config.llm_model = get("LLM_MODEL");
    if let Some(key) = get("LLM_API_KEY") {
        config.llm_api_key = key;
    }
    if let Some(flag) = parse_bool(&get, "LLM_ALLOW_INSECURE_LOCALHOST")? {
        config.allow_insecure_localhost = flag;
    }

    config.speech_api_key = get("SPEECH_API_KEY");
    if let Some(url) = get("SPEECH_BASE_URL") {
        config.speech_base_url = url;
    }
    if let Some(model) = get("SPEECH_TRANSCRIPTION_MODEL") {
        config.speech_transcription_model = model;
    }
    if let Some(model) = get("SPEECH_SYNTHESIS_MODEL") {
        config.speech_synthesis_model = model;
    }
    if let Some(voice) = get("SPEECH_VOICE") {
        config.speech_voice = voice;
    }
    if let Some(rate) = parse(&get, "SPEECH_SAMPLE_RATE")? {
        config.speech_sample_rate = rate;
    }
    config.speech_language = get("SPEECH_LANGUAGE");

    if let Some(cap) = parse(&get, "HISTORY_CAP")? {
        config.history_cap = cap;
    }
    if let Some(capacity) = parse(&get, "VOICE_QUEUE_CAPACITY")? {
        config.voice_queue_capacity = capacity;
    }
    if let Some(capacity) = parse(&get, "OUTBOUND_QUEUE_CAPACITY")? {
        config.outbound_queue_capacity = capacity;
    }
    if let Some(ms) = parse(&get, "SYNTHESIS_TEARDOWN_MS")? {
        config.synthesis_teardown_ms = ms;
    }
    if let Some(flag) = parse_bool(&get, "VOICE_REPLIES_FOR_TEXT")? {
        config.voice_replies_for_text = flag;
    }

    if let Some(ms) = parse(&get, "PROGRESS_PROBE_INTERVAL_MS")? {
        config.probe_interval_ms = ms;
    }
    if let Some(ms) = parse(&get, "PROGRESS_STALE_THRESHOLD_MS")? {
        config.stale_threshold_ms = ms;
    }
    if let Some(flag) = parse_bool(&get, "STRUCTURED_COMPLETION")? {
        config.structured_completion = flag;
    }

    if let Some(path) = get("FFMPEG_PATH") {
        config.ffmpeg_path = path;
    }
    if let Some(path) = get("FFPROBE_PATH") {
        config.ffprobe_path = path;
    }

    Ok(config)
}

fn parse<T, G>(get: &G, key: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
    }
}

pub(super) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool<G>(get: &G, key: &'static str) -> ConfigResult<Option<bool>>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => match parse_flag(&value) {
            Some(flag) => Ok(Some(flag)),
            None => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected true or false".to_string(),
            }),
        },
    }
}
