use super::{ConfigError, ConfigResult, ServerConfig};
use crate::core::llm::LlmProvider;
use crate::utils::validate_llm_endpoint;

/// Check cross-field constraints after all sources have been merged.
pub(super) fn validate(config: &ServerConfig) -> ConfigResult<()> {
    if config.llm_api_key.trim().is_empty() {
        return Err(ConfigError::Missing("LLM_API_KEY"));
    }

    if config.llm_provider == LlmProvider::Custom {
        if config.llm_url.is_none() {
            return Err(ConfigError::Validation(
                "LLM_URL is required when LLM_TYPE is custom".to_string(),
            ));
        }
        if config.llm_model.is_none() {
            return Err(ConfigError::Validation(
                "LLM_MODEL is required when LLM_TYPE is custom".to_string(),
            ));
        }
    }

    let url = config.llm_url();
    validate_llm_endpoint(&url, config.allow_insecure_localhost).map_err(|e| {
        ConfigError::Invalid {
            key: "LLM_URL",
            value: url.clone(),
            reason: e.to_string(),
        }
    })?;

    if config.speech_api_key.is_some() {
        validate_llm_endpoint(&config.speech_base_url, config.allow_insecure_localhost).map_err(
            |e| ConfigError::Invalid {
                key: "SPEECH_BASE_URL",
                value: config.speech_base_url.clone(),
                reason: e.to_string(),
            },
        )?;
    }

    let positive = [
        ("HISTORY_CAP", config.history_cap as u64),
        ("VOICE_QUEUE_CAPACITY", config.voice_queue_capacity as u64),
        ("OUTBOUND_QUEUE_CAPACITY", config.outbound_queue_capacity as u64),
        ("PROGRESS_PROBE_INTERVAL_MS", config.probe_interval_ms),
        ("SPEECH_SAMPLE_RATE", u64::from(config.speech_sample_rate)),
    ];
    if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
    }

    Ok(())
}
