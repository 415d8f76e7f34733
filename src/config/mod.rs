//! Configuration module for the voice agent gateway
//!
//! Configuration comes from environment variables (with `.env` loaded in
//! `main`) and, optionally, a YAML file whose values override the
//! environment. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_agent_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroize;

use crate::core::llm::LlmProvider;
use crate::core::media::MediaToolkit;
use crate::core::progress::ProbeConfig;
use crate::core::session::SessionConfig;
use crate::core::speech::HttpSpeechConfig;

mod env;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Failed to parse YAML config: {0}")]
    Yaml(String),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Server configuration
///
/// Everything needed to run the gateway: listener settings, the model
/// backend, the speech service, session and progress tunables, and the
/// media binaries.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub cors_allowed_origins: Option<String>,

    // Model backend
    pub llm_provider: LlmProvider,
    /// Overrides the provider's endpoint; required for `custom`
    pub llm_url: Option<String>,
    /// Overrides the provider's model; required for `custom`
    pub llm_model: Option<String>,
    pub llm_api_key: String,
    /// Accept plain `http` for loopback endpoints (local development only)
    pub allow_insecure_localhost: bool,

    // Speech service (OpenAI-compatible audio API)
    pub speech_api_key: Option<String>,
    pub speech_base_url: String,
    pub speech_transcription_model: String,
    pub speech_synthesis_model: String,
    pub speech_voice: String,
    pub speech_sample_rate: u32,
    pub speech_language: Option<String>,

    // Session
    pub history_cap: usize,
    pub voice_queue_capacity: usize,
    pub outbound_queue_capacity: usize,
    pub synthesis_teardown_ms: u64,
    /// Also speak replies to typed messages
    pub voice_replies_for_text: bool,

    // Progress tracking
    pub probe_interval_ms: u64,
    pub stale_threshold_ms: u64,
    pub structured_completion: bool,

    // Media
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let speech = HttpSpeechConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            cors_allowed_origins: None,
            llm_provider: LlmProvider::default(),
            llm_url: None,
            llm_model: None,
            llm_api_key: String::new(),
            allow_insecure_localhost: false,
            speech_api_key: None,
            speech_base_url: speech.base_url,
            speech_transcription_model: speech.transcription_model,
            speech_synthesis_model: speech.speech_model,
            speech_voice: speech.voice,
            speech_sample_rate: speech.sample_rate,
            speech_language: None,
            history_cap: crate::core::session::DEFAULT_HISTORY_CAP,
            voice_queue_capacity: crate::core::session::DEFAULT_VOICE_QUEUE_CAPACITY,
            outbound_queue_capacity: 1000,
            synthesis_teardown_ms: 100,
            voice_replies_for_text: false,
            probe_interval_ms: 2000,
            stale_threshold_ms: 5000,
            structured_completion: true,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        self.llm_api_key.zeroize();
        if let Some(ref mut key) = self.speech_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> ConfigResult<Self> {
        let config = env::load(|key| std::env::var(key).ok())?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration with the environment as base and YAML overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = env::load(|key| std::env::var(key).ok())?;
        yaml_config.apply(&mut config)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Build from an arbitrary key lookup; used by tests and embedding code.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = env::load(lookup)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Switch provider, keeping explicit url/model overrides.
    pub fn with_llm_provider(mut self, provider: LlmProvider) -> ConfigResult<Self> {
        self.llm_provider = provider;
        validation::validate(&self)?;
        Ok(self)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Effective chat-completions endpoint.
    pub fn llm_url(&self) -> String {
        self.llm_url
            .clone()
            .or_else(|| self.llm_provider.default_url().map(str::to_string))
            .unwrap_or_default()
    }

    /// Effective model id.
    pub fn llm_model(&self) -> String {
        self.llm_model
            .clone()
            .or_else(|| self.llm_provider.default_model().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.llm_model(),
            history_cap: self.history_cap,
            voice_queue_capacity: self.voice_queue_capacity,
            synthesis_teardown: Duration::from_millis(self.synthesis_teardown_ms),
            ..Default::default()
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            interval: Duration::from_millis(self.probe_interval_ms),
            stale_after: Duration::from_millis(self.stale_threshold_ms),
            structured_completion: self.structured_completion,
        }
    }

    /// Speech service settings, or `None` when no key is configured.
    pub fn speech_config(&self) -> Option<HttpSpeechConfig> {
        let api_key = self.speech_api_key.clone()?;
        Some(HttpSpeechConfig {
            api_key,
            base_url: self.speech_base_url.clone(),
            transcription_model: self.speech_transcription_model.clone(),
            speech_model: self.speech_synthesis_model.clone(),
            voice: self.speech_voice.clone(),
            sample_rate: self.speech_sample_rate,
            language: self.speech_language.clone(),
            allow_insecure_localhost: self.allow_insecure_localhost,
        })
    }

    pub fn media_toolkit(&self) -> MediaToolkit {
        MediaToolkit::new(&self.ffmpeg_path, &self.ffprobe_path)
    }
}
