use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use super::{ConfigError, ConfigResult, ServerConfig};
use crate::core::llm::LlmProvider;

/// Complete YAML configuration structure
///
/// Every field is optional; values present in the file override whatever the
/// environment provided.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   log_level: "info"
///   cors_allowed_origins: "*"
///
/// llm:
///   type: "qwen"
///   api_key: "sk-..."
///   model: "qwen-max"
///
/// speech:
///   api_key: "sk-..."
///   base_url: "https://api.openai.com/v1"
///   voice: "alloy"
///
/// session:
///   history_cap: 20
///   voice_replies_for_text: false
///
/// progress:
///   probe_interval_ms: 2000
///   stale_threshold_ms: 5000
///
/// media:
///   ffmpeg_path: "/usr/bin/ffmpeg"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub llm: Option<LlmYaml>,
    pub speech: Option<SpeechYaml>,
    pub session: Option<SessionYaml>,
    pub progress: Option<ProgressYaml>,
    pub media: Option<MediaYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmYaml {
    /// qwen, yuanbao or custom
    #[serde(rename = "type")]
    pub provider: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub allow_insecure_localhost: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SpeechYaml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub transcription_model: Option<String>,
    pub synthesis_model: Option<String>,
    pub voice: Option<String>,
    pub sample_rate: Option<u32>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub history_cap: Option<usize>,
    pub voice_queue_capacity: Option<usize>,
    pub outbound_queue_capacity: Option<usize>,
    pub synthesis_teardown_ms: Option<u64>,
    pub voice_replies_for_text: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProgressYaml {
    pub probe_interval_ms: Option<u64>,
    pub stale_threshold_ms: Option<u64>,
    pub structured_completion: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MediaYaml {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_str(&contents)
    }

    /// Overlay the values present in the file onto `config`.
    pub fn apply(self, config: &mut ServerConfig) -> ConfigResult<()> {
        if let Some(server) = self.server {
            set(&mut config.host, server.host);
            set(&mut config.port, server.port);
            set(&mut config.log_level, server.log_level);
            set_opt(&mut config.cors_allowed_origins, server.cors_allowed_origins);
        }

        if let Some(llm) = self.llm {
            if let Some(value) = llm.provider {
                config.llm_provider =
                    LlmProvider::from_str(&value).map_err(|reason| ConfigError::Invalid {
                        key: "llm.type",
                        value,
                        reason,
                    })?;
            }
            set_opt(&mut config.llm_url, llm.url);
            set_opt(&mut config.llm_model, llm.model);
            set(&mut config.llm_api_key, llm.api_key);
            set(
                &mut config.allow_insecure_localhost,
                llm.allow_insecure_localhost,
            );
        }

        if let Some(speech) = self.speech {
            set_opt(&mut config.speech_api_key, speech.api_key);
            set(&mut config.speech_base_url, speech.base_url);
            set(
                &mut config.speech_transcription_model,
                speech.transcription_model,
            );
            set(&mut config.speech_synthesis_model, speech.synthesis_model);
            set(&mut config.speech_voice, speech.voice);
            set(&mut config.speech_sample_rate, speech.sample_rate);
            set_opt(&mut config.speech_language, speech.language);
        }

        if let Some(session) = self.session {
            set(&mut config.history_cap, session.history_cap);
            set(&mut config.voice_queue_capacity, session.voice_queue_capacity);
            set(
                &mut config.outbound_queue_capacity,
                session.outbound_queue_capacity,
            );
            set(&mut config.synthesis_teardown_ms, session.synthesis_teardown_ms);
            set(
                &mut config.voice_replies_for_text,
                session.voice_replies_for_text,
            );
        }

        if let Some(progress) = self.progress {
            set(&mut config.probe_interval_ms, progress.probe_interval_ms);
            set(&mut config.stale_threshold_ms, progress.stale_threshold_ms);
            set(
                &mut config.structured_completion,
                progress.structured_completion,
            );
        }

        if let Some(media) = self.media {
            set(&mut config.ffmpeg_path, media.ffmpeg_path);
            set(&mut config.ffprobe_path, media.ffprobe_path);
        }

        Ok(())
    }
}

impl FromStr for YamlConfig {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

llm:
  type: "custom"
  url: "https://llm.example.com/v1/chat/completions"
  model: "my-model"
  api_key: "yaml-key"

speech:
  api_key: "speech-key"
  voice: "nova"

session:
  history_cap: 6

progress:
  probe_interval_ms: 500
  structured_completion: false

media:
  ffmpeg_path: "/opt/ffmpeg/bin/ffmpeg"
"#;
        let parsed: YamlConfig = yaml.parse().unwrap();
        let mut config = ServerConfig::default();
        parsed.apply(&mut config).unwrap();

        assert_eq!(config.address(), "127.0.0.1:9090");
        assert_eq!(config.llm_provider, LlmProvider::Custom);
        assert_eq!(config.llm_model(), "my-model");
        assert_eq!(config.llm_api_key, "yaml-key");
        assert_eq!(config.speech_api_key.as_deref(), Some("speech-key"));
        assert_eq!(config.speech_voice, "nova");
        assert_eq!(config.history_cap, 6);
        assert_eq!(config.probe_interval_ms, 500);
        assert!(!config.structured_completion);
        assert_eq!(config.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.ffprobe_path, "ffprobe");
    }

    #[test]
    fn test_yaml_partial_keeps_existing_values() {
        let mut config = ServerConfig::default();
        config.llm_api_key = "from-env".to_string();

        let parsed: YamlConfig = "server:\n  port: 3001\n".parse().unwrap();
        parsed.apply(&mut config).unwrap();

        assert_eq!(config.port, 3001);
        assert_eq!(config.llm_api_key, "from-env");
    }

    #[test]
    fn test_yaml_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "llm:\n  type: qwen\n").unwrap();

        let parsed = YamlConfig::from_file(&path).unwrap();
        assert_eq!(
            parsed.llm.and_then(|l| l.provider).as_deref(),
            Some("qwen")
        );
    }

    #[test]
    fn test_yaml_errors() {
        let missing = YamlConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let broken = "server: [unclosed".parse::<YamlConfig>();
        assert!(matches!(broken, Err(ConfigError::Yaml(_))));

        let parsed: YamlConfig = "llm:\n  type: gpt\n".parse().unwrap();
        let mut config = ServerConfig::default();
        assert!(parsed.apply(&mut config).is_err());
    }
}
