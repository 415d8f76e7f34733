use std::fmt;
use std::str::FromStr;

/// DashScope (Qwen) OpenAI-compatible chat completions endpoint
pub const QWEN_CHAT_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
/// Hunyuan (Yuanbao) OpenAI-compatible chat completions endpoint
pub const YUANBAO_CHAT_URL: &str = "https://api.hunyuan.cloud.tencent.com/v1/chat/completions";

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    Qwen,
    #[default]
    Yuanbao,
    /// Any OpenAI-compatible endpoint; url and model must be configured
    Custom,
}

impl LlmProvider {
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Qwen => Some(QWEN_CHAT_URL),
            LlmProvider::Yuanbao => Some(YUANBAO_CHAT_URL),
            LlmProvider::Custom => None,
        }
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Qwen => Some("qwen-plus"),
            LlmProvider::Yuanbao => Some("hunyuan-turbo"),
            LlmProvider::Custom => None,
        }
    }

    pub fn all() -> &'static [LlmProvider] {
        &[LlmProvider::Qwen, LlmProvider::Yuanbao, LlmProvider::Custom]
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Qwen => write!(f, "qwen"),
            LlmProvider::Yuanbao => write!(f, "yuanbao"),
            LlmProvider::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qwen" => Ok(LlmProvider::Qwen),
            "yuanbao" | "hunyuan" => Ok(LlmProvider::Yuanbao),
            "custom" => Ok(LlmProvider::Custom),
            other => Err(format!(
                "Unsupported LLM type: {other}. Supported types: qwen, yuanbao, custom"
            )),
        }
    }
}
