pub mod markdown;
pub mod task;
pub mod url_validation;

pub use markdown::markdown_to_text;
pub use task::spawn_guarded;
pub use url_validation::{UrlValidationError, validate_llm_endpoint};

/// Current unix time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
