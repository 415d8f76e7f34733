//! Endpoint URL validation
//!
//! Outbound calls that carry credentials (the LLM backend, speech services)
//! must use HTTPS. Plain HTTP is tolerated only for loopback hosts and only
//! when the caller opts in, which keeps local mock servers usable in tests.

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be HTTPS, got: {0}")]
    HttpsRequired(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Returns true when the URL host is `localhost` or a loopback IP.
pub fn is_loopback_host(parsed: &Url) -> bool {
    match parsed.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Validates an LLM or speech endpoint and returns the parsed URL.
///
/// # Arguments
/// * `url` - The endpoint to validate
/// * `allow_insecure_localhost` - Accept `http` when the host is loopback
///
/// # Example
/// ```rust
/// use voice_agent_gateway::utils::url_validation::validate_llm_endpoint;
///
/// assert!(validate_llm_endpoint("https://api.example.com/v1/chat/completions", false).is_ok());
/// assert!(validate_llm_endpoint("http://api.example.com/v1/chat/completions", false).is_err());
/// assert!(validate_llm_endpoint("http://127.0.0.1:8000/v1/chat/completions", true).is_ok());
/// ```
pub fn validate_llm_endpoint(
    url: &str,
    allow_insecure_localhost: bool,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    if parsed.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if allow_insecure_localhost && is_loopback_host(&parsed) => {
            warn!(url = %parsed, "Using insecure loopback endpoint (development mode)");
            Ok(parsed)
        }
        other => Err(UrlValidationError::HttpsRequired(other.to_string())),
    }
}
