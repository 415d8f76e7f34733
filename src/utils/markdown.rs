//! Markdown stripping for assistant replies.
//!
//! Replies are rendered as plain chat bubbles and fed to speech synthesis, so
//! common inline markdown is removed before they leave the gateway.

use once_cell::sync::Lazy;
use regex::Regex;

static REPLACEMENTS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // images before links so the leading `!` goes too
        (r"!\[([^\]]*)\]\([^)]*\)", "$1"),
        (r"\[([^\]]*)\]\([^)]*\)", "$1"),
        (r"(?m)^#{1,6}\s+", ""),
        (r"\*\*(.*?)\*\*", "$1"),
        (r"__(.*?)__", "$1"),
        (r"\*(.*?)\*", "$1"),
        (r"\b_(.*?)_\b", "$1"),
        (r"~~(.*?)~~", "$1"),
        (r"`([^`]+)`", "$1"),
    ]
    .into_iter()
    .filter_map(|(pattern, repl)| Regex::new(pattern).ok().map(|re| (re, repl)))
    .collect()
});

/// Remove headings, emphasis, strikethrough, inline code, links and images.
pub fn markdown_to_text(input: &str) -> String {
    REPLACEMENTS
        .iter()
        .fold(input.to_string(), |acc, (re, repl)| {
            re.replace_all(&acc, *repl).into_owned()
        })
}
