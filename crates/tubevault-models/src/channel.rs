//! Channel identifier normalization and canonical URLs.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors from channel identifier normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel is required")]
    Empty,

    #[error("channel must be a handle like Example, @Example or a youtube.com/@Example URL")]
    Malformed,
}

fn handle_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"youtube\.com/@([^/?#]+)").unwrap())
}

/// Normalize a channel identifier to a bare handle.
///
/// Accepts a bare handle (`Example`), an `@`-prefixed handle (`@Example`),
/// or a full channel URL (`https://www.youtube.com/@Example`). Identifiers
/// still containing `/` or whitespace after stripping are ambiguous and
/// rejected.
pub fn normalize_channel_handle(channel: &str) -> Result<String, ChannelError> {
    let s = channel.trim();
    if s.is_empty() {
        return Err(ChannelError::Empty);
    }

    if let Some(caps) = handle_url_pattern().captures(s) {
        return Ok(caps[1].to_string());
    }

    let s = s.trim_start_matches('@');
    if s.is_empty() || s.contains('/') || s.chars().any(char::is_whitespace) {
        return Err(ChannelError::Malformed);
    }
    Ok(s.to_string())
}

/// Base URL of a channel page for a normalized handle.
pub fn channel_base_url(handle: &str) -> String {
    format!("https://www.youtube.com/@{handle}")
}

/// Canonical watch URL for an item id.
///
/// Used to reconstruct item URLs when a flat listing omits or mangles the
/// URL field.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Check whether a string is a well-formed absolute http(s) URL.
pub fn is_absolute_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
