//! Runtime configuration for one `podterm` session.
//!
//! [`TermConfig`] holds every tunable that is not part of the target itself.
//! It is a plain struct with defaults; `main.rs` layers the config file and
//! the command line on top of [`TermConfig::default`].

use std::fmt;
use std::time::Duration;

use podterm_core::domain::coalescer::DEFAULT_RESIZE_DEBOUNCE;
use podterm_core::domain::replay::DEFAULT_REPLAY_CAPACITY;
use podterm_core::{BridgeSettings, Geometry};
use thiserror::Error;

/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";

/// `Ctrl-]`, the classic telnet escape.
pub const DEFAULT_DETACH_KEY: u8 = 0x1d;

/// All runtime settings for a session.
///
/// # Example
///
/// ```rust
/// use podterm::domain::TermConfig;
///
/// let cfg = TermConfig::default();
/// assert_eq!(cfg.replay_capacity, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermConfig {
    /// Dashboard origin; `https` origins connect over `wss`.
    pub origin: String,
    /// Frames of remote output kept for replay.
    pub replay_capacity: usize,
    /// Quiet period before a window resize is sent.
    pub resize_debounce: Duration,
    /// Byte that ends the session locally.  `None` disables detaching.
    pub detach_key: Option<u8>,
}

impl TermConfig {
    /// Settings for a bridge starting at `initial` geometry.
    pub fn bridge_settings(&self, initial: Geometry) -> BridgeSettings {
        BridgeSettings {
            origin: self.origin.clone(),
            replay_capacity: self.replay_capacity,
            resize_debounce: self.resize_debounce,
            initial_geometry: initial,
        }
    }
}

impl Default for TermConfig {
    /// | Field           | Default                 |
    /// |-----------------|-------------------------|
    /// | origin          | `http://127.0.0.1:8080` |
    /// | replay_capacity | 100 frames              |
    /// | resize_debounce | 1000 ms                 |
    /// | detach_key      | `Ctrl-]`                |
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            detach_key: Some(DEFAULT_DETACH_KEY),
        }
    }
}

/// A detach-key setting that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid detach key {0:?} (expected e.g. \"ctrl-]\", \"^A\", \"~\" or \"none\")")]
pub struct DetachKeyError(pub String);

/// Parses a detach-key setting.
///
/// Accepted forms, case-insensitive:
///
/// - `ctrl-X`, `c-X` or `^X` where `X` is a letter or one of `@[\]^_`
/// - a single printable ASCII character, taken literally
/// - `none` or `off` to disable detaching
///
/// # Errors
///
/// Returns [`DetachKeyError`] for anything else.
pub fn parse_detach_key(raw: &str) -> Result<Option<u8>, DetachKeyError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower == "none" || lower == "off" {
        return Ok(None);
    }

    let ctrl = lower
        .strip_prefix("ctrl-")
        .or_else(|| lower.strip_prefix("ctrl+"))
        .or_else(|| lower.strip_prefix("c-"))
        .or_else(|| lower.strip_prefix('^'));

    if let Some(rest) = ctrl {
        let mut chars = rest.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => control_byte(c)
                .map(Some)
                .ok_or_else(|| DetachKeyError(raw.to_string())),
            _ => Err(DetachKeyError(raw.to_string())),
        };
    }

    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_graphic() => Ok(Some(c as u8)),
        _ => Err(DetachKeyError(raw.to_string())),
    }
}

fn control_byte(c: char) -> Option<u8> {
    let upper = c.to_ascii_uppercase();
    if ('@'..='_').contains(&upper) {
        Some(upper as u8 & 0x1f)
    } else {
        None
    }
}

/// Human-readable name of a detach key, for the startup hint.
pub struct DetachKeyName(pub u8);

impl fmt::Display for DetachKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            b @ 0x00..=0x1f => write!(f, "Ctrl-{}", (b | 0x40) as char),
            b => write!(f, "{}", b as char),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_origin_is_local_dashboard() {
        // Arrange / Act
        let cfg = TermConfig::default();
        // Assert
        assert_eq!(cfg.origin, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_default_replay_capacity_is_100() {
        let cfg = TermConfig::default();
        assert_eq!(cfg.replay_capacity, 100);
    }

    #[test]
    fn test_default_debounce_is_one_second() {
        let cfg = TermConfig::default();
        assert_eq!(cfg.resize_debounce, Duration::from_millis(1000));
    }

    #[test]
    fn test_default_detach_key_is_ctrl_close_bracket() {
        let cfg = TermConfig::default();
        assert_eq!(cfg.detach_key, Some(0x1d));
    }

    #[test]
    fn test_bridge_settings_carry_config_and_geometry() {
        let cfg = TermConfig {
            origin: "https://cyclops.example.com".to_string(),
            replay_capacity: 7,
            resize_debounce: Duration::from_millis(250),
            detach_key: None,
        };
        let geometry = Geometry::new(50, 132).unwrap();

        let settings = cfg.bridge_settings(geometry);

        assert_eq!(settings.origin, "https://cyclops.example.com");
        assert_eq!(settings.replay_capacity, 7);
        assert_eq!(settings.resize_debounce, Duration::from_millis(250));
        assert_eq!(settings.initial_geometry, geometry);
    }

    #[test]
    fn test_parse_ctrl_forms() {
        assert_eq!(parse_detach_key("ctrl-]"), Ok(Some(0x1d)));
        assert_eq!(parse_detach_key("Ctrl+A"), Ok(Some(0x01)));
        assert_eq!(parse_detach_key("c-q"), Ok(Some(0x11)));
        assert_eq!(parse_detach_key("^\\"), Ok(Some(0x1c)));
    }

    #[test]
    fn test_parse_literal_character() {
        assert_eq!(parse_detach_key("~"), Ok(Some(b'~')));
    }

    #[test]
    fn test_parse_none_disables() {
        assert_eq!(parse_detach_key("none"), Ok(None));
        assert_eq!(parse_detach_key("OFF"), Ok(None));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_detach_key("ctrl-").is_err());
        assert!(parse_detach_key("ctrl-1").is_err());
        assert!(parse_detach_key("abc").is_err());
        assert!(parse_detach_key("").is_err());
        assert!(parse_detach_key("é").is_err());
    }

    #[test]
    fn test_detach_key_name() {
        assert_eq!(DetachKeyName(0x1d).to_string(), "Ctrl-]");
        assert_eq!(DetachKeyName(0x01).to_string(), "Ctrl-A");
        assert_eq!(DetachKeyName(b'~').to_string(), "~");
    }
}
