//! Optional TOML config file.
//!
//! Every field is optional.  Values here override the built-in defaults and
//! are themselves overridden by command-line flags and `PODTERM_*`
//! environment variables.
//!
//! ```toml
//! origin = "https://cyclops.example.com"
//! replay_capacity = 200
//! resize_debounce_ms = 500
//! detach_key = "ctrl-]"
//!
//! [target]
//! app = "api"
//! app_namespace = "default"
//! project = "demo"
//! container = "main"
//! ```
//!
//! Without `--config`, the platform config directory is searched
//! (`$XDG_CONFIG_HOME/podterm/config.toml` or `~/.config/podterm/config.toml`
//! on Linux).  A missing file there is not an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Error type for config file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Target fields as they appear under `[target]`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileTarget {
    pub app: Option<String>,
    pub app_namespace: Option<String>,
    pub project: Option<String>,
    pub container: Option<String>,
    pub pod: Option<String>,
}

/// Contents of the config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub origin: Option<String>,
    pub replay_capacity: Option<usize>,
    pub resize_debounce_ms: Option<u64>,
    pub detach_key: Option<String>,
    pub target: FileTarget,
}

/// Parses config file contents.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has the
/// wrong type.
pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads the config file at `path`.  Unlike [`load_default_config`], a
/// missing file is an error.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not valid.
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Loads the config file from the platform config directory, returning an
/// empty [`FileConfig`] if there is none.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_default_config() -> Result<FileConfig, ConfigError> {
    let Some(path) = default_config_path() else {
        return Ok(FileConfig::default());
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// `<platform config dir>/podterm/config.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    platform_config_dir().map(|dir| dir.join("podterm").join("config.toml"))
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(PathBuf::from)
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // XDG_CONFIG_HOME or ~/.config
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_none() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_full_file_parses() {
        // Arrange
        let content = r#"
            origin = "https://cyclops.example.com"
            replay_capacity = 250
            resize_debounce_ms = 300
            detach_key = "ctrl-q"

            [target]
            app = "api"
            app_namespace = "team-a"
            project = "demo"
            container = "main"
            pod = "api-7d9f-abcde"
        "#;

        // Act
        let cfg = parse_config(content).unwrap();

        // Assert
        assert_eq!(cfg.origin.as_deref(), Some("https://cyclops.example.com"));
        assert_eq!(cfg.replay_capacity, Some(250));
        assert_eq!(cfg.resize_debounce_ms, Some(300));
        assert_eq!(cfg.detach_key.as_deref(), Some("ctrl-q"));
        assert_eq!(cfg.target.app_namespace.as_deref(), Some("team-a"));
        assert_eq!(cfg.target.pod.as_deref(), Some("api-7d9f-abcde"));
    }

    #[test]
    fn test_partial_target_table() {
        let cfg = parse_config("[target]\ncontainer = \"sidecar\"\n").unwrap();
        assert_eq!(cfg.target.container.as_deref(), Some("sidecar"));
        assert!(cfg.target.app.is_none());
        assert!(cfg.origin.is_none());
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let err = parse_config("replay_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let path = std::env::temp_dir().join("podterm-no-such-config.toml");
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_explicit_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "podterm-config-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "origin = \"http://10.0.0.5:9000\"\n").unwrap();

        // Act
        let cfg = load_config_file(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        assert_eq!(
            cfg.unwrap().origin.as_deref(),
            Some("http://10.0.0.5:9000")
        );
    }

    #[test]
    fn test_default_path_ends_with_podterm_config() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("podterm/config.toml"));
        }
    }
}
