//! podterm: attach the local terminal to a remote container shell.
//!
//! # Usage
//!
//! ```text
//! podterm --origin <URL> --app <NAME> --app-namespace <NS> --project <NAME>
//!         --container <NAME> [OPTIONS]
//!
//! Options:
//!   --pod <NAME>                Attach to a specific pod [default: backend picks]
//!   --config <FILE>             TOML config file [default: platform config dir]
//!   --replay-capacity <N>       Frames of output kept for replay [default: 100]
//!   --resize-debounce-ms <MS>   Quiet period before a resize is sent [default: 1000]
//!   --detach-key <KEY>          Local key that ends the session [default: ctrl-]]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the config file, then environment variables, then
//! command-line flags.
//!
//! | Variable                      | Flag                   |
//! |-------------------------------|------------------------|
//! | `PODTERM_ORIGIN`              | `--origin`             |
//! | `PODTERM_APP`                 | `--app`                |
//! | `PODTERM_APP_NAMESPACE`       | `--app-namespace`      |
//! | `PODTERM_PROJECT`             | `--project`            |
//! | `PODTERM_CONTAINER`           | `--container`          |
//! | `PODTERM_POD`                 | `--pod`                |
//! | `PODTERM_CONFIG`              | `--config`             |
//! | `PODTERM_REPLAY_CAPACITY`     | `--replay-capacity`    |
//! | `PODTERM_RESIZE_DEBOUNCE_MS`  | `--resize-debounce-ms` |
//! | `PODTERM_DETACH_KEY`          | `--detach-key`         |
//!
//! # Exit status
//!
//! 0 after the detach key or end of input.  Non-zero when the connection
//! fails or the remote closes the session; the reason goes to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podterm::application::run_session;
use podterm::domain::{parse_detach_key, DetachKeyName, TermConfig};
use podterm::infrastructure::{load_config_file, load_default_config, FileConfig};
use podterm_core::{SessionTarget, TeardownReason};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Attach the local terminal to a shell inside a remote container.
///
/// Every option may also come from the config file; the four target names
/// are required from one source or the other.
#[derive(Debug, Parser)]
#[command(
    name = "podterm",
    about = "Attach the local terminal to a remote container shell",
    version
)]
struct Cli {
    /// Dashboard origin, e.g. `https://cyclops.example.com`.
    #[arg(long, env = "PODTERM_ORIGIN")]
    origin: Option<String>,

    /// Application (module) name.
    #[arg(long, env = "PODTERM_APP")]
    app: Option<String>,

    /// Namespace the application is deployed in.
    #[arg(long, env = "PODTERM_APP_NAMESPACE")]
    app_namespace: Option<String>,

    /// Project the application belongs to.
    #[arg(long, env = "PODTERM_PROJECT")]
    project: Option<String>,

    /// Container to open the shell in.
    #[arg(long, env = "PODTERM_CONTAINER")]
    container: Option<String>,

    /// Specific pod; when omitted the backend chooses one.
    #[arg(long, env = "PODTERM_POD")]
    pod: Option<String>,

    /// Config file to read instead of the platform default.
    #[arg(long, env = "PODTERM_CONFIG")]
    config: Option<PathBuf>,

    /// Frames of remote output kept for replay.
    #[arg(long, env = "PODTERM_REPLAY_CAPACITY")]
    replay_capacity: Option<usize>,

    /// Milliseconds of quiet before a window resize is sent.
    #[arg(long, env = "PODTERM_RESIZE_DEBOUNCE_MS")]
    resize_debounce_ms: Option<u64>,

    /// Key that ends the session locally (`ctrl-]`, `^A`, `~`, `none`).
    #[arg(long, env = "PODTERM_DETACH_KEY")]
    detach_key: Option<String>,
}

impl Cli {
    /// Reads `--config` if given, otherwise the platform default file.
    fn load_file_config(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => load_default_config().context("failed to load default config file"),
        }
    }

    /// Merges flags over `file` over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a target name is missing from both sources or the
    /// detach key cannot be parsed.
    fn into_session(self, file: FileConfig) -> anyhow::Result<(TermConfig, SessionTarget)> {
        let defaults = TermConfig::default();

        let detach_key = match self.detach_key.or(file.detach_key) {
            Some(raw) => parse_detach_key(&raw)?,
            None => defaults.detach_key,
        };

        let config = TermConfig {
            origin: self.origin.or(file.origin).unwrap_or(defaults.origin),
            replay_capacity: self
                .replay_capacity
                .or(file.replay_capacity)
                .unwrap_or(defaults.replay_capacity),
            resize_debounce: self
                .resize_debounce_ms
                .or(file.resize_debounce_ms)
                .map_or(defaults.resize_debounce, Duration::from_millis),
            detach_key,
        };

        let target = file.target;
        let mut session_target = SessionTarget::new(
            required(self.app.or(target.app), "--app", "app")?,
            required(
                self.app_namespace.or(target.app_namespace),
                "--app-namespace",
                "app_namespace",
            )?,
            required(self.project.or(target.project), "--project", "project")?,
            required(self.container.or(target.container), "--container", "container")?,
        );
        if let Some(pod) = self.pod.or(target.pod) {
            session_target = session_target.with_pod(pod);
        }

        Ok((config, session_target))
    }
}

fn required(value: Option<String>, flag: &str, key: &str) -> anyhow::Result<String> {
    value
        .filter(|v| !v.is_empty())
        .with_context(|| format!("missing {flag} (or `{key}` under [target] in the config file)"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// Logs go to stderr and default to `warn`, so they do not scribble over the
/// remote shell.  Set `RUST_LOG=debug` to see per-frame detail.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = cli.load_file_config()?;
    let (config, target) = cli.into_session(file)?;

    match config.detach_key {
        Some(key) => eprintln!(
            "podterm: attaching to {target} (press {} to detach)",
            DetachKeyName(key)
        ),
        None => eprintln!("podterm: attaching to {target}"),
    }

    let reason = run_session(&config, target).await?;

    match reason {
        TeardownReason::ChannelClosed(e) => {
            eprintln!();
            Err(anyhow::Error::new(e).context("session ended"))
        }
        other => {
            eprintln!("\npodterm: {other}");
            Ok(())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
