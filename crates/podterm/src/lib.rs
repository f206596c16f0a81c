//! podterm library crate.
//!
//! Attaches the local terminal to a shell inside a remote container.  The
//! dashboard backend exposes the shell as a WebSocket at `/terminal`; podterm
//! speaks the JSON frame protocol implemented in `podterm-core` over it.
//!
//! # Architecture
//!
//! ```text
//! local TTY (raw mode)
//!         ↕
//! [podterm]
//!   ├── domain/           TermConfig, detach-key parsing
//!   ├── application/      the select! loop driving one TerminalBridge
//!   └── infrastructure/
//!         ├── ws_transport/  WebSocket connector (tokio-tungstenite)
//!         ├── events/        EventSource the loop awaits
//!         ├── local_term/    raw mode, stdin thread, SIGWINCH
//!         ├── stdout_sink/   render sink writing to stdout
//!         └── config_file/   optional TOML config
//!         ↕
//! dashboard backend  (JSON frames over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain`, `infrastructure` and `podterm-core`.
//! - `infrastructure` moves bytes and events; it holds no session state.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: the session event loop.
pub mod application;

/// Infrastructure layer: WebSocket, terminal and config file.
pub mod infrastructure;
