//! Infrastructure layer for podterm.
//!
//! Everything that touches the outside world:
//!
//! - [`ws_transport`]: the WebSocket [`Connector`](podterm_core::Connector)
//!   and [`Transport`](podterm_core::Transport) (tokio-tungstenite)
//! - [`events`]: the [`EventSource`] the session loop awaits events from
//! - [`local_term`]: raw mode, terminal size, stdin, window-change signals
//! - [`stdout_sink`]: the render sink writing remote output to stdout
//! - [`config_file`]: the optional TOML config file
//!
//! Protocol and lifecycle rules live in `podterm-core`; this layer only moves
//! bytes and events.

pub mod config_file;
pub mod events;
pub mod local_term;
pub mod stdout_sink;
pub mod ws_transport;

pub use config_file::{load_config_file, load_default_config, ConfigError, FileConfig};
pub use events::EventSource;
pub use local_term::{terminal_geometry, RawModeGuard, ResizeWatcher};
pub use stdout_sink::TerminalWriter;
pub use ws_transport::{WsConnector, WsEvents, WsTransport};
