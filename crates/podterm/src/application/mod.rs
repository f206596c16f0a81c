//! Application layer for podterm.
//!
//! Wires the infrastructure (WebSocket, TTY, signals) to a
//! [`TerminalBridge`](podterm_core::TerminalBridge) and runs the session loop.

pub mod run_session;

pub use run_session::{drive, run_session, SessionInputs};
