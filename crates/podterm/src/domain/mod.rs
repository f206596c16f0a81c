//! Domain layer for podterm.
//!
//! Pure configuration types.  No file I/O, no environment reads, no tokio;
//! the infrastructure layer and `main.rs` populate these.

pub mod config;

pub use config::{parse_detach_key, DetachKeyError, DetachKeyName, TermConfig};
