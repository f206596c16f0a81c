//! JSON codec for terminal frames.
//!
//! The socket carries one JSON object per text message.  [`encode`] never
//! emits `null`: absent optional fields are simply left out.  [`decode`] is
//! strict about the `operation` value and about which fields an operation may
//! carry, and lenient about everything else (unknown extra keys are ignored so
//! a newer backend can add fields without breaking older clients).
//!
//! A decode failure is always a per-frame event.  Callers log and drop it; it
//! must never be treated as a channel failure.

use serde::Deserialize;
use thiserror::Error;

use super::frame::{FieldViolation, Frame, Operation};

/// Errors produced when turning wire bytes into a [`Frame`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a well-formed JSON object with the expected field
    /// types.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The `operation` field held something other than the four known values.
    #[error("unknown frame operation {0:?}")]
    UnknownOperation(String),

    /// The optional fields contradict the operation.
    #[error("invalid {operation} frame: {violation}")]
    InvalidFields {
        operation: Operation,
        violation: FieldViolation,
    },
}

/// Errors produced when serializing a [`Frame`].
#[derive(Debug, Error)]
#[error("failed to encode frame: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Wire shape before the operation has been checked.
///
/// Decoding in two steps lets an unknown operation surface as
/// [`DecodeError::UnknownOperation`] instead of a generic serde message.
#[derive(Deserialize)]
struct RawFrame {
    operation: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    rows: Option<u16>,
    #[serde(default)]
    cols: Option<u16>,
}

/// Serializes a frame to its JSON text form.
///
/// # Errors
///
/// Returns [`EncodeError`] only if serde_json itself fails, which does not
/// happen for the plain field types used by [`Frame`].
///
/// # Example
///
/// ```rust
/// use podterm_core::{encode, Frame};
///
/// let text = encode(&Frame::stdout("hi")).unwrap();
/// assert_eq!(text, r#"{"operation":"stdout","data":"hi"}"#);
/// ```
pub fn encode(frame: &Frame) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(frame)?)
}

/// Parses one wire message into a [`Frame`].
///
/// # Errors
///
/// - [`DecodeError::Malformed`] for bytes that are not a JSON object of the
///   right shape (including non-UTF-8 input and out-of-range numbers).
/// - [`DecodeError::UnknownOperation`] for an unrecognised `operation`.
/// - [`DecodeError::InvalidFields`] when the fields break the per-operation
///   rules in [`Frame::validate`].
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let raw: RawFrame = serde_json::from_slice(bytes)?;

    let operation = raw
        .operation
        .parse::<Operation>()
        .map_err(|e| DecodeError::UnknownOperation(e.0))?;

    let frame = Frame {
        operation,
        data: raw.data,
        rows: raw.rows,
        cols: raw.cols,
    };

    frame
        .validate()
        .map_err(|violation| DecodeError::InvalidFields {
            operation,
            violation,
        })?;

    Ok(frame)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
