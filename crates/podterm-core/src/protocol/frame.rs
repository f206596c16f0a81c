//! Frame types for the terminal wire protocol.
//!
//! Every message on the socket is a single JSON object:
//!
//! ```json
//! {"operation":"stdin","data":"ls\n","rows":24,"cols":80}
//! {"operation":"resize","rows":40,"cols":120}
//! {"operation":"stdout","data":"file.txt\n"}
//! ```
//!
//! Which optional fields are present depends on the operation:
//!
//! | operation | `data`   | `rows` / `cols`  |
//! |-----------|----------|------------------|
//! | `stdin`   | required | current geometry |
//! | `stdout`  | required | absent           |
//! | `resize`  | never    | required         |
//! | `init`    | optional | optional         |
//!
//! The constructors on [`Frame`] only build frames that respect this table, and
//! [`Frame::validate`] checks frames that arrive from the remote side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four recognised frame operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Local keystrokes travelling to the remote shell.
    Stdin,
    /// Remote output travelling to the local terminal.
    Stdout,
    /// New terminal geometry for the remote pty.
    Resize,
    /// Session setup notice from the remote side.
    Init,
}

impl Operation {
    /// The wire spelling of this operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Stdin => "stdin",
            Operation::Stdout => "stdout",
            Operation::Resize => "resize",
            Operation::Init => "init",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`Operation::from_str`] for an unrecognised spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdin" => Ok(Operation::Stdin),
            "stdout" => Ok(Operation::Stdout),
            "resize" => Ok(Operation::Resize),
            "init" => Ok(Operation::Init),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

/// Terminal dimensions in character cells.
///
/// Both dimensions are always at least 1; [`Geometry::new`] refuses zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    rows: u16,
    cols: u16,
}

impl Geometry {
    /// The classic 24×80 VT100 screen, used until the local terminal reports
    /// its real size.
    pub const DEFAULT: Geometry = Geometry { rows: 24, cols: 80 };

    /// Creates a geometry, or `None` if either dimension is zero.
    ///
    /// ```rust
    /// use podterm_core::Geometry;
    ///
    /// assert!(Geometry::new(24, 80).is_some());
    /// assert!(Geometry::new(0, 80).is_none());
    /// ```
    pub fn new(rows: u16, cols: u16) -> Option<Self> {
        if rows == 0 || cols == 0 {
            return None;
        }
        Some(Self { rows, cols })
    }

    /// Number of rows.
    pub fn rows(self) -> u16 {
        self.rows
    }

    /// Number of columns.
    pub fn cols(self) -> u16 {
        self.cols
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// One unit of wire exchange.
///
/// Fields are public so that frames from the remote side can be inspected
/// directly, but locally produced frames should always come from the
/// constructors, which keep field population consistent with the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// What this frame means.
    pub operation: Operation,

    /// Text payload for `stdin` / `stdout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Row count for `resize`, and the current geometry on every `stdin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,

    /// Column count, paired with `rows`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u16>,
}

/// Why a frame's fields do not match its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldViolation {
    /// A `resize` frame carried a `data` payload.
    ResizeWithData,
    /// A `resize` frame was missing `rows` or `cols`.
    ResizeWithoutGeometry,
    /// Exactly one of `rows` / `cols` was present.
    PartialGeometry,
    /// `rows` or `cols` was zero.
    ZeroDimension,
    /// A `stdin` or `stdout` frame had no `data`.
    MissingData,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FieldViolation::ResizeWithData => "resize frame carries data",
            FieldViolation::ResizeWithoutGeometry => "resize frame lacks rows/cols",
            FieldViolation::PartialGeometry => "only one of rows/cols present",
            FieldViolation::ZeroDimension => "rows and cols must be positive",
            FieldViolation::MissingData => "frame lacks its data payload",
        };
        f.write_str(msg)
    }
}

impl Frame {
    /// A keystroke frame stamped with the geometry the remote should assume.
    pub fn stdin(data: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            operation: Operation::Stdin,
            data: Some(data.into()),
            rows: Some(geometry.rows),
            cols: Some(geometry.cols),
        }
    }

    /// A remote-output frame.
    pub fn stdout(data: impl Into<String>) -> Self {
        Self {
            operation: Operation::Stdout,
            data: Some(data.into()),
            rows: None,
            cols: None,
        }
    }

    /// A resize frame.  Never carries data.
    pub fn resize(geometry: Geometry) -> Self {
        Self {
            operation: Operation::Resize,
            data: None,
            rows: Some(geometry.rows),
            cols: Some(geometry.cols),
        }
    }

    /// A bare `init` frame.
    pub fn init() -> Self {
        Self {
            operation: Operation::Init,
            data: None,
            rows: None,
            cols: None,
        }
    }

    /// The geometry carried by this frame, if both dimensions are present and
    /// positive.
    pub fn geometry(&self) -> Option<Geometry> {
        match (self.rows, self.cols) {
            (Some(rows), Some(cols)) => Geometry::new(rows, cols),
            _ => None,
        }
    }

    /// Checks that the optional fields are populated the way the operation
    /// requires.
    pub fn validate(&self) -> Result<(), FieldViolation> {
        match (self.rows, self.cols) {
            (Some(0), _) | (_, Some(0)) => return Err(FieldViolation::ZeroDimension),
            (Some(_), None) | (None, Some(_)) => return Err(FieldViolation::PartialGeometry),
            _ => {}
        }

        match self.operation {
            Operation::Resize => {
                if self.data.is_some() {
                    return Err(FieldViolation::ResizeWithData);
                }
                if self.rows.is_none() {
                    return Err(FieldViolation::ResizeWithoutGeometry);
                }
            }
            Operation::Stdin | Operation::Stdout => {
                if self.data.is_none() {
                    return Err(FieldViolation::MissingData);
                }
            }
            Operation::Init => {}
        }

        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
