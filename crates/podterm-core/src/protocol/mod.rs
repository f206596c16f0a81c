//! Protocol module containing the frame type and the JSON codec.

pub mod codec;
pub mod frame;

pub use codec::{decode, encode, DecodeError, EncodeError};
pub use frame::{Frame, Geometry, Operation};
