//! Versioned full/delta codec for ring state.
//!
//! Mirrors `enginecore::Ring`'s state into owned, `serde`-friendly wire
//! structs, then frames them with a small magic/version/length-prefixed
//! envelope over `bincode`. Has no opinion on transport: callers move the
//! encoded bytes however they like (file, socket, message queue).

pub mod codec;
pub mod error;
pub mod snapshot;

pub use codec::{decode_delta, decode_full, encode_delta, encode_full};
pub use error::{CodecError, Result};
pub use snapshot::{DeltaSnapshot, NodeChange, RingSnapshot, StrategyState};
