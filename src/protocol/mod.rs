//! Inter-replica wire envelopes
//!
//! Framing for the messages the replica core produces and consumes.
//! Everything here is synchronous byte work; transports live above.

pub mod read_response;

pub use read_response::{ReadResponse, RowPayload};
