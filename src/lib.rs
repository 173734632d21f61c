//! # Galena
//!
//! Replica core for a distributed, eventually consistent wide-column
//! store: partitioned counter contexts, the read-response wire envelope,
//! and Bloom filter bucket derivation.
//!
//! The counter context is the heart of the crate: a packed per-row
//! version vector that lets any replica accept increments locally and
//! later reconcile with its peers. Merges are commutative and associative
//! across arbitrary delivery orders; see [`context::CounterContext`].
//!
//! Everything here is pure and synchronous. The crate holds exactly one
//! piece of process-wide state, the local node identity, resolved once at
//! startup ([`node::init_local_node`]).

// ── Core ─────────────────────────────────────────────────────────────────────

pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod protocol;
pub mod util;

// ── Public re-exports ────────────────────────────────────────────────────────

pub use config::Config;
pub use context::{ContextRelationship, CounterContext};
pub use error::{GalenaError, Result};
pub use node::NodeId;
pub use protocol::{ReadResponse, RowPayload};
