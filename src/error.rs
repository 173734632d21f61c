//! Error types for Galena
//!
//! This module defines all error types used throughout the Galena codebase.
//! Uses `thiserror` for ergonomic error definitions.

use std::io;
use thiserror::Error;

/// Main error type for Galena operations
#[derive(Error, Debug)]
pub enum GalenaError {
    /// Counter context buffer length is not a multiple of the step length
    #[error("Malformed counter context: length {len} is not a multiple of step length {step}")]
    MalformedContext {
        /// Observed buffer length in bytes.
        len: usize,
        /// Expected step length (id length + 16).
        step: usize,
    },

    /// Read-response digest flag disagrees with the digest size header
    #[error("Bad response frame: digest size {digest_size} with digest flag {is_digest}")]
    BadResponseFrame {
        /// Digest size read from the frame header.
        digest_size: i32,
        /// Digest flag read from the frame trailer.
        is_digest: bool,
    },

    /// Requested Bloom filter parameters cannot be satisfied
    #[error("Unsupported bloom filter size: {0}")]
    UnsupportedBloomSize(String),

    /// Node address length does not match the process-wide id length
    #[error("Address family mismatch: expected {expected}-byte node id, got {actual}")]
    AddressFamilyMismatch {
        /// Process-wide node id length.
        expected: usize,
        /// Length of the id supplied by the caller.
        actual: usize,
    },

    /// Byte-read failure during deserialization
    #[error("Decode error: {0}")]
    Decode(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for Galena operations
pub type Result<T> = std::result::Result<T, GalenaError>;

impl GalenaError {
    /// Returns true if this error indicates wire corruption or a protocol
    /// violation, as opposed to a local parameter problem.
    #[cold]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            GalenaError::BadResponseFrame { .. } | GalenaError::Decode(_)
        )
    }
}

/// Helper to create a truncated-buffer decode error (marked cold)
#[cold]
#[inline(never)]
pub(crate) fn truncated_error(what: &str, needed: usize, remaining: usize) -> GalenaError {
    GalenaError::Decode(format!(
        "truncated {what}: need {needed} bytes, {remaining} remaining"
    ))
}
