//! Read-response envelope
//!
//! A replica answers a read with either the full row or a digest of it,
//! depending on what the coordinator asked for. The frame is a digest
//! size header, the digest bytes, a digest flag, and then the delegated
//! row bytes when the flag is clear. The flag and the size header must
//! agree; a frame where they disagree is corrupt and is rejected before
//! any row bytes are touched.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{truncated_error, GalenaError, Result};

/// Serialization capability a row payload must provide.
///
/// The storage layer owns the row format; the envelope only delegates to
/// it, after the digest framing has been read and checked.
pub trait RowPayload: Sized {
    /// Append the serialized row to `buf`.
    fn serialize(&self, buf: &mut BytesMut);

    /// Read a row back from `buf`.
    fn deserialize<B: Buf>(buf: &mut B) -> Result<Self>;
}

/// A read response: a content digest or the row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResponse<R> {
    /// Opaque, non-empty content hash of the row.
    Digest(Bytes),
    /// The full row.
    Data(R),
}

impl<R: RowPayload> ReadResponse<R> {
    /// Construct a digest response.
    pub fn digest_of(digest: impl Into<Bytes>) -> Self {
        ReadResponse::Digest(digest.into())
    }

    /// Construct a data response.
    pub fn data(row: R) -> Self {
        ReadResponse::Data(row)
    }

    /// True when this response carries a digest instead of a row.
    pub fn is_digest(&self) -> bool {
        matches!(self, ReadResponse::Digest(_))
    }

    /// The digest, when present.
    pub fn digest(&self) -> Option<&Bytes> {
        match self {
            ReadResponse::Digest(d) => Some(d),
            ReadResponse::Data(_) => None,
        }
    }

    /// The row, when present.
    pub fn row(&self) -> Option<&R> {
        match self {
            ReadResponse::Digest(_) => None,
            ReadResponse::Data(row) => Some(row),
        }
    }

    /// Consume the response, yielding the row when present.
    pub fn into_row(self) -> Option<R> {
        match self {
            ReadResponse::Digest(_) => None,
            ReadResponse::Data(row) => Some(row),
        }
    }

    /// Append the framed wire form to `buf`.
    ///
    /// Fails on an empty digest, which could never round-trip: its size
    /// header would claim a data response.
    pub fn serialize(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            ReadResponse::Digest(digest) => {
                if digest.is_empty() {
                    return Err(GalenaError::BadResponseFrame {
                        digest_size: 0,
                        is_digest: true,
                    });
                }
                let size = i32::try_from(digest.len()).map_err(|_| {
                    GalenaError::Decode(format!("digest length {} exceeds frame limit", digest.len()))
                })?;
                buf.put_i32(size);
                buf.put_slice(digest);
                buf.put_u8(1);
            }
            ReadResponse::Data(row) => {
                buf.put_i32(0);
                buf.put_u8(0);
                row.serialize(buf);
            }
        }
        Ok(())
    }

    /// Read a framed response back, enforcing flag/size agreement.
    pub fn deserialize<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(truncated_error("response header", 4, buf.remaining()));
        }
        let digest_size = buf.get_i32();

        let digest = if digest_size > 0 {
            let size = digest_size as usize;
            if buf.remaining() < size {
                return Err(truncated_error("response digest", size, buf.remaining()));
            }
            buf.copy_to_bytes(size)
        } else {
            Bytes::new()
        };

        if buf.remaining() < 1 {
            return Err(truncated_error("digest flag", 1, buf.remaining()));
        }
        let is_digest = match buf.get_u8() {
            0 => false,
            1 => true,
            other => {
                return Err(GalenaError::Decode(format!(
                    "invalid digest flag {other:#04x}"
                )))
            }
        };

        if digest_size < 0 || is_digest != (digest_size > 0) {
            return Err(GalenaError::BadResponseFrame {
                digest_size,
                is_digest,
            });
        }

        if is_digest {
            Ok(ReadResponse::Digest(digest))
        } else {
            Ok(ReadResponse::Data(R::deserialize(buf)?))
        }
    }
}
