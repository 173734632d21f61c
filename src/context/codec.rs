//! Counter context codec
//!
//! Mechanical packing of (id, clock, count) tuples into a contiguous
//! buffer. A context of N tuples is exactly `N * step_length` bytes with
//! tuple `i` at offset `i * step_length`; integers are big-endian. The
//! engine layers all semantics on top of these accessors.

use crate::error::{GalenaError, Result};
use crate::util::bytes::{decode_i64_be, decode_u64_be, encode_i64_be, encode_u64_be};

/// Byte width of the logical clock field.
pub const CLOCK_LENGTH: usize = 8;
/// Byte width of the count field.
pub const COUNT_LENGTH: usize = 8;

/// Byte width of one (id, clock, count) step for ids of `id_len` bytes.
#[inline]
pub const fn step_length(id_len: usize) -> usize {
    id_len + CLOCK_LENGTH + COUNT_LENGTH
}

/// Check that `ctx` is a whole number of steps.
pub fn validate(ctx: &[u8], id_len: usize) -> Result<()> {
    let step = step_length(id_len);
    if ctx.len() % step != 0 {
        return Err(GalenaError::MalformedContext {
            len: ctx.len(),
            step,
        });
    }
    Ok(())
}

/// Number of tuples held by a validated context.
#[inline]
pub fn tuple_count(ctx: &[u8], id_len: usize) -> usize {
    ctx.len() / step_length(id_len)
}

/// Read the tuple at `step_index` from a validated context.
#[inline]
pub fn read_tuple(ctx: &[u8], id_len: usize, step_index: usize) -> (&[u8], u64, i64) {
    let offset = step_index * step_length(id_len);
    let id = &ctx[offset..offset + id_len];
    let clock = decode_u64_be(ctx, offset + id_len);
    let count = decode_i64_be(ctx, offset + id_len + CLOCK_LENGTH);
    (id, clock, count)
}

/// Write a tuple at `step_index` of a correctly sized buffer.
#[inline]
pub fn write_tuple(ctx: &mut [u8], id_len: usize, step_index: usize, id: &[u8], clock: u64, count: i64) {
    let offset = step_index * step_length(id_len);
    ctx[offset..offset + id_len].copy_from_slice(id);
    encode_u64_be(ctx, offset + id_len, clock);
    encode_i64_be(ctx, offset + id_len + CLOCK_LENGTH, count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_length() {
        assert_eq!(step_length(4), 20);
        assert_eq!(step_length(16), 32);
    }

    #[test]
    fn test_validate() {
        assert!(validate(&[], 4).is_ok());
        assert!(validate(&[0u8; 40], 4).is_ok());
        let err = validate(&[0u8; 21], 4).unwrap_err();
        assert!(matches!(
            err,
            GalenaError::MalformedContext { len: 21, step: 20 }
        ));
    }

    #[test]
    fn test_tuple_roundtrip() {
        let mut ctx = vec![0u8; 2 * step_length(4)];
        write_tuple(&mut ctx, 4, 0, &[10, 0, 0, 1], 3, -7);
        write_tuple(&mut ctx, 4, 1, &[10, 0, 0, 2], 1, 5);

        assert_eq!(tuple_count(&ctx, 4), 2);
        assert_eq!(read_tuple(&ctx, 4, 0), (&[10, 0, 0, 1][..], 3, -7));
        assert_eq!(read_tuple(&ctx, 4, 1), (&[10, 0, 0, 2][..], 1, 5));
    }

    #[test]
    fn test_layout_is_big_endian() {
        let mut ctx = vec![0u8; step_length(4)];
        write_tuple(&mut ctx, 4, 0, &[10, 0, 0, 1], 1, 5);
        assert_eq!(
            ctx,
            [
                0x0a, 0x00, 0x00, 0x01, // id
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // clock
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, // count
            ]
        );
    }
}
