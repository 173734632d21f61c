//! Partitioned counter context engine
//!
//! A counter context is a vector of (node id, logical clock, count)
//! tuples, one per replica that has ever applied an increment. The clock
//! counts operations executed by the owning node; the aggregated value is
//! the sum of all counts. Only the owning node may advance its own tuple,
//! which is what makes the merge rules safe: remote tuples reconcile by
//! highest clock, while two views of the local tuple sum their disjoint
//! operation tallies.
//!
//! Every operation is pure: inputs are never mutated and results are
//! returned as fresh buffers, so callers may share contexts freely across
//! threads and replace their references on write.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::IpAddr;
use std::sync::OnceLock;

use bytes::Bytes;

use super::codec;
use super::ContextRelationship;
use crate::error::{GalenaError, Result};
use crate::node::{local_node_id, NodeId};
use crate::util::bytes::compare_subrange;

/// Counter context operations bound to a local node identity.
///
/// The identity determines the process-wide id length and which tuple the
/// merge treats as "ours". Production code uses [`CounterContext::instance`];
/// tests construct engines directly to pin the identity.
pub struct CounterContext {
    local_id: NodeId,
}

impl CounterContext {
    /// Engine bound to an explicit local identity.
    pub fn new(local_id: NodeId) -> Self {
        Self { local_id }
    }

    /// Process-wide engine bound to the cached local node identity.
    pub fn instance() -> &'static CounterContext {
        static INSTANCE: OnceLock<CounterContext> = OnceLock::new();
        INSTANCE.get_or_init(|| CounterContext::new(local_node_id().clone()))
    }

    /// The local node identity this engine was bound to.
    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Id length in bytes; fixed for the life of the process.
    #[inline]
    pub fn id_length(&self) -> usize {
        self.local_id.len()
    }

    /// Byte width of one tuple.
    #[inline]
    pub fn step_length(&self) -> usize {
        codec::step_length(self.id_length())
    }

    fn check_id(&self, id: &NodeId) -> Result<()> {
        if id.len() != self.id_length() {
            return Err(GalenaError::AddressFamilyMismatch {
                expected: self.id_length(),
                actual: id.len(),
            });
        }
        Ok(())
    }

    /// An empty context: no node has ever written.
    pub fn create(&self) -> Bytes {
        Bytes::new()
    }

    /// Apply a local delta on behalf of `node`.
    ///
    /// If the node already owns a tuple its clock advances by one and its
    /// count by `delta`, and the tuple moves to the front so repeated
    /// writers are found in O(1). Otherwise a fresh (id, 1, delta) tuple
    /// is prepended. The input buffer is never touched.
    pub fn update(&self, ctx: &[u8], node: IpAddr, delta: i64) -> Result<Bytes> {
        let id_len = self.id_length();
        codec::validate(ctx, id_len)?;
        let id = NodeId::from(node);
        self.check_id(&id)?;

        let step = self.step_length();
        for step_index in 0..codec::tuple_count(ctx, id_len) {
            let (tuple_id, clock, count) = codec::read_tuple(ctx, id_len, step_index);
            if tuple_id != id.as_bytes() {
                continue;
            }

            // Found: bump in place at the front, rotate the preceding
            // tuples one step back, keep the tail as-is.
            let offset = step_index * step;
            let mut out = vec![0u8; ctx.len()];
            codec::write_tuple(
                &mut out,
                id_len,
                0,
                id.as_bytes(),
                clock.wrapping_add(1),
                count.wrapping_add(delta),
            );
            out[step..offset + step].copy_from_slice(&ctx[..offset]);
            out[offset + step..].copy_from_slice(&ctx[offset + step..]);
            return Ok(Bytes::from(out));
        }

        // First write from this node: widen the context.
        let mut out = vec![0u8; ctx.len() + step];
        codec::write_tuple(&mut out, id_len, 0, id.as_bytes(), 1, delta);
        out[step..].copy_from_slice(ctx);
        Ok(Bytes::from(out))
    }

    /// Determine the version-vector relationship between two contexts.
    ///
    /// Only logical clocks decide the relation; counts are payload. A
    /// producer that moved a count without advancing its clock violates
    /// the operational contract and is reported as EQUAL here.
    pub fn diff(&self, left: &[u8], right: &[u8]) -> Result<ContextRelationship> {
        let id_len = self.id_length();
        codec::validate(left, id_len)?;
        codec::validate(right, id_len)?;

        let step = self.step_length();
        let mut left_steps: Vec<&[u8]> = left.chunks_exact(step).collect();
        let mut right_steps: Vec<&[u8]> = right.chunks_exact(step).collect();
        left_steps.sort_unstable_by(|a, b| compare_subrange(a, 0, b, 0, id_len));
        right_steps.sort_unstable_by(|a, b| compare_subrange(a, 0, b, 0, id_len));

        let mut relationship = ContextRelationship::Equal;
        let mut li = 0;
        let mut ri = 0;
        while li < left_steps.len() && ri < right_steps.len() {
            match compare_subrange(left_steps[li], 0, right_steps[ri], 0, id_len) {
                Ordering::Equal => {
                    let left_clock = clock_of(left_steps[li], id_len);
                    let right_clock = clock_of(right_steps[ri], id_len);
                    li += 1;
                    ri += 1;

                    match left_clock.cmp(&right_clock) {
                        Ordering::Equal => continue,
                        Ordering::Greater => {
                            match widen(relationship, ContextRelationship::GreaterThan) {
                                Some(rel) => relationship = rel,
                                None => return Ok(ContextRelationship::Disjoint),
                            }
                        }
                        Ordering::Less => {
                            match widen(relationship, ContextRelationship::LessThan) {
                                Some(rel) => relationship = rel,
                                None => return Ok(ContextRelationship::Disjoint),
                            }
                        }
                    }
                }
                // Id present only on the left: left is a superset here.
                Ordering::Less => {
                    li += 1;
                    match widen(relationship, ContextRelationship::GreaterThan) {
                        Some(rel) => relationship = rel,
                        None => return Ok(ContextRelationship::Disjoint),
                    }
                }
                // Id present only on the right.
                Ordering::Greater => {
                    ri += 1;
                    match widen(relationship, ContextRelationship::LessThan) {
                        Some(rel) => relationship = rel,
                        None => return Ok(ContextRelationship::Disjoint),
                    }
                }
            }
        }

        // Tail remainders follow the same only-on-one-side rule.
        if li < left_steps.len() {
            match widen(relationship, ContextRelationship::GreaterThan) {
                Some(rel) => relationship = rel,
                None => return Ok(ContextRelationship::Disjoint),
            }
        } else if ri < right_steps.len() {
            match widen(relationship, ContextRelationship::LessThan) {
                Some(rel) => relationship = rel,
                None => return Ok(ContextRelationship::Disjoint),
            }
        }

        Ok(relationship)
    }

    /// Reconcile two contexts into one reflecting their causal union.
    ///
    /// Remote tuples keep the (clock, count) pair of whichever side holds
    /// the higher clock; the local node's tuple sums both sides, because
    /// two contexts carrying our own id reflect disjoint sets of local
    /// operations. Output tuples are sorted by descending clock, ties by
    /// descending id, so identical input sets produce identical bytes on
    /// every replica.
    pub fn merge(&self, left: &[u8], right: &[u8]) -> Result<Bytes> {
        let id_len = self.id_length();
        codec::validate(left, id_len)?;
        codec::validate(right, id_len)?;

        let mut merged: HashMap<&[u8], (u64, i64)> =
            HashMap::with_capacity(codec::tuple_count(left, id_len) + codec::tuple_count(right, id_len));

        for step_index in 0..codec::tuple_count(left, id_len) {
            let (id, clock, count) = codec::read_tuple(left, id_len, step_index);
            merged.insert(id, (clock, count));
        }

        for step_index in 0..codec::tuple_count(right, id_len) {
            let (id, clock, count) = codec::read_tuple(right, id_len, step_index);
            match merged.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert((clock, count));
                }
                Entry::Occupied(mut slot) => {
                    let (existing_clock, existing_count) = *slot.get();
                    if id == self.local_id.as_bytes() {
                        // Local id: sum clocks and counts.
                        slot.insert((
                            existing_clock.wrapping_add(clock),
                            existing_count.wrapping_add(count),
                        ));
                    } else if existing_clock < clock {
                        // Remote id: keep the highest clock and its count.
                        slot.insert((clock, count));
                    }
                }
            }
        }

        let mut tuples: Vec<(&[u8], u64, i64)> = merged
            .into_iter()
            .map(|(id, (clock, count))| (id, clock, count))
            .collect();
        tuples.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(a.0)));

        let mut out = vec![0u8; tuples.len() * self.step_length()];
        for (step_index, (id, clock, count)) in tuples.into_iter().enumerate() {
            codec::write_tuple(&mut out, id_len, step_index, id, clock, count);
        }
        Ok(Bytes::from(out))
    }

    /// Aggregated count across all node ids, as a wrapping signed sum.
    pub fn total(&self, ctx: &[u8]) -> Result<i64> {
        let id_len = self.id_length();
        codec::validate(ctx, id_len)?;

        let mut total = 0i64;
        for step_index in 0..codec::tuple_count(ctx, id_len) {
            let (_, _, count) = codec::read_tuple(ctx, id_len, step_index);
            total = total.wrapping_add(count);
        }
        Ok(total)
    }

    /// Aggregated count as an 8-byte big-endian payload.
    pub fn total_bytes(&self, ctx: &[u8]) -> Result<[u8; 8]> {
        Ok((self.total(ctx)? as u64).to_be_bytes())
    }

    /// Remove the tuple for `node`, if present.
    ///
    /// Returns a buffer one step shorter on a hit and a copy of the input
    /// when the node never wrote.
    pub fn clean_node_counts(&self, ctx: &[u8], node: IpAddr) -> Result<Bytes> {
        let id_len = self.id_length();
        codec::validate(ctx, id_len)?;
        let id = NodeId::from(node);
        self.check_id(&id)?;

        let step = self.step_length();
        for step_index in 0..codec::tuple_count(ctx, id_len) {
            let (tuple_id, _, _) = codec::read_tuple(ctx, id_len, step_index);
            if tuple_id != id.as_bytes() {
                continue;
            }

            let offset = step_index * step;
            let mut out = Vec::with_capacity(ctx.len() - step);
            out.extend_from_slice(&ctx[..offset]);
            out.extend_from_slice(&ctx[offset + step..]);
            return Ok(Bytes::from(out));
        }

        Ok(Bytes::copy_from_slice(ctx))
    }

    /// Human-readable rendering: `[{host, clock, count},...]`.
    ///
    /// Ids that do not decode to an address render as `?.?.?.?`.
    pub fn render(&self, ctx: &[u8]) -> Result<String> {
        let id_len = self.id_length();
        codec::validate(ctx, id_len)?;

        let mut out = String::from("[");
        for step_index in 0..codec::tuple_count(ctx, id_len) {
            let (id, clock, count) = codec::read_tuple(ctx, id_len, step_index);
            if step_index > 0 {
                out.push(',');
            }
            let host = NodeId::from_bytes(Bytes::copy_from_slice(id));
            let _ = write!(out, "{{{host}, {clock}, {count}}}");
        }
        out.push(']');
        Ok(out)
    }
}

#[inline]
fn clock_of(step: &[u8], id_len: usize) -> u64 {
    crate::util::bytes::decode_u64_be(step, id_len)
}

/// Widen `current` toward `observed`, or signal disjointness.
///
/// EQUAL widens to the observed direction; the same direction keeps it;
/// the opposite direction means the contexts are concurrent.
fn widen(
    current: ContextRelationship,
    observed: ContextRelationship,
) -> Option<ContextRelationship> {
    match current {
        ContextRelationship::Equal => Some(observed),
        _ if current == observed => Some(observed),
        _ => None,
    }
}
