//! End-to-end counter context scenarios
//!
//! Byte-literal walkthroughs of the replica pipeline: local increments,
//! cross-replica diff, and reconciling merges, pinned down to exact
//! buffer contents so the wire layout never drifts.

use std::net::{IpAddr, Ipv4Addr};

use galena::context::codec;
use galena::{ContextRelationship, CounterContext, NodeId};

fn node(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

/// Engine whose local id is 10.0.0.<last>.
fn engine_at(last: u8) -> CounterContext {
    CounterContext::new(NodeId::from(node(last)))
}

/// Build a context from (node, clock, count) tuples in the given order.
fn ctx_of(engine: &CounterContext, tuples: &[(IpAddr, u64, i64)]) -> Vec<u8> {
    let id_len = engine.id_length();
    let mut out = vec![0u8; tuples.len() * engine.step_length()];
    for (i, (addr, clock, count)) in tuples.iter().enumerate() {
        let id = NodeId::from(*addr);
        codec::write_tuple(&mut out, id_len, i, id.as_bytes(), *clock, *count);
    }
    out
}

#[test]
fn first_update_lays_out_one_tuple() {
    let engine = engine_at(1);
    let empty = engine.create();
    assert!(empty.is_empty());

    let ctx = engine.update(&empty, node(1), 5).unwrap();

    assert_eq!(ctx.len(), 20);
    #[rustfmt::skip]
    assert_eq!(
        &ctx[..],
        &[
            0x0a, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05,
        ]
    );
    assert_eq!(engine.total(&ctx).unwrap(), 5);
}

#[test]
fn second_writer_prepends_its_tuple() {
    let engine = engine_at(1);
    let ctx = engine.update(&engine.create(), node(1), 5).unwrap();
    let ctx = engine.update(&ctx, node(2), 3).unwrap();

    assert_eq!(ctx.len(), 40);
    assert_eq!(codec::read_tuple(&ctx, 4, 0), (&[10, 0, 0, 2][..], 1, 3));
    assert_eq!(codec::read_tuple(&ctx, 4, 1), (&[10, 0, 0, 1][..], 1, 5));
    assert_eq!(engine.total(&ctx).unwrap(), 8);
}

#[test]
fn remote_tuples_reconcile_by_highest_clock() {
    // local id is 10.0.0.7, so 10.0.0.1 is remote on both sides
    let engine = engine_at(7);
    let a = ctx_of(&engine, &[(node(1), 2, 5)]);
    let b = ctx_of(&engine, &[(node(1), 3, 9)]);

    assert_eq!(engine.diff(&a, &b).unwrap(), ContextRelationship::LessThan);

    let merged = engine.merge(&a, &b).unwrap();
    assert_eq!(merged, ctx_of(&engine, &[(node(1), 3, 9)]));
}

#[test]
fn local_tuples_sum_on_merge() {
    // two views of our own tally hold disjoint local operations
    let engine = engine_at(1);
    let a = ctx_of(&engine, &[(node(1), 2, 5)]);
    let b = ctx_of(&engine, &[(node(1), 3, 9)]);

    let merged = engine.merge(&a, &b).unwrap();
    assert_eq!(merged, ctx_of(&engine, &[(node(1), 5, 14)]));
}

#[test]
fn concurrent_contexts_are_disjoint_and_merge_deterministically() {
    let engine = engine_at(7);
    let a = ctx_of(&engine, &[(node(1), 2, 5), (node(2), 1, 1)]);
    let b = ctx_of(&engine, &[(node(1), 1, 5), (node(2), 2, 7)]);

    assert_eq!(engine.diff(&a, &b).unwrap(), ContextRelationship::Disjoint);

    let merged = engine.merge(&a, &b).unwrap();
    assert_eq!(
        merged,
        ctx_of(&engine, &[(node(2), 2, 7), (node(1), 2, 5)])
    );

    // reconciled replicas agree
    assert_eq!(
        engine.diff(&merged, &engine.merge(&b, &a).unwrap()).unwrap(),
        ContextRelationship::Equal
    );
}

#[test]
fn coordinator_reconciliation_converges() {
    // Replica A and replica B accept writes independently, then exchange
    // contexts. Both end up with identical bytes and the full total.
    let replica_a = engine_at(1);
    let replica_b = engine_at(2);

    let mut ctx_a = replica_a.create();
    ctx_a = replica_a.update(&ctx_a, node(1), 10).unwrap();
    ctx_a = replica_a.update(&ctx_a, node(1), 4).unwrap();

    let mut ctx_b = replica_b.create();
    ctx_b = replica_b.update(&ctx_b, node(2), -3).unwrap();

    assert_eq!(
        replica_a.diff(&ctx_a, &ctx_b).unwrap(),
        ContextRelationship::Disjoint
    );

    let merged_at_a = replica_a.merge(&ctx_a, &ctx_b).unwrap();
    let merged_at_b = replica_b.merge(&ctx_b, &ctx_a).unwrap();

    // Neither replica held a foreign copy of its own tuple, so the local
    // summing rule never fired and both orders agree exactly.
    assert_eq!(merged_at_a, merged_at_b);
    assert_eq!(replica_a.total(&merged_at_a).unwrap(), 11);
    assert_eq!(
        replica_a.render(&merged_at_a).unwrap(),
        "[{10.0.0.1, 2, 14},{10.0.0.2, 1, -3}]"
    );
}
