//! # Tree Benchmarks
//!
//! Performance benchmarks for arbor-core tree operations.
//!
//! Run with: `cargo bench -p arbor-core`

use arbor_core::{
    ChildIndex, DescendantResolver, MemoryStore, Node, NodeFields, NodeId, Partition,
    TreeBuilder, TreeService,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// Nodes arranged as a balanced tree with `fanout` children per node.
fn balanced_nodes(size: usize, fanout: usize) -> Vec<Node> {
    (1..=size)
        .map(|i| {
            let parent = if i == 1 { 0 } else { (i - 2) / fanout + 1 };
            Node::from_fields(
                NodeId(i as u64),
                NodeFields::menu("admin", format!("n{}", i), NodeId(parent as u64))
                    .with_order((i % 7) as i64),
            )
        })
        .collect()
}

/// Nodes arranged as a single chain.
fn chain_nodes(size: usize) -> Vec<Node> {
    (1..=size)
        .map(|i| {
            Node::from_fields(
                NodeId(i as u64),
                NodeFields::menu("admin", format!("n{}", i), NodeId(i as u64 - 1)),
            )
        })
        .collect()
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");

    for size in [100, 500, 2000].iter() {
        let nodes = balanced_nodes(*size, 4);
        group.bench_with_input(BenchmarkId::from_parameter(size), &nodes, |b, nodes| {
            b.iter(|| black_box(TreeBuilder::new().build(nodes)));
        });
    }

    group.finish();
}

fn bench_descendants(c: &mut Criterion) {
    let mut group = c.benchmark_group("descendants");

    for size in [100, 500, 2000].iter() {
        let balanced = ChildIndex::from_nodes(&balanced_nodes(*size, 4));
        let chain = ChildIndex::from_nodes(&chain_nodes(*size));

        group.bench_with_input(BenchmarkId::new("balanced", size), &balanced, |b, index| {
            b.iter(|| black_box(DescendantResolver::new(index).descendants(NodeId(1), 10)));
        });

        group.bench_with_input(BenchmarkId::new("chain_full", size), &chain, |b, index| {
            b.iter(|| {
                black_box(DescendantResolver::new(index).is_descendant(NodeId(1), NodeId(*size as u64)))
            });
        });
    }

    group.finish();
}

fn bench_cached_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_read");
    let admin = Partition::new("admin");

    for size in [100, 500].iter() {
        let store = MemoryStore::new();
        for node in balanced_nodes(*size, 4) {
            store.import_node(node);
        }
        let svc = TreeService::new(store, Default::default());

        group.bench_with_input(BenchmarkId::from_parameter(size), &admin, |b, admin| {
            b.iter(|| black_box(svc.get_or_build(admin, false)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_descendants, bench_cached_read);
criterion_main!(benches);
