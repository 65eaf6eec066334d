//! Micro-benchmarks for RoutingTable operations: touch and find_closest
//! at varying table sizes. Reports nanoseconds-per-operation.
//!
//! Run: `cargo bench --bench routing_table`

use std::time::{Duration, Instant};

use dht_engine::{NodeId, PeerId, RoutingTable};

fn main() {
    println!("routing_table\n");

    bench_touch();
    bench_find_closest();
}

fn bench_touch() {
    println!("touch");

    // Pre-generate random peers outside the timed section
    let peers: Vec<_> = (0..1000).map(|_| PeerId::random()).collect();

    // Empty table
    {
        let mut table = RoutingTable::new(NodeId::random());
        let start = Instant::now();
        for peer in peers.iter().cloned() {
            table.touch(peer);
        }
        let per_op = start.elapsed().as_nanos() / peers.len() as u128;
        println!("empty table:     {per_op}ns/op (final size: {})", table.size());
    }

    // Refreshing known peers
    {
        let mut table = RoutingTable::new(NodeId::random());
        for peer in peers[..100].iter().cloned() {
            table.touch(peer);
        }

        let start = Instant::now();
        for _ in 0..10 {
            for peer in peers[..100].iter().cloned() {
                table.touch(peer);
            }
        }
        let per_op = start.elapsed().as_nanos() / 1000;
        println!("refresh:         {per_op}ns/op");
    }

    // Full buckets, every entry stale so each newcomer evicts one
    {
        let mut table = RoutingTable::new(NodeId::random()).with_stale_after(Duration::ZERO);
        for _ in 0..400 {
            table.touch(PeerId::random());
        }

        let fresh: Vec<_> = (0..1000).map(|_| PeerId::random()).collect();
        let start = Instant::now();
        for peer in fresh {
            table.touch(peer);
        }
        let per_op = start.elapsed().as_nanos() / 1000;
        println!("stale eviction:  {per_op}ns/op");
    }

    println!();
}

fn bench_find_closest() {
    println!("find_closest");

    let targets: Vec<_> = (0..1000).map(|_| NodeId::random()).collect();

    for size in [50, 100, 200, 400] {
        let mut table = RoutingTable::new(NodeId::random());
        for _ in 0..size {
            table.touch(PeerId::random());
        }

        let start = Instant::now();
        for target in &targets {
            let _ = table.find_closest(target, 20, None);
        }
        let per_op = start.elapsed().as_nanos() / targets.len() as u128;
        println!("{size:>3} peers: {per_op}ns/op");
    }

    println!();
}
