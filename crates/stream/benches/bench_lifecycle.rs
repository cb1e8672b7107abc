use std::hint::black_box;
use std::time::Instant;

use voxelcore_common::{BlockCoord, BlockKind, ChunkKey, CHUNK_SIZE};
use voxelcore_kernel::BlockStore;
use voxelcore_stream::{ChunkLifecycle, StreamConfig};

/// Walk back and forth along X, completing every request instantly.
fn bench_lifecycle_walk(load_radius: i32, iterations: usize) {
    let config = StreamConfig {
        load_radius,
        cleanup_radius: load_radius + 2,
        unload_radius: load_radius + 6,
        request_budget: usize::MAX,
        cleanup_budget: usize::MAX,
        unload_budget: usize::MAX,
        ..StreamConfig::default()
    };
    let mut lifecycle = match ChunkLifecycle::new(config) {
        Ok(lc) => lc,
        Err(err) => {
            eprintln!("  invalid config: {err}");
            return;
        }
    };

    let start = Instant::now();
    for i in 0..iterations {
        let x = (i % 40) as i32 - 20;
        let plan = lifecycle.update(black_box(ChunkKey::new(x.abs(), 0)));
        for key in plan.to_request {
            if lifecycle.begin_request(key).is_ok() {
                lifecycle.mark_active(key);
            }
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  walk (load r={load_radius}, {iterations} ticks): {per_iter:?}/tick, total {elapsed:?}, loaded {}",
        lifecycle.loaded_chunks().len()
    );
}

/// Fill chunk columns, then clean them up and restore them.
fn bench_store_churn(chunks: i32, height: i32, iterations: usize) {
    let mut store = BlockStore::new();
    let start = Instant::now();
    for _ in 0..iterations {
        for cx in 0..chunks {
            for x in 0..CHUNK_SIZE {
                for z in 0..CHUNK_SIZE {
                    for y in 0..height {
                        store.add(
                            BlockCoord::new(cx * CHUNK_SIZE + x, y, z),
                            BlockKind::Stone,
                        );
                    }
                }
            }
        }
        for cx in 0..chunks {
            let removed = store.remove_chunk(ChunkKey::new(cx, 0));
            black_box(store.restore(&removed));
            black_box(store.remove_chunk(ChunkKey::new(cx, 0)));
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  churn ({chunks} chunks x {height} layers, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Chunk Lifecycle Benchmarks ===\n");

    println!("Lifecycle walk:");
    bench_lifecycle_walk(2, 10000);
    bench_lifecycle_walk(6, 2000);
    bench_lifecycle_walk(12, 200);

    println!("\nBlock store churn:");
    bench_store_churn(4, 4, 100);
    bench_store_churn(16, 8, 10);

    println!("\n=== Done ===");
}
