use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use voxelfront_common::GridPos;
use voxelfront_mesh::extract_chunk;
use voxelfront_stream::{CpuUpload, CullPolicy, StreamConfig, WorldStreamer};
use voxelfront_volume::{VoxelVolume, CHUNK_SIZE};

fn bench_extract_chunk(iterations: usize) {
    let volume = VoxelVolume::with_seed(42);
    let grid = GridPos::new(0, 0);
    let page = volume.ensure_page(grid).expect("generator configured");

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(extract_chunk(black_box(&page), grid));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  extract_chunk ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_cull_scan(cells: i32, iterations: usize) {
    let policy = CullPolicy::new(200.0, 250.0).expect("valid thresholds");
    let center = GridPos::new(0, 0);
    let positions: Vec<GridPos> = (-cells..cells)
        .flat_map(|x| (-cells..cells).map(move |z| GridPos::new(x, z)))
        .collect();

    let start = Instant::now();
    for _ in 0..iterations {
        let culled = positions
            .iter()
            .filter(|g| policy.is_distance_culled(g.distance2(center, CHUNK_SIZE), false))
            .count();
        black_box(culled);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  cull scan ({} cells, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        positions.len()
    );
}

fn bench_streaming_flight(frames: usize, radius: i32) {
    let volume = Arc::new(VoxelVolume::with_seed(42));
    let config = StreamConfig {
        extraction_radius: radius,
        render_distance: 400.0,
        retention_distance: 500.0,
        worker_count: 4,
    };
    let mut streamer = WorldStreamer::new(volume, config).expect("valid config");
    let mut uploader = CpuUpload;

    let start = Instant::now();
    for frame in 0..frames {
        // One cell of camera travel per frame.
        let pos = Vec3::new((frame as i32 * CHUNK_SIZE) as f32, 30.0, 8.0);
        streamer.extract_new_meshes(pos, false);
        streamer.merge_completed(&mut uploader);
    }
    while streamer.stats().pending > 0 {
        streamer.merge_completed(&mut uploader);
        std::thread::yield_now();
    }
    let elapsed = start.elapsed();
    let stats = streamer.stats();
    println!(
        "  flight ({frames} cells, r={radius}): {elapsed:?}, extracted={}, cached={}",
        stats.extracted, stats.meshes
    );
}

fn main() {
    println!("=== Streaming Benchmarks ===\n");

    println!("Chunk extraction:");
    bench_extract_chunk(200);

    println!("\nEviction scan:");
    bench_cull_scan(32, 1000);

    println!("\nCamera flight (extraction + merge):");
    bench_streaming_flight(16, 2);
    bench_streaming_flight(16, 4);

    println!("\n=== Done ===");
}
