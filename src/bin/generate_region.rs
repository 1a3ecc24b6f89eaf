//! Region generator binary: pre-generates and persists a square region of chunks.
//!
//! Usage: cargo run --release --bin generate_region -- [OPTIONS]
//!
//! Options:
//!   --radius <N>      Chunk radius around the origin (default: 4)
//!   --seed <SEED>     Random seed (default: 12345)
//!   --data-dir <DIR>  Output directory for chunk files (default: "world")
//!   --scale <SCALE>   Terrain noise scale (default: 100.0)
//!   --height <H>      Terrain height scale (default: 64.0)
//!   --jobs <N>        Max parallel chunk loads (default: 4)
//!
//! Output structure:
//!   <data-dir>/
//!     world.json              # World config snapshot
//!     00000000_00000000.chn   # One file per chunk, coords as hex
//!     ...
//!
//! Re-running against an existing directory loads the persisted chunks
//! instead of regenerating them; the summary shows the split.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chunkstore::core::config::WorldConfig;
use chunkstore::streaming::provider::ChunkProvider;
use chunkstore::terrain::generator::{TerrainGenerator, TerrainParams};
use chunkstore::voxel::chunk::ChunkCoord;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let radius = parse_i32_arg(&args, "--radius").unwrap_or(4);
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let data_dir = parse_str_arg(&args, "--data-dir").unwrap_or_else(|| "world".to_string());
    let scale = parse_f32_arg(&args, "--scale").unwrap_or(100.0);
    let height_scale = parse_f32_arg(&args, "--height").unwrap_or(64.0);
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);

    let data_dir = PathBuf::from(data_dir);
    let side = radius * 2 + 1;
    let total = (side * side) as usize;

    println!("=== Chunkstore Region Generator ===");
    println!("Region: {} x {} chunks (radius {})", side, side, radius);
    println!("Seed:   {}", seed);
    println!("Scale:  {}, Height: {}", scale, height_scale);
    println!("Jobs:   {} parallel loads", jobs);
    println!("Output: {}", data_dir.display());
    println!();

    let terrain_params = TerrainParams {
        seed,
        scale,
        height_scale,
        ..Default::default()
    };

    let config = WorldConfig {
        persist_chunks: true,
        data_dir: data_dir.clone(),
        max_concurrent_loads: jobs,
        terrain_params: terrain_params.clone(),
        ..Default::default()
    };

    std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");
    config
        .save_sync(&data_dir.join("world.json"))
        .expect("Failed to write world config");

    let generator = Arc::new(TerrainGenerator::new(terrain_params));
    let mut provider = ChunkProvider::new(&config, generator)
        .expect("Failed to create chunk provider");

    // Phase 1: request the whole region
    let start = Instant::now();
    let mut coords: Vec<ChunkCoord> = Vec::with_capacity(total);
    let mut handles = Vec::with_capacity(total);
    for cx in -radius..=radius {
        for cz in -radius..=radius {
            let coord = ChunkCoord::new(cx, cz);
            let handle = provider.request_chunk(coord).expect("Chunk request failed");
            coords.push(coord);
            handles.push(handle);
        }
    }

    // Phase 2: pump until every chunk is resident
    let mut done = handles.iter().filter(|h| h.is_loaded()).count();
    report_progress(done, total, &start);
    while done < total {
        provider.update();
        let now_done = handles.iter().filter(|h| h.is_loaded()).count();
        if now_done != done {
            done = now_done;
            if done % 256 == 0 || done == total {
                report_progress(done, total, &start);
            }
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    let load_elapsed = start.elapsed();
    let stats = provider.stats().clone();
    println!();
    println!("Loaded: {} chunks in {:.1}s ({:.0} chunks/sec)",
        total, load_elapsed.as_secs_f64(),
        total as f64 / load_elapsed.as_secs_f64());
    println!("        {} generated, {} from disk, {} corrupt files replaced",
        stats.generated, stats.loaded_from_disk, stats.corrupt_files_removed);

    // Phase 3: release everything, persisting to disk
    let save_start = Instant::now();
    for &coord in &coords {
        if let Err(e) = provider.release_chunk(coord) {
            eprintln!("  failed to persist chunk {:?}: {}", coord, e);
        }
    }
    provider.shutdown();

    let stats = provider.stats().clone();
    let disk_bytes = region_bytes_on_disk(&data_dir);

    println!();
    println!("=== Region Complete ===");
    println!("Chunks: {} persisted in {:.1}s ({} save failures)",
        stats.chunks_saved, save_start.elapsed().as_secs_f64(), stats.save_failures);
    println!("Size:   {:.1} MB on disk ({:.1} KB/chunk)",
        disk_bytes as f64 / (1024.0 * 1024.0),
        disk_bytes as f64 / 1024.0 / total.max(1) as f64);
    println!("Output: {}", data_dir.display());
}

fn report_progress(done: usize, total: usize, start: &Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    if done == 0 || elapsed <= 0.0 {
        eprintln!("  [{}/{}] loading...", done, total);
        return;
    }
    let rate = done as f64 / elapsed;
    let remaining = (total - done) as f64 / rate;
    eprintln!("  [{}/{}] {:.0} chunks/sec, ~{:.0}s remaining", done, total, rate, remaining);
}

fn region_bytes_on_disk(data_dir: &std::path::Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(data_dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

fn parse_i32_arg(args: &[String], flag: &str) -> Option<i32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.clone())
}
