use clap::{Parser, Subcommand};
use glam::{UVec2, Vec3};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use voxelfront_engine::WorldFrontend;
use voxelfront_render::{FlyCamera, TextBackend};
use voxelfront_stream::StreamConfig;
use voxelfront_volume::{VoxelVolume, CHUNK_SIZE, WATER_LEVEL};

#[derive(Parser)]
#[command(name = "voxelfront-cli", about = "Headless voxelfront streaming tool")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Sample generated terrain heights around the origin
    Terrain {
        /// World seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Half-extent of the sampled square, in chunks
        #[arg(short, long, default_value = "2")]
        radius: i32,
    },
    /// Stream meshes along a straight camera flight and report stats
    Simulate {
        /// World seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Number of frames to run
        #[arg(short, long, default_value = "240")]
        frames: usize,
        /// Camera speed in world units per frame
        #[arg(long, default_value = "2.0")]
        speed: f32,
        /// Extraction radius in chunks
        #[arg(short, long, default_value = "3")]
        radius: i32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("voxelfront-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("stream: {}", voxelfront_stream::crate_info());
            println!("render: {}", voxelfront_render::crate_info());
            println!("engine: {}", voxelfront_engine::crate_info());
            println!("chunk size: {CHUNK_SIZE}");
        }
        Commands::Terrain { seed, radius } => {
            let volume = VoxelVolume::with_seed(seed);
            let Some(generator) = volume.generator() else {
                anyhow::bail!("volume has no generator");
            };
            println!("Terrain heights, seed={seed}:");
            for z in -radius * CHUNK_SIZE..=radius * CHUNK_SIZE {
                let mut row = String::new();
                for x in -radius * CHUNK_SIZE..=radius * CHUNK_SIZE {
                    let height = generator.height_at(x, z);
                    row.push(match height {
                        h if h < WATER_LEVEL => '~',
                        h if h < 24 => '.',
                        h if h < 32 => '+',
                        _ => '#',
                    });
                }
                println!("{row}");
            }
        }
        Commands::Simulate {
            seed,
            frames,
            speed,
            radius,
        } => {
            let volume = Arc::new(VoxelVolume::with_seed(seed));
            let config = StreamConfig {
                extraction_radius: radius,
                ..StreamConfig::default()
            };
            let mut engine = WorldFrontend::new(volume, config, TextBackend::new())?;
            engine.on_init(UVec2::new(640, 360))?;

            let mut camera = FlyCamera::default();
            engine.on_spawn(camera.position, radius + 1);

            let started = Instant::now();
            for frame in 0..frames {
                camera.position += Vec3::new(speed, 0.0, 0.0);
                engine.extract_new_meshes(camera.position, false);
                engine.on_running(1.0 / 60.0);
                engine.render_world(&camera)?;

                if frame % 60 == 0 {
                    let stats = engine.stats();
                    println!(
                        "frame {frame:>4}: meshes={} extracted={} pending={}",
                        stats.meshes, stats.extracted, stats.pending
                    );
                }
            }

            // Let in-flight extractions land before the final report.
            let deadline = Instant::now() + Duration::from_secs(5);
            while engine.stats().pending > 0 && Instant::now() < deadline {
                engine.on_running(1.0 / 60.0);
                std::thread::sleep(Duration::from_millis(2));
            }

            let stats = engine.stats();
            println!(
                "done in {:?}: meshes={} extracted={} pending={}",
                started.elapsed(),
                stats.meshes,
                stats.extracted,
                stats.pending
            );
            println!("last frame: {}", engine.backend().last_frame().trim_end());
            engine.shutdown();
        }
    }

    Ok(())
}
