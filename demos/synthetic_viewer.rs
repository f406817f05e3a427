//! Runs the viewer against the synthetic camera and prints the stats panel.
//!
//! Usage: cargo run --example synthetic_viewer -- [--fps N] [--filter KEY]
//!
//! Set `RUST_LOG=camera_feed=debug` to see capture lifecycle events.

use std::{
    env,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use camera_feed::{
    CaptureOptions, ProcessedFilter, SyntheticCamera, Viewer, AWAITING_DATASTREAM,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut fps = 15;
    let mut filter = ProcessedFilter::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--fps" if i + 1 < args.len() => {
                fps = args[i + 1].parse()?;
                i += 2;
            }
            "--filter" if i + 1 < args.len() => {
                filter = args[i + 1].parse()?;
                i += 2;
            }
            _ => i += 1,
        }
    }

    let exit_loop = Arc::new(AtomicBool::new(false));
    let exit_loop_clone = exit_loop.clone();
    ctrlc::set_handler(move || {
        exit_loop_clone.store(true, Ordering::Relaxed);
    })?;

    let options = CaptureOptions::builder().ideal_resolution(640, 360).build()?;
    let viewer = Viewer::new(SyntheticCamera::default(), options);
    viewer.set_fps(fps)?;
    viewer.set_filter(filter);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async {
        if let Err(e) = viewer.start().await {
            eprintln!("Failed to start: {e}");
            return;
        }

        println!("Viewing synthetic camera at {} fps", viewer.fps());
        println!("Processed filter: {filter} ({})", filter.css());
        println!("Press Ctrl+C to exit\n");

        while !exit_loop.load(Ordering::Relaxed) && viewer.is_playing() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            match viewer.stats_panel() {
                Some(stats) => println!(
                    "{} | {} fps | {} | {}",
                    stats.timestamp, stats.fps, stats.resolution, stats.processing_time
                ),
                None => println!("{AWAITING_DATASTREAM}"),
            }
        }

        if let Some(err) = viewer.error() {
            eprintln!("{err}");
        }
        viewer.stop();
    });

    println!("Stopped");
    Ok(())
}
