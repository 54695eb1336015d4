//! arcamd - AR camera feed daemon
//!
//! This daemon:
//! 1. Loads configuration (`ARCAM_CONFIG` file + `ARCAM_*` env overrides)
//! 2. Starts a capture session against the synthetic stub camera
//! 3. Feeds repacked frames to a logging renderer sink
//! 4. Logs health counters periodically
//! 5. Destroys the session on Ctrl-C or after a frame budget

use anyhow::Result;
use clap::Parser;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use arcam_feed::{
    ArcamdConfig, CaptureSessionManager, FixedOrientation, LogSink, StubRuntime, StubRuntimeConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Shut down after this many delivered frames (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    frames: u64,
    /// Seconds between health log lines.
    #[arg(long, default_value_t = 5)]
    health_interval_s: u64,
    /// Flip the lens once after this many seconds (0 = never).
    #[arg(long, default_value_t = 0)]
    flip_after_s: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ArcamdConfig::load()?;

    let runtime = StubRuntime::new(StubRuntimeConfig {
        torch: config.stub_torch,
        auto_stream: true,
        row_padding: config.stub_row_padding,
        ..StubRuntimeConfig::default()
    });
    let mut manager = CaptureSessionManager::new(
        runtime,
        config.device.clone(),
        Box::new(FixedOrientation(config.orientation)),
        Box::<LogSink>::default(),
    );
    manager.start(config.capture.clone())?;
    log::info!(
        "arcamd running: {:?} facing {:?} on {}/{}",
        manager.capture_size(),
        manager.lens_facing(),
        config.device.manufacturer,
        config.device.model
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    let started = Instant::now();
    let mut last_health = Instant::now();
    let mut flipped = false;
    loop {
        if rx.recv_timeout(Duration::from_millis(200)).is_ok() {
            log::info!("shutdown signal received");
            break;
        }
        let stats = manager.stats();
        if args.frames > 0 && stats.delivered >= args.frames {
            log::info!("frame budget reached ({} delivered)", stats.delivered);
            break;
        }
        if args.flip_after_s > 0 && !flipped && started.elapsed().as_secs() >= args.flip_after_s {
            flipped = true;
            match manager.flip_lens() {
                Ok(facing) => log::info!("lens flipped to {:?}", facing),
                Err(err) => log::error!("lens flip failed: {}", err),
            }
        }
        if last_health.elapsed().as_secs() >= args.health_interval_s {
            last_health = Instant::now();
            log::info!(
                "health: delivered={} repacked={} dropped={}",
                stats.delivered,
                stats.repacked,
                stats.dropped
            );
        }
    }

    manager.destroy();
    let stats = manager.stats();
    log::info!(
        "arcamd stopped: delivered={} repacked={} dropped={}",
        stats.delivered,
        stats.repacked,
        stats.dropped
    );
    Ok(())
}
