//! phone_witnessd - phone-in-hand monitor daemon
//!
//! This daemon:
//! 1. Opens the camera and both detectors (failure here is fatal)
//! 2. Classifies every frame: phone present, phone held in hand
//! 3. Sounds the alarm while a phone is held
//! 4. Appends one record per held-phone episode to the violation log
//! 5. Stops the alarm on every exit path (end of stream, read failure, SIGINT/SIGTERM)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use phone_witness::{
    open_detector, CameraSource, DetectorRole, LogRenderer, Monitor, MonitorConfig, Pipeline,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "PHONE_WITNESS_CONFIG")]
    config: Option<PathBuf>,
    /// Camera source (`stub://name` or a device path such as /dev/video0).
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = MonitorConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(max_frames) = args.max_frames {
        cfg.source.max_frames = Some(max_frames);
    }
    cfg.validate()?;

    let activity = open_detector(
        DetectorRole::Activity,
        &cfg.detectors.activity_model,
        &cfg.detectors.activity_classes,
        cfg.detectors.input_size,
    )?;
    let phone = open_detector(
        DetectorRole::Phone,
        &cfg.detectors.phone_model,
        &cfg.detectors.phone_classes,
        cfg.detectors.input_size,
    )?;

    let mut source = CameraSource::new(cfg.source.clone())?;
    source
        .connect()
        .with_context(|| format!("camera unavailable: {}", cfg.source.url))?;

    // SIGINT, SIGTERM and SIGHUP all end the loop so the alarm is stopped.
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("error setting signal handler")?;

    let monitor = Monitor::from_config(&cfg);
    log::info!("phone_witnessd running. source={}", cfg.source.url);
    log::info!(
        "thresholds: phone>{:.2} hand>{:.2} holding_labels={:?}",
        cfg.phone_threshold,
        cfg.hand_threshold,
        cfg.holding_labels
    );
    log::info!("violation log: {}", cfg.log.path.display());

    let mut pipeline = Pipeline::new(
        source,
        phone,
        activity,
        Box::new(LogRenderer::new()),
        monitor,
    );
    let summary = pipeline.run(&stop)?;
    log::info!(
        "phone_witnessd exiting ({:?}) after {} frames, {} violations logged",
        summary.reason,
        summary.stats.frames,
        summary.stats.violations
    );
    Ok(())
}
