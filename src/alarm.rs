//! Audible alarm for "phone held" episodes.
//!
//! `AlarmController` owns the single `playing` flag. Start and stop are
//! idempotent and the controller stops itself on drop, so an active alarm never
//! outlives the monitor. The actual sound is produced by an `AlarmOutput`; a
//! missing asset leaves the controller silent but otherwise fully functional.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const BELL_INTERVAL: Duration = Duration::from_secs(1);

/// Placeholder in player arguments replaced by the asset path.
pub const ASSET_PLACEHOLDER: &str = "{asset}";

/// Alarm sound file, checked once at startup.
#[derive(Clone, Debug)]
pub struct AlarmAsset {
    path: PathBuf,
    bytes: u64,
}

impl AlarmAsset {
    /// Load the asset. A missing or unreadable file is not an error: it logs a
    /// single warning and returns `None`, and the alarm runs silent.
    pub fn load<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Some(Self {
                path: path.to_path_buf(),
                bytes: meta.len(),
            }),
            Ok(_) => {
                log::warn!("alarm sound {} is not a file; alarm disabled", path.display());
                None
            }
            Err(e) => {
                log::warn!("alarm sound {} not found ({}); alarm disabled", path.display(), e);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes
    }
}

/// Sound device seam. Playback itself is out of the monitor's hands.
pub trait AlarmOutput: Send {
    /// Begin looping playback.
    fn start_loop(&mut self) -> Result<()>;

    /// Halt playback. Must tolerate being called when nothing is playing.
    fn halt(&mut self) -> Result<()>;
}

/// What the looping worker plays.
#[derive(Clone, Debug)]
pub enum AlarmSound {
    /// Ring the terminal bell once per second.
    Bell,
    /// Run an external player repeatedly until halted.
    Player { program: String, args: Vec<String> },
}

impl AlarmSound {
    /// Build a player command line, substituting the asset path for `{asset}`.
    /// Without a placeholder the asset path is appended as the last argument.
    pub fn player(command: &[String], asset: &AlarmAsset) -> Result<Self> {
        let (program, rest) = command
            .split_first()
            .ok_or_else(|| anyhow!("alarm player command is empty"))?;
        let asset_path = asset.path().display().to_string();
        let mut args: Vec<String> = rest
            .iter()
            .map(|arg| arg.replace(ASSET_PLACEHOLDER, &asset_path))
            .collect();
        if !rest.iter().any(|arg| arg.contains(ASSET_PLACEHOLDER)) {
            args.push(asset_path);
        }
        Ok(AlarmSound::Player {
            program: program.clone(),
            args,
        })
    }

    /// Sound for the configured player. An empty command rings the terminal
    /// bell instead.
    pub fn select(asset: &AlarmAsset, player: &[String]) -> Self {
        if player.is_empty() {
            return AlarmSound::Bell;
        }
        match AlarmSound::player(player, asset) {
            Ok(sound) => sound,
            Err(e) => {
                log::warn!("{}; falling back to terminal bell", e);
                AlarmSound::Bell
            }
        }
    }
}

/// Plays an `AlarmSound` on a worker thread until halted.
pub struct LoopingAlarm {
    sound: AlarmSound,
    worker: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl LoopingAlarm {
    pub fn new(sound: AlarmSound) -> Self {
        Self { sound, worker: None }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

impl AlarmOutput for LoopingAlarm {
    fn start_loop(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let sound = self.sound.clone();
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("alarm".to_string())
            .spawn(move || play_until_stopped(&sound, &flag))
            .context("failed to spawn alarm thread")?;
        self.worker = Some((stop, handle));
        Ok(())
    }

    fn halt(&mut self) -> Result<()> {
        let Some((stop, handle)) = self.worker.take() else {
            return Ok(());
        };
        stop.store(true, Ordering::SeqCst);
        handle
            .join()
            .map_err(|_| anyhow!("alarm thread panicked"))
    }
}

impl Drop for LoopingAlarm {
    fn drop(&mut self) {
        let _ = self.halt();
    }
}

fn play_until_stopped(sound: &AlarmSound, stop: &AtomicBool) {
    if let AlarmSound::Player { program, args } = sound {
        loop {
            match play_once(program, args, stop) {
                PlayOutcome::Finished => continue,
                PlayOutcome::Stopped => return,
                PlayOutcome::Failed => {
                    log::warn!("alarm player {} unusable; falling back to terminal bell", program);
                    break;
                }
            }
        }
    }
    ring_bell_until_stopped(stop);
}

fn ring_bell_until_stopped(stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
        wait_or_stop(stop, BELL_INTERVAL);
    }
}

enum PlayOutcome {
    Finished,
    Stopped,
    Failed,
}

/// Run the player once, to completion or until stopped.
fn play_once(program: &str, args: &[String], stop: &AtomicBool) -> PlayOutcome {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            log::error!("alarm player {} failed to start: {}", program, e);
            return PlayOutcome::Failed;
        }
    };

    loop {
        if stop.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            return PlayOutcome::Stopped;
        }
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return PlayOutcome::Finished,
            Ok(Some(status)) => {
                log::error!("alarm player {} exited with {}", program, status);
                return PlayOutcome::Failed;
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                log::error!("alarm player {} wait failed: {}", program, e);
                let _ = child.kill();
                let _ = child.wait();
                return PlayOutcome::Failed;
            }
        }
    }
}

fn wait_or_stop(stop: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Idempotent alarm switch.
///
/// `playing` tracks the logical alarm state and is set even when no output is
/// attached, so it always mirrors whether a "phone held" episode is active.
pub struct AlarmController {
    output: Option<Box<dyn AlarmOutput>>,
    playing: bool,
}

impl AlarmController {
    pub fn new(output: Box<dyn AlarmOutput>) -> Self {
        Self {
            output: Some(output),
            playing: false,
        }
    }

    /// Controller without any sound output.
    pub fn silent() -> Self {
        Self {
            output: None,
            playing: false,
        }
    }

    /// Build from the configured asset and optional player command.
    pub fn from_settings(asset_path: &Path, player: &[String]) -> Self {
        let Some(asset) = AlarmAsset::load(asset_path) else {
            return Self::silent();
        };
        let sound = AlarmSound::select(&asset, player);
        log::info!(
            "alarm ready: {} ({} bytes) via {:?}",
            asset.path().display(),
            asset.size_bytes(),
            sound
        );
        Self::new(Box::new(LoopingAlarm::new(sound)))
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_silent(&self) -> bool {
        self.output.is_none()
    }

    /// Start the alarm loop. No-op if already playing.
    pub fn start(&mut self) {
        if self.playing {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            if let Err(e) = output.start_loop() {
                log::error!("alarm failed to start: {:#}", e);
            }
        }
        self.playing = true;
        log::warn!("ALARM: phone held in hand");
    }

    /// Stop the alarm loop. No-op if not playing.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            if let Err(e) = output.halt() {
                log::error!("alarm failed to stop cleanly: {:#}", e);
            }
        }
        self.playing = false;
        log::info!("alarm stopped");
    }
}

impl Drop for AlarmController {
    fn drop(&mut self) {
        self.stop();
    }
}
