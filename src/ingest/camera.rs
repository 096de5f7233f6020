//! Camera frame source.
//!
//! `CameraSource` yields RGB frames stamped with their wall-clock capture time.
//! `stub://` URLs produce a synthetic scene (tests, replay runs with scripted
//! detectors). Plain paths are V4L2 device nodes and need the `ingest-v4l2`
//! feature. Failing to open the camera is fatal; a failed read mid-stream ends
//! the stream.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::Local;

#[cfg(feature = "ingest-v4l2")]
use super::v4l2::V4l2Device;
use crate::frame::{rgb_len, Frame, FrameSource};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// `stub://name` or a local device path (e.g. "/dev/video0").
    pub url: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// End the stream after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            max_frames: None,
        }
    }
}

pub struct CameraSource {
    config: CameraConfig,
    backend: CameraBackend,
    frame_count: u64,
    failed: bool,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Device),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(anyhow!("camera source is empty"));
        }
        let backend = if config.url.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticCamera::new(config.clone()))
        } else if config.url.contains("://") {
            return Err(anyhow!(
                "unsupported camera source {} (expected stub:// or a device path)",
                config.url
            ));
        } else {
            open_device(&config)?
        };
        Ok(Self {
            config,
            backend,
            frame_count: 0,
            failed: false,
        })
    }

    /// Open the camera. Failure here means the camera is unavailable.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(device) => device.connect(),
        }
    }

    fn capture(&mut self) -> Result<(Vec<u8>, u32, u32)> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => Ok(camera.capture()),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(device) => device.capture(),
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        self.config.url.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            return Ok(None);
        }

        let (pixels, width, height) = match self.capture() {
            Ok(captured) => captured,
            Err(e) => {
                self.failed = true;
                return Err(e);
            }
        };
        self.frame_count += 1;
        Ok(Some(Frame::new(
            pixels,
            width,
            height,
            self.frame_count,
            Local::now(),
        )))
    }

    fn is_healthy(&self) -> bool {
        if self.failed {
            return false;
        }
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(device) => device.is_healthy(),
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(config: &CameraConfig) -> Result<CameraBackend> {
    Ok(CameraBackend::Device(V4l2Device::new(config.clone())))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(config: &CameraConfig) -> Result<CameraBackend> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        config.url
    ))
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    last_capture: Option<Instant>,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            last_capture: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("camera: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    /// Paced to `target_fps` so episode timing looks like a live camera.
    fn capture(&mut self) -> (Vec<u8>, u32, u32) {
        if let (Some(last), Some(interval)) = (self.last_capture, self.frame_interval()) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());
        self.frame_count += 1;

        let pixel_count = rgb_len(self.config.width, self.config.height);
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        (pixels, self.config.width, self.config.height)
    }

    fn frame_interval(&self) -> Option<Duration> {
        (self.config.target_fps > 0)
            .then(|| Duration::from_secs_f64(1.0 / self.config.target_fps as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(max_frames: Option<u64>) -> CameraConfig {
        CameraConfig {
            url: "stub://test".to_string(),
            target_fps: 1000,
            width: 8,
            height: 6,
            max_frames,
        }
    }

    #[test]
    fn stub_camera_produces_numbered_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config(None))?;
        source.connect()?;

        let first = source.next_frame()?.expect("frame");
        let second = source.next_frame()?.expect("frame");
        assert_eq!((first.width, first.height), (8, 6));
        assert_eq!(first.pixels().len(), first.expected_len());
        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert!(second.captured_at >= first.captured_at);
        assert!(source.is_healthy());
        Ok(())
    }

    #[test]
    fn max_frames_ends_the_stream() -> Result<()> {
        let mut source = CameraSource::new(stub_config(Some(2)))?;
        source.connect()?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.frames_captured(), 2);
        Ok(())
    }

    #[test]
    fn rejects_network_and_empty_sources() {
        let mut cfg = stub_config(None);
        cfg.url = "rtsp://camera".to_string();
        assert!(CameraSource::new(cfg.clone()).is_err());
        cfg.url = "  ".to_string();
        assert!(CameraSource::new(cfg).is_err());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn device_path_requires_v4l2_feature() {
        let mut cfg = stub_config(None);
        cfg.url = "/dev/video0".to_string();
        let err = CameraSource::new(cfg).err().expect("must fail");
        assert!(err.to_string().contains("ingest-v4l2"));
    }
}
