//! Frame ingestion sources.
//!
//! - Synthetic camera (`stub://`), always available
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Sources stamp each frame with its capture time and hand it to the monitor
//! loop. They never store frames.

pub mod camera;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource};
