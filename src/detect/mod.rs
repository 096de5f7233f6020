mod backend;
mod backends;
mod result;

use std::path::Path;

pub use backend::{Detector, DetectorRole, DetectorUnavailable};
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{contains, non_max_suppression, BoundingBox, Detection};

/// Open the detector for one stream.
///
/// `*.jsonl` paths replay a recorded detection script. Anything else is an ONNX
/// model and needs the `backend-tract` feature. Every failure is reported as
/// `DetectorUnavailable`, which the daemon treats as fatal before the loop starts.
pub fn open_detector(
    role: DetectorRole,
    model: &str,
    classes: &[String],
    input_size: u32,
) -> Result<Box<dyn Detector>, DetectorUnavailable> {
    let unavailable = |reason: String| DetectorUnavailable {
        role,
        model: model.to_string(),
        reason,
    };

    let path = Path::new(model);
    let mut detector: Box<dyn Detector> = if path.extension().is_some_and(|ext| ext == "jsonl") {
        Box::new(ScriptedBackend::from_path(path).map_err(|e| unavailable(format!("{:#}", e)))?)
    } else {
        open_model(path, input_size, classes).map_err(unavailable)?
    };

    detector
        .warm_up()
        .map_err(|e| unavailable(format!("warm-up failed: {:#}", e)))?;
    log::info!(
        "{} detector ready: backend={} model={}",
        role.as_str(),
        detector.name(),
        model
    );
    Ok(detector)
}

#[cfg(feature = "backend-tract")]
fn open_model(path: &Path, input_size: u32, classes: &[String]) -> Result<Box<dyn Detector>, String> {
    TractBackend::new(path, input_size, classes.to_vec())
        .map(|backend| Box::new(backend) as Box<dyn Detector>)
        .map_err(|e| format!("{:#}", e))
}

#[cfg(not(feature = "backend-tract"))]
fn open_model(_path: &Path, _input_size: u32, _classes: &[String]) -> Result<Box<dyn Detector>, String> {
    Err("ONNX models require the backend-tract feature".to_string())
}
