mod nokhwa_camera;
mod session;
mod synthetic;

pub use nokhwa_camera::NokhwaBackend;
pub use session::CaptureSession;
pub use synthetic::SyntheticBackend;

use image::RgbImage;
use thiserror::Error;

/// Which physical camera the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FacingMode {
    /// User-facing (selfie) camera
    #[default]
    Front,
    /// Rear camera
    Environment,
}

impl FacingMode {
    /// Map a camera option label to a preference.
    ///
    /// Only labels mentioning "Front" select the user-facing camera.
    pub fn from_label(label: &str) -> Self {
        if label.contains("Front") {
            FacingMode::Front
        } else {
            FacingMode::Environment
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            FacingMode::Front => &["front", "user", "facetime", "integrated", "selfie"],
            FacingMode::Environment => &["back", "rear", "environment", "world"],
        }
    }
}

/// A camera as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera access was denied: {0}")]
    PermissionDenied(String),

    #[error("no camera available for {0:?} facing mode")]
    DeviceUnavailable(FacingMode),

    #[error("camera enumeration is unsupported: {0}")]
    EnumerationUnsupported(String),

    #[error("camera stream failed: {0}")]
    Stream(String),
}

/// Trait for an open camera stream
pub trait CaptureSource {
    /// Pull the most recent frame from the live stream
    fn capture_frame(&mut self) -> Result<RgbImage, CaptureError>;

    /// Release the stream and its hardware handle; must be idempotent
    fn release(&mut self);

    /// Device this stream was opened on
    fn device(&self) -> &CameraDevice;
}

/// Trait for platform camera access
pub trait CameraBackend {
    /// List video input devices in platform order
    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError>;

    /// Request a stream for the given facing preference
    fn open(&self, preference: FacingMode) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

/// List the camera options to offer the user.
///
/// Enumeration failures degrade to an empty list.
pub fn list_camera_options(backend: &dyn CameraBackend) -> Vec<CameraDevice> {
    match backend.list_devices() {
        Ok(devices) => devices,
        Err(err) => {
            tracing::warn!("Camera enumeration failed: {}", err);
            Vec::new()
        }
    }
}

/// Pick the device that best matches a facing preference
///
/// Labels are matched against well-known keywords first. Without a match,
/// Front takes the first device and Environment the last one.
pub fn resolve_device(devices: &[CameraDevice], preference: FacingMode) -> Option<&CameraDevice> {
    let by_label = devices.iter().find(|device| {
        let label = device.label.to_lowercase();
        preference.keywords().iter().any(|kw| label.contains(kw))
    });

    by_label.or_else(|| match preference {
        FacingMode::Front => devices.first(),
        FacingMode::Environment => devices.last(),
    })
}

/// Choose the device to open from a device listing
///
/// When the platform cannot list devices, `fallback` is opened instead so
/// that a failed enumeration never blocks capture.
pub fn choose_device(
    listing: Result<Vec<CameraDevice>, CaptureError>,
    preference: FacingMode,
    fallback: Option<CameraDevice>,
) -> Result<CameraDevice, CaptureError> {
    match listing {
        Ok(devices) => resolve_device(&devices, preference)
            .cloned()
            .ok_or(CaptureError::DeviceUnavailable(preference)),
        Err(err) => {
            tracing::warn!("Camera enumeration failed ({}), opening the default camera", err);
            fallback.ok_or(CaptureError::DeviceUnavailable(preference))
        }
    }
}
