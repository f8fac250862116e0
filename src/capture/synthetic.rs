use super::{choose_device, CameraBackend, CameraDevice, CaptureError, CaptureSource, FacingMode};
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Camera backend producing a moving test pattern
///
/// Tracks how many streams are live so callers can check that every
/// stream it hands out is eventually released.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    devices: Vec<CameraDevice>,
    live_streams: Arc<AtomicUsize>,
    opened_streams: Arc<AtomicUsize>,
    deny_permission: bool,
    enumeration_supported: bool,
}

impl SyntheticBackend {
    pub fn new(devices: Vec<CameraDevice>) -> Self {
        Self {
            devices,
            live_streams: Arc::new(AtomicUsize::new(0)),
            opened_streams: Arc::new(AtomicUsize::new(0)),
            deny_permission: false,
            enumeration_supported: true,
        }
    }

    /// A front and a rear camera, as found on a typical phone
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            CameraDevice {
                id: "synthetic-0".to_string(),
                label: "Front Camera".to_string(),
            },
            CameraDevice {
                id: "synthetic-1".to_string(),
                label: "Back Camera".to_string(),
            },
        ])
    }

    #[cfg(test)]
    /// Refuse every stream request as the user declining access would
    pub fn deny_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    #[cfg(test)]
    /// Behave like a platform without device listing
    pub fn unsupported_enumeration(mut self) -> Self {
        self.enumeration_supported = false;
        self
    }

    #[cfg(test)]
    /// Streams opened and not yet released
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    /// Streams opened over the backend's lifetime
    pub fn opened_streams(&self) -> usize {
        self.opened_streams.load(Ordering::SeqCst)
    }
}

impl CameraBackend for SyntheticBackend {
    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        if !self.enumeration_supported {
            return Err(CaptureError::EnumerationUnsupported(
                "synthetic backend configured without enumeration".to_string(),
            ));
        }
        Ok(self.devices.clone())
    }

    fn open(&self, preference: FacingMode) -> Result<Box<dyn CaptureSource>, CaptureError> {
        if self.deny_permission {
            return Err(CaptureError::PermissionDenied(
                "synthetic camera access refused".to_string(),
            ));
        }

        let device = choose_device(self.list_devices(), preference, self.devices.first().cloned())?;

        self.live_streams.fetch_add(1, Ordering::SeqCst);
        self.opened_streams.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Synthetic stream opened on {}", device.label);

        Ok(Box::new(SyntheticCapture {
            device,
            live_streams: Arc::clone(&self.live_streams),
            frame_index: 0,
            streaming: true,
        }))
    }
}

struct SyntheticCapture {
    device: CameraDevice,
    live_streams: Arc<AtomicUsize>,
    frame_index: u32,
    streaming: bool,
}

impl CaptureSource for SyntheticCapture {
    fn capture_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if !self.streaming {
            return Err(CaptureError::Stream("stream already released".to_string()));
        }

        let phase = self.frame_index;
        self.frame_index = self.frame_index.wrapping_add(1);

        Ok(RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            let r = ((x + phase) % 256) as u8;
            let g = ((y + phase / 2) % 256) as u8;
            let b = (((x + y) / 2) % 256) as u8;
            Rgb([r, g, b])
        }))
    }

    fn release(&mut self) {
        if self.streaming {
            self.streaming = false;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("Synthetic stream on {} released", self.device.label);
        }
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_counted_once() {
        let backend = SyntheticBackend::with_default_devices();
        let mut stream = backend.open(FacingMode::Front).unwrap();
        assert_eq!(backend.live_streams(), 1);
        assert_eq!(stream.device().label, "Front Camera");

        stream.release();
        stream.release();
        drop(stream);
        assert_eq!(backend.live_streams(), 0);
        assert_eq!(backend.opened_streams(), 1);
    }

    #[test]
    fn frames_stop_after_release() {
        let backend = SyntheticBackend::with_default_devices();
        let mut stream = backend.open(FacingMode::Environment).unwrap();
        let frame = stream.capture_frame().unwrap();
        assert_eq!(frame.dimensions(), (WIDTH, HEIGHT));

        stream.release();
        assert!(matches!(stream.capture_frame(), Err(CaptureError::Stream(_))));
    }

    #[test]
    fn denied_permission_opens_nothing() {
        let backend = SyntheticBackend::with_default_devices().deny_permission();
        assert!(matches!(
            backend.open(FacingMode::Front),
            Err(CaptureError::PermissionDenied(_))
        ));
        assert_eq!(backend.live_streams(), 0);
    }

    #[test]
    fn unlisted_devices_fall_back_to_first_camera() {
        let backend = SyntheticBackend::with_default_devices().unsupported_enumeration();
        assert!(backend.list_devices().is_err());

        let stream = backend.open(FacingMode::Environment).unwrap();
        assert_eq!(stream.device().label, "Front Camera");
        assert_eq!(backend.live_streams(), 1);
    }

    #[test]
    fn no_devices_is_unavailable() {
        let backend = SyntheticBackend::new(Vec::new());
        assert!(matches!(
            backend.open(FacingMode::Environment),
            Err(CaptureError::DeviceUnavailable(FacingMode::Environment))
        ));
    }
}
