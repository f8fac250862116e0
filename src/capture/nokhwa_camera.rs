use super::{choose_device, CameraBackend, CameraDevice, CaptureError, CaptureSource, FacingMode};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Platform cameras through nokhwa
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for NokhwaBackend {
    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        let cameras = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CaptureError::EnumerationUnsupported(e.to_string()))?;

        Ok(cameras
            .into_iter()
            .map(|info| CameraDevice {
                id: info.index().to_string(),
                label: info.human_name(),
            })
            .collect())
    }

    fn open(&self, preference: FacingMode) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let default_camera = CameraDevice {
            id: "0".to_string(),
            label: "Default camera".to_string(),
        };
        let device = choose_device(self.list_devices(), preference, Some(default_camera))?;

        tracing::info!("Opening camera {} ({}) for {:?}", device.id, device.label, preference);

        let index = match device.id.parse::<u32>() {
            Ok(n) => CameraIndex::Index(n),
            Err(_) => CameraIndex::String(device.id.clone()),
        };
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(index, requested)
            .map_err(|e| open_error(&e.to_string(), preference))?;

        camera
            .open_stream()
            .map_err(|e| open_error(&e.to_string(), preference))?;

        tracing::info!("Camera stream opened");

        Ok(Box::new(NokhwaCapture {
            camera,
            device,
            streaming: true,
        }))
    }
}

/// Permission refusals surface through the backend's error text
fn open_error(message: &str, preference: FacingMode) -> CaptureError {
    let lower = message.to_lowercase();
    if ["permission", "denied", "not authorized", "unauthorized"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        CaptureError::PermissionDenied(message.to_string())
    } else {
        tracing::debug!("Camera open failed: {}", message);
        CaptureError::DeviceUnavailable(preference)
    }
}

struct NokhwaCapture {
    camera: Camera,
    device: CameraDevice,
    streaming: bool,
}

impl CaptureSource for NokhwaCapture {
    fn capture_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if !self.streaming {
            return Err(CaptureError::Stream("stream already released".to_string()));
        }

        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Stream(e.to_string()))
    }

    fn release(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream cleanly: {}", e);
        }
        tracing::info!("Camera {} released", self.device.id);
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl Drop for NokhwaCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_messages_map_to_permission_denied() {
        assert!(matches!(
            open_error("Permission denied (os error 13)", FacingMode::Front),
            CaptureError::PermissionDenied(_)
        ));
        assert!(matches!(
            open_error("No such device", FacingMode::Environment),
            CaptureError::DeviceUnavailable(FacingMode::Environment)
        ));
    }
}
