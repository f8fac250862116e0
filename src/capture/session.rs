use super::{CameraBackend, CameraDevice, CaptureError, CaptureSource, FacingMode};
use crate::render::{NodeId, RenderTargetSelector, SurfaceContainer};

/// One live camera stream and the render surface it feeds
///
/// The stream is released on `stop`, on `restart` before the next stream
/// is requested, and on drop.
pub struct CaptureSession {
    stream: Option<Box<dyn CaptureSource>>,
    node: Option<NodeId>,
    preference: FacingMode,
}

impl CaptureSession {
    /// Request a camera stream matching `preference`
    pub fn start(backend: &dyn CameraBackend, preference: FacingMode) -> Result<Self, CaptureError> {
        tracing::info!("Starting capture session ({:?})", preference);
        let stream = backend.open(preference)?;

        Ok(Self {
            stream: Some(stream),
            node: None,
            preference,
        })
    }

    /// A session holding no stream yet; `restart` acquires one
    pub fn stopped(preference: FacingMode) -> Self {
        Self {
            stream: None,
            node: None,
            preference,
        }
    }

    /// Mount this session's render surface, replacing any existing one
    pub fn mount(&mut self, selector: &RenderTargetSelector, container: &mut SurfaceContainer) {
        if let Some(old) = self.node.take() {
            container.unmount(old);
        }
        self.node = Some(selector.mount(container));
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn preference(&self) -> FacingMode {
        self.preference
    }

    pub fn device(&self) -> Option<&CameraDevice> {
        self.stream.as_ref().map(|stream| stream.device())
    }

    /// Refresh the mounted surface from the live stream
    pub fn update(&mut self, container: &mut SurfaceContainer) -> Result<(), CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Stream("capture session is stopped".to_string()))?;
        let node = self
            .node
            .ok_or_else(|| CaptureError::Stream("no render surface mounted".to_string()))?;

        let frame = stream.capture_frame()?;
        let surface = container
            .surface_mut(node)
            .ok_or_else(|| CaptureError::Stream("render surface was detached".to_string()))?;
        surface.present(frame);
        Ok(())
    }

    /// Release the stream and detach the surface. Safe to call repeatedly.
    pub fn stop(&mut self, container: &mut SurfaceContainer) {
        if let Some(mut stream) = self.stream.take() {
            tracing::info!("Stopping capture on {}", stream.device().label);
            stream.release();
        }
        if let Some(node) = self.node.take() {
            container.unmount(node);
        }
    }

    /// Stop, then acquire a new stream for `preference` and remount.
    ///
    /// On failure the session stays stopped.
    pub fn restart(
        &mut self,
        backend: &dyn CameraBackend,
        preference: FacingMode,
        selector: &RenderTargetSelector,
        container: &mut SurfaceContainer,
    ) -> Result<(), CaptureError> {
        self.stop(container);

        let mut next = Self::start(backend, preference)?;
        next.mount(selector, container);
        *self = next;
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticBackend;
    use crate::render::{PlatformProfile, SurfaceKind};

    /// Refuses to open a stream while another one is still live
    struct ExclusiveBackend(SyntheticBackend);

    impl CameraBackend for ExclusiveBackend {
        fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
            self.0.list_devices()
        }

        fn open(&self, preference: FacingMode) -> Result<Box<dyn CaptureSource>, CaptureError> {
            assert_eq!(self.0.live_streams(), 0, "previous stream still held");
            self.0.open(preference)
        }
    }

    fn general() -> RenderTargetSelector {
        RenderTargetSelector::new(PlatformProfile::General)
    }

    #[test]
    fn update_feeds_the_mounted_surface() {
        let backend = SyntheticBackend::with_default_devices();
        let mut container = SurfaceContainer::new();
        let mut session = CaptureSession::start(&backend, FacingMode::Front).unwrap();
        session.mount(&general(), &mut container);

        assert!(container.surface().unwrap().frame().is_none());
        session.update(&mut container).unwrap();
        assert!(container.surface().unwrap().frame().is_some());
        assert_eq!(session.device().unwrap().label, "Front Camera");
    }

    #[test]
    fn stop_is_idempotent() {
        let backend = SyntheticBackend::with_default_devices();
        let mut container = SurfaceContainer::new();
        let mut session = CaptureSession::start(&backend, FacingMode::Front).unwrap();
        session.mount(&general(), &mut container);

        session.stop(&mut container);
        session.stop(&mut container);

        assert!(!session.is_active());
        assert_eq!(backend.live_streams(), 0);
        assert_eq!(container.mounted_count(), 0);
        assert!(matches!(
            session.update(&mut container),
            Err(CaptureError::Stream(_))
        ));
    }

    #[test]
    fn restart_releases_before_reacquiring() {
        let inner = SyntheticBackend::with_default_devices();
        let backend = ExclusiveBackend(inner.clone());
        let selector = RenderTargetSelector::new(PlatformProfile::ConstrainedMobile);
        let mut container = SurfaceContainer::new();

        let mut session = CaptureSession::start(&backend, FacingMode::Front).unwrap();
        session.mount(&selector, &mut container);
        session
            .restart(&backend, FacingMode::Environment, &selector, &mut container)
            .unwrap();

        assert_eq!(inner.live_streams(), 1);
        assert_eq!(inner.opened_streams(), 2);
        assert_eq!(session.preference(), FacingMode::Environment);
        assert_eq!(session.device().unwrap().label, "Back Camera");
        assert_eq!(container.mounted_count(), 1);
        assert_eq!(container.surface().map(|s| s.kind()), Some(SurfaceKind::Video));
    }

    #[test]
    fn failed_restart_leaves_session_stopped() {
        let backend = SyntheticBackend::with_default_devices();
        let mut container = SurfaceContainer::new();
        let mut session = CaptureSession::start(&backend, FacingMode::Front).unwrap();
        session.mount(&general(), &mut container);

        let empty = SyntheticBackend::new(Vec::new());
        let result = session.restart(&empty, FacingMode::Environment, &general(), &mut container);

        assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
        assert!(!session.is_active());
        assert_eq!(backend.live_streams(), 0);
        assert_eq!(container.mounted_count(), 0);
    }

    #[test]
    fn stopped_session_starts_through_restart() {
        let backend = SyntheticBackend::with_default_devices();
        let mut container = SurfaceContainer::new();
        let mut session = CaptureSession::stopped(FacingMode::Front);
        assert!(!session.is_active());
        assert!(session.device().is_none());

        session
            .restart(&backend, FacingMode::Environment, &general(), &mut container)
            .unwrap();
        assert!(session.is_active());
        assert_eq!(session.preference(), FacingMode::Environment);
        assert_eq!(backend.live_streams(), 1);
        assert_eq!(container.mounted_count(), 1);
    }

    #[test]
    fn dropping_a_session_releases_its_stream() {
        let backend = SyntheticBackend::with_default_devices();
        let session = CaptureSession::start(&backend, FacingMode::Front).unwrap();
        assert_eq!(backend.live_streams(), 1);
        drop(session);
        assert_eq!(backend.live_streams(), 0);
    }
}
