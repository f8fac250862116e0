mod surface;

pub use surface::{CanvasSurface, NodeId, RenderSurface, SurfaceContainer, VideoSurface};

/// Coarse classification of the host platform, fixed for the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformProfile {
    /// Mobile browsers that mishandle canvas-backed streams
    ConstrainedMobile,
    General,
}

/// Command-line override for platform detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PlatformChoice {
    #[default]
    Auto,
    Mobile,
    General,
}

impl PlatformProfile {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("iPhone") || user_agent.contains("iPad") {
            PlatformProfile::ConstrainedMobile
        } else {
            PlatformProfile::General
        }
    }

    /// Work out the profile once at startup
    pub fn detect(choice: PlatformChoice, user_agent: Option<&str>) -> Self {
        let profile = match (choice, user_agent) {
            (PlatformChoice::Mobile, _) => PlatformProfile::ConstrainedMobile,
            (PlatformChoice::General, _) => PlatformProfile::General,
            (PlatformChoice::Auto, Some(ua)) => Self::from_user_agent(ua),
            (PlatformChoice::Auto, None) if cfg!(target_os = "ios") => {
                PlatformProfile::ConstrainedMobile
            }
            (PlatformChoice::Auto, None) => PlatformProfile::General,
        };
        tracing::info!("Platform profile: {:?}", profile);
        profile
    }
}

/// The two mutually exclusive ways a capture stream is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Video,
    Canvas,
}

/// Chooses the presentation strategy for a platform and mounts it
#[derive(Debug, Clone, Copy)]
pub struct RenderTargetSelector {
    profile: PlatformProfile,
}

impl RenderTargetSelector {
    pub fn new(profile: PlatformProfile) -> Self {
        Self { profile }
    }

    pub fn surface_kind(&self) -> SurfaceKind {
        match self.profile {
            PlatformProfile::ConstrainedMobile => SurfaceKind::Video,
            PlatformProfile::General => SurfaceKind::Canvas,
        }
    }

    /// Mount a fresh surface of the selected kind, replacing whatever the
    /// container held before
    pub fn mount(&self, container: &mut SurfaceContainer) -> NodeId {
        let surface = match self.surface_kind() {
            SurfaceKind::Video => {
                let video = VideoSurface::inline_muted();
                tracing::debug!(
                    "Video surface: plays_inline={}, muted={}",
                    video.plays_inline(),
                    video.muted()
                );
                RenderSurface::Video(video)
            }
            SurfaceKind::Canvas => RenderSurface::Canvas(CanvasSurface::new()),
        };
        container.mount(surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_UA: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0";

    #[test]
    fn iphone_and_ipad_are_constrained() {
        assert_eq!(
            PlatformProfile::from_user_agent(IPHONE_UA),
            PlatformProfile::ConstrainedMobile
        );
        assert_eq!(
            PlatformProfile::from_user_agent("Mozilla/5.0 (iPad; CPU OS 16_0)"),
            PlatformProfile::ConstrainedMobile
        );
        assert_eq!(PlatformProfile::from_user_agent(DESKTOP_UA), PlatformProfile::General);
    }

    #[test]
    fn explicit_choice_overrides_user_agent() {
        assert_eq!(
            PlatformProfile::detect(PlatformChoice::General, Some(IPHONE_UA)),
            PlatformProfile::General
        );
        assert_eq!(
            PlatformProfile::detect(PlatformChoice::Mobile, Some(DESKTOP_UA)),
            PlatformProfile::ConstrainedMobile
        );
        assert_eq!(
            PlatformProfile::detect(PlatformChoice::Auto, Some(IPHONE_UA)),
            PlatformProfile::ConstrainedMobile
        );
    }

    #[test]
    fn mobile_mounts_inline_muted_video() {
        let selector = RenderTargetSelector::new(PlatformProfile::ConstrainedMobile);
        let mut container = SurfaceContainer::new();
        selector.mount(&mut container);

        assert_eq!(container.mounted_count(), 1);
        match container.surface() {
            Some(RenderSurface::Video(video)) => {
                assert!(video.plays_inline());
                assert!(video.muted());
            }
            other => panic!("expected video surface, got {:?}", other.map(|s| s.kind())),
        }
    }

    #[test]
    fn general_mounts_canvas_only() {
        let selector = RenderTargetSelector::new(PlatformProfile::General);
        let mut container = SurfaceContainer::new();
        selector.mount(&mut container);

        assert_eq!(container.mounted_count(), 1);
        assert_eq!(container.surface().map(|s| s.kind()), Some(SurfaceKind::Canvas));
    }
}
