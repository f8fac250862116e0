use super::SurfaceKind;
use image::RgbImage;

/// Sizing contract shared by both surface kinds: fill the container while
/// keeping the frame's aspect ratio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceStyle {
    pub width: &'static str,
    pub height: &'static str,
    pub object_fit: &'static str,
    pub border_radius_px: u32,
}

impl Default for SurfaceStyle {
    fn default() -> Self {
        Self {
            width: "calc(100% - 48px)",
            height: "100%",
            object_fit: "contain",
            border_radius_px: 10,
        }
    }
}

/// Native video element fed directly from the stream
#[derive(Debug, Clone)]
pub struct VideoSurface {
    plays_inline: bool,
    muted: bool,
    style: SurfaceStyle,
    current: Option<RgbImage>,
}

impl VideoSurface {
    /// Video element configured for autoplay on mobile browsers
    pub fn inline_muted() -> Self {
        Self {
            plays_inline: true,
            muted: true,
            style: SurfaceStyle::default(),
            current: None,
        }
    }

    pub fn plays_inline(&self) -> bool {
        self.plays_inline
    }

    pub fn muted(&self) -> bool {
        self.muted
    }
}

/// Off-screen drawing surface the stream is painted onto each cycle
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    style: SurfaceStyle,
    canvas: Option<RgbImage>,
}

impl CanvasSurface {
    pub fn new() -> Self {
        Self {
            style: SurfaceStyle::default(),
            canvas: None,
        }
    }

    /// Canvas size is fixed by the first frame drawn onto it
    fn draw(&mut self, frame: RgbImage) {
        let _span = tracing::debug_span!("canvas_draw").entered();

        let size = self.canvas.as_ref().map(|canvas| canvas.dimensions());
        self.canvas = Some(match size {
            Some((width, height)) if (width, height) != frame.dimensions() => {
                image::imageops::resize(&frame, width, height, image::imageops::FilterType::Triangle)
            }
            _ => frame,
        });
    }
}

impl Default for CanvasSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Tagged presentation strategy, chosen once per session
#[derive(Debug, Clone)]
pub enum RenderSurface {
    Video(VideoSurface),
    Canvas(CanvasSurface),
}

impl RenderSurface {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            RenderSurface::Video(_) => SurfaceKind::Video,
            RenderSurface::Canvas(_) => SurfaceKind::Canvas,
        }
    }

    pub fn style(&self) -> &SurfaceStyle {
        match self {
            RenderSurface::Video(video) => &video.style,
            RenderSurface::Canvas(canvas) => &canvas.style,
        }
    }

    /// Refresh the surface with the latest frame from the stream
    pub fn present(&mut self, frame: RgbImage) {
        match self {
            RenderSurface::Video(video) => video.current = Some(frame),
            RenderSurface::Canvas(canvas) => canvas.draw(frame),
        }
    }

    /// Image to classify: the video's current frame or the canvas pixels
    pub fn frame(&self) -> Option<&RgbImage> {
        match self {
            RenderSurface::Video(video) => video.current.as_ref(),
            RenderSurface::Canvas(canvas) => canvas.canvas.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// The single slot render surfaces are mounted into
#[derive(Debug, Default)]
pub struct SurfaceContainer {
    mounted: Option<(NodeId, RenderSurface)>,
    next_id: u64,
}

impl SurfaceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a surface, removing any node of either kind first
    pub fn mount(&mut self, surface: RenderSurface) -> NodeId {
        if let Some((old_id, old)) = self.mounted.take() {
            tracing::debug!("Removing {:?} surface {:?}", old.kind(), old_id);
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        let style = surface.style();
        tracing::debug!(
            "Mounting {:?} surface {:?} ({} x {}, fit {}, radius {}px)",
            surface.kind(),
            id,
            style.width,
            style.height,
            style.object_fit,
            style.border_radius_px
        );
        self.mounted = Some((id, surface));
        id
    }

    /// Remove the given node if it is still the mounted one
    pub fn unmount(&mut self, id: NodeId) -> Option<RenderSurface> {
        if self.mounted_id() != Some(id) {
            return None;
        }
        self.mounted.take().map(|(_, surface)| surface)
    }

    pub fn mounted_id(&self) -> Option<NodeId> {
        self.mounted.as_ref().map(|(id, _)| *id)
    }

    #[cfg(test)]
    pub fn mounted_count(&self) -> usize {
        usize::from(self.mounted.is_some())
    }

    pub fn surface(&self) -> Option<&RenderSurface> {
        self.mounted.as_ref().map(|(_, surface)| surface)
    }

    /// Mutable access to the surface, only if `id` is still mounted
    pub fn surface_mut(&mut self, id: NodeId) -> Option<&mut RenderSurface> {
        match &mut self.mounted {
            Some((mounted_id, surface)) if *mounted_id == id => Some(surface),
            _ => None,
        }
    }
}
