//! The boundary to the compositing/rasterizing engine.
//!
//! Strata decides *when* a view's backing surface is allocated, redrawn and
//! composited; a `RenderProvider` decides *how* pixels are produced. Drawing
//! callbacks record into a `DrawContext`; the resulting `DisplayList` is handed
//! to `RenderProvider::rasterize` for the dirty region only.

use crate::{Brush, Color, Rect, Size, Transform, Vec2};

/// Opaque handle minted by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub offset: Vec2,
    pub blur: f32,
    pub color: Color,
}

/// Style of a pre-shaped run; the provider resolves the font.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphStyle {
    pub family: String,
    pub size: f32,
    pub weight: u16,
    pub color: Color,
    pub kerning: f32,
    pub shadow: Option<Shadow>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo(Vec2, Vec2),
    CubicTo(Vec2, Vec2, Vec2),
    Close,
}

/// An outline in the view's bounds space, built with the `*_to` methods.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, p: Vec2) -> Self {
        self.segments.push(PathSegment::MoveTo(p));
        self
    }

    pub fn line_to(mut self, p: Vec2) -> Self {
        self.segments.push(PathSegment::LineTo(p));
        self
    }

    pub fn quad_to(mut self, ctrl: Vec2, p: Vec2) -> Self {
        self.segments.push(PathSegment::QuadTo(ctrl, p));
        self
    }

    pub fn cubic_to(mut self, c1: Vec2, c2: Vec2, p: Vec2) -> Self {
        self.segments.push(PathSegment::CubicTo(c1, c2, p));
        self
    }

    pub fn close(mut self) -> Self {
        self.segments.push(PathSegment::Close);
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Box around every point, control points included. Gradient brushes
    /// are normalized to it.
    pub fn bounds(&self) -> Rect {
        let mut points = self.segments.iter().flat_map(|s| {
            let pts: [Option<Vec2>; 3] = match *s {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => [Some(p), None, None],
                PathSegment::QuadTo(c, p) => [Some(c), Some(p), None],
                PathSegment::CubicTo(c1, c2, p) => [Some(c1), Some(c2), Some(p)],
                PathSegment::Close => [None, None, None],
            };
            pts.into_iter().flatten()
        });
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };
        let (min, max) = points.fold((first, first), |(lo, hi), p| {
            (Vec2::new(lo.x.min(p.x), lo.y.min(p.y)), Vec2::new(hi.x.max(p.x), hi.y.max(p.y)))
        });
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// An ellipse inscribed in `rect`, as four cubic arcs.
    pub fn ellipse(rect: Rect) -> Self {
        const K: f32 = 0.552_284_8;
        let (cx, cy) = (rect.x + rect.w / 2.0, rect.y + rect.h / 2.0);
        let (rx, ry) = (rect.w / 2.0, rect.h / 2.0);
        let (kx, ky) = (rx * K, ry * K);
        Path::new()
            .move_to(Vec2::new(cx + rx, cy))
            .cubic_to(Vec2::new(cx + rx, cy + ky), Vec2::new(cx + kx, cy + ry), Vec2::new(cx, cy + ry))
            .cubic_to(Vec2::new(cx - kx, cy + ry), Vec2::new(cx - rx, cy + ky), Vec2::new(cx - rx, cy))
            .cubic_to(Vec2::new(cx - rx, cy - ky), Vec2::new(cx - kx, cy - ry), Vec2::new(cx, cy - ry))
            .cubic_to(Vec2::new(cx + kx, cy - ry), Vec2::new(cx + rx, cy - ky), Vec2::new(cx + rx, cy))
            .close()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathStyle {
    /// Non-zero winding fill.
    Fill,
    Stroke { width: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        brush: Brush,
        radius: f32,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        width: f32,
        radius: f32,
    },
    /// `origin` is the baseline start of the run.
    GlyphRun {
        origin: Vec2,
        text: String,
        style: GlyphStyle,
    },
    Image {
        rect: Rect,
        image: ImageHandle,
    },
    /// A linear `brush` spans `path.bounds()`.
    Path {
        path: Path,
        brush: Brush,
        style: PathStyle,
    },
    PushClip {
        rect: Rect,
        radius: f32,
    },
    PopClip,
    PushTransform {
        transform: Transform,
    },
    PopTransform,
}

pub type DisplayList = Vec<DrawCommand>;

/// Recording target passed to draw callbacks. Coordinates are the view's bounds space.
#[derive(Clone, Debug)]
pub struct DrawContext {
    bounds: Rect,
    dirty: Rect,
    commands: DisplayList,
}

impl DrawContext {
    pub fn new(bounds: Rect, dirty: Rect) -> Self {
        Self {
            bounds,
            dirty,
            commands: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The region that actually needs pixels this pass.
    pub fn dirty_rect(&self) -> Rect {
        self.dirty
    }

    pub fn fill_rect(&mut self, rect: Rect, brush: impl Into<Brush>) {
        self.commands.push(DrawCommand::FillRect {
            rect,
            brush: brush.into(),
            radius: 0.0,
        });
    }

    pub fn fill_rounded_rect(&mut self, rect: Rect, brush: impl Into<Brush>, radius: f32) {
        self.commands.push(DrawCommand::FillRect {
            rect,
            brush: brush.into(),
            radius,
        });
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color,
            width,
            radius: 0.0,
        });
    }

    pub fn draw_glyph_run(&mut self, origin: Vec2, text: impl Into<String>, style: GlyphStyle) {
        self.commands.push(DrawCommand::GlyphRun {
            origin,
            text: text.into(),
            style,
        });
    }

    pub fn draw_image(&mut self, rect: Rect, image: ImageHandle) {
        self.commands.push(DrawCommand::Image { rect, image });
    }

    pub fn fill_path(&mut self, path: &Path, brush: impl Into<Brush>) {
        if path.is_empty() {
            return;
        }
        self.commands.push(DrawCommand::Path {
            path: path.clone(),
            brush: brush.into(),
            style: PathStyle::Fill,
        });
    }

    pub fn stroke_path(&mut self, path: &Path, brush: impl Into<Brush>, width: f32) {
        if path.is_empty() || width <= 0.0 {
            return;
        }
        self.commands.push(DrawCommand::Path {
            path: path.clone(),
            brush: brush.into(),
            style: PathStyle::Stroke { width },
        });
    }

    /// Runs `f` with a clip pushed; the clip is popped afterwards.
    pub fn with_clip(&mut self, rect: Rect, f: impl FnOnce(&mut DrawContext)) {
        self.commands.push(DrawCommand::PushClip { rect, radius: 0.0 });
        f(self);
        self.commands.push(DrawCommand::PopClip);
    }

    pub fn with_transform(&mut self, transform: Transform, f: impl FnOnce(&mut DrawContext)) {
        self.commands.push(DrawCommand::PushTransform { transform });
        f(self);
        self.commands.push(DrawCommand::PopTransform);
    }

    pub fn push(&mut self, cmd: DrawCommand) {
        self.commands.push(cmd);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn finish(self) -> DisplayList {
        self.commands
    }
}

/// Where and how a surface is composited into its parent surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerPlacement {
    /// Frame in the parent layer's coordinate space.
    pub frame: Rect,
    pub transform: Transform,
    pub opacity: f32,
    pub clips_to_bounds: bool,
    pub hidden: bool,
}

pub trait RenderProvider {
    fn allocate_surface(&mut self, size: Size, scale: f32, opaque: bool) -> SurfaceId;
    fn resize_surface(&mut self, surface: SurfaceId, size: Size, scale: f32);
    fn release_surface(&mut self, surface: SurfaceId);
    /// Replace the pixels of `dirty` (surface coordinates) with the rendering of `list`.
    fn rasterize(&mut self, surface: SurfaceId, dirty: Rect, list: &DisplayList);
    fn composite(&mut self, surface: SurfaceId, parent: Option<SurfaceId>, placement: &LayerPlacement);
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProviderCall {
    Allocate {
        surface: SurfaceId,
        size: Size,
        scale: f32,
    },
    Resize {
        surface: SurfaceId,
        size: Size,
    },
    Release(SurfaceId),
    Rasterize {
        surface: SurfaceId,
        dirty: Rect,
        commands: usize,
    },
    Composite {
        surface: SurfaceId,
        parent: Option<SurfaceId>,
        placement: LayerPlacement,
    },
}

/// Headless provider that records every call; useful for tests and offscreen hosts.
#[derive(Default, Debug)]
pub struct RecordingProvider {
    next: u64,
    pub calls: Vec<ProviderCall>,
    pub lists: Vec<(SurfaceId, DisplayList)>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rasterized(&self) -> impl Iterator<Item = (SurfaceId, Rect)> + '_ {
        self.calls.iter().filter_map(|c| match c {
            ProviderCall::Rasterize { surface, dirty, .. } => Some((*surface, *dirty)),
            _ => None,
        })
    }

    /// Every command rasterized so far, in submission order.
    pub fn commands(&self) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.lists.iter().flat_map(|(_, list)| list.iter())
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.lists.clear();
    }
}

impl RenderProvider for RecordingProvider {
    fn allocate_surface(&mut self, size: Size, scale: f32, _opaque: bool) -> SurfaceId {
        self.next += 1;
        let surface = SurfaceId(self.next);
        self.calls.push(ProviderCall::Allocate {
            surface,
            size,
            scale,
        });
        surface
    }

    fn resize_surface(&mut self, surface: SurfaceId, size: Size, _scale: f32) {
        self.calls.push(ProviderCall::Resize { surface, size });
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.calls.push(ProviderCall::Release(surface));
    }

    fn rasterize(&mut self, surface: SurfaceId, dirty: Rect, list: &DisplayList) {
        self.calls.push(ProviderCall::Rasterize {
            surface,
            dirty,
            commands: list.len(),
        });
        self.lists.push((surface, list.clone()));
    }

    fn composite(&mut self, surface: SurfaceId, parent: Option<SurfaceId>, placement: &LayerPlacement) {
        self.calls.push(ProviderCall::Composite {
            surface,
            parent,
            placement: *placement,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_bounds_include_control_points() {
        let p = Path::new()
            .move_to(Vec2::new(10.0, 10.0))
            .quad_to(Vec2::new(30.0, -10.0), Vec2::new(50.0, 10.0))
            .line_to(Vec2::new(50.0, 40.0))
            .close();
        assert_eq!(p.bounds(), Rect::new(10.0, -10.0, 40.0, 50.0));
        assert_eq!(p.segments().len(), 4);
        assert_eq!(Path::new().bounds(), Rect::ZERO);
        assert_eq!(Path::ellipse(Rect::new(0.0, 0.0, 20.0, 10.0)).bounds(), Rect::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn test_empty_paths_and_zero_strokes_record_nothing() {
        let mut cx = DrawContext::new(Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0));
        cx.fill_path(&Path::new(), Color::BLACK);
        let tri = Path::new()
            .move_to(Vec2::ZERO)
            .line_to(Vec2::new(10.0, 0.0))
            .line_to(Vec2::new(0.0, 10.0))
            .close();
        cx.stroke_path(&tri, Color::BLACK, 0.0);
        assert!(cx.commands().is_empty());
        cx.stroke_path(&tri, Color::BLACK, 2.0);
        assert!(matches!(
            cx.commands(),
            [DrawCommand::Path {
                style: PathStyle::Stroke { width },
                ..
            }] if *width == 2.0
        ));
    }
}
