use crate::crop::CropInsets;
use crate::error::{EditorError, EditorResult};
use crate::pixels::{self, MAX_THRESHOLD};
use crate::zoom::to_document_delta;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Images never shrink below this many document pixels per side.
pub const MIN_IMAGE_DIMENSION: f32 = 50.0;
/// Where newly added elements land on the page.
pub const DEFAULT_ELEMENT_OFFSET: Point = Point { x: 50.0, y: 200.0 };
/// Largest edge a freshly added image is scaled down to.
pub const DEFAULT_IMAGE_MAX_EDGE: f32 = 300.0;

/// Monotonically increasing per-document identifier. Creation order doubles
/// as the stable stacking order for rendering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    /// Pointer over a text element; its move affordance becomes visible.
    Hovered,
    Selected,
    Dragging,
    Resizing,
}

impl Selection {
    pub fn is_interacting(self) -> bool {
        matches!(self, Selection::Dragging | Selection::Resizing)
    }

    pub fn shows_controls(self) -> bool {
        !matches!(self, Selection::Idle)
    }
}

/// Tool panels are mutually exclusive: opening one closes the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolPanel {
    #[default]
    None,
    BackgroundRemoval,
    Crop,
}

/// Stacking tier. Elements being manipulated or showing controls render
/// above idle ones so they never disappear behind them mid-drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTier {
    Background,
    Foreground,
}

/// Pointer bookkeeping for an in-progress drag or resize.
///
/// Drag re-baselines against the last recorded pointer position every move;
/// resize keeps the original down-point and a size snapshot and recomputes
/// from those, so rounding never accumulates into the size.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ActiveGesture {
    Drag { last_screen: Point },
    Resize { down_screen: Point, start_size: Size },
}

#[derive(Debug, Clone)]
pub struct TextElement {
    pub id: ElementId,
    pub position: Point,
    /// Opaque rich content. This core tracks identity and position only;
    /// editing and layout belong to the surrounding text collaborator.
    pub body: String,
    selection: Selection,
    gesture: Option<ActiveGesture>,
}

impl TextElement {
    pub fn new(id: ElementId, position: Point, body: String) -> Self {
        Self {
            id,
            position,
            body,
            selection: Selection::Idle,
            gesture: None,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn render_tier(&self) -> RenderTier {
        if self.selection.shows_controls() {
            RenderTier::Foreground
        } else {
            RenderTier::Background
        }
    }

    pub fn hover(&mut self) {
        if self.selection == Selection::Idle {
            self.selection = Selection::Hovered;
        }
    }

    pub fn unhover(&mut self) {
        if self.selection == Selection::Hovered {
            self.selection = Selection::Idle;
        }
    }

    pub fn select(&mut self) {
        if !self.selection.is_interacting() {
            self.selection = Selection::Selected;
        }
    }

    pub fn deselect(&mut self) {
        self.selection = Selection::Idle;
        self.gesture = None;
    }

    pub fn begin_drag(&mut self, pointer_screen: Point) {
        self.selection = Selection::Dragging;
        self.gesture = Some(ActiveGesture::Drag {
            last_screen: pointer_screen,
        });
    }

    pub fn drag_to(&mut self, pointer_screen: Point, zoom: f32) {
        drag_step(
            &mut self.gesture,
            &mut self.position,
            pointer_screen,
            zoom,
        );
    }

    pub fn end_interaction(&mut self) {
        if self.selection.is_interacting() {
            self.selection = Selection::Selected;
        }
        self.gesture = None;
    }
}

#[derive(Debug, Clone)]
pub struct ImageElement {
    pub id: ElementId,
    pub position: Point,
    size: Size,
    /// Immutable once loaded; `None` while decoding or after a failed load.
    source: Option<Arc<RgbaImage>>,
    /// Always consistent with `(source, threshold)`; recomputed synchronously
    /// on every change to either, retained when the source is unavailable.
    processed: Option<Arc<RgbaImage>>,
    threshold: u8,
    pub crop: CropInsets,
    panel: ToolPanel,
    selection: Selection,
    gesture: Option<ActiveGesture>,
}

impl ImageElement {
    pub fn new(id: ElementId, position: Point, source: Arc<RgbaImage>) -> Self {
        let size = initial_size(&source);
        let processed = pixels::remove_background(&source, 0);
        Self {
            id,
            position,
            size,
            source: Some(source),
            processed: Some(processed),
            threshold: 0,
            crop: CropInsets::default(),
            panel: ToolPanel::None,
            selection: Selection::Idle,
            gesture: None,
        }
    }

    /// Restore from a persisted record whose source may still be absent.
    pub fn from_parts(
        id: ElementId,
        position: Point,
        size: Size,
        crop: CropInsets,
        threshold: u8,
        source: Option<Arc<RgbaImage>>,
    ) -> Self {
        let mut element = Self {
            id,
            position,
            size: Size {
                width: size.width.max(MIN_IMAGE_DIMENSION),
                height: size.height.max(MIN_IMAGE_DIMENSION),
            },
            source: None,
            processed: None,
            threshold: threshold.min(MAX_THRESHOLD),
            crop,
            panel: ToolPanel::None,
            selection: Selection::Idle,
            gesture: None,
        };
        element.crop.sanitize();
        if let Some(source) = source {
            element.attach_source(source);
        }
        element
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn source(&self) -> Option<&Arc<RgbaImage>> {
        self.source.as_ref()
    }

    /// The raster to display and export: background-stripped when a
    /// threshold is set, otherwise the source itself.
    pub fn processed(&self) -> Option<&Arc<RgbaImage>> {
        self.processed.as_ref()
    }

    pub fn panel(&self) -> ToolPanel {
        self.panel
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Attach the decoded source raster. Loaded once; processing runs
    /// immediately so `processed` is never stale.
    pub fn attach_source(&mut self, source: Arc<RgbaImage>) {
        self.processed = Some(pixels::remove_background(&source, self.threshold));
        self.source = Some(source);
    }

    /// Change the background-removal threshold and reprocess synchronously.
    ///
    /// With no decoded source the previous processed output is retained and
    /// the new threshold still sticks, so the reprocess happens as soon as a
    /// source arrives.
    pub fn set_threshold(&mut self, threshold: u8) -> EditorResult<()> {
        if threshold > MAX_THRESHOLD {
            return Err(EditorError::InputValidation(format!(
                "threshold {threshold} outside 0..={MAX_THRESHOLD}"
            )));
        }
        self.threshold = threshold;
        match &self.source {
            Some(source) => {
                self.processed = Some(pixels::remove_background(source, threshold));
                Ok(())
            }
            None => Err(EditorError::Decode(
                "source image not decoded; keeping previous output".into(),
            )),
        }
    }

    pub fn toggle_panel(&mut self, panel: ToolPanel) {
        self.panel = if self.panel == panel {
            ToolPanel::None
        } else {
            panel
        };
    }

    pub fn close_panel(&mut self) {
        self.panel = ToolPanel::None;
    }

    pub fn render_tier(&self) -> RenderTier {
        if self.selection.shows_controls() || self.panel != ToolPanel::None {
            RenderTier::Foreground
        } else {
            RenderTier::Background
        }
    }

    pub fn select(&mut self) {
        if !self.selection.is_interacting() {
            self.selection = Selection::Selected;
        }
    }

    pub fn deselect(&mut self) {
        self.selection = Selection::Idle;
        self.panel = ToolPanel::None;
        self.gesture = None;
    }

    pub fn begin_drag(&mut self, pointer_screen: Point) {
        self.selection = Selection::Dragging;
        self.gesture = Some(ActiveGesture::Drag {
            last_screen: pointer_screen,
        });
    }

    pub fn drag_to(&mut self, pointer_screen: Point, zoom: f32) {
        drag_step(
            &mut self.gesture,
            &mut self.position,
            pointer_screen,
            zoom,
        );
    }

    pub fn begin_resize(&mut self, pointer_screen: Point) {
        self.selection = Selection::Resizing;
        self.gesture = Some(ActiveGesture::Resize {
            down_screen: pointer_screen,
            start_size: self.size,
        });
    }

    /// Resize against the original down-point. The element grows from its
    /// fixed top-left corner; position never changes here.
    pub fn resize_to(&mut self, pointer_screen: Point, zoom: f32) {
        let Some(ActiveGesture::Resize {
            down_screen,
            start_size,
        }) = self.gesture
        else {
            return;
        };
        let (dx, dy) = to_document_delta(
            pointer_screen.x - down_screen.x,
            pointer_screen.y - down_screen.y,
            zoom,
        );
        self.size = Size {
            width: (start_size.width + dx).max(MIN_IMAGE_DIMENSION),
            height: (start_size.height + dy).max(MIN_IMAGE_DIMENSION),
        };
    }

    pub fn end_interaction(&mut self) {
        if self.selection.is_interacting() {
            self.selection = Selection::Selected;
        }
        self.gesture = None;
    }
}

fn drag_step(
    gesture: &mut Option<ActiveGesture>,
    position: &mut Point,
    pointer_screen: Point,
    zoom: f32,
) {
    let Some(ActiveGesture::Drag { last_screen }) = gesture else {
        return;
    };
    let (dx, dy) = to_document_delta(
        pointer_screen.x - last_screen.x,
        pointer_screen.y - last_screen.y,
        zoom,
    );
    position.x += dx;
    position.y += dy;
    *last_screen = pointer_screen;
}

/// Scale a freshly dropped raster down to a sensible on-page size, keeping
/// the aspect ratio and the 50px floor.
fn initial_size(source: &RgbaImage) -> Size {
    let (w, h) = (source.width() as f32, source.height() as f32);
    let longest = w.max(h).max(1.0);
    let scale = (DEFAULT_IMAGE_MAX_EDGE / longest).min(1.0);
    Size {
        width: (w * scale).max(MIN_IMAGE_DIMENSION),
        height: (h * scale).max(MIN_IMAGE_DIMENSION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn raster(width: u32, height: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        ))
    }

    fn text(id: u64) -> TextElement {
        TextElement::new(
            ElementId(id),
            DEFAULT_ELEMENT_OFFSET,
            String::from("hello"),
        )
    }

    #[test]
    fn drag_rebaselines_against_the_last_pointer_position() {
        let mut element = text(1);
        element.begin_drag(Point::new(10.0, 10.0));
        element.drag_to(Point::new(20.0, 10.0), 1.0);
        element.drag_to(Point::new(30.0, 30.0), 1.0);
        assert_eq!(element.position.x, 50.0 + 20.0);
        assert_eq!(element.position.y, 200.0 + 20.0);
    }

    #[test]
    fn drag_at_half_zoom_doubles_the_document_delta() {
        let mut element = text(1);
        element.begin_drag(Point::new(0.0, 0.0));
        element.drag_to(Point::new(100.0, 50.0), 0.5);
        assert_eq!(element.position.x, 250.0);
        assert_eq!(element.position.y, 300.0);
    }

    #[test]
    fn resize_measures_from_the_original_down_point() {
        let mut element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(200, 100));
        let start = element.size();
        element.begin_resize(Point::new(0.0, 0.0));
        element.resize_to(Point::new(10.0, 10.0), 1.0);
        element.resize_to(Point::new(30.0, 20.0), 1.0);
        // Not 10+30: the second move replaces the first, both measured from
        // the down-point.
        assert_eq!(element.size().width, start.width + 30.0);
        assert_eq!(element.size().height, start.height + 20.0);
    }

    #[test]
    fn resize_never_drops_below_the_floor() {
        let mut element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(200, 100));
        element.begin_resize(Point::new(0.0, 0.0));
        element.resize_to(Point::new(-10_000.0, -10_000.0), 1.0);
        assert_eq!(element.size().width, MIN_IMAGE_DIMENSION);
        assert_eq!(element.size().height, MIN_IMAGE_DIMENSION);
    }

    #[test]
    fn resize_keeps_position_fixed() {
        let mut element = ImageElement::new(ElementId(1), Point::new(30.0, 40.0), raster(100, 100));
        element.begin_resize(Point::new(0.0, 0.0));
        element.resize_to(Point::new(55.0, 65.0), 1.0);
        assert_eq!(element.position.x, 30.0);
        assert_eq!(element.position.y, 40.0);
    }

    #[test]
    fn interaction_settles_back_to_selected() {
        let mut element = text(1);
        element.begin_drag(Point::new(0.0, 0.0));
        assert_eq!(element.selection(), Selection::Dragging);
        element.end_interaction();
        assert_eq!(element.selection(), Selection::Selected);
        element.deselect();
        assert_eq!(element.selection(), Selection::Idle);
    }

    #[test]
    fn tool_panels_are_mutually_exclusive() {
        let mut element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(80, 80));
        element.toggle_panel(ToolPanel::BackgroundRemoval);
        assert_eq!(element.panel(), ToolPanel::BackgroundRemoval);
        element.toggle_panel(ToolPanel::Crop);
        assert_eq!(element.panel(), ToolPanel::Crop);
        element.toggle_panel(ToolPanel::Crop);
        assert_eq!(element.panel(), ToolPanel::None);
    }

    #[test]
    fn manipulated_elements_rise_to_the_foreground_tier() {
        let mut element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(80, 80));
        assert_eq!(element.render_tier(), RenderTier::Background);
        element.begin_drag(Point::new(0.0, 0.0));
        assert_eq!(element.render_tier(), RenderTier::Foreground);
        element.end_interaction();
        // Still selected, controls visible.
        assert_eq!(element.render_tier(), RenderTier::Foreground);
        element.deselect();
        assert_eq!(element.render_tier(), RenderTier::Background);
    }

    #[test]
    fn threshold_change_reprocesses_synchronously() {
        let mut element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(2, 2));
        element.set_threshold(100).expect("in range");
        let processed = element.processed().expect("processed");
        assert!(processed.pixels().all(|p| p.0[3] == 0));

        element.set_threshold(0).expect("in range");
        let restored = element.processed().expect("processed");
        assert!(restored.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let mut element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(2, 2));
        assert!(element.set_threshold(101).is_err());
        assert_eq!(element.threshold(), 0);
    }

    #[test]
    fn missing_source_retains_previous_processed_output() {
        let mut element = ImageElement::from_parts(
            ElementId(1),
            Point::new(0.0, 0.0),
            Size::new(100.0, 100.0),
            CropInsets::default(),
            0,
            None,
        );
        assert!(element.processed().is_none());
        let err = element.set_threshold(40).unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
        // Threshold sticks so a late-arriving source is processed with it.
        assert_eq!(element.threshold(), 40);

        element.attach_source(raster(2, 2));
        assert!(element
            .processed()
            .expect("processed after attach")
            .pixels()
            .all(|p| p.0[3] == 0));
    }

    #[test]
    fn new_images_are_scaled_down_preserving_aspect() {
        let element = ImageElement::new(ElementId(1), Point::new(0.0, 0.0), raster(600, 300));
        assert_eq!(element.size().width, 300.0);
        assert_eq!(element.size().height, 150.0);

        let small = ImageElement::new(ElementId(2), Point::new(0.0, 0.0), raster(120, 90));
        assert_eq!(small.size().width, 120.0);
        assert_eq!(small.size().height, 90.0);
    }

    #[test]
    fn hover_applies_only_from_idle() {
        let mut element = text(1);
        element.hover();
        assert_eq!(element.selection(), Selection::Hovered);
        element.select();
        element.hover();
        assert_eq!(element.selection(), Selection::Selected);
        element.unhover();
        assert_eq!(element.selection(), Selection::Selected);
    }
}
