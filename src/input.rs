use crate::element::{ElementId, Point};

/// Axis-aligned screen-space rectangle used for hit tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// One element's clickable surfaces for a frame: its bounding box plus any
/// open control surface (tool panel). A press inside either belongs to the
/// element and must not deselect it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitSurface {
    pub id: ElementId,
    pub bounds: ScreenRect,
    pub panel: Option<ScreenRect>,
}

impl HitSurface {
    fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point) || self.panel.is_some_and(|p| p.contains(point))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressRouting {
    /// The press landed on this element (topmost wins on overlap).
    Element(ElementId),
    /// The press landed on empty canvas: deselect everything, close panels.
    Outside,
}

/// Route a pointer press against the active element set.
///
/// Surfaces are given in paint order; the last hit wins, matching what is
/// visually on top. One router-level test replaces per-element global
/// listeners, so there is nothing to attach or detach per element.
pub fn route_press(point: Point, surfaces: &[HitSurface]) -> PressRouting {
    surfaces
        .iter()
        .rev()
        .find(|surface| surface.contains(point))
        .map_or(PressRouting::Outside, |surface| {
            PressRouting::Element(surface.id)
        })
}

/// Arbitration token between element drags and document-level gestures.
///
/// Pinch targets the document container and drag/resize target an element;
/// the token makes the exclusion explicit so ambiguous dual-pointer input
/// over an element never feeds both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureOwner {
    #[default]
    Free,
    Element(ElementId),
    Document,
}

#[derive(Debug, Default)]
pub struct InputRouter {
    owner: GestureOwner,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> GestureOwner {
        self.owner
    }

    /// Claim the gesture for an element. Succeeds when free or when the same
    /// element already owns it (drag continuing across frames).
    pub fn try_claim_element(&mut self, id: ElementId) -> bool {
        match self.owner {
            GestureOwner::Free => {
                self.owner = GestureOwner::Element(id);
                true
            }
            GestureOwner::Element(current) => current == id,
            GestureOwner::Document => false,
        }
    }

    /// Claim the gesture for a document-level zoom.
    pub fn try_claim_document(&mut self) -> bool {
        match self.owner {
            GestureOwner::Free | GestureOwner::Document => {
                self.owner = GestureOwner::Document;
                true
            }
            GestureOwner::Element(_) => false,
        }
    }

    pub fn release(&mut self) {
        self.owner = GestureOwner::Free;
    }
}
