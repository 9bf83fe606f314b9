use crate::commands::EditorCommand;
use crate::element::{
    ElementId, ImageElement, Selection, TextElement, DEFAULT_ELEMENT_OFFSET,
};
use crate::error::{EditorError, EditorResult};
use crate::zoom::Zoom;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_MARGIN_PX: f32 = 200.0;
const DEFAULT_MARGIN_PX: f32 = 40.0;

/// Page padding in document pixels. Consumed for layout only; none of the
/// core algorithms read it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: DEFAULT_MARGIN_PX,
            right: DEFAULT_MARGIN_PX,
            bottom: DEFAULT_MARGIN_PX,
            left: DEFAULT_MARGIN_PX,
        }
    }
}

impl Margins {
    /// Like crop sides: out-of-range input is rejected, prior values kept.
    pub fn set(&mut self, top: f32, right: f32, bottom: f32, left: f32) -> EditorResult<()> {
        for value in [top, right, bottom, left] {
            if !(0.0..=MAX_MARGIN_PX).contains(&value) {
                return Err(EditorError::InputValidation(format!(
                    "margin {value} outside 0..={MAX_MARGIN_PX}"
                )));
            }
        }
        *self = Self {
            top,
            right,
            bottom,
            left,
        };
        Ok(())
    }
}

/// A rendered element reference in stable stacking order.
#[derive(Debug)]
pub enum ElementRef<'a> {
    Text(&'a TextElement),
    Image(&'a ImageElement),
}

impl ElementRef<'_> {
    pub fn id(&self) -> ElementId {
        match self {
            ElementRef::Text(t) => t.id,
            ElementRef::Image(i) => i.id,
        }
    }
}

/// The one element collection of the document, plus the shared zoom value
/// and the page margins. All mutation funnels through here so every change
/// marks the document dirty for the persistence trigger.
#[derive(Debug, Default)]
pub struct Document {
    text_elements: Vec<TextElement>,
    image_elements: Vec<ImageElement>,
    next_id: u64,
    pub margins: Margins,
    pub zoom: Zoom,
    dirty: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. The id counter resumes past the highest
    /// persisted id so creation order stays a total order across reloads.
    pub fn from_parts(
        text_elements: Vec<TextElement>,
        image_elements: Vec<ImageElement>,
    ) -> Self {
        let highest = text_elements
            .iter()
            .map(|t| t.id.0)
            .chain(image_elements.iter().map(|i| i.id.0))
            .max()
            .unwrap_or(0);
        Self {
            text_elements,
            image_elements,
            next_id: highest,
            margins: Margins::default(),
            zoom: Zoom::default(),
            dirty: false,
        }
    }

    fn allocate_id(&mut self) -> ElementId {
        self.next_id += 1;
        ElementId(self.next_id)
    }

    pub fn add_text(&mut self) -> ElementId {
        let id = self.allocate_id();
        self.text_elements
            .push(TextElement::new(id, DEFAULT_ELEMENT_OFFSET, String::new()));
        self.dirty = true;
        id
    }

    pub fn add_image(&mut self, source: Arc<RgbaImage>) -> ElementId {
        let id = self.allocate_id();
        self.image_elements
            .push(ImageElement::new(id, DEFAULT_ELEMENT_OFFSET, source));
        self.dirty = true;
        id
    }

    pub fn remove(&mut self, id: ElementId) -> bool {
        let before = self.text_elements.len() + self.image_elements.len();
        self.text_elements.retain(|t| t.id != id);
        self.image_elements.retain(|i| i.id != id);
        let removed = self.text_elements.len() + self.image_elements.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.text_elements.is_empty() && self.image_elements.is_empty()
    }

    pub fn text_elements(&self) -> &[TextElement] {
        &self.text_elements
    }

    pub fn image_elements(&self) -> &[ImageElement] {
        &self.image_elements
    }

    pub fn text_mut(&mut self, id: ElementId) -> Option<&mut TextElement> {
        self.text_elements.iter_mut().find(|t| t.id == id)
    }

    pub fn image_mut(&mut self, id: ElementId) -> Option<&mut ImageElement> {
        self.image_elements.iter_mut().find(|i| i.id == id)
    }

    pub fn texts_mut(&mut self) -> impl Iterator<Item = &mut TextElement> {
        self.text_elements.iter_mut()
    }

    pub fn images_mut(&mut self) -> impl Iterator<Item = &mut ImageElement> {
        self.image_elements.iter_mut()
    }

    /// All elements in creation order; ids are monotonic so this is the
    /// stable stacking order for rendering and export.
    pub fn render_order(&self) -> Vec<ElementRef<'_>> {
        let mut refs: Vec<ElementRef<'_>> = self
            .text_elements
            .iter()
            .map(ElementRef::Text)
            .chain(self.image_elements.iter().map(ElementRef::Image))
            .collect();
        refs.sort_by_key(ElementRef::id);
        refs
    }

    pub fn selected_id(&self) -> Option<ElementId> {
        self.text_elements
            .iter()
            .filter(|t| t.selection().shows_controls() && t.selection() != Selection::Hovered)
            .map(|t| t.id)
            .chain(
                self.image_elements
                    .iter()
                    .filter(|i| i.selection().shows_controls())
                    .map(|i| i.id),
            )
            .next()
    }

    /// Click-outside landed: drop every selection and close open panels.
    pub fn deselect_all(&mut self) {
        for text in &mut self.text_elements {
            text.deselect();
        }
        for image in &mut self.image_elements {
            image.deselect();
        }
    }

    /// Select one element, deselecting the rest; stops the press from
    /// reaching the click-outside path.
    pub fn select_only(&mut self, id: ElementId) {
        for text in &mut self.text_elements {
            if text.id == id {
                text.select();
            } else {
                text.deselect();
            }
        }
        for image in &mut self.image_elements {
            if image.id == id {
                image.select();
            } else {
                image.deselect();
            }
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True once per change set; the caller persists when it reads true.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Document-side command intake. Export commands are routed to the
    /// capture pipeline by the caller, not here.
    pub fn apply(&mut self, command: EditorCommand) -> EditorResult<()> {
        match command {
            EditorCommand::AddText => {
                self.add_text();
                Ok(())
            }
            EditorCommand::AddImage { image } => {
                self.add_image(image);
                Ok(())
            }
            EditorCommand::RemoveElement(id) => {
                self.remove(id);
                Ok(())
            }
            EditorCommand::SetMargins {
                top,
                right,
                bottom,
                left,
            } => {
                self.margins.set(top, right, bottom, left)?;
                self.dirty = true;
                Ok(())
            }
            EditorCommand::SetZoom(value) => {
                self.zoom.set(value);
                Ok(())
            }
            EditorCommand::ExportPdf | EditorCommand::CopyImage => Ok(()),
        }
    }
}
