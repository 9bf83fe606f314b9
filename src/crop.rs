use crate::error::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};

pub const MAX_CROP_PERCENT: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropSide {
    Top,
    Right,
    Bottom,
    Left,
}

/// Four independent inset percentages defining the visible rectangle inside
/// an element's bounding box. Applied as a clip; the underlying raster and
/// stored size are untouched, so resetting all sides to 0 undoes the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropInsets {
    pub top: u8,
    pub right: u8,
    pub bottom: u8,
    pub left: u8,
}

/// Visible region in the element's local space. May be empty when opposing
/// insets consume the whole box; that is a valid degenerate crop, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl VisibleRect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl CropInsets {
    /// Set one side. Values outside `0..=50` are rejected and the prior
    /// value kept; silently clamping would hide the user's input error.
    pub fn set(&mut self, side: CropSide, percent: i32) -> EditorResult<()> {
        if percent < 0 || percent > i32::from(MAX_CROP_PERCENT) {
            return Err(EditorError::InputValidation(format!(
                "crop percentage {percent} outside 0..={MAX_CROP_PERCENT}"
            )));
        }
        let value = percent as u8;
        match side {
            CropSide::Top => self.top = value,
            CropSide::Right => self.right = value,
            CropSide::Bottom => self.bottom = value,
            CropSide::Left => self.left = value,
        }
        Ok(())
    }

    pub fn get(&self, side: CropSide) -> u8 {
        match side {
            CropSide::Top => self.top,
            CropSide::Right => self.right,
            CropSide::Bottom => self.bottom,
            CropSide::Left => self.left,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Clamp persisted values back into range. Loads tolerate records written
    /// by hand or by older builds; live input still goes through [`set`].
    ///
    /// [`set`]: CropInsets::set
    pub fn sanitize(&mut self) {
        self.top = self.top.min(MAX_CROP_PERCENT);
        self.right = self.right.min(MAX_CROP_PERCENT);
        self.bottom = self.bottom.min(MAX_CROP_PERCENT);
        self.left = self.left.min(MAX_CROP_PERCENT);
    }

    /// The visible rectangle of a `width`×`height` box under these insets.
    pub fn visible_rect(&self, width: f32, height: f32) -> VisibleRect {
        let x = width * f32::from(self.left) / 100.0;
        let y = height * f32::from(self.top) / 100.0;
        let visible_w = width * (100.0 - f32::from(self.left) - f32::from(self.right)) / 100.0;
        let visible_h = height * (100.0 - f32::from(self.top) - f32::from(self.bottom)) / 100.0;
        VisibleRect {
            x,
            y,
            width: visible_w.max(0.0),
            height: visible_h.max(0.0),
        }
    }
}
