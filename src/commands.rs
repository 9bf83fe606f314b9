use crate::element::ElementId;
use image::RgbaImage;
use std::sync::Arc;

/// Commands the surrounding toolbar issues to the document and the export
/// pipeline. Image bytes are decoded before they reach the core; the command
/// carries the finished raster.
#[derive(Debug, Clone)]
pub enum EditorCommand {
    AddText,
    AddImage { image: Arc<RgbaImage> },
    RemoveElement(ElementId),
    SetMargins { top: f32, right: f32, bottom: f32, left: f32 },
    SetZoom(f32),
    ExportPdf,
    CopyImage,
}
