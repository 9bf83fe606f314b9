use crate::capture::PDF_JPEG_QUALITY;
use crate::error::{EditorError, EditorResult};
use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::Path;

/// A4 in PDF points.
pub const PAGE_WIDTH_PT: f32 = 595.28;
pub const PAGE_HEIGHT_PT: f32 = 841.89;

/// Encode the captured bitmap as a single-page PDF: one JPEG image spanning
/// the full page bleed, page sized to physical A4.
pub fn pdf_from_bitmap(bitmap: &RgbaImage) -> Result<Vec<u8>> {
    let jpeg = encode_jpeg(bitmap, PDF_JPEG_QUALITY)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => bitmap.width() as i64,
            "Height" => bitmap.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    PAGE_WIDTH_PT.into(),
                    0.into(),
                    0.into(),
                    PAGE_HEIGHT_PT.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().context("encode page content stream")?,
    ));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => image_id,
        },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    doc.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
            "MediaBox" => vec![
                0.into(), 0.into(),
                PAGE_WIDTH_PT.into(), PAGE_HEIGHT_PT.into(),
            ],
        },
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let now = chrono::Utc::now();
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Letterhead"),
        "Creator" => Object::string_literal("letterhead_studio"),
        "CreationDate" => Object::string_literal(now.format("D:%Y%m%d%H%M%SZ").to_string()),
    });
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).context("serialize pdf")?;
    Ok(buffer)
}

pub fn write_pdf_file(path: &Path, bitmap: &RgbaImage) -> Result<()> {
    let bytes = pdf_from_bitmap(bitmap)?;
    std::fs::write(path, bytes).with_context(|| format!("write pdf to {}", path.display()))?;
    Ok(())
}

/// Flatten alpha onto white and JPEG-encode. JPEG carries no alpha channel,
/// and the capture is a full page over white anyway.
fn encode_jpeg(bitmap: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = bitmap.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for px in bitmap.chunks_exact(4) {
        let a = f32::from(px[3]) / 255.0;
        for channel in &px[..3] {
            rgb.push((f32::from(*channel) * a + 255.0 * (1.0 - a)).round() as u8);
        }
    }

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&rgb, width, height, image::ColorType::Rgb8)
        .context("jpeg-encode capture bitmap")?;
    Ok(out.into_inner())
}

/// Write the captured bitmap to the system clipboard as a lossless image
/// payload. Failures surface as [`EditorError::ClipboardUnavailable`] so the
/// caller can report them separately from capture failures.
pub fn copy_bitmap_to_clipboard(bitmap: RgbaImage) -> EditorResult<()> {
    use std::borrow::Cow;
    let (width, height) = bitmap.dimensions();
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| EditorError::ClipboardUnavailable(e.to_string()))?;
    clipboard
        .set_image(arboard::ImageData {
            width: width as usize,
            height: height as usize,
            bytes: Cow::Owned(bitmap.into_raw()),
        })
        .map_err(|e| EditorError::ClipboardUnavailable(e.to_string()))?;
    Ok(())
}
