use crate::document::{Document, ElementRef};
use crate::element::{ImageElement, TextElement};
use crate::zoom::{PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
use image::{imageops, Rgba, RgbaImage};

/// Base size for text element bodies in document pixels.
pub const TEXT_BODY_SIZE: f32 = 16.0;

const PAGE_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT_BLACK: Rgba<u8> = Rgba([20, 20, 20, 255]);

/// Rasterize the composed document at `scale` times the document pixel
/// size.
///
/// Only printable content is drawn: page background, cropped/processed
/// images, text bodies. Selection outlines, affordances, margin guides and
/// tool panels exist solely in the interactive layer, which is how
/// non-printing chrome stays out of every export.
pub fn render_document(doc: &Document, scale: f32) -> RgbaImage {
    let width = (PAGE_WIDTH_PX * scale).round().max(1.0) as u32;
    let height = (PAGE_HEIGHT_PX * scale).round().max(1.0) as u32;
    let mut page = RgbaImage::from_pixel(width, height, PAGE_WHITE);

    for element in doc.render_order() {
        match element {
            ElementRef::Image(image) => blit_image(&mut page, image, scale),
            ElementRef::Text(text) => blit_text(&mut page, text, scale),
        }
    }

    page
}

fn blit_image(page: &mut RgbaImage, element: &ImageElement, scale: f32) {
    let Some(raster) = element.processed() else {
        return;
    };

    let size = element.size();
    let visible = element.crop.visible_rect(size.width, size.height);
    if visible.is_empty() {
        return;
    }

    // The crop percentages apply equally to the source raster and to the
    // on-page box, so the visible pixels are a proportional window into the
    // source.
    let (src_w, src_h) = (raster.width() as f32, raster.height() as f32);
    let src_window = element.crop.visible_rect(src_w, src_h);
    let sx = src_window.x.floor() as u32;
    let sy = src_window.y.floor() as u32;
    let sw = (src_window.width.round() as u32).clamp(1, raster.width().saturating_sub(sx).max(1));
    let sh = (src_window.height.round() as u32).clamp(1, raster.height().saturating_sub(sy).max(1));

    let dest_w = (visible.width * scale).round().max(1.0) as u32;
    let dest_h = (visible.height * scale).round().max(1.0) as u32;

    let cropped = imageops::crop_imm(raster.as_ref(), sx, sy, sw, sh).to_image();
    let scaled = imageops::resize(&cropped, dest_w, dest_h, imageops::FilterType::Triangle);

    let dest_x = ((element.position.x + visible.x) * scale).round() as i64;
    let dest_y = ((element.position.y + visible.y) * scale).round() as i64;
    imageops::overlay(page, &scaled, dest_x, dest_y);
}

fn blit_text(page: &mut RgbaImage, element: &TextElement, scale: f32) {
    if element.body.is_empty() {
        return;
    }
    let Some((font, tweak)) = default_font_arc() else {
        return;
    };

    use ab_glyph::{Font, ScaleFont};
    let size = TEXT_BODY_SIZE * scale;
    let scaled = font.as_scaled(size * tweak.scale);
    let line_height = scaled.height() + scaled.line_gap();

    let origin_x = element.position.x * scale;
    let mut baseline_y = element.position.y * scale + scaled.ascent() + tweak.y_offset * size;
    for line in element.body.lines() {
        draw_line(page, &font, size * tweak.scale, origin_x, baseline_y, line);
        baseline_y += line_height;
    }
}

fn draw_line(
    page: &mut RgbaImage,
    font: &ab_glyph::FontArc,
    px_size: f32,
    origin_x: f32,
    baseline_y: f32,
    text: &str,
) {
    use ab_glyph::{point, Font, ScaleFont};
    let scaled = font.as_scaled(px_size);
    let mut caret = point(origin_x, baseline_y);
    let mut previous: Option<ab_glyph::GlyphId> = None;

    for ch in text.chars() {
        let mut glyph = scaled.scaled_glyph(ch);
        if let Some(prev) = previous {
            caret.x += scaled.kern(prev, glyph.id);
        }
        previous = Some(glyph.id);
        glyph.position = caret;
        caret.x += scaled.h_advance(glyph.id);

        if let Some(outlined) = scaled.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, coverage| {
                let px = x as i32 + bounds.min.x as i32;
                let py = y as i32 + bounds.min.y as i32;
                if px >= 0 && py >= 0 && px < page.width() as i32 && py < page.height() as i32 {
                    let alpha = (f32::from(TEXT_BLACK.0[3]) * coverage)
                        .round()
                        .clamp(0.0, 255.0) as u8;
                    blend_pixel(
                        page,
                        px as u32,
                        py as u32,
                        Rgba([TEXT_BLACK.0[0], TEXT_BLACK.0[1], TEXT_BLACK.0[2], alpha]),
                    );
                }
            });
        }
    }
}

fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    let [r, g, b, a] = color.0;
    if a == 0 {
        return;
    }
    let dst = img.get_pixel(x, y).0;
    let src_a = f32::from(a) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    let blend = |src: u8, dst: u8| {
        let src_f = f32::from(src) / 255.0;
        let dst_f = f32::from(dst) / 255.0;
        ((src_f * src_a + dst_f * dst_a * (1.0 - src_a)) / out_a * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    img.put_pixel(
        x,
        y,
        Rgba([
            blend(r, dst[0]),
            blend(g, dst[1]),
            blend(b, dst[2]),
            (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        ]),
    );
}

fn default_font_data() -> Option<(eframe::egui::FontData, eframe::egui::FontTweak)> {
    let definitions = eframe::egui::FontDefinitions::default();
    let family = definitions
        .families
        .get(&eframe::egui::FontFamily::Proportional)?;
    let font_name = family.first()?;
    let data = definitions.font_data.get(font_name)?.clone();
    let tweak = data.tweak;
    Some((data, tweak))
}

fn default_font_arc() -> Option<(ab_glyph::FontArc, eframe::egui::FontTweak)> {
    let (data, tweak) = default_font_data()?;
    let font = match data.font {
        std::borrow::Cow::Borrowed(bytes) => {
            ab_glyph::FontRef::try_from_slice_and_index(bytes, data.index)
                .map(ab_glyph::FontArc::from)
                .ok()
        }
        std::borrow::Cow::Owned(bytes) => {
            ab_glyph::FontVec::try_from_vec_and_index(bytes, data.index)
                .map(ab_glyph::FontArc::from)
                .ok()
        }
    }?;
    Some((font, tweak))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::CropSide;
    use std::sync::Arc;

    #[test]
    fn empty_document_renders_a_white_page() {
        let doc = Document::new();
        let page = render_document(&doc, 1.0);
        assert_eq!(page.width(), PAGE_WIDTH_PX as u32);
        assert_eq!(page.height(), PAGE_HEIGHT_PX as u32);
        assert_eq!(page.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn supersampling_scales_the_bitmap() {
        let doc = Document::new();
        let page = render_document(&doc, 3.0);
        assert_eq!(page.width(), (PAGE_WIDTH_PX * 3.0) as u32);
        assert_eq!(page.height(), (PAGE_HEIGHT_PX * 3.0) as u32);
    }

    #[test]
    fn image_elements_land_at_their_document_position() {
        let mut doc = Document::new();
        let raster = Arc::new(RgbaImage::from_pixel(60, 60, Rgba([200, 0, 0, 255])));
        let id = doc.add_image(raster);
        let element = doc.image_mut(id).unwrap();
        element.position = crate::element::Point::new(100.0, 100.0);

        let page = render_document(&doc, 1.0);
        // Inside the blit.
        assert_eq!(page.get_pixel(110, 110).0, [200, 0, 0, 255]);
        // Outside it the page is still white.
        assert_eq!(page.get_pixel(50, 50).0, [255, 255, 255, 255]);
    }

    #[test]
    fn fully_cropped_images_draw_nothing() {
        let mut doc = Document::new();
        let raster = Arc::new(RgbaImage::from_pixel(60, 60, Rgba([0, 0, 200, 255])));
        let id = doc.add_image(raster);
        let element = doc.image_mut(id).unwrap();
        element.position = crate::element::Point::new(0.0, 0.0);
        element.crop.set(CropSide::Left, 50).unwrap();
        element.crop.set(CropSide::Right, 50).unwrap();

        let page = render_document(&doc, 1.0);
        assert!(page.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn transparent_processed_pixels_show_the_page_through() {
        let mut doc = Document::new();
        let raster = Arc::new(RgbaImage::from_pixel(60, 60, Rgba([255, 255, 255, 255])));
        let id = doc.add_image(raster);
        {
            let element = doc.image_mut(id).unwrap();
            element.position = crate::element::Point::new(0.0, 0.0);
            element.set_threshold(100).unwrap();
        }
        let page = render_document(&doc, 1.0);
        // Background removal stripped the white fill; the page shows through
        // fully opaque.
        assert!(page.pixels().all(|p| p.0[3] == 255));
    }
}
