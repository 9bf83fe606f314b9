use image::{Rgba, RgbaImage};
use letterhead_studio::crop::{CropInsets, CropSide};
use letterhead_studio::document::Document;
use letterhead_studio::element::Point;
use letterhead_studio::render::render_document;
use std::sync::Arc;

#[test]
fn every_side_rejects_out_of_range_input() {
    let mut crop = CropInsets::default();
    for side in [
        CropSide::Top,
        CropSide::Right,
        CropSide::Bottom,
        CropSide::Left,
    ] {
        crop.set(side, 33).expect("in range");
        assert!(crop.set(side, 51).is_err());
        assert!(crop.set(side, -3).is_err());
        assert_eq!(crop.get(side), 33);
    }
}

#[test]
fn crop_is_a_clip_not_a_destructive_transform() {
    let mut doc = Document::new();
    let raster = Arc::new(RgbaImage::from_pixel(100, 100, Rgba([0, 120, 0, 255])));
    let id = doc.add_image(raster);
    let image = doc.image_mut(id).expect("element");
    let size_before = image.size();

    image.crop.set(CropSide::Top, 40).expect("crop");
    image.crop.set(CropSide::Left, 40).expect("crop");
    // Stored size and source raster are unaffected.
    assert_eq!(image.size(), size_before);
    assert_eq!(
        image.source().expect("source").dimensions(),
        (100, 100)
    );

    // Resetting the insets restores the full visible box.
    image.crop.reset();
    let rect = image
        .crop
        .visible_rect(size_before.width, size_before.height);
    assert_eq!((rect.width, rect.height), (size_before.width, size_before.height));
}

#[test]
fn cropped_region_is_clipped_out_of_the_render() {
    let mut doc = Document::new();
    let raster = Arc::new(RgbaImage::from_pixel(100, 100, Rgba([200, 30, 30, 255])));
    let id = doc.add_image(raster);
    {
        let image = doc.image_mut(id).expect("element");
        image.position = Point::new(0.0, 0.0);
        // Shave the left half of the visible box.
        image.crop.set(CropSide::Left, 50).expect("crop");
    }

    let page = render_document(&doc, 1.0);
    // Left half of the element's box shows the page.
    assert_eq!(page.get_pixel(10, 10).0, [255, 255, 255, 255]);
    // Right half still shows the image.
    assert_eq!(page.get_pixel(70, 10).0, [200, 30, 30, 255]);
}

#[test]
fn opposing_insets_at_the_limit_produce_an_empty_visible_area() {
    let mut crop = CropInsets::default();
    crop.set(CropSide::Left, 50).expect("crop");
    crop.set(CropSide::Right, 50).expect("crop");
    let rect = crop.visible_rect(300.0, 200.0);
    assert!(rect.is_empty());
    // The insets themselves are still within bounds and reversible.
    crop.reset();
    assert!(!crop.visible_rect(300.0, 200.0).is_empty());
}
