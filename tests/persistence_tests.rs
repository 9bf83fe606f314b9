use image::{Rgba, RgbaImage};
use letterhead_studio::crop::CropSide;
use letterhead_studio::document::Document;
use letterhead_studio::element::Point;
use letterhead_studio::storage::{
    load_document, save_document, FileStore, MemoryStore, StateStore, IMAGE_ELEMENTS_KEY,
    STATE_FILE_NAME, TEXT_ELEMENTS_KEY,
};
use std::sync::Arc;

fn raster() -> Arc<RgbaImage> {
    Arc::new(RgbaImage::from_pixel(5, 4, Rgba([20, 40, 60, 255])))
}

#[test]
fn full_document_roundtrip_through_the_memory_store() {
    let store = MemoryStore::new();
    let mut doc = Document::new();

    let text_id = doc.add_text();
    doc.text_mut(text_id).expect("text").body = "Letterhead GmbH".into();

    let image_id = doc.add_image(raster());
    {
        let image = doc.image_mut(image_id).expect("image");
        image.set_threshold(25).expect("threshold");
        image.crop.set(CropSide::Bottom, 15).expect("crop");
        image.begin_drag(Point::new(0.0, 0.0));
        image.drag_to(Point::new(30.0, 10.0), 1.0);
        image.end_interaction();
    }

    save_document(&store, &doc);
    let loaded = load_document(&store);

    let text = &loaded.text_elements()[0];
    assert_eq!(text.id, text_id);
    assert_eq!(text.body, "Letterhead GmbH");

    let image = &loaded.image_elements()[0];
    assert_eq!(image.id, image_id);
    assert_eq!(image.threshold(), 25);
    assert_eq!(image.crop.bottom, 15);
    assert_eq!(image.position.x, 80.0);
    assert_eq!(image.position.y, 210.0);
    // The processed raster is rebuilt from (source, threshold) on load.
    assert!(image.processed().is_some());
}

#[test]
fn id_allocation_resumes_after_reload() {
    let store = MemoryStore::new();
    let mut doc = Document::new();
    let first = doc.add_text();
    let second = doc.add_image(raster());
    save_document(&store, &doc);

    let mut reloaded = load_document(&store);
    let third = reloaded.add_text();
    assert!(third > second);
    assert!(third > first);
}

#[test]
fn storage_loss_degrades_to_an_empty_document() {
    let store = MemoryStore::new();
    let doc = load_document(&store);
    assert!(doc.is_empty());
}

#[test]
fn malformed_records_do_not_crash_the_load() {
    let store = MemoryStore::new();
    store.save(TEXT_ELEMENTS_KEY, "[{\"id\": true}]");
    store.save(IMAGE_ELEMENTS_KEY, "not even json");
    let doc = load_document(&store);
    assert!(doc.is_empty());
}

#[test]
fn one_collection_surviving_still_loads() {
    let store = MemoryStore::new();
    let mut doc = Document::new();
    doc.add_text();
    save_document(&store, &doc);
    // Image record is destroyed afterwards.
    store.save(IMAGE_ELEMENTS_KEY, "{corrupt");

    let loaded = load_document(&store);
    assert_eq!(loaded.text_elements().len(), 1);
    assert!(loaded.image_elements().is_empty());
}

#[test]
fn file_store_persists_a_document_across_instances() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(STATE_FILE_NAME);

    let mut doc = Document::new();
    doc.add_text();
    doc.add_image(raster());
    save_document(&FileStore::at_path(path.clone()), &doc);

    // A fresh store over the same file sees the same document.
    let loaded = load_document(&FileStore::at_path(path));
    assert_eq!(loaded.text_elements().len(), 1);
    assert_eq!(loaded.image_elements().len(), 1);
}
