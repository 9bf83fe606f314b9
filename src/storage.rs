use crate::crop::CropInsets;
use crate::document::Document;
use crate::element::{ElementId, ImageElement, Point, Size, TextElement};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STATE_FILE_NAME: &str = "letterhead_state.json";
pub const TEXT_ELEMENTS_KEY: &str = "text_elements";
pub const IMAGE_ELEMENTS_KEY: &str = "image_elements";

/// Storage collaborator. The core depends on this interface, never on a
/// concrete mechanism, so tests run against the in-memory fake.
///
/// Writes are fire-and-forget: persistence failures degrade to a logged
/// warning and the editor stays usable.
pub trait StateStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str);
}

/// Key→string records in one JSON file, resolved next to the executable.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn resolve() -> Result<Self> {
        let exe_path = std::env::current_exe().context("resolve current executable")?;
        let parent = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
        Ok(Self::at_path(parent.join(STATE_FILE_NAME)))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("state file {} is malformed: {e}", self.path.display());
                BTreeMap::new()
            }
        }
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    fn save(&self, key: &str, value: &str) {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        let json = match serde_json::to_string_pretty(&map) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize state map: {e}");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("failed to create state folder {}: {e}", parent.display());
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::warn!("failed to write state file {}: {e}", self.path.display());
        }
    }
}

/// In-memory fake for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.records.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) {
        self.records
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TextRecord {
    id: u64,
    position: Point,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageRecord {
    id: u64,
    position: Point,
    size: Size,
    #[serde(default)]
    crop: CropInsets,
    #[serde(default)]
    threshold: u8,
    /// Base64-encoded PNG of the immutable source raster.
    #[serde(default)]
    src: Option<String>,
}

/// Persist both collections. Called after every change set.
pub fn save_document(store: &dyn StateStore, doc: &Document) {
    let texts: Vec<TextRecord> = doc
        .text_elements()
        .iter()
        .map(|t| TextRecord {
            id: t.id.0,
            position: t.position,
            body: t.body.clone(),
        })
        .collect();
    match serde_json::to_string(&texts) {
        Ok(json) => store.save(TEXT_ELEMENTS_KEY, &json),
        Err(e) => tracing::warn!("failed to serialize text elements: {e}"),
    }

    let images: Vec<ImageRecord> = doc
        .image_elements()
        .iter()
        .map(|i| ImageRecord {
            id: i.id.0,
            position: i.position,
            size: i.size(),
            crop: i.crop,
            threshold: i.threshold(),
            src: i.source().map(|raster| encode_src(raster)),
        })
        .collect();
    match serde_json::to_string(&images) {
        Ok(json) => store.save(IMAGE_ELEMENTS_KEY, &json),
        Err(e) => tracing::warn!("failed to serialize image elements: {e}"),
    }
}

/// Rebuild the document from storage. Malformed or missing records degrade
/// to an empty collection without raising to the caller.
pub fn load_document(store: &dyn StateStore) -> Document {
    let texts: Vec<TextElement> = load_records::<TextRecord>(store, TEXT_ELEMENTS_KEY)
        .into_iter()
        .map(|r| TextElement::new(ElementId(r.id), r.position, r.body))
        .collect();

    let images: Vec<ImageElement> = load_records::<ImageRecord>(store, IMAGE_ELEMENTS_KEY)
        .into_iter()
        .map(|r| {
            let source = r.src.as_deref().and_then(decode_src);
            ImageElement::from_parts(
                ElementId(r.id),
                r.position,
                r.size,
                r.crop,
                r.threshold,
                source,
            )
        })
        .collect();

    Document::from_parts(texts, images)
}

fn load_records<R: for<'de> Deserialize<'de>>(store: &dyn StateStore, key: &str) -> Vec<R> {
    let Some(json) = store.load(key) else {
        return Vec::new();
    };
    match serde_json::from_str(&json) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("malformed {key} record, starting empty: {e}");
            Vec::new()
        }
    }
}

fn encode_src(raster: &RgbaImage) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = raster.write_to(
        &mut Cursor::new(&mut bytes),
        image::ImageOutputFormat::Png,
    ) {
        tracing::warn!("failed to png-encode image source: {e}");
        return String::new();
    }
    general_purpose::STANDARD.encode(bytes)
}

fn decode_src(encoded: &str) -> Option<Arc<RgbaImage>> {
    let bytes = match general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("image source is not valid base64: {e}");
            return None;
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(img) => Some(Arc::new(img.to_rgba8())),
        Err(e) => {
            tracing::warn!("persisted image source failed to decode: {e}");
            None
        }
    }
}
