use letterhead_studio::app::EditorApp;
use letterhead_studio::logging;
use letterhead_studio::settings::{Settings, SETTINGS_FILE_NAME};
use letterhead_studio::storage::{FileStore, MemoryStore, StateStore};

use eframe::egui;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let (settings, settings_error) = match Settings::load(Path::new(SETTINGS_FILE_NAME)) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    logging::init(settings.debug_logging);
    if let Some(e) = settings_error {
        tracing::warn!("settings failed to load, using defaults: {e:#}");
    }

    let store: Box<dyn StateStore> = match FileStore::resolve() {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!("state store unavailable, running in-memory: {e:#}");
            Box::new(MemoryStore::new())
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1080.0, 860.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Letterhead Studio",
        native_options,
        Box::new(move |_cc| Box::new(EditorApp::new(settings, store))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start ui: {e}"))?;

    Ok(())
}
