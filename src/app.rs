use crate::capture::{CapturePipeline, CaptureStep, ExportKind};
use crate::document::{Document, MAX_MARGIN_PX};
use crate::element::{ElementId, Point, RenderTier, Selection, ToolPanel};
use crate::error::EditorError;
use crate::export;
use crate::input::{
    route_press, GestureOwner, HitSurface, InputRouter, PressRouting, ScreenRect,
};
use crate::render::{self, TEXT_BODY_SIZE};
use crate::settings::Settings;
use crate::storage::{self, StateStore};
use crate::toast_log::append_toast_log;
use crate::zoom::{PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
use eframe::egui::{
    self, Color32, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2,
};
use egui_toast::{Toast, ToastKind, ToastOptions, Toasts};
use std::collections::HashMap;

const CANVAS_PADDING: f32 = 24.0;
const HANDLE_SIZE: f32 = 12.0;
const SELECTION_STROKE: Stroke = Stroke {
    width: 1.5,
    color: Color32::from_rgb(52, 152, 219),
};
const GUIDE_COLOR: Color32 = Color32::from_rgb(190, 205, 220);

fn push_toast(toasts: &mut Toasts, toast: Toast) {
    append_toast_log(toast.text.text());
    toasts.add(toast);
}

/// Texture cache entry; the key part invalidates when the processed raster
/// changes (new threshold or a source arriving late).
struct CachedTexture {
    threshold: u8,
    has_source: bool,
    handle: TextureHandle,
}

pub struct EditorApp {
    doc: Document,
    store: Box<dyn StateStore>,
    settings: Settings,
    pipeline: CapturePipeline,
    router: InputRouter,
    toasts: Toasts,
    textures: HashMap<ElementId, CachedTexture>,
}

impl EditorApp {
    pub fn new(settings: Settings, store: Box<dyn StateStore>) -> Self {
        let mut doc = storage::load_document(store.as_ref());
        doc.margins = settings.margins;
        Self {
            doc,
            store,
            settings,
            pipeline: CapturePipeline::new(),
            router: InputRouter::new(),
            toasts: Toasts::new().anchor(egui::Align2::RIGHT_TOP, [10.0, 10.0]),
            textures: HashMap::new(),
        }
    }

    fn notify_success(&mut self, text: String) {
        if self.settings.enable_toasts {
            push_toast(
                &mut self.toasts,
                Toast {
                    text: text.into(),
                    kind: ToastKind::Success,
                    options: ToastOptions::default()
                        .duration_in_seconds(f64::from(self.settings.toast_duration)),
                },
            );
        }
    }

    fn notify_error(&mut self, text: String) {
        tracing::error!("{text}");
        push_toast(
            &mut self.toasts,
            Toast {
                text: text.into(),
                kind: ToastKind::Error,
                options: ToastOptions::default()
                    .duration_in_seconds(f64::from(self.settings.toast_duration)),
            },
        );
    }

    /// One pipeline step per frame. Rasterization and finalization run in
    /// the frame that receives the Rasterize step, after the settle wait.
    fn drive_pipeline(&mut self, ctx: &egui::Context) {
        if !self.pipeline.is_busy() {
            return;
        }
        match self.pipeline.advance() {
            CaptureStep::Idle => {}
            CaptureStep::Wait => ctx.request_repaint(),
            CaptureStep::Rasterize { kind, scale } => {
                let bitmap = render::render_document(&self.doc, scale);
                self.pipeline.begin_finalize();
                let outcome = match kind {
                    ExportKind::Pdf => rfd::FileDialog::new()
                        .add_filter("PDF", &["pdf"])
                        .set_file_name("letterhead.pdf")
                        .save_file()
                        .map_or(Ok(()), |path| {
                            export::write_pdf_file(&path, &bitmap)
                                .map_err(|e| EditorError::Capture(format!("{e:#}")))
                        }),
                    ExportKind::Clipboard => export::copy_bitmap_to_clipboard(bitmap),
                };
                match self.pipeline.finish(outcome, &mut self.doc.zoom) {
                    Ok(()) => {
                        let text = match kind {
                            ExportKind::Pdf => "Exported letterhead PDF",
                            ExportKind::Clipboard => "Copied letterhead to clipboard",
                        };
                        self.notify_success(text.to_string());
                    }
                    Err(e) => self.notify_error(e.to_string()),
                }
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        let busy = self.pipeline.is_busy();
        ui.horizontal(|ui| {
            if ui.button("Add Text").clicked() {
                let id = self.doc.add_text();
                self.doc.select_only(id);
            }
            if ui.button("Add Image").clicked() {
                self.add_image_from_dialog();
            }
            ui.separator();

            ui.label("Zoom");
            if ui.button("\u{2212}").clicked() {
                self.doc.zoom.step_out();
            }
            ui.label(format!("{:.0}%", self.doc.zoom.get() * 100.0));
            if ui.button("+").clicked() {
                self.doc.zoom.step_in();
            }
            if ui.button("Fit").clicked() {
                self.doc.zoom.fit_to_viewport(ui.ctx().screen_rect().width());
            }
            ui.separator();

            self.margin_controls(ui);
            ui.separator();

            if ui.add_enabled(!busy, egui::Button::new("Export PDF")).clicked() {
                self.pipeline.begin(ExportKind::Pdf, &mut self.doc.zoom);
            }
            if ui.add_enabled(!busy, egui::Button::new("Copy")).clicked() {
                self.pipeline.begin(ExportKind::Clipboard, &mut self.doc.zoom);
            }

            self.selected_image_controls(ui);
        });
    }

    fn margin_controls(&mut self, ui: &mut egui::Ui) {
        let mut margins = self.doc.margins;
        let mut changed = false;
        ui.label("Margins");
        for (label, value) in [
            ("T", &mut margins.top),
            ("R", &mut margins.right),
            ("B", &mut margins.bottom),
            ("L", &mut margins.left),
        ] {
            changed |= ui
                .add(
                    egui::DragValue::new(value)
                        .prefix(format!("{label} "))
                        .clamp_range(0.0..=MAX_MARGIN_PX),
                )
                .changed();
        }
        if changed {
            match self
                .doc
                .margins
                .set(margins.top, margins.right, margins.bottom, margins.left)
            {
                Ok(()) => self.doc.mark_dirty(),
                Err(e) => tracing::debug!("margin input rejected: {e}"),
            }
        }
    }

    fn selected_image_controls(&mut self, ui: &mut egui::Ui) {
        let Some(id) = self.doc.selected_id() else {
            return;
        };
        ui.separator();
        if self.doc.image_mut(id).is_some() {
            if ui.button("Background").clicked() {
                if let Some(image) = self.doc.image_mut(id) {
                    image.toggle_panel(ToolPanel::BackgroundRemoval);
                }
            }
            if ui.button("Crop").clicked() {
                if let Some(image) = self.doc.image_mut(id) {
                    image.toggle_panel(ToolPanel::Crop);
                }
            }
        }
        if ui.button("Delete").clicked() {
            self.remove_element(id);
        }
    }

    fn remove_element(&mut self, id: ElementId) {
        self.textures.remove(&id);
        self.doc.remove(id);
    }

    /// Decode happens here, outside the core; the document receives the
    /// finished raster.
    fn add_image_from_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        let raster = std::fs::read(&path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| Ok(image::load_from_memory(&bytes)?.to_rgba8()));
        match raster {
            Ok(img) => {
                let id = self.doc.add_image(std::sync::Arc::new(img));
                self.doc.select_only(id);
            }
            Err(e) => self.notify_error(format!("Failed to load image: {e}")),
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui, interactive: bool) {
        let z = self.doc.zoom.get();
        let desired = Vec2::new(
            PAGE_WIDTH_PX * z + 2.0 * CANVAS_PADDING,
            PAGE_HEIGHT_PX * z + 2.0 * CANVAS_PADDING,
        );
        let (response, painter) = ui.allocate_painter(desired, Sense::click());
        let page_origin = response.rect.min + Vec2::splat(CANVAS_PADDING);
        let page_rect = Rect::from_min_size(
            page_origin,
            Vec2::new(PAGE_WIDTH_PX * z, PAGE_HEIGHT_PX * z),
        );

        painter.rect_filled(page_rect, 0.0, Color32::WHITE);
        painter.rect_stroke(page_rect, 0.0, Stroke::new(1.0, Color32::GRAY));
        self.draw_margin_guides(&painter, page_rect, z);

        // Background tier first, foreground on top; creation order within a
        // tier. Ids are collected up front so the element pass can borrow
        // the document mutably.
        let mut ordered: Vec<(ElementId, bool, RenderTier)> = self
            .doc
            .text_elements()
            .iter()
            .map(|t| (t.id, false, t.render_tier()))
            .chain(
                self.doc
                    .image_elements()
                    .iter()
                    .map(|i| (i.id, true, i.render_tier())),
            )
            .collect();
        ordered.sort_by_key(|(id, _, tier)| (*tier == RenderTier::Foreground, *id));

        let mut surfaces = Vec::with_capacity(ordered.len());
        for (id, is_image, _) in ordered {
            if is_image {
                self.image_element_ui(ui, &painter, page_origin, z, id, &mut surfaces, interactive);
            } else {
                self.text_element_ui(ui, &painter, page_origin, z, id, &mut surfaces, interactive);
            }
        }

        if interactive {
            self.route_canvas_press(ui, &response, &surfaces);
        }
    }

    fn draw_margin_guides(&self, painter: &egui::Painter, page_rect: Rect, z: f32) {
        let margins = self.doc.margins;
        let inner = Rect::from_min_max(
            page_rect.min + Vec2::new(margins.left * z, margins.top * z),
            page_rect.max - Vec2::new(margins.right * z, margins.bottom * z),
        );
        if inner.is_positive() {
            painter.rect_stroke(inner, 0.0, Stroke::new(1.0, GUIDE_COLOR));
        }
    }

    /// Press on empty canvas deselects everything and closes panels. The
    /// press never reaches here when it began on a handle, a panel area or
    /// a floating window; those widgets consume it.
    fn route_canvas_press(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        surfaces: &[HitSurface],
    ) {
        let pressed = ui.input(|i| i.pointer.primary_pressed());
        if !pressed || !response.is_pointer_button_down_on() {
            return;
        }
        let Some(pos) = ui.input(|i| i.pointer.interact_pos()) else {
            return;
        };
        match route_press(Point::new(pos.x, pos.y), surfaces) {
            PressRouting::Element(id) => self.doc.select_only(id),
            PressRouting::Outside => self.doc.deselect_all(),
        }
    }

    fn image_element_ui(
        &mut self,
        ui: &mut egui::Ui,
        painter: &egui::Painter,
        page_origin: Pos2,
        z: f32,
        id: ElementId,
        surfaces: &mut Vec<HitSurface>,
        interactive: bool,
    ) {
        let Some(image) = self.doc.image_mut(id) else {
            return;
        };
        let position = image.position;
        let size = image.size();
        let selection = image.selection();
        let panel = image.panel();
        let threshold = image.threshold();
        let raster = image.processed().cloned();
        let crop = image.crop;

        let screen_rect = Rect::from_min_size(
            page_origin + Vec2::new(position.x * z, position.y * z),
            Vec2::new(size.width * z, size.height * z),
        );

        match raster {
            Some(raster) => {
                let texture = self.texture_for(ui.ctx(), id, threshold, &raster);
                let visible = crop.visible_rect(size.width, size.height);
                if !visible.is_empty() {
                    let clip = Rect::from_min_size(
                        screen_rect.min + Vec2::new(visible.x * z, visible.y * z),
                        Vec2::new(visible.width * z, visible.height * z),
                    );
                    painter.with_clip_rect(clip).image(
                        texture,
                        screen_rect,
                        Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
            }
            None => {
                // Source still missing; draw a placeholder so the element
                // stays visible and selectable.
                painter.rect_filled(screen_rect, 0.0, Color32::from_gray(230));
                painter.rect_stroke(screen_rect, 0.0, Stroke::new(1.0, Color32::GRAY));
            }
        }

        let mut panel_rect = None;
        if selection.shows_controls() {
            painter.rect_stroke(screen_rect, 0.0, SELECTION_STROKE);
            if interactive {
                self.move_handle(ui, id, screen_rect, z);
                self.resize_handle(ui, id, screen_rect, z);
            }
            if panel != ToolPanel::None {
                panel_rect = self.image_panel_ui(ui.ctx(), id, panel, screen_rect);
            }
        }

        surfaces.push(HitSurface {
            id,
            bounds: rect_to_screen(screen_rect),
            panel: panel_rect.map(rect_to_screen),
        });
    }

    fn text_element_ui(
        &mut self,
        ui: &mut egui::Ui,
        painter: &egui::Painter,
        page_origin: Pos2,
        z: f32,
        id: ElementId,
        surfaces: &mut Vec<HitSurface>,
        interactive: bool,
    ) {
        let Some(text) = self.doc.text_mut(id) else {
            return;
        };
        let position = text.position;
        let selection = text.selection();
        let body = if text.body.is_empty() {
            "Text".to_string()
        } else {
            text.body.clone()
        };

        let anchor = page_origin + Vec2::new(position.x * z, position.y * z);
        let galley = painter.layout_no_wrap(
            body,
            egui::FontId::proportional(TEXT_BODY_SIZE * z),
            Color32::from_gray(20),
        );
        let screen_rect = Rect::from_min_size(anchor, galley.size());
        painter.galley(anchor, galley, Color32::from_gray(20));

        if interactive {
            let hovering = ui
                .input(|i| i.pointer.hover_pos())
                .is_some_and(|pos| screen_rect.contains(pos));
            if let Some(text) = self.doc.text_mut(id) {
                if hovering {
                    text.hover();
                } else {
                    text.unhover();
                }
            }
        }

        if selection.shows_controls() {
            painter.rect_stroke(screen_rect.expand(2.0), 0.0, SELECTION_STROKE);
            if interactive {
                self.move_handle(ui, id, screen_rect, z);
            }
            if selection == Selection::Selected && interactive {
                self.text_edit_window(ui.ctx(), id, screen_rect);
            }
        }

        surfaces.push(HitSurface {
            id,
            bounds: rect_to_screen(screen_rect),
            panel: None,
        });
    }

    /// Dedicated move affordance above the element's top-left corner.
    fn move_handle(&mut self, ui: &mut egui::Ui, id: ElementId, element_rect: Rect, z: f32) {
        let handle_rect = Rect::from_min_size(
            element_rect.min - Vec2::new(0.0, HANDLE_SIZE + 4.0),
            Vec2::new(HANDLE_SIZE * 2.0, HANDLE_SIZE),
        );
        ui.painter()
            .rect_filled(handle_rect, 2.0, SELECTION_STROKE.color);
        let response = ui.interact(
            handle_rect,
            ui.id().with(("move", id.0)),
            Sense::click_and_drag(),
        );

        if response.drag_started() && self.router.try_claim_element(id) {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Some(image) = self.doc.image_mut(id) {
                    image.begin_drag(Point::new(pos.x, pos.y));
                } else if let Some(text) = self.doc.text_mut(id) {
                    text.begin_drag(Point::new(pos.x, pos.y));
                }
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let point = Point::new(pos.x, pos.y);
                if let Some(image) = self.doc.image_mut(id) {
                    image.drag_to(point, z);
                } else if let Some(text) = self.doc.text_mut(id) {
                    text.drag_to(point, z);
                }
            }
        }
        if response.drag_stopped() {
            if let Some(image) = self.doc.image_mut(id) {
                image.end_interaction();
            } else if let Some(text) = self.doc.text_mut(id) {
                text.end_interaction();
            }
            if self.router.owner() == GestureOwner::Element(id) {
                self.router.release();
            }
            self.doc.mark_dirty();
        }
    }

    /// Corner affordance, image elements only; grows from the fixed
    /// top-left corner.
    fn resize_handle(&mut self, ui: &mut egui::Ui, id: ElementId, element_rect: Rect, z: f32) {
        let handle_rect = Rect::from_center_size(element_rect.max, Vec2::splat(HANDLE_SIZE));
        ui.painter()
            .rect_filled(handle_rect, 2.0, SELECTION_STROKE.color);
        let response = ui.interact(
            handle_rect,
            ui.id().with(("resize", id.0)),
            Sense::click_and_drag(),
        );

        if response.drag_started() && self.router.try_claim_element(id) {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Some(image) = self.doc.image_mut(id) {
                    image.begin_resize(Point::new(pos.x, pos.y));
                }
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Some(image) = self.doc.image_mut(id) {
                    image.resize_to(Point::new(pos.x, pos.y), z);
                }
            }
        }
        if response.drag_stopped() {
            if let Some(image) = self.doc.image_mut(id) {
                image.end_interaction();
            }
            if self.router.owner() == GestureOwner::Element(id) {
                self.router.release();
            }
            self.doc.mark_dirty();
        }
    }

    fn image_panel_ui(
        &mut self,
        ctx: &egui::Context,
        id: ElementId,
        panel: ToolPanel,
        element_rect: Rect,
    ) -> Option<Rect> {
        let response = egui::Area::new(egui::Id::new(("panel", id.0)))
            .fixed_pos(element_rect.left_bottom() + Vec2::new(0.0, 8.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| match panel {
                    ToolPanel::BackgroundRemoval => self.background_panel(ui, id),
                    ToolPanel::Crop => self.crop_panel(ui, id),
                    ToolPanel::None => {}
                });
            });
        Some(response.response.rect)
    }

    fn background_panel(&mut self, ui: &mut egui::Ui, id: ElementId) {
        let Some(image) = self.doc.image_mut(id) else {
            return;
        };
        ui.label("Background removal");
        let mut threshold = image.threshold();
        if ui
            .add(egui::Slider::new(&mut threshold, 0..=100).text("Threshold"))
            .changed()
        {
            match image.set_threshold(threshold) {
                Ok(()) => self.doc.mark_dirty(),
                Err(e) => tracing::debug!("threshold not applied: {e}"),
            }
        }
    }

    fn crop_panel(&mut self, ui: &mut egui::Ui, id: ElementId) {
        use crate::crop::{CropSide, MAX_CROP_PERCENT};
        let Some(image) = self.doc.image_mut(id) else {
            return;
        };
        ui.label("Crop");
        let mut changed = false;
        for (label, side) in [
            ("Top", CropSide::Top),
            ("Right", CropSide::Right),
            ("Bottom", CropSide::Bottom),
            ("Left", CropSide::Left),
        ] {
            let mut value = i32::from(image.crop.get(side));
            if ui
                .add(
                    egui::DragValue::new(&mut value)
                        .prefix(format!("{label} "))
                        .clamp_range(0..=i32::from(MAX_CROP_PERCENT))
                        .suffix("%"),
                )
                .changed()
            {
                match image.crop.set(side, value) {
                    Ok(()) => changed = true,
                    Err(e) => tracing::debug!("crop input rejected: {e}"),
                }
            }
        }
        if ui.button("Reset").clicked() {
            image.crop.reset();
            changed = true;
        }
        if changed {
            self.doc.mark_dirty();
        }
    }

    fn text_edit_window(&mut self, ctx: &egui::Context, id: ElementId, element_rect: Rect) {
        let Some(text) = self.doc.text_mut(id) else {
            return;
        };
        let mut changed = false;
        egui::Window::new("Text")
            .id(egui::Id::new(("text-edit", id.0)))
            .default_pos(element_rect.right_top() + Vec2::new(16.0, 0.0))
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                changed = ui
                    .add(egui::TextEdit::multiline(&mut text.body).desired_rows(3))
                    .changed();
            });
        if changed {
            self.doc.mark_dirty();
        }
    }

    fn texture_for(
        &mut self,
        ctx: &egui::Context,
        id: ElementId,
        threshold: u8,
        raster: &std::sync::Arc<image::RgbaImage>,
    ) -> egui::TextureId {
        let stale = self
            .textures
            .get(&id)
            .map_or(true, |cached| {
                cached.threshold != threshold || !cached.has_source
            });
        if stale {
            let size = [raster.width() as usize, raster.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, raster.as_raw());
            let handle = ctx.load_texture(
                format!("element-{}", id.0),
                color_image,
                TextureOptions::LINEAR,
            );
            self.textures.insert(
                id,
                CachedTexture {
                    threshold,
                    has_source: true,
                    handle,
                },
            );
        }
        self.textures[&id].handle.id()
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            if let Some(id) = self.doc.selected_id() {
                self.remove_element(id);
            }
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.doc.deselect_all();
        }
    }

    /// Pinch and ctrl/cmd-scroll arrive through the same input channel. The
    /// gesture-owner token keeps them out while an element drag is running.
    fn handle_zoom_gesture(&mut self, ctx: &egui::Context) {
        let factor = ctx.input(|i| i.zoom_delta());
        if (factor - 1.0).abs() > f32::EPSILON && self.router.try_claim_document() {
            self.doc.zoom.apply_factor(factor);
            self.router.release();
        }
    }
}

fn rect_to_screen(rect: Rect) -> ScreenRect {
    ScreenRect::new(rect.min.x, rect.min.y, rect.width(), rect.height())
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drive_pipeline(ctx);
        let busy = self.pipeline.is_busy();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_enabled_ui(!busy, |ui| self.toolbar(ui));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                self.canvas(ui, !busy);
            });
        });

        if busy {
            egui::Area::new(egui::Id::new("export-busy"))
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.add(egui::Spinner::new());
                            ui.label("Exporting\u{2026}");
                        });
                    });
                });
        } else {
            self.handle_shortcuts(ctx);
            self.handle_zoom_gesture(ctx);
        }

        if self.doc.take_dirty() {
            storage::save_document(self.store.as_ref(), &self.doc);
        }

        self.toasts.show(ctx);
    }
}
