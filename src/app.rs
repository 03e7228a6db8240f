// ============================================================================
// FoldFE APP — egui shell: photo panel, selections panel, template panel
// ============================================================================

use std::collections::HashMap;

use eframe::egui;
use egui::{ColorImage, TextureHandle, TextureOptions};
use image::RgbaImage;

use crate::io;
use crate::ops::print::print_page;
use crate::ops::text::load_system_font;
use crate::segment::{find_regions, grid_regions, BackgroundRule};
use crate::selection::{extract_selection, thumbnail_of, PolygonSelector};
use crate::session::SelectionStore;
use crate::template::{FortuneTemplate, TemplateMode};
use crate::{log_err, log_info, log_warn};

const THUMBNAIL_SIZE: u32 = 64;
/// Largest display edge for the photo panel; clicks are mapped back to
/// original-image coordinates before they reach the selector.
const PHOTO_MAX_EDGE: f32 = 520.0;

/// The loaded photo plus its GPU texture.
struct SourceImage {
    id: String,
    name: String,
    image: RgbaImage,
    texture: TextureHandle,
}

/// Settings for the auto-segmentation dialog.
struct SegmentDialog {
    open: bool,
    rule: SegmentRule,
    threshold: u8,
    custom_color: [u8; 3],
    tolerance: f32,
    min_size: u64,
    grid: u32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SegmentRule {
    White,
    Black,
    Transparent,
    Custom,
    Grid,
}

impl SegmentRule {
    fn label(&self) -> &'static str {
        match self {
            SegmentRule::White => "White background",
            SegmentRule::Black => "Black background",
            SegmentRule::Transparent => "Transparent background",
            SegmentRule::Custom => "Custom color",
            SegmentRule::Grid => "Uniform grid",
        }
    }
}

impl Default for SegmentDialog {
    fn default() -> Self {
        Self {
            open: false,
            rule: SegmentRule::White,
            threshold: 240,
            custom_color: [45, 58, 90],
            tolerance: 30.0,
            min_size: 100,
            grid: 4,
        }
    }
}

pub struct FoldApp {
    source: Option<SourceImage>,
    source_counter: usize,

    store: SelectionStore,
    selector: PolygonSelector,
    /// Selection picked in the list, waiting for a template click.
    armed_selection: Option<String>,

    template: FortuneTemplate,
    template_texture: Option<TextureHandle>,
    template_dirty: bool,

    thumb_textures: HashMap<String, TextureHandle>,
    segment_dialog: SegmentDialog,
    status: String,
}

impl FoldApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let font = load_system_font();
        if font.is_none() {
            log_warn!("No system font found; template labels disabled");
        }
        Self {
            source: None,
            source_counter: 0,
            store: SelectionStore::new(),
            selector: PolygonSelector::new(),
            armed_selection: None,
            template: FortuneTemplate::new(font),
            template_texture: None,
            template_dirty: true,
            thumb_textures: HashMap::new(),
            segment_dialog: SegmentDialog::default(),
            status: "Open a photo to start cutting out faces.".to_string(),
        }
    }

    fn upload_texture(ctx: &egui::Context, name: &str, image: &RgbaImage) -> TextureHandle {
        let color_image = ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.as_raw(),
        );
        ctx.load_texture(name, color_image, TextureOptions::LINEAR)
    }

    fn open_image(&mut self, ctx: &egui::Context) {
        let Some(path) = io::pick_image_path() else {
            return;
        };
        match io::load_image_sync(&path) {
            Ok(image) => {
                self.source_counter += 1;
                let id = format!("img_{}", self.source_counter);
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "photo".to_string());
                let texture = Self::upload_texture(ctx, &id, &image);
                log_info!("Opened {} ({}x{})", name, image.width(), image.height());
                self.status = format!("Loaded {} — click to outline a face.", name);
                // Swap sources without firing the cancel observer.
                self.selector.clear();
                self.source = Some(SourceImage {
                    id,
                    name,
                    image,
                    texture,
                });
            }
            Err(e) => {
                log_err!("Open failed: {}", e);
                self.status = e;
            }
        }
    }

    /// Finish bookkeeping for a freshly extracted selection: store it,
    /// build its thumbnail texture, arm it for assignment.
    fn register_record(
        &mut self,
        ctx: &egui::Context,
        record: std::sync::Arc<crate::session::SelectionRecord>,
    ) {
        let thumb = thumbnail_of(&record.raster, THUMBNAIL_SIZE);
        let texture = Self::upload_texture(ctx, &record.id, &thumb);
        self.thumb_textures.insert(record.id.clone(), texture);
        self.armed_selection = Some(record.id.clone());
        self.status = format!("{} ready — click a template section to place it.", record.name);
    }

    fn run_segmentation(&mut self, ctx: &egui::Context) {
        let Some(source) = &self.source else {
            self.status = "Open a photo before segmenting.".to_string();
            return;
        };
        let d = &self.segment_dialog;
        let regions = if d.rule == SegmentRule::Grid {
            Ok(grid_regions(source.image.width(), source.image.height(), d.grid))
        } else {
            let rule = match d.rule {
                SegmentRule::White => BackgroundRule::White { threshold: d.threshold },
                SegmentRule::Black => BackgroundRule::Black { threshold: d.threshold },
                SegmentRule::Transparent => BackgroundRule::Alpha { threshold: d.threshold },
                SegmentRule::Custom => BackgroundRule::Custom {
                    color: d.custom_color,
                    threshold: d.tolerance,
                },
                SegmentRule::Grid => unreachable!(),
            };
            find_regions(&source.image, rule, d.min_size)
        };

        match regions {
            Ok(regions) => {
                log_info!("Segmentation found {} regions", regions.len());
                let source_id = source.id.clone();
                let image = source.image.clone();
                let mut records = Vec::with_capacity(regions.len());
                for region in &regions {
                    let selection = region.to_selection();
                    let raster = extract_selection(&image, &selection);
                    records.push(self.store.add_region(&source_id, selection, raster));
                }
                for record in records {
                    let thumb = thumbnail_of(&record.raster, THUMBNAIL_SIZE);
                    let texture = Self::upload_texture(ctx, &record.id, &thumb);
                    self.thumb_textures.insert(record.id.clone(), texture);
                }
                self.status = format!("Found {} faces.", regions.len());
            }
            Err(e) => {
                log_err!("Segmentation failed: {}", e);
                self.status = e.to_string();
            }
        }
    }

    /// Fill assignable sections in order from the stored selections.
    fn quick_fill(&mut self) {
        let sections = self.template.available_sections();
        let records: Vec<_> = self.store.iter().cloned().collect();
        let mut placed = 0;
        for (record, section) in records.iter().zip(sections.iter()) {
            self.template.set_assignment(section.id, record.clone());
            placed += 1;
        }
        self.template_dirty = true;
        self.status = format!("Placed {} of {} sections.", placed, sections.len());
    }

    fn delete_record(&mut self, id: &str) {
        if self.store.delete(id) {
            let removed = self.template.remove_assignments_for(id);
            self.thumb_textures.remove(id);
            if self.armed_selection.as_deref() == Some(id) {
                self.armed_selection = None;
            }
            if removed > 0 {
                self.template_dirty = true;
            }
            log_info!("Deleted selection {} ({} assignments cleared)", id, removed);
        }
    }

    fn save_page(&mut self) {
        let Some(path) = io::pick_save_path() else {
            return;
        };
        let page = self.template.render_for_print();
        match io::encode_and_write(&page, &path) {
            Ok(()) => {
                log_info!("Saved page to {}", path.display());
                self.status = format!("Saved {}", path.display());
            }
            Err(e) => {
                log_err!("Save failed: {}", e);
                self.status = format!("Save failed: {}", e);
            }
        }
    }

    fn print(&mut self) {
        let page = self.template.render_for_print();
        match print_page(&page) {
            Ok(()) => self.status = "Sent to the system image viewer for printing.".to_string(),
            Err(e) => {
                log_err!("Print failed: {}", e);
                self.status = e;
            }
        }
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn photo_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Photo");
        let Some(source) = &self.source else {
            ui.label("No photo loaded.");
            return;
        };

        let (img_w, img_h) = (source.image.width() as f32, source.image.height() as f32);
        let display_scale = (PHOTO_MAX_EDGE / img_w).min(PHOTO_MAX_EDGE / img_h).min(1.0);
        let display_size = egui::vec2(img_w * display_scale, img_h * display_scale);
        let texture_id = source.texture.id();
        let source_id = source.id.clone();
        let source_name = source.name.clone();

        let (rect, response) =
            ui.allocate_exact_size(display_size, egui::Sense::click_and_drag());
        ui.painter().image(
            texture_id,
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        // Map the pointer into original-image coordinates.
        let to_image = |pos: egui::Pos2| {
            (
                (pos.x - rect.min.x) / display_scale,
                (pos.y - rect.min.y) / display_scale,
            )
        };

        if let Some(pos) = response.hover_pos() {
            let (ix, iy) = to_image(pos);
            self.selector.set_live_point(ix, iy);
        }

        let mut finished = None;
        if response.double_clicked() {
            match self.selector.handle_double_click() {
                Ok(done) => finished = done,
                Err(e) => self.status = e.to_string(),
            }
        } else if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let (ix, iy) = to_image(pos);
                if !self.selector.is_drawing() {
                    self.selector.start();
                }
                match self.selector.handle_click(ix, iy) {
                    Ok(done @ Some(_)) => finished = done,
                    Ok(None) => {
                        self.status = format!(
                            "{} points — click near the first point to close.",
                            self.selector.points().len()
                        );
                    }
                    Err(e) => self.status = e.to_string(),
                }
            }
        } else if response.secondary_clicked() {
            // Right-click pops only the last placed vertex; Cancel (button
            // or Escape) is what discards the whole polygon.
            self.selector.undo_point();
            self.status = format!("{} points.", self.selector.points().len());
        }

        if ui.input(|i| i.key_pressed(egui::Key::Escape)) && self.selector.is_drawing() {
            self.selector.cancel();
            self.status = "Selection cancelled.".to_string();
        }

        if let Some(selection) = finished {
            let raster = match &self.source {
                Some(src) => extract_selection(&src.image, &selection),
                None => RgbaImage::new(0, 0),
            };
            let record = self.store.add_drawn(&source_id, selection, raster);
            self.register_record(ctx, record);
        }

        // In-progress polygon overlay, drawn in screen space.
        if self.selector.is_drawing() {
            let painter = ui.painter_at(rect);
            let to_screen = |p: &crate::selection::Point| {
                egui::pos2(rect.min.x + p.x * display_scale, rect.min.y + p.y * display_scale)
            };
            let pts = self.selector.points();
            let stroke = egui::Stroke::new(2.0, egui::Color32::from_rgb(0x4a, 0x69, 0xbd));
            for pair in pts.windows(2) {
                painter.line_segment([to_screen(&pair[0]), to_screen(&pair[1])], stroke);
            }
            if let (Some(last), Some(live)) = (pts.last(), self.selector.live_point()) {
                painter.line_segment([to_screen(last), to_screen(&live)], stroke);
            }
            for (i, point) in pts.iter().enumerate() {
                let color = if i == 0 {
                    egui::Color32::from_rgb(0xe7, 0x4c, 0x3c)
                } else {
                    egui::Color32::from_rgb(0x4a, 0x69, 0xbd)
                };
                painter.circle_filled(to_screen(point), if i == 0 { 5.0 } else { 3.5 }, color);
            }
            // Closing ring once a click would snap shut.
            if pts.len() >= 3 {
                if let (Some(first), Some(live)) = (pts.first(), self.selector.live_point()) {
                    if first.distance(live) <= crate::selection::CLOSE_THRESHOLD {
                        painter.circle_stroke(
                            to_screen(first),
                            crate::selection::CLOSE_THRESHOLD * display_scale,
                            egui::Stroke::new(
                                2.0,
                                egui::Color32::from_rgba_unmultiplied(0xe7, 0x4c, 0x3c, 128),
                            ),
                        );
                    }
                }
            }
        }

        ui.horizontal(|ui| {
            if ui.button("Undo point").clicked() {
                self.selector.undo_point();
            }
            if ui.button("Cancel").clicked() {
                self.selector.cancel();
            }
            ui.label(source_name);
        });
    }

    fn selections_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Faces");
        let mut to_delete: Option<String> = None;
        let mut to_arm: Option<String> = None;
        egui::ScrollArea::vertical().max_height(300.0).show(ui, |ui| {
            for record in self.store.iter() {
                ui.horizontal(|ui| {
                    if let Some(texture) = self.thumb_textures.get(&record.id) {
                        let armed = self.armed_selection.as_deref() == Some(record.id.as_str());
                        let thumb = egui::Image::new((
                            texture.id(),
                            egui::vec2(THUMBNAIL_SIZE as f32, THUMBNAIL_SIZE as f32),
                        ));
                        let resp = ui.add(egui::ImageButton::new(thumb).selected(armed));
                        if resp.clicked() {
                            to_arm = Some(record.id.clone());
                        }
                    }
                    ui.vertical(|ui| {
                        ui.label(&record.name);
                        if ui.small_button("Delete").clicked() {
                            to_delete = Some(record.id.clone());
                        }
                    });
                });
            }
        });
        if let Some(id) = to_arm {
            self.armed_selection = Some(id);
            self.status = "Click a template section to place the face.".to_string();
        }
        if let Some(id) = to_delete {
            self.delete_record(&id);
        }
    }

    fn template_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Fortune Teller");

        ui.horizontal(|ui| {
            let mut mode = self.template.mode();
            egui::ComboBox::from_label("Layout")
                .selected_text(mode.label())
                .show_ui(ui, |ui| {
                    for &m in TemplateMode::all() {
                        ui.selectable_value(&mut mode, m, m.label());
                    }
                });
            if mode != self.template.mode() {
                self.template.set_mode(mode);
                self.template_dirty = true;
            }
            if ui.button("Quick Fill").clicked() {
                self.quick_fill();
            }
            if ui.button("Clear All").clicked() {
                self.template.clear_all_assignments();
                self.template_dirty = true;
            }
        });

        if self.template_dirty {
            self.template_texture =
                Some(Self::upload_texture(ctx, "template", self.template.surface()));
            self.template_dirty = false;
        }

        let Some(texture) = &self.template_texture else {
            return;
        };
        let size = self.template.size();
        let display = ui.available_width().min(size);
        let scale = display / size;
        let (rect, response) = ui.allocate_exact_size(
            egui::vec2(display, display),
            egui::Sense::click(),
        );
        ui.painter().image(
            texture.id(),
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        if let Some(pos) = response.hover_pos() {
            let tx = (pos.x - rect.min.x) / scale;
            let ty = (pos.y - rect.min.y) / scale;
            if self.armed_selection.is_some() && self.template.highlight_section_at(tx, ty) {
                self.template_dirty = true;
            }
            if response.clicked() {
                if let Some(info) = self.template.locate_section(tx, ty) {
                    if let Some(armed) = self.armed_selection.clone() {
                        if let Some(record) = self.store.get(&armed).cloned() {
                            self.status = format!("{} → {}", record.name, info.label);
                            self.template.set_assignment(info.id, record);
                            self.template.clear_highlight();
                            self.armed_selection = None;
                            self.template_dirty = true;
                        }
                    } else {
                        self.template.clear_assignment(info.id);
                        self.template_dirty = true;
                        self.status = format!("{} cleared.", info.label);
                    }
                }
            }
        } else if self.template.clear_highlight() {
            self.template_dirty = true;
        }
    }

    fn segment_window(&mut self, ctx: &egui::Context) {
        if !self.segment_dialog.open {
            return;
        }
        let mut open = true;
        let mut run = false;
        egui::Window::new("Find Faces")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let d = &mut self.segment_dialog;
                egui::ComboBox::from_label("Background")
                    .selected_text(d.rule.label())
                    .show_ui(ui, |ui| {
                        for rule in [
                            SegmentRule::White,
                            SegmentRule::Black,
                            SegmentRule::Transparent,
                            SegmentRule::Custom,
                            SegmentRule::Grid,
                        ] {
                            ui.selectable_value(&mut d.rule, rule, rule.label());
                        }
                    });
                match d.rule {
                    SegmentRule::Grid => {
                        ui.add(egui::Slider::new(&mut d.grid, 1..=8).text("Grid size"));
                    }
                    SegmentRule::Custom => {
                        let mut color = [
                            d.custom_color[0] as f32 / 255.0,
                            d.custom_color[1] as f32 / 255.0,
                            d.custom_color[2] as f32 / 255.0,
                        ];
                        if ui.color_edit_button_rgb(&mut color).changed() {
                            d.custom_color = [
                                (color[0] * 255.0) as u8,
                                (color[1] * 255.0) as u8,
                                (color[2] * 255.0) as u8,
                            ];
                        }
                        ui.add(egui::Slider::new(&mut d.tolerance, 0.0..=255.0).text("Tolerance"));
                    }
                    _ => {
                        ui.add(egui::Slider::new(&mut d.threshold, 0..=255).text("Threshold"));
                    }
                }
                if d.rule != SegmentRule::Grid {
                    let mut min_size = d.min_size as u32;
                    ui.add(
                        egui::Slider::new(&mut min_size, 1..=10_000)
                            .logarithmic(true)
                            .text("Min region size (px)"),
                    );
                    d.min_size = min_size as u64;
                }
                if ui.button("Run").clicked() {
                    run = true;
                }
            });
        self.segment_dialog.open = open;
        if run {
            self.run_segmentation(ctx);
            self.segment_dialog.open = false;
        }
    }
}

impl eframe::App for FoldApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Photo…").clicked() {
                    self.open_image(ctx);
                }
                if ui.button("Find Faces…").clicked() {
                    self.segment_dialog.open = true;
                }
                ui.separator();
                if ui.button("Save PNG…").clicked() {
                    self.save_page();
                }
                if ui.button("Print…").clicked() {
                    self.print();
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.status);
        });

        egui::SidePanel::left("photo")
            .resizable(true)
            .default_width(PHOTO_MAX_EDGE + 20.0)
            .show(ctx, |ui| {
                self.photo_panel(ui, ctx);
                ui.separator();
                self.selections_panel(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.template_panel(ui, ctx);
        });

        self.segment_window(ctx);
    }
}
