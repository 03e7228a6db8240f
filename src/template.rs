// ============================================================================
// TEMPLATE — fortune-teller sheet geometry, assignments, and compositing
// ============================================================================
//
// The folded sheet has a fixed layout derived purely from its side length:
//
//   - 4 corner squares (side S/4) — the color panels
//   - 8 outer right triangles between the corner squares and the edge
//     midpoints — the number panels
//   - 8 inner triangles splitting the central diamond through the centre —
//     the fortune panels
//
// Each section carries a rotation chosen so its content reads upright once
// the sheet is folded; the table is dictated by the physical fold and must
// not be altered.  Section definitions are a pure function of the size, so
// print rendering just derives a second set at the export resolution and
// never touches live state.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::Arc;

use ab_glyph::FontArc;
use image::{Rgba, RgbaImage};

use crate::ops::text;
use crate::raster;
use crate::selection::{bounds_of, Point};
use crate::session::SelectionRecord;

/// Live preview side length, px.
pub const DEFAULT_SIZE: f32 = 600.0;

/// Print page in pixels (US Letter at 96 dpi) and the template inset on it.
const PRINT_PAGE_W: u32 = 816;
const PRINT_PAGE_H: u32 = 1056;
const PRINT_TEMPLATE_SIZE: f32 = 672.0;

/// Uniform fit of an assigned raster within its section's bounding box.
/// Triangles get more shrinkage — their usable inscribed area is much
/// smaller than their bounding box.
const FIT_FACTOR_SQUARE: f32 = 0.85;
const FIT_FACTOR_TRIANGLE: f32 = 0.5;

/// Corner panel colors + names for the numbers-only sheet.
const CORNER_COLORS: [Rgba<u8>; 4] = [
    Rgba([0xff, 0xeb, 0x3b, 0xff]),
    Rgba([0x4c, 0xaf, 0x50, 0xff]),
    Rgba([0x21, 0x96, 0xf3, 0xff]),
    Rgba([0xf4, 0x43, 0x36, 0xff]),
];
const CORNER_COLOR_NAMES: [&str; 4] = ["Yellow", "Green", "Blue", "Red"];

/// The eight fortunes, one per inner triangle.
const FORTUNES: [&str; 8] = [
    "Great things await.",
    "Many friends ahead.",
    "Success is yours.",
    "Love surrounds you.",
    "Adventure calls.",
    "Wisdom grows.",
    "Joy follows.",
    "Dreams come true.",
];

/// Word-wrap geometry for fortune text (px).
const FORTUNE_FONT_SIZE: f32 = 9.0;
const FORTUNE_MAX_WIDTH: f32 = 50.0;
const FORTUNE_LINE_HEIGHT: f32 = 11.0;
const FORTUNE_FIRST_LINE_Y: f32 = -8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Corner,
    Outer,
    Inner,
}

impl SectionKind {
    /// Placeholder fill for unassigned sections.
    fn placeholder_color(self) -> Rgba<u8> {
        match self {
            SectionKind::Corner => Rgba([0xf0, 0xf0, 0xf0, 0xff]),
            SectionKind::Outer => Rgba([0xf8, 0xf8, 0xf8, 0xff]),
            SectionKind::Inner => Rgba([0xfa, 0xfa, 0xfa, 0xff]),
        }
    }

    fn label_font_size(self) -> f32 {
        match self {
            SectionKind::Corner => 28.0,
            SectionKind::Outer => 32.0,
            SectionKind::Inner => 18.0,
        }
    }

    /// Prefix used in the assignment panel ("Corner A", "Number 5", ...).
    pub fn display_prefix(self) -> &'static str {
        match self {
            SectionKind::Corner => "Corner",
            SectionKind::Outer => "Number",
            SectionKind::Inner => "Fortune",
        }
    }
}

/// Which subset of sections is active and assignable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TemplateMode {
    #[default]
    Both,
    Corners,
    Outer,
    Inner,
    Numbers,
}

impl TemplateMode {
    pub fn all() -> &'static [TemplateMode] {
        &[
            TemplateMode::Both,
            TemplateMode::Corners,
            TemplateMode::Outer,
            TemplateMode::Inner,
            TemplateMode::Numbers,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemplateMode::Both => "Photos everywhere",
            TemplateMode::Corners => "Corner photos only",
            TemplateMode::Outer => "Corner + number photos",
            TemplateMode::Inner => "Fortune photos only",
            TemplateMode::Numbers => "Classic numbers sheet",
        }
    }

    // Mode gating mirrors the assignment panel: corner squares stay visible
    // in Outer mode, outer triangles do not appear in Corners mode.
    fn corners_enabled(self) -> bool {
        matches!(self, TemplateMode::Both | TemplateMode::Corners | TemplateMode::Outer)
    }

    fn outers_enabled(self) -> bool {
        matches!(self, TemplateMode::Both | TemplateMode::Outer)
    }

    fn inners_enabled(self) -> bool {
        matches!(self, TemplateMode::Both | TemplateMode::Inner)
    }
}

/// One foldable region of the sheet.
#[derive(Clone, Debug)]
pub struct Section {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: SectionKind,
    /// Closed polygon in template coordinates.
    pub vertices: Vec<Point>,
    /// Pre-defined label anchor (not the vertex-average centroid).
    pub anchor: Point,
    /// Radians; content reads upright after folding.
    pub rotation: f32,
}

/// Identity + display info for hit-testing and the assignment panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionInfo {
    pub id: &'static str,
    pub label: String,
    pub kind: SectionKind,
}

/// The full fixed layout for one side length, in enumeration order
/// (corners, then outer triangles, then inner triangles).
#[derive(Clone, Debug)]
pub struct SectionSet {
    pub corners: Vec<Section>,
    pub outers: Vec<Section>,
    pub inners: Vec<Section>,
}

impl SectionSet {
    /// Derive the 4 + 8 + 8 sections for a sheet of side `s`.  Pure function
    /// of `s`; recomputed whenever a different resolution is needed.
    pub fn define(s: f32) -> Self {
        let h = s / 2.0; // centre
        let c = s / 4.0; // corner square side
        let p = Point::new;

        let center = p(h, h);

        // Edge midpoints
        let t = p(h, 0.0);
        let b = p(h, s);
        let l = p(0.0, h);
        let r = p(s, h);

        // Inner corners of the corner squares
        let tli = p(c, c);
        let tri = p(s - c, c);
        let bli = p(c, s - c);
        let bri = p(s - c, s - c);

        let corners = vec![
            Section {
                id: "corner1",
                label: "A",
                kind: SectionKind::Corner,
                vertices: vec![p(0.0, 0.0), p(c, 0.0), tli, p(0.0, c)],
                anchor: p(c / 2.0, c / 2.0),
                rotation: PI, // upside down when folded
            },
            Section {
                id: "corner2",
                label: "B",
                kind: SectionKind::Corner,
                vertices: vec![p(s - c, 0.0), p(s, 0.0), p(s, c), tri],
                anchor: p(s - c / 2.0, c / 2.0),
                rotation: PI,
            },
            Section {
                id: "corner3",
                label: "C",
                kind: SectionKind::Corner,
                vertices: vec![p(0.0, s - c), bli, p(c, s), p(0.0, s)],
                anchor: p(c / 2.0, s - c / 2.0),
                rotation: 0.0,
            },
            Section {
                id: "corner4",
                label: "D",
                kind: SectionKind::Corner,
                vertices: vec![bri, p(s, s - c), p(s, s), p(s - c, s)],
                anchor: p(s - c / 2.0, s - c / 2.0),
                rotation: 0.0,
            },
        ];

        // Outer right triangles between corner squares and edge midpoints
        // (not touching the centre).  Numbered for the folded flaps.
        let outers = vec![
            Section {
                id: "outer5",
                label: "5",
                kind: SectionKind::Outer,
                vertices: vec![p(c, 0.0), t, tli],
                anchor: p(c + (h - c) / 3.0, c / 3.0),
                rotation: 0.0,
            },
            Section {
                id: "outer8",
                label: "8",
                kind: SectionKind::Outer,
                vertices: vec![t, p(s - c, 0.0), tri],
                anchor: p(s - c - (h - c) / 3.0, c / 3.0),
                rotation: 0.0,
            },
            Section {
                id: "outer4",
                label: "4",
                kind: SectionKind::Outer,
                vertices: vec![p(0.0, c), tli, l],
                anchor: p(c / 3.0, c + (h - c) / 3.0),
                rotation: FRAC_PI_2,
            },
            Section {
                id: "outer3",
                label: "3",
                kind: SectionKind::Outer,
                vertices: vec![tri, p(s, c), r],
                anchor: p(s - c / 3.0, c + (h - c) / 3.0),
                rotation: -FRAC_PI_2,
            },
            Section {
                id: "outer1",
                label: "1",
                kind: SectionKind::Outer,
                vertices: vec![l, bli, p(0.0, s - c)],
                anchor: p(c / 3.0, s - c - (h - c) / 3.0),
                rotation: FRAC_PI_2,
            },
            Section {
                id: "outer6",
                label: "6",
                kind: SectionKind::Outer,
                vertices: vec![r, p(s, s - c), bri],
                anchor: p(s - c / 3.0, s - c - (h - c) / 3.0),
                rotation: -FRAC_PI_2,
            },
            Section {
                id: "outer2",
                label: "2",
                kind: SectionKind::Outer,
                vertices: vec![bli, p(c, s), b],
                anchor: p(c + (h - c) / 3.0, s - c / 3.0),
                rotation: PI,
            },
            Section {
                id: "outer7",
                label: "7",
                kind: SectionKind::Outer,
                vertices: vec![b, p(s - c, s), bri],
                anchor: p(s - c - (h - c) / 3.0, s - c / 3.0),
                rotation: PI,
            },
        ];

        // Inner triangles: the central diamond (edge midpoints) split into
        // 8 through the centre.
        let inners = vec![
            Section {
                id: "inner1",
                label: "F1",
                kind: SectionKind::Inner,
                vertices: vec![t, center, tli],
                anchor: p(h - (h - c) / 3.0, c + (h - c) / 3.0),
                rotation: -FRAC_PI_4,
            },
            Section {
                id: "inner2",
                label: "F2",
                kind: SectionKind::Inner,
                vertices: vec![t, tri, center],
                anchor: p(h + (h - c) / 3.0, c + (h - c) / 3.0),
                rotation: FRAC_PI_4,
            },
            Section {
                id: "inner3",
                label: "F3",
                kind: SectionKind::Inner,
                vertices: vec![tri, r, center],
                anchor: p(s - c - (h - c) / 3.0, h - (h - c) / 3.0),
                rotation: -FRAC_PI_4,
            },
            Section {
                id: "inner4",
                label: "F4",
                kind: SectionKind::Inner,
                vertices: vec![r, bri, center],
                anchor: p(s - c - (h - c) / 3.0, h + (h - c) / 3.0),
                rotation: FRAC_PI_4,
            },
            Section {
                id: "inner5",
                label: "F5",
                kind: SectionKind::Inner,
                vertices: vec![bri, b, center],
                anchor: p(h + (h - c) / 3.0, s - c - (h - c) / 3.0),
                rotation: -FRAC_PI_4,
            },
            Section {
                id: "inner6",
                label: "F6",
                kind: SectionKind::Inner,
                vertices: vec![b, bli, center],
                anchor: p(h - (h - c) / 3.0, s - c - (h - c) / 3.0),
                rotation: FRAC_PI_4,
            },
            Section {
                id: "inner7",
                label: "F7",
                kind: SectionKind::Inner,
                vertices: vec![bli, l, center],
                anchor: p(c + (h - c) / 3.0, h + (h - c) / 3.0),
                rotation: -FRAC_PI_4,
            },
            Section {
                id: "inner8",
                label: "F8",
                kind: SectionKind::Inner,
                vertices: vec![l, tli, center],
                anchor: p(c + (h - c) / 3.0, h - (h - c) / 3.0),
                rotation: FRAC_PI_4,
            },
        ];

        Self {
            corners,
            outers,
            inners,
        }
    }

    /// All sections in enumeration order.
    pub fn all(&self) -> impl Iterator<Item = &Section> {
        self.corners
            .iter()
            .chain(self.outers.iter())
            .chain(self.inners.iter())
    }

    pub fn find(&self, id: &str) -> Option<&Section> {
        self.all().find(|s| s.id == id)
    }
}

/// Ray-casting point-in-polygon (even-odd).  A point exactly on a horizontal
/// edge may fall either way — an accepted ambiguity of the half-open
/// convention.
fn point_in_polygon(point: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].x, vertices[i].y);
        let (xj, yj) = (vertices[j].x, vertices[j].y);
        if ((yi > point.y) != (yj > point.y))
            && (point.x < (xj - xi) * (point.y - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// The live template: geometry + assignment map + rendered surface.
pub struct FortuneTemplate {
    size: f32,
    mode: TemplateMode,
    sections: SectionSet,
    /// Section id → shared selection record.  Keys are not validated against
    /// the current mode: an assignment to a section the mode hides persists
    /// invisibly and reappears when the mode comes back.
    assignments: HashMap<String, Arc<SelectionRecord>>,
    highlighted: Option<String>,
    font: Option<FontArc>,
    surface: RgbaImage,
}

impl FortuneTemplate {
    pub fn new(font: Option<FontArc>) -> Self {
        let size = DEFAULT_SIZE;
        let mut template = Self {
            size,
            mode: TemplateMode::default(),
            sections: SectionSet::define(size),
            assignments: HashMap::new(),
            highlighted: None,
            font,
            surface: RgbaImage::new(size as u32, size as u32),
        };
        template.render();
        template
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn mode(&self) -> TemplateMode {
        self.mode
    }

    pub fn sections(&self) -> &SectionSet {
        &self.sections
    }

    /// The current rendered sheet.
    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn assignments(&self) -> &HashMap<String, Arc<SelectionRecord>> {
        &self.assignments
    }

    pub fn set_mode(&mut self, mode: TemplateMode) {
        self.mode = mode;
        self.render();
    }

    // ------------------------------------------------------------------
    // Assignment API
    // ------------------------------------------------------------------

    /// Assign a selection record to a section.  Unknown ids are stored
    /// anyway (stale assignments are tolerated, never validated away).
    pub fn set_assignment(&mut self, section_id: &str, record: Arc<SelectionRecord>) {
        self.assignments.insert(section_id.to_string(), record);
        self.render();
    }

    pub fn clear_assignment(&mut self, section_id: &str) {
        self.assignments.remove(section_id);
        self.render();
    }

    pub fn clear_all_assignments(&mut self) {
        self.assignments.clear();
        self.render();
    }

    /// Delete-cascade hook: drop every assignment referencing the given
    /// selection record.  Returns how many entries were removed.
    pub fn remove_assignments_for(&mut self, selection_id: &str) -> usize {
        let before = self.assignments.len();
        self.assignments.retain(|_, rec| rec.id != selection_id);
        let removed = before - self.assignments.len();
        if removed > 0 {
            self.render();
        }
        removed
    }

    /// Sections assignable in the current mode, in enumeration order, with
    /// display labels.  Empty in Numbers mode.
    pub fn available_sections(&self) -> Vec<SectionInfo> {
        let mut out = Vec::new();
        if self.mode == TemplateMode::Numbers {
            return out;
        }
        let mut push_group = |sections: &[Section]| {
            for s in sections {
                out.push(SectionInfo {
                    id: s.id,
                    label: format!("{} {}", s.kind.display_prefix(), s.label),
                    kind: s.kind,
                });
            }
        };
        if self.mode.corners_enabled() {
            push_group(&self.sections.corners);
        }
        if self.mode.outers_enabled() {
            push_group(&self.sections.outers);
        }
        if self.mode.inners_enabled() {
            push_group(&self.sections.inners);
        }
        out
    }

    // ------------------------------------------------------------------
    // Hit testing + highlight
    // ------------------------------------------------------------------

    /// First enabled section containing the point, in enumeration order.
    pub fn locate_section(&self, x: f32, y: f32) -> Option<SectionInfo> {
        let point = Point::new(x, y);
        let mut candidates: Vec<&Section> = Vec::new();
        if self.mode.corners_enabled() {
            candidates.extend(self.sections.corners.iter());
        }
        if self.mode.outers_enabled() {
            candidates.extend(self.sections.outers.iter());
        }
        if self.mode.inners_enabled() {
            candidates.extend(self.sections.inners.iter());
        }
        candidates
            .into_iter()
            .find(|s| point_in_polygon(point, &s.vertices))
            .map(|s| SectionInfo {
                id: s.id,
                label: format!("{} {}", s.kind.display_prefix(), s.label),
                kind: s.kind,
            })
    }

    /// Drag-over feedback: highlight the section under the pointer, if any.
    /// Returns whether the surface was re-rendered.
    pub fn highlight_section_at(&mut self, x: f32, y: f32) -> bool {
        let hit = self.locate_section(x, y).map(|s| s.id.to_string());
        if hit != self.highlighted {
            self.highlighted = hit;
            self.render();
            return true;
        }
        false
    }

    /// Returns whether a highlight was actually cleared.
    pub fn clear_highlight(&mut self) -> bool {
        if self.highlighted.take().is_some() {
            self.render();
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Redraw the full sheet into the internal surface.
    pub fn render(&mut self) {
        Self::render_into(
            &mut self.surface,
            &self.sections,
            self.size,
            self.mode,
            &self.assignments,
            self.font.as_ref(),
            self.highlighted.as_deref(),
        );
    }

    /// Compose the print page: the template re-derived at print resolution,
    /// rendered offscreen and centred on a white US-Letter-sized raster.
    /// Live geometry and state are untouched.
    pub fn render_for_print(&self) -> RgbaImage {
        let mut page =
            RgbaImage::from_pixel(PRINT_PAGE_W, PRINT_PAGE_H, Rgba([255, 255, 255, 255]));

        let print_sections = SectionSet::define(PRINT_TEMPLATE_SIZE);
        let mut sheet = RgbaImage::new(
            PRINT_TEMPLATE_SIZE as u32,
            PRINT_TEMPLATE_SIZE as u32,
        );
        Self::render_into(
            &mut sheet,
            &print_sections,
            PRINT_TEMPLATE_SIZE,
            self.mode,
            &self.assignments,
            self.font.as_ref(),
            None,
        );

        let offset_x = (PRINT_PAGE_W - sheet.width()) / 2;
        let offset_y = (PRINT_PAGE_H - sheet.height()) / 2;
        raster::blit(&mut page, &sheet, offset_x as i32, offset_y as i32);
        page
    }

    fn render_into(
        surface: &mut RgbaImage,
        sections: &SectionSet,
        size: f32,
        mode: TemplateMode,
        assignments: &HashMap<String, Arc<SelectionRecord>>,
        font: Option<&FontArc>,
        highlighted: Option<&str>,
    ) {
        raster::fill(surface, Rgba([255, 255, 255, 255]));

        if mode == TemplateMode::Numbers {
            Self::render_numbers_sheet(surface, sections, font);
        } else {
            if mode.corners_enabled() {
                for s in &sections.corners {
                    Self::render_section(surface, s, assignments, font);
                }
            }
            if mode.outers_enabled() {
                for s in &sections.outers {
                    Self::render_section(surface, s, assignments, font);
                }
            }
            if mode.inners_enabled() {
                for s in &sections.inners {
                    Self::render_section(surface, s, assignments, font);
                }
            }
        }

        Self::draw_fold_lines(surface, size);

        if let Some(id) = highlighted {
            if let Some(s) = sections.find(id) {
                raster::fill_polygon(surface, &s.vertices, Rgba([74, 105, 189, 77]));
                raster::stroke_path(
                    surface,
                    &s.vertices,
                    true,
                    3.0,
                    Rgba([0x4a, 0x69, 0xbd, 0xff]),
                    None,
                );
            }
        }
    }

    /// One section: either the assigned raster clipped, scaled, and rotated
    /// into place, or the placeholder fill with a rotated label.
    fn render_section(
        surface: &mut RgbaImage,
        section: &Section,
        assignments: &HashMap<String, Arc<SelectionRecord>>,
        font: Option<&FontArc>,
    ) {
        if let Some(record) = assignments.get(section.id) {
            if record.raster.width() > 0 && record.raster.height() > 0 {
                let mask =
                    raster::polygon_mask(surface.width(), surface.height(), &section.vertices);
                let region = raster::polygon_pixel_bounds(
                    surface.width(),
                    surface.height(),
                    &section.vertices,
                );
                // Vertex-average centroid centres the content better than the
                // bounding-box middle for the triangles.
                let n = section.vertices.len() as f32;
                let centroid_x = section.vertices.iter().map(|v| v.x).sum::<f32>() / n;
                let centroid_y = section.vertices.iter().map(|v| v.y).sum::<f32>() / n;

                if let Some(b) = bounds_of(&section.vertices) {
                    let fit = match section.kind {
                        SectionKind::Corner => FIT_FACTOR_SQUARE,
                        _ => FIT_FACTOR_TRIANGLE,
                    };
                    let scale = (b.width / record.raster.width() as f32)
                        .min(b.height / record.raster.height() as f32)
                        * fit;

                    raster::draw_image_transformed(
                        surface,
                        &record.raster,
                        (centroid_x, centroid_y),
                        section.rotation,
                        scale,
                        Some(&mask),
                        region,
                    );
                    return;
                }
            }
        }

        raster::fill_polygon(surface, &section.vertices, section.kind.placeholder_color());
        if let Some(font) = font {
            let font_size = section.kind.label_font_size();
            let block = text::rasterize_lines(
                font,
                &[section.label.to_string()],
                font_size,
                font_size * 1.2,
                Rgba([0xbb, 0xbb, 0xbb, 0xff]),
            );
            text::draw_text_block(surface, &block, section.anchor, section.rotation, (0.0, 0.0));
        }
    }

    /// The classic sheet: colored corners, numbered flaps, written fortunes.
    fn render_numbers_sheet(
        surface: &mut RgbaImage,
        sections: &SectionSet,
        font: Option<&FontArc>,
    ) {
        for (i, s) in sections.corners.iter().enumerate() {
            raster::fill_polygon(surface, &s.vertices, CORNER_COLORS[i]);
            if let Some(font) = font {
                let block = text::rasterize_lines(
                    font,
                    &[CORNER_COLOR_NAMES[i].to_string()],
                    18.0,
                    22.0,
                    Rgba([0, 0, 0, 255]),
                );
                text::draw_text_block(surface, &block, s.anchor, s.rotation, (0.0, 0.0));
            }
        }

        for s in &sections.outers {
            raster::fill_polygon(surface, &s.vertices, Rgba([255, 255, 255, 255]));
            if let Some(font) = font {
                let block = text::rasterize_lines(
                    font,
                    &[s.label.to_string()],
                    36.0,
                    43.0,
                    Rgba([0x33, 0x33, 0x33, 0xff]),
                );
                text::draw_text_block(surface, &block, s.anchor, s.rotation, (0.0, 0.0));
            }
        }

        for (i, s) in sections.inners.iter().enumerate() {
            raster::fill_polygon(surface, &s.vertices, Rgba([255, 255, 255, 255]));
            if let Some(font) = font {
                let lines = text::wrap_text(
                    |candidate| text::measure_line(font, candidate, FORTUNE_FONT_SIZE),
                    FORTUNE_MAX_WIDTH,
                    FORTUNES[i],
                );
                let block = text::rasterize_lines(
                    font,
                    &lines,
                    FORTUNE_FONT_SIZE,
                    FORTUNE_LINE_HEIGHT,
                    Rgba([0x66, 0x66, 0x66, 0xff]),
                );
                // First line sits above the anchor; later lines advance down.
                let offset_y = FORTUNE_FIRST_LINE_Y
                    + (lines.len() as f32 - 1.0) * FORTUNE_LINE_HEIGHT * 0.5;
                let offset = (0.0, offset_y);
                text::draw_text_block(surface, &block, s.anchor, s.rotation, offset);
            }
        }
    }

    /// Cut/fold overlay: dashed border and centre cross, solid corner-square
    /// boundaries, solid spokes from the centre to the edge midpoints and to
    /// each corner square's inner corner.
    fn draw_fold_lines(surface: &mut RgbaImage, s: f32) {
        let h = s / 2.0;
        let c = s / 4.0;
        let p = Point::new;
        let dashed = Some([8.0, 4.0]);
        let gray = Rgba([0x66, 0x66, 0x66, 0xff]);
        let dark = Rgba([0x33, 0x33, 0x33, 0xff]);

        // Fold lines (dashed)
        raster::stroke_rect(surface, 1.0, 1.0, s - 2.0, s - 2.0, 1.0, gray, dashed);
        raster::stroke_line(surface, p(0.0, h), p(s, h), 1.0, gray, dashed);
        raster::stroke_line(surface, p(h, 0.0), p(h, s), 1.0, gray, dashed);

        // Corner square boundaries (solid L-shapes)
        raster::stroke_path(surface, &[p(c, 0.0), p(c, c), p(0.0, c)], false, 1.5, dark, None);
        raster::stroke_path(
            surface,
            &[p(s - c, 0.0), p(s - c, c), p(s, c)],
            false,
            1.5,
            dark,
            None,
        );
        raster::stroke_path(
            surface,
            &[p(0.0, s - c), p(c, s - c), p(c, s)],
            false,
            1.5,
            dark,
            None,
        );
        raster::stroke_path(
            surface,
            &[p(s, s - c), p(s - c, s - c), p(s - c, s)],
            false,
            1.5,
            dark,
            None,
        );

        // Spokes: centre to edge midpoints, centre to inner corners
        let centre = p(h, h);
        for target in [
            p(h, 0.0),
            p(h, s),
            p(0.0, h),
            p(s, h),
            p(c, c),
            p(s - c, c),
            p(c, s - c),
            p(s - c, s - c),
        ] {
            raster::stroke_line(surface, centre, target, 1.5, dark, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;
    use approx::assert_relative_eq;

    fn record_with_color(color: Rgba<u8>) -> Arc<SelectionRecord> {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        Arc::new(SelectionRecord {
            id: "rec_test".to_string(),
            name: "Selection 1".to_string(),
            source_image_id: "img".to_string(),
            selection: Selection {
                bounds: bounds_of(&points).unwrap(),
                points,
            },
            raster: RgbaImage::from_pixel(10, 10, color),
        })
    }

    // Independent reference for the consistency check.
    fn reference_inside(p: Point, vertices: &[Point]) -> bool {
        let mut crossings = 0;
        let n = vertices.len();
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            if (a.y <= p.y) != (b.y <= p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if x > p.x {
                    crossings += 1;
                }
            }
        }
        crossings % 2 == 1
    }

    fn centroid(vertices: &[Point]) -> Point {
        let n = vertices.len() as f32;
        Point::new(
            vertices.iter().map(|v| v.x).sum::<f32>() / n,
            vertices.iter().map(|v| v.y).sum::<f32>() / n,
        )
    }

    #[test]
    fn define_produces_4_8_8_sections() {
        let set = SectionSet::define(600.0);
        assert_eq!(set.corners.len(), 4);
        assert_eq!(set.outers.len(), 8);
        assert_eq!(set.inners.len(), 8);
        // Every vertex within the sheet.
        for s in set.all() {
            for v in &s.vertices {
                assert!(v.x >= 0.0 && v.x <= 600.0);
                assert!(v.y >= 0.0 && v.y <= 600.0);
            }
        }
    }

    #[test]
    fn rotation_table_matches_the_fold() {
        let set = SectionSet::define(600.0);
        let rot = |id: &str| set.find(id).unwrap().rotation;
        assert_relative_eq!(rot("corner1"), PI);
        assert_relative_eq!(rot("corner2"), PI);
        assert_relative_eq!(rot("corner3"), 0.0);
        assert_relative_eq!(rot("corner4"), 0.0);
        assert_relative_eq!(rot("outer5"), 0.0);
        assert_relative_eq!(rot("outer4"), FRAC_PI_2);
        assert_relative_eq!(rot("outer3"), -FRAC_PI_2);
        assert_relative_eq!(rot("outer2"), PI);
        assert_relative_eq!(rot("inner1"), -FRAC_PI_4);
        assert_relative_eq!(rot("inner2"), FRAC_PI_4);
        assert_relative_eq!(rot("inner8"), FRAC_PI_4);
    }

    #[test]
    fn anchors_follow_the_layout_derivation() {
        // s=600: h=300, c=150, (h-c)/3 = 50.
        let set = SectionSet::define(600.0);
        let anchor = |id: &str| set.find(id).unwrap().anchor;
        assert_eq!(anchor("corner1"), Point::new(75.0, 75.0));
        assert_eq!(anchor("outer5"), Point::new(200.0, 50.0));
        assert_eq!(anchor("outer3"), Point::new(550.0, 200.0));
        assert_eq!(anchor("inner1"), Point::new(250.0, 200.0));
        assert_eq!(anchor("inner4"), Point::new(400.0, 350.0));
    }

    #[test]
    fn locate_section_agrees_with_reference_in_every_mode() {
        for &mode in TemplateMode::all() {
            let mut template = FortuneTemplate::new(None);
            template.set_mode(mode);
            for info in template.available_sections() {
                let section = template.sections().find(info.id).unwrap();
                let c = centroid(&section.vertices);
                // Sanity: the centroid of a convex section is inside it.
                assert!(reference_inside(c, &section.vertices));
                let hit = template.locate_section(c.x, c.y).expect("centroid hits");
                assert_eq!(hit.id, info.id, "mode {:?}", mode);
            }
        }
    }

    #[test]
    fn disabled_sections_are_not_hit() {
        let mut template = FortuneTemplate::new(None);
        template.set_mode(TemplateMode::Corners);
        // Centroid of inner1 — inners are disabled in Corners mode and the
        // point lies in no corner square.
        let inner1 = SectionSet::define(600.0).find("inner1").unwrap().clone();
        let c = centroid(&inner1.vertices);
        assert!(template.locate_section(c.x, c.y).is_none());
        // Numbers mode hit-tests nothing at all.
        template.set_mode(TemplateMode::Numbers);
        assert!(template.locate_section(75.0, 75.0).is_none());
    }

    #[test]
    fn available_sections_per_mode() {
        let mut template = FortuneTemplate::new(None);
        assert_eq!(template.available_sections().len(), 20);
        assert_eq!(template.available_sections()[0].label, "Corner A");
        assert_eq!(template.available_sections()[4].label, "Number 5");
        assert_eq!(template.available_sections()[12].label, "Fortune F1");

        template.set_mode(TemplateMode::Corners);
        assert_eq!(template.available_sections().len(), 4);
        template.set_mode(TemplateMode::Outer);
        assert_eq!(template.available_sections().len(), 12);
        template.set_mode(TemplateMode::Inner);
        assert_eq!(template.available_sections().len(), 8);
        template.set_mode(TemplateMode::Numbers);
        assert!(template.available_sections().is_empty());
    }

    #[test]
    fn assignment_round_trip_leaves_no_residue() {
        let mut template = FortuneTemplate::new(None);
        let record = record_with_color(Rgba([255, 0, 0, 255]));
        template.set_assignment("corner1", record);
        assert_eq!(template.assignments().len(), 1);
        template.clear_assignment("corner1");
        assert!(template.assignments().is_empty());
    }

    #[test]
    fn unknown_section_ids_are_stored_without_validation() {
        let mut template = FortuneTemplate::new(None);
        template.set_assignment("no_such_section", record_with_color(Rgba([1, 2, 3, 255])));
        assert!(template.assignments().contains_key("no_such_section"));
        // Renderable sections are unaffected; render() must not panic.
        assert_eq!(template.available_sections().len(), 20);
    }

    #[test]
    fn stale_assignments_survive_mode_switches() {
        let mut template = FortuneTemplate::new(None);
        template.set_assignment("inner1", record_with_color(Rgba([0, 255, 0, 255])));
        template.set_mode(TemplateMode::Corners); // inner1 now hidden
        assert!(template.assignments().contains_key("inner1"));
        template.set_mode(TemplateMode::Both); // and it comes back
        assert!(template.assignments().contains_key("inner1"));
    }

    #[test]
    fn delete_cascade_removes_all_references() {
        let mut template = FortuneTemplate::new(None);
        let record = record_with_color(Rgba([9, 9, 9, 255]));
        template.set_assignment("corner1", record.clone());
        template.set_assignment("outer5", record.clone());
        template.set_assignment("inner3", record);
        assert_eq!(template.remove_assignments_for("rec_test"), 3);
        assert!(template.assignments().is_empty());
        assert_eq!(template.remove_assignments_for("rec_test"), 0);
    }

    #[test]
    fn assigned_raster_shows_at_the_section_centroid() {
        let mut template = FortuneTemplate::new(None);
        template.set_assignment("corner1", record_with_color(Rgba([255, 0, 0, 255])));
        // corner1 centroid is (75, 75); the scaled 10×10 red raster covers it.
        let px = template.surface().get_pixel(75, 75);
        assert_eq!(px.0[0], 255);
        assert_eq!(px.0[1], 0);
        // Outside the sheet's sections but inside the surface: still white-ish
        // placeholder territory, not red.
        let other = template.surface().get_pixel(300, 80);
        assert_ne!(other.0, [255, 0, 0, 255]);
    }

    #[test]
    fn compositing_stays_inside_the_clip_polygon() {
        let mut template = FortuneTemplate::new(None);
        template.set_assignment("inner1", record_with_color(Rgba([0, 0, 255, 255])));
        // inner1 is the triangle (300,0)-(300,300)-(150,150); a point near
        // it but outside must stay untouched:
        let outside = template.surface().get_pixel(400, 150);
        assert_ne!(outside.0, [0, 0, 255, 255]);
        // And the centroid of inner1 is blue.
        let c = centroid(&SectionSet::define(600.0).find("inner1").unwrap().vertices);
        let inside = template.surface().get_pixel(c.x as u32, c.y as u32);
        assert_eq!(inside.0[2], 255);
    }

    #[test]
    fn print_render_is_letter_sized_and_leaves_live_state_alone() {
        let mut template = FortuneTemplate::new(None);
        template.set_assignment("corner1", record_with_color(Rgba([255, 0, 0, 255])));
        let before = template.surface().clone();
        let before_size = template.size();

        let page = template.render_for_print();
        assert_eq!(page.dimensions(), (816, 1056));
        // Margins are white.
        assert_eq!(page.get_pixel(10, 10).0, [255, 255, 255, 255]);
        // The sheet occupies the centred 672×672 inset; corner1's centroid
        // maps to (72 + 84, 192 + 84) at print scale.
        let px = page.get_pixel(72 + 84, 192 + 84);
        assert_eq!(px.0[0], 255);
        assert_eq!(px.0[1], 0);

        // Live state byte-identical.
        assert_eq!(template.size(), before_size);
        assert_eq!(template.surface().as_raw(), before.as_raw());
        assert_eq!(template.assignments().len(), 1);
    }

    #[test]
    fn numbers_mode_fills_corners_with_fixed_colors() {
        let mut template = FortuneTemplate::new(None);
        template.set_mode(TemplateMode::Numbers);
        let surface = template.surface();
        // corner1 anchor (75,75) → yellow; corner2 anchor (525,75) → green.
        assert_eq!(surface.get_pixel(75, 75).0, [0xff, 0xeb, 0x3b, 0xff]);
        assert_eq!(surface.get_pixel(525, 75).0, [0x4c, 0xaf, 0x50, 0xff]);
        assert_eq!(surface.get_pixel(75, 525).0, [0x21, 0x96, 0xf3, 0xff]);
        assert_eq!(surface.get_pixel(525, 525).0, [0xf4, 0x43, 0x36, 0xff]);
    }

    #[test]
    fn highlight_draws_and_clears() {
        let mut template = FortuneTemplate::new(None);
        let plain = template.surface().clone();
        template.highlight_section_at(75.0, 75.0);
        assert_ne!(template.surface().as_raw(), plain.as_raw());
        template.clear_highlight();
        assert_eq!(template.surface().as_raw(), plain.as_raw());
    }
}
