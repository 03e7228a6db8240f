// ============================================================================
// SELECTION — free-form polygon capture + clipped region extraction
// ============================================================================
//
// The selector is a small state machine fed by pointer events that the GUI
// (or a test) translates into calls: clicks append vertices, a click near the
// first vertex auto-closes, right-click undoes the last vertex, double-click
// finishes.  Completed selections are reported through the completion
// callback and returned to the caller; extraction itself is a pure function
// over a source raster and a `Selection`.

use image::{imageops, Rgba, RgbaImage};

use crate::error::FoldError;
use crate::raster;

/// Pixels within which a click on the first vertex closes the polygon.
pub const CLOSE_THRESHOLD: f32 = 15.0;

/// Opaque backdrop behind thumbnails so transparent cut-out areas stay visible.
const THUMB_BACKGROUND: Rgba<u8> = Rgba([0x2d, 0x3a, 0x5a, 0xff]);

/// A point in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Tight axis-aligned rectangle around a polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A captured polygon region plus its bounding box.  Coordinates are in
/// source-image pixel space by the time a selection reaches extraction; the
/// display→image scale conversion is the caller's job.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub points: Vec<Point>,
    pub bounds: BoundingBox,
}

/// Tight bounding box over a point set.  Order-independent; `None` when empty.
pub fn bounds_of(points: &[Point]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x;
    let mut max_y = first.y;
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

type CompleteCallback = Box<dyn FnMut(&Selection)>;
type CancelCallback = Box<dyn FnMut()>;

/// Interactive polygon capture: Idle → Drawing → Idle (finish or cancel).
#[derive(Default)]
pub struct PolygonSelector {
    drawing: bool,
    points: Vec<Point>,
    live_point: Option<Point>,
    on_complete: Option<CompleteCallback>,
    on_cancel: Option<CancelCallback>,
}

impl PolygonSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Vertices placed so far (in display coordinates while drawing).
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Last tracked pointer position, if drawing.
    pub fn live_point(&self) -> Option<Point> {
        self.live_point
    }

    /// Register the completion observer, invoked once per finished selection.
    pub fn on_complete(&mut self, cb: impl FnMut(&Selection) + 'static) {
        self.on_complete = Some(Box::new(cb));
    }

    /// Register the cancellation observer.
    pub fn on_cancel(&mut self, cb: impl FnMut() + 'static) {
        self.on_cancel = Some(Box::new(cb));
    }

    /// Enter Drawing, discarding any leftover points.
    pub fn start(&mut self) {
        self.drawing = true;
        self.points.clear();
        self.live_point = None;
    }

    /// Discard in-progress points and return to Idle.
    pub fn cancel(&mut self) {
        self.drawing = false;
        self.points.clear();
        self.live_point = None;
        if let Some(mut cb) = self.on_cancel.take() {
            cb();
            self.on_cancel = Some(cb);
        }
    }

    /// Reset without notifying observers (e.g. when switching source images).
    pub fn clear(&mut self) {
        self.drawing = false;
        self.points.clear();
        self.live_point = None;
    }

    /// Track the pointer for the live preview edge and proximity ring.
    pub fn set_live_point(&mut self, x: f32, y: f32) {
        if self.drawing {
            self.live_point = Some(Point::new(x, y));
        }
    }

    /// Primary click: appends a vertex, or — when at least 3 vertices exist
    /// and the click lands within the close threshold of the first vertex —
    /// finishes the selection instead.
    pub fn handle_click(&mut self, x: f32, y: f32) -> Result<Option<Selection>, FoldError> {
        if !self.drawing {
            return Ok(None);
        }
        let p = Point::new(x, y);
        if self.points.len() >= 3 {
            if let Some(first) = self.points.first() {
                if p.distance(*first) < CLOSE_THRESHOLD {
                    return self.finish().map(Some);
                }
            }
        }
        self.points.push(p);
        Ok(None)
    }

    /// Double-click: the first click of the pair already appended a spurious
    /// vertex, so drop it before finishing.
    pub fn handle_double_click(&mut self) -> Result<Option<Selection>, FoldError> {
        if !self.drawing || self.points.len() < 3 {
            return Ok(None);
        }
        self.points.pop();
        self.finish().map(Some)
    }

    /// Secondary click: undo the most recently placed vertex (no-op if none).
    pub fn undo_point(&mut self) {
        if self.drawing {
            self.points.pop();
        }
    }

    /// Complete the selection.  Fails with `InsufficientPoints` (state
    /// unchanged) below 3 vertices; otherwise emits through the completion
    /// callback, resets to Idle, and returns the selection.
    pub fn finish(&mut self) -> Result<Selection, FoldError> {
        if self.points.len() < 3 {
            return Err(FoldError::InsufficientPoints(self.points.len()));
        }
        let points = std::mem::take(&mut self.points);
        // A non-empty point set always has a bounding box.
        let bounds = bounds_of(&points).unwrap_or(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        });
        let selection = Selection { points, bounds };
        self.drawing = false;
        self.live_point = None;
        if let Some(mut cb) = self.on_complete.take() {
            cb(&selection);
            self.on_complete = Some(cb);
        }
        Ok(selection)
    }

    /// Paint the in-progress polygon preview onto `img`: translucent fill,
    /// stroked outline extended to the live pointer, vertex dots (first one
    /// larger and red), and a proximity ring when the pointer is close enough
    /// to the first vertex to auto-close.
    pub fn draw_overlay(&self, img: &mut RgbaImage) {
        if self.points.is_empty() {
            return;
        }

        let mut path = self.points.clone();
        if self.drawing {
            if let Some(live) = self.live_point {
                path.push(live);
            }
        }
        raster::fill_polygon(img, &path, Rgba([74, 105, 189, 77]));
        raster::stroke_path(img, &path, true, 2.0, Rgba([0x4a, 0x69, 0xbd, 0xff]), None);

        for (i, p) in self.points.iter().enumerate() {
            let (radius, color) = if i == 0 {
                (8.0, Rgba([0xe7, 0x4c, 0x3c, 0xff]))
            } else {
                (5.0, Rgba([0x4a, 0x69, 0xbd, 0xff]))
            };
            raster::fill_circle(img, p.x, p.y, radius, color);
            raster::stroke_circle(img, p.x, p.y, radius, 2.0, Rgba([255, 255, 255, 255]));
        }

        if self.drawing && self.points.len() >= 3 {
            if let (Some(live), Some(first)) = (self.live_point, self.points.first()) {
                if live.distance(*first) < CLOSE_THRESHOLD {
                    raster::stroke_circle(
                        img,
                        first.x,
                        first.y,
                        CLOSE_THRESHOLD,
                        2.0,
                        Rgba([231, 76, 60, 128]),
                    );
                }
            }
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract the selected region from `source` as a raster of exactly
/// `ceil(bounds.width) × ceil(bounds.height)` pixels.  The polygon is
/// translated into raster-local coordinates and used as a clip: pixels
/// inside it are copied from the source's bounds sub-rectangle, everything
/// else stays fully transparent.  Pure function of its inputs; the segmenter
/// and thumbnail paths reuse it unchanged.
pub fn extract_selection(source: &RgbaImage, selection: &Selection) -> RgbaImage {
    let out_w = selection.bounds.width.ceil().max(0.0) as u32;
    let out_h = selection.bounds.height.ceil().max(0.0) as u32;
    let mut out = RgbaImage::new(out_w, out_h);
    if out_w == 0 || out_h == 0 {
        return out;
    }

    let relative: Vec<Point> = selection
        .points
        .iter()
        .map(|p| Point::new(p.x - selection.bounds.x, p.y - selection.bounds.y))
        .collect();
    let mask = raster::polygon_mask(out_w, out_h, &relative);

    let off_x = selection.bounds.x.floor() as i64;
    let off_y = selection.bounds.y.floor() as i64;
    for (x, y, m) in mask.enumerate_pixels() {
        if m.0[0] == 0 {
            continue;
        }
        let sx = off_x + x as i64;
        let sy = off_y + y as i64;
        if sx < 0 || sy < 0 || sx >= source.width() as i64 || sy >= source.height() as i64 {
            continue;
        }
        out.put_pixel(x, y, *source.get_pixel(sx as u32, sy as u32));
    }
    out
}

/// Square preview thumbnail: extract, aspect-fit into `size × size`, centred
/// over an opaque backdrop.
pub fn create_thumbnail(source: &RgbaImage, selection: &Selection, size: u32) -> RgbaImage {
    let extracted = extract_selection(source, selection);
    thumbnail_of(&extracted, size)
}

/// Aspect-fit an already-extracted raster into a `size × size` thumbnail.
pub fn thumbnail_of(extracted: &RgbaImage, size: u32) -> RgbaImage {
    let mut thumb = RgbaImage::from_pixel(size, size, THUMB_BACKGROUND);
    if extracted.width() == 0 || extracted.height() == 0 || size == 0 {
        return thumb;
    }
    let scale = (size as f32 / extracted.width() as f32)
        .min(size as f32 / extracted.height() as f32);
    let w = ((extracted.width() as f32 * scale).round() as u32).max(1);
    let h = ((extracted.height() as f32 * scale).round() as u32).max(1);
    let scaled = imageops::resize(extracted, w, h, imageops::FilterType::Triangle);
    raster::blit(
        &mut thumb,
        &scaled,
        ((size - w) / 2) as i32,
        ((size - h) / 2) as i32,
    );
    thumb
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn checker_source(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbaImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x % 256) as u8, (y % 256) as u8, 7, 255]);
        }
        img
    }

    #[test]
    fn bounds_are_order_independent_and_tight() {
        let pts = vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 10.0),
            Point::new(30.0, 50.0),
        ];
        let mut shuffled = pts.clone();
        shuffled.rotate_left(2);
        let a = bounds_of(&pts).unwrap();
        let b = bounds_of(&shuffled).unwrap();
        assert_eq!(a, b);
        assert_relative_eq!(a.x, 10.0);
        assert_relative_eq!(a.y, 10.0);
        assert_relative_eq!(a.width, 40.0);
        assert_relative_eq!(a.height, 40.0);
    }

    #[test]
    fn finishing_a_triangle_emits_the_expected_selection() {
        let mut sel = PolygonSelector::new();
        sel.start();
        sel.handle_click(10.0, 10.0).unwrap();
        sel.handle_click(50.0, 10.0).unwrap();
        sel.handle_click(30.0, 50.0).unwrap();
        let out = sel.finish().unwrap();
        assert_eq!(out.points.len(), 3);
        assert_relative_eq!(out.bounds.x, 10.0);
        assert_relative_eq!(out.bounds.y, 10.0);
        assert_relative_eq!(out.bounds.width, 40.0);
        assert_relative_eq!(out.bounds.height, 40.0);
        assert!(!sel.is_drawing());
        assert!(sel.points().is_empty());
    }

    #[test]
    fn finish_below_three_points_fails_and_keeps_state() {
        let mut sel = PolygonSelector::new();
        sel.start();
        sel.handle_click(1.0, 1.0).unwrap();
        sel.handle_click(9.0, 1.0).unwrap();
        assert_eq!(sel.finish(), Err(FoldError::InsufficientPoints(2)));
        assert!(sel.is_drawing());
        assert_eq!(sel.points().len(), 2);
    }

    #[test]
    fn click_near_first_point_auto_closes() {
        let mut sel = PolygonSelector::new();
        sel.start();
        sel.handle_click(100.0, 100.0).unwrap();
        sel.handle_click(200.0, 100.0).unwrap();
        sel.handle_click(150.0, 200.0).unwrap();
        // Within CLOSE_THRESHOLD of the first vertex → finish, not append.
        let done = sel.handle_click(105.0, 104.0).unwrap();
        let selection = done.expect("selection should close");
        assert_eq!(selection.points.len(), 3);
        assert!(!sel.is_drawing());
    }

    #[test]
    fn double_click_discards_the_spurious_vertex() {
        let mut sel = PolygonSelector::new();
        sel.start();
        sel.handle_click(0.0, 0.0).unwrap();
        sel.handle_click(40.0, 0.0).unwrap();
        sel.handle_click(40.0, 40.0).unwrap();
        // First click of the double-click pair lands as a 4th vertex.
        sel.handle_click(20.0, 60.0).unwrap();
        let selection = sel.handle_double_click().unwrap().unwrap();
        assert_eq!(selection.points.len(), 3);
    }

    #[test]
    fn undo_removes_last_point_and_cancel_resets() {
        let mut sel = PolygonSelector::new();
        sel.start();
        sel.handle_click(1.0, 2.0).unwrap();
        sel.handle_click(3.0, 4.0).unwrap();
        sel.undo_point();
        assert_eq!(sel.points().len(), 1);
        sel.undo_point();
        sel.undo_point(); // no-op on empty
        assert!(sel.points().is_empty());
        sel.cancel();
        assert!(!sel.is_drawing());
    }

    #[test]
    fn stray_undo_costs_one_vertex_and_drawing_continues() {
        let mut sel = PolygonSelector::new();
        sel.start();
        for (x, y) in [(0.0, 0.0), (60.0, 0.0), (60.0, 60.0), (30.0, 90.0), (0.0, 60.0)] {
            sel.handle_click(x, y).unwrap();
        }
        sel.undo_point();
        assert!(sel.is_drawing());
        assert_eq!(sel.points().len(), 4);
        // The remaining polygon is still finishable.
        let selection = sel.finish().unwrap();
        assert_eq!(selection.points.len(), 4);
        assert_eq!(selection.points[3], Point::new(30.0, 90.0));
    }

    #[test]
    fn completion_callback_fires_once_per_finish() {
        use std::cell::Cell;
        use std::rc::Rc;
        let hits = Rc::new(Cell::new(0usize));
        let hits2 = hits.clone();
        let mut sel = PolygonSelector::new();
        sel.on_complete(move |_| hits2.set(hits2.get() + 1));
        sel.start();
        sel.handle_click(0.0, 0.0).unwrap();
        sel.handle_click(10.0, 0.0).unwrap();
        sel.handle_click(0.0, 10.0).unwrap();
        sel.finish().unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn extraction_sizes_output_to_ceiled_bounds() {
        let source = checker_source(100, 100);
        let points = vec![
            Point::new(10.0, 10.0),
            Point::new(50.5, 10.0),
            Point::new(30.0, 49.2),
        ];
        let selection = Selection {
            bounds: bounds_of(&points).unwrap(),
            points,
        };
        let out = extract_selection(&source, &selection);
        assert_eq!(out.width(), 41); // ceil(40.5)
        assert_eq!(out.height(), 40); // ceil(39.2)
    }

    #[test]
    fn extraction_clips_outside_polygon_to_transparent() {
        let source = checker_source(64, 64);
        // Triangle inside a 20×20 box — corners of the box are outside it.
        let points = vec![
            Point::new(10.0, 10.0),
            Point::new(30.0, 10.0),
            Point::new(20.0, 30.0),
        ];
        let selection = Selection {
            bounds: bounds_of(&points).unwrap(),
            points,
        };
        let out = extract_selection(&source, &selection);
        // Bottom corners of the output are outside the triangle.
        assert_eq!(out.get_pixel(0, 19).0[3], 0);
        assert_eq!(out.get_pixel(19, 19).0[3], 0);
        // Top-centre is inside and copied from the source.
        let inside = out.get_pixel(10, 1);
        assert_eq!(*inside, *source.get_pixel(20, 11));
    }

    #[test]
    fn rectangular_selection_copies_source_verbatim() {
        let source = checker_source(40, 40);
        let points = vec![
            Point::new(5.0, 8.0),
            Point::new(25.0, 8.0),
            Point::new(25.0, 20.0),
            Point::new(5.0, 20.0),
        ];
        let selection = Selection {
            bounds: bounds_of(&points).unwrap(),
            points,
        };
        let out = extract_selection(&source, &selection);
        assert_eq!(out.dimensions(), (20, 12));
        for y in 0..12 {
            for x in 0..20 {
                assert_eq!(*out.get_pixel(x, y), *source.get_pixel(x + 5, y + 8));
            }
        }
    }

    #[test]
    fn overlay_marks_first_vertex_red_and_fills_the_preview() {
        let mut sel = PolygonSelector::new();
        sel.start();
        sel.handle_click(10.0, 10.0).unwrap();
        sel.handle_click(40.0, 10.0).unwrap();
        sel.handle_click(25.0, 40.0).unwrap();
        sel.set_live_point(25.0, 40.0);

        let mut img = RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255]));
        let before = img.clone();
        sel.draw_overlay(&mut img);
        assert_ne!(img.as_raw(), before.as_raw());
        // First-vertex dot is red-dominant, later dots blue-dominant.
        let first = img.get_pixel(10, 10);
        assert!(first.0[0] > first.0[2]);
        let second = img.get_pixel(40, 10);
        assert!(second.0[2] > second.0[0]);
    }

    #[test]
    fn thumbnail_is_square_with_backdrop_visible() {
        let source = checker_source(80, 40);
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(80.0, 0.0),
            Point::new(80.0, 40.0),
            Point::new(0.0, 40.0),
        ];
        let selection = Selection {
            bounds: bounds_of(&points).unwrap(),
            points,
        };
        let thumb = create_thumbnail(&source, &selection, 50);
        assert_eq!(thumb.dimensions(), (50, 50));
        // 2:1 content fitted into a square leaves backdrop above and below.
        assert_eq!(*thumb.get_pixel(25, 2), Rgba([0x2d, 0x3a, 0x5a, 0xff]));
    }
}
