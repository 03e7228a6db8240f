// ============================================================================
// RASTER — CPU painting primitives over image::RgbaImage
// ============================================================================
//
// Everything the template renderer and the selection overlay need: polygon
// scanline fills, coverage masks used as clip regions, dashed/solid strokes,
// and the inverse-mapping rotated/scaled blit used to composite an assigned
// raster into a template section.  All drawing is plain CPU work; the GUI
// uploads the finished surface as a texture.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::selection::Point;

/// Source-over blend of `src` onto `dst`.
#[inline]
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src.0[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        *dst = src;
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        dst.0[c] = (((s * sa) + (d * da * (1.0 - sa))) / out_a).round() as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// Blend a pixel at (x, y), ignoring out-of-bounds coordinates.
#[inline]
pub fn blend_at(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    blend_pixel(img.get_pixel_mut(x as u32, y as u32), color);
}

/// Fill the whole surface with an opaque color.
pub fn fill(img: &mut RgbaImage, color: Rgba<u8>) {
    for px in img.pixels_mut() {
        *px = color;
    }
}

// ============================================================================
// Polygon coverage masks + fills
// ============================================================================

/// Rasterize a closed polygon into a binary coverage mask (255 inside).
///
/// Scanline fill: for each pixel row, collect x-intercepts of the polygon
/// edges with the row centre and fill between pairs.  Matches the even-odd
/// rule used by the hit-testing ray cast, so a rendered section and its
/// `locate_section` result agree.
pub fn polygon_mask(w: u32, h: u32, points: &[Point]) -> GrayImage {
    let mut mask = GrayImage::new(w, h);
    let n = points.len();
    if n < 3 {
        return mask;
    }
    for y in 0..h {
        let yf = y as f32 + 0.5; // centre of pixel row
        let mut nodes: Vec<f32> = Vec::new();
        // Walk polygon edges (including closing edge n-1 → 0)
        for i in 0..n {
            let j = (i + 1) % n;
            let yi = points[i].y;
            let yj = points[j].y;
            if (yi < yf && yj >= yf) || (yj < yf && yi >= yf) {
                let t = (yf - yi) / (yj - yi);
                nodes.push(points[i].x + t * (points[j].x - points[i].x));
            }
        }
        nodes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        // Fill between pairs of intersections
        let mut k = 0;
        while k + 1 < nodes.len() {
            let x_start = (nodes[k].max(0.0) as u32).min(w);
            let x_end = ((nodes[k + 1]).max(0.0).ceil() as u32).min(w);
            for x in x_start..x_end {
                mask.put_pixel(x, y, Luma([255u8]));
            }
            k += 2;
        }
    }
    mask
}

/// Blend-fill a polygon area with `color` (honours the color's alpha).
pub fn fill_polygon(img: &mut RgbaImage, points: &[Point], color: Rgba<u8>) {
    let mask = polygon_mask(img.width(), img.height(), points);
    for (x, y, m) in mask.enumerate_pixels() {
        if m.0[0] > 0 {
            blend_pixel(img.get_pixel_mut(x, y), color);
        }
    }
}

/// Pixel bounding box of a polygon on a surface of the given size, clamped.
/// Returns `(x0, y0, x1, y1)` with exclusive max, or `None` for an empty box.
pub fn polygon_pixel_bounds(
    w: u32,
    h: u32,
    points: &[Point],
) -> Option<(u32, u32, u32, u32)> {
    let b = crate::selection::bounds_of(points)?;
    let x0 = b.x.floor().max(0.0) as u32;
    let y0 = b.y.floor().max(0.0) as u32;
    let x1 = ((b.x + b.width).ceil().max(0.0) as u32).min(w);
    let y1 = ((b.y + b.height).ceil().max(0.0) as u32).min(h);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0, y0, x1, y1))
}

// ============================================================================
// Strokes
// ============================================================================

/// Stamp a `width`-sized square footprint centred on (x, y).
#[inline]
fn stamp(img: &mut RgbaImage, x: f32, y: f32, width: f32, color: Rgba<u8>) {
    let r = (width * 0.5).max(0.5);
    let x0 = (x - r).floor() as i32;
    let x1 = (x + r).ceil() as i32;
    let y0 = (y - r).floor() as i32;
    let y1 = (y + r).ceil() as i32;
    for py in y0..y1 {
        for px in x0..x1 {
            blend_at(img, px, py, color);
        }
    }
}

/// Stroke a line segment, optionally dashed as `[on, off]` pixel lengths.
/// Each call starts at dash phase zero.
pub fn stroke_line(
    img: &mut RgbaImage,
    a: Point,
    b: Point,
    width: f32,
    color: Rgba<u8>,
    dash: Option<[f32; 2]>,
) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        stamp(img, a.x, a.y, width, color);
        return;
    }
    let steps = len.ceil() as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let d = t * len;
        if let Some([on, off]) = dash {
            let cycle = on + off;
            if cycle > 0.0 && d % cycle >= on {
                continue;
            }
        }
        stamp(img, a.x + dx * t, a.y + dy * t, width, color);
    }
}

/// Stroke an open or closed polyline.
pub fn stroke_path(
    img: &mut RgbaImage,
    points: &[Point],
    closed: bool,
    width: f32,
    color: Rgba<u8>,
    dash: Option<[f32; 2]>,
) {
    if points.len() < 2 {
        return;
    }
    for pair in points.windows(2) {
        stroke_line(img, pair[0], pair[1], width, color, dash);
    }
    if closed {
        stroke_line(img, points[points.len() - 1], points[0], width, color, dash);
    }
}

/// Axis-aligned rectangle outline.
pub fn stroke_rect(
    img: &mut RgbaImage,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    width: f32,
    color: Rgba<u8>,
    dash: Option<[f32; 2]>,
) {
    let pts = [
        Point::new(x, y),
        Point::new(x + w, y),
        Point::new(x + w, y + h),
        Point::new(x, y + h),
    ];
    stroke_path(img, &pts, true, width, color, dash);
}

/// Filled disc.
pub fn fill_circle(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let r2 = radius * radius;
    let x0 = (cx - radius).floor() as i32;
    let x1 = (cx + radius).ceil() as i32;
    let y0 = (cy - radius).floor() as i32;
    let y1 = (cy + radius).ceil() as i32;
    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                blend_at(img, px, py, color);
            }
        }
    }
}

/// Circle outline, stepped at roughly one-pixel arc length.
pub fn stroke_circle(
    img: &mut RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
    width: f32,
    color: Rgba<u8>,
) {
    let circumference = (2.0 * std::f32::consts::PI * radius).max(8.0);
    let steps = circumference.ceil() as u32;
    for i in 0..steps {
        let a = i as f32 / steps as f32 * std::f32::consts::TAU;
        stamp(img, cx + a.cos() * radius, cy + a.sin() * radius, width, color);
    }
}

// ============================================================================
// Blits
// ============================================================================

/// Source-over blit of `src` with its top-left corner at (x, y).
pub fn blit(dst: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    for (sx, sy, px) in src.enumerate_pixels() {
        blend_at(dst, x + sx as i32, y + sy as i32, *px);
    }
}

/// Composite `src` rotated and uniformly scaled, centred at `center`,
/// restricted to pixels where `mask` is non-zero (when given).
///
/// Inverse mapping with bilinear sampling: each destination pixel within
/// `region` is mapped back into source space, so there are no holes at any
/// rotation.  Rows are processed in parallel.  `region` is an exclusive
/// `(x0, y0, x1, y1)` clip in destination pixels; pass the section's pixel
/// bounds to avoid touching the rest of the surface.
pub fn draw_image_transformed(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    center: (f32, f32),
    rotation: f32,
    scale: f32,
    mask: Option<&GrayImage>,
    region: Option<(u32, u32, u32, u32)>,
) {
    if scale.abs() < 1e-6 {
        return;
    }
    let dst_w = dst.width();
    let dst_h = dst.height();
    let (rx0, ry0, rx1, ry1) = region.unwrap_or((0, 0, dst_w, dst_h));
    let (sin, cos) = rotation.sin_cos();
    let inv_scale = 1.0 / scale;
    let src_w = src.width() as i32;
    let src_h = src.height() as i32;
    let src_cx = src.width() as f32 * 0.5;
    let src_cy = src.height() as f32 * 0.5;
    let src_stride = src_w as usize * 4;
    let src_raw = src.as_raw();

    let row_bytes = dst_w as usize * 4;
    let dst_raw: &mut [u8] = &mut **dst;

    dst_raw
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(dy, row)| {
            let dy = dy as u32;
            if dy < ry0 || dy >= ry1 {
                return;
            }
            for dx in rx0..rx1.min(dst_w) {
                if let Some(m) = mask {
                    if m.get_pixel(dx, dy).0[0] == 0 {
                        continue;
                    }
                }
                // Destination → source: un-translate, un-rotate, un-scale.
                let vx = dx as f32 + 0.5 - center.0;
                let vy = dy as f32 + 0.5 - center.1;
                let sx = (vx * cos + vy * sin) * inv_scale + src_cx;
                let sy = (-vx * sin + vy * cos) * inv_scale + src_cy;

                let x0 = sx.floor() as i32;
                let y0 = sy.floor() as i32;
                if x0 < -1 || y0 < -1 || x0 >= src_w || y0 >= src_h {
                    continue;
                }
                let fx = sx - x0 as f32;
                let fy = sy - y0 as f32;

                let sample = |px: i32, py: i32| -> [f32; 4] {
                    if px < 0 || py < 0 || px >= src_w || py >= src_h {
                        [0.0; 4]
                    } else {
                        let idx = py as usize * src_stride + px as usize * 4;
                        [
                            src_raw[idx] as f32,
                            src_raw[idx + 1] as f32,
                            src_raw[idx + 2] as f32,
                            src_raw[idx + 3] as f32,
                        ]
                    }
                };

                let tl = sample(x0, y0);
                let tr = sample(x0 + 1, y0);
                let bl = sample(x0, y0 + 1);
                let br = sample(x0 + 1, y0 + 1);

                let mut out = [0.0f32; 4];
                for c in 0..4 {
                    let top = tl[c] + (tr[c] - tl[c]) * fx;
                    let bot = bl[c] + (br[c] - bl[c]) * fx;
                    out[c] = top + (bot - top) * fy;
                }

                let px_idx = dx as usize * 4;
                let mut dst_px = Rgba([
                    row[px_idx],
                    row[px_idx + 1],
                    row[px_idx + 2],
                    row[px_idx + 3],
                ]);
                blend_pixel(
                    &mut dst_px,
                    Rgba([
                        out[0].round().clamp(0.0, 255.0) as u8,
                        out[1].round().clamp(0.0, 255.0) as u8,
                        out[2].round().clamp(0.0, 255.0) as u8,
                        out[3].round().clamp(0.0, 255.0) as u8,
                    ]),
                );
                row[px_idx..px_idx + 4].copy_from_slice(&dst_px.0);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, side: f32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn mask_covers_square_interior_only() {
        let mask = polygon_mask(20, 20, &square(5.0, 5.0, 10.0));
        assert_eq!(mask.get_pixel(10, 10).0[0], 255);
        assert_eq!(mask.get_pixel(2, 2).0[0], 0);
        assert_eq!(mask.get_pixel(17, 10).0[0], 0);
    }

    #[test]
    fn mask_with_too_few_points_is_empty() {
        let mask = polygon_mask(8, 8, &[Point::new(1.0, 1.0), Point::new(5.0, 5.0)]);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn blend_opaque_replaces_and_transparent_keeps() {
        let mut dst = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut dst, Rgba([200, 100, 50, 255]));
        assert_eq!(dst, Rgba([200, 100, 50, 255]));

        let mut dst = Rgba([10, 20, 30, 255]);
        blend_pixel(&mut dst, Rgba([200, 100, 50, 0]));
        assert_eq!(dst, Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn transformed_identity_draw_centres_source() {
        // 2×2 opaque red source drawn unrotated at the centre of an 8×8 dst.
        // Pixel (3,3) samples the source interior; (4,4) sits on the source
        // edge where bilinear support runs off the raster, so it fades
        // rather than landing fully opaque.
        let mut src = RgbaImage::new(2, 2);
        fill(&mut src, Rgba([255, 0, 0, 255]));
        let mut dst = RgbaImage::new(8, 8);
        draw_image_transformed(&mut dst, &src, (4.0, 4.0), 0.0, 1.0, None, None);
        assert_eq!(dst.get_pixel(3, 3).0[3], 255);
        let edge = dst.get_pixel(4, 4).0[3];
        assert!(edge > 0 && edge < 255);
        assert_eq!(dst.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn transformed_draw_respects_mask() {
        let mut src = RgbaImage::new(4, 4);
        fill(&mut src, Rgba([0, 255, 0, 255]));
        let mut dst = RgbaImage::new(8, 8);
        // Mask admits only the left half.
        let mut mask = GrayImage::new(8, 8);
        for y in 0..8 {
            for x in 0..4 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        draw_image_transformed(&mut dst, &src, (4.0, 4.0), 0.0, 1.0, Some(&mask), None);
        assert!(dst.get_pixel(3, 4).0[3] > 0);
        assert_eq!(dst.get_pixel(5, 4).0[3], 0);
    }
}
