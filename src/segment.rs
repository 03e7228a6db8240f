// ============================================================================
// SEGMENT — background-classified flood fill + uniform grid partition
// ============================================================================
//
// Carves a source photo into candidate regions automatically, as an
// alternative to hand-drawn polygon selections.  Both modes produce
// rectangular `Region`s that convert into ordinary 4-point selections, so
// the extraction path downstream is identical to the hand-drawn one.

use image::RgbaImage;

use crate::error::FoldError;
use crate::selection::{bounds_of, Point, Selection};

/// Pixels of padding added around each detected component's bounding box.
const REGION_PADDING: u32 = 5;

/// How a pixel is classified as background.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackgroundRule {
    /// Near-white (all channels ≥ threshold) or transparent.
    White { threshold: u8 },
    /// Near-black (all channels ≤ threshold) or transparent.
    Black { threshold: u8 },
    /// Alpha below threshold.
    Alpha { threshold: u8 },
    /// Euclidean RGB distance from `color` within `threshold`.
    Custom { color: [u8; 3], threshold: f32 },
}

impl BackgroundRule {
    /// Classify one RGBA pixel.
    #[inline(always)]
    fn is_background(&self, px: [u8; 4]) -> bool {
        let [r, g, b, a] = px;
        match *self {
            BackgroundRule::White { threshold } => {
                a < 128 || (r >= threshold && g >= threshold && b >= threshold)
            }
            BackgroundRule::Black { threshold } => {
                a < 128 || (r <= threshold && g <= threshold && b <= threshold)
            }
            BackgroundRule::Alpha { threshold } => a < threshold,
            BackgroundRule::Custom { color, threshold } => {
                let dr = r as f32 - color[0] as f32;
                let dg = g as f32 - color[1] as f32;
                let db = b as f32 - color[2] as f32;
                (dr * dr + dg * dg + db * db).sqrt() <= threshold
            }
        }
    }
}

/// A rectangular candidate region in image pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_count: u64,
}

impl Region {
    /// Convert into a 4-point rectangular selection for extraction.
    pub fn to_selection(self) -> Selection {
        let points = vec![
            Point::new(self.x as f32, self.y as f32),
            Point::new((self.x + self.width) as f32, self.y as f32),
            Point::new((self.x + self.width) as f32, (self.y + self.height) as f32),
            Point::new(self.x as f32, (self.y + self.height) as f32),
        ];
        // Four corner points always yield a bounding box.
        let bounds = bounds_of(&points).unwrap_or(crate::selection::BoundingBox {
            x: self.x as f32,
            y: self.y as f32,
            width: self.width as f32,
            height: self.height as f32,
        });
        Selection { points, bounds }
    }
}

/// Find connected foreground components by flood fill.
///
/// Scans pixels in row-major order; every unvisited non-background pixel
/// seeds a 4-connected flood fill over an explicit work list (no recursion,
/// so a component spanning the whole image cannot blow the stack).  The
/// visited mask is shared between the scan and the fills, so each pixel is
/// processed exactly once.  Components smaller than `min_size` pixels are
/// discarded; survivors get `REGION_PADDING` px added to their bounding box,
/// clamped to the image.
///
/// Output ordering is a coarse reading order: sort key is the quarter-height
/// row band of the region's top edge, then ascending x.  Kept as-is for
/// compatibility; it can misorder irregular layouts.
pub fn find_regions(
    img: &RgbaImage,
    rule: BackgroundRule,
    min_size: u64,
) -> Result<Vec<Region>, FoldError> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img.as_raw();
    let mut visited = vec![0u8; width * height];
    let mut regions: Vec<Region> = Vec::new();

    // Inline pixel fetch from the flat RGBA buffer
    #[inline(always)]
    fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
        let o = idx * 4;
        [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
    }

    // Work list stores packed flat indices (y * width + x) to avoid tuple
    // overhead; reused across fills.
    let mut stack: Vec<u32> = Vec::with_capacity(4096);

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if visited[idx] != 0 {
                continue;
            }
            if rule.is_background(pix(data, idx)) {
                visited[idx] = 1;
                continue;
            }

            // Found an unvisited foreground pixel — flood its component.
            let mut min_x = x;
            let mut max_x = x;
            let mut min_y = y;
            let mut max_y = y;
            let mut pixel_count: u64 = 0;

            visited[idx] = 1;
            stack.push(idx as u32);
            while let Some(i) = stack.pop() {
                let i = i as usize;
                let px = i % width;
                let py = i / width;
                pixel_count += 1;
                if px < min_x {
                    min_x = px;
                }
                if px > max_x {
                    max_x = px;
                }
                if py < min_y {
                    min_y = py;
                }
                if py > max_y {
                    max_y = py;
                }

                // 4-connected neighbours; background pixels are marked
                // visited here too so the outer scan skips them for free.
                let mut visit = |ni: usize| {
                    if visited[ni] == 0 {
                        if rule.is_background(pix(data, ni)) {
                            visited[ni] = 1;
                        } else {
                            visited[ni] = 1;
                            stack.push(ni as u32);
                        }
                    }
                };
                if px > 0 {
                    visit(i - 1);
                }
                if px + 1 < width {
                    visit(i + 1);
                }
                if py > 0 {
                    visit(i - width);
                }
                if py + 1 < height {
                    visit(i + width);
                }
            }

            if pixel_count >= min_size {
                // Pad the tight box, clamping to the image.
                let x0 = min_x.saturating_sub(REGION_PADDING as usize);
                let y0 = min_y.saturating_sub(REGION_PADDING as usize);
                let x1 = (max_x + 1 + REGION_PADDING as usize).min(width);
                let y1 = (max_y + 1 + REGION_PADDING as usize).min(height);
                regions.push(Region {
                    x: x0 as u32,
                    y: y0 as u32,
                    width: (x1 - x0) as u32,
                    height: (y1 - y0) as u32,
                    pixel_count,
                });
            }
        }
    }

    if regions.is_empty() {
        return Err(FoldError::NoRegionsFound);
    }

    // Coarse top-to-bottom, left-to-right order: quarter-height row bands,
    // then ascending x within a band.
    let band_height = (height as f32 / 4.0).max(1.0);
    regions.sort_by(|a, b| {
        let band_a = (a.y as f32 / band_height).floor() as i64;
        let band_b = (b.y as f32 / band_height).floor() as i64;
        band_a.cmp(&band_b).then(a.x.cmp(&b.x))
    });

    Ok(regions)
}

/// Partition a `width × height` raster into an `n × n` grid of equal cells.
///
/// Cells use floored dimensions; the last row and column extend to the image
/// edge so the union tiles the raster exactly, with no gaps or overlaps.
pub fn grid_regions(width: u32, height: u32, n: u32) -> Vec<Region> {
    let n = n.max(1);
    let cell_w = width / n;
    let cell_h = height / n;
    let mut regions = Vec::with_capacity((n * n) as usize);
    for row in 0..n {
        for col in 0..n {
            let x = col * cell_w;
            let y = row * cell_h;
            let w = if col == n - 1 { width - x } else { cell_w };
            let h = if row == n - 1 { height - y } else { cell_h };
            regions.push(Region {
                x,
                y,
                width: w,
                height: h,
                pixel_count: w as u64 * h as u64,
            });
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn white_canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    fn paint_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
        for py in y..y + h {
            for px in x..x + w {
                img.put_pixel(px, py, color);
            }
        }
    }

    #[test]
    fn black_square_on_white_yields_one_padded_region() {
        let mut img = white_canvas(100, 100);
        paint_rect(&mut img, 40, 40, 20, 20, Rgba([0, 0, 0, 255]));
        let regions =
            find_regions(&img, BackgroundRule::White { threshold: 240 }, 50).unwrap();
        assert_eq!(regions.len(), 1);
        let r = regions[0];
        assert_eq!(r.pixel_count, 400);
        // Tight box (40,40,20,20) padded by 5 px on each side.
        assert_eq!((r.x, r.y, r.width, r.height), (35, 35, 30, 30));
    }

    #[test]
    fn padding_clamps_at_image_edges() {
        let mut img = white_canvas(50, 50);
        paint_rect(&mut img, 0, 0, 10, 10, Rgba([20, 20, 20, 255]));
        let regions =
            find_regions(&img, BackgroundRule::White { threshold: 240 }, 10).unwrap();
        assert_eq!(regions.len(), 1);
        let r = regions[0];
        assert_eq!((r.x, r.y), (0, 0));
        assert_eq!((r.width, r.height), (15, 15));
    }

    #[test]
    fn small_components_are_discarded_and_none_found_errors() {
        let mut img = white_canvas(60, 60);
        paint_rect(&mut img, 10, 10, 3, 3, Rgba([0, 0, 0, 255]));
        let err = find_regions(&img, BackgroundRule::White { threshold: 240 }, 50);
        assert_eq!(err, Err(FoldError::NoRegionsFound));
    }

    #[test]
    fn two_separate_blobs_make_two_regions_in_reading_order() {
        let mut img = white_canvas(120, 120);
        // One blob in the top band, one in the bottom band, reversed in x.
        paint_rect(&mut img, 70, 5, 20, 20, Rgba([0, 0, 0, 255]));
        paint_rect(&mut img, 10, 90, 20, 20, Rgba([0, 0, 0, 255]));
        let regions =
            find_regions(&img, BackgroundRule::White { threshold: 240 }, 50).unwrap();
        assert_eq!(regions.len(), 2);
        // Top-band blob first despite the larger x.
        assert!(regions[0].y < regions[1].y);
    }

    #[test]
    fn diagonal_touching_blobs_are_separate_components() {
        // 4-connectivity: corner contact does not join components.
        let mut img = white_canvas(40, 40);
        paint_rect(&mut img, 5, 5, 5, 5, Rgba([0, 0, 0, 255]));
        paint_rect(&mut img, 10, 10, 5, 5, Rgba([0, 0, 0, 255]));
        let regions =
            find_regions(&img, BackgroundRule::White { threshold: 240 }, 10).unwrap();
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn alpha_rule_treats_opaque_pixels_as_foreground() {
        let mut img = RgbaImage::from_pixel(30, 30, Rgba([0, 0, 0, 0]));
        paint_rect(&mut img, 8, 8, 10, 10, Rgba([50, 90, 130, 255]));
        let regions =
            find_regions(&img, BackgroundRule::Alpha { threshold: 128 }, 20).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count, 100);
    }

    #[test]
    fn custom_rule_matches_by_color_distance() {
        let bg = Rgba([10, 200, 30, 255]);
        let mut img = RgbaImage::from_pixel(40, 40, bg);
        paint_rect(&mut img, 12, 12, 8, 8, Rgba([200, 10, 10, 255]));
        let rule = BackgroundRule::Custom {
            color: [10, 200, 30],
            threshold: 30.0,
        };
        let regions = find_regions(&img, rule, 20).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count, 64);
    }

    #[test]
    fn grid_partition_tiles_exactly() {
        let w = 600u32;
        let h = 600u32;
        let regions = grid_regions(w, h, 4);
        assert_eq!(regions.len(), 16);
        for r in &regions {
            assert_eq!((r.width, r.height), (150, 150));
        }
        let area: u64 = regions.iter().map(|r| r.width as u64 * r.height as u64).sum();
        assert_eq!(area, w as u64 * h as u64);
        // No pairwise overlap.
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                let overlap_x = a.x < b.x + b.width && b.x < a.x + a.width;
                let overlap_y = a.y < b.y + b.height && b.y < a.y + a.height;
                assert!(!(overlap_x && overlap_y));
            }
        }
    }

    #[test]
    fn grid_remainder_is_absorbed_by_last_row_and_column() {
        let regions = grid_regions(103, 55, 4);
        assert_eq!(regions.len(), 16);
        // Interior cells are floor-sized; last column/row extend to the edge.
        assert_eq!((regions[0].width, regions[0].height), (25, 13));
        let last = regions[15];
        assert_eq!(last.x + last.width, 103);
        assert_eq!(last.y + last.height, 55);
        let area: u64 = regions.iter().map(|r| r.width as u64 * r.height as u64).sum();
        assert_eq!(area, 103 * 55);
    }

    #[test]
    fn region_converts_to_rectangular_selection() {
        let r = Region {
            x: 3,
            y: 7,
            width: 10,
            height: 4,
            pixel_count: 40,
        };
        let sel = r.to_selection();
        assert_eq!(sel.points.len(), 4);
        assert_eq!(sel.bounds.x, 3.0);
        assert_eq!(sel.bounds.y, 7.0);
        assert_eq!(sel.bounds.width, 10.0);
        assert_eq!(sel.bounds.height, 4.0);
    }

    #[test]
    fn every_pixel_is_visited_exactly_once() {
        // Indirect check of the shared visited mask: a maze of foreground
        // stripes over the whole image still terminates and partitions
        // cleanly, with component sizes summing to the foreground area.
        let mut img = white_canvas(64, 64);
        for y in (0..64).step_by(4) {
            paint_rect(&mut img, 0, y, 64, 2, Rgba([0, 0, 0, 255]));
        }
        let regions =
            find_regions(&img, BackgroundRule::White { threshold: 240 }, 1).unwrap();
        assert_eq!(regions.len(), 16);
        let total: u64 = regions.iter().map(|r| r.pixel_count).sum();
        assert_eq!(total, 16 * 64 * 2);
    }
}
