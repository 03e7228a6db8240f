// ============================================================================
// TEXT — glyph layout, greedy word wrap, and text-block rasterization
// ============================================================================

use ab_glyph::{point, Font, FontArc, ScaleFont};
use image::{Rgba, RgbaImage};

use crate::raster;
use crate::selection::Point;

/// Load a sans-serif system font for section labels and fortune text.
///
/// Returns `None` when no usable font is installed (e.g. bare containers);
/// callers degrade to label-free rendering rather than failing.
pub fn load_system_font() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::SansSerif], &Properties::new())
        .ok()?;
    let font = handle.load().ok()?;
    let data = font.copy_font_data()?;
    FontArc::try_from_vec((*data).clone()).ok()
}

/// Advance width of a single line at the given pixel size (kerning included).
pub fn measure_line(font: &FontArc, text: &str, size: f32) -> f32 {
    let scaled = font.as_scaled(size);
    let mut width = 0.0f32;
    let mut last = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        last = Some(id);
    }
    width
}

/// Greedy pixel word wrap: accumulate words while the candidate line fits
/// within `max_width`; on overflow, flush the current line and start a new
/// one with the overflowing word.  A single word wider than the budget stays
/// on its own line.  `measure` maps a candidate string to its pixel width,
/// which keeps the algorithm testable without a real font.
pub fn wrap_text(measure: impl Fn(&str) -> f32, max_width: f32, text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = format!("{}{} ", line, word);
        if measure(&candidate) > max_width && !line.is_empty() {
            lines.push(line.trim_end().to_string());
            line = format!("{} ", word);
        } else {
            line = candidate;
        }
    }
    lines.push(line.trim_end().to_string());
    lines
}

/// Rasterize centred lines of text into a tight RGBA block.
///
/// Each line occupies a `line_height`-tall slot and is centred horizontally;
/// the baseline sits so the glyph box is vertically centred in its slot
/// (canvas-style "middle" baseline).  Glyph coverage is blended into the
/// block with the color's alpha.
pub fn rasterize_lines(
    font: &FontArc,
    lines: &[String],
    size: f32,
    line_height: f32,
    color: Rgba<u8>,
) -> RgbaImage {
    let scaled = font.as_scaled(size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();

    let block_w = lines
        .iter()
        .map(|l| measure_line(font, l, size))
        .fold(1.0f32, f32::max)
        .ceil() as u32;
    let block_h = ((lines.len() as f32 * line_height).ceil() as u32).max(1);
    let mut block = RgbaImage::new(block_w, block_h);

    for (li, line) in lines.iter().enumerate() {
        let line_w = measure_line(font, line, size);
        let mut cursor_x = (block_w as f32 - line_w) * 0.5;
        let center_y = (li as f32 + 0.5) * line_height;
        let baseline = center_y + (ascent + descent) * 0.5;

        let mut last = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = last {
                cursor_x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(size, point(cursor_x, baseline));
            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                outline.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    let alpha = (coverage * color.0[3] as f32).round() as u8;
                    raster::blend_at(
                        &mut block,
                        px,
                        py,
                        Rgba([color.0[0], color.0[1], color.0[2], alpha]),
                    );
                });
            }
            cursor_x += scaled.h_advance(id);
            last = Some(id);
        }
    }
    block
}

/// Draw a rasterized text block rotated about `anchor`.
///
/// `center_offset` is the block centre's offset from the anchor in unrotated
/// text space; it is rotated along with the text (the fortune lines start
/// above the anchor, labels sit exactly on it).
pub fn draw_text_block(
    dst: &mut RgbaImage,
    block: &RgbaImage,
    anchor: Point,
    rotation: f32,
    center_offset: (f32, f32),
) {
    let (sin, cos) = rotation.sin_cos();
    let cx = anchor.x + center_offset.0 * cos - center_offset.1 * sin;
    let cy = anchor.y + center_offset.0 * sin + center_offset.1 * cos;

    // Conservative region: half the block diagonal around the centre.
    let half_diag = 0.5
        * ((block.width() * block.width() + block.height() * block.height()) as f32).sqrt();
    let x0 = (cx - half_diag).floor().max(0.0) as u32;
    let y0 = (cy - half_diag).floor().max(0.0) as u32;
    let x1 = ((cx + half_diag).ceil().max(0.0) as u32).min(dst.width());
    let y1 = ((cy + half_diag).ceil().max(0.0) as u32).min(dst.height());
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    raster::draw_image_transformed(
        dst,
        block,
        (cx, cy),
        rotation,
        1.0,
        None,
        Some((x0, y0, x1, y1)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fixed-width fake measurer: 6 px per char, space included.
    fn fake_measure(s: &str) -> f32 {
        s.chars().count() as f32 * 6.0
    }

    #[test]
    fn wrap_splits_on_pixel_budget() {
        let lines = wrap_text(fake_measure, 50.0, "Great things await.");
        assert_eq!(lines, vec!["Great", "things", "await."]);
    }

    #[test]
    fn wrap_keeps_short_text_on_one_line() {
        let lines = wrap_text(fake_measure, 200.0, "Joy follows.");
        assert_eq!(lines, vec!["Joy follows."]);
    }

    #[test]
    fn wrap_leaves_an_overlong_word_on_its_own_line() {
        let lines = wrap_text(fake_measure, 30.0, "hi extraordinarily so");
        assert_eq!(lines, vec!["hi", "extraordinarily", "so"]);
    }

    #[test]
    fn wrap_of_empty_text_is_a_single_empty_line() {
        let lines = wrap_text(fake_measure, 50.0, "");
        assert_eq!(lines, vec![""]);
    }

    #[test]
    fn wrapped_lines_never_exceed_budget_except_single_words() {
        let text = "Love surrounds you and many friends are ahead of you";
        for line in wrap_text(fake_measure, 60.0, text) {
            let words = line.split_whitespace().count();
            assert!(words == 1 || fake_measure(&line) <= 60.0 + 6.0);
        }
    }
}
