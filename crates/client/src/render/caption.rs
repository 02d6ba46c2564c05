//! Single-line bitmap captions.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};

/// Horizontal distance between glyph origins, in pixels.
pub const GLYPH_ADVANCE: u32 = 7;

/// Appended to captions that were cut short.
pub const TRUNCATION_MARKER: &str = "..";

const GLYPH_HEIGHT: i64 = 8;

/// Truncate `text` so it fits in `available_width` pixels.
///
/// The budget is one character per [`GLYPH_ADVANCE`] pixels; text over
/// budget is cut to exactly the budget and gets [`TRUNCATION_MARKER`].
pub fn fit_caption(text: &str, available_width: u32) -> String {
    let budget = (available_width / GLYPH_ADVANCE) as usize;
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut fitted: String = text.chars().take(budget).collect();
    fitted.push_str(TRUNCATION_MARKER);
    fitted
}

/// Draw `text` with its baseline at `y`, starting at `x`.
///
/// Pixels outside the canvas are skipped.
pub fn draw_text(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>, text: &str) {
    let top = y - (GLYPH_HEIGHT - 1);
    for (i, c) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(c)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        let origin = x + i as i64 * i64::from(GLYPH_ADVANCE);
        draw_glyph(canvas, origin, top, color, &glyph);
    }
}

fn draw_glyph(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>, glyph: &[u8; 8]) {
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (row, bits) in glyph.iter().enumerate() {
        let py = y + row as i64;
        if !(0..height).contains(&py) {
            continue;
        }
        for col in 0..8 {
            if bits & (1 << col) == 0 {
                continue;
            }
            let px = x + col;
            if (0..width).contains(&px) {
                canvas.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_caption_short_text_unchanged() {
        assert_eq!(fit_caption("Short", 140), "Short");
        assert_eq!(fit_caption("", 140), "");
    }

    #[test]
    fn test_fit_caption_truncates_to_budget() {
        let text = "An example caption that is clearly too long";
        let fitted = fit_caption(text, 140);
        assert_eq!(fitted, "An example caption t..");
        assert_eq!(fitted.chars().count(), 20 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_fit_caption_exact_budget() {
        let text = "x".repeat(20);
        assert_eq!(fit_caption(&text, 140), text);
    }

    #[test]
    fn test_fit_caption_counts_chars_not_bytes() {
        let text = "é".repeat(21);
        assert_eq!(fit_caption(&text, 140), format!("{}..", "é".repeat(20)));
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let mut canvas = RgbImage::from_pixel(32, 16, Rgb([0, 0, 0]));
        draw_text(&mut canvas, 1, 10, Rgb([255, 255, 255]), "H");
        let lit = canvas.pixels().filter(|p| p.0 == [255, 255, 255]).count();
        assert!(lit > 0);
        for (_, y, p) in canvas.enumerate_pixels() {
            if p.0 == [255, 255, 255] {
                assert!((3..=10).contains(&y));
            }
        }
    }

    #[test]
    fn test_draw_text_clips_at_edges() {
        let mut canvas = RgbImage::new(10, 10);
        draw_text(&mut canvas, -3, 2, Rgb([255, 0, 0]), "WWWWWWWW");
        draw_text(&mut canvas, 5, 40, Rgb([255, 0, 0]), "W");
    }

    #[test]
    fn test_non_ascii_drawn_as_placeholder() {
        let mut a = RgbImage::new(16, 16);
        let mut b = RgbImage::new(16, 16);
        draw_text(&mut a, 0, 10, Rgb([255, 255, 255]), "\u{1F600}");
        draw_text(&mut b, 0, 10, Rgb([255, 255, 255]), "?");
        assert_eq!(a, b);
    }
}
