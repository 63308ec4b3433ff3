//! Frame annotation: boxes and labels for filtered detections.
//!
//! The annotator never mutates the caller's frame; it draws on a copy and
//! returns it. Boxes are 2 px outlines in the category color, labels sit
//! 10 px above the top-left corner (clipped into the frame). An optional
//! final step stretch-resizes to a fixed display size.

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::result::{Detection, RenderPolicy};
use crate::frame::Frame;

const BOX_THICKNESS: u32 = 2;
const LABEL_OFFSET_Y: i32 = 10;
const LABEL_SCALE: u32 = 2;

/// Draw the detections onto a copy of `frame`.
///
/// Detections render in input order; overlapping boxes occlude earlier ones.
/// `display_size` of `(w, h)` stretches the annotated copy to exactly that
/// size (aspect-ratio-agnostic, matching the presentation behavior of the
/// display surface).
pub fn annotate(
    frame: &Frame,
    detections: &[Detection],
    policy: &RenderPolicy,
    display_size: Option<(u32, u32)>,
) -> Frame {
    let mut img = frame.to_image();

    for det in detections {
        let color = Rgb(policy.style_for(det.category).color);
        draw_box(&mut img, det, color);
        draw_label(&mut img, det, color);
    }

    if let Some((w, h)) = display_size {
        if w > 0 && h > 0 && (w, h) != (img.width(), img.height()) {
            img = image::imageops::resize(&img, w, h, FilterType::Triangle);
        }
    }

    Frame::from_image(img)
}

fn draw_box(img: &mut RgbImage, det: &Detection, color: Rgb<u8>) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let x1 = det.raw.x1.clamp(0.0, w - 1.0) as i32;
    let y1 = det.raw.y1.clamp(0.0, h - 1.0) as i32;
    let x2 = det.raw.x2.clamp(0.0, w - 1.0) as i32;
    let y2 = det.raw.y2.clamp(0.0, h - 1.0) as i32;
    if x2 <= x1 || y2 <= y1 {
        return;
    }

    for inset in 0..BOX_THICKNESS as i32 {
        let bw = (x2 - x1) - 2 * inset;
        let bh = (y2 - y1) - 2 * inset;
        if bw <= 0 || bh <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            img,
            Rect::at(x1 + inset, y1 + inset).of_size(bw as u32, bh as u32),
            color,
        );
    }
}

fn draw_label(img: &mut RgbImage, det: &Detection, color: Rgb<u8>) {
    let text_height = (GLYPH_HEIGHT * LABEL_SCALE) as i32;
    let x = det.raw.x1.max(0.0) as i32;
    // Above the top-left corner, pushed down into the frame when the box
    // touches the top edge.
    let y = (det.raw.y1 as i32 - LABEL_OFFSET_Y - text_height).max(0);
    draw_text(img, x, y, &det.label, color, LABEL_SCALE);
}

// ----------------------------------------------------------------------------
// Bitmap label font
// ----------------------------------------------------------------------------
// 5x7 glyphs, one byte per row, bit 4 = leftmost column. Covers exactly the
// characters label text is built from (category names, digits, dot).

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

type Glyph = [u8; 7];

fn glyph_for(c: char) -> Option<Glyph> {
    let glyph = match c {
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'l' => [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x15, 0x15],
        't' => [0x04, 0x04, 0x1F, 0x04, 0x04, 0x05, 0x02],
        'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        _ => return None,
    };
    Some(glyph)
}

/// Render `text` at `(x, y)` (top-left of the text box), clipped to the
/// image. Characters without a glyph advance the cursor but draw nothing.
fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: u32) {
    let advance = ((GLYPH_WIDTH + GLYPH_SPACING) * scale) as i32;
    let mut cursor_x = x;

    for c in text.chars() {
        if let Some(glyph) = glyph_for(c) {
            draw_glyph(img, cursor_x, y, &glyph, color, scale);
        }
        cursor_x += advance;
    }
}

fn draw_glyph(img: &mut RgbImage, x: i32, y: i32, glyph: &Glyph, color: Rgb<u8>, scale: u32) {
    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + (col * scale + dx) as i32;
                    let py = y + (row as u32 * scale + dy) as i32;
                    if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height()
                    {
                        img.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}
