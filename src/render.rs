//! Annotated visualization of detections over the normalized image.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::models::{Detection, ElementClass};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SCALE: u32 = 2;
const LABEL_PADDING: u32 = 2;
const BOX_THICKNESS: u32 = 2;

pub fn class_color(class: ElementClass) -> Rgb<u8> {
    match class {
        ElementClass::Wall => Rgb([0, 255, 0]),
        ElementClass::Window => Rgb([0, 0, 255]),
        ElementClass::Door => Rgb([255, 0, 0]),
        ElementClass::Background => Rgb([255, 255, 255]),
    }
}

/// Rows of a 5x7 bitmap glyph, most significant of the low five bits on the left.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        _ => return None,
    };
    Some(rows)
}

/// Pixel width of `text` once rendered.
pub fn text_width(text: &str) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * GLYPH_WIDTH * GLYPH_SCALE + (n - 1) * GLYPH_SCALE
}

pub fn text_height() -> u32 {
    GLYPH_HEIGHT * GLYPH_SCALE
}

/// Draw `text` with its top-left corner at `(x, y)`. Unknown characters render as gaps.
pub fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32, color: Rgb<u8>) {
    let mut pen_x = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    for dy in 0..GLYPH_SCALE {
                        for dx in 0..GLYPH_SCALE {
                            let px = pen_x + col * GLYPH_SCALE + dx;
                            let py = y + row as u32 * GLYPH_SCALE + dy;
                            if px < canvas.width() && py < canvas.height() {
                                canvas.put_pixel(px, py, color);
                            }
                        }
                    }
                }
            }
        }
        pen_x += (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    }
}

/// Boxes and class labels over a copy of `base`.
pub fn annotate(base: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = base.to_rgb8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }

    for detection in detections {
        let color = class_color(detection.class);
        let [x1, y1, x2, y2] = detection.bbox.truncated();
        let x1 = x1.clamp(0, width as i32 - 1) as u32;
        let y1 = y1.clamp(0, height as i32 - 1) as u32;
        let x2 = (x2.max(0) as u32).clamp(x1 + 1, width);
        let y2 = (y2.max(0) as u32).clamp(y1 + 1, height);

        for inset in 0..BOX_THICKNESS {
            let (w, h) = (x2 - x1, y2 - y1);
            if w <= 2 * inset || h <= 2 * inset {
                break;
            }
            let rect = Rect::at((x1 + inset) as i32, (y1 + inset) as i32)
                .of_size(w - 2 * inset, h - 2 * inset);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }

        let label = detection.class.name();
        let tab_w = text_width(label) + 2 * LABEL_PADDING;
        let tab_h = text_height() + 2 * LABEL_PADDING;
        // Above the box when there is room, otherwise tucked inside its top edge
        let tab_y = if y1 >= tab_h { y1 - tab_h } else { y1 };
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(x1 as i32, tab_y as i32).of_size(tab_w, tab_h),
            color,
        );
        draw_text(
            &mut canvas,
            label,
            x1 + LABEL_PADDING,
            tab_y + LABEL_PADDING,
            Rgb([255, 255, 255]),
        );
    }

    canvas
}
