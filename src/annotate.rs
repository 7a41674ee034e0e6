//! Frame annotation.
//!
//! Pure drawing over packed RGB buffers: hollow box per detection plus a
//! filled label strip with a small embedded glyph set. No transparency, no
//! scaling, nothing that would pull a rasterizer dependency into the
//! pipeline.

use crate::detect::Detection;
use crate::frame::Frame;

const BORDER: u32 = 2;
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const GLYPH_GAP: u32 = 1;
const STRIP_PAD: u32 = 2;

/// Colors cycled per class label. Derived from the label hash so the same
/// class keeps the same color across frames and sessions.
const PALETTE: [[u8; 3]; 8] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [72, 249, 10],
    [61, 219, 134],
    [0, 194, 255],
    [52, 69, 147],
    [203, 56, 255],
];

/// Draw every detection onto the frame in place.
///
/// Boxes extending past the frame edge are clipped, never an error. An empty
/// detection list leaves the frame untouched.
pub fn annotate(frame: &mut Frame, detections: &[Detection]) {
    for detection in detections {
        let color = class_color(&detection.label);
        draw_box(frame, detection, color);
        draw_label(frame, detection, color);
    }
}

/// Deterministic per-class color.
pub fn class_color(label: &str) -> [u8; 3] {
    let mut hash: u32 = 2166136261;
    for byte in label.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    PALETTE[(hash % PALETTE.len() as u32) as usize]
}

fn draw_box(frame: &mut Frame, detection: &Detection, color: [u8; 3]) {
    let b = &detection.bbox;
    if b.x >= frame.width() || b.y >= frame.height() {
        return;
    }
    // Clip before iterating; a sloppy model box must not turn into a sweep
    // over billions of off-frame coordinates.
    let x2 = b.x.saturating_add(b.w).min(frame.width());
    let y2 = b.y.saturating_add(b.h).min(frame.height());

    for t in 0..BORDER {
        // Horizontal edges.
        for x in b.x..x2 {
            frame.put_pixel(x, b.y.saturating_add(t), color);
            frame.put_pixel(x, y2.saturating_sub(1 + t), color);
        }
        // Vertical edges.
        for y in b.y..y2 {
            frame.put_pixel(b.x.saturating_add(t), y, color);
            frame.put_pixel(x2.saturating_sub(1 + t), y, color);
        }
    }
}

fn draw_label(frame: &mut Frame, detection: &Detection, color: [u8; 3]) {
    let b = &detection.bbox;
    if b.x >= frame.width() {
        return;
    }
    let text = format!("{} {:.2}", detection.label, detection.confidence);
    let text_w = text.chars().count() as u32 * (GLYPH_W + GLYPH_GAP);
    let strip_h = GLYPH_H + 2 * STRIP_PAD;
    let strip_w = text_w + 2 * STRIP_PAD;

    // Strip sits above the box when there is room, inside it otherwise.
    let strip_y = if b.y >= strip_h { b.y - strip_h } else { b.y };
    if strip_y >= frame.height() {
        return;
    }
    let x_end = b.x.saturating_add(strip_w).min(frame.width());
    let y_end = strip_y.saturating_add(strip_h).min(frame.height());

    for y in strip_y..y_end {
        for x in b.x..x_end {
            frame.put_pixel(x, y, color);
        }
    }

    let ink = label_ink(color);
    let mut pen_x = b.x.saturating_add(STRIP_PAD);
    let pen_y = strip_y + STRIP_PAD;
    for ch in text.chars() {
        if pen_x >= frame.width() {
            break;
        }
        draw_glyph(frame, pen_x, pen_y, ch, ink);
        pen_x = pen_x.saturating_add(GLYPH_W + GLYPH_GAP);
    }
}

/// Black or white text, whichever contrasts with the strip fill.
fn label_ink(background: [u8; 3]) -> [u8; 3] {
    let luma = 299 * background[0] as u32 + 587 * background[1] as u32 + 114 * background[2] as u32;
    if luma > 128 * 1000 {
        [0, 0, 0]
    } else {
        [255, 255, 255]
    }
}

fn draw_glyph(frame: &mut Frame, x: u32, y: u32, ch: char, ink: [u8; 3]) {
    let columns = match glyph(ch) {
        Some(columns) => columns,
        None => return,
    };
    for (col, bits) in columns.iter().enumerate() {
        for row in 0..GLYPH_H {
            if bits & (1 << row) != 0 {
                frame.put_pixel(x.saturating_add(col as u32), y.saturating_add(row), ink);
            }
        }
    }
}

/// 5x7 column-major glyphs, bit 0 is the top row. Covers uppercase letters,
/// digits and the handful of punctuation that appears in labels; anything
/// else renders as a blank cell.
fn glyph(ch: char) -> Option<[u8; 5]> {
    let columns = match ch.to_ascii_uppercase() {
        'A' => [0x7E, 0x11, 0x11, 0x11, 0x7E],
        'B' => [0x7F, 0x49, 0x49, 0x49, 0x36],
        'C' => [0x3E, 0x41, 0x41, 0x41, 0x22],
        'D' => [0x7F, 0x41, 0x41, 0x22, 0x1C],
        'E' => [0x7F, 0x49, 0x49, 0x49, 0x41],
        'F' => [0x7F, 0x09, 0x09, 0x09, 0x01],
        'G' => [0x3E, 0x41, 0x49, 0x49, 0x7A],
        'H' => [0x7F, 0x08, 0x08, 0x08, 0x7F],
        'I' => [0x00, 0x41, 0x7F, 0x41, 0x00],
        'J' => [0x20, 0x40, 0x41, 0x3F, 0x01],
        'K' => [0x7F, 0x08, 0x14, 0x22, 0x41],
        'L' => [0x7F, 0x40, 0x40, 0x40, 0x40],
        'M' => [0x7F, 0x02, 0x0C, 0x02, 0x7F],
        'N' => [0x7F, 0x04, 0x08, 0x10, 0x7F],
        'O' => [0x3E, 0x41, 0x41, 0x41, 0x3E],
        'P' => [0x7F, 0x09, 0x09, 0x09, 0x06],
        'Q' => [0x3E, 0x41, 0x51, 0x21, 0x5E],
        'R' => [0x7F, 0x09, 0x19, 0x29, 0x46],
        'S' => [0x46, 0x49, 0x49, 0x49, 0x31],
        'T' => [0x01, 0x01, 0x7F, 0x01, 0x01],
        'U' => [0x3F, 0x40, 0x40, 0x40, 0x3F],
        'V' => [0x1F, 0x20, 0x40, 0x20, 0x1F],
        'W' => [0x3F, 0x40, 0x38, 0x40, 0x3F],
        'X' => [0x63, 0x14, 0x08, 0x14, 0x63],
        'Y' => [0x07, 0x08, 0x70, 0x08, 0x07],
        'Z' => [0x61, 0x51, 0x49, 0x45, 0x43],
        '0' => [0x3E, 0x51, 0x49, 0x45, 0x3E],
        '1' => [0x00, 0x42, 0x7F, 0x40, 0x00],
        '2' => [0x42, 0x61, 0x51, 0x49, 0x46],
        '3' => [0x21, 0x41, 0x45, 0x4B, 0x31],
        '4' => [0x18, 0x14, 0x12, 0x7F, 0x10],
        '5' => [0x27, 0x45, 0x45, 0x45, 0x39],
        '6' => [0x3C, 0x4A, 0x49, 0x49, 0x30],
        '7' => [0x01, 0x71, 0x09, 0x05, 0x03],
        '8' => [0x36, 0x49, 0x49, 0x49, 0x36],
        '9' => [0x06, 0x49, 0x49, 0x29, 0x1E],
        '-' => [0x08, 0x08, 0x08, 0x08, 0x08],
        '.' => [0x00, 0x60, 0x60, 0x00, 0x00],
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00],
        _ => return None,
    };
    Some(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};

    #[test]
    fn empty_detections_leave_frame_untouched() {
        let mut frame = Frame::blank(32, 32);
        let before = frame.clone();
        annotate(&mut frame, &[]);
        assert_eq!(frame, before);
    }

    #[test]
    fn box_edges_take_the_class_color() {
        let mut frame = Frame::blank(64, 64);
        let det = Detection::new(
            "NO-Hardhat",
            0.87,
            BoundingBox {
                x: 20,
                y: 30,
                w: 20,
                h: 20,
            },
        );
        annotate(&mut frame, std::slice::from_ref(&det));
        let color = class_color("NO-Hardhat");
        assert_eq!(frame.pixel(20, 30), Some(color));
        assert_eq!(frame.pixel(39, 49), Some(color));
    }

    #[test]
    fn out_of_bounds_box_is_clipped_not_a_panic() {
        let mut frame = Frame::blank(16, 16);
        let det = Detection::new(
            "Person",
            0.5,
            BoundingBox {
                x: 10,
                y: 10,
                w: 500,
                h: 500,
            },
        );
        annotate(&mut frame, std::slice::from_ref(&det));
    }

    #[test]
    fn oversized_box_is_clipped_to_frame_bounds() {
        let mut frame = Frame::blank(64, 64);
        let det = Detection::new(
            "NO-Mask",
            0.5,
            BoundingBox {
                x: 8,
                y: 8,
                w: u32::MAX,
                h: u32::MAX,
            },
        );
        annotate(&mut frame, std::slice::from_ref(&det));

        // Clipped edges land on the frame boundary.
        let color = class_color("NO-Mask");
        assert_eq!(frame.pixel(63, 20), Some(color));
        assert_eq!(frame.pixel(20, 63), Some(color));
    }

    #[test]
    fn class_color_is_stable() {
        assert_eq!(class_color("NO-Mask"), class_color("NO-Mask"));
    }
}
