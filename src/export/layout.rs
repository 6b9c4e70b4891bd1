//! Page geometry and text metrics for the exported book.
//!
//! Positions are given the way a printed page is measured (millimetres from
//! the top-left corner) and converted to PDF user space (points, origin at
//! the bottom-left) here.

/// A4 portrait
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

/// Horizontal margin around drawings
pub const IMAGE_MARGIN_MM: f32 = 10.0;
/// Distance from the top edge to the top of a drawing
pub const IMAGE_TOP_MM: f32 = 25.0;
/// Height/width factor of a drawing box (3:4 portrait)
pub const IMAGE_HEIGHT_RATIO: f32 = 1.33;

pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// An RGB colour with 8-bit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Channels scaled to the 0..=1 range PDF colour operators expect
    pub fn components(&self) -> [f32; 3] {
        [self.0, self.1, self.2].map(|c| c as f32 / 255.0)
    }
}

/// Rectangle in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn mm(v: f32) -> f32 {
    v * PT_PER_MM
}

pub fn page_width() -> f32 {
    mm(PAGE_WIDTH_MM)
}

pub fn page_height() -> f32 {
    mm(PAGE_HEIGHT_MM)
}

/// Baseline y coordinate for text placed `from_top_mm` below the top edge
pub fn baseline(from_top_mm: f32) -> f32 {
    mm(PAGE_HEIGHT_MM - from_top_mm)
}

/// Box a drawing is scaled into on a content page
pub fn image_box() -> Rect {
    let width_mm = PAGE_WIDTH_MM - 2.0 * IMAGE_MARGIN_MM;
    let height_mm = width_mm * IMAGE_HEIGHT_RATIO;
    Rect {
        x: mm(IMAGE_MARGIN_MM),
        y: mm(PAGE_HEIGHT_MM - IMAGE_TOP_MM - height_mm),
        width: mm(width_mm),
        height: mm(height_mm),
    }
}

// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // a..z
    334, 260, 334, 584, // {..~
];

const DEFAULT_WIDTH: u16 = 556;

/// Width of `text` set in Helvetica at `size` points
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = encode_win_ansi(text)
        .iter()
        .map(|&b| match b {
            0x20..=0x7E => HELVETICA_WIDTHS[(b - 0x20) as usize] as u32,
            _ => DEFAULT_WIDTH as u32,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// x coordinate that centres `text` horizontally on the page
pub fn centered_x(text: &str, size: f32) -> f32 {
    ((page_width() - text_width(text, size)) / 2.0).max(0.0)
}

/// Bytes for a simple Helvetica font with WinAnsiEncoding.
///
/// Latin-1 characters map straight through; anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            cp @ (0x20..=0x7E | 0xA0..=0xFF) => cp as u8,
            _ => b'?',
        })
        .collect()
}
