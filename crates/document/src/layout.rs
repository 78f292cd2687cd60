//! Page layout
//!
//! The cursor measures distance from the top edge of the page, growing
//! downwards; it is flipped into PDF coordinates only when an operation is
//! emitted.

use crate::text::win_ansi;
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

/// A4 in points
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

pub const MARGIN_LEFT: f32 = 50.0;
pub const MARGIN_TOP: f32 = 50.0;
pub const CONTENT_WIDTH: f32 = 495.0;

/// Content below this cursor position continues on a new page
pub const PAGE_BOTTOM: f32 = 790.0;

/// The closing block starts on a new page when the cursor is past this line
pub const CLOSING_BLOCK_THRESHOLD: f32 = 650.0;

const LINE_SPACING: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    /// Resource name in the page's font dictionary
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Collects drawing operations page by page
#[derive(Debug)]
pub struct Canvas {
    pages: Vec<Vec<Operation>>,
    cursor: f32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            cursor: MARGIN_TOP,
        }
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_pages(self) -> Vec<Vec<Operation>> {
        self.pages
    }

    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = MARGIN_TOP;
    }

    pub fn advance(&mut self, dy: f32) {
        self.cursor += dy;
    }

    /// Start a new page unless `height` more points fit on this one
    pub fn ensure_space(&mut self, height: f32) {
        if self.cursor + height > PAGE_BOTTOM {
            self.new_page();
        }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        // `pages` always holds at least one page
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Draw text with its top at the cursor without moving the cursor
    pub fn text_at(&mut self, font: Font, size: f32, x: f32, text: &str) {
        let baseline = PAGE_HEIGHT - (self.cursor + size);
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), size.into()],
        ));
        ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    /// Draw one line at the left margin and move below it
    pub fn line(&mut self, font: Font, size: f32, text: &str) {
        let height = size * LINE_SPACING;
        self.ensure_space(height);
        self.text_at(font, size, MARGIN_LEFT, text);
        self.advance(height);
    }

    /// `label: value` with a bold label
    pub fn labeled(&mut self, size: f32, label: &str, value: &str) {
        let height = size * LINE_SPACING;
        self.ensure_space(height);
        self.text_at(Font::Bold, size, MARGIN_LEFT, &format!("{}:", label));
        self.text_at(Font::Regular, size, MARGIN_LEFT + 130.0, value);
        self.advance(height);
    }

    /// Horizontal rule at the cursor from `x1` to `x2`
    pub fn rule(&mut self, x1: f32, x2: f32) {
        let y = PAGE_HEIGHT - self.cursor;
        let ops = self.ops();
        ops.push(Operation::new("w", vec![0.5f32.into()]));
        ops.push(Operation::new("m", vec![x1.into(), y.into()]));
        ops.push(Operation::new("l", vec![x2.into(), y.into()]));
        ops.push(Operation::new("S", vec![]));
    }

    /// Paint an image XObject with its top-left corner at `(x, top)`
    pub fn image(&mut self, resource: &str, x: f32, top: f32, width: f32, height: f32) {
        let bottom = PAGE_HEIGHT - (top + height);
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), bottom.into()],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(resource.as_bytes().to_vec())]));
        ops.push(Operation::new("Q", vec![]));
    }
}
