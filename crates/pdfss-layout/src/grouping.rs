use pdfss_core::Glyph;

use crate::relayout::TextBlock;

/// Information about a line needed to decide whether it should be grouped
/// with the line above it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInfo {
    pub y0: f64,
    /// Lowercased font name.
    pub font_name: String,
    pub font_size: f64,
}

impl LineInfo {
    fn is_bold(&self) -> bool {
        self.font_name.ends_with("-bold")
    }
}

/// Decides whether two lines found at nearby Y coordinates are the same
/// logical line (e.g. a bold label next to a regular value).
pub trait LineGrouper: Send + Sync {
    /// `previous` is the line directly above `line`.
    fn should_group(&self, line: &LineInfo, previous: &LineInfo) -> bool;
}

/// Decides whether a char continues a text block or starts a new one.
pub trait TextMerger: Send + Sync {
    fn should_merge(&self, block: &TextBlock, glyph: &Glyph) -> bool;
}

impl<F> LineGrouper for F
where
    F: Fn(&LineInfo, &LineInfo) -> bool + Send + Sync,
{
    fn should_group(&self, line: &LineInfo, previous: &LineInfo) -> bool {
        self(line, previous)
    }
}

impl<F> TextMerger for F
where
    F: Fn(&TextBlock, &Glyph) -> bool + Send + Sync,
{
    fn should_merge(&self, block: &TextBlock, glyph: &Glyph) -> bool {
        self(block, glyph)
    }
}

/// Groups lines whose font sizes are compatible and whose Y difference is
/// below some factor of the font size difference, considering bold variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultLineGrouper {
    /// Multiplied with the greatest font size to give the maximum font size
    /// difference allowed between grouped lines.
    pub font_size_diff_factor: f64,
    /// Floor of the allowed Y difference, which is otherwise derived from
    /// the font size difference (and may be 0).
    pub min_y_diff: f64,
}

impl Default for DefaultLineGrouper {
    fn default() -> Self {
        Self {
            font_size_diff_factor: 0.15,
            min_y_diff: 1.1,
        }
    }
}

impl LineGrouper for DefaultLineGrouper {
    fn should_group(&self, line: &LineInfo, previous: &LineInfo) -> bool {
        let allowed_diff = previous.font_size.max(line.font_size) * self.font_size_diff_factor;
        let diff = (previous.font_size - line.font_size).abs();
        let allowed_y_diff = if line.is_bold() != previous.is_bold() {
            diff * 1.5
        } else {
            diff
        };
        let allowed_y_diff = allowed_y_diff.max(self.min_y_diff);

        diff < allowed_diff && (previous.y0 - line.y0) <= allowed_y_diff
    }
}

/// Appends a char to the block on its left when the gap between them is no
/// wider than the char width times `width_factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultTextMerger {
    pub width_factor: f64,
}

impl Default for DefaultTextMerger {
    fn default() -> Self {
        Self { width_factor: 1.4 }
    }
}

impl TextMerger for DefaultTextMerger {
    fn should_merge(&self, block: &TextBlock, glyph: &Glyph) -> bool {
        let width = glyph.bbox.width() * self.width_factor;
        glyph.bbox.x0 - block.x1 <= width
    }
}
