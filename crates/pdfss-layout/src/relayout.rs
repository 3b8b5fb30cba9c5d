//! Reconstruction of logical text groups from the glyphs of a page.
//!
//! Layout trees come in an arbitrary order, not consistent with the visual
//! display of the PDF. [`relayout`] regroups chars into [`TextBlock`]s, blocks
//! into [`Line`]s and lines into column-aligned [`LinesGroup`]s, ordered from
//! the top of the page.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use pdfss_core::{Anno, Glyph, LayoutObject, ObjectKind};

use crate::RelayoutError;
use crate::config::RelayoutConfig;
use crate::grouping::{LineInfo, TextMerger};

/// Totally ordered coordinate, used as map key.
#[derive(Debug, Clone, Copy)]
struct Coord(f64);

impl Coord {
    fn new(value: f64) -> Self {
        // fold -0.0 into 0.0
        Coord(value + 0.0)
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coord {}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct LineKey {
    y0: Coord,
    font_name: String,
    font_size: Coord,
}

impl LineKey {
    fn info(&self) -> LineInfo {
        LineInfo {
            y0: self.y0.0,
            font_name: self.font_name.clone(),
            font_size: self.font_size.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PlacedGlyph<'a> {
    glyph: &'a Glyph,
    /// The char was preceded by an annotation (a word or line separator).
    space_left: bool,
}

/// Chars of a line indexed by their x0.
type GlyphIndex<'a> = BTreeMap<Coord, Vec<PlacedGlyph<'a>>>;
type LineIndex<'a> = BTreeMap<LineKey, GlyphIndex<'a>>;

/// Text item yielded by [`iter_text`].
#[derive(Debug, Clone, Copy)]
pub enum TextItem<'a> {
    Char(&'a Glyph),
    Anno(&'a Anno),
}

/// A logical group of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    /// Left coordinate of the whole block.
    pub x0: f64,
    /// Right coordinate of the whole block.
    pub x1: f64,
    /// Left coordinate of the latest char in the block.
    pub latest_x0: f64,
}

impl TextBlock {
    pub fn new(text: &str, x0: f64, x1: f64) -> Self {
        Self {
            text: text.to_string(),
            x0,
            x1,
            latest_x0: x0,
        }
    }

    fn blank() -> Self {
        Self::new("", 0.0, 0.0)
    }

    fn append(&mut self, text: &str, x0: f64, x1: f64) {
        self.x1 = x1;
        self.text.push_str(text);
        self.latest_x0 = x0;
    }
}

impl fmt::Display for TextBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?}>", self.text)
    }
}

/// A logical line, holding text blocks ordered from left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub font_name: String,
    pub font_size: f64,
    pub y0: f64,
    pub blocks: Vec<TextBlock>,
    /// x1 of each block, kept sorted alongside `blocks`.
    block_index: Vec<f64>,
}

impl Line {
    fn new(font_name: String, font_size: f64, y0: f64) -> Self {
        Self {
            font_name,
            font_size,
            y0,
            blocks: Vec::new(),
            block_index: Vec::new(),
        }
    }

    /// Text of each block.
    pub fn texts(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }

    /// Insert an empty block, used to align a line on the columns of the
    /// line above it.
    pub fn insert_blank_at(&mut self, index: usize) {
        self.blocks.insert(index, TextBlock::blank());
        self.block_index.insert(index, 0.0);
    }

    fn append(&mut self, glyph: &Glyph, space_left: bool, merger: &dyn TextMerger) {
        let mut glyph = Cow::Borrowed(glyph);
        if glyph.bbox.width() == 0.0 {
            // some chars (pictograms, broken glyphs) have no width: give them
            // one relative to the font size
            let g = glyph.to_mut();
            g.bbox.x1 = g.bbox.x0 + g.font_size / 10.0;
        }
        let (x0, x1) = (glyph.bbox.x0, glyph.bbox.x1);

        let index = self.block_index.partition_point(|&bx1| bx1 <= x1);
        if index > 0 && merger.should_merge(&self.blocks[index - 1], &glyph) {
            let block = &mut self.blocks[index - 1];
            if space_left {
                block.text.push(' ');
            }
            block.append(&glyph.text, x0, x1);
            self.block_index[index - 1] = x1;
        } else {
            self.blocks
                .insert(index, TextBlock::new(&glyph.text, x0, x1));
            self.block_index.insert(index, x1);
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{block}")?;
        }
        f.write_str("]")
    }
}

/// Lines logically grouped: consecutive lines sharing a column start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinesGroup {
    lines: Vec<Line>,
}

impl LinesGroup {
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Text of each block of each line.
    pub fn texts(&self) -> Vec<Vec<String>> {
        self.lines
            .iter()
            .map(|line| line.blocks.iter().map(|b| b.text.clone()).collect())
            .collect()
    }

    fn last_line(&self) -> Option<&Line> {
        self.lines.last()
    }

    fn first_y0(&self) -> f64 {
        self.lines.first().map_or(f64::NEG_INFINITY, |l| l.y0)
    }
}

impl<'a> IntoIterator for &'a LinesGroup {
    type Item = &'a Line;
    type IntoIter = std::slice::Iter<'a, Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// Depth-first list of the chars and annotations below `obj`.
///
/// Objects of `skip_kinds` are neither yielded nor recursed into. Any other
/// object that is neither a container nor text is an error.
pub fn iter_text<'a>(
    obj: &'a LayoutObject,
    skip_kinds: &[ObjectKind],
) -> Result<Vec<TextItem<'a>>, RelayoutError> {
    let mut items = Vec::new();
    let mut stack = vec![obj];
    while let Some(current) = stack.pop() {
        if skip_kinds.contains(&current.kind()) {
            continue;
        }
        match current {
            LayoutObject::Char(g) => items.push(TextItem::Char(g)),
            LayoutObject::Anno(a) => items.push(TextItem::Anno(a)),
            other if other.kind().is_container() => stack.extend(other.children().iter().rev()),
            other => return Err(RelayoutError::UnexpectedObject(other.kind())),
        }
    }
    Ok(items)
}

/// Regroup the text of `page` (usually a [`LayoutObject::Page`]) into
/// [`LinesGroup`]s ordered from the top of the page.
pub fn relayout(
    page: &LayoutObject,
    config: &RelayoutConfig,
) -> Result<Vec<LinesGroup>, RelayoutError> {
    let skip_kinds = config.skip_kinds.as_slice();

    // A page made of one skipped figure wrapping all the content: use the
    // figure's content instead.
    let items = match page.children() {
        [LayoutObject::Figure(figure)]
            if skip_kinds.contains(&ObjectKind::Figure) && !skip_kinds.contains(&page.kind()) =>
        {
            let mut items = Vec::new();
            for child in &figure.objects {
                items.extend(iter_text(child, skip_kinds)?);
            }
            items
        }
        _ => iter_text(page, skip_kinds)?,
    };

    if items.is_empty() && page.is_figure_only_page() {
        tracing::debug!("figure only page without text");
    }

    let mut line_index = collect_glyphs(&items, config);
    regroup_lines(&mut line_index, config);
    tracing::trace!(lines = %dump_line_index(&line_index), "regrouped lines");

    let lines: Vec<Line> = line_index
        .iter()
        .rev()
        .map(|(key, glyphs)| {
            let mut line = Line::new(key.font_name.clone(), key.font_size.0, key.y0.0);
            for placed in glyphs.values().flatten() {
                line.append(placed.glyph, placed.space_left, config.text_merger.as_ref());
            }
            line
        })
        .collect();
    let line_count = lines.len();

    let groups = group_columns(lines);
    tracing::debug!(lines = line_count, groups = groups.len(), "relayout complete");
    Ok(groups)
}

/// Index chars per line key then per x0, remembering which ones follow an
/// annotation.
fn collect_glyphs<'a>(items: &[TextItem<'a>], config: &RelayoutConfig) -> LineIndex<'a> {
    let mut line_index = LineIndex::new();
    let mut latest_is_anno = false;
    for item in items {
        let glyph = match *item {
            TextItem::Anno(_) => {
                latest_is_anno = true;
                continue;
            }
            TextItem::Char(glyph) => glyph,
        };
        let space_left = latest_is_anno;
        latest_is_anno = false;

        if let Some(filter) = &config.char_filter
            && !filter(glyph)
        {
            continue;
        }

        let key = LineKey {
            y0: Coord::new(glyph.bbox.y0),
            font_name: glyph.font_name.to_lowercase(),
            font_size: Coord::new(glyph.font_size),
        };
        line_index
            .entry(key)
            .or_default()
            .entry(Coord::new(glyph.bbox.x0))
            .or_default()
            .push(PlacedGlyph { glyph, space_left });
    }
    line_index
}

/// Drop lines listed in the skip text and merge lines that may be out of
/// sync because of different font sizes (e.g. bold vs standard font).
fn regroup_lines(line_index: &mut LineIndex<'_>, config: &RelayoutConfig) {
    let keys: Vec<LineKey> = line_index.keys().rev().cloned().collect();
    let mut latest: Option<LineKey> = None;

    for key in keys {
        if !config.skip_text.is_empty()
            && line_index
                .get(&key)
                .is_some_and(|glyphs| config.skip_text.contains(&dump_glyph_index(glyphs)))
        {
            line_index.remove(&key);
            continue;
        }

        if let Some(latest_key) = &latest {
            let info = key.info();
            let latest_info = latest_key.info();
            debug_assert!(latest_info.y0 >= info.y0);
            if config.line_grouper.should_group(&info, &latest_info)
                && let Some(previous) = line_index.remove(latest_key)
                && let Some(current) = line_index.get_mut(&key)
            {
                current.extend(previous);
            }
        }
        latest = Some(key);
    }
}

/// Assign each line to a group of column-aligned lines.
fn group_columns(lines: Vec<Line>) -> Vec<LinesGroup> {
    let mut groups: Vec<LinesGroup> = Vec::new();
    // groups per x0 of their lines' first block, in insertion order
    let mut group_index: Vec<(Coord, Vec<usize>)> = Vec::new();
    let mut previous: Option<usize> = None;

    for mut line in lines {
        if line.blocks.is_empty() {
            continue;
        }
        let group = line_group(&mut line, &mut groups, &mut group_index, previous);
        groups[group].lines.push(line);
        previous = Some(group);
    }

    let mut order: Vec<usize> = group_index
        .iter()
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect();
    order.sort_by(|&a, &b| groups[b].first_y0().total_cmp(&groups[a].first_y0()));

    let mut slots: Vec<Option<LinesGroup>> = groups.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|id| slots[id].take())
        .collect()
}

/// Index of the group `line` should be added to, creating it if needed.
fn line_group(
    line: &mut Line,
    groups: &mut Vec<LinesGroup>,
    group_index: &mut Vec<(Coord, Vec<usize>)>,
    previous: Option<usize>,
) -> usize {
    let start = line.blocks[0].x0;

    // the line starts at some column of the previous line
    // TODO: also match x1 for right aligned columns
    if let Some(previous) = previous
        && let Some(prev_line) = groups[previous].last_line()
        && let Some(column) = prev_line.blocks.iter().position(|b| b.x0 == start)
    {
        for _ in 0..column {
            line.insert_blank_at(0);
        }
        return previous;
    }

    let new_group = |groups: &mut Vec<LinesGroup>| {
        groups.push(LinesGroup::default());
        groups.len() - 1
    };

    let start_key = Coord::new(start);
    let Some(slot) = group_index.iter().position(|(x0, _)| *x0 == start_key) else {
        let id = new_group(groups);
        group_index.push((start_key, vec![id]));
        return id;
    };
    let Some(&candidate) = group_index[slot].1.last() else {
        let id = new_group(groups);
        group_index[slot].1.push(id);
        return id;
    };

    let too_far = groups[candidate]
        .last_line()
        .is_some_and(|last| last.y0 - line.y0 > line.font_size * 2.0);
    let overlaps = previous
        .and_then(|id| groups[id].last_line())
        .is_some_and(|prev_line| horizontally_overlap(prev_line, line));

    if too_far || overlaps {
        let id = new_group(groups);
        group_index[slot].1.push(id);
        id
    } else {
        candidate
    }
}

fn horizontally_overlap(upper: &Line, line: &Line) -> bool {
    match (
        upper.blocks.first(),
        upper.blocks.last(),
        line.blocks.first(),
        line.blocks.last(),
    ) {
        (Some(upper_first), Some(upper_last), Some(first), Some(last)) => {
            upper_last.x1 > first.x0 && upper_first.x0 < last.x1
        }
        _ => false,
    }
}

/// Text of a line's chars, a space marking chars preceded by an annotation.
fn dump_glyph_index(glyphs: &GlyphIndex<'_>) -> String {
    let mut out = String::new();
    for (i, placed_glyphs) in glyphs.values().enumerate() {
        for placed in placed_glyphs {
            if i > 0 && placed.space_left {
                out.push(' ');
            }
            out.push_str(&placed.glyph.text);
        }
    }
    out
}

fn dump_line_index(line_index: &LineIndex<'_>) -> String {
    line_index
        .iter()
        .rev()
        .map(|(key, glyphs)| {
            format!(
                "({}, {:?}, {}): {}",
                key.y0.0,
                key.font_name,
                key.font_size.0,
                dump_glyph_index(glyphs)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
