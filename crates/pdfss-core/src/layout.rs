use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// Bounding box in PDF user space: origin at the bottom-left corner of the
/// page, `y` growing upward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Copy of this box with every coordinate rounded to `decimals` places.
    pub fn rounded(&self, decimals: i32) -> Self {
        Self {
            x0: round_to(self.x0, decimals),
            y0: round_to(self.y0, decimals),
            x1: round_to(self.x1, decimals),
            y1: round_to(self.y1, decimals),
        }
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3},{:.3},{:.3},{:.3}",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Kind of a [`LayoutObject`], without its payload. Used wherever a set of
/// object types must be named, e.g. the kinds skipped by relayout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Page,
    TextBox,
    TextLine,
    Figure,
    Char,
    Anno,
    Image,
    Line,
    Rect,
    Curve,
}

/// Kinds skipped by default: graphics and figures carry no text of interest.
pub const DEFAULT_SKIP_KINDS: &[ObjectKind] = &[
    ObjectKind::Curve,
    ObjectKind::Figure,
    ObjectKind::Image,
    ObjectKind::Line,
    ObjectKind::Rect,
];

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Page => "Page",
            ObjectKind::TextBox => "TextBox",
            ObjectKind::TextLine => "TextLine",
            ObjectKind::Figure => "Figure",
            ObjectKind::Char => "Char",
            ObjectKind::Anno => "Anno",
            ObjectKind::Image => "Image",
            ObjectKind::Line => "Line",
            ObjectKind::Rect => "Rect",
            ObjectKind::Curve => "Curve",
        }
    }

    /// Whether objects of this kind hold child objects.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ObjectKind::Page | ObjectKind::TextBox | ObjectKind::TextLine | ObjectKind::Figure
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "page" => ObjectKind::Page,
            "textbox" => ObjectKind::TextBox,
            "textline" => ObjectKind::TextLine,
            "figure" => ObjectKind::Figure,
            "char" => ObjectKind::Char,
            "anno" => ObjectKind::Anno,
            "image" => ObjectKind::Image,
            "line" => ObjectKind::Line,
            "rect" => ObjectKind::Rect,
            "curve" => ObjectKind::Curve,
            _ => return Err(LayoutError::UnknownKind(s.to_string())),
        };
        Ok(kind)
    }
}

/// A page of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number in the source document.
    pub number: u32,
    pub bbox: BBox,
    #[serde(default)]
    pub objects: Vec<LayoutObject>,
}

/// Text box, text line or figure: a positioned group of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub bbox: BBox,
    #[serde(default)]
    pub objects: Vec<LayoutObject>,
}

/// A single positioned glyph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub text: String,
    #[serde(default)]
    pub font_name: String,
    pub font_size: f64,
    pub bbox: BBox,
}

/// Virtual text inserted by the layout analysis, without geometry: `" "`
/// between words and `"\n"` at the end of a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anno {
    pub text: String,
}

/// Non-text graphic element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub bbox: BBox,
}

/// Node of the layout tree built from a PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayoutObject {
    Page(Page),
    TextBox(Container),
    TextLine(Container),
    Figure(Container),
    Char(Glyph),
    Anno(Anno),
    Image(Shape),
    Line(Shape),
    Rect(Shape),
    Curve(Shape),
}

impl LayoutObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            LayoutObject::Page(_) => ObjectKind::Page,
            LayoutObject::TextBox(_) => ObjectKind::TextBox,
            LayoutObject::TextLine(_) => ObjectKind::TextLine,
            LayoutObject::Figure(_) => ObjectKind::Figure,
            LayoutObject::Char(_) => ObjectKind::Char,
            LayoutObject::Anno(_) => ObjectKind::Anno,
            LayoutObject::Image(_) => ObjectKind::Image,
            LayoutObject::Line(_) => ObjectKind::Line,
            LayoutObject::Rect(_) => ObjectKind::Rect,
            LayoutObject::Curve(_) => ObjectKind::Curve,
        }
    }

    /// Bounding box, `None` for annotations which have no geometry.
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            LayoutObject::Page(p) => Some(p.bbox),
            LayoutObject::TextBox(c) | LayoutObject::TextLine(c) | LayoutObject::Figure(c) => {
                Some(c.bbox)
            }
            LayoutObject::Char(g) => Some(g.bbox),
            LayoutObject::Anno(_) => None,
            LayoutObject::Image(s)
            | LayoutObject::Line(s)
            | LayoutObject::Rect(s)
            | LayoutObject::Curve(s) => Some(s.bbox),
        }
    }

    /// Child objects, empty for leaves.
    pub fn children(&self) -> &[LayoutObject] {
        match self {
            LayoutObject::Page(p) => &p.objects,
            LayoutObject::TextBox(c) | LayoutObject::TextLine(c) | LayoutObject::Figure(c) => {
                &c.objects
            }
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<LayoutObject>> {
        match self {
            LayoutObject::Page(p) => Some(&mut p.objects),
            LayoutObject::TextBox(c) | LayoutObject::TextLine(c) | LayoutObject::Figure(c) => {
                Some(&mut c.objects)
            }
            _ => None,
        }
    }

    /// Text held by this object and its descendants, in tree order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            LayoutObject::Char(g) => out.push_str(&g.text),
            LayoutObject::Anno(a) => out.push_str(&a.text),
            other => {
                for child in other.children() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// True for a page whose only content is a single figure, which usually
    /// means a scanned document with no text layer.
    pub fn is_figure_only_page(&self) -> bool {
        match self {
            LayoutObject::Page(p) => {
                p.objects.len() == 1 && matches!(p.objects[0], LayoutObject::Figure(_))
            }
            _ => false,
        }
    }

    /// Copy of this tree without objects of the given kinds and with
    /// coordinates and font sizes rounded to `decimals` places. Returns `None`
    /// when this object itself is of a dropped kind.
    pub fn pruned(&self, drop_kinds: &[ObjectKind], decimals: i32) -> Option<LayoutObject> {
        if drop_kinds.contains(&self.kind()) {
            return None;
        }
        let mut copy = match self {
            LayoutObject::Page(p) => LayoutObject::Page(Page {
                number: p.number,
                bbox: p.bbox.rounded(decimals),
                objects: Vec::new(),
            }),
            LayoutObject::TextBox(c) => LayoutObject::TextBox(rounded_container(c, decimals)),
            LayoutObject::TextLine(c) => LayoutObject::TextLine(rounded_container(c, decimals)),
            LayoutObject::Figure(c) => LayoutObject::Figure(rounded_container(c, decimals)),
            LayoutObject::Char(g) => LayoutObject::Char(Glyph {
                text: g.text.clone(),
                font_name: g.font_name.clone(),
                font_size: round_to(g.font_size, decimals),
                bbox: g.bbox.rounded(decimals),
            }),
            LayoutObject::Anno(a) => LayoutObject::Anno(a.clone()),
            LayoutObject::Image(s) => LayoutObject::Image(rounded_shape(s, decimals)),
            LayoutObject::Line(s) => LayoutObject::Line(rounded_shape(s, decimals)),
            LayoutObject::Rect(s) => LayoutObject::Rect(rounded_shape(s, decimals)),
            LayoutObject::Curve(s) => LayoutObject::Curve(rounded_shape(s, decimals)),
        };
        if let Some(objects) = copy.children_mut() {
            objects.extend(
                self.children()
                    .iter()
                    .filter_map(|child| child.pruned(drop_kinds, decimals)),
            );
        }
        Some(copy)
    }
}

fn rounded_container(c: &Container, decimals: i32) -> Container {
    Container {
        bbox: c.bbox.rounded(decimals),
        objects: Vec::new(),
    }
}

fn rounded_shape(s: &Shape, decimals: i32) -> Shape {
    Shape {
        bbox: s.bbox.rounded(decimals),
    }
}

impl fmt::Display for LayoutObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutObject::Page(p) => write!(f, "<Page({}) {}>", p.number, p.bbox),
            LayoutObject::TextBox(c) | LayoutObject::TextLine(c) => {
                write!(f, "<{} {} {:?}>", self.kind(), c.bbox, self.text())
            }
            LayoutObject::Figure(c) => write!(f, "<Figure {}>", c.bbox),
            LayoutObject::Char(g) => write!(
                f,
                "<Char {} font={:?} size={:.2} {:?}>",
                g.bbox, g.font_name, g.font_size, g.text
            ),
            LayoutObject::Anno(a) => write!(f, "<Anno {:?}>", a.text),
            LayoutObject::Image(s)
            | LayoutObject::Line(s)
            | LayoutObject::Rect(s)
            | LayoutObject::Curve(s) => write!(f, "<{} {}>", self.kind(), s.bbox),
        }
    }
}
