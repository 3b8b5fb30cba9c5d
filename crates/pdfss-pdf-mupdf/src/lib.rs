use std::path::Path;

use mupdf::{Document, Page, Quad, Rect, TextBlockType, TextPageFlags};

use pdfss_core::{Anno, BBox, BackendError, Container, Glyph, LayoutObject, PdfBackend, Shape};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that the relayout engine and the converters do not
/// transitively depend on it.
///
/// MuPDF works with a top-left origin, layout trees are flipped to the PDF
/// bottom-left origin so that greater `y0` means higher on the page. Font
/// names are not exposed by MuPDF text pages and are left empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<Document, BackendError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
    Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))
}

fn extraction_error(e: mupdf::Error) -> BackendError {
    BackendError::ExtractionError(e.to_string())
}

impl PdfBackend for MupdfBackend {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        let document = open(path)?;

        let mut pages_text = Vec::new();
        for page_result in document.pages().map_err(extraction_error)? {
            let page = page_result.map_err(extraction_error)?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(extraction_error)?;

            let mut page_text = String::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    page_text.push_str(&line_text);
                    page_text.push('\n');
                }
            }
            pages_text.push(page_text);
        }

        tracing::debug!(path = %path.display(), pages = pages_text.len(), "extracted text");
        Ok(pages_text.join("\n"))
    }

    fn extract_pages(
        &self,
        path: &Path,
        pages: Option<&[u32]>,
    ) -> Result<Vec<LayoutObject>, BackendError> {
        let document = open(path)?;
        let count = u32::try_from(document.page_count().map_err(extraction_error)?).unwrap_or(0);

        let numbers: Vec<u32> = match pages {
            Some(requested) => {
                if let Some(&bad) = requested.iter().find(|&&n| n == 0 || n > count) {
                    return Err(BackendError::PageOutOfRange {
                        requested: bad,
                        count,
                    });
                }
                (1..=count).filter(|n| requested.contains(n)).collect()
            }
            None => (1..=count).collect(),
        };

        let mut layout = Vec::with_capacity(numbers.len());
        for number in numbers {
            let index = i32::try_from(number - 1).map_err(|_| BackendError::PageOutOfRange {
                requested: number,
                count,
            })?;
            let page = document.load_page(index).map_err(extraction_error)?;
            layout.push(page_layout(&page, number)?);
        }
        tracing::debug!(path = %path.display(), pages = layout.len(), "extracted layout");
        Ok(layout)
    }
}

/// Layout tree of one page: image blocks become images, text blocks become
/// text boxes holding text lines of chars. Whitespace is turned into
/// annotations and each line ends with a newline annotation.
fn page_layout(page: &Page, number: u32) -> Result<LayoutObject, BackendError> {
    let bounds = page.bounds().map_err(extraction_error)?;
    let frame = PageFrame::from_rect(&bounds);
    let text_page = page
        .to_text_page(TextPageFlags::PRESERVE_IMAGES)
        .map_err(extraction_error)?;

    let mut boxes = Vec::new();
    for block in text_page.blocks() {
        if matches!(block.r#type(), TextBlockType::Image) {
            boxes.push(LayoutObject::Image(Shape {
                bbox: frame.rect_bbox(&block.bounds()),
            }));
            continue;
        }
        let mut lines = Vec::new();
        for line in block.lines() {
            let mut objects = Vec::new();
            for c in line.chars() {
                let text = c.char().unwrap_or('\u{FFFD}');
                if text.is_whitespace() {
                    objects.push(LayoutObject::Anno(Anno {
                        text: " ".to_string(),
                    }));
                    continue;
                }
                objects.push(LayoutObject::Char(Glyph {
                    text: text.to_string(),
                    font_name: String::new(),
                    font_size: f64::from(c.size()),
                    bbox: frame.quad_bbox(&c.quad()),
                }));
            }
            objects.push(LayoutObject::Anno(Anno {
                text: "\n".to_string(),
            }));
            lines.push(LayoutObject::TextLine(Container {
                bbox: frame.rect_bbox(&line.bounds()),
                objects,
            }));
        }
        boxes.push(LayoutObject::TextBox(Container {
            bbox: frame.rect_bbox(&block.bounds()),
            objects: lines,
        }));
    }

    Ok(LayoutObject::Page(pdfss_core::Page {
        number,
        bbox: frame.page_bbox(),
        objects: boxes,
    }))
}

/// Page geometry needed to convert MuPDF coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageFrame {
    x0: f64,
    top: f64,
    x1: f64,
    bottom: f64,
}

impl PageFrame {
    fn from_rect(rect: &Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.x1, rect.y1)
    }

    fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0: f64::from(x0),
            top: f64::from(top),
            x1: f64::from(x1),
            bottom: f64::from(bottom),
        }
    }

    fn page_bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.x1 - self.x0, self.bottom - self.top)
    }

    /// Flip a top-down y coordinate.
    fn flip_y(&self, y: f32) -> f64 {
        self.bottom - f64::from(y)
    }

    fn rect_bbox(&self, rect: &Rect) -> BBox {
        self.bbox(rect.x0, rect.y0, rect.x1, rect.y1)
    }

    fn quad_bbox(&self, quad: &Quad) -> BBox {
        self.bbox(
            quad.ul.x.min(quad.ll.x),
            quad.ul.y.min(quad.ur.y),
            quad.ur.x.max(quad.lr.x),
            quad.ll.y.max(quad.lr.y),
        )
    }

    fn bbox(&self, left: f32, top: f32, right: f32, bottom: f32) -> BBox {
        BBox::new(
            f64::from(left) - self.x0,
            self.flip_y(bottom),
            f64::from(right) - self.x0,
            self.flip_y(top),
        )
    }
}

#[cfg(test)]
mod tests {
    use mupdf::Point;

    use super::*;

    #[test]
    fn test_page_bbox() {
        let frame = PageFrame::new(0.0, 0.0, 595.0, 842.0);
        assert_eq!(frame.page_bbox(), BBox::new(0.0, 0.0, 595.0, 842.0));
    }

    #[test]
    fn test_bbox_is_flipped() {
        let frame = PageFrame::new(0.0, 0.0, 595.0, 842.0);
        let bbox = frame.bbox(10.0, 42.0, 20.0, 52.0);
        assert_eq!(bbox, BBox::new(10.0, 790.0, 20.0, 800.0));
        assert!(bbox.y1 > bbox.y0);
    }

    #[test]
    fn test_quad_bbox_takes_outer_corners() {
        let frame = PageFrame::new(0.0, 0.0, 100.0, 100.0);
        let quad = Quad {
            ul: Point { x: 10.0, y: 20.0 },
            ur: Point { x: 15.0, y: 19.0 },
            ll: Point { x: 9.0, y: 30.0 },
            lr: Point { x: 14.0, y: 31.0 },
        };
        assert_eq!(frame.quad_bbox(&quad), BBox::new(9.0, 69.0, 15.0, 81.0));
    }

    #[test]
    fn test_offset_page_origin() {
        let frame = PageFrame::new(5.0, 10.0, 105.0, 110.0);
        assert_eq!(frame.page_bbox(), BBox::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(frame.bbox(5.0, 10.0, 6.0, 20.0).x0, 0.0);
    }

    #[test]
    fn test_open_missing_file() {
        let result = MupdfBackend::new().extract_pages(Path::new("/nonexistent/file.pdf"), None);
        assert!(matches!(result, Err(BackendError::OpenError(_))));
    }
}
