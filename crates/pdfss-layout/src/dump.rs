//! Human and machine readable dumps of the layout trees of a PDF, to help
//! debugging or building scrapers.

use std::io::{Read, Write};
use std::path::Path;

use pdfss_core::{BackendError, LayoutObject, ObjectKind, PdfBackend};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimals kept on coordinates and font sizes of JSON dumps.
const JSON_DECIMALS: i32 = 2;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid layout JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Layout trees of some pages of a PDF, as stored in JSON dumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDump {
    pub pages: Vec<LayoutObject>,
}

/// Plain text of the PDF at `path`.
pub fn pdf2text(path: &Path, backend: &dyn PdfBackend) -> Result<String, DumpError> {
    Ok(backend.extract_text(path)?)
}

/// Print the layout tree of each selected page (numbered from 1) to `out`.
///
/// Text boxes and text lines are expanded, other objects are printed on a
/// single line.
pub fn dump_pdf_structure(
    path: &Path,
    backend: &dyn PdfBackend,
    pages: Option<&[u32]>,
    out: &mut dyn Write,
) -> Result<(), DumpError> {
    for page in backend.extract_pages(path, pages)? {
        write_structure(&page, out)?;
    }
    Ok(())
}

fn write_structure(page: &LayoutObject, out: &mut dyn Write) -> std::io::Result<()> {
    let number = match page {
        LayoutObject::Page(p) => p.number,
        _ => 0,
    };
    writeln!(out, "{} page {number}", "*".repeat(80))?;

    let mut stack: Vec<(String, &LayoutObject)> = page
        .children()
        .iter()
        .rev()
        .map(|obj| (String::new(), obj))
        .collect();
    while let Some((prefix, obj)) = stack.pop() {
        writeln!(out, "{prefix} {obj}")?;
        if matches!(obj.kind(), ObjectKind::TextBox | ObjectKind::TextLine) {
            let indented = format!("{prefix}  ");
            stack.extend(obj.children().iter().rev().map(|c| (indented.clone(), c)));
        }
    }
    Ok(())
}

/// Write the layout trees of the selected pages as a [`LayoutDump`] JSON
/// document, omitting objects of `skip_kinds`.
pub fn dump_layout_json(
    path: &Path,
    backend: &dyn PdfBackend,
    pages: Option<&[u32]>,
    skip_kinds: &[ObjectKind],
    out: &mut dyn Write,
) -> Result<(), DumpError> {
    let pages: Vec<LayoutObject> = backend
        .extract_pages(path, pages)?
        .iter()
        .filter_map(|page| page.pruned(skip_kinds, JSON_DECIMALS))
        .collect();
    tracing::debug!(path = %path.display(), pages = pages.len(), "dumping layout");

    serde_json::to_writer_pretty(&mut *out, &LayoutDump { pages })?;
    writeln!(out)?;
    Ok(())
}

/// Read back a document written by [`dump_layout_json`].
pub fn load_layout_json(reader: impl Read) -> Result<LayoutDump, DumpError> {
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use pdfss_core::{Anno, BBox, Container, Glyph, Page, Shape};

    use super::*;

    /// Backend serving a fixed set of pages.
    struct FixedBackend(Vec<LayoutObject>);

    impl PdfBackend for FixedBackend {
        fn extract_text(&self, _path: &Path) -> Result<String, BackendError> {
            Ok(self.0.iter().map(LayoutObject::text).collect())
        }

        fn extract_pages(
            &self,
            _path: &Path,
            pages: Option<&[u32]>,
        ) -> Result<Vec<LayoutObject>, BackendError> {
            Ok(self
                .0
                .iter()
                .filter(|page| match page {
                    LayoutObject::Page(p) => pdfss_core::page_selected(pages, p.number),
                    _ => false,
                })
                .cloned()
                .collect())
        }
    }

    fn sample_page(number: u32) -> LayoutObject {
        let glyph = Glyph {
            text: "A".to_string(),
            font_name: "Helvetica".to_string(),
            font_size: 12.0,
            bbox: BBox::new(10.123, 20.0, 18.456, 32.0),
        };
        LayoutObject::Page(Page {
            number,
            bbox: BBox::new(0.0, 0.0, 595.0, 842.0),
            objects: vec![
                LayoutObject::TextBox(Container {
                    bbox: BBox::new(10.0, 20.0, 19.0, 32.0),
                    objects: vec![LayoutObject::TextLine(Container {
                        bbox: BBox::new(10.0, 20.0, 19.0, 32.0),
                        objects: vec![
                            LayoutObject::Char(glyph),
                            LayoutObject::Anno(Anno {
                                text: "\n".to_string(),
                            }),
                        ],
                    })],
                }),
                LayoutObject::Rect(Shape {
                    bbox: BBox::new(0.0, 0.0, 100.0, 1.0),
                }),
            ],
        })
    }

    #[test]
    fn test_pdf2text() {
        let backend = FixedBackend(vec![sample_page(1)]);
        assert_eq!(pdf2text(Path::new("x.pdf"), &backend).unwrap(), "A\n");
    }

    #[test]
    fn test_dump_pdf_structure() {
        let backend = FixedBackend(vec![sample_page(1), sample_page(2)]);
        let mut out = Vec::new();
        dump_pdf_structure(Path::new("x.pdf"), &backend, Some(&[2]), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], format!("{} page 2", "*".repeat(80)));
        assert!(lines[1].starts_with(" <TextBox "));
        assert!(lines[2].starts_with("   <TextLine "));
        assert!(lines[3].starts_with("     <Char "));
        assert!(lines[4].starts_with("     <Anno "));
        assert!(lines[5].starts_with(" <Rect "));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_dump_layout_json_roundtrip() {
        let backend = FixedBackend(vec![sample_page(1)]);
        let mut out = Vec::new();
        dump_layout_json(
            Path::new("x.pdf"),
            &backend,
            None,
            &[ObjectKind::Rect],
            &mut out,
        )
        .unwrap();

        let dump = load_layout_json(out.as_slice()).unwrap();
        assert_eq!(dump.pages.len(), 1);
        let page = &dump.pages[0];
        assert_eq!(page.children().len(), 1);
        assert_eq!(page.text(), "A\n");

        let char_bbox = page.children()[0].children()[0].children()[0].bbox().unwrap();
        assert_eq!(char_bbox.x0, 10.12);
        assert_eq!(char_bbox.x1, 18.46);
    }

    #[test]
    fn test_load_layout_json_invalid() {
        let result = load_layout_json(r#"{"pages": [{"type": "nope"}]}"#.as_bytes());
        assert!(matches!(result, Err(DumpError::Json(_))));
    }
}
