//! Extraction of a small two page document through MuPDF.
//!
//! `tests/data/two_pages.pdf` holds Helvetica 12pt text on a 612x792 page:
//! "Hello world" at baseline 700 and "Total 12,50" at baseline 680 on page 1,
//! "Page two" at baseline 700 on page 2, all starting at x = 72.

use std::path::PathBuf;

use pdfss_core::{BackendError, LayoutObject, ObjectKind, PdfBackend};
use pdfss_layout::{RelayoutConfig, dump_pdf_structure, pdf2text, relayout};
use pdfss_pdf_mupdf::MupdfBackend;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("two_pages.pdf")
}

fn text_lines<'a>(obj: &'a LayoutObject, out: &mut Vec<&'a LayoutObject>) {
    if obj.kind() == ObjectKind::TextLine {
        out.push(obj);
    }
    for child in obj.children() {
        text_lines(child, out);
    }
}

fn find_line<'a>(page: &'a LayoutObject, text: &str) -> &'a LayoutObject {
    let mut lines = Vec::new();
    text_lines(page, &mut lines);
    lines
        .into_iter()
        .find(|line| line.text() == text)
        .unwrap_or_else(|| panic!("no line {text:?} in {}", page.text()))
}

#[test]
fn test_extract_text() {
    let text = MupdfBackend::new().extract_text(&fixture()).unwrap();
    let hello = text.find("Hello world").unwrap();
    let total = text.find("Total 12,50").unwrap();
    let page_two = text.find("Page two").unwrap();
    assert!(hello < total && total < page_two);
}

#[test]
fn test_extract_all_pages() {
    let pages = MupdfBackend::new().extract_pages(&fixture(), None).unwrap();
    let numbers: Vec<u32> = pages
        .iter()
        .map(|page| match page {
            LayoutObject::Page(p) => p.number,
            other => panic!("unexpected {other}"),
        })
        .collect();
    assert_eq!(numbers, vec![1, 2]);

    let bbox = pages[0].bbox().unwrap();
    assert_eq!((bbox.width(), bbox.height()), (612.0, 792.0));
}

#[test]
fn test_line_chars_and_annotations() {
    let pages = MupdfBackend::new().extract_pages(&fixture(), None).unwrap();
    let hello = find_line(&pages[0], "Hello world\n");

    let children = hello.children();
    assert!(matches!(children.last(), Some(LayoutObject::Anno(a)) if a.text == "\n"));
    assert!(
        children
            .iter()
            .any(|child| matches!(child, LayoutObject::Anno(a) if a.text == " "))
    );
    let chars: Vec<_> = children
        .iter()
        .filter_map(|child| match child {
            LayoutObject::Char(g) => Some(g),
            _ => None,
        })
        .collect();
    assert_eq!(chars.len(), 10);
    assert!(chars.iter().all(|g| (g.font_size - 12.0).abs() < 0.01));

    let display = hello.to_string();
    assert!(display.starts_with("<TextLine "), "{display}");
    assert!(display.ends_with(r#" "Hello world\n">"#), "{display}");
}

#[test]
fn test_coordinates_have_bottom_left_origin() {
    let pages = MupdfBackend::new().extract_pages(&fixture(), None).unwrap();
    let hello = find_line(&pages[0], "Hello world\n").bbox().unwrap();
    let total = find_line(&pages[0], "Total 12,50\n").bbox().unwrap();

    assert!(hello.y0 > total.y0);
    assert!(hello.y0 > 690.0 && hello.y0 < 705.0, "{hello}");
    assert!(hello.y1 > hello.y0);
    assert!((hello.x0 - 72.0).abs() < 1.0, "{hello}");
}

#[test]
fn test_page_selection() {
    let pages = MupdfBackend::new()
        .extract_pages(&fixture(), Some(&[2]))
        .unwrap();
    assert_eq!(pages.len(), 1);
    assert!(matches!(&pages[0], LayoutObject::Page(p) if p.number == 2));
    assert_eq!(pages[0].text(), "Page two\n");
}

#[test]
fn test_page_out_of_range() {
    let backend = MupdfBackend::new();
    for requested in [0, 3] {
        let result = backend.extract_pages(&fixture(), Some(&[1, requested]));
        assert!(
            matches!(
                result,
                Err(BackendError::PageOutOfRange { requested: r, count: 2 }) if r == requested
            ),
            "{result:?}"
        );
    }
}

#[test]
fn test_relayout_extracted_page() {
    let pages = MupdfBackend::new()
        .extract_pages(&fixture(), Some(&[1]))
        .unwrap();
    let groups = relayout(&pages[0], &RelayoutConfig::default()).unwrap();
    let texts: Vec<_> = groups.iter().map(|group| group.texts()).collect();
    assert_eq!(texts, vec![vec![vec!["Hello world"], vec!["Total 12,50"]]]);
}

#[test]
fn test_pdf2text_and_structure_dump() {
    let backend = MupdfBackend::new();
    assert!(
        pdf2text(&fixture(), &backend)
            .unwrap()
            .contains("Hello world")
    );

    let mut out = Vec::new();
    dump_pdf_structure(&fixture(), &backend, Some(&[1]), &mut out).unwrap();
    let dump = String::from_utf8(out).unwrap();
    assert!(dump.starts_with(&format!("{} page 1\n", "*".repeat(80))), "{dump}");
    assert!(dump.contains("<TextBox "));
    assert!(dump.contains(r#" "Hello world\n">"#));
    assert!(!dump.contains(" page 2"));
}
