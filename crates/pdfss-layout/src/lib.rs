//! Logical text layout reconstruction on top of the layout trees produced by
//! a [`pdfss_core::PdfBackend`].

use pdfss_core::ObjectKind;
use thiserror::Error;

pub mod config;
pub mod dump;
pub mod grouping;
pub mod relayout;

pub use config::{CharFilter, ListOverride, RelayoutConfig, RelayoutConfigBuilder};
pub use dump::{
    DumpError, LayoutDump, dump_layout_json, dump_pdf_structure, load_layout_json, pdf2text,
};
pub use grouping::{DefaultLineGrouper, DefaultTextMerger, LineGrouper, LineInfo, TextMerger};
pub use relayout::{Line, LinesGroup, TextBlock, TextItem, iter_text, relayout};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayoutError {
    #[error("unexpected {0} object, add it to the skipped kinds")]
    UnexpectedObject(ObjectKind),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive finite number, got {value}")]
    InvalidFactor { name: &'static str, value: f64 },
}
