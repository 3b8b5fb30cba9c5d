use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod convert;
pub mod layout;

pub use backend::{BackendError, PdfBackend, page_selected};
pub use convert::{ConvertError, Number};
pub use layout::{
    Anno, BBox, Container, DEFAULT_SKIP_KINDS, Glyph, LayoutObject, ObjectKind, Page, Shape,
};

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("unknown layout object kind: {0:?}")]
    UnknownKind(String),
}
