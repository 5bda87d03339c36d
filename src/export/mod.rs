//! Asset export formats.
//!
//! Trainz consumes a single text format, the `<trainzImport>` XML document.

pub mod xml;

pub use xml::write_document;
