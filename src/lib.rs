//! Folioprint
//!
//! Exports a rendered element of an HTML document as a paginated A4 PDF, or
//! hands a print-ready copy of it to a print window.
//!
//! # Pipeline
//!
//! - **Flattening**: every computed property of the source subtree is
//!   written inline onto a clone, so the clone renders without stylesheets
//! - **Color safety**: color syntax the rasterizer cannot read
//!   (`oklch()`, `lab()`, `color-mix()`, ...) is replaced or dropped on the way
//! - **Rasterization**: the clone is captured into an RGB bitmap
//!   ([`Rasterizer`], [`PixmapRasterizer`])
//! - **Pagination and assembly**: the bitmap is sliced into page-high strips
//!   and each strip becomes one PDF page
//!
//! # Example
//!
//! ```no_run
//! use folioprint::{Document, DocumentKind, Exporter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let html = std::fs::read_to_string("invoice.html")?;
//! let mut doc = Document::parse(&html);
//!
//! let kind = DocumentKind::Invoice;
//! let pdf = Exporter::for_kind(kind).export_to_pdf(&mut doc, kind.element_id(), &kind.filename("INV-001"))?;
//! pdf.save_in(".")?;
//! println!("{} pages", pdf.page_count);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

// Document tree and style resolution
pub mod dom;
pub mod style;

pub mod flatten;
pub mod safety;

pub mod paginate;
pub mod pdf;
pub mod rendering;

pub mod export;
pub mod print;

// Async-friendly service (worker-thread backed)
pub mod async_api;

pub use async_api::ExportService;
pub use dom::{Document, NodeId};
pub use export::{export_to_pdf, print_view, DocumentKind, ExportConfig, ExportScope, Exporter};
pub use flatten::{flatten_into, flatten_to_html, styled_clone, FlattenReport};
pub use paginate::{PageFormat, PageImage, PageWindow};
pub use pdf::{ImageEncoding, OutputDocument, PdfAssembler};
pub use print::{PrintDocument, PrintHost, PrintJob, PrintWindow, SpoolHost};
pub use rendering::{PixmapRasterizer, RasterBuffer, RasterOptions, Rasterizer};
pub use safety::{FallbackPalette, SafetyDecision};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.viewport_width_px, 794);
        assert_eq!(config.page_height_px, 1123);
        assert_eq!(config.output_format, ImageEncoding::Jpeg { quality: 100 });
        assert_eq!(config.palette, FallbackPalette::generic());
    }

    #[test]
    fn test_page_format() {
        let a4 = PageFormat::default();
        assert_eq!(a4, PageFormat::A4);
        assert!((a4.width_pt() - 595.28).abs() < 0.01);
        assert!((a4.height_pt() - 841.89).abs() < 0.01);
    }
}
