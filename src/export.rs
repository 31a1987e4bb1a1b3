//! Export and print entry points.
//!
//! An export runs the whole pipeline against one source element:
//! override stylesheet, styled clone in an off-screen container, raster
//! capture, pagination and PDF assembly. Everything the export adds to the
//! document is removed again before it returns, whatever the outcome.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::{Document, NodeId, StyleHandle};
use crate::error::{Error, Result};
use crate::flatten::styled_clone;
use crate::paginate::{self, PageFormat};
use crate::pdf::{ImageEncoding, OutputDocument, PdfAssembler};
use crate::print::{build_print_document, launch, PrintHost, PrintJob};
use crate::rendering::{PixmapRasterizer, RasterOptions, Rasterizer};
use crate::safety::FallbackPalette;

/// Element id of the stylesheet injected for the duration of a capture.
pub const OVERRIDE_STYLE_ID: &str = "pdf-capture-overrides";

/// Neutralizes ring, shadow and outline colors for the capture.
pub const OVERRIDE_CSS: &str = "* { \
--tw-ring-color: transparent !important; \
--tw-ring-offset-color: transparent !important; \
--tw-ring-shadow: none !important; \
--tw-shadow: none !important; \
--tw-shadow-colored: none !important; \
outline-color: transparent !important; \
caret-color: transparent !important; \
accent-color: transparent !important; }";

/// Inline style of the container that holds the clone while it is captured.
pub const OFFSCREEN_CONTAINER_STYLE: &str =
    "position: absolute; left: -9999px; top: 0; width: 210mm; background: #fff";

/// Export configuration.
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes:
///
/// ```
/// let cfg = folioprint::ExportConfig::from_json_str(r#"{ "scale": 2.0 }"#).unwrap();
/// assert_eq!(cfg.scale, 2.0);
/// assert_eq!(cfg.viewport_width_px, 794);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Device pixels per CSS px.
    pub scale: f32,
    pub output_format: ImageEncoding,
    pub palette: FallbackPalette,
    pub page_format: PageFormat,
    /// Width the clone is laid out at, in CSS px.
    pub viewport_width_px: u32,
    /// Minimum captured height, in CSS px.
    pub page_height_px: u32,
    /// Budget for rasterization. `None` is unbounded.
    pub raster_timeout_ms: Option<u64>,
    /// Per-image fetch timeout. `None` waits indefinitely.
    pub image_timeout_ms: Option<u64>,
    pub allow_cross_origin_images: bool,
    /// Stylesheet injected while capturing; `None` injects nothing.
    pub override_css: Option<String>,
    /// Delay between the print window's `load` event and printing.
    pub print_settle_ms: u64,
    /// Deflate PDF content streams.
    pub compress: bool,
    /// Base URL for relative image sources.
    pub base_url: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 3.0,
            output_format: ImageEncoding::Jpeg { quality: 100 },
            palette: FallbackPalette::generic(),
            page_format: PageFormat::A4,
            viewport_width_px: 794,
            page_height_px: 1123,
            raster_timeout_ms: None,
            image_timeout_ms: None,
            allow_cross_origin_images: true,
            override_css: Some(OVERRIDE_CSS.to_string()),
            print_settle_ms: 250,
            compress: true,
            base_url: None,
        }
    }
}

impl ExportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: ExportConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", self.scale)));
        }
        if self.viewport_width_px == 0 || self.page_height_px == 0 {
            return Err(Error::ConfigError(format!(
                "viewport {}x{} px is empty",
                self.viewport_width_px, self.page_height_px
            )));
        }
        let PageFormat { width_mm, height_mm } = self.page_format;
        if !(width_mm.is_finite() && height_mm.is_finite() && width_mm > 0.0 && height_mm > 0.0) {
            return Err(Error::ConfigError(format!(
                "page format {width_mm}x{height_mm} mm is empty"
            )));
        }
        if let ImageEncoding::Jpeg { quality } = self.output_format {
            if !(1..=100).contains(&quality) {
                return Err(Error::ConfigError(format!("JPEG quality {quality} outside 1-100")));
            }
        }
        self.origin()?;
        Ok(())
    }

    fn origin(&self) -> Result<Option<Url>> {
        self.base_url
            .as_deref()
            .map(|u| Url::parse(u).map_err(|e| Error::ConfigError(format!("base_url {u:?}: {e}"))))
            .transpose()
    }

    /// Capture parameters derived from this configuration.
    pub fn raster_options(&self) -> Result<RasterOptions> {
        Ok(RasterOptions {
            width_px: self.viewport_width_px,
            min_height_px: self.page_height_px,
            scale: self.scale,
            allow_cross_origin: self.allow_cross_origin_images,
            image_timeout: self.image_timeout_ms.map(Duration::from_millis),
            timeout: self.raster_timeout_ms.map(Duration::from_millis),
            origin: self.origin()?,
        })
    }

    pub fn assembler(&self) -> PdfAssembler {
        PdfAssembler {
            format: self.page_format,
            encoding: self.output_format,
            compress: self.compress,
        }
    }
}

/// The kinds of business document the exporter knows conventions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Invoice,
    CreditNote,
    PaymentReceipt,
    PurchaseOrder,
    VendorCredit,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Invoice,
        DocumentKind::CreditNote,
        DocumentKind::PaymentReceipt,
        DocumentKind::PurchaseOrder,
        DocumentKind::VendorCredit,
    ];

    /// Configuration preset for this kind.
    pub fn config(self) -> ExportConfig {
        match self {
            DocumentKind::Invoice | DocumentKind::PaymentReceipt => ExportConfig {
                palette: FallbackPalette::document(),
                ..Default::default()
            },
            DocumentKind::CreditNote | DocumentKind::VendorCredit | DocumentKind::PurchaseOrder => {
                let palette = match self {
                    DocumentKind::CreditNote => FallbackPalette::credit_note(),
                    DocumentKind::VendorCredit => FallbackPalette::vendor_credit(),
                    _ => FallbackPalette::purchase_order(),
                };
                ExportConfig {
                    scale: 2.0,
                    output_format: ImageEncoding::Png,
                    palette,
                    print_settle_ms: 500,
                    ..Default::default()
                }
            }
        }
    }

    /// Id of the element holding the printable view.
    pub fn element_id(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice-pdf-content",
            DocumentKind::CreditNote => "pdf-content",
            DocumentKind::PaymentReceipt => "payment-pdf-content",
            DocumentKind::PurchaseOrder => "purchase-order-pdf-content",
            DocumentKind::VendorCredit => "vendor-credit-pdf-content",
        }
    }

    pub fn filename(self, number: &str) -> String {
        match self {
            DocumentKind::Invoice => format!("Invoice-{number}.pdf"),
            DocumentKind::CreditNote => format!("CreditNote-{number}.pdf"),
            DocumentKind::PaymentReceipt => format!("Payment-{number}.pdf"),
            DocumentKind::PurchaseOrder => format!("{number}.pdf"),
            DocumentKind::VendorCredit => format!("VendorCredit-{number}.pdf"),
        }
    }

    pub fn print_title(self, number: &str) -> String {
        match self {
            DocumentKind::Invoice => format!("Invoice - {number}"),
            DocumentKind::CreditNote => format!("Credit Note {number}"),
            DocumentKind::PaymentReceipt => format!("Payment Receipt - {number}"),
            DocumentKind::PurchaseOrder => format!("Print Purchase Order - {number}"),
            DocumentKind::VendorCredit => format!("Vendor Credit {number}"),
        }
    }

    fn name(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::CreditNote => "credit-note",
            DocumentKind::PaymentReceipt => "payment-receipt",
            DocumentKind::PurchaseOrder => "purchase-order",
            DocumentKind::VendorCredit => "vendor-credit",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DocumentKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = DocumentKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown document kind {s:?} (expected one of {})", names.join(", "))
            })
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Temporary capture state inside a document.
///
/// Holds the override stylesheet and the off-screen container. Both are
/// removed when the scope is dropped, so an early `?` return leaves the
/// document as it was.
pub struct ExportScope<'a> {
    doc: &'a mut Document,
    style: Option<StyleHandle>,
    container: NodeId,
}

impl<'a> ExportScope<'a> {
    pub fn enter(doc: &'a mut Document, override_css: Option<&str>) -> Self {
        let style = override_css.map(|css| doc.inject_style(css, Some(OVERRIDE_STYLE_ID)));
        let container = doc.create_element("div");
        doc.set_attribute(container, "style", OFFSCREEN_CONTAINER_STYLE);
        let parent = doc.body().or_else(|| doc.document_element()).unwrap_or(doc.root());
        doc.append_child(parent, container);
        Self { doc, style, container }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }
}

impl Deref for ExportScope<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl DerefMut for ExportScope<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.doc
    }
}

impl Drop for ExportScope<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.style.take() {
            self.doc.remove_style(handle);
        }
        self.doc.discard(self.container);
    }
}

/// Runs exports and print requests with one configuration and rasterizer.
#[derive(Debug, Clone)]
pub struct Exporter<R: Rasterizer = PixmapRasterizer> {
    config: ExportConfig,
    rasterizer: R,
}

impl Default for Exporter<PixmapRasterizer> {
    fn default() -> Self {
        Self::new(ExportConfig::default())
    }
}

impl Exporter<PixmapRasterizer> {
    pub fn new(config: ExportConfig) -> Self {
        Self::with_rasterizer(config, PixmapRasterizer::new())
    }

    pub fn for_kind(kind: DocumentKind) -> Self {
        Self::new(kind.config())
    }
}

impl<R: Rasterizer> Exporter<R> {
    pub fn with_rasterizer(config: ExportConfig, rasterizer: R) -> Self {
        Self { config, rasterizer }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Capture the element `source_id` and return it as a paginated PDF
    /// named `filename`. The document is left as it was found.
    pub fn export_to_pdf(&self, doc: &mut Document, source_id: &str, filename: &str) -> Result<OutputDocument> {
        self.run_export(doc, source_id, filename).map_err(|e| {
            error!("export of #{source_id} failed: {e}");
            e
        })
    }

    fn run_export(&self, doc: &mut Document, source_id: &str, filename: &str) -> Result<OutputDocument> {
        self.config.validate()?;
        let options = self.config.raster_options()?;
        let source = doc
            .get_element_by_id(source_id)
            .ok_or_else(|| Error::NotFound(source_id.to_string()))?;

        let buffer = {
            let mut scope = ExportScope::enter(doc, self.config.override_css.as_deref());
            let (clone, report) = styled_clone(&mut scope, source, &self.config.palette)?;
            let container = scope.container();
            scope.append_child(container, clone);
            if let Some(style) = scope.inline_style_mut(clone) {
                style.set_property("width", &format!("{}px", self.config.viewport_width_px), true);
                style.set_property("background-color", "rgb(255, 255, 255)", true);
            }
            debug!(
                "#{source_id}: {} elements flattened, {} fallbacks, {} dropped",
                report.elements, report.fallbacks, report.dropped
            );
            self.rasterizer.rasterize(&scope, clone, &options)?
        };

        let pages = paginate::slice(&buffer, self.config.page_format)?;
        let output = self.config.assembler().assemble(&pages, filename)?;
        info!(
            "exported #{source_id} to {} ({} pages, {}x{} px capture)",
            output.filename,
            output.page_count,
            buffer.width(),
            buffer.height()
        );
        Ok(output)
    }

    /// Write a flattened copy of `source_id` into a new print window on
    /// `host`. Returns once the window has the document.
    pub fn print_view(&self, doc: &Document, source_id: &str, title: &str, host: &dyn PrintHost) -> Result<PrintJob> {
        self.run_print(doc, source_id, title, host).map_err(|e| {
            error!("print of #{source_id} failed: {e}");
            e
        })
    }

    fn run_print(&self, doc: &Document, source_id: &str, title: &str, host: &dyn PrintHost) -> Result<PrintJob> {
        let source = doc
            .get_element_by_id(source_id)
            .ok_or_else(|| Error::NotFound(source_id.to_string()))?;
        let document = build_print_document(
            doc,
            source,
            title,
            &self.config.palette,
            Duration::from_millis(self.config.print_settle_ms),
        )?;
        launch(host, &document)
    }
}

/// [`Exporter::export_to_pdf`] with the default configuration.
pub fn export_to_pdf(doc: &mut Document, source_id: &str, filename: &str) -> Result<OutputDocument> {
    Exporter::default().export_to_pdf(doc, source_id, filename)
}

/// [`Exporter::print_view`] with the default configuration.
pub fn print_view(doc: &Document, source_id: &str, title: &str, host: &dyn PrintHost) -> Result<PrintJob> {
    Exporter::default().print_view(doc, source_id, title, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::RasterBuffer;

    struct Failing;

    impl Rasterizer for Failing {
        fn rasterize(&self, doc: &Document, root: NodeId, _options: &RasterOptions) -> Result<RasterBuffer> {
            // the clone is attached and flattened by the time we get here
            assert!(doc.is_attached(root));
            assert!(doc.get_element_by_id(OVERRIDE_STYLE_ID).is_some());
            Err(Error::RasterizationFailure("boom".into()))
        }
    }

    const PAGE: &str = r#"<html><head><style>.t { color: oklch(0.5 0.1 20) }</style></head>
        <body><main><div id="invoice-pdf-content"><p class="t">Total</p></div></main></body></html>"#;

    #[test]
    fn scope_cleans_up_on_drop() {
        let mut doc = Document::parse(PAGE);
        let body = doc.body().unwrap();
        let before = (doc.children(body).len(), doc.style_sheet_count());
        {
            let scope = ExportScope::enter(&mut doc, Some(OVERRIDE_CSS));
            assert_eq!(scope.style_sheet_count(), before.1 + 1);
            assert!(scope.is_attached(scope.container()));
        }
        assert_eq!((doc.children(body).len(), doc.style_sheet_count()), before);
        assert!(doc.get_element_by_id(OVERRIDE_STYLE_ID).is_none());
    }

    #[test]
    fn failed_capture_restores_the_document() {
        let mut doc = Document::parse(PAGE);
        let html_before = doc.outer_html(doc.root());
        let exporter = Exporter::with_rasterizer(ExportConfig::default(), Failing);
        let err = exporter.export_to_pdf(&mut doc, "invoice-pdf-content", "x.pdf").unwrap_err();
        assert!(matches!(err, Error::RasterizationFailure(_)));
        assert_eq!(doc.outer_html(doc.root()), html_before);
    }

    #[test]
    fn missing_element_is_not_found() {
        let mut doc = Document::parse(PAGE);
        let err = export_to_pdf(&mut doc, "nope", "x.pdf").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref id) if id == "nope"));
    }

    #[test]
    fn small_export_is_one_page() {
        let mut doc = Document::parse(PAGE);
        let cfg = ExportConfig {
            scale: 1.0,
            ..DocumentKind::Invoice.config()
        };
        let out = Exporter::new(cfg)
            .export_to_pdf(&mut doc, "invoice-pdf-content", &DocumentKind::Invoice.filename("INV-001"))
            .unwrap();
        assert_eq!(out.filename, "Invoice-INV-001.pdf");
        assert_eq!(out.page_count, 1);
        assert!(doc.get_element_by_id("invoice-pdf-content").is_some());
    }

    #[test]
    fn config_validation() {
        assert!(ExportConfig::default().validate().is_ok());
        for json in [
            r#"{"scale": 0}"#,
            r#"{"viewport_width_px": 0}"#,
            r#"{"page_format": {"width_mm": 0, "height_mm": 297}}"#,
            r#"{"output_format": {"type": "jpeg", "quality": 0}}"#,
            r#"{"base_url": "not a url"}"#,
            r#"{"scale": "big"}"#,
        ] {
            assert!(
                matches!(ExportConfig::from_json_str(json), Err(Error::ConfigError(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn config_loads_partial_json() {
        let cfg = ExportConfig::from_json_str(
            r#"{"output_format": {"type": "png"}, "raster_timeout_ms": 5000, "palette": {"border": "rgb(1, 2, 3)"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.output_format, ImageEncoding::Png);
        assert_eq!(cfg.raster_options().unwrap().timeout, Some(Duration::from_millis(5000)));
        assert_eq!(cfg.palette.border, "rgb(1, 2, 3)");
        assert_eq!(cfg.palette.text, "rgb(0, 0, 0)");
        assert_eq!(cfg.scale, 3.0);
    }

    #[test]
    fn kind_conventions() {
        assert_eq!(DocumentKind::CreditNote.filename("CN-7"), "CreditNote-CN-7.pdf");
        assert_eq!(DocumentKind::PurchaseOrder.filename("PO-3"), "PO-3.pdf");
        assert_eq!(DocumentKind::PaymentReceipt.print_title("PAY-1"), "Payment Receipt - PAY-1");
        assert_eq!(DocumentKind::VendorCredit.element_id(), "vendor-credit-pdf-content");
        assert_eq!(DocumentKind::Invoice.config().scale, 3.0);
        assert_eq!(DocumentKind::CreditNote.config().output_format, ImageEncoding::Png);
        assert_eq!(DocumentKind::VendorCredit.config().print_settle_ms, 500);
        for kind in DocumentKind::ALL {
            assert_eq!(kind.to_string().parse::<DocumentKind>(), Ok(kind));
            assert!(kind.config().validate().is_ok());
        }
        assert!("receipt".parse::<DocumentKind>().is_err());
    }
}
