//! Export the invoice view of an HTML file to `Invoice-<number>.pdf`.
//!
//! cargo run --example export_invoice -- tests/goldens/pages/invoice.html INV-001

use folioprint::{Document, DocumentKind, Exporter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .unwrap_or_else(|| "tests/goldens/pages/invoice.html".to_string());
    let number = args.next().unwrap_or_else(|| "INV-001".to_string());

    let html = std::fs::read_to_string(&path)?;
    let mut doc = Document::parse(&html);

    let kind = DocumentKind::Invoice;
    let pdf = Exporter::for_kind(kind).export_to_pdf(&mut doc, kind.element_id(), &kind.filename(&number))?;
    let saved = pdf.save_in(".")?;
    println!("{} ({} pages, {} bytes)", saved.display(), pdf.page_count, pdf.bytes.len());
    Ok(())
}
