//! Spool a payment receipt print document and open it with a command.
//!
//! cargo run --example print_receipt -- xdg-open

use folioprint::{Document, DocumentKind, Exporter, SpoolHost};

const RECEIPT: &str = r#"<html><head><style>
  .receipt { padding: 24px; }
  .amount { color: oklch(0.45 0.12 150); font-size: 28px; }
</style></head>
<body><div id="payment-pdf-content" class="receipt">
  <h2>Payment Receipt</h2>
  <p>Received from Acme Ltd</p>
  <p class="amount">$ 1,249.00</p>
</div></body></html>"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let command: Vec<String> = std::env::args().skip(1).collect();

    let doc = Document::parse(RECEIPT);
    let spool = std::env::temp_dir().join("folioprint-spool");
    let host = SpoolHost::new(&spool).with_command(command);

    let kind = DocumentKind::PaymentReceipt;
    let job = Exporter::for_kind(kind).print_view(&doc, kind.element_id(), &kind.print_title("PAY-0042"), &host)?;
    println!("spooled {:?} to {}", job.title, job.location.unwrap_or_default());
    Ok(())
}
