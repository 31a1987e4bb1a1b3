use std::cell::RefCell;
use std::rc::Rc;

use folioprint::{print_view, Document, DocumentKind, Error, Exporter, PrintHost, PrintWindow, Result, SpoolHost};

const RECEIPT: &str = r#"<html><head><style>
    .amount { color: oklch(0.45 0.12 150); border: 1px solid lab(80% 0 0) }
    .hidden { display: none }
</style></head>
<body><div id="payment-pdf-content"><h2>Payment Receipt</h2><p class="amount">$ 310.00</p>
<p class="hidden">internal</p></div></body></html>"#;

#[derive(Default)]
struct Host {
    titles: RefCell<Vec<String>>,
    pages: Rc<RefCell<Vec<String>>>,
    blocked: bool,
}

struct Window(String, Rc<RefCell<Vec<String>>>);

impl PrintWindow for Window {
    fn write(&mut self, html: &str) -> Result<()> {
        self.0.push_str(html);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.1.borrow_mut().push(self.0.clone());
        Ok(())
    }
}

impl PrintHost for Host {
    fn open_window(&self, title: &str) -> Option<Box<dyn PrintWindow>> {
        if self.blocked {
            return None;
        }
        self.titles.borrow_mut().push(title.to_string());
        Some(Box::new(Window(String::new(), self.pages.clone())))
    }
}

#[test]
fn print_document_carries_flattened_markup() {
    let doc = Document::parse(RECEIPT);
    let host = Host::default();
    let kind = DocumentKind::PaymentReceipt;
    let job = Exporter::for_kind(kind)
        .print_view(&doc, kind.element_id(), &kind.print_title("PAY-0007"), &host)
        .unwrap();
    assert_eq!(job.title, "Payment Receipt - PAY-0007");
    assert_eq!(host.titles.borrow().as_slice(), ["Payment Receipt - PAY-0007"]);

    let pages = host.pages.borrow();
    let html = &pages[0];
    assert!(html.contains("<title>Payment Receipt - PAY-0007</title>"));
    assert!(html.contains("$ 310.00"));
    assert!(html.contains("color: rgb(0, 0, 0)"));
    assert!(!html.contains("oklch"));
    assert!(!html.contains("lab("));
    assert!(!html.contains("class="));
    assert!(html.contains("display: none"));
    assert!(html.contains("window.print(); }, 250)"));
}

#[test]
fn printing_leaves_the_document_untouched() {
    let doc = Document::parse(RECEIPT);
    let before = doc.outer_html(doc.root());
    print_view(&doc, "payment-pdf-content", "r", &Host::default()).unwrap();
    assert_eq!(doc.outer_html(doc.root()), before);
}

#[test]
fn blocked_window_and_missing_element() {
    let doc = Document::parse(RECEIPT);
    let blocked = Host {
        blocked: true,
        ..Default::default()
    };
    assert!(matches!(
        print_view(&doc, "payment-pdf-content", "r", &blocked),
        Err(Error::PopupBlocked)
    ));
    assert!(matches!(
        print_view(&doc, "nope", "r", &Host::default()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn purchase_orders_settle_longer() {
    let doc = Document::parse(
        r#"<html><body><div id="purchase-order-pdf-content"><h1>PO-12</h1></div></body></html>"#,
    );
    let dir = tempfile::tempdir().unwrap();
    let kind = DocumentKind::PurchaseOrder;
    let job = Exporter::for_kind(kind)
        .print_view(&doc, kind.element_id(), &kind.print_title("PO-12"), &SpoolHost::new(dir.path()))
        .unwrap();
    let written = std::fs::read_to_string(job.location.unwrap()).unwrap();
    assert!(written.contains("<title>Print Purchase Order - PO-12</title>"));
    assert!(written.contains("window.print(); }, 500)"));
}
