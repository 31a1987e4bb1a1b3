//! Print path: a standalone HTML document holding the flattened subtree,
//! handed to a browsing context that prints it once loaded.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use log::{info, warn};

use crate::dom::{escape_text, Document, NodeId};
use crate::error::{Error, Result};
use crate::flatten::flatten_to_html;
use crate::safety::FallbackPalette;

pub const PRINT_RESET_CSS: &str = "* { margin: 0; padding: 0; box-sizing: border-box; } \
body { font-family: Arial, sans-serif; color: #000; background: #fff; } \
@media print { body { margin: 0; padding: 0; } @page { margin: 0; } }";

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(250);

/// Serialized print document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintDocument {
    pub title: String,
    pub html: String,
}

/// Build the print document for `source`: reset stylesheet, flattened
/// markup, and a script that prints `settle` after the `load` event.
pub fn build_print_document(
    doc: &Document,
    source: NodeId,
    title: &str,
    palette: &FallbackPalette,
    settle: Duration,
) -> Result<PrintDocument> {
    let fragment = flatten_to_html(doc, source, palette)?;
    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>{css}</style>\n</head>\n<body>\n{fragment}\n\
         <script>window.onload = function () {{ setTimeout(function () {{ window.print(); }}, {ms}); }};</script>\n\
         </body>\n</html>\n",
        title = escape_text(title),
        css = PRINT_RESET_CSS,
        fragment = fragment,
        ms = settle.as_millis(),
    );
    Ok(PrintDocument {
        title: title.to_string(),
        html,
    })
}

/// An opened browsing context.
pub trait PrintWindow {
    fn write(&mut self, html: &str) -> Result<()>;

    /// Finish writing. The window loads and prints on its own from here.
    fn close(&mut self) -> Result<()>;

    /// Where the document ended up, if that means anything for this host.
    fn location(&self) -> Option<String> {
        None
    }
}

/// Something that can open print windows.
pub trait PrintHost {
    /// `None` when the host refuses to open a window.
    fn open_window(&self, title: &str) -> Option<Box<dyn PrintWindow>>;
}

/// A print request handed to its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub title: String,
    pub location: Option<String>,
}

/// Open a window on `host` and write `document` into it. Returns as soon as
/// the document is handed over; printing happens inside the window.
pub fn launch(host: &dyn PrintHost, document: &PrintDocument) -> Result<PrintJob> {
    let mut window = host.open_window(&document.title).ok_or(Error::PopupBlocked)?;
    window.write(&document.html)?;
    window.close()?;
    info!("print window opened for {:?}", document.title);
    Ok(PrintJob {
        title: document.title.clone(),
        location: window.location(),
    })
}

/// Writes print documents into a spool directory and optionally starts a
/// command on each file (a browser, `lp`, ...) without waiting for it.
#[derive(Debug, Clone)]
pub struct SpoolHost {
    dir: PathBuf,
    command: Option<Vec<String>>,
}

impl SpoolHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            command: None,
        }
    }

    /// Program and leading arguments; the spooled file path is appended.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command).filter(|c| !c.is_empty());
        self
    }
}

fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || "-_. ".contains(c) { c } else { '_' })
        .collect();
    match stem.trim() {
        "" => "print".to_string(),
        s => s.to_string(),
    }
}

impl PrintHost for SpoolHost {
    fn open_window(&self, title: &str) -> Option<Box<dyn PrintWindow>> {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("spool directory {} unusable: {}", self.dir.display(), e);
            return None;
        }
        Some(Box::new(SpoolWindow {
            path: self.dir.join(format!("{}.html", file_stem(title))),
            buf: String::new(),
            command: self.command.clone(),
        }))
    }
}

struct SpoolWindow {
    path: PathBuf,
    buf: String,
    command: Option<Vec<String>>,
}

impl PrintWindow for SpoolWindow {
    fn write(&mut self, html: &str) -> Result<()> {
        self.buf.push_str(html);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        std::fs::write(&self.path, &self.buf)?;
        if let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) {
            let child = Command::new(program).args(args).arg(&self.path).spawn()?;
            info!("spawned {} (pid {}) for {}", program, child.id(), self.path.display());
        }
        Ok(())
    }

    fn location(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blocked;

    impl PrintHost for Blocked {
        fn open_window(&self, _title: &str) -> Option<Box<dyn PrintWindow>> {
            None
        }
    }

    fn receipt() -> (Document, NodeId) {
        let doc = Document::parse(
            r#"<html><head><style>.amt { color: oklch(0.4 0.1 150) }</style></head>
            <body><div id="payment-pdf-content"><p class="amt">$ 1,200.00</p></div></body></html>"#,
        );
        let id = doc.get_element_by_id("payment-pdf-content").unwrap();
        (doc, id)
    }

    #[test]
    fn document_has_title_reset_and_delayed_print() {
        let (doc, src) = receipt();
        let printed = build_print_document(
            &doc,
            src,
            "Payment Receipt - <PAY-1>",
            &FallbackPalette::document(),
            DEFAULT_SETTLE,
        )
        .unwrap();
        let html = &printed.html;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Payment Receipt - &lt;PAY-1&gt;</title>"));
        assert!(html.contains("@page { margin: 0; }"));
        assert!(html.contains("window.print(); }, 250)"));
        assert!(html.contains("$ 1,200.00"));
        assert!(!html.contains("oklch"));
    }

    #[test]
    fn blocked_popup_is_reported() {
        let (doc, src) = receipt();
        let printed = build_print_document(&doc, src, "t", &FallbackPalette::generic(), DEFAULT_SETTLE).unwrap();
        assert!(matches!(launch(&Blocked, &printed), Err(Error::PopupBlocked)));
    }

    #[test]
    fn spool_host_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let (doc, src) = receipt();
        let printed =
            build_print_document(&doc, src, "Credit Note CN/7", &FallbackPalette::credit_note(), DEFAULT_SETTLE)
                .unwrap();
        let job = launch(&SpoolHost::new(dir.path()), &printed).unwrap();
        let path = dir.path().join("Credit Note CN_7.html");
        assert_eq!(job.location, Some(path.display().to_string()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), printed.html);
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(file_stem("a/b\\c"), "a_b_c");
        assert_eq!(file_stem("   "), "print");
    }
}
