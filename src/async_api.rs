use crate::dom::Document;
use crate::export::{ExportConfig, Exporter};
use crate::pdf::OutputDocument;
use crate::print::{PrintHost, PrintJob};
use crate::rendering::{PixmapRasterizer, Rasterizer};
use crate::{Error, Result};
use log::debug;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Load(String, oneshot::Sender<Result<()>>),
    Export {
        source_id: String,
        filename: String,
        resp: oneshot::Sender<Result<OutputDocument>>,
    },
    Print {
        source_id: String,
        title: String,
        host: Box<dyn PrintHost + Send>,
        resp: oneshot::Sender<Result<PrintJob>>,
    },
    Close(oneshot::Sender<Result<()>>),
}

/// An async front end to the exporter backed by a dedicated worker thread.
///
/// The worker owns the [`Document`] and runs one request at a time, in the
/// order they were sent, so exports against the same document never
/// overlap.
#[derive(Clone)]
pub struct ExportService {
    cmd_tx: Sender<Command>,
}

impl ExportService {
    /// Parse `html` on a new worker thread using the bundled rasterizer.
    pub async fn new(html: impl Into<String>, config: Option<ExportConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        Self::with_exporter(html, Exporter::<PixmapRasterizer>::new(config)).await
    }

    pub async fn with_exporter<R>(html: impl Into<String>, exporter: Exporter<R>) -> Result<Self>
    where
        R: Rasterizer + Send + 'static,
    {
        let html = html.into();
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            if let Err(err) = exporter.config().validate() {
                let _ = init_tx.send(Err(err));
                return;
            }
            let mut doc = Document::parse(&html);
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Load(html, resp) => {
                        doc = Document::parse(&html);
                        let _ = resp.send(Ok(()));
                    }
                    Command::Export {
                        source_id,
                        filename,
                        resp,
                    } => {
                        let res = exporter.export_to_pdf(&mut doc, &source_id, &filename);
                        let _ = resp.send(res);
                    }
                    Command::Print {
                        source_id,
                        title,
                        host,
                        resp,
                    } => {
                        let res = exporter.print_view(&doc, &source_id, &title, host.as_ref());
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
            debug!("export worker stopped");
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("export worker is gone".into()))
    }

    /// Replace the worker's document with a freshly parsed one.
    pub async fn load_html(&self, html: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Load(html.into(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Load canceled: {}", e)))?
    }

    pub async fn export_to_pdf(&self, source_id: &str, filename: &str) -> Result<OutputDocument> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Export {
            source_id: source_id.to_string(),
            filename: filename.to_string(),
            resp: tx,
        })?;
        rx.await
            .map_err(|e| Error::Other(format!("Export canceled: {}", e)))?
    }

    pub async fn print_view<H>(&self, source_id: &str, title: &str, host: H) -> Result<PrintJob>
    where
        H: PrintHost + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Print {
            source_id: source_id.to_string(),
            title: title.to_string(),
            host: Box::new(host),
            resp: tx,
        })?;
        rx.await
            .map_err(|e| Error::Other(format!("Print canceled: {}", e)))?
    }

    /// Stop the worker after the requests already queued.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}
