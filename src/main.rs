//! `folioprint` command line.
//!
//! ```bash
//! # Export an invoice view to Invoice-INV-001.pdf
//! folioprint export invoice.html --kind invoice --number INV-001
//!
//! # Any element, explicit output and capture settings
//! folioprint export page.html --element report --output out/report.pdf --scale 2 --format png
//!
//! # Spool a print document and open it in a browser
//! folioprint print receipt.html --kind payment-receipt --number PAY-9 --spool-dir /tmp/spool -- firefox
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use folioprint::{DocumentKind, ExportConfig, Exporter, ImageEncoding, SpoolHost};
use log::info;
use url::Url;

#[derive(Parser)]
#[command(name = "folioprint")]
#[command(about = "Export or print an element of an HTML document")]
struct Cli {
    /// JSON configuration file; command line flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Jpeg,
    Png,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture an element into a paginated A4 PDF
    Export {
        /// HTML file to read
        html: PathBuf,

        /// Id of the element to capture (defaults to the kind's element)
        #[arg(long)]
        element: Option<String>,

        /// Document kind, selecting palette, capture settings and naming
        #[arg(long)]
        kind: Option<DocumentKind>,

        /// Document number used for the default file name
        #[arg(long)]
        number: Option<String>,

        /// Output path (defaults to the kind's file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        scale: Option<f32>,

        #[arg(long, value_enum)]
        format: Option<Format>,

        /// JPEG quality, 1-100
        #[arg(long, default_value = "100")]
        quality: u8,

        /// Rasterization budget in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Base URL for relative image sources (defaults to the HTML file's directory)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Write a print-ready document and hand it to a print command
    Print {
        html: PathBuf,

        #[arg(long)]
        element: Option<String>,

        #[arg(long)]
        kind: Option<DocumentKind>,

        #[arg(long)]
        number: Option<String>,

        /// Window title (defaults to the kind's print title)
        #[arg(long)]
        title: Option<String>,

        /// Directory the print document is written to
        #[arg(long, default_value = ".")]
        spool_dir: PathBuf,

        /// Command run on the spooled file, e.g. `-- lp` or `-- firefox`
        #[arg(last = true)]
        command: Vec<String>,
    },
}

fn load_config(path: Option<&Path>, kind: Option<DocumentKind>) -> anyhow::Result<ExportConfig> {
    match path {
        Some(p) => ExportConfig::from_json_file(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(kind.map(DocumentKind::config).unwrap_or_default()),
    }
}

fn element_id(element: Option<String>, kind: Option<DocumentKind>) -> anyhow::Result<String> {
    match (element, kind) {
        (Some(id), _) => Ok(id),
        (None, Some(kind)) => Ok(kind.element_id().to_string()),
        (None, None) => bail!("either --element or --kind is required"),
    }
}

fn read_html(path: &Path) -> anyhow::Result<folioprint::Document> {
    let html = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(folioprint::Document::parse(&html))
}

fn directory_url(html: &Path) -> Option<String> {
    let dir = html.canonicalize().ok()?.parent()?.to_path_buf();
    Url::from_directory_path(dir).ok().map(|u| u.to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            html,
            element,
            kind,
            number,
            output,
            scale,
            format,
            quality,
            timeout_ms,
            base_url,
        } => {
            let mut config = load_config(cli.config.as_deref(), kind)?;
            if let Some(scale) = scale {
                config.scale = scale;
            }
            match format {
                Some(Format::Jpeg) => config.output_format = ImageEncoding::Jpeg { quality },
                Some(Format::Png) => config.output_format = ImageEncoding::Png,
                None => {}
            }
            if timeout_ms.is_some() {
                config.raster_timeout_ms = timeout_ms;
            }
            config.base_url = base_url.or(config.base_url).or_else(|| directory_url(&html));

            let source_id = element_id(element, kind)?;
            let filename = match (&output, kind) {
                (Some(path), _) => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("output path has no file name")?,
                (None, Some(kind)) => kind.filename(number.as_deref().unwrap_or("draft")),
                (None, None) => format!("{source_id}.pdf"),
            };

            let mut doc = read_html(&html)?;
            let pdf = Exporter::new(config).export_to_pdf(&mut doc, &source_id, &filename)?;
            let dir = output
                .as_deref()
                .and_then(Path::parent)
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let path = pdf.save_in(&dir)?;
            info!("wrote {} pages", pdf.page_count);
            println!("{}", path.display());
        }
        Commands::Print {
            html,
            element,
            kind,
            number,
            title,
            spool_dir,
            command,
        } => {
            let config = load_config(cli.config.as_deref(), kind)?;
            let source_id = element_id(element, kind)?;
            let title = match (title, kind) {
                (Some(t), _) => t,
                (None, Some(kind)) => kind.print_title(number.as_deref().unwrap_or("draft")),
                (None, None) => source_id.clone(),
            };

            let doc = read_html(&html)?;
            let host = SpoolHost::new(spool_dir).with_command(command);
            let job = Exporter::new(config).print_view(&doc, &source_id, &title, &host)?;
            if let Some(location) = job.location {
                println!("{location}");
            }
        }
    }
    Ok(())
}
