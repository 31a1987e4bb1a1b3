//! PDF assembly: one page per page image, each image stretched to the page
//! width and pinned to the top edge.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paginate::{mm_to_pt, PageFormat, PageImage};

/// How page images are embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Baseline JPEG at the given quality (1-100), embedded as `DCTDecode`.
    Jpeg { quality: u8 },
    /// Raw RGB samples, deflated, embedded as `FlateDecode`.
    Png,
}

impl Default for ImageEncoding {
    fn default() -> Self {
        ImageEncoding::Jpeg { quality: 100 }
    }
}

/// A finished PDF, ready for the caller to persist.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl OutputDocument {
    /// Write the document into `dir` under its own filename.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        info!("saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfAssembler {
    pub format: PageFormat,
    pub encoding: ImageEncoding,
    /// Deflate content streams. Image streams are never recompressed.
    pub compress: bool,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            encoding: ImageEncoding::default(),
            compress: true,
        }
    }
}

impl PdfAssembler {
    pub fn new(format: PageFormat, encoding: ImageEncoding) -> Self {
        Self {
            format,
            encoding,
            ..Default::default()
        }
    }

    fn image_stream(&self, page: &PageImage) -> Result<Stream> {
        let (width, height) = page.image.dimensions();
        let (filter, data) = match self.encoding {
            ImageEncoding::Jpeg { quality } => {
                let mut buf = Vec::new();
                JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&page.image)?;
                ("DCTDecode", buf)
            }
            ImageEncoding::Png => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(page.image.as_raw())?;
                ("FlateDecode", encoder.finish()?)
            }
        };
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => filter,
        };
        Ok(Stream::new(dict, data).with_compression(false))
    }

    fn add_page(&self, doc: &mut Document, pages_id: ObjectId, page: &PageImage) -> Result<ObjectId> {
        let page_w = self.format.width_pt() as f32;
        let page_h = self.format.height_pt() as f32;
        let image_h = mm_to_pt(page.height_mm) as f32;

        let image_id = doc.add_object(self.image_stream(page)?);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_w.into(),
                        0.into(),
                        0.into(),
                        image_h.into(),
                        0.into(),
                        (page_h - image_h).into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        Ok(page_id)
    }

    /// Build a PDF with one page per image, in the order given.
    pub fn assemble(&self, pages: &[PageImage], filename: &str) -> Result<OutputDocument> {
        if pages.is_empty() {
            return Err(Error::AssemblyFailure("no pages to assemble".into()));
        }
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(pages.len());
        for page in pages {
            kids.push(Object::from(self.add_page(&mut doc, pages_id, page)?));
        }
        let count = kids.len();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let info_id = doc.add_object(dictionary! {
            "Producer" => Object::string_literal("folioprint"),
        });
        doc.trailer.set("Info", info_id);

        if self.compress {
            doc.compress();
        }
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        debug!("assembled {filename}: {count} pages, {} bytes", bytes.len());

        Ok(OutputDocument {
            filename: filename.to_string(),
            bytes,
            page_count: count,
        })
    }
}
