//! Image loading for `<img>` boxes: `data:` URIs, local files and, with the
//! `remote-images` feature, http(s) URLs.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use tiny_skia::Pixmap;
use url::Url;

use super::RasterOptions;
use crate::error::{Error, Result};

/// Where an image source points after resolution against the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Data(String),
    File(String),
    Remote(Url),
}

impl ImageSource {
    pub fn resolve(src: &str, origin: Option<&Url>) -> ImageSource {
        let src = src.trim();
        if src.starts_with("data:") {
            return ImageSource::Data(src.to_string());
        }
        if let Ok(url) = Url::parse(src) {
            return match url.scheme() {
                "http" | "https" => ImageSource::Remote(url),
                "file" => url
                    .to_file_path()
                    .map(|p| ImageSource::File(p.to_string_lossy().into_owned()))
                    .unwrap_or_else(|_| ImageSource::File(src.to_string())),
                _ => ImageSource::File(src.to_string()),
            };
        }
        match origin.and_then(|base| base.join(src).ok()) {
            Some(url) if matches!(url.scheme(), "http" | "https") => ImageSource::Remote(url),
            Some(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(|p| ImageSource::File(p.to_string_lossy().into_owned()))
                .unwrap_or_else(|_| ImageSource::File(src.to_string())),
            _ => ImageSource::File(src.to_string()),
        }
    }
}

/// Load and decode `src` into a premultiplied pixmap.
pub fn load_image(src: &str, options: &RasterOptions) -> Result<Pixmap> {
    match ImageSource::resolve(src, options.origin.as_ref()) {
        ImageSource::Data(uri) => {
            let (mime, data) = parse_data_uri(&uri)
                .ok_or_else(|| Error::RasterizationFailure("malformed data URI".into()))?;
            decode_image_to_pixmap(&data, Some(&mime))
        }
        ImageSource::File(path) => {
            let bytes = std::fs::read(Path::new(&path))?;
            decode_image_to_pixmap(&bytes, None)
        }
        ImageSource::Remote(url) => {
            let same_origin = options
                .origin
                .as_ref()
                .map_or(false, |o| o.origin() == url.origin());
            if !same_origin && !options.allow_cross_origin {
                return Err(Error::RasterizationFailure(format!(
                    "cross-origin image {url} not allowed"
                )));
            }
            let bytes = fetch_remote(&url, options.image_timeout)?;
            decode_image_to_pixmap(&bytes, None)
        }
    }
}

#[cfg(feature = "remote-images")]
fn fetch_remote(url: &Url, timeout: Option<Duration>) -> Result<Vec<u8>> {
    let mut builder = reqwest::blocking::Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    let client = builder
        .build()
        .map_err(|e| Error::RasterizationFailure(format!("Failed to build HTTP client: {}", e)))?;
    let res = client
        .get(url.as_str())
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::RasterizationFailure(format!("HTTP GET {} failed: {}", url, e)))?;
    let body = res
        .bytes()
        .map_err(|e| Error::RasterizationFailure(format!("Failed to read image body: {}", e)))?;
    Ok(body.to_vec())
}

#[cfg(not(feature = "remote-images"))]
fn fetch_remote(url: &Url, _timeout: Option<Duration>) -> Result<Vec<u8>> {
    Err(Error::RasterizationFailure(format!(
        "remote image {url} needs the remote-images feature"
    )))
}

fn decode_image_to_pixmap(data: &[u8], mime: Option<&str>) -> Result<Pixmap> {
    let format = match mime {
        Some(m) if m.contains("png") => Some(image::ImageFormat::Png),
        Some(m) if m.contains("jpeg") || m.contains("jpg") => Some(image::ImageFormat::Jpeg),
        _ => image::guess_format(data).ok(),
    };
    let decoded = match format {
        Some(fmt) => image::load_from_memory_with_format(data, fmt),
        None => image::load_from_memory(data),
    }
    .map_err(|e| Error::RasterizationFailure(format!("image decode failed: {e}")))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| Error::RasterizationFailure(format!("invalid image size {width}x{height}")))?;
    for (src, dst) in rgba.as_raw().chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[cfg(test)]
pub(crate) fn png_data_uri(width: u32, height: u32, rgb: [u8; 3]) -> String {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_payload_is_decoded() {
        let (mime, data) = parse_data_uri("data:text/plain;base64,SGVsbG8=").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"Hello");
    }

    #[test]
    fn png_data_uri_loads() {
        let uri = png_data_uri(3, 2, [10, 20, 30]);
        let pixmap = load_image(&uri, &RasterOptions::default()).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (3, 2));
        assert_eq!(&pixmap.data()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn sources_resolve_against_origin() {
        let origin = Url::parse("https://app.example.com/invoices/1").unwrap();
        assert_eq!(
            ImageSource::resolve("/logo.png", Some(&origin)),
            ImageSource::Remote(Url::parse("https://app.example.com/logo.png").unwrap())
        );
        assert_eq!(
            ImageSource::resolve("logo.png", None),
            ImageSource::File("logo.png".into())
        );
    }

    #[test]
    fn cross_origin_images_can_be_refused() {
        let opts = RasterOptions {
            allow_cross_origin: false,
            origin: Url::parse("https://app.example.com/").ok(),
            ..Default::default()
        };
        let err = load_image("https://cdn.other.test/logo.png", &opts).unwrap_err();
        assert!(matches!(err, Error::RasterizationFailure(_)));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let err = load_image("/definitely/not/here.png", &RasterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
