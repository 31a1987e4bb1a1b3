use std::fs;
use std::path::PathBuf;

use folioprint::{flatten, Document, FallbackPalette, PixmapRasterizer, RasterOptions, Rasterizer};

fn golden_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("tests/goldens/expected");
    p.push(format!("{name}.sha256"));
    p
}

fn capture_fixture(page: &str, root_id: &str) -> folioprint::RasterBuffer {
    let page = fs::read_to_string(format!("tests/goldens/pages/{page}.html")).expect("read fixture");
    let mut doc = Document::parse(&page);
    let source = doc.get_element_by_id(root_id).expect("source element");
    let (clone, _) = flatten::styled_clone(&mut doc, source, &FallbackPalette::document()).expect("flatten");
    let body = doc.body().expect("body");
    doc.append_child(body, clone);

    let options = RasterOptions {
        scale: 1.0,
        ..Default::default()
    };
    PixmapRasterizer::new().rasterize(&doc, clone, &options).expect("rasterize")
}

fn check_golden(name: &str, buffer: &folioprint::RasterBuffer) {
    let digest = buffer.fingerprint();
    let expected_path = golden_path(name);
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens/expected").ok();
        fs::write(&expected_path, format!("{digest}\n")).expect("write golden");
        println!("Updated golden: {:?}", expected_path);
        return;
    }

    let exp = fs::read_to_string(&expected_path)
        .unwrap_or_else(|e| panic!("no golden at {expected_path:?} ({e}); run with UPDATE_GOLDENS=1"));
    assert_eq!(hex::decode(exp.trim()).expect("invalid hex in golden").len(), 32);
    assert_eq!(digest, exp.trim(), "raster of {name} drifted from its golden");
}

#[test]
fn capture_is_deterministic() {
    let first = capture_fixture("invoice", "invoice-pdf-content");
    let second = capture_fixture("invoice", "invoice-pdf-content");
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn golden_raster_matches_blocks_fixture() {
    let buffer = capture_fixture("blocks", "blocks-pdf-content");
    assert_eq!((buffer.width(), buffer.height()), (794, 1123));

    // sheet padding, the bar with its fallback fill and bottom rule, both cells
    assert_eq!(buffer.pixel(5, 5), Some([240, 244, 248]));
    assert_eq!(buffer.pixel(30, 30), Some([255, 255, 255]));
    assert_eq!(buffer.pixel(30, 61), Some([30, 64, 175]));
    assert_eq!(buffer.pixel(25, 80), Some([16, 185, 129]));
    assert_eq!(buffer.pixel(150, 80), Some([240, 244, 248]));
    assert_eq!(buffer.pixel(200, 100), Some([16, 185, 129]));
    assert_eq!(buffer.pixel(400, 130), Some([255, 255, 255]));

    check_golden("blocks", &buffer);
}
