use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream, StringFormat};
use tempfile::tempdir;

use recruit_extract::config::OcrConfig;
use recruit_extract::infra::ExtractorRegistry;
use recruit_extract::pipeline::extract::ocr::{BoundingBox, OcrLine, TextRecognizer};
use recruit_extract::pipeline::extract::paginated::{LopdfSource, PageImage, PageSource};
use recruit_extract::pipeline::extract::{Document, PaginatedExtractor, TableExtractor};
use recruit_extract::pipeline::mapper::FieldMapper;
use recruit_extract::pipeline::quality_gate::Validator;
use recruit_extract::pipeline::schema::SchemaDictionary;
use recruit_extract::PositionExtractionUseCase;

fn int(value: i64) -> Object {
    Object::Integer(value)
}

/// UCS-2 big-endian string, as shown through a `UniGB-UCS2-H` font
fn ucs2(text: &str) -> Object {
    Object::String(
        text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        StringFormat::Hexadecimal,
    )
}

fn show_at(text: &str, x: i64, y: i64) -> Vec<Operation> {
    vec![
        Operation::new("Tm", vec![int(1), int(0), int(0), int(1), int(x), int(y)]),
        Operation::new("Tj", vec![ucs2(text)]),
    ]
}

/// One page per operation list; resources live on the page-tree root and are inherited
fn write_pdf(
    path: &Path,
    resources: Dictionary,
    extra: Vec<(Vec<u8>, Object)>,
    pages: Vec<Vec<Operation>>,
) -> Result<()> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut resources = resources;
    for (name, object) in extra {
        let id = doc.add_object(object);
        let mut xobjects = match resources.get(b"XObject") {
            Ok(Object::Dictionary(existing)) => existing.clone(),
            _ => Dictionary::new(),
        };
        xobjects.set(name, id);
        resources.set("XObject", xobjects);
    }
    let resources_id = doc.add_object(resources);

    let mut kids = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![int(0), int(0), int(595), int(842)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

fn cjk_font_resources() -> Dictionary {
    dictionary! {
        "Font" => dictionary! {
            "F1" => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "STSong-Light",
                "Encoding" => "UniGB-UCS2-H",
            },
        },
    }
}

fn native_table_pdf(path: &Path) -> Result<()> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), int(10)]),
    ];
    ops.extend(show_at("2025年度招考职位表", 200, 780));
    for (x, text) in [(50, "职位名称"), (170, "部门名称"), (290, "招录人数"), (410, "学历")] {
        ops.extend(show_at(text, x, 700));
    }
    // A kerned TJ array still reads as one cell
    ops.push(Operation::new(
        "Tm",
        vec![int(1), int(0), int(0), int(1), int(50), int(680)],
    ));
    ops.push(Operation::new(
        "TJ",
        vec![Object::Array(vec![ucs2("科"), int(-50), ucs2("员")])],
    ));
    for (x, text) in [(170, "某某局"), (290, "5"), (410, "本科")] {
        ops.extend(show_at(text, x, 681));
    }
    ops.push(Operation::new("ET", vec![]));
    write_pdf(path, cjk_font_resources(), Vec::new(), vec![ops])
}

fn registry_use_case(registry: ExtractorRegistry) -> PositionExtractionUseCase {
    PositionExtractionUseCase::new(
        Box::new(registry),
        FieldMapper::new(SchemaDictionary::builtin()),
        Validator::new(),
    )
}

#[test]
fn test_positioned_text_is_rebuilt_into_columns() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("positions.pdf");
    native_table_pdf(&path)?;

    let source = LopdfSource::open(&path)?;
    assert_eq!(source.page_count(), 1);
    assert!(source.page_images(1).is_empty());
    assert_eq!(
        source.page_text(1),
        "2025年度招考职位表\n职位名称\t部门名称\t招录人数\t学历\n科员\t某某局\t5\t本科"
    );
    Ok(())
}

#[test]
fn test_native_pdf_table_through_the_pipeline() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("positions.pdf");
    native_table_pdf(&path)?;

    let extractor = PaginatedExtractor::new();
    let tables = extractor.extract_file(&path)?;
    assert_eq!(tables.len(), 1);
    assert!(extractor.identify_candidate(&tables[0]));
    assert_eq!(extractor.page_count(&path)?, 1);

    let report = registry_use_case(ExtractorRegistry::new(SchemaDictionary::builtin()))
        .process(&Document::from_path(&path)?)?;
    assert_eq!(report.raw_records.len(), 1);
    assert_eq!(report.batch.valid.len(), 1);
    let record = &report.batch.valid[0].record;
    assert_eq!(record.position_name.as_deref(), Some("科员"));
    assert_eq!(record.department_name.as_deref(), Some("某某局"));
    assert_eq!(record.recruit_count, Some(5));
    Ok(())
}

/// Replays the same table for every image and records the image sizes it saw
struct RecordingRecognizer {
    seen: Mutex<Vec<(u32, u32)>>,
}

impl TextRecognizer for RecordingRecognizer {
    fn name(&self) -> &str {
        "recording"
    }

    fn recognize(&self, image: &DynamicImage) -> recruit_extract::Result<Vec<OcrLine>> {
        self.seen
            .lock()
            .unwrap()
            .push((image.width(), image.height()));
        let at = |text: &str, x: f32, y: f32| OcrLine {
            text: text.to_string(),
            bbox: BoundingBox::new(x - 20.0, y - 8.0, x + 20.0, y + 8.0),
            confidence: 0.9,
        };
        Ok(vec![
            at("职位名称", 40.0, 20.0),
            at("部门名称", 120.0, 20.0),
            at("招录人数", 200.0, 20.0),
            at("科员", 40.0, 60.0),
            at("某某局", 120.0, 60.0),
            at("2", 200.0, 60.0),
        ])
    }
}

fn scanned_pdf(path: &Path) -> Result<()> {
    let mut jpeg = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([255, 255, 255])))
        .write_to(&mut jpeg, ImageFormat::Jpeg)?;
    let jpeg_image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 120,
            "Height" => 80,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.into_inner(),
    );

    let mut gray_image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 64,
            "Height" => 48,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![255u8; 64 * 48],
    );
    gray_image.compress()?;

    let page = vec![
        Operation::new("q", vec![]),
        Operation::new("cm", vec![int(120), int(0), int(0), int(80), int(0), int(0)]),
        Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
        Operation::new("Q", vec![]),
    ];
    write_pdf(
        path,
        Dictionary::new(),
        vec![
            (b"Im1".to_vec(), Object::Stream(jpeg_image)),
            (b"Im2".to_vec(), Object::Stream(gray_image)),
        ],
        vec![page],
    )
}

#[test]
fn test_inherited_page_images_are_found() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("scan.pdf");
    scanned_pdf(&path)?;

    let source = LopdfSource::open(&path)?;
    let images = source.page_images(1);
    assert_eq!(images.len(), 2);
    assert!(matches!(images[0], PageImage::Jpeg(_)));
    assert!(matches!(
        images[1],
        PageImage::Raw {
            width: 64,
            height: 48,
            channels: 1,
            ..
        }
    ));
    assert_eq!(source.page_text(1), "");
    Ok(())
}

#[test]
fn test_scanned_pdf_goes_through_ocr() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("scan.pdf");
    scanned_pdf(&path)?;

    let recognizer = Arc::new(RecordingRecognizer {
        seen: Mutex::new(Vec::new()),
    });
    let registry = ExtractorRegistry::with_recognizer(
        SchemaDictionary::builtin(),
        recognizer.clone(),
        &OcrConfig::default(),
    );
    let report = registry_use_case(registry).process(&Document::from_path(&path)?)?;

    assert_eq!(*recognizer.seen.lock().unwrap(), vec![(120, 80), (64, 48)]);
    assert_eq!(report.tables_found, 2);
    assert_eq!(report.raw_records.len(), 2);
    assert_eq!(report.raw_records[0].get("department_name"), Some("某某局"));
    Ok(())
}

#[test]
fn test_scanned_pdf_without_ocr_yields_nothing() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("scan.pdf");
    scanned_pdf(&path)?;
    assert!(PaginatedExtractor::new().extract_file(&path)?.is_empty());
    Ok(())
}
