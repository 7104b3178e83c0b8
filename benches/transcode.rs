use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ometiff::io::ometiff::{build_document, extract_record};
use ometiff::io::OmeDocument;
use ometiff::prelude::*;
use ometiff::shape::normalize_shape;

fn record() -> MetadataRecord {
    let mut record = MetadataRecord::template().with_name("bench");
    record.physical_size_x = Some(PhysicalSize::new(0.1, LengthUnit::Micrometer));
    record.physical_size_y = Some(PhysicalSize::new(0.1, LengthUnit::Micrometer));
    for i in 0..4 {
        record.add_channel(format!("ch{i}"), ChannelRecord::default());
    }
    record
}

fn normalize(c: &mut Criterion) {
    let order: DimensionOrder = "STZCYX".parse().unwrap();
    c.bench_function("normalize_shape", |b| {
        b.iter(|| normalize_shape(black_box(&[10, 4, 512, 512]), black_box(&order)))
    });
}

fn transcode(c: &mut Criterion) {
    let record = record();
    let order: DimensionOrder = "TZCYX".parse().unwrap();
    let dims = [5, 30, 4, 512, 512];
    c.bench_function("build_document", |b| {
        b.iter(|| build_document(black_box(&record), &dims, &order, PixelType::Uint16, true))
    });

    let (document, _) = build_document(&record, &dims, &order, PixelType::Uint16, true).unwrap();
    let xml = document.to_xml().unwrap();
    c.bench_function("parse_and_extract", |b| {
        b.iter(|| {
            let document = OmeDocument::from_xml(black_box(&xml)).unwrap();
            let mut diagnostics = Diagnostics::new();
            extract_record(
                Some(&document),
                std::path::Path::new("bench.ome.tiff"),
                0,
                &mut diagnostics,
            )
        })
    });
}

criterion_group!(benches, normalize, transcode);
criterion_main!(benches);
