use std::fs;

use ndarray::{ArrayD, IxDyn};

use super::*;
use crate::axes::{DimensionOrder, DimensionOrderError};
use crate::diagnostics::Diagnostic;
use crate::io::container::{
    Compression, ContainerCodec, ContainerImage, ContainerOptions, ContainerVariant, SizePolicy,
};
use crate::io::tiff::TiffCodec;
use crate::meta::{ChannelRecord, MetadataRecord};
use crate::params::{LengthUnit, PhysicalSize};
use crate::pixels::DType;

fn ramp(shape: &[usize]) -> PixelArray {
    let n: usize = shape.iter().product();
    let values: Vec<u16> = (0..n).map(|v| (v % 65521) as u16).collect();
    PixelArray::from(ArrayD::from_shape_vec(IxDyn(shape), values).unwrap())
}

fn order(s: &str) -> DimensionOrder {
    s.parse().unwrap()
}

fn stack_record() -> MetadataRecord {
    let mut record = MetadataRecord::template().with_name("stack");
    record.physical_size_x = Some(PhysicalSize::new(0.1, LengthUnit::Micrometer));
    record.physical_size_y = Some(PhysicalSize::new(0.1, LengthUnit::Micrometer));
    record.physical_size_z = Some(PhysicalSize::new(0.5, LengthUnit::Micrometer));
    for (name, excitation) in [("DAPI", 405.0), ("GFP", 488.0), ("Cy5", 640.0)] {
        record.add_channel(
            name,
            ChannelRecord::default().with_excitation_wavelength(excitation, LengthUnit::Nanometer),
        );
    }
    record
}

#[test_log::test]
fn test_round_trip_five_axes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.ome.tiff");
    let pixels = ramp(&[2, 10, 3, 20, 20]);
    let record = stack_record();

    let writer = OmeTiffWriter::new(&path, pixels.clone(), &record, &order("STZCYX")).unwrap();
    assert_eq!(writer.dimension_order(), &order("TZCYX"));
    assert_eq!(writer.shape(), &[2, 10, 3, 20, 20]);
    let summary = writer.write().unwrap();
    assert_eq!(summary.variant, ContainerVariant::Standard);
    assert!(summary.diagnostics.is_empty());

    let outcome = OmeTiffReader::new(&path).read().unwrap();
    assert!(outcome.diagnostics.iter().all(|d| matches!(
        d,
        Diagnostic::OptionalSubpathAbsent { .. }
    )));
    assert_eq!(outcome.dimension_order, order("TZCYX"));
    assert_eq!(outcome.array.shape(), &[2, 10, 3, 20, 20]);
    assert_eq!(outcome.array, pixels);

    let metadata = &outcome.metadata;
    assert_eq!(metadata.name.as_deref(), Some("stack"));
    assert_eq!((metadata.size_t, metadata.size_z, metadata.size_c), (2, 10, 3));
    assert_eq!((metadata.size_y, metadata.size_x), (Some(20), Some(20)));
    assert_eq!(metadata.physical_size_x, record.physical_size_x);
    assert_eq!(metadata.physical_size_y, record.physical_size_y);
    assert_eq!(metadata.physical_size_z, record.physical_size_z);
    assert_eq!(metadata.dimension_order_bf.as_deref(), Some("XYCZT"));
    let names: Vec<_> = metadata.channels.keys().cloned().collect();
    assert_eq!(names, ["DAPI", "GFP", "Cy5"]);
    assert_eq!(
        metadata.channels["GFP"].excitation_wavelength,
        Some(PhysicalSize::new(488.0, LengthUnit::Nanometer))
    );
    assert_eq!(outcome.raw_metadata.as_deref(), Some(writer.xml()));

    let exported = OmeTiffReader::new(&path)
        .export_metadata_document(None)
        .unwrap()
        .unwrap();
    assert_eq!(exported, dir.path().join("stack.ome.xml"));
    assert_eq!(fs::read_to_string(&exported).unwrap(), writer.xml());
}

#[test_log::test]
fn test_round_trip_rank_three() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channels.ome.tif");
    let pixels = ramp(&[4, 8, 6]);

    let writer = OmeTiffWriter::builder()
        .compression(Compression::deflate())
        .explicit_size_tagging(true)
        .create(&path, pixels.clone(), &MetadataRecord::template(), &order("CYX"))
        .unwrap();
    assert_eq!(writer.dimension_order(), &order("TZCYX"));
    assert_eq!(writer.document().image(0).unwrap().pixels.tiff_data.len(), 4);
    writer.write().unwrap();

    let outcome = OmeTiffReader::new(&path).read().unwrap();
    assert_eq!(outcome.array.shape(), &[1, 1, 4, 8, 6]);
    assert_eq!(outcome.array, pixels.insert_leading_axes(2));
    assert_eq!(outcome.metadata.name.as_deref(), Some(DEFAULT_IMAGE_NAME));
    let names: Vec<_> = outcome.metadata.channels.keys().cloned().collect();
    assert_eq!(names, ["C:0", "C:1", "C:2", "C:3"]);
}

#[test]
fn test_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exists.ome.tiff");
    fs::write(&path, b"occupied").unwrap();
    let pixels = ramp(&[1, 4, 4]);
    let record = MetadataRecord::template();

    let writer = OmeTiffWriter::new(&path, pixels.clone(), &record, &order("ZYX")).unwrap();
    assert!(matches!(writer.write(), Err(OmeTiffError::FileExists(p)) if p == path));

    let writer = OmeTiffWriter::builder()
        .overwrite(true)
        .create(&path, pixels, &record, &order("ZYX"))
        .unwrap();
    writer.write().unwrap();
    assert!(OmeTiffReader::new(&path).read().is_ok());
}

#[test]
fn test_metadata_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planned.ome.tiff");
    let writer = OmeTiffWriter::new(
        &path,
        vec![5, 3, 64, 64],
        &stack_record(),
        &order("ZCYX"),
    )
    .unwrap();
    let pixels = &writer.document().image(0).unwrap().pixels;
    assert_eq!(pixels.pixel_type, crate::pixels::PixelType::Uint16);
    assert_eq!((pixels.size_t, pixels.size_z, pixels.size_c), (1, 5, 3));
    assert!(matches!(writer.write(), Err(OmeTiffError::MissingPixelData)));
    assert!(!path.exists());

    let sidecar = writer.export_metadata_document(None).unwrap();
    assert_eq!(sidecar, dir.path().join("planned.ome.xml"));
    let text = fs::read_to_string(&sidecar).unwrap();
    assert_eq!(text, writer.xml());
    // A second export replaces the first
    writer.export_metadata_document(None).unwrap();
}

#[test_log::test]
fn test_large_variant_selection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.ome.tiff");
    let pixels = ramp(&[2, 16, 16]);

    let writer = OmeTiffWriter::builder()
        .size_policy(SizePolicy::new(256))
        .create(&path, pixels.clone(), &MetadataRecord::template(), &order("TYX"))
        .unwrap();
    let summary = writer.write().unwrap();
    assert_eq!(summary.variant, ContainerVariant::Large);
    assert_eq!(
        summary.diagnostics.to_vec(),
        vec![Diagnostic::LargeVariantSelected {
            byte_size: 1024,
            threshold: 256
        }]
    );

    let raw = TiffCodec.read(&path).unwrap();
    assert_eq!(raw.variant, ContainerVariant::Large);
    let outcome = OmeTiffReader::new(&path).read().unwrap();
    assert_eq!(outcome.array.shape(), &[1, 1, 2, 16, 16]);
    assert_eq!(outcome.dimension_order, order("CZTYX"));
    assert_eq!(outcome.metadata.dimension_order_bf.as_deref(), Some("XYTZC"));
}

#[test_log::test]
fn test_read_without_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.tif");
    let pixels = ramp(&[3, 5, 7]);
    TiffCodec
        .write(
            &path,
            &ContainerImage::new(&pixels, Some("ImageJ=1.54f\nimages=3\n")),
            &ContainerOptions::default(),
        )
        .unwrap();

    let reader = OmeTiffReader::new(&path);
    let outcome = reader.read().unwrap();
    assert_eq!(outcome.dimension_order, order("TCZYX"));
    assert_eq!(outcome.array.shape(), &[1, 1, 3, 5, 7]);
    assert_eq!(outcome.metadata.filename.as_deref(), Some("plain.tif"));
    assert_eq!(outcome.metadata.extension.as_deref(), Some("ome.tiff"));
    assert!(matches!(
        outcome.diagnostics[0],
        Diagnostic::MissingMetadataDocument { .. }
    ));
    assert_eq!(reader.export_metadata_document(None).unwrap(), None);
}

#[test]
fn test_rejections_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.ome.tiff");

    let err = OmeTiffWriter::new(&path, ramp(&[2, 4, 4]), &stack_record(), &order("CYX"))
        .unwrap_err();
    assert!(matches!(err, OmeTiffError::ChannelCountMismatch(_)));

    let err = OmeTiffWriter::new(&path, ramp(&[2, 4, 4]), &MetadataRecord::template(), &order("SYX"))
        .unwrap_err();
    assert!(matches!(err, OmeTiffError::InvalidDimensionOrdering(_)));

    let err = OmeTiffWriter::new(&path, ramp(&[4, 4]), &MetadataRecord::template(), &order("ZYX"))
        .unwrap_err();
    assert!(matches!(err, OmeTiffError::InvalidDimensionOrdering(_)));

    let empty = PixelArray::zeros(DType::U16, &[0, 4, 4]);
    let err = OmeTiffWriter::new(&path, empty, &MetadataRecord::template(), &order("ZYX"))
        .unwrap_err();
    assert!(matches!(
        err,
        OmeTiffError::InvalidDimensionOrdering(DimensionOrderError::EmptyAxis { .. })
    ));
    let err = OmeTiffWriter::new(&path, vec![3, 0, 8], &MetadataRecord::template(), &order("ZYX"))
        .unwrap_err();
    assert!(matches!(err, OmeTiffError::InvalidDimensionOrdering(_)));

    let wide = PixelArray::zeros(DType::U64, &[2, 4, 4]);
    let err = OmeTiffWriter::new(&path, wide, &MetadataRecord::template(), &order("ZYX"))
        .unwrap_err();
    assert!(matches!(err, OmeTiffError::UnsupportedPixelType(_)));
    assert!(!path.exists());
}

#[test]
fn test_missing_planes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.ome.tiff");
    let document_for = ramp(&[4, 4, 4]);
    let xml = OmeTiffWriter::new(&path, document_for, &MetadataRecord::template(), &order("ZYX"))
        .unwrap()
        .xml()
        .to_string();
    // The document describes four planes but only two are stored
    let pixels = ramp(&[2, 4, 4]);
    TiffCodec
        .write(
            &path,
            &ContainerImage::new(&pixels, Some(xml.as_str())),
            &ContainerOptions::default(),
        )
        .unwrap();
    let err = OmeTiffReader::new(&path).read().unwrap_err();
    assert!(matches!(
        err,
        OmeTiffError::PlaneCountMismatch {
            expected: 4,
            found: 2
        }
    ));
}

#[test]
fn test_sidecar_path() {
    use std::path::Path;
    assert_eq!(
        sidecar_path(Path::new("/data/a.ome.tiff")),
        Path::new("/data/a.ome.xml")
    );
    assert_eq!(sidecar_path(Path::new("b.ome.tif")), Path::new("b.ome.xml"));
    assert_eq!(sidecar_path(Path::new("c.tif")), Path::new("c.xml"));
    assert_eq!(sidecar_path(Path::new("untyped")), Path::new("untyped.xml"));
}
