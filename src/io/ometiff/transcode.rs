//! Conversion between a [`MetadataRecord`] and an [`OmeDocument`].
use std::path::Path;

use chrono::Utc;
use log::debug;

use crate::axes::{Axis, DimensionOrder};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::io::omexml::{Detector, Image, Instrument, Microscope, Objective, OmeDocument, Pixels};
use crate::meta::channel;
use crate::meta::MetadataRecord;
use crate::params::{transfer_fields, PhysicalSize, TimeSpan};
use crate::pixels::{ByteOrder, PixelType};
use crate::shape::axis_size;

use super::OmeTiffError;

/// The image name used when the record does not provide one
pub const DEFAULT_IMAGE_NAME: &str = "ometiff_exported";
/// The extension reported for files read through this crate
pub const OME_TIFF_EXTENSION: &str = "ome.tiff";
pub const OME_TIFF_IMAGE_TYPE: &str = "ometiff";

const IMAGE_ID: &str = "Image:0";
const INSTRUMENT_ID: &str = "Instrument:0";

fn acquisition_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn build_instrument(record: &MetadataRecord) -> Instrument {
    let mut instrument =
        Instrument::new(record.instrument_id.as_deref().unwrap_or(INSTRUMENT_ID));
    if let Some(microscope_type) = record.microscope_type {
        instrument.microscope = Some(Microscope {
            microscope_type: Some(microscope_type),
            ..Default::default()
        });
    }
    if record.has_detector() {
        instrument.detectors.push(Detector {
            id: record
                .detector_id
                .clone()
                .unwrap_or_else(|| "Detector:0:0".into()),
            manufacturer: record.detector_manufacturer.clone(),
            model: record.detector_model.clone(),
            detector_type: record.detector_type,
        });
    }
    if record.has_objective() {
        instrument.objectives.push(Objective {
            id: record
                .objective_id
                .clone()
                .unwrap_or_else(|| "Objective:0:0".into()),
            manufacturer: None,
            model: record.objective_name.clone(),
            lens_na: record.objective_lens_na,
            nominal_magnification: record.objective_nominal_magnification,
            calibrated_magnification: record.objective_calibrated_magnification,
            immersion: record.objective_immersion,
        });
    }
    instrument
}

/**
Build the document describing a canonical array of shape `dims` in `order`.

Sizes come from the shape and the stored dimension order is the reverse of `order`.
Everything else comes from `record`: scalar fields and [`MetadataRecord::extra`] are
pushed through the `Pixels` setter table, channels through the channel mapper and
instrument fields into a single referenced `Instrument`. Fields the document model
rejected are reported as [`Diagnostic::FieldTransferIgnored`].

The only fatal condition is a channel count that disagrees with the `C` axis.
*/
pub fn build_document(
    record: &MetadataRecord,
    dims: &[usize],
    order: &DimensionOrder,
    pixel_type: PixelType,
    explicit_size_tagging: bool,
) -> Result<(OmeDocument, Diagnostics), OmeTiffError> {
    let mut diagnostics = Diagnostics::new();

    let mut pixels = Pixels {
        dimension_order: order.storage_form(),
        pixel_type,
        size_x: axis_size(dims, order, Axis::X),
        size_y: axis_size(dims, order, Axis::Y),
        size_z: axis_size(dims, order, Axis::Z),
        size_c: axis_size(dims, order, Axis::C),
        size_t: axis_size(dims, order, Axis::T),
        big_endian: Some(ByteOrder::native() == ByteOrder::BigEndian),
        interleaved: Some(false),
        ..Default::default()
    };

    let fields = record.pixel_fields();
    let transfer = transfer_fields(&mut pixels, fields.iter().map(|(k, v)| (k.as_str(), v)));
    diagnostics.ignored("Pixels", transfer.ignored);

    let channels = channel::reconcile(&record.channels, pixels.size_c)?;
    for (name, transfer) in channel::apply_to_pixels(&mut pixels, &channels) {
        diagnostics.ignored(format!("Channel {name}"), transfer.ignored);
    }

    pixels.populate_tiff_data(0, explicit_size_tagging);

    let mut image = Image::new(IMAGE_ID, pixels);
    image.name = Some(
        record
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()),
    );
    image.acquisition_date = Some(
        record
            .acquisition_date
            .clone()
            .unwrap_or_else(acquisition_timestamp),
    );

    let mut document = OmeDocument::default();
    if record.has_instrument() {
        let instrument = build_instrument(record);
        image.instrument_ref = Some(instrument.id.clone());
        document.instruments.push(instrument);
    }
    debug!(
        "Built document for {} image {:?} with {} channels",
        order,
        image.name,
        image.pixels.channels.len()
    );
    document.images.push(image);
    Ok((document, diagnostics))
}

/// A fresh record carrying only the identity of the file at `path`
pub fn identity_record(path: &Path) -> MetadataRecord {
    let mut record = MetadataRecord::template();
    record.directory = path
        .parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty());
    record.filename = path.file_name().map(|p| p.to_string_lossy().into_owned());
    record.extension = Some(OME_TIFF_EXTENSION.to_string());
    record.image_type = Some(OME_TIFF_IMAGE_TYPE.to_string());
    record
}

fn read_instrument(
    document: &OmeDocument,
    series: usize,
    record: &mut MetadataRecord,
    diagnostics: &mut Diagnostics,
) {
    let Some(instrument) = document.instrument_for(series) else {
        diagnostics.absent("Instrument");
        return;
    };
    record.instrument_id = Some(instrument.id.clone());

    match &instrument.microscope {
        Some(microscope) => record.microscope_type = microscope.microscope_type,
        None => diagnostics.absent("Instrument/Microscope"),
    }

    match instrument.detector() {
        Some(detector) => {
            record.detector_id = Some(detector.id.clone());
            record.detector_model = detector.model.clone();
            record.detector_manufacturer = detector.manufacturer.clone();
            record.detector_type = detector.detector_type;
        }
        None => diagnostics.absent("Instrument/Detector"),
    }

    match instrument.objective() {
        Some(objective) => {
            record.objective_id = Some(objective.id.clone());
            record.objective_name = objective.model.clone();
            record.objective_lens_na = objective.lens_na;
            record.objective_nominal_magnification = objective.nominal_magnification;
            record.objective_calibrated_magnification = objective.calibrated_magnification;
            record.objective_immersion = objective.immersion;
        }
        None => diagnostics.absent("Instrument/Objective"),
    }
}

/**
Populate a [`MetadataRecord`] for image `series` of the file at `path`.

Without a document the record carries only the file identity and a
[`Diagnostic::MissingMetadataDocument`] is recorded. Optional parts of the document
that are absent fall back to their defaults with a
[`Diagnostic::OptionalSubpathAbsent`]. The record is pruned before it is returned.

Fails only when the stored dimension order of the selected image is invalid.
*/
pub fn extract_record(
    document: Option<&OmeDocument>,
    path: &Path,
    series: usize,
    diagnostics: &mut Diagnostics,
) -> Result<MetadataRecord, OmeTiffError> {
    let mut record = identity_record(path);
    let Some(document) = document else {
        diagnostics.push(Diagnostic::MissingMetadataDocument {
            source: path.display().to_string(),
        });
        record.prune();
        return Ok(record);
    };

    record.total_series = Some(document.image_count());
    record.image_ids = (0..document.image_count()).collect();

    let Some(image) = document.image(series) else {
        diagnostics.absent(format!("Image[{series}]"));
        record.prune();
        return Ok(record);
    };
    record.name = image.name.clone();
    record.acquisition_date = image.acquisition_date.clone();

    let pixels = &image.pixels;
    record.size_x = Some(pixels.size_x);
    record.size_y = Some(pixels.size_y);
    record.size_z = pixels.size_z.max(1);
    record.size_c = pixels.size_c.max(1);
    record.size_t = pixels.size_t.max(1);
    record.sizes_bf = vec![
        document.image_count(),
        record.size_t,
        record.size_z,
        record.size_c,
        pixels.size_y,
        pixels.size_x,
    ];

    record.physical_size_x = pixels
        .physical_size_x
        .map(|v| PhysicalSize::new(v, pixels.physical_size_x_unit.unwrap_or_default()));
    record.physical_size_y = pixels
        .physical_size_y
        .map(|v| PhysicalSize::new(v, pixels.physical_size_y_unit.unwrap_or_default()));
    record.physical_size_z = pixels
        .physical_size_z
        .map(|v| PhysicalSize::new(v, pixels.physical_size_z_unit.unwrap_or_default()));
    record.time_increment = pixels
        .time_increment
        .map(|v| TimeSpan::new(v, pixels.time_increment_unit.unwrap_or_default()));
    record.significant_bits = pixels.significant_bits;

    record.dimension_order_bf = Some(pixels.dimension_order.clone());
    record.dimension_order = Some(pixels.canonical_order()?);

    read_instrument(document, series, &mut record, diagnostics);

    record.channels = channel::extract(pixels, record.size_c, diagnostics);
    record.prune();
    Ok(record)
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;

    use super::*;
    use crate::meta::{ChannelRecord, DetectorType, Immersion};
    use crate::params::{FieldValue, LengthUnit, TimeUnit};

    fn canonical() -> (Vec<usize>, DimensionOrder) {
        (vec![2, 10, 3, 20, 20], "TZCYX".parse().unwrap())
    }

    #[test]
    fn test_build_defaults() {
        let (dims, order) = canonical();
        let (document, diagnostics) = build_document(
            &MetadataRecord::template(),
            &dims,
            &order,
            PixelType::Uint16,
            false,
        )
        .unwrap();
        assert!(diagnostics.is_empty());
        assert!(document.instruments.is_empty());

        let image = document.image(0).unwrap();
        assert_eq!(image.id, "Image:0");
        assert_eq!(image.name.as_deref(), Some(DEFAULT_IMAGE_NAME));
        assert!(image.acquisition_date.is_some());
        assert!(image.instrument_ref.is_none());

        let pixels = &image.pixels;
        assert_eq!(pixels.dimension_order, "XYCZT");
        assert_eq!(
            (pixels.size_t, pixels.size_z, pixels.size_c, pixels.size_y, pixels.size_x),
            (2, 10, 3, 20, 20)
        );
        let names: Vec<_> = pixels.channels.iter().map(|c| c.name.clone().unwrap()).collect();
        assert_eq!(names, ["C:0", "C:1", "C:2"]);
        assert_eq!(pixels.channels[1].id, "Channel:0:1");
        assert_eq!(pixels.tiff_data.len(), 1);
        assert_eq!(pixels.tiff_data[0].plane_count, Some(60));
    }

    #[test]
    fn test_build_rejections_and_instrument() {
        let (dims, order) = canonical();
        let mut record = MetadataRecord::template().with_name("stack");
        record.physical_size_x = Some(PhysicalSize::new(0.25, LengthUnit::Micrometer));
        record.extra.insert("Unheard".into(), FieldValue::from(1));
        record.extra.insert("SignificantBits".into(), FieldValue::from(-4));
        record.detector_type = Some(DetectorType::CCD);
        record.objective_immersion = Some(Immersion::Oil);

        let (document, diagnostics) =
            build_document(&record, &dims, &order, PixelType::Float, true).unwrap();
        assert_eq!(
            diagnostics.to_vec(),
            vec![Diagnostic::FieldTransferIgnored {
                scope: "Pixels".into(),
                fields: vec!["Unheard".into(), "SignificantBits".into()],
            }]
        );
        let image = document.image(0).unwrap();
        assert_eq!(image.pixels.physical_size_x, Some(0.25));
        assert_eq!(image.pixels.tiff_data.len(), 60);
        assert_eq!(image.instrument_ref.as_deref(), Some("Instrument:0"));
        let instrument = document.instrument_for(0).unwrap();
        assert_eq!(instrument.detector().unwrap().detector_type, Some(DetectorType::CCD));
        assert_eq!(instrument.objective().unwrap().immersion, Some(Immersion::Oil));
        assert!(instrument.microscope.is_none());
    }

    #[test]
    fn test_build_channel_mismatch() {
        let (dims, order) = canonical();
        let mut record = MetadataRecord::template();
        record.add_channel("only", ChannelRecord::default());
        let err = build_document(&record, &dims, &order, PixelType::Uint8, false).unwrap_err();
        assert!(matches!(
            err,
            OmeTiffError::ChannelCountMismatch(channel::ChannelCountMismatch {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test_log::test]
    fn test_extract_round_trip() {
        let (dims, order) = canonical();
        let mut record = MetadataRecord::template().with_name("round trip");
        record.physical_size_x = Some(PhysicalSize::new(0.5, LengthUnit::Micrometer));
        record.physical_size_y = Some(PhysicalSize::new(0.5, LengthUnit::Micrometer));
        record.physical_size_z = Some(PhysicalSize::new(2.0, LengthUnit::Micrometer));
        record.time_increment = Some(TimeSpan::new(30.0, TimeUnit::Second));
        record.objective_lens_na = Some(1.4);
        let channels: IndexMap<String, ChannelRecord> = ["DAPI", "GFP", "RFP"]
            .into_iter()
            .map(|n| (n.to_string(), ChannelRecord::default()))
            .collect();
        record.channels = channels;

        let (document, _) =
            build_document(&record, &dims, &order, PixelType::Uint16, false).unwrap();
        let text = document.to_xml().unwrap();
        let document = OmeDocument::from_xml(&text).unwrap();

        let mut diagnostics = Diagnostics::new();
        let path = Path::new("/data/run/stack.ome.tiff");
        let read = extract_record(Some(&document), path, 0, &mut diagnostics).unwrap();

        assert_eq!(read.directory.as_deref(), Some("/data/run"));
        assert_eq!(read.filename.as_deref(), Some("stack.ome.tiff"));
        assert_eq!(read.extension.as_deref(), Some(OME_TIFF_EXTENSION));
        assert_eq!(read.image_type.as_deref(), Some(OME_TIFF_IMAGE_TYPE));
        assert_eq!(read.name.as_deref(), Some("round trip"));
        assert_eq!((read.size_t, read.size_z, read.size_c), (2, 10, 3));
        assert_eq!((read.size_y, read.size_x), (Some(20), Some(20)));
        assert_eq!(read.sizes_bf, vec![1, 2, 10, 3, 20, 20]);
        assert_eq!(read.physical_size_x, record.physical_size_x);
        assert_eq!(read.physical_size_z, record.physical_size_z);
        assert_eq!(read.time_increment, record.time_increment);
        assert_eq!(read.dimension_order_bf.as_deref(), Some("XYCZT"));
        assert_eq!(read.dimension_order, Some(order));
        assert_eq!(read.total_series, Some(1));
        assert_eq!(read.image_ids, vec![0]);
        assert_eq!(read.objective_lens_na, Some(1.4));
        let names: Vec<_> = read.channels.keys().cloned().collect();
        assert_eq!(names, ["DAPI", "GFP", "RFP"]);
        assert_eq!(read.channels["GFP"].id.as_deref(), Some("Channel:0:1"));

        // The instrument exists but has no microscope or detector
        assert_eq!(
            diagnostics.to_vec(),
            vec![
                Diagnostic::OptionalSubpathAbsent {
                    path: "Instrument/Microscope".into()
                },
                Diagnostic::OptionalSubpathAbsent {
                    path: "Instrument/Detector".into()
                },
            ]
        );
    }

    #[test]
    fn test_extract_without_document() {
        let mut diagnostics = Diagnostics::new();
        let read =
            extract_record(None, Path::new("plain.tif"), 0, &mut diagnostics).unwrap();
        assert!(read.directory.is_none());
        assert_eq!(read.filename.as_deref(), Some("plain.tif"));
        assert_eq!(read.size_c, 1);
        assert!(read.name.is_none());
        assert!(matches!(
            diagnostics[0],
            Diagnostic::MissingMetadataDocument { .. }
        ));
    }

    #[test]
    fn test_extract_missing_series() {
        let (dims, order) = canonical();
        let (document, _) =
            build_document(&MetadataRecord::template(), &dims, &order, PixelType::Uint8, false)
                .unwrap();
        let mut diagnostics = Diagnostics::new();
        let read =
            extract_record(Some(&document), Path::new("a.ome.tiff"), 3, &mut diagnostics).unwrap();
        assert_eq!(read.total_series, Some(1));
        assert!(read.size_x.is_none());
        assert_eq!(
            diagnostics.to_vec(),
            vec![Diagnostic::OptionalSubpathAbsent {
                path: "Image[3]".into()
            }]
        );
    }
}
