//! The typed OME object graph: the subset of the OME-XML 2016-06 schema that
//! carries image geometry, channel and instrument metadata.
use std::sync::OnceLock;

use regex::Regex;

use crate::axes::DimensionOrder;
use crate::meta::vocabulary::{
    AcquisitionMode, ContrastMethod, DetectorType, IlluminationType, Immersion, MicroscopeType,
};
use crate::params::{FieldRejection, FieldTarget, FieldValue, LengthUnit, Setter, TimeUnit};
use crate::pixels::PixelType;

/// Check an identifier against the OME LSID form for `kind`, e.g.
/// `Channel:0:1` or `urn:lsid:example.org:Channel:1`.
pub fn is_valid_lsid(kind: &str, id: &str) -> bool {
    static LSID: OnceLock<Regex> = OnceLock::new();
    let pattern = LSID.get_or_init(|| {
        Regex::new(r"^(?:urn:lsid:(?:[\w\-\.]+\.[\w\-\.]+)+:)?([A-Za-z]+):\S+$").unwrap()
    });
    pattern
        .captures(id)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str() == kind)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OmeDocument {
    pub uuid: Option<String>,
    pub creator: Option<String>,
    pub instruments: Vec<Instrument>,
    pub images: Vec<Image>,
}

impl Default for OmeDocument {
    fn default() -> Self {
        Self {
            uuid: Some(format!("urn:uuid:{}", uuid::Uuid::new_v4())),
            creator: Some(format!(
                "{} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            )),
            instruments: Vec::new(),
            images: Vec::new(),
        }
    }
}

impl OmeDocument {
    pub fn image(&self, index: usize) -> Option<&Image> {
        self.images.get(index)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn instrument_by_id(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    /// The instrument an image refers to, falling back to the instrument at the same
    /// position as the image when there is no explicit reference.
    pub fn instrument_for(&self, image_index: usize) -> Option<&Instrument> {
        self.image(image_index)
            .and_then(|img| img.instrument_ref.as_deref())
            .and_then(|id| self.instrument_by_id(id))
            .or_else(|| self.instruments.get(image_index))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: String,
    pub name: Option<String>,
    pub acquisition_date: Option<String>,
    pub description: Option<String>,
    pub instrument_ref: Option<String>,
    pub pixels: Pixels,
}

impl Image {
    pub fn new(id: impl Into<String>, pixels: Pixels) -> Self {
        Self {
            id: id.into(),
            name: None,
            acquisition_date: None,
            description: None,
            instrument_ref: None,
            pixels,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pixels {
    pub id: String,
    /// The stored, fastest-varying-first order, e.g. `XYCZT`
    pub dimension_order: String,
    pub pixel_type: PixelType,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub size_c: usize,
    pub size_t: usize,
    pub physical_size_x: Option<f64>,
    pub physical_size_x_unit: Option<LengthUnit>,
    pub physical_size_y: Option<f64>,
    pub physical_size_y_unit: Option<LengthUnit>,
    pub physical_size_z: Option<f64>,
    pub physical_size_z_unit: Option<LengthUnit>,
    pub time_increment: Option<f64>,
    pub time_increment_unit: Option<TimeUnit>,
    pub significant_bits: Option<u32>,
    pub big_endian: Option<bool>,
    pub interleaved: Option<bool>,
    pub channels: Vec<Channel>,
    pub tiff_data: Vec<TiffData>,
}

impl Default for Pixels {
    fn default() -> Self {
        Self {
            id: "Pixels:0".into(),
            dimension_order: "XYCZT".into(),
            pixel_type: PixelType::Uint16,
            size_x: 1,
            size_y: 1,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            physical_size_x: None,
            physical_size_x_unit: None,
            physical_size_y: None,
            physical_size_y_unit: None,
            physical_size_z: None,
            physical_size_z_unit: None,
            time_increment: None,
            time_increment_unit: None,
            significant_bits: None,
            big_endian: None,
            interleaved: None,
            channels: Vec::new(),
            tiff_data: Vec::new(),
        }
    }
}

impl Pixels {
    pub fn plane_count(&self) -> usize {
        self.size_z * self.size_c * self.size_t
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// The in-memory order, the character reverse of the stored one
    pub fn canonical_order(&self) -> Result<DimensionOrder, crate::axes::DimensionOrderError> {
        DimensionOrder::from_storage_form(&self.dimension_order)
    }

    /// Describe where the planes of this image live in the container. With `explicit`
    /// set every plane gets its own entry with its `C`, `Z` and `T` coordinates, otherwise
    /// a single entry covers them all.
    pub fn populate_tiff_data(&mut self, first_ifd: usize, explicit: bool) {
        self.tiff_data.clear();
        let n_planes = self.plane_count();
        if !explicit {
            self.tiff_data.push(TiffData {
                ifd: Some(first_ifd),
                plane_count: Some(n_planes),
                ..Default::default()
            });
            return;
        }

        // The three non-spatial axes, fastest varying first
        let axes: Vec<char> = self.dimension_order.chars().skip(2).collect();
        let size_of = |axis: char| match axis {
            'C' => self.size_c,
            'Z' => self.size_z,
            'T' => self.size_t,
            _ => 1,
        };
        for plane in 0..n_planes {
            let mut entry = TiffData {
                ifd: Some(first_ifd + plane),
                plane_count: Some(1),
                ..Default::default()
            };
            let mut rest = plane;
            for axis in axes.iter().copied() {
                let size = size_of(axis).max(1);
                let coord = rest % size;
                rest /= size;
                match axis {
                    'C' => entry.first_c = Some(coord),
                    'Z' => entry.first_z = Some(coord),
                    'T' => entry.first_t = Some(coord),
                    _ => {}
                }
            }
            self.tiff_data.push(entry);
        }
    }

    /// The IFD holding the first plane of this image, if the document says
    pub fn first_ifd(&self) -> Option<usize> {
        self.tiff_data.iter().filter_map(|td| td.ifd).min()
    }
}

macro_rules! setter {
    ($fn_name:ident, $target:ty, $field:ident, $key:literal, $conv:expr) => {
        fn $fn_name(target: &mut $target, value: &FieldValue) -> Result<(), FieldRejection> {
            let conv: fn(&FieldValue) -> Option<_> = $conv;
            target.$field = Some(conv(value).ok_or_else(|| FieldRejection::invalid($key, value))?);
            Ok(())
        }
    };
}

fn positive(value: &FieldValue) -> Option<f64> {
    value.as_f64().filter(|v| *v > 0.0)
}

fn non_negative(value: &FieldValue) -> Option<f64> {
    value.as_f64().filter(|v| *v >= 0.0)
}

fn length_unit(value: &FieldValue) -> Option<LengthUnit> {
    value.as_text().and_then(LengthUnit::from_symbol)
}

fn time_unit(value: &FieldValue) -> Option<TimeUnit> {
    value.as_text().and_then(TimeUnit::from_symbol)
}

fn positive_int(value: &FieldValue) -> Option<u32> {
    value.as_u32().filter(|v| *v > 0)
}

fn int32(value: &FieldValue) -> Option<i32> {
    value.as_i64().and_then(|v| i32::try_from(v).ok())
}

fn text(value: &FieldValue) -> Option<String> {
    Some(value.to_string()).filter(|s| !s.trim().is_empty())
}

fn term<T: std::str::FromStr>(value: &FieldValue) -> Option<T> {
    value.as_text().and_then(|s| s.parse().ok())
}

setter!(set_physical_size_x, Pixels, physical_size_x, "PhysicalSizeX", positive);
setter!(set_physical_size_x_unit, Pixels, physical_size_x_unit, "PhysicalSizeXUnit", length_unit);
setter!(set_physical_size_y, Pixels, physical_size_y, "PhysicalSizeY", positive);
setter!(set_physical_size_y_unit, Pixels, physical_size_y_unit, "PhysicalSizeYUnit", length_unit);
setter!(set_physical_size_z, Pixels, physical_size_z, "PhysicalSizeZ", positive);
setter!(set_physical_size_z_unit, Pixels, physical_size_z_unit, "PhysicalSizeZUnit", length_unit);
setter!(set_time_increment, Pixels, time_increment, "TimeIncrement", non_negative);
setter!(set_time_increment_unit, Pixels, time_increment_unit, "TimeIncrementUnit", time_unit);
setter!(set_significant_bits, Pixels, significant_bits, "SignificantBits", positive_int);
setter!(set_big_endian, Pixels, big_endian, "BigEndian", |v| v.as_bool());
setter!(set_interleaved, Pixels, interleaved, "Interleaved", |v| v.as_bool());

impl FieldTarget for Pixels {
    const SCOPE: &'static str = "Pixels";
    const SETTERS: &'static [(&'static str, Setter<Self>)] = &[
        ("PhysicalSizeX", set_physical_size_x),
        ("PhysicalSizeXUnit", set_physical_size_x_unit),
        ("PhysicalSizeY", set_physical_size_y),
        ("PhysicalSizeYUnit", set_physical_size_y_unit),
        ("PhysicalSizeZ", set_physical_size_z),
        ("PhysicalSizeZUnit", set_physical_size_z_unit),
        ("TimeIncrement", set_time_increment),
        ("TimeIncrementUnit", set_time_increment_unit),
        ("SignificantBits", set_significant_bits),
        ("BigEndian", set_big_endian),
        ("Interleaved", set_interleaved),
    ];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
    pub samples_per_pixel: Option<u32>,
    pub illumination_type: Option<IlluminationType>,
    pub pinhole_size: Option<f64>,
    pub pinhole_size_unit: Option<LengthUnit>,
    pub acquisition_mode: Option<AcquisitionMode>,
    pub contrast_method: Option<ContrastMethod>,
    pub excitation_wavelength: Option<f64>,
    pub excitation_wavelength_unit: Option<LengthUnit>,
    pub emission_wavelength: Option<f64>,
    pub emission_wavelength_unit: Option<LengthUnit>,
    pub fluor: Option<String>,
    pub nd_filter: Option<f64>,
    pub pockel_cell_setting: Option<i32>,
    /// RGBA packed into a signed 32 bit integer
    pub color: Option<i32>,
}

impl Channel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

fn set_channel_id(target: &mut Channel, value: &FieldValue) -> Result<(), FieldRejection> {
    match value.as_text() {
        Some(id) if is_valid_lsid("Channel", id) => {
            target.id = id.to_string();
            Ok(())
        }
        _ => Err(FieldRejection::invalid("ID", value)),
    }
}

setter!(set_channel_name, Channel, name, "Name", text);
setter!(set_samples_per_pixel, Channel, samples_per_pixel, "SamplesPerPixel", positive_int);
setter!(set_illumination_type, Channel, illumination_type, "IlluminationType", term);
setter!(set_pinhole_size, Channel, pinhole_size, "PinholeSize", positive);
setter!(set_pinhole_size_unit, Channel, pinhole_size_unit, "PinholeSizeUnit", length_unit);
setter!(set_acquisition_mode, Channel, acquisition_mode, "AcquisitionMode", term);
setter!(set_contrast_method, Channel, contrast_method, "ContrastMethod", term);
setter!(set_excitation_wavelength, Channel, excitation_wavelength, "ExcitationWavelength", positive);
setter!(
    set_excitation_wavelength_unit,
    Channel,
    excitation_wavelength_unit,
    "ExcitationWavelengthUnit",
    length_unit
);
setter!(set_emission_wavelength, Channel, emission_wavelength, "EmissionWavelength", positive);
setter!(
    set_emission_wavelength_unit,
    Channel,
    emission_wavelength_unit,
    "EmissionWavelengthUnit",
    length_unit
);
setter!(set_fluor, Channel, fluor, "Fluor", text);
setter!(set_nd_filter, Channel, nd_filter, "NDFilter", |v| v.as_f64());
setter!(set_pockel_cell_setting, Channel, pockel_cell_setting, "PockelCellSetting", int32);
setter!(set_color, Channel, color, "Color", int32);

impl FieldTarget for Channel {
    const SCOPE: &'static str = "Channel";
    const SETTERS: &'static [(&'static str, Setter<Self>)] = &[
        ("ID", set_channel_id),
        ("Name", set_channel_name),
        ("SamplesPerPixel", set_samples_per_pixel),
        ("IlluminationType", set_illumination_type),
        ("PinholeSize", set_pinhole_size),
        ("PinholeSizeUnit", set_pinhole_size_unit),
        ("AcquisitionMode", set_acquisition_mode),
        ("ContrastMethod", set_contrast_method),
        ("ExcitationWavelength", set_excitation_wavelength),
        ("ExcitationWavelengthUnit", set_excitation_wavelength_unit),
        ("EmissionWavelength", set_emission_wavelength),
        ("EmissionWavelengthUnit", set_emission_wavelength_unit),
        ("Fluor", set_fluor),
        ("NDFilter", set_nd_filter),
        ("PockelCellSetting", set_pockel_cell_setting),
        ("Color", set_color),
    ];
}

/// Maps a run of planes in the image onto IFDs of the container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TiffData {
    pub ifd: Option<usize>,
    pub first_c: Option<usize>,
    pub first_z: Option<usize>,
    pub first_t: Option<usize>,
    pub plane_count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instrument {
    pub id: String,
    pub microscope: Option<Microscope>,
    pub detectors: Vec<Detector>,
    pub objectives: Vec<Objective>,
}

impl Instrument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn detector(&self) -> Option<&Detector> {
        self.detectors.first()
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objectives.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Microscope {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub microscope_type: Option<MicroscopeType>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detector {
    pub id: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub detector_type: Option<DetectorType>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objective {
    pub id: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub lens_na: Option<f64>,
    pub nominal_magnification: Option<f64>,
    pub calibrated_magnification: Option<f64>,
    pub immersion: Option<Immersion>,
}
