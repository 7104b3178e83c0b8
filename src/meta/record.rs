use indexmap::IndexMap;

use crate::axes::DimensionOrder;
use crate::meta::channel::ChannelRecord;
use crate::meta::vocabulary::{DetectorType, Immersion, MicroscopeType};
use crate::params::{FieldMap, FieldValue, PhysicalSize, TimeSpan};

/**
The metadata describing a single image series, independent of any document model.

Every field has a well-defined empty value: `None`, an empty collection, or 1 for the
sizes of axes an image does not use. Records read from a file only ever contain
fields the source document specified, see [`MetadataRecord::prune`].
*/
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataRecord {
    pub directory: Option<String>,
    pub filename: Option<String>,
    pub extension: Option<String>,
    pub image_type: Option<String>,

    pub name: Option<String>,
    /// An `xsd:dateTime` string
    pub acquisition_date: Option<String>,
    pub total_series: Option<usize>,
    pub image_ids: Vec<usize>,

    pub size_x: Option<usize>,
    pub size_y: Option<usize>,
    pub size_z: usize,
    pub size_c: usize,
    pub size_t: usize,
    pub size_s: usize,
    pub size_b: usize,
    pub size_m: usize,

    pub physical_size_x: Option<PhysicalSize>,
    pub physical_size_y: Option<PhysicalSize>,
    pub physical_size_z: Option<PhysicalSize>,
    pub time_increment: Option<TimeSpan>,
    pub significant_bits: Option<u32>,

    /// Series count followed by the `T`, `Z`, `C`, `Y` and `X` sizes
    pub sizes_bf: Vec<usize>,
    /// The dimension order as it was stored in the document
    pub dimension_order_bf: Option<String>,
    /// The in-memory order of the array that accompanies this record
    pub dimension_order: Option<DimensionOrder>,

    pub instrument_id: Option<String>,
    pub microscope_type: Option<MicroscopeType>,
    pub detector_id: Option<String>,
    pub detector_model: Option<String>,
    pub detector_manufacturer: Option<String>,
    pub detector_type: Option<DetectorType>,
    pub objective_id: Option<String>,
    pub objective_name: Option<String>,
    pub objective_lens_na: Option<f64>,
    pub objective_nominal_magnification: Option<f64>,
    pub objective_calibrated_magnification: Option<f64>,
    pub objective_immersion: Option<Immersion>,

    /// Per-channel metadata keyed by channel name, in channel index order
    pub channels: IndexMap<String, ChannelRecord>,
    /// Additional `Pixels` attributes addressed by their OME attribute name
    pub extra: FieldMap,
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self {
            directory: None,
            filename: None,
            extension: None,
            image_type: None,
            name: None,
            acquisition_date: None,
            total_series: None,
            image_ids: Vec::new(),
            size_x: None,
            size_y: None,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            size_s: 1,
            size_b: 1,
            size_m: 1,
            physical_size_x: None,
            physical_size_y: None,
            physical_size_z: None,
            time_increment: None,
            significant_bits: None,
            sizes_bf: Vec::new(),
            dimension_order_bf: None,
            dimension_order: None,
            instrument_id: None,
            microscope_type: None,
            detector_id: None,
            detector_model: None,
            detector_manufacturer: None,
            detector_type: None,
            objective_id: None,
            objective_name: None,
            objective_lens_na: None,
            objective_nominal_magnification: None,
            objective_calibrated_magnification: None,
            objective_immersion: None,
            channels: IndexMap::new(),
            extra: FieldMap::new(),
        }
    }
}

fn prune_text(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|s| s.trim().is_empty()) {
        *value = None;
    }
}

macro_rules! push_present {
    ($fields:ident, $name:literal, $value:expr) => {
        if let Some(v) = $value {
            $fields.push(($name.to_string(), FieldValue::from(v)));
        }
    };
}

impl MetadataRecord {
    /// A fresh record with every field at its default
    pub fn template() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn add_channel(&mut self, name: impl Into<String>, channel: ChannelRecord) {
        self.channels.insert(name.into(), channel);
    }

    /// Whether any of the instrument, microscope, detector or objective fields is set
    pub fn has_instrument(&self) -> bool {
        self.instrument_id.is_some()
            || self.microscope_type.is_some()
            || self.has_detector()
            || self.has_objective()
    }

    pub fn has_detector(&self) -> bool {
        self.detector_id.is_some()
            || self.detector_model.is_some()
            || self.detector_manufacturer.is_some()
            || self.detector_type.is_some()
    }

    pub fn has_objective(&self) -> bool {
        self.objective_id.is_some()
            || self.objective_name.is_some()
            || self.objective_lens_na.is_some()
            || self.objective_nominal_magnification.is_some()
            || self.objective_calibrated_magnification.is_some()
            || self.objective_immersion.is_some()
    }

    /// Drop blank strings and empty values, here and in every channel record
    pub fn prune(&mut self) {
        for text in [
            &mut self.directory,
            &mut self.filename,
            &mut self.extension,
            &mut self.image_type,
            &mut self.name,
            &mut self.acquisition_date,
            &mut self.dimension_order_bf,
            &mut self.instrument_id,
            &mut self.detector_id,
            &mut self.detector_model,
            &mut self.detector_manufacturer,
            &mut self.objective_id,
            &mut self.objective_name,
        ] {
            prune_text(text);
        }
        self.extra.retain(|_, v| !v.is_empty());
        self.channels.values_mut().for_each(ChannelRecord::prune);
    }

    /**
    The fields pushed onto the document's `Pixels` element by name: physical sizes
    and their units, the time increment, significant bits and then [`Self::extra`].

    Sizes, the pixel type and the dimension order are not included, they are
    derived from the array.
    */
    pub fn pixel_fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = Vec::new();
        for (axis, size) in [
            ("X", &self.physical_size_x),
            ("Y", &self.physical_size_y),
            ("Z", &self.physical_size_z),
        ] {
            if let Some(size) = size {
                fields.push((format!("PhysicalSize{axis}"), FieldValue::Float(size.value)));
                fields.push((
                    format!("PhysicalSize{axis}Unit"),
                    FieldValue::from(size.unit.symbol()),
                ));
            }
        }
        if let Some(dt) = &self.time_increment {
            fields.push(("TimeIncrement".into(), FieldValue::Float(dt.value)));
            fields.push(("TimeIncrementUnit".into(), FieldValue::from(dt.unit.symbol())));
        }
        push_present!(fields, "SignificantBits", self.significant_bits);
        fields.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields
    }

    /// List the populated scalar fields as `(name, value)` pairs, named as in OME-XML
    /// where there is an equivalent.
    pub fn present_fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = Vec::new();
        push_present!(fields, "Directory", self.directory.clone());
        push_present!(fields, "Filename", self.filename.clone());
        push_present!(fields, "Extension", self.extension.clone());
        push_present!(fields, "ImageType", self.image_type.clone());
        push_present!(fields, "Name", self.name.clone());
        push_present!(fields, "AcquisitionDate", self.acquisition_date.clone());
        push_present!(fields, "TotalSeries", self.total_series);
        push_present!(fields, "SizeX", self.size_x);
        push_present!(fields, "SizeY", self.size_y);
        push_present!(fields, "SizeZ", Some(self.size_z));
        push_present!(fields, "SizeC", Some(self.size_c));
        push_present!(fields, "SizeT", Some(self.size_t));
        push_present!(fields, "SizeS", Some(self.size_s));
        push_present!(fields, "SizeB", Some(self.size_b));
        push_present!(fields, "SizeM", Some(self.size_m));
        fields.extend(
            self.pixel_fields()
                .into_iter()
                .filter(|(k, _)| !self.extra.contains_key(k)),
        );
        push_present!(fields, "DimOrder BF", self.dimension_order_bf.clone());
        push_present!(
            fields,
            "DimOrder",
            self.dimension_order.as_ref().map(|o| o.to_string())
        );
        push_present!(fields, "InstrumentID", self.instrument_id.clone());
        push_present!(
            fields,
            "MicroscopeType",
            self.microscope_type.map(|t| t.as_str())
        );
        push_present!(fields, "DetectorID", self.detector_id.clone());
        push_present!(fields, "DetectorModel", self.detector_model.clone());
        push_present!(fields, "DetectorManufacturer", self.detector_manufacturer.clone());
        push_present!(fields, "DetectorType", self.detector_type.map(|t| t.as_str()));
        push_present!(fields, "ObjID", self.objective_id.clone());
        push_present!(fields, "ObjName", self.objective_name.clone());
        push_present!(fields, "ObjNA", self.objective_lens_na);
        push_present!(fields, "ObjNominalMag", self.objective_nominal_magnification);
        push_present!(fields, "ObjCalibratedMag", self.objective_calibrated_magnification);
        push_present!(
            fields,
            "ObjImmersion",
            self.objective_immersion.map(|t| t.as_str())
        );
        fields.extend(
            self.extra
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        fields
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{LengthUnit, TimeUnit};

    #[test]
    fn test_template_defaults() {
        let record = MetadataRecord::template();
        assert_eq!(record.size_z, 1);
        assert_eq!(record.size_c, 1);
        assert_eq!(record.size_t, 1);
        assert_eq!(record.size_m, 1);
        assert!(record.size_x.is_none());
        assert!(record.channels.is_empty());
        assert!(!record.has_instrument());

        // Every call produces an independent value
        let mut a = MetadataRecord::template();
        a.name = Some("changed".into());
        assert!(MetadataRecord::template().name.is_none());
    }

    #[test]
    fn test_prune() {
        let mut record = MetadataRecord::template();
        record.name = Some("   ".into());
        record.detector_model = Some("".into());
        record.objective_name = Some("Plan Apo".into());
        record.extra.insert("Note".into(), FieldValue::from(""));
        record.extra.insert("Interleaved".into(), FieldValue::from(false));
        record.prune();
        assert!(record.name.is_none());
        assert!(record.detector_model.is_none());
        assert_eq!(record.objective_name.as_deref(), Some("Plan Apo"));
        assert_eq!(record.extra.len(), 1);
        assert!(record.has_objective());
    }

    #[test]
    fn test_pixel_fields() {
        let mut record = MetadataRecord::template();
        record.physical_size_x = Some(PhysicalSize::new(0.5, LengthUnit::Micrometer));
        record.time_increment = Some(TimeSpan::new(2.0, TimeUnit::Millisecond));
        record.significant_bits = Some(12);
        let fields = record.pixel_fields();
        let names: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            [
                "PhysicalSizeX",
                "PhysicalSizeXUnit",
                "TimeIncrement",
                "TimeIncrementUnit",
                "SignificantBits"
            ]
        );
        assert_eq!(fields[1].1, FieldValue::from("µm"));
        assert_eq!(fields[3].1, FieldValue::from("ms"));

        let present = record.present_fields();
        assert!(present.iter().any(|(k, _)| k == "SizeC"));
        assert!(present.iter().any(|(k, _)| k == "PhysicalSizeX"));
        assert!(!present.iter().any(|(k, _)| k == "Name"));
    }
}
