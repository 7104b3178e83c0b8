//! Per-channel metadata and its reconciliation with the channel axis of an image.
use indexmap::IndexMap;
use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::io::omexml::{Channel, Pixels};
use crate::meta::vocabulary::{AcquisitionMode, ContrastMethod, IlluminationType};
use crate::params::{
    transfer_fields, FieldMap, FieldTransfer, FieldValue, LengthUnit, PhysicalSize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected} channel records to match the channel axis, found {found}")]
pub struct ChannelCountMismatch {
    pub expected: usize,
    pub found: usize,
}

/// Channel metadata, keyed by channel name in a [`MetadataRecord`](crate::meta::MetadataRecord)
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelRecord {
    pub id: Option<String>,
    pub samples_per_pixel: Option<u32>,
    pub illumination_type: Option<IlluminationType>,
    pub pinhole_size: Option<PhysicalSize>,
    pub acquisition_mode: Option<AcquisitionMode>,
    pub contrast_method: Option<ContrastMethod>,
    pub excitation_wavelength: Option<PhysicalSize>,
    pub emission_wavelength: Option<PhysicalSize>,
    pub fluor: Option<String>,
    pub nd_filter: Option<f64>,
    pub pockel_cell_setting: Option<i32>,
    pub color: Option<i32>,
    /// Further `Channel` attributes addressed by their OME attribute name
    pub extra: FieldMap,
}

/// Pair an optional value with its unit, using `default_unit` when only the value is given
fn quantity(
    value: Option<f64>,
    unit: Option<LengthUnit>,
    default_unit: LengthUnit,
) -> Option<PhysicalSize> {
    value.map(|v| PhysicalSize::new(v, unit.unwrap_or(default_unit)))
}

impl ChannelRecord {
    pub fn with_excitation_wavelength(mut self, value: f64, unit: LengthUnit) -> Self {
        self.excitation_wavelength = Some(PhysicalSize::new(value, unit));
        self
    }

    pub fn with_emission_wavelength(mut self, value: f64, unit: LengthUnit) -> Self {
        self.emission_wavelength = Some(PhysicalSize::new(value, unit));
        self
    }

    pub fn prune(&mut self) {
        for text in [&mut self.id, &mut self.fluor] {
            if text.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *text = None;
            }
        }
        self.extra.retain(|_, v| !v.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// The populated fields as `(OME attribute name, value)` pairs, followed by
    /// [`Self::extra`]
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields: Vec<(String, FieldValue)> = Vec::new();
        let mut push = |name: &str, value: FieldValue| fields.push((name.to_string(), value));

        if let Some(id) = &self.id {
            push("ID", FieldValue::from(id.as_str()));
        }
        if let Some(spp) = self.samples_per_pixel {
            push("SamplesPerPixel", FieldValue::from(spp));
        }
        if let Some(t) = self.illumination_type {
            push("IlluminationType", FieldValue::from(t.as_str()));
        }
        for (name, size) in [
            ("PinholeSize", &self.pinhole_size),
            ("ExcitationWavelength", &self.excitation_wavelength),
            ("EmissionWavelength", &self.emission_wavelength),
        ] {
            if let Some(size) = size {
                push(name, FieldValue::Float(size.value));
                push(format!("{name}Unit").as_str(), FieldValue::from(size.unit.symbol()));
            }
        }
        if let Some(mode) = self.acquisition_mode {
            push("AcquisitionMode", FieldValue::from(mode.as_str()));
        }
        if let Some(method) = self.contrast_method {
            push("ContrastMethod", FieldValue::from(method.as_str()));
        }
        if let Some(fluor) = &self.fluor {
            push("Fluor", FieldValue::from(fluor.as_str()));
        }
        if let Some(nd) = self.nd_filter {
            push("NDFilter", FieldValue::Float(nd));
        }
        if let Some(pockel) = self.pockel_cell_setting {
            push("PockelCellSetting", FieldValue::from(pockel));
        }
        if let Some(color) = self.color {
            push("Color", FieldValue::from(color));
        }
        for (k, v) in self.extra.iter() {
            push(k.as_str(), v.clone());
        }
        fields
    }

    /// Copy the allow-listed fields present on `channel`
    pub fn from_document(channel: &Channel) -> Self {
        let mut record = Self {
            id: Some(channel.id.clone()),
            samples_per_pixel: channel.samples_per_pixel,
            illumination_type: channel.illumination_type,
            pinhole_size: quantity(
                channel.pinhole_size,
                channel.pinhole_size_unit,
                LengthUnit::Micrometer,
            ),
            acquisition_mode: channel.acquisition_mode,
            contrast_method: channel.contrast_method,
            excitation_wavelength: quantity(
                channel.excitation_wavelength,
                channel.excitation_wavelength_unit,
                LengthUnit::Nanometer,
            ),
            emission_wavelength: quantity(
                channel.emission_wavelength,
                channel.emission_wavelength_unit,
                LengthUnit::Nanometer,
            ),
            fluor: channel.fluor.clone(),
            nd_filter: channel.nd_filter,
            pockel_cell_setting: channel.pockel_cell_setting,
            color: channel.color,
            extra: FieldMap::new(),
        };
        record.prune();
        record
    }
}

/// The deterministic identifier of the channel at `index`
pub fn channel_id(index: usize) -> String {
    format!("Channel:0:{index}")
}

/**
Match the supplied channel records against the size of the channel axis.

With no records, `size_c` default channels named `C:<index>` are synthesized.
Otherwise the counts must agree. Every resulting record has an identifier and a
samples-per-pixel value, filled in by position when absent.
*/
pub fn reconcile(
    channels: &IndexMap<String, ChannelRecord>,
    size_c: usize,
) -> Result<IndexMap<String, ChannelRecord>, ChannelCountMismatch> {
    if channels.is_empty() {
        return Ok((0..size_c)
            .map(|i| {
                let record = ChannelRecord {
                    id: Some(channel_id(i)),
                    samples_per_pixel: Some(1),
                    ..Default::default()
                };
                (format!("C:{i}"), record)
            })
            .collect());
    }
    if channels.len() != size_c {
        return Err(ChannelCountMismatch {
            expected: size_c,
            found: channels.len(),
        });
    }
    Ok(channels
        .iter()
        .enumerate()
        .map(|(i, (name, record))| {
            let mut record = record.clone();
            record.id.get_or_insert_with(|| channel_id(i));
            record.samples_per_pixel.get_or_insert(1);
            (name.clone(), record)
        })
        .collect())
}

/**
Build one document `Channel` per reconciled record, replacing any channels already
on `pixels`. Each record's fields are pushed through the `Channel` setter table,
and the per-channel transfer outcome is returned in channel order.
*/
pub fn apply_to_pixels(
    pixels: &mut Pixels,
    channels: &IndexMap<String, ChannelRecord>,
) -> Vec<(String, FieldTransfer)> {
    pixels.channels.clear();
    let mut outcomes = Vec::with_capacity(channels.len());
    for (i, (name, record)) in channels.iter().enumerate() {
        let mut channel = Channel::new(channel_id(i));
        channel.name = Some(name.clone());
        let fields = record.fields();
        let transfer = transfer_fields(&mut channel, fields.iter().map(|(k, v)| (k.as_str(), v)));
        pixels.channels.push(channel);
        outcomes.push((name.clone(), transfer));
    }
    outcomes
}

/**
Read exactly `size_c` channels from `pixels`.

Channels the document does not describe are skipped with a diagnostic. Unnamed
channels, or ones whose name is already taken, are keyed as `C:<index>`.
*/
pub fn extract(
    pixels: &Pixels,
    size_c: usize,
    diagnostics: &mut Diagnostics,
) -> IndexMap<String, ChannelRecord> {
    let mut channels = IndexMap::with_capacity(size_c);
    for i in 0..size_c {
        let Some(channel) = pixels.channel(i) else {
            diagnostics.absent(format!("Pixels/Channel[{i}]"));
            continue;
        };
        let name = channel
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && !channels.contains_key(*n))
            .map(str::to_string)
            .unwrap_or_else(|| format!("C:{i}"));
        channels.insert(name, ChannelRecord::from_document(channel));
    }
    channels
}
