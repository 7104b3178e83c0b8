use std::str::FromStr;

use log::{trace, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::model::{
    Channel, Detector, Image, Instrument, Microscope, Objective, OmeDocument, Pixels, TiffData,
};
use super::OmeXmlError;
use crate::pixels::PixelType;

/// The element the parser is currently inside of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OmeParserState {
    Start,
    OME,
    Instrument,
    Microscope,
    Detector,
    Objective,
    Image,
    AcquisitionDate,
    Description,
    InstrumentRef,
    Pixels,
    Channel,
    TiffData,
    MetadataOnly,
    /// An element outside of the modelled subset, skipped with all of its children
    Unknown,
    Writing,
}

type ParserResult = Result<OmeParserState, OmeXmlError>;

/// The attributes of one element as `(local name, unescaped value)` pairs
struct Attributes {
    element: &'static str,
    pairs: Vec<(String, String)>,
}

impl Attributes {
    fn collect(
        element: &'static str,
        event: &BytesStart,
        state: OmeParserState,
    ) -> Result<Self, OmeXmlError> {
        let mut pairs = Vec::new();
        for attr in event.attributes() {
            let attr = attr.map_err(|e| OmeXmlError::XMLError(state, e.into()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| OmeXmlError::XMLError(state, e))?
                .into_owned();
            pairs.push((key, value));
        }
        Ok(Self { element, pairs })
    }

    fn text(&self, key: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn required(&self, key: &'static str) -> Result<String, OmeXmlError> {
        self.text(key).ok_or(OmeXmlError::IncompleteElement {
            element: self.element,
            attribute: key,
        })
    }

    /// A value that must parse when present
    fn parsed<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, OmeXmlError> {
        match self.text(key) {
            Some(value) => match value.trim().parse() {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(OmeXmlError::InvalidAttribute {
                    element: self.element,
                    attribute: key,
                    value,
                }),
            },
            None => Ok(None),
        }
    }

    fn required_parsed<T: FromStr>(&self, key: &'static str) -> Result<T, OmeXmlError> {
        self.parsed(key)?.ok_or(OmeXmlError::IncompleteElement {
            element: self.element,
            attribute: key,
        })
    }

    /// A value from a closed vocabulary. Terms this crate does not know are dropped
    /// with a warning rather than failing the whole document.
    fn term<T: FromStr>(&self, key: &'static str) -> Option<T> {
        let value = self.text(key)?;
        match value.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(
                    "Ignoring unrecognized {}@{key} value {value:?}",
                    self.element
                );
                None
            }
        }
    }

    fn boolean(&self, key: &'static str) -> Result<Option<bool>, OmeXmlError> {
        match self.text(key).as_deref() {
            Some("true") | Some("1") => Ok(Some(true)),
            Some("false") | Some("0") => Ok(Some(false)),
            Some(value) => Err(OmeXmlError::InvalidAttribute {
                element: self.element,
                attribute: key,
                value: value.to_string(),
            }),
            None => Ok(None),
        }
    }
}

/// A SAX-style parser building an [`OmeDocument`] from XML text
pub struct OmeXmlReader<'a> {
    text: &'a str,
    document: OmeDocument,
    stack: Vec<OmeParserState>,
    saw_root: bool,
}

impl<'a> OmeXmlReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            document: OmeDocument {
                uuid: None,
                creator: None,
                instruments: Vec::new(),
                images: Vec::new(),
            },
            stack: Vec::new(),
            saw_root: false,
        }
    }

    fn state(&self) -> OmeParserState {
        self.stack.last().copied().unwrap_or(OmeParserState::Start)
    }

    fn current_instrument(&mut self) -> Option<&mut Instrument> {
        self.document.instruments.last_mut()
    }

    fn current_image(&mut self) -> Option<&mut Image> {
        self.document.images.last_mut()
    }

    fn current_pixels(&mut self) -> Option<&mut Pixels> {
        self.current_image().map(|img| &mut img.pixels)
    }

    fn start_element(&mut self, event: &BytesStart) -> ParserResult {
        let state = self.state();
        let name = event.local_name();
        let name = name.as_ref();
        trace!(
            "Entering {} from {state:?}",
            String::from_utf8_lossy(name)
        );

        let next = match (state, name) {
            (OmeParserState::Start, b"OME") => {
                let attrs = Attributes::collect("OME", event, state)?;
                self.document.uuid = attrs.text("UUID");
                self.document.creator = attrs.text("Creator");
                self.saw_root = true;
                OmeParserState::OME
            }
            (OmeParserState::Start, other) => {
                return Err(OmeXmlError::NotOmeDocument(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
            (OmeParserState::OME, b"Instrument") => {
                let attrs = Attributes::collect("Instrument", event, state)?;
                self.document
                    .instruments
                    .push(Instrument::new(attrs.required("ID")?));
                OmeParserState::Instrument
            }
            (OmeParserState::Instrument, b"Microscope") => {
                let attrs = Attributes::collect("Microscope", event, state)?;
                let microscope = Microscope {
                    manufacturer: attrs.text("Manufacturer"),
                    model: attrs.text("Model"),
                    microscope_type: attrs.term("Type"),
                };
                if let Some(inst) = self.current_instrument() {
                    inst.microscope = Some(microscope);
                }
                OmeParserState::Microscope
            }
            (OmeParserState::Instrument, b"Detector") => {
                let attrs = Attributes::collect("Detector", event, state)?;
                let detector = Detector {
                    id: attrs.required("ID")?,
                    manufacturer: attrs.text("Manufacturer"),
                    model: attrs.text("Model"),
                    detector_type: attrs.term("Type"),
                };
                if let Some(inst) = self.current_instrument() {
                    inst.detectors.push(detector);
                }
                OmeParserState::Detector
            }
            (OmeParserState::Instrument, b"Objective") => {
                let attrs = Attributes::collect("Objective", event, state)?;
                let objective = Objective {
                    id: attrs.required("ID")?,
                    manufacturer: attrs.text("Manufacturer"),
                    model: attrs.text("Model"),
                    lens_na: attrs.parsed("LensNA")?,
                    nominal_magnification: attrs.parsed("NominalMagnification")?,
                    calibrated_magnification: attrs.parsed("CalibratedMagnification")?,
                    immersion: attrs.term("Immersion"),
                };
                if let Some(inst) = self.current_instrument() {
                    inst.objectives.push(objective);
                }
                OmeParserState::Objective
            }
            (OmeParserState::OME, b"Image") => {
                let attrs = Attributes::collect("Image", event, state)?;
                let mut image = Image::new(attrs.required("ID")?, Pixels::default());
                image.name = attrs.text("Name");
                self.document.images.push(image);
                OmeParserState::Image
            }
            (OmeParserState::Image, b"AcquisitionDate") => OmeParserState::AcquisitionDate,
            (OmeParserState::Image, b"Description") => OmeParserState::Description,
            (OmeParserState::Image, b"InstrumentRef") => {
                let attrs = Attributes::collect("InstrumentRef", event, state)?;
                let id = attrs.required("ID")?;
                if let Some(image) = self.current_image() {
                    image.instrument_ref = Some(id);
                }
                OmeParserState::InstrumentRef
            }
            (OmeParserState::Image, b"Pixels") => {
                let attrs = Attributes::collect("Pixels", event, state)?;
                let pixels = Self::parse_pixels(&attrs)?;
                if let Some(image) = self.current_image() {
                    image.pixels = pixels;
                }
                OmeParserState::Pixels
            }
            (OmeParserState::Pixels, b"Channel") => {
                let attrs = Attributes::collect("Channel", event, state)?;
                let channel = Self::parse_channel(&attrs)?;
                if let Some(pixels) = self.current_pixels() {
                    pixels.channels.push(channel);
                }
                OmeParserState::Channel
            }
            (OmeParserState::Pixels, b"TiffData") => {
                let attrs = Attributes::collect("TiffData", event, state)?;
                let tiff_data = TiffData {
                    ifd: attrs.parsed("IFD")?,
                    first_c: attrs.parsed("FirstC")?,
                    first_z: attrs.parsed("FirstZ")?,
                    first_t: attrs.parsed("FirstT")?,
                    plane_count: attrs.parsed("PlaneCount")?,
                };
                if let Some(pixels) = self.current_pixels() {
                    pixels.tiff_data.push(tiff_data);
                }
                OmeParserState::TiffData
            }
            (OmeParserState::Pixels, b"MetadataOnly") => OmeParserState::MetadataOnly,
            _ => OmeParserState::Unknown,
        };
        Ok(next)
    }

    fn parse_pixels(attrs: &Attributes) -> Result<Pixels, OmeXmlError> {
        let dimension_order = attrs.required("DimensionOrder")?;
        if let Err(e) = crate::axes::DimensionOrder::from_storage_form(&dimension_order) {
            warn!("Stored dimension order is not valid: {e}");
            return Err(OmeXmlError::InvalidAttribute {
                element: "Pixels",
                attribute: "DimensionOrder",
                value: dimension_order,
            });
        }
        let pixel_type: PixelType = attrs.required_parsed("Type")?;
        Ok(Pixels {
            id: attrs.required("ID")?,
            dimension_order,
            pixel_type,
            size_x: attrs.required_parsed("SizeX")?,
            size_y: attrs.required_parsed("SizeY")?,
            size_z: attrs.required_parsed("SizeZ")?,
            size_c: attrs.required_parsed("SizeC")?,
            size_t: attrs.required_parsed("SizeT")?,
            physical_size_x: attrs.parsed("PhysicalSizeX")?,
            physical_size_x_unit: attrs.term("PhysicalSizeXUnit"),
            physical_size_y: attrs.parsed("PhysicalSizeY")?,
            physical_size_y_unit: attrs.term("PhysicalSizeYUnit"),
            physical_size_z: attrs.parsed("PhysicalSizeZ")?,
            physical_size_z_unit: attrs.term("PhysicalSizeZUnit"),
            time_increment: attrs.parsed("TimeIncrement")?,
            time_increment_unit: attrs.term("TimeIncrementUnit"),
            significant_bits: attrs.parsed("SignificantBits")?,
            big_endian: attrs.boolean("BigEndian")?,
            interleaved: attrs.boolean("Interleaved")?,
            channels: Vec::new(),
            tiff_data: Vec::new(),
        })
    }

    fn parse_channel(attrs: &Attributes) -> Result<Channel, OmeXmlError> {
        Ok(Channel {
            id: attrs.required("ID")?,
            name: attrs.text("Name"),
            samples_per_pixel: attrs.parsed("SamplesPerPixel")?,
            illumination_type: attrs.term("IlluminationType"),
            pinhole_size: attrs.parsed("PinholeSize")?,
            pinhole_size_unit: attrs.term("PinholeSizeUnit"),
            acquisition_mode: attrs.term("AcquisitionMode"),
            contrast_method: attrs.term("ContrastMethod"),
            excitation_wavelength: attrs.parsed("ExcitationWavelength")?,
            excitation_wavelength_unit: attrs.term("ExcitationWavelengthUnit"),
            emission_wavelength: attrs.parsed("EmissionWavelength")?,
            emission_wavelength_unit: attrs.term("EmissionWavelengthUnit"),
            fluor: attrs.text("Fluor"),
            nd_filter: attrs.parsed("NDFilter")?,
            pockel_cell_setting: attrs.parsed("PockelCellSetting")?,
            color: attrs.parsed("Color")?,
        })
    }

    fn text(&mut self, text: String) {
        match self.state() {
            OmeParserState::AcquisitionDate => {
                if let Some(image) = self.current_image() {
                    image.acquisition_date = Some(text);
                }
            }
            OmeParserState::Description => {
                if let Some(image) = self.current_image() {
                    image.description = Some(text);
                }
            }
            _ => {}
        }
    }

    fn open(&mut self, event: &BytesStart) -> Result<(), OmeXmlError> {
        let next = if self.state() == OmeParserState::Unknown {
            OmeParserState::Unknown
        } else {
            self.start_element(event)?
        };
        self.stack.push(next);
        Ok(())
    }

    /// Consume the text and build the document
    pub fn parse(mut self) -> Result<OmeDocument, OmeXmlError> {
        let mut reader = Reader::from_str(self.text);
        reader.trim_text(true);
        loop {
            let state = self.state();
            match reader.read_event() {
                Ok(Event::Start(ref e)) => self.open(e)?,
                Ok(Event::Empty(ref e)) => {
                    self.open(e)?;
                    self.stack.pop();
                }
                Ok(Event::End(_)) => {
                    self.stack.pop();
                }
                Ok(Event::Text(ref t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| OmeXmlError::XMLError(state, e))?
                        .into_owned();
                    self.text(text);
                }
                Ok(Event::CData(ref t)) => {
                    let text = String::from_utf8_lossy(t).into_owned();
                    self.text(text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(OmeXmlError::XMLError(state, e)),
            }
        }
        if !self.saw_root {
            return Err(OmeXmlError::NotOmeDocument(String::new()));
        }
        Ok(self.document)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
  <Experimenter ID="Experimenter:0"><Email>a@b.c</Email></Experimenter>
  <Image ID="Image:0" Name="tiny">
    <Pixels ID="Pixels:0" DimensionOrder="XYZCT" Type="uint8" SizeX="4" SizeY="3" SizeZ="2" SizeC="1" SizeT="1">
      <Channel ID="Channel:0:0" SamplesPerPixel="1" ContrastMethod="Holographic"/>
      <TiffData/>
      <Plane TheZ="0" TheC="0" TheT="0"/>
    </Pixels>
  </Image>
</OME>"#;

    #[test_log::test]
    fn test_minimal_document() {
        let doc = OmeXmlReader::new(MINIMAL).parse().unwrap();
        assert!(doc.uuid.is_none());
        assert_eq!(doc.image_count(), 1);
        let pixels = &doc.images[0].pixels;
        assert_eq!(pixels.dimension_order, "XYZCT");
        assert_eq!(pixels.pixel_type, PixelType::Uint8);
        assert_eq!((pixels.size_x, pixels.size_y, pixels.size_z), (4, 3, 2));
        assert_eq!(pixels.channels.len(), 1);
        assert!(pixels.channels[0].contrast_method.is_none());
        assert_eq!(pixels.tiff_data, vec![TiffData::default()]);
        assert!(doc.instrument_for(0).is_none());
    }

    #[test]
    fn test_invalid_attributes() {
        let text = MINIMAL.replace(r#"SizeX="4""#, r#"SizeX="four""#);
        let err = OmeXmlReader::new(&text).parse().unwrap_err();
        assert!(matches!(
            err,
            OmeXmlError::InvalidAttribute {
                element: "Pixels",
                attribute: "SizeX",
                ..
            }
        ));

        let text = MINIMAL.replace(r#"DimensionOrder="XYZCT""#, r#"DimensionOrder="ZCTXY""#);
        let err = OmeXmlReader::new(&text).parse().unwrap_err();
        assert!(matches!(
            err,
            OmeXmlError::InvalidAttribute {
                attribute: "DimensionOrder",
                ..
            }
        ));

        let text = MINIMAL.replace(r#" Type="uint8""#, "");
        let err = OmeXmlReader::new(&text).parse().unwrap_err();
        assert!(matches!(
            err,
            OmeXmlError::IncompleteElement {
                attribute: "Type",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed() {
        let err = OmeXmlReader::new("<OME><Image ID=\"Image:0\"></OME>")
            .parse()
            .unwrap_err();
        assert!(matches!(err, OmeXmlError::XMLError(..)));
    }
}
