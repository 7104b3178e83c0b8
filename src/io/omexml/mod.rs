//! Reading and writing OME-XML metadata documents.
//!
//! [`OmeDocument`] is a typed subset of the OME schema. It is read with a SAX-style
//! parser over `quick-xml` events, skipping any element it does not model, and written
//! back out with the 2016-06 namespace.
use std::io;
use std::str::FromStr;

use quick_xml::Error as XMLError;
use thiserror::Error;

mod model;
mod reader;
mod writer;

pub use model::{
    is_valid_lsid, Channel, Detector, Image, Instrument, Microscope, Objective, OmeDocument,
    Pixels, TiffData,
};
pub use reader::{OmeParserState, OmeXmlReader};
pub use writer::{OmeXmlWriter, OME_NAMESPACE, OME_SCHEMA_LOCATION};

/// All the ways reading or writing an OME-XML document can fail
#[derive(Debug, Error)]
pub enum OmeXmlError {
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(OmeParserState, #[source] XMLError),
    #[error("An IO error {0} was encountered while writing")]
    IOError(#[from] io::Error),
    #[error("the document root is {0:?}, not OME")]
    NotOmeDocument(String),
    #[error("{element} has an invalid {attribute} attribute: {value:?}")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("{element} is missing its required {attribute} attribute")]
    IncompleteElement {
        element: &'static str,
        attribute: &'static str,
    },
}

impl From<XMLError> for OmeXmlError {
    fn from(value: XMLError) -> Self {
        Self::XMLError(OmeParserState::Writing, value)
    }
}

impl From<OmeXmlError> for io::Error {
    fn from(value: OmeXmlError) -> Self {
        match value {
            OmeXmlError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

impl OmeDocument {
    /// Parse a document from its XML text
    pub fn from_xml(text: &str) -> Result<Self, OmeXmlError> {
        OmeXmlReader::new(text).parse()
    }

    /// Serialize this document as indented XML text with a declaration
    pub fn to_xml(&self) -> Result<String, OmeXmlError> {
        let mut writer = OmeXmlWriter::new(Vec::new());
        writer.write_document(self)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| OmeXmlError::IOError(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

impl FromStr for OmeDocument {
    type Err = OmeXmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_xml(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::vocabulary::{DetectorType, Immersion};
    use crate::params::LengthUnit;
    use crate::pixels::PixelType;

    fn sample_document() -> OmeDocument {
        let mut pixels = Pixels {
            dimension_order: "XYCZT".into(),
            pixel_type: PixelType::Float,
            size_x: 20,
            size_y: 16,
            size_z: 10,
            size_c: 2,
            size_t: 3,
            physical_size_x: Some(0.25),
            physical_size_x_unit: Some(LengthUnit::Micrometer),
            ..Default::default()
        };
        for i in 0..2 {
            let mut channel = Channel::new(format!("Channel:0:{i}"));
            channel.name = Some(format!("ch & {i}"));
            channel.excitation_wavelength = Some(488.0);
            channel.excitation_wavelength_unit = Some(LengthUnit::Nanometer);
            pixels.channels.push(channel);
        }
        pixels.populate_tiff_data(0, false);

        let mut image = Image::new("Image:0", pixels);
        image.name = Some("cells <live>".into());
        image.acquisition_date = Some("2021-03-04T05:06:07".into());
        image.instrument_ref = Some("Instrument:0".into());

        let mut instrument = Instrument::new("Instrument:0");
        instrument.detectors.push(Detector {
            id: "Detector:0:0".into(),
            model: Some("Zyla".into()),
            detector_type: Some(DetectorType::CMOS),
            ..Default::default()
        });
        instrument.objectives.push(Objective {
            id: "Objective:0:0".into(),
            lens_na: Some(1.4),
            immersion: Some(Immersion::Oil),
            ..Default::default()
        });

        OmeDocument {
            instruments: vec![instrument],
            images: vec![image],
            ..Default::default()
        }
    }

    #[test_log::test]
    fn test_document_round_trip() {
        let doc = sample_document();
        let text = doc.to_xml().unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains(OME_NAMESPACE));
        assert!(text.contains("DimensionOrder=\"XYCZT\""));

        let back: OmeDocument = text.parse().unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_not_ome() {
        let err = OmeDocument::from_xml("<ImageJ><Info/></ImageJ>").unwrap_err();
        assert!(matches!(err, OmeXmlError::NotOmeDocument(ref root) if root == "ImageJ"));
        let err = OmeDocument::from_xml("").unwrap_err();
        assert!(matches!(err, OmeXmlError::NotOmeDocument(_)));
    }
}
