use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::model::{Channel, Image, Instrument, OmeDocument, Pixels, TiffData};
use super::OmeXmlError;

pub const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";
pub const OME_SCHEMA_LOCATION: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06 http://www.openmicroscopy.org/Schemas/OME/2016-06/ome.xsd";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

macro_rules! bstart {
    ($e:tt) => {
        BytesStart::new($e)
    };
}

macro_rules! attrib {
    ($name:expr, $value:expr, $elt:ident) => {
        let value = $value.to_string();
        $elt.push_attribute(($name, value.as_str()));
    };
}

macro_rules! opt_attrib {
    ($name:expr, $value:expr, $elt:ident) => {
        if let Some(value) = $value.as_ref() {
            attrib!($name, value, $elt);
        }
    };
}

macro_rules! start_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::Start($target.borrow()))?;
    };
}

macro_rules! end_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::End($target.to_end()))?;
    };
}

macro_rules! empty_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::Empty($target.borrow()))?;
    };
}

pub type WriterResult = Result<(), OmeXmlError>;

/// Serializes an [`OmeDocument`] as indented XML
pub struct OmeXmlWriter<W: Write> {
    handle: Writer<W>,
}

impl<W: Write> OmeXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            handle: Writer::new_with_indent(inner, b' ', 2),
        }
    }

    pub fn into_inner(self) -> W {
        self.handle.into_inner()
    }

    pub fn write_document(&mut self, document: &OmeDocument) -> WriterResult {
        self.handle
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = bstart!("OME");
        attrib!("xmlns", OME_NAMESPACE, root);
        attrib!("xmlns:xsi", XSI_NAMESPACE, root);
        attrib!("xsi:schemaLocation", OME_SCHEMA_LOCATION, root);
        opt_attrib!("UUID", document.uuid, root);
        opt_attrib!("Creator", document.creator, root);
        start_event!(self, root);

        for instrument in document.instruments.iter() {
            self.write_instrument(instrument)?;
        }
        for image in document.images.iter() {
            self.write_image(image)?;
        }

        end_event!(self, root);
        Ok(())
    }

    fn write_instrument(&mut self, instrument: &Instrument) -> WriterResult {
        let mut elt = bstart!("Instrument");
        attrib!("ID", instrument.id, elt);
        if instrument.microscope.is_none()
            && instrument.detectors.is_empty()
            && instrument.objectives.is_empty()
        {
            empty_event!(self, elt);
            return Ok(());
        }
        start_event!(self, elt);

        if let Some(microscope) = instrument.microscope.as_ref() {
            let mut scope = bstart!("Microscope");
            opt_attrib!("Manufacturer", microscope.manufacturer, scope);
            opt_attrib!("Model", microscope.model, scope);
            opt_attrib!("Type", microscope.microscope_type, scope);
            empty_event!(self, scope);
        }

        for detector in instrument.detectors.iter() {
            let mut det = bstart!("Detector");
            opt_attrib!("Manufacturer", detector.manufacturer, det);
            opt_attrib!("Model", detector.model, det);
            attrib!("ID", detector.id, det);
            opt_attrib!("Type", detector.detector_type, det);
            empty_event!(self, det);
        }

        for objective in instrument.objectives.iter() {
            let mut obj = bstart!("Objective");
            opt_attrib!("Manufacturer", objective.manufacturer, obj);
            opt_attrib!("Model", objective.model, obj);
            attrib!("ID", objective.id, obj);
            opt_attrib!("Immersion", objective.immersion, obj);
            opt_attrib!("LensNA", objective.lens_na, obj);
            opt_attrib!("NominalMagnification", objective.nominal_magnification, obj);
            opt_attrib!(
                "CalibratedMagnification",
                objective.calibrated_magnification,
                obj
            );
            empty_event!(self, obj);
        }

        end_event!(self, elt);
        Ok(())
    }

    fn write_text_element(&mut self, name: &str, text: &str) -> WriterResult {
        let elt = BytesStart::new(name);
        start_event!(self, elt);
        self.handle.write_event(Event::Text(BytesText::new(text)))?;
        self.handle.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn write_image(&mut self, image: &Image) -> WriterResult {
        let mut elt = bstart!("Image");
        attrib!("ID", image.id, elt);
        opt_attrib!("Name", image.name, elt);
        start_event!(self, elt);

        if let Some(date) = image.acquisition_date.as_deref() {
            self.write_text_element("AcquisitionDate", date)?;
        }
        if let Some(description) = image.description.as_deref() {
            self.write_text_element("Description", description)?;
        }
        if let Some(instrument_ref) = image.instrument_ref.as_ref() {
            let mut iref = bstart!("InstrumentRef");
            attrib!("ID", instrument_ref, iref);
            empty_event!(self, iref);
        }
        self.write_pixels(&image.pixels)?;

        end_event!(self, elt);
        Ok(())
    }

    fn write_pixels(&mut self, pixels: &Pixels) -> WriterResult {
        let mut elt = bstart!("Pixels");
        attrib!("ID", pixels.id, elt);
        attrib!("DimensionOrder", pixels.dimension_order, elt);
        attrib!("Type", pixels.pixel_type, elt);
        opt_attrib!("SignificantBits", pixels.significant_bits, elt);
        opt_attrib!("Interleaved", pixels.interleaved, elt);
        opt_attrib!("BigEndian", pixels.big_endian, elt);
        attrib!("SizeX", pixels.size_x, elt);
        attrib!("SizeY", pixels.size_y, elt);
        attrib!("SizeZ", pixels.size_z, elt);
        attrib!("SizeC", pixels.size_c, elt);
        attrib!("SizeT", pixels.size_t, elt);
        opt_attrib!("PhysicalSizeX", pixels.physical_size_x, elt);
        opt_attrib!("PhysicalSizeXUnit", pixels.physical_size_x_unit, elt);
        opt_attrib!("PhysicalSizeY", pixels.physical_size_y, elt);
        opt_attrib!("PhysicalSizeYUnit", pixels.physical_size_y_unit, elt);
        opt_attrib!("PhysicalSizeZ", pixels.physical_size_z, elt);
        opt_attrib!("PhysicalSizeZUnit", pixels.physical_size_z_unit, elt);
        opt_attrib!("TimeIncrement", pixels.time_increment, elt);
        opt_attrib!("TimeIncrementUnit", pixels.time_increment_unit, elt);
        start_event!(self, elt);

        for channel in pixels.channels.iter() {
            self.write_channel(channel)?;
        }

        if pixels.tiff_data.is_empty() {
            let meta_only = bstart!("MetadataOnly");
            empty_event!(self, meta_only);
        }
        for tiff_data in pixels.tiff_data.iter() {
            self.write_tiff_data(tiff_data)?;
        }

        end_event!(self, elt);
        Ok(())
    }

    fn write_channel(&mut self, channel: &Channel) -> WriterResult {
        let mut elt = bstart!("Channel");
        attrib!("ID", channel.id, elt);
        opt_attrib!("Name", channel.name, elt);
        opt_attrib!("SamplesPerPixel", channel.samples_per_pixel, elt);
        opt_attrib!("IlluminationType", channel.illumination_type, elt);
        opt_attrib!("PinholeSize", channel.pinhole_size, elt);
        opt_attrib!("PinholeSizeUnit", channel.pinhole_size_unit, elt);
        opt_attrib!("AcquisitionMode", channel.acquisition_mode, elt);
        opt_attrib!("ContrastMethod", channel.contrast_method, elt);
        opt_attrib!("ExcitationWavelength", channel.excitation_wavelength, elt);
        opt_attrib!(
            "ExcitationWavelengthUnit",
            channel.excitation_wavelength_unit,
            elt
        );
        opt_attrib!("EmissionWavelength", channel.emission_wavelength, elt);
        opt_attrib!("EmissionWavelengthUnit", channel.emission_wavelength_unit, elt);
        opt_attrib!("Fluor", channel.fluor, elt);
        opt_attrib!("NDFilter", channel.nd_filter, elt);
        opt_attrib!("PockelCellSetting", channel.pockel_cell_setting, elt);
        opt_attrib!("Color", channel.color, elt);
        empty_event!(self, elt);
        Ok(())
    }

    fn write_tiff_data(&mut self, tiff_data: &TiffData) -> WriterResult {
        let mut elt = bstart!("TiffData");
        opt_attrib!("IFD", tiff_data.ifd, elt);
        opt_attrib!("FirstC", tiff_data.first_c, elt);
        opt_attrib!("FirstZ", tiff_data.first_z, elt);
        opt_attrib!("FirstT", tiff_data.first_t, elt);
        opt_attrib!("PlaneCount", tiff_data.plane_count, elt);
        empty_event!(self, elt);
        Ok(())
    }
}
