use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::axes::{Axis, DimensionOrder, DimensionOrderError};
use crate::diagnostics::Diagnostics;
use crate::io::container::{ContainerCodec, RawContainer};
use crate::io::omexml::{OmeDocument, OmeXmlError, Pixels};
use crate::io::tiff::TiffCodec;
use crate::meta::MetadataRecord;
use crate::pixels::PixelArray;
use crate::shape::normalize_array;

use super::transcode::extract_record;
use super::writer::container_error;
use super::{sidecar_path, OmeTiffError};

/// Everything recovered from one image series
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// The canonical five-axis array
    pub array: PixelArray,
    /// The in-memory order of `array`'s axes
    pub dimension_order: DimensionOrder,
    pub metadata: MetadataRecord,
    /// The embedded metadata text, exactly as stored
    pub raw_metadata: Option<String>,
    pub diagnostics: Diagnostics,
}

/// Parse an image description, treating anything that is not an OME document as absent
fn parse_description(text: &str) -> Result<Option<OmeDocument>, OmeXmlError> {
    if !text.trim_start().starts_with('<') {
        return Ok(None);
    }
    match OmeDocument::from_xml(text) {
        Ok(document) => Ok(Some(document)),
        Err(OmeXmlError::NotOmeDocument(root)) => {
            debug!("Image description with root {root:?} is not OME metadata");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn pixels_size(pixels: &Pixels, axis: Axis) -> usize {
    match axis {
        Axis::X => pixels.size_x,
        Axis::Y => pixels.size_y,
        Axis::Z => pixels.size_z,
        Axis::C => pixels.size_c,
        Axis::T => pixels.size_t,
        Axis::S => 1,
    }
}

/// Reads one image series of an OME-TIFF file
#[derive(Debug, Clone)]
pub struct OmeTiffReader<C: ContainerCodec = TiffCodec> {
    path: PathBuf,
    series: usize,
    codec: C,
}

impl OmeTiffReader<TiffCodec> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            series: 0,
            codec: TiffCodec,
        }
    }
}

impl<C: ContainerCodec> OmeTiffReader<C> {
    pub fn with_codec<D: ContainerCodec>(self, codec: D) -> OmeTiffReader<D> {
        OmeTiffReader {
            path: self.path,
            series: self.series,
            codec,
        }
    }

    /// Select the image series to read, the first one by default
    pub fn with_series(mut self, series: usize) -> Self {
        self.series = series;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn series(&self) -> usize {
        self.series
    }

    fn read_container(&self) -> Result<RawContainer, OmeTiffError> {
        self.codec.read(&self.path).map_err(container_error)
    }

    /// The first IFD of the selected series: where the document says, otherwise after
    /// the planes of every preceding image
    fn plane_offset(&self, document: &OmeDocument, pixels: &Pixels) -> usize {
        pixels.first_ifd().unwrap_or_else(|| {
            document
                .images
                .iter()
                .take(self.series)
                .map(|image| image.pixels.plane_count())
                .sum()
        })
    }

    fn arrange_planes(
        &self,
        planes: PixelArray,
        document: &OmeDocument,
        pixels: &Pixels,
    ) -> Result<(PixelArray, DimensionOrder), OmeTiffError> {
        let order = pixels.canonical_order()?;
        if !order.is_canonical() {
            return Err(DimensionOrderError::NotCanonical {
                order: order.to_string(),
            }
            .into());
        }
        let n_planes = pixels.plane_count();
        let offset = self.plane_offset(document, pixels);
        let available = planes.shape().first().copied().unwrap_or(0);
        if offset + n_planes > available {
            return Err(OmeTiffError::PlaneCountMismatch {
                expected: offset + n_planes,
                found: available,
            });
        }
        let planes = if offset == 0 && n_planes == available {
            planes
        } else {
            planes.select_leading(offset, n_planes)
        };
        let dims: Vec<usize> = order
            .axes()
            .iter()
            .map(|axis| pixels_size(pixels, *axis))
            .collect();
        debug!("Arranging {n_planes} planes from IFD {offset} as {order} {dims:?}");
        Ok((planes.reshape(&dims)?, order))
    }

    /// Read the pixels and metadata of the selected series.
    ///
    /// Files without an OME document are read as a `ZYX` stack of their planes.
    pub fn read(&self) -> Result<ReadOutcome, OmeTiffError> {
        let raw = self.read_container()?;
        let document = match raw.description.as_deref() {
            Some(text) => parse_description(text)?,
            None => None,
        };

        let mut diagnostics = Diagnostics::new();
        let metadata =
            extract_record(document.as_ref(), &self.path, self.series, &mut diagnostics)?;

        let image = document
            .as_ref()
            .and_then(|document| document.image(self.series).map(|image| (document, image)));
        let (array, dimension_order) = match image {
            Some((document, image)) => self.arrange_planes(raw.pixels, document, &image.pixels)?,
            None => {
                let stack: DimensionOrder = "ZYX".parse()?;
                normalize_array(raw.pixels, &stack)?
            }
        };

        Ok(ReadOutcome {
            array,
            dimension_order,
            metadata,
            raw_metadata: raw.description,
            diagnostics,
        })
    }

    /// Write the embedded metadata document to `destination`, or to the file's path
    /// with an `.xml` extension. Returns `None` without writing when the file has no
    /// OME document.
    pub fn export_metadata_document(
        &self,
        destination: Option<&Path>,
    ) -> Result<Option<PathBuf>, OmeTiffError> {
        let description = self
            .codec
            .read_description(&self.path)
            .map_err(container_error)?;
        let Some(text) = description else {
            return Ok(None);
        };
        if parse_description(&text)?.is_none() {
            return Ok(None);
        }
        let destination = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| sidecar_path(&self.path));
        fs::write(&destination, text)?;
        debug!("Exported metadata document to {}", destination.display());
        Ok(Some(destination))
    }
}
