//! Reading and writing OME-TIFF: TIFF planes whose first image description carries
//! an OME-XML document.
//!
//! [`OmeTiffWriter`] normalizes a rank 3 to 5 array to the canonical five axes,
//! builds the metadata document from a [`MetadataRecord`](crate::meta::MetadataRecord)
//! and hands both to a [`ContainerCodec`](crate::io::container::ContainerCodec).
//! [`OmeTiffReader`] goes the other way, recovering the canonical array, its
//! dimension order and a pruned record.
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::axes::DimensionOrderError;
use crate::io::omexml::OmeXmlError;
use crate::io::tiff::TiffError;
use crate::meta::ChannelCountMismatch;
use crate::pixels::{PixelArray, PixelDataError, UnsupportedPixelType};

mod reader;
pub mod transcode;
mod writer;

#[cfg(test)]
mod tests;

pub use reader::{OmeTiffReader, ReadOutcome};
pub use transcode::{build_document, extract_record, DEFAULT_IMAGE_NAME};
pub use writer::{OmeTiffWriter, OmeTiffWriterBuilder, WriteSummary};

#[derive(Debug, Error)]
pub enum OmeTiffError {
    #[error("invalid dimension ordering: {0}")]
    InvalidDimensionOrdering(#[from] DimensionOrderError),
    #[error(transparent)]
    ChannelCountMismatch(#[from] ChannelCountMismatch),
    #[error(transparent)]
    UnsupportedPixelType(#[from] UnsupportedPixelType),
    #[error("no pixel data was supplied, only a shape")]
    MissingPixelData,
    #[error("{0} already exists, enable overwriting to replace it")]
    FileExists(PathBuf),
    #[error("the document describes {expected} planes but the container holds {found}")]
    PlaneCountMismatch { expected: usize, found: usize },
    #[error("failed to read or write the metadata document: {0}")]
    XMLError(#[from] OmeXmlError),
    #[error("container error: {0}")]
    ContainerError(#[from] TiffError),
    #[error("failed to arrange the pixel data: {0}")]
    PixelData(#[from] PixelDataError),
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
}

impl From<OmeTiffError> for io::Error {
    fn from(value: OmeTiffError) -> Self {
        match value {
            OmeTiffError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The pixels to write, or only their shape when just the metadata document is wanted
#[derive(Debug, Clone)]
pub enum ImageSource {
    Pixels(PixelArray),
    Shape(Vec<usize>),
}

impl ImageSource {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Pixels(pixels) => pixels.shape(),
            Self::Shape(shape) => shape,
        }
    }

    pub fn pixels(&self) -> Option<&PixelArray> {
        match self {
            Self::Pixels(pixels) => Some(pixels),
            Self::Shape(_) => None,
        }
    }
}

impl From<PixelArray> for ImageSource {
    fn from(value: PixelArray) -> Self {
        Self::Pixels(value)
    }
}

impl From<Vec<usize>> for ImageSource {
    fn from(value: Vec<usize>) -> Self {
        Self::Shape(value)
    }
}

/// The sidecar path for a metadata document: `path` with its final extension replaced
/// by `.xml`, so `a.ome.tiff` pairs with `a.ome.xml`
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("xml")
}
