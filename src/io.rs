//! Reading and writing the OME-XML document and the TIFF container that carries it.
pub mod container;
pub mod omexml;
pub mod ometiff;
pub mod tiff;

pub use crate::io::container::{
    Compression, ContainerCodec, ContainerImage, ContainerOptions, ContainerVariant, Photometric,
    RawContainer, SizePolicy, BYTE_BOUNDARY,
};
pub use crate::io::omexml::{OmeDocument, OmeXmlError};
pub use crate::io::ometiff::{
    ImageSource, OmeTiffError, OmeTiffReader, OmeTiffWriter, OmeTiffWriterBuilder, ReadOutcome,
    WriteSummary,
};
pub use crate::io::tiff::{TiffCodec, TiffError};
