use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::axes::DimensionOrder;
use crate::diagnostics::Diagnostics;
use crate::io::container::{
    Compression, ContainerCodec, ContainerImage, ContainerOptions, ContainerVariant, Photometric,
    SizePolicy,
};
use crate::io::omexml::OmeDocument;
use crate::io::tiff::{TiffCodec, TiffError};
use crate::meta::MetadataRecord;
use crate::pixels::{PixelArray, PixelType};
use crate::shape::{normalize_array, normalize_shape};

use super::transcode::build_document;
use super::{sidecar_path, ImageSource, OmeTiffError};

/// Recover a [`TiffError`] that a codec wrapped into an [`io::Error`]
pub(crate) fn container_error(err: io::Error) -> OmeTiffError {
    if !err.get_ref().is_some_and(|e| e.is::<TiffError>()) {
        return OmeTiffError::IOError(err);
    }
    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<TiffError>()) {
        Some(Ok(e)) => OmeTiffError::ContainerError(*e),
        Some(Err(inner)) => OmeTiffError::IOError(io::Error::new(kind, inner)),
        None => OmeTiffError::IOError(io::Error::from(kind)),
    }
}

/// What [`OmeTiffWriter::write`] did
#[derive(Debug, Clone)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub variant: ContainerVariant,
    /// Everything recorded while building the document and choosing the container
    pub diagnostics: Diagnostics,
}

/// Options for an [`OmeTiffWriter`]
#[derive(Debug, Clone, Default)]
pub struct OmeTiffWriterBuilder {
    overwrite: bool,
    explicit_size_tagging: bool,
    compression: Compression,
    force_large_variant: bool,
    photometric: Photometric,
    size_policy: SizePolicy,
}

impl OmeTiffWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target file if it already exists
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Describe every plane with its own `TiffData` element
    pub fn explicit_size_tagging(mut self, explicit: bool) -> Self {
        self.explicit_size_tagging = explicit;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Always write the large container variant, regardless of the array size
    pub fn force_large_variant(mut self, force: bool) -> Self {
        self.force_large_variant = force;
        self
    }

    pub fn photometric(mut self, photometric: Photometric) -> Self {
        self.photometric = photometric;
        self
    }

    pub fn size_policy(mut self, size_policy: SizePolicy) -> Self {
        self.size_policy = size_policy;
        self
    }

    /// Validate the inputs and build the metadata document for a TIFF container at `path`
    pub fn create<P: Into<PathBuf>>(
        self,
        path: P,
        source: impl Into<ImageSource>,
        record: &MetadataRecord,
        order: &DimensionOrder,
    ) -> Result<OmeTiffWriter<TiffCodec>, OmeTiffError> {
        self.create_with_codec(path, source, record, order, TiffCodec)
    }

    /// As [`Self::create`] with a specific [`ContainerCodec`]
    pub fn create_with_codec<P: Into<PathBuf>, C: ContainerCodec>(
        self,
        path: P,
        source: impl Into<ImageSource>,
        record: &MetadataRecord,
        order: &DimensionOrder,
        codec: C,
    ) -> Result<OmeTiffWriter<C>, OmeTiffError> {
        let path = path.into();
        let (pixels, dims, order) = match source.into() {
            ImageSource::Pixels(pixels) => {
                let (pixels, canonical) = normalize_array(pixels, order)?;
                let dims = pixels.shape().to_vec();
                (Some(pixels), dims, canonical)
            }
            ImageSource::Shape(shape) => {
                let (dims, canonical) = normalize_shape(&shape, order)?;
                (None, dims, canonical)
            }
        };
        let pixel_type = match &pixels {
            Some(pixels) => pixels.dtype().pixel_type()?,
            None => PixelType::Uint16,
        };
        debug!("Normalized {order} array of shape {dims:?} for {}", path.display());

        let (document, diagnostics) = build_document(
            record,
            &dims,
            &order,
            pixel_type,
            self.explicit_size_tagging,
        )?;
        let xml = document.to_xml()?;

        Ok(OmeTiffWriter {
            path,
            pixels,
            dims,
            order,
            document,
            xml,
            diagnostics,
            options: self,
            codec,
        })
    }
}

/**
Writes one image series as an OME-TIFF file.

All validation happens on construction: the dimension order, the channel count and the
pixel type are checked and the metadata document is built before anything is written.
*/
#[derive(Debug)]
pub struct OmeTiffWriter<C: ContainerCodec = TiffCodec> {
    path: PathBuf,
    pixels: Option<PixelArray>,
    dims: Vec<usize>,
    order: DimensionOrder,
    document: OmeDocument,
    xml: String,
    diagnostics: Diagnostics,
    options: OmeTiffWriterBuilder,
    codec: C,
}

impl OmeTiffWriter<TiffCodec> {
    /// A writer with the default options
    pub fn new<P: Into<PathBuf>>(
        path: P,
        source: impl Into<ImageSource>,
        record: &MetadataRecord,
        order: &DimensionOrder,
    ) -> Result<Self, OmeTiffError> {
        OmeTiffWriterBuilder::default().create(path, source, record, order)
    }

    pub fn builder() -> OmeTiffWriterBuilder {
        OmeTiffWriterBuilder::default()
    }
}

impl<C: ContainerCodec> OmeTiffWriter<C> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The canonical five-axis shape
    pub fn shape(&self) -> &[usize] {
        &self.dims
    }

    /// The canonical in-memory dimension order
    pub fn dimension_order(&self) -> &DimensionOrder {
        &self.order
    }

    pub fn document(&self) -> &OmeDocument {
        &self.document
    }

    /// The serialized metadata document
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Write the pixels and the metadata document to the target path
    pub fn write(&self) -> Result<WriteSummary, OmeTiffError> {
        let pixels = self.pixels.as_ref().ok_or(OmeTiffError::MissingPixelData)?;
        if self.path.exists() && !self.options.overwrite {
            return Err(OmeTiffError::FileExists(self.path.clone()));
        }
        let mut diagnostics = self.diagnostics.clone();
        let (variant, diagnostic) = self
            .options
            .size_policy
            .select_variant(Some(pixels.byte_size()), self.options.force_large_variant);
        if let Some(diagnostic) = diagnostic {
            diagnostics.push(diagnostic);
        }
        let options = ContainerOptions {
            variant,
            compression: self.options.compression,
            photometric: self.options.photometric,
        };
        let image = ContainerImage::new(pixels, Some(self.xml.as_str()));
        self.codec
            .write(&self.path, &image, &options)
            .map_err(container_error)?;
        info!(
            "Wrote {} planes to {} as {variant:?}",
            image.plane_count(),
            self.path.display()
        );
        Ok(WriteSummary {
            path: self.path.clone(),
            variant,
            diagnostics,
        })
    }

    /// Write the metadata document to `destination`, or to the target path with an
    /// `.xml` extension, replacing any existing file. Returns the path written.
    pub fn export_metadata_document(
        &self,
        destination: Option<&Path>,
    ) -> Result<PathBuf, OmeTiffError> {
        let destination = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| sidecar_path(&self.path));
        fs::write(&destination, &self.xml)?;
        debug!("Exported metadata document to {}", destination.display());
        Ok(destination)
    }
}
