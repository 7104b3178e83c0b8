//! TIFF and BigTIFF containers for single-sample grayscale planes, on top of the
//! [`tiff`] crate.
//!
//! Every 2D plane is written as its own image file directory. The first directory
//! carries the image description. Reading accepts either byte order, either variant
//! and whatever strip, tile and compression layout the decoder understands.
use std::fs;
use std::io::{self, prelude::*, BufWriter};
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::pixels::PixelDataError;

use super::container::{ContainerCodec, ContainerImage, ContainerOptions, RawContainer};

mod reader;
mod writer;

pub use reader::TiffReader;
pub use writer::TiffWriter;

#[derive(Debug, Error)]
pub enum TiffError {
    #[error("not a TIFF file: {0}")]
    InvalidHeader(String),
    #[error("unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: String },
    #[error("plane {index} differs in shape or sample type from the first plane")]
    InconsistentPlanes { index: usize },
    #[error("a plane dimension of {0} does not fit in a TIFF image")]
    DimensionOverflow(usize),
    #[error("cannot write an image of shape {0:?} with no samples")]
    EmptyImage(Vec<usize>),
    #[error("TIFF codec error: {0}")]
    Codec(#[from] tiff::TiffError),
    #[error("failed to decode pixel data: {0}")]
    PixelData(#[from] PixelDataError),
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
}

impl From<TiffError> for io::Error {
    fn from(value: TiffError) -> Self {
        match value {
            TiffError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// [`ContainerCodec`] over TIFF files.
///
/// Writes go to a temporary file next to the target which replaces it only once
/// every plane has been encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffCodec;

impl TiffCodec {
    fn stage(
        &self,
        path: &Path,
        image: &ContainerImage<'_>,
        options: &ContainerOptions,
    ) -> Result<(), TiffError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = NamedTempFile::new_in(directory)?;
        {
            let mut handle = BufWriter::new(staging.as_file());
            let mut writer = TiffWriter::new(&mut handle, *options)?;
            writer.write_image(image)?;
            drop(writer);
            handle.flush()?;
        }
        staging.persist(path).map_err(|e| e.error)?;
        debug!("Moved staged TIFF into place at {}", path.display());
        Ok(())
    }
}

impl ContainerCodec for TiffCodec {
    fn read(&self, path: &Path) -> io::Result<RawContainer> {
        let reader = TiffReader::open(path)?;
        Ok(reader.read_planes()?)
    }

    fn read_description(&self, path: &Path) -> io::Result<Option<String>> {
        let mut reader = TiffReader::open(path)?;
        Ok(reader.description()?)
    }

    fn write(
        &self,
        path: &Path,
        image: &ContainerImage<'_>,
        options: &ContainerOptions,
    ) -> io::Result<()> {
        Ok(self.stage(path, image, options)?)
    }
}

/// Whether `path` starts with a TIFF or BigTIFF byte order marker and magic number
pub fn is_tiff(path: &Path) -> io::Result<bool> {
    let mut head = [0u8; 4];
    let mut handle = fs::File::open(path)?;
    match handle.read_exact(&mut head) {
        Ok(()) => Ok(reader::sniff_header(&head).is_ok()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use ndarray::{ArrayD, IxDyn};

    use super::*;
    use crate::io::container::{Compression, ContainerVariant, Photometric};
    use crate::pixels::{DType, PixelArray};

    fn ramp() -> PixelArray {
        let values: Vec<u16> = (0..(2 * 3 * 5 * 7)).map(|v| v as u16 * 3).collect();
        PixelArray::from(ArrayD::from_shape_vec(IxDyn(&[2, 3, 5, 7]), values).unwrap())
    }

    #[test_log::test]
    fn test_round_trip_variants() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = ramp();
        for (i, (variant, compression)) in [
            (ContainerVariant::Standard, Compression::None),
            (ContainerVariant::Standard, Compression::deflate()),
            (ContainerVariant::Large, Compression::None),
            (ContainerVariant::Large, Compression::Deflate { level: 1 }),
        ]
        .into_iter()
        .enumerate()
        {
            let path = dir.path().join(format!("ramp_{i}.tif"));
            let options = ContainerOptions {
                variant,
                compression,
                photometric: Photometric::MinIsBlack,
            };
            let image = ContainerImage::new(&pixels, Some("<OME/>"));
            TiffCodec.write(&path, &image, &options).unwrap();
            assert!(is_tiff(&path).unwrap());

            let raw = TiffCodec.read(&path).unwrap();
            assert_eq!(raw.variant, variant);
            assert_eq!(raw.description.as_deref(), Some("<OME/>"));
            assert_eq!(raw.pixels.shape(), &[6, 5, 7]);
            assert_eq!(raw.pixels.dtype(), DType::U16);
            assert_eq!(raw.pixels.to_native_bytes(), pixels.to_native_bytes());
            assert_eq!(
                TiffCodec.read_description(&path).unwrap().as_deref(),
                Some("<OME/>")
            );
        }
    }

    #[test]
    fn test_signed_and_float_samples() {
        let dir = tempfile::tempdir().unwrap();
        let floats: Vec<f32> = (0..24).map(|v| v as f32 * 0.5 - 3.0).collect();
        let signed: Vec<i16> = (0..24).map(|v| v as i16 - 12).collect();
        for (i, pixels) in [
            PixelArray::from(ArrayD::from_shape_vec(IxDyn(&[2, 3, 4]), floats).unwrap()),
            PixelArray::from(ArrayD::from_shape_vec(IxDyn(&[2, 3, 4]), signed).unwrap()),
        ]
        .into_iter()
        .enumerate()
        {
            let path = dir.path().join(format!("typed_{i}.tif"));
            TiffCodec
                .write(
                    &path,
                    &ContainerImage::new(&pixels, None),
                    &ContainerOptions::default(),
                )
                .unwrap();
            let raw = TiffCodec.read(&path).unwrap();
            assert!(raw.description.is_none());
            assert_eq!(raw.pixels, pixels);
        }
    }

    #[test]
    fn test_failed_write_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.tif");
        fs::write(&path, b"previous contents").unwrap();
        let pixels = PixelArray::zeros(DType::U8, &[1, 0, 4]);
        let err = TiffCodec
            .write(
                &path,
                &ContainerImage::new(&pixels, None),
                &ContainerOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(fs::read(&path).unwrap(), b"previous contents");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_not_a_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.tif");
        std::fs::write(&path, b"just some text").unwrap();
        assert!(!is_tiff(&path).unwrap());
        assert!(matches!(
            TiffReader::open(&path),
            Err(TiffError::InvalidHeader(_))
        ));
    }
}
