use std::borrow::Cow;
use std::io::{Seek, Write};

use log::{debug, trace};
use ndarray::ArrayD;
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::{
    Compression as EncoderCompression, Deflate, DeflateLevel, Uncompressed,
};
use tiff::encoder::{TiffEncoder, TiffKind, TiffKindBig, TiffKindStandard, TiffValue};
use tiff::tags::{PhotometricInterpretation, Tag};

use crate::io::container::{
    Compression, ContainerImage, ContainerOptions, ContainerVariant, Photometric,
};
use crate::pixels::PixelArray;

use super::TiffError;

const SOFTWARE: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

enum Encoder<W: Write + Seek> {
    Standard(TiffEncoder<W, TiffKindStandard>),
    Large(TiffEncoder<W, TiffKindBig>),
}

/// What every directory of one [`ContainerImage`] shares
struct PlaneLayout<'a> {
    rows: u32,
    columns: u32,
    photometric: PhotometricInterpretation,
    compression: Compression,
    description: Option<&'a str>,
}

fn deflate_level(level: u32) -> DeflateLevel {
    match level {
        0..=3 => DeflateLevel::Fast,
        4..=6 => DeflateLevel::Balanced,
        _ => DeflateLevel::Best,
    }
}

fn dimension(value: usize) -> Result<u32, TiffError> {
    u32::try_from(value).map_err(|_| TiffError::DimensionOverflow(value))
}

fn write_plane<W, K, C, D>(
    encoder: &mut TiffEncoder<W, K>,
    data: &[C::Inner],
    layout: &PlaneLayout<'_>,
    description: Option<&str>,
    compression: D,
) -> Result<(), TiffError>
where
    W: Write + Seek,
    K: TiffKind,
    C: ColorType,
    D: EncoderCompression,
    [C::Inner]: TiffValue,
{
    let mut image =
        encoder.new_image_with_compression::<C, D>(layout.columns, layout.rows, compression)?;
    let directory = image.encoder();
    directory.write_tag(Tag::PhotometricInterpretation, layout.photometric.to_u16())?;
    if let Some(text) = description {
        directory.write_tag(Tag::ImageDescription, text)?;
    }
    directory.write_tag(Tag::Software, SOFTWARE)?;
    image.write_data(data)?;
    Ok(())
}

fn write_typed<W, K, C>(
    encoder: &mut TiffEncoder<W, K>,
    array: &ArrayD<C::Inner>,
    layout: &PlaneLayout<'_>,
) -> Result<(), TiffError>
where
    W: Write + Seek,
    K: TiffKind,
    C: ColorType,
    C::Inner: Clone,
    [C::Inner]: TiffValue,
{
    let values: Cow<'_, [C::Inner]> = match array.as_slice() {
        Some(values) => Cow::Borrowed(values),
        None => Cow::Owned(array.iter().cloned().collect()),
    };
    let plane_len = layout.rows as usize * layout.columns as usize;
    for (i, plane) in values.chunks(plane_len).enumerate() {
        let description = if i == 0 { layout.description } else { None };
        match layout.compression {
            Compression::None => {
                write_plane::<W, K, C, _>(encoder, plane, layout, description, Uncompressed)?
            }
            Compression::Deflate { level } => write_plane::<W, K, C, _>(
                encoder,
                plane,
                layout,
                description,
                Deflate::with_level(deflate_level(level)),
            )?,
        }
        trace!("Wrote plane {i}");
    }
    Ok(())
}

fn write_planes<W: Write + Seek, K: TiffKind>(
    encoder: &mut TiffEncoder<W, K>,
    pixels: &PixelArray,
    layout: &PlaneLayout<'_>,
) -> Result<(), TiffError> {
    match pixels {
        PixelArray::U8(arr) => write_typed::<W, K, colortype::Gray8>(encoder, arr, layout),
        PixelArray::I8(arr) => write_typed::<W, K, colortype::GrayI8>(encoder, arr, layout),
        PixelArray::U16(arr) => write_typed::<W, K, colortype::Gray16>(encoder, arr, layout),
        PixelArray::I16(arr) => write_typed::<W, K, colortype::GrayI16>(encoder, arr, layout),
        PixelArray::U32(arr) => write_typed::<W, K, colortype::Gray32>(encoder, arr, layout),
        PixelArray::I32(arr) => write_typed::<W, K, colortype::GrayI32>(encoder, arr, layout),
        PixelArray::U64(arr) => write_typed::<W, K, colortype::Gray64>(encoder, arr, layout),
        PixelArray::I64(arr) => write_typed::<W, K, colortype::GrayI64>(encoder, arr, layout),
        PixelArray::F32(arr) => write_typed::<W, K, colortype::Gray32Float>(encoder, arr, layout),
        PixelArray::F64(arr) => write_typed::<W, K, colortype::Gray64Float>(encoder, arr, layout),
    }
}

/// Writes planes as a sequence of image file directories, classic TIFF or BigTIFF
/// depending on [`ContainerOptions::variant`]
pub struct TiffWriter<W: Write + Seek> {
    encoder: Encoder<W>,
    options: ContainerOptions,
    planes_written: usize,
}

impl<W: Write + Seek> TiffWriter<W> {
    pub fn new(handle: W, options: ContainerOptions) -> Result<Self, TiffError> {
        let encoder = match options.variant {
            ContainerVariant::Standard => Encoder::Standard(TiffEncoder::new(handle)?),
            ContainerVariant::Large => Encoder::Large(TiffEncoder::new_big(handle)?),
        };
        Ok(Self {
            encoder,
            options,
            planes_written: 0,
        })
    }

    pub fn planes_written(&self) -> usize {
        self.planes_written
    }

    /// Write every plane of `image`, attaching the description to the first directory
    /// of the file
    pub fn write_image(&mut self, image: &ContainerImage<'_>) -> Result<(), TiffError> {
        let pixels = image.pixels;
        let (rows, columns) = image.plane_shape();
        let n_planes = image.plane_count();
        if rows == 0 || columns == 0 || n_planes == 0 {
            return Err(TiffError::EmptyImage(pixels.shape().to_vec()));
        }
        let layout = PlaneLayout {
            rows: dimension(rows)?,
            columns: dimension(columns)?,
            photometric: match self.options.photometric {
                Photometric::MinIsBlack => PhotometricInterpretation::BlackIsZero,
                Photometric::MinIsWhite => PhotometricInterpretation::WhiteIsZero,
            },
            compression: self.options.compression,
            description: image.description.filter(|_| self.planes_written == 0),
        };
        debug!(
            "Writing {n_planes} planes of {rows}x{columns} {} samples as {:?}",
            pixels.dtype(),
            self.options.variant
        );
        match &mut self.encoder {
            Encoder::Standard(encoder) => write_planes(encoder, pixels, &layout)?,
            Encoder::Large(encoder) => write_planes(encoder, pixels, &layout)?,
        }
        self.planes_written += n_planes;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use tiff::decoder::Decoder;

    use super::*;
    use crate::pixels::DType;

    fn encode(pixels: &PixelArray, options: ContainerOptions) -> Vec<u8> {
        let mut handle = Cursor::new(Vec::new());
        let mut writer = TiffWriter::new(&mut handle, options).unwrap();
        writer
            .write_image(&ContainerImage::new(pixels, Some("hello")))
            .unwrap();
        assert_eq!(writer.planes_written(), 2);
        drop(writer);
        handle.into_inner()
    }

    #[test]
    fn test_directory_tags() {
        let pixels = PixelArray::zeros(DType::U8, &[2, 4, 4]);
        let options = ContainerOptions {
            photometric: Photometric::MinIsWhite,
            ..Default::default()
        };
        let bytes = encode(&pixels, options);
        assert_eq!(&bytes[2..4], &42u16.to_ne_bytes());

        let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (4, 4));
        assert_eq!(
            decoder.get_tag_ascii_string(Tag::ImageDescription).unwrap(),
            "hello"
        );
        assert_eq!(decoder.get_tag_ascii_string(Tag::Software).unwrap(), SOFTWARE);
        assert_eq!(
            decoder.get_tag_u32(Tag::PhotometricInterpretation).unwrap(),
            0
        );
        assert!(decoder.more_images());
        decoder.next_image().unwrap();
        // The description is only present on the first directory
        assert!(decoder.find_tag(Tag::ImageDescription).unwrap().is_none());
        assert!(!decoder.more_images());
    }

    #[test]
    fn test_big_header() {
        let pixels = PixelArray::zeros(DType::F32, &[2, 3, 5]);
        let options = ContainerOptions {
            variant: ContainerVariant::Large,
            compression: Compression::deflate(),
            ..Default::default()
        };
        let bytes = encode(&pixels, options);
        assert_eq!(&bytes[2..4], &43u16.to_ne_bytes());
        assert_eq!(&bytes[4..6], &8u16.to_ne_bytes());
    }

    #[test]
    fn test_empty_image() {
        let pixels = PixelArray::zeros(DType::U16, &[3, 0, 4]);
        let mut writer =
            TiffWriter::new(Cursor::new(Vec::new()), ContainerOptions::default()).unwrap();
        let err = writer
            .write_image(&ContainerImage::new(&pixels, None))
            .unwrap_err();
        assert!(matches!(err, TiffError::EmptyImage(shape) if shape == [3, 0, 4]));
        assert_eq!(writer.planes_written(), 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_dimension_overflow() {
        assert_eq!(dimension(65536).unwrap(), 65536);
        assert_eq!(dimension(u32::MAX as usize).unwrap(), u32::MAX);
        let too_wide = u32::MAX as usize + 1;
        assert!(matches!(
            dimension(too_wide),
            Err(TiffError::DimensionOverflow(n)) if n == too_wide
        ));
    }
}
