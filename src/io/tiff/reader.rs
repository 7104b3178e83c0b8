use std::fs;
use std::io::{self, prelude::*, BufReader, Cursor, SeekFrom};
use std::path::Path;

use log::{debug, trace};
use ndarray::{ArrayD, IxDyn};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::io::container::{ContainerVariant, RawContainer};
use crate::pixels::{ByteOrder, DType, PixelArray, PixelDataError};

use super::TiffError;

/// Read the byte order marker and magic number at the start of a file
pub(crate) fn sniff_header(head: &[u8; 4]) -> Result<(ByteOrder, ContainerVariant), TiffError> {
    let (byte_order, magic) = match &head[..2] {
        b"II" => (ByteOrder::LittleEndian, u16::from_le_bytes([head[2], head[3]])),
        b"MM" => (ByteOrder::BigEndian, u16::from_be_bytes([head[2], head[3]])),
        other => {
            return Err(TiffError::InvalidHeader(format!(
                "unknown byte order marker {other:?}"
            )))
        }
    };
    match magic {
        42 => Ok((byte_order, ContainerVariant::Standard)),
        43 => Ok((byte_order, ContainerVariant::Large)),
        magic => Err(TiffError::InvalidHeader(format!("magic number {magic}"))),
    }
}

macro_rules! plane_from {
    ($result:expr, $shape:expr, $($variant:ident),+) => {
        match $result {
            $(DecodingResult::$variant(v) => PixelArray::from(ArrayD::from_shape_vec($shape, v)?),)+
        }
    };
}

fn plane_array(
    result: DecodingResult,
    rows: usize,
    columns: usize,
) -> Result<PixelArray, PixelDataError> {
    let shape = IxDyn(&[rows, columns]);
    Ok(plane_from!(result, shape, U8, I8, U16, I16, U32, I32, U64, I64, F32, F64))
}

/// Decodes every image file directory of a TIFF or BigTIFF file into a plane stack.
///
/// Buffer sizes are bounded by the decoder's [`Limits`].
pub struct TiffReader<R: Read + Seek> {
    decoder: Decoder<R>,
    byte_order: ByteOrder,
    variant: ContainerVariant,
}

impl TiffReader<BufReader<fs::File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TiffError> {
        Self::new(BufReader::new(fs::File::open(path)?))
    }
}

impl TiffReader<Cursor<Vec<u8>>> {
    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, TiffError> {
        Self::new(Cursor::new(buffer))
    }
}

impl<R: Read + Seek> TiffReader<R> {
    pub fn new(handle: R) -> Result<Self, TiffError> {
        Self::with_limits(handle, Limits::default())
    }

    pub fn with_limits(mut handle: R, limits: Limits) -> Result<Self, TiffError> {
        let mut head = [0u8; 4];
        handle.read_exact(&mut head).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                TiffError::InvalidHeader("shorter than a TIFF header".to_string())
            }
            _ => TiffError::IOError(e),
        })?;
        let (byte_order, variant) = sniff_header(&head)?;
        handle.seek(SeekFrom::Start(0))?;
        let decoder = Decoder::new(handle)?.with_limits(limits);
        debug!("Opened {variant:?} {byte_order:?} TIFF");
        Ok(Self {
            decoder,
            byte_order,
            variant,
        })
    }

    pub fn variant(&self) -> ContainerVariant {
        self.variant
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// The image description of the first directory, if it has one
    pub fn description(&mut self) -> Result<Option<String>, TiffError> {
        match self.decoder.find_tag(Tag::ImageDescription)? {
            Some(value) => {
                let text = value.into_string()?;
                Ok(Some(text.trim_end_matches('\0').to_string()))
            }
            None => Ok(None),
        }
    }

    fn read_current(&mut self, index: usize) -> Result<PixelArray, TiffError> {
        match self.decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(TiffError::Unsupported {
                    what: "color type",
                    value: format!("{other:?} in directory {index}"),
                })
            }
        }
        let (columns, rows) = self.decoder.dimensions()?;
        let too_large = |value: u32| TiffError::Unsupported {
            what: "plane dimension",
            value: value.to_string(),
        };
        let rows = usize::try_from(rows).map_err(|_| too_large(rows))?;
        let columns = usize::try_from(columns).map_err(|_| too_large(columns))?;
        let plane = plane_array(self.decoder.read_image()?, rows, columns)?;
        trace!("Decoded directory {index}: {rows}x{columns} {}", plane.dtype());
        Ok(plane)
    }

    /// Decode every directory in the file and stack the planes along a leading axis
    pub fn read_planes(mut self) -> Result<RawContainer, TiffError> {
        let description = self.description()?;
        let mut data = Vec::new();
        let mut layout: Option<(DType, usize, usize)> = None;
        let mut n_planes = 0;
        loop {
            let plane = self.read_current(n_planes)?;
            let (rows, columns) = match plane.shape() {
                [rows, columns] => (*rows, *columns),
                _ => (0, 0),
            };
            let this = (plane.dtype(), rows, columns);
            match layout {
                Some(first) if first != this => {
                    return Err(TiffError::InconsistentPlanes { index: n_planes })
                }
                Some(_) => {}
                None => layout = Some(this),
            }
            data.extend_from_slice(&plane.to_native_bytes());
            n_planes += 1;
            if !self.decoder.more_images() {
                break;
            }
            self.decoder.next_image()?;
        }
        let (dtype, rows, columns) = layout.unwrap_or((DType::U8, 0, 0));
        debug!("Read {n_planes} planes of {rows}x{columns} {dtype} samples");
        let pixels = PixelArray::from_raw(
            dtype,
            &[n_planes, rows, columns],
            &data,
            ByteOrder::native(),
        )?;
        Ok(RawContainer {
            pixels,
            byte_order: self.byte_order,
            variant: self.variant,
            description,
        })
    }
}
