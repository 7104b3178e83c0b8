//! The seam between OME metadata handling and the pixel container format.
use std::io;
use std::path::Path;

use crate::diagnostics::Diagnostic;
use crate::pixels::{ByteOrder, PixelArray};

/// The byte boundary above which the standard container cannot address its contents
pub const BYTE_BOUNDARY: u64 = 1 << 32;

/// The addressing mode of the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerVariant {
    /// 32-bit offsets
    #[default]
    Standard,
    /// 64-bit offsets (BigTIFF)
    Large,
}

/// Chooses a [`ContainerVariant`] from the size of the data to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    pub threshold: u64,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            threshold: BYTE_BOUNDARY,
        }
    }
}

impl SizePolicy {
    pub const fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    /**
    Select the variant for `byte_size` bytes of pixel data, `None` when there is no
    array. Exceeding the threshold mandates [`ContainerVariant::Large`], and if the
    caller had not asked for it already a [`Diagnostic::LargeVariantSelected`] is
    returned alongside.
    */
    pub fn select_variant(
        &self,
        byte_size: Option<u64>,
        force_large: bool,
    ) -> (ContainerVariant, Option<Diagnostic>) {
        let exceeds = byte_size.is_some_and(|size| size > self.threshold);
        match (exceeds, force_large) {
            (_, true) => (ContainerVariant::Large, None),
            (true, false) => (
                ContainerVariant::Large,
                byte_size.map(|byte_size| Diagnostic::LargeVariantSelected {
                    byte_size,
                    threshold: self.threshold,
                }),
            ),
            (false, false) => (ContainerVariant::Standard, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    None,
    /// zlib-wrapped deflate at the given level, 0 through 9. Levels are grouped into
    /// fast (0-3), balanced (4-6) and best (7-9).
    Deflate { level: u32 },
}

impl Compression {
    pub const fn deflate() -> Self {
        Self::Deflate { level: 6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Photometric {
    #[default]
    MinIsBlack,
    MinIsWhite,
}

/// How a container should be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerOptions {
    pub variant: ContainerVariant,
    pub compression: Compression,
    pub photometric: Photometric,
}

/// What gets written: a canonical array whose trailing two axes are the plane rows and
/// columns, and the serialized metadata document.
#[derive(Debug, Clone, Copy)]
pub struct ContainerImage<'a> {
    pub pixels: &'a PixelArray,
    pub description: Option<&'a str>,
}

impl<'a> ContainerImage<'a> {
    pub fn new(pixels: &'a PixelArray, description: Option<&'a str>) -> Self {
        Self {
            pixels,
            description,
        }
    }

    /// The number of 2D planes, the product of all but the last two axes
    pub fn plane_count(&self) -> usize {
        let shape = self.pixels.shape();
        shape[..shape.len().saturating_sub(2)].iter().product()
    }

    /// `(rows, columns)` of each plane
    pub fn plane_shape(&self) -> (usize, usize) {
        match self.pixels.shape() {
            [.., rows, columns] => (*rows, *columns),
            [columns] => (1, *columns),
            [] => (1, 1),
        }
    }
}

/// What a container read produced, before any metadata is interpreted
#[derive(Debug, Clone)]
pub struct RawContainer {
    /// The planes stacked along the first axis, `(planes, rows, columns)`
    pub pixels: PixelArray,
    /// The byte order the samples were stored in
    pub byte_order: ByteOrder,
    pub variant: ContainerVariant,
    /// The text of the first image description, if there was one
    pub description: Option<String>,
}

/// A pixel container format able to carry a text description with its planes
pub trait ContainerCodec {
    fn read(&self, path: &Path) -> io::Result<RawContainer>;

    /// The description text alone, without decoding any pixel data
    fn read_description(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replace whatever is at `path` with `image`. Implementations must leave an
    /// existing file untouched when writing fails.
    fn write(
        &self,
        path: &Path,
        image: &ContainerImage<'_>,
        options: &ContainerOptions,
    ) -> io::Result<()>;
}
