//! Read and write OME-TIFF images.
//!
//! Arrays of rank 3 to 5 are normalized to the canonical five axes `T`, `C`, `Z`, `Y`
//! and `X` before writing, and their [`MetadataRecord`] is transcoded into an OME-XML
//! document stored in the first TIFF image description. Reading reverses both steps.
//!
//! ```no_run
//! use ometiff::prelude::*;
//!
//! # fn main() -> Result<(), OmeTiffError> {
//! let outcome = OmeTiffReader::new("stack.ome.tiff").read()?;
//! println!("{} {:?}", outcome.dimension_order, outcome.array.shape());
//! # Ok(())
//! # }
//! ```
pub mod axes;
pub mod diagnostics;
pub mod io;
pub mod meta;
pub mod params;
pub mod pixels;
pub mod prelude;
pub mod shape;

pub use crate::axes::{Axis, DimensionOrder, DimensionOrderError};
pub use crate::diagnostics::{Diagnostic, Diagnostics};
pub use crate::meta::{ChannelRecord, MetadataRecord};
pub use crate::pixels::{DType, PixelArray, PixelType};
pub use crate::shape::{normalize_array, normalize_shape};

pub use crate::io::ometiff::{OmeTiffError, OmeTiffReader, OmeTiffWriter};
