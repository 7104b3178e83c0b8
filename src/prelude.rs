pub use crate::axes::{Axis, DimensionOrder};
pub use crate::diagnostics::{Diagnostic, Diagnostics};
pub use crate::io::container::{Compression, ContainerCodec, ContainerVariant, SizePolicy};
pub use crate::io::ometiff::{
    ImageSource, OmeTiffError, OmeTiffReader, OmeTiffWriter, OmeTiffWriterBuilder, ReadOutcome,
};
pub use crate::meta::{ChannelRecord, MetadataRecord};
pub use crate::params::{FieldMap, FieldValue, LengthUnit, PhysicalSize, TimeSpan, TimeUnit};
pub use crate::pixels::{DType, PixelArray, PixelType};
