//! Metadata describing an image series, independent of how it is stored.
pub mod channel;
pub mod record;
pub mod vocabulary;

pub use crate::meta::channel::{
    apply_to_pixels, channel_id, extract, reconcile, ChannelCountMismatch, ChannelRecord,
};
pub use crate::meta::record::MetadataRecord;
pub use crate::meta::vocabulary::{
    AcquisitionMode, ContrastMethod, DetectorType, IlluminationType, Immersion, MicroscopeType,
    UnknownTerm,
};
