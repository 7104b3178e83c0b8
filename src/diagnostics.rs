//! Non-fatal issues encountered while reading or writing, reported alongside a result.
use std::fmt::{self, Display};
use std::ops::Deref;

use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Diagnostic {
    /// The container held no OME-XML document, so only default metadata is available
    MissingMetadataDocument { source: String },
    /// Some fields could not be transferred onto the element named by `scope`
    FieldTransferIgnored { scope: String, fields: Vec<String> },
    /// An optional part of the document was absent and defaults were substituted
    OptionalSubpathAbsent { path: String },
    /// The array was too large for the standard container and the large variant was used
    LargeVariantSelected { byte_size: u64, threshold: u64 },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMetadataDocument { source } => {
                write!(f, "{source} does not contain an OME-XML metadata document")
            }
            Self::FieldTransferIgnored { scope, fields } => {
                write!(f, "{scope} ignored fields: {}", fields.join(", "))
            }
            Self::OptionalSubpathAbsent { path } => {
                write!(f, "{path} is absent, using defaults")
            }
            Self::LargeVariantSelected {
                byte_size,
                threshold,
            } => write!(
                f,
                "array size {byte_size} bytes exceeds {threshold} bytes, writing the large container variant"
            ),
        }
    }
}

/// An ordered collection of [`Diagnostic`]s, each logged as it is recorded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.0.push(diagnostic);
    }

    pub fn absent(&mut self, path: impl Into<String>) {
        self.push(Diagnostic::OptionalSubpathAbsent { path: path.into() })
    }

    /// Record the ignored half of a field transfer, if there is one
    pub fn ignored(&mut self, scope: impl Into<String>, fields: Vec<String>) {
        if !fields.is_empty() {
            self.push(Diagnostic::FieldTransferIgnored {
                scope: scope.into(),
                fields,
            })
        }
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0)
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Deref for Diagnostics {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
