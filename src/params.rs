//! Loosely typed field values, OME units of measure and the by-name field transfer
//! machinery used to push metadata onto the document model.
use std::fmt::{self, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

/// A single metadata value as supplied by a caller or read from a document attribute
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// A non-negative integer value, e.g. a count or a size
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Text(s) => match s.trim() {
                "true" | "True" | "1" => Some(true),
                "false" | "False" | "0" => Some(false),
                _ => None,
            },
            Self::Integer(1) => Some(true),
            Self::Integer(0) => Some(false),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value carries no information: an empty or all-whitespace string
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! field_value_from {
    ($($t:ty => $variant:ident as $conv:ty),+) => {$(
        impl From<$t> for FieldValue {
            fn from(value: $t) -> Self {
                Self::$variant(value as $conv)
            }
        }
    )+};
}

field_value_from!(
    i64 => Integer as i64, i32 => Integer as i64, u32 => Integer as i64,
    u16 => Integer as i64, u8 => Integer as i64, f64 => Float as f64,
    f32 => Float as f64
);

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Caller supplied fields addressed by their OME attribute name, in insertion order
pub type FieldMap = IndexMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown unit symbol {0:?}")]
pub struct UnknownUnit(pub String);

macro_rules! unit_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $symbol:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// The symbol used for this unit in OME-XML unit attributes
            pub const fn symbol(&self) -> &'static str {
                match self {
                    $(Self::$variant => $symbol,)+
                }
            }

            pub fn from_symbol(symbol: &str) -> Option<Self> {
                match symbol {
                    $($symbol $(| $alias)* => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        }

        impl FromStr for $name {
            type Err = UnknownUnit;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_symbol(s).ok_or_else(|| UnknownUnit(s.to_string()))
            }
        }
    };
}

unit_enum!(
    /// Units of length accepted for physical sizes, wavelengths and pinholes
    LengthUnit {
        Meter => "m",
        Decimeter => "dm",
        Centimeter => "cm",
        Millimeter => "mm",
        Micrometer => "µm" | "um" | "μm",
        Nanometer => "nm",
        Picometer => "pm",
        Angstrom => "Å",
        Inch => "in",
        Pixel => "pixel",
        ReferenceFrame => "reference frame",
    }
);

unit_enum!(
    /// Units of time accepted for time increments and exposure times
    TimeUnit {
        Hour => "h",
        Minute => "min",
        Second => "s",
        Millisecond => "ms",
        Microsecond => "µs" | "us" | "μs",
        Nanosecond => "ns",
        Picosecond => "ps",
    }
);

impl Default for LengthUnit {
    fn default() -> Self {
        Self::Micrometer
    }
}

impl Default for TimeUnit {
    fn default() -> Self {
        Self::Second
    }
}

/// A value paired with its unit of measure
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantity<U> {
    pub value: f64,
    pub unit: U,
}

impl<U> Quantity<U> {
    pub const fn new(value: f64, unit: U) -> Self {
        Self { value, unit }
    }
}

impl<U: Display> Display for Quantity<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// A physical length such as a voxel edge or a wavelength
pub type PhysicalSize = Quantity<LengthUnit>;
/// A span of time
pub type TimeSpan = Quantity<TimeUnit>;

/// Why a single field could not be transferred
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldRejection {
    #[error("{0} is not a recognized field")]
    UnknownField(String),
    #[error("{value:?} is not a valid value for {field}")]
    InvalidValue { field: String, value: FieldValue },
}

impl FieldRejection {
    pub fn invalid(field: &str, value: &FieldValue) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.clone(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::UnknownField(f) => f,
            Self::InvalidValue { field, .. } => field,
        }
    }
}

/// A typed setter for one named field of `T`
pub type Setter<T> = fn(&mut T, &FieldValue) -> Result<(), FieldRejection>;

/// A document element whose attributes can be set by name from a fixed table.
pub trait FieldTarget: Sized + 'static {
    /// The element name, used to label rejections
    const SCOPE: &'static str;

    const SETTERS: &'static [(&'static str, Setter<Self>)];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> Result<(), FieldRejection> {
        match Self::SETTERS.iter().find(|(key, _)| *key == name) {
            Some((_, setter)) => setter(self, value),
            None => Err(FieldRejection::UnknownField(name.to_string())),
        }
    }

    fn accepts(name: &str) -> bool {
        Self::SETTERS.iter().any(|(key, _)| *key == name)
    }
}

/// The outcome of a best-effort transfer of many fields onto one target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTransfer {
    pub applied: Vec<String>,
    pub ignored: Vec<String>,
}

impl FieldTransfer {
    pub fn is_clean(&self) -> bool {
        self.ignored.is_empty()
    }

    pub fn extend(&mut self, other: FieldTransfer) {
        self.applied.extend(other.applied);
        self.ignored.extend(other.ignored);
    }
}

/// Apply each `(name, value)` pair to `target`, collecting the names that were rejected
/// instead of stopping at the first failure.
pub fn transfer_fields<'a, T: FieldTarget>(
    target: &mut T,
    fields: impl IntoIterator<Item = (&'a str, &'a FieldValue)>,
) -> FieldTransfer {
    let mut transfer = FieldTransfer::default();
    for (name, value) in fields {
        match target.set_field(name, value) {
            Ok(()) => transfer.applied.push(name.to_string()),
            Err(e) => {
                log::debug!("{}: {e}", T::SCOPE);
                transfer.ignored.push(name.to_string());
            }
        }
    }
    transfer
}
