//! Axis symbols and validated dimension-order strings.
//!
//! A [`DimensionOrder`] names the axes of an array from slowest to fastest varying,
//! e.g. `"TZCYX"`. The accepted alphabet is `S` (series), `T` (time), `C` (channel),
//! `Z` (depth), `Y` (row) and `X` (column).
use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

/// A single axis symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// Image series
    S,
    /// Time point
    T,
    /// Channel
    C,
    /// Depth
    Z,
    /// Row
    Y,
    /// Column
    X,
}

impl Axis {
    pub const fn symbol(&self) -> char {
        match self {
            Self::S => 'S',
            Self::T => 'T',
            Self::C => 'C',
            Self::Z => 'Z',
            Self::Y => 'Y',
            Self::X => 'X',
        }
    }

    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'S' => Some(Self::S),
            'T' => Some(Self::T),
            'C' => Some(Self::C),
            'Z' => Some(Self::Z),
            'Y' => Some(Self::Y),
            'X' => Some(Self::X),
            _ => None,
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/**
All the ways a dimension-order string can be rejected. Every variant carries the
offending order string so the message can be shown to a user as-is.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionOrderError {
    #[error("invalid axis symbol {symbol:?} in dimension order {order:?}")]
    UnknownAxis { order: String, symbol: char },
    #[error(
        "the last two axes of dimension order {order:?} are expected to be YX, they are {found:?} instead; transpose the data"
    )]
    TrailingAxes { order: String, found: String },
    #[error("S must be the leading axis in dimension order {order:?}")]
    SeriesNotLeading { order: String },
    #[error("axis {symbol} appears more than once in dimension order {order:?}")]
    DuplicateAxis { order: String, symbol: char },
    #[error("dimension order {order:?} must have at least as many axes as the array rank {rank}")]
    TooFewAxes { order: String, rank: usize },
    #[error("expected a 3, 4 or 5 dimensional array, got shape {shape:?}")]
    UnsupportedRank { shape: Vec<usize> },
    #[error("dimension order {order:?} cannot be expanded to the T, C, Z, Y and X axes")]
    NotCanonical { order: String },
    #[error("axis {axis} of shape {shape:?} has length 0")]
    EmptyAxis { shape: Vec<usize>, axis: Axis },
}

/// An ordered, validated sequence of [`Axis`] symbols ending in `YX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionOrder {
    axes: Vec<Axis>,
}

impl DimensionOrder {
    /// Parse and validate a dimension-order string.
    ///
    /// The checks run in a fixed sequence: alphabet, trailing `YX` pair,
    /// leading `S`, repeated symbols.
    pub fn parse(order: &str) -> Result<Self, DimensionOrderError> {
        let mut axes = Vec::with_capacity(order.len());
        for symbol in order.chars() {
            match Axis::from_symbol(symbol) {
                Some(axis) => axes.push(axis),
                None => {
                    return Err(DimensionOrderError::UnknownAxis {
                        order: order.to_string(),
                        symbol,
                    })
                }
            }
        }

        if !axes.ends_with(&[Axis::Y, Axis::X]) {
            let found: String = axes
                .iter()
                .skip(axes.len().saturating_sub(2))
                .map(Axis::symbol)
                .collect();
            return Err(DimensionOrderError::TrailingAxes {
                order: order.to_string(),
                found,
            });
        }

        if axes.iter().skip(1).any(|a| *a == Axis::S) {
            return Err(DimensionOrderError::SeriesNotLeading {
                order: order.to_string(),
            });
        }

        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].contains(axis) {
                return Err(DimensionOrderError::DuplicateAxis {
                    order: order.to_string(),
                    symbol: axis.symbol(),
                });
            }
        }

        Ok(Self { axes })
    }

    /// Build an order from the character-reversed string stored in an OME-XML
    /// `DimensionOrder` attribute, e.g. `"XYCZT"` becomes `"TZCYX"`.
    pub fn from_storage_form(stored: &str) -> Result<Self, DimensionOrderError> {
        let order: String = stored.chars().rev().collect();
        Self::parse(&order)
    }

    /// The character-reversed form written into an OME-XML document. The document
    /// enumerates axes fastest-varying first while arrays list them slowest first.
    pub fn storage_form(&self) -> String {
        self.axes.iter().rev().map(Axis::symbol).collect()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn position(&self, axis: Axis) -> Option<usize> {
        self.axes.iter().position(|a| *a == axis)
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.position(axis).is_some()
    }

    pub fn first(&self) -> Option<Axis> {
        self.axes.first().copied()
    }

    /// Check that this order can describe an array of `rank` dimensions.
    pub fn check_rank(&self, rank: usize) -> Result<(), DimensionOrderError> {
        if self.len() < rank {
            Err(DimensionOrderError::TooFewAxes {
                order: self.to_string(),
                rank,
            })
        } else {
            Ok(())
        }
    }

    /// Keep only the last `n` axes, dropping leading ones.
    ///
    /// The result is still a valid order when `n >= 2`, since `YX` is always trailing.
    pub fn trailing(&self, n: usize) -> Self {
        let start = self.axes.len().saturating_sub(n);
        Self {
            axes: self.axes[start..].to_vec(),
        }
    }

    /// Drop the series axis if present.
    pub fn without_series(&self) -> Self {
        Self {
            axes: self.axes.iter().copied().filter(|a| *a != Axis::S).collect(),
        }
    }

    pub(crate) fn prepend(&self, leading: &[Axis]) -> Self {
        let mut axes = Vec::with_capacity(leading.len() + self.axes.len());
        axes.extend_from_slice(leading);
        axes.extend_from_slice(&self.axes);
        Self { axes }
    }

    /// Whether this is a five axis permutation of `T`, `C`, `Z`, `Y` and `X`.
    pub fn is_canonical(&self) -> bool {
        self.len() == 5
            && [Axis::T, Axis::C, Axis::Z, Axis::Y, Axis::X]
                .iter()
                .all(|a| self.contains(*a))
    }
}

impl Default for DimensionOrder {
    /// `STZCYX`, which degrades to `TZCYX`, `ZCYX` or `CYX` for lower rank arrays
    fn default() -> Self {
        Self {
            axes: vec![Axis::S, Axis::T, Axis::Z, Axis::C, Axis::Y, Axis::X],
        }
    }
}

impl Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.axes.iter() {
            write!(f, "{}", axis.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for DimensionOrder {
    type Err = DimensionOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for DimensionOrder {
    type Error = DimensionOrderError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for DimensionOrder {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for DimensionOrder {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_valid() {
        for order in ["STZCYX", "TZCYX", "ZCYX", "CYX", "YX", "SCTZYX"] {
            let parsed = DimensionOrder::parse(order).unwrap();
            assert_eq!(parsed.to_string(), order);
        }
    }

    #[test]
    fn test_trailing_axes() {
        let err = DimensionOrder::parse("XYZCT").unwrap_err();
        assert!(matches!(
            err,
            DimensionOrderError::TrailingAxes { ref found, .. } if found == "CT"
        ));

        let err = DimensionOrder::parse("SXYZCT").unwrap_err();
        assert!(matches!(err, DimensionOrderError::TrailingAxes { .. }));

        let err = DimensionOrder::parse("XSYZCT").unwrap_err();
        assert_eq!(
            err,
            DimensionOrderError::TrailingAxes {
                order: "XSYZCT".into(),
                found: "CT".into()
            }
        );

        let err = DimensionOrder::parse("").unwrap_err();
        assert!(matches!(err, DimensionOrderError::TrailingAxes { .. }));
    }

    #[test]
    fn test_series_placement() {
        assert!(DimensionOrder::parse("SZCYX").is_ok());
        let err = DimensionOrder::parse("ZSCYX").unwrap_err();
        assert_eq!(
            err,
            DimensionOrderError::SeriesNotLeading {
                order: "ZSCYX".into()
            }
        );
    }

    #[test]
    fn test_alphabet_and_duplicates() {
        let err = DimensionOrder::parse("TQYX").unwrap_err();
        assert_eq!(
            err,
            DimensionOrderError::UnknownAxis {
                order: "TQYX".into(),
                symbol: 'Q'
            }
        );

        let err = DimensionOrder::parse("ZZYX").unwrap_err();
        assert_eq!(
            err,
            DimensionOrderError::DuplicateAxis {
                order: "ZZYX".into(),
                symbol: 'Z'
            }
        );

        let msg = DimensionOrder::parse("ZZYX").unwrap_err().to_string();
        assert!(msg.contains("ZZYX"));
    }

    #[test]
    fn test_storage_form() {
        let order: DimensionOrder = "TZCYX".parse().unwrap();
        assert_eq!(order.storage_form(), "XYCZT");
        let back = DimensionOrder::from_storage_form("XYCZT").unwrap();
        assert_eq!(back, order);
        assert!(order.is_canonical());
    }

    #[test]
    fn test_trailing_and_rank() {
        let order = DimensionOrder::default();
        assert_eq!(order.to_string(), "STZCYX");
        assert_eq!(order.trailing(3).to_string(), "CYX");
        assert_eq!(order.without_series().to_string(), "TZCYX");
        assert!(order.check_rank(6).is_ok());

        let short: DimensionOrder = "ZYX".parse().unwrap();
        assert_eq!(
            short.check_rank(4),
            Err(DimensionOrderError::TooFewAxes {
                order: "ZYX".into(),
                rank: 4
            })
        );
    }
}
