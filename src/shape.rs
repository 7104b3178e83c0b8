//! Expansion of 3, 4 and 5 dimensional shapes to the five `T`, `C`, `Z`, `Y`, `X` axes.
use crate::axes::{Axis, DimensionOrder, DimensionOrderError};
use crate::pixels::PixelArray;

/// The leading axes inserted in front of a three axis order, keyed by its first axis
fn rank3_prefix(first: Axis) -> Option<[Axis; 2]> {
    match first {
        Axis::T => Some([Axis::C, Axis::Z]),
        Axis::C => Some([Axis::T, Axis::Z]),
        Axis::Z => Some([Axis::T, Axis::C]),
        _ => None,
    }
}

/// The leading axis inserted in front of a four axis order, keyed by its first two axes
fn rank4_prefix(first: Axis, second: Axis) -> Option<Axis> {
    match (first, second) {
        (Axis::T, Axis::C) | (Axis::C, Axis::T) => Some(Axis::Z),
        (Axis::T, Axis::Z) | (Axis::Z, Axis::T) => Some(Axis::C),
        (Axis::C, Axis::Z) | (Axis::Z, Axis::C) => Some(Axis::T),
        _ => None,
    }
}

/// Work out the canonical order for an array of `rank` dimensions described by `order`,
/// returning the axes to insert at the front along with it.
fn expansion(
    rank: usize,
    order: &DimensionOrder,
) -> Result<(Vec<Axis>, DimensionOrder), DimensionOrderError> {
    if !(3..=5).contains(&rank) {
        return Err(DimensionOrderError::UnsupportedRank {
            shape: Vec::new(),
        });
    }
    order.check_rank(rank)?;
    let trimmed = order.trailing(rank);
    let not_canonical = || DimensionOrderError::NotCanonical {
        order: trimmed.to_string(),
    };

    let inserted: Vec<Axis> = match rank {
        3 => rank3_prefix(trimmed.axes()[0])
            .ok_or_else(not_canonical)?
            .to_vec(),
        4 => vec![rank4_prefix(trimmed.axes()[0], trimmed.axes()[1]).ok_or_else(not_canonical)?],
        _ => Vec::new(),
    };

    let canonical = trimmed.prepend(&inserted);
    if !canonical.is_canonical() {
        return Err(not_canonical());
    }
    Ok((inserted, canonical))
}

/// Validate `order` against a `shape` and expand both to five axes.
///
/// The order is trimmed to the array rank by dropping leading symbols, so `"STZCYX"`
/// describes a `ZCYX` array when given a rank 4 shape. New axes have length 1.
pub fn normalize_shape(
    shape: &[usize],
    order: &DimensionOrder,
) -> Result<(Vec<usize>, DimensionOrder), DimensionOrderError> {
    let (inserted, canonical) = expansion(shape.len(), order).map_err(|e| match e {
        DimensionOrderError::UnsupportedRank { .. } => DimensionOrderError::UnsupportedRank {
            shape: shape.to_vec(),
        },
        e => e,
    })?;
    let mut dims = vec![1; inserted.len()];
    dims.extend_from_slice(shape);
    if let Some(i) = dims.iter().position(|n| *n == 0) {
        return Err(DimensionOrderError::EmptyAxis {
            shape: shape.to_vec(),
            axis: canonical.axes()[i],
        });
    }
    Ok((dims, canonical))
}

/// As [`normalize_shape`], inserting the same length-1 axes into `array`.
pub fn normalize_array(
    array: PixelArray,
    order: &DimensionOrder,
) -> Result<(PixelArray, DimensionOrder), DimensionOrderError> {
    let (dims, canonical) = normalize_shape(array.shape(), order)?;
    let n_new = dims.len() - array.ndim();
    Ok((array.insert_leading_axes(n_new), canonical))
}

/// The length of `axis` in `dims` as described by `order`, or 1 if the axis is not present
pub fn axis_size(dims: &[usize], order: &DimensionOrder, axis: Axis) -> usize {
    order
        .position(axis)
        .and_then(|i| dims.get(i).copied())
        .unwrap_or(1)
}
