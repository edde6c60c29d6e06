//! Packing of coordinate records into formatted storage
//!
//! Records arrive as a flat coordinate array (`order` coordinates per record,
//! tensor mode order) plus one value per record, in any order and with
//! duplicates. Packing sorts them into level order, sums duplicates and builds
//! the level indices bottom-up from parent positions.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{Array, ModeIndex, TensorStorage};
use crate::dtype::Element;
use crate::error::Result;
use crate::format::{Format, ModeFormat};

/// Below this many records a sequential sort is faster than rayon's
#[cfg(feature = "rayon")]
const PARALLEL_SORT_THRESHOLD: usize = 1 << 14;

/// Merge staged records into `existing` storage (if any)
///
/// Values at identical coordinates, whether staged or already stored, are
/// summed. Integer sums wrap on overflow.
pub(crate) fn pack_records<T: Element>(
    dims: &[usize],
    format: &Format,
    existing: Option<&TensorStorage>,
    coords: &[i32],
    values: &[T],
) -> Result<TensorStorage> {
    let order = dims.len();
    let (mut all_coords, mut all_values) = match existing {
        Some(storage) if storage.nnz() > 0 => {
            let stored = storage.values().as_slice::<T>()?;
            let mut c = Vec::with_capacity(stored.len() * order + coords.len());
            let mut v = Vec::with_capacity(stored.len() + values.len());
            storage.for_each_position(|coordinate, q| {
                c.extend_from_slice(coordinate);
                v.push(stored[q]);
            });
            (c, v)
        }
        _ => (Vec::new(), Vec::new()),
    };
    all_coords.extend_from_slice(coords);
    all_values.extend_from_slice(values);
    Ok(build_storage(dims, format, &all_coords, &all_values))
}

/// Build storage for `format` from unordered records
pub(crate) fn build_storage<T: Element>(
    dims: &[usize],
    format: &Format,
    coords: &[i32],
    values: &[T],
) -> TensorStorage {
    let order = dims.len();
    let n = values.len();
    debug_assert_eq!(coords.len(), n * order);

    // Level-ordered copy of every coordinate
    let ordering = format.ordering();
    let mut level_coords = vec![0i32; n * order];
    for r in 0..n {
        for (l, &mode) in ordering.iter().enumerate() {
            level_coords[r * order + l] = coords[r * order + mode];
        }
    }
    let key = |r: usize| &level_coords[r * order..(r + 1) * order];

    let mut perm: Vec<usize> = (0..n).collect();
    sort_stable(&mut perm, |&a, &b| key(a).cmp(key(b)));

    // Sum duplicates in insertion order
    let mut unique: Vec<usize> = Vec::with_capacity(n);
    let mut sums: Vec<T> = Vec::with_capacity(n);
    for &r in &perm {
        let duplicate = unique.last().is_some_and(|&last| key(last) == key(r));
        match sums.last_mut() {
            Some(acc) if duplicate => *acc = acc.wrapping_add(values[r]),
            _ => {
                unique.push(r);
                sums.push(values[r]);
            }
        }
    }

    let level_dims = format.level_dims(dims);
    let mut parents = vec![0usize; unique.len()];
    let mut positions = 1usize;
    let mut index = Vec::with_capacity(order);

    for (l, mode) in format.modes().iter().enumerate() {
        let size = level_dims[l];
        match mode {
            ModeFormat::Dense => {
                for (parent, &r) in parents.iter_mut().zip(&unique) {
                    *parent = *parent * size + key(r)[l] as usize;
                }
                positions *= size;
                index.push(ModeIndex::Dense { size });
            }
            ModeFormat::Compressed => {
                let mut pos = vec![0i32; positions + 1];
                let mut crd: Vec<i32> = Vec::with_capacity(unique.len());
                let mut previous: Option<(usize, i32)> = None;
                for (parent, &r) in parents.iter_mut().zip(&unique) {
                    let c = key(r)[l];
                    if previous != Some((*parent, c)) {
                        previous = Some((*parent, c));
                        pos[*parent + 1] += 1;
                        crd.push(c);
                    }
                    *parent = crd.len() - 1;
                }
                for p in 1..pos.len() {
                    pos[p] += pos[p - 1];
                }
                positions = crd.len();
                index.push(ModeIndex::Compressed {
                    pos: Array::from_vec(pos),
                    crd: Array::from_vec(crd),
                });
            }
        }
    }

    let mut vals = vec![T::zero(); positions];
    for (&q, &v) in parents.iter().zip(&sums) {
        vals[q] = v;
    }

    TensorStorage {
        dims: dims.to_vec(),
        dtype: T::DTYPE,
        format: format.clone(),
        index,
        values: Array::from_vec(vals),
    }
}

fn sort_stable<F>(perm: &mut [usize], compare: F)
where
    F: Fn(&usize, &usize) -> std::cmp::Ordering + Sync,
{
    #[cfg(feature = "rayon")]
    if perm.len() >= PARALLEL_SORT_THRESHOLD {
        perm.par_sort_by(compare);
        return;
    }
    perm.sort_by(compare);
}
