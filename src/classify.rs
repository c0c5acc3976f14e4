//! Stage 1: voxel classification.

use rayon::prelude::*;

use crate::{
    field::ScalarField,
    tables::NUM_VERTS_TABLE,
    types::Value,
};

/// Computes the marching cubes configuration index for a voxel.
///
/// Each of the 8 corners maps to one bit. A bit is set when the corner's value
/// is **strictly below** the isovalue:
///
/// ```text
/// corner index:  7  6  5  4  3  2  1  0
/// config bits:  [_][_][_][_][_][_][_][_]
///                                      ^-- corner 0 below τ?
/// ```
#[inline]
pub fn config_index(corner_values: &[Value; 8], iso_value: Value) -> usize {
    corner_values
        .iter()
        .enumerate()
        .fold(0, |config, (i, &v)| config | (usize::from(v < iso_value) << i))
}

/// Configuration index of voxel `voxel`, sampling its corners with wraparound.
#[inline]
pub fn classify_voxel(field: &ScalarField, voxel: u32, iso_value: Value) -> usize {
    let base = field.grid().coords(voxel);
    config_index(&field.corner_values(base), iso_value)
}

/// Writes every voxel's vertex count and occupancy flag (0 or 1).
///
/// One independent work item per voxel; both slices must hold exactly one entry
/// per voxel of the field's grid.
pub fn classify_voxels(
    field: &ScalarField,
    iso_value: Value,
    voxel_verts: &mut [u32],
    voxel_occupied: &mut [u32],
) {
    debug_assert_eq!(voxel_verts.len(), field.grid().num_voxels());
    debug_assert_eq!(voxel_occupied.len(), voxel_verts.len());

    voxel_verts
        .par_iter_mut()
        .zip(voxel_occupied.par_iter_mut())
        .enumerate()
        .for_each(|(voxel, (verts, occupied))| {
            let config = classify_voxel(field, voxel as u32, iso_value);
            *verts = NUM_VERTS_TABLE[config] as u32;
            *occupied = u32::from(*verts > 0);
        });
}
