//! Stage 3: stream compaction of occupied voxels.

use rayon::prelude::*;

use crate::scan::{scan_total, split_at_bounds};

/// Voxels handled by one compaction work item.
pub const COMPACT_BLOCK: usize = 1 << 12;

/// Scatters every occupied voxel index `v` to `compacted[voxel_occupied_scan[v]]`.
///
/// `compacted` must hold exactly the number of occupied voxels. The result lists
/// them in ascending order since the scan only increases past an occupied voxel.
///
/// # Panics
/// Panics if `compacted` is not sized to the occupancy total.
pub fn compact_voxels(voxel_occupied: &[u32], voxel_occupied_scan: &[u32], compacted: &mut [u32]) {
    let num_voxels = voxel_occupied.len();
    assert_eq!(voxel_occupied_scan.len(), num_voxels);
    assert_eq!(
        compacted.len(),
        scan_total(voxel_occupied, voxel_occupied_scan) as usize,
        "compacted buffer must match the number of occupied voxels"
    );

    let mut bounds: Vec<usize> = (0..num_voxels)
        .step_by(COMPACT_BLOCK)
        .map(|start| voxel_occupied_scan[start] as usize)
        .collect();
    bounds.push(compacted.len());

    split_at_bounds(compacted, &bounds)
        .into_par_iter()
        .enumerate()
        .for_each(|(block, out)| {
            let start = block * COMPACT_BLOCK;
            let end = (start + COMPACT_BLOCK).min(num_voxels);
            let base = bounds[block];
            for voxel in start..end {
                if voxel_occupied[voxel] != 0 {
                    out[voxel_occupied_scan[voxel] as usize - base] = voxel as u32;
                }
            }
        });
}
