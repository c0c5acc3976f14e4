//! Stage 4: triangle generation.
//!
//! Runs once per active voxel. Each voxel re-samples its corners, interpolates
//! the crossed edges and writes its vertices from slot `voxel_verts_scan[v]`
//! onwards, in the order [`TRI_TABLE`](crate::tables::TRI_TABLE) lists them.

use rayon::prelude::*;

use crate::{
    classify::config_index,
    config::Placement,
    field::ScalarField,
    interp::{EdgeVertex, vertex_interp},
    scan::split_at_bounds,
    tables::{CORNER_OFFSETS, CORNER_POINT_INDICES, EDGE_TABLE, triangle_edges},
    types::{Point, Value, Vector},
};

/// Active voxels handled by one generation work item.
pub const GENERATE_BLOCK: usize = 256;

/// The voxels the generator visits.
#[derive(Debug, Clone, Copy)]
pub enum ActiveVoxels<'a> {
    /// Ascending occupied voxel indices from the compaction stage.
    Compacted(&'a [u32]),
    /// Every voxel `0..n`; empty voxels simply emit nothing.
    All(usize),
}

impl ActiveVoxels<'_> {
    pub fn len(&self) -> usize {
        match self {
            ActiveVoxels::Compacted(voxels) => voxels.len(),
            ActiveVoxels::All(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Voxel index of work item `i`.
    #[inline]
    pub fn voxel(&self, i: usize) -> u32 {
        match self {
            ActiveVoxels::Compacted(voxels) => voxels[i],
            ActiveVoxels::All(_) => i as u32,
        }
    }
}

/// Writes the triangles of every active voxel into `positions` / `normals`.
///
/// Both buffers must be exactly `total_verts` long, the total of the vertex-count
/// scan. Returns the number of vertices that needed a degenerate-geometry fallback.
///
/// # Panics
/// Panics if the buffers are not sized to `total_verts`.
pub fn generate_triangles(
    field: &ScalarField,
    iso_value: Value,
    placement: &Placement,
    active: ActiveVoxels<'_>,
    voxel_verts_scan: &[u32],
    total_verts: usize,
    positions: &mut [Point],
    normals: &mut [Vector],
) -> usize {
    assert_eq!(positions.len(), total_verts, "position buffer must hold total_verts");
    assert_eq!(normals.len(), total_verts, "normal buffer must hold total_verts");

    let num_items = active.len();
    let mut bounds: Vec<usize> = (0..num_items)
        .step_by(GENERATE_BLOCK)
        .map(|start| voxel_verts_scan[active.voxel(start) as usize] as usize)
        .collect();
    bounds.push(total_verts);

    let position_blocks = split_at_bounds(positions, &bounds);
    let normal_blocks = split_at_bounds(normals, &bounds);

    position_blocks
        .into_par_iter()
        .zip(normal_blocks)
        .enumerate()
        .map(|(block, (positions, normals))| {
            let start = block * GENERATE_BLOCK;
            let end = (start + GENERATE_BLOCK).min(num_items);
            let base = bounds[block];
            let mut degenerate = 0;
            for i in start..end {
                let voxel = active.voxel(i);
                let slot = voxel_verts_scan[voxel as usize] as usize - base;
                degenerate += polygonise(
                    field,
                    iso_value,
                    placement,
                    voxel,
                    &mut positions[slot..],
                    &mut normals[slot..],
                );
            }
            degenerate
        })
        .sum()
}

/// Emits the vertices of one voxel into the front of `positions` / `normals`.
///
/// Returns how many of them were degenerate.
fn polygonise(
    field: &ScalarField,
    iso_value: Value,
    placement: &Placement,
    voxel: u32,
    positions: &mut [Point],
    normals: &mut [Vector],
) -> usize {
    let base = field.grid().coords(voxel);
    let values = field.corner_values(base);
    let config = config_index(&values, iso_value);
    let edges_mask = EDGE_TABLE[config];
    if edges_mask == 0 {
        return 0;
    }

    let corners = CORNER_OFFSETS.map(|[ox, oy, oz]| [base[0] + ox, base[1] + oy, base[2] + oz]);
    let corner_positions = corners.map(|c| placement.position(c));
    let corner_gradients = corners.map(|[x, y, z]| field.gradient(x, y, z));

    // Each crossed edge is interpolated once, the first time a triangle uses it.
    let mut vert_list: [Option<EdgeVertex>; 12] = [None; 12];
    let mut degenerate = 0;
    for (local, edge) in triangle_edges(config).enumerate() {
        debug_assert!(edges_mask & (1 << edge) != 0, "config {config} uses uncrossed edge {edge}");
        let EdgeVertex { vertex, degenerate: fallback } = *vert_list[edge].get_or_insert_with(|| {
            let [a, b] = CORNER_POINT_INDICES[edge];
            vertex_interp(
                iso_value,
                &corner_positions[a],
                &corner_positions[b],
                values[a],
                values[b],
                &corner_gradients[a],
                &corner_gradients[b],
            )
        });
        positions[local] = vertex.position;
        normals[local] = vertex.normal;
        degenerate += usize::from(fallback);
    }
    degenerate
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        classify::classify_voxels,
        compact::compact_voxels,
        scan::exclusive_scan,
        tables::{MAX_VERTS_PER_VOXEL, NUM_VERTS_TABLE},
        types::GridSize,
    };

    struct Scratch {
        verts: Vec<u32>,
        verts_scan: Vec<u32>,
        compacted: Vec<u32>,
        total_verts: usize,
    }

    fn prepare(field: &ScalarField, iso: Value) -> Scratch {
        let n = field.grid().num_voxels();
        let mut verts = vec![0; n];
        let mut occupied = vec![0; n];
        classify_voxels(field, iso, &mut verts, &mut occupied);
        let mut occupied_scan = vec![0; n];
        let active = exclusive_scan(&occupied, &mut occupied_scan);
        let mut compacted = vec![0; active as usize];
        compact_voxels(&occupied, &occupied_scan, &mut compacted);
        let mut verts_scan = vec![0; n];
        let total_verts = exclusive_scan(&verts, &mut verts_scan) as usize;
        Scratch {
            verts,
            verts_scan,
            compacted,
            total_verts,
        }
    }

    fn run(field: &ScalarField, s: &Scratch, active: ActiveVoxels<'_>) -> (Vec<Point>, Vec<Vector>) {
        let nan = Value::NAN;
        let mut positions = vec![Point::new(nan, nan, nan); s.total_verts];
        let mut normals = vec![Vector::repeat(nan); s.total_verts];
        let placement = Placement::unit_cube(field.grid());
        generate_triangles(
            field,
            0.2,
            &placement,
            active,
            &s.verts_scan,
            s.total_verts,
            &mut positions,
            &mut normals,
        );
        (positions, normals)
    }

    #[test]
    fn every_slot_is_written_inside_its_voxel() {
        let field = ScalarField::sphere(GridSize::uniform(4).unwrap(), 6.0);
        let s = prepare(&field, 0.2);
        assert!(s.total_verts > 0);

        let (positions, normals) = run(&field, &s, ActiveVoxels::Compacted(&s.compacted));
        assert!(positions.iter().all(|p| p.coords.iter().all(|c| c.is_finite())));
        for n in &normals {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
        }

        let placement = Placement::unit_cube(field.grid());
        for &voxel in &s.compacted {
            let lo = placement.position(field.grid().coords(voxel));
            let hi = lo + placement.voxel_size;
            let start = s.verts_scan[voxel as usize] as usize;
            for p in &positions[start..start + s.verts[voxel as usize] as usize] {
                for axis in 0..3 {
                    assert!(p[axis] >= lo[axis] - 1e-5 && p[axis] <= hi[axis] + 1e-5);
                }
            }
        }
    }

    #[test]
    fn compacted_and_full_passes_agree() {
        let field = ScalarField::sphere(GridSize::new(4, 3, 4).unwrap(), 5.0);
        let s = prepare(&field, 0.2);
        let compacted = run(&field, &s, ActiveVoxels::Compacted(&s.compacted));
        let full = run(&field, &s, ActiveVoxels::All(field.grid().num_voxels()));
        assert_eq!(compacted, full);
    }

    #[test]
    fn single_corner_emits_one_triangle() {
        let grid = GridSize::uniform(1).unwrap();
        let field = ScalarField::from_fn(grid, |x, y, z| if x + y + z == 0 { 0 } else { 255 });
        let s = prepare(&field, 0.2);
        assert_eq!(s.total_verts, 8 * 3);

        let (positions, _) = run(&field, &s, ActiveVoxels::Compacted(&s.compacted));
        // Voxel 0, configuration 1: edges 0, 8, 3 cross at t = 0.2 from corner 0.
        let step = 0.2 * 1.0;
        assert_relative_eq!(positions[0], Point::new(-1.0 + step, -1.0, -1.0), epsilon = 1e-6);
        assert_relative_eq!(positions[1], Point::new(-1.0, -1.0, -1.0 + step), epsilon = 1e-6);
        assert_relative_eq!(positions[2], Point::new(-1.0, -1.0 + step, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn empty_active_set_writes_nothing() {
        let field = ScalarField::constant(GridSize::uniform(2).unwrap(), 0);
        let placement = Placement::unit_cube(field.grid());
        let degenerate = generate_triangles(
            &field,
            0.2,
            &placement,
            ActiveVoxels::Compacted(&[]),
            &[0; 64],
            0,
            &mut [],
            &mut [],
        );
        assert_eq!(degenerate, 0);
    }

    #[test]
    fn each_configuration_fills_exactly_its_row() {
        let grid = GridSize::uniform(1).unwrap();
        let placement = Placement::unit_cube(grid);
        let nan = Value::NAN;
        for config in 0..256usize {
            // In a 2x2x2 grid voxel 0 owns all eight samples, one per corner.
            let field = ScalarField::from_fn(grid, |x, y, z| {
                let corner = CORNER_OFFSETS.iter().position(|&o| o == [x, y, z]).unwrap();
                if config & (1 << corner) != 0 { 0 } else { 255 }
            });
            let mut positions = [Point::new(nan, nan, nan); MAX_VERTS_PER_VOXEL + 1];
            let mut normals = [Vector::repeat(nan); MAX_VERTS_PER_VOXEL + 1];
            let degenerate = polygonise(&field, 0.2, &placement, 0, &mut positions, &mut normals);

            let n = NUM_VERTS_TABLE[config] as usize;
            for (p, edge) in positions.iter().zip(triangle_edges(config)) {
                let [a, b] = CORNER_POINT_INDICES[edge];
                let (pa, pb) = (
                    placement.position(CORNER_OFFSETS[a]),
                    placement.position(CORNER_OFFSETS[b]),
                );
                // Crossings sit 0.2 of the way from the low corner to the high one.
                let (lo, hi) = if config & (1 << a) != 0 { (pa, pb) } else { (pb, pa) };
                assert_relative_eq!(*p, lo + (hi - lo) * 0.2, epsilon = 1e-6);
            }
            assert!(positions[n..].iter().all(|p| p.x.is_nan()), "config {config}");
            // Neighbours wrap onto the same sample on a 2-wide grid, so every
            // gradient vanishes and each emitted normal takes the +Z fallback.
            assert_eq!(degenerate, n, "config {config}");
            assert!(normals[..n].iter().all(|v| *v == Vector::z()));
            assert!(normals[n..].iter().all(|v| v.x.is_nan()));
        }
    }
}
