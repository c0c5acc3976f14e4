use approx::assert_relative_eq;
use rand::{Rng, SeedableRng, rngs::StdRng};

use par_marching_cubes::{
    ExtractionConfig, ExtractionContext, GridSize, MarchingCubesError, Placement, Point,
    ScalarField, Value, Vector,
    compact::compact_voxels,
    interp::vertex_interp,
    scan::{exclusive_scan, exclusive_scan_serial},
    tables::{CORNER_OFFSETS, CORNER_POINT_INDICES, NUM_VERTS_TABLE, triangle_edges},
};

fn noise_field(grid: GridSize, seed: u64) -> ScalarField {
    let mut rng = StdRng::seed_from_u64(seed);
    let bytes = (0..grid.num_voxels()).map(|_| rng.r#gen::<u8>()).collect();
    ScalarField::from_raw(grid, bytes).unwrap()
}

fn extract(field: &ScalarField, config: ExtractionConfig) -> ExtractionContext {
    let mut ctx = ExtractionContext::new(config).unwrap();
    ctx.compute_isosurface(field).unwrap();
    ctx
}

fn vertex_bits(positions: &[Point], normals: &[Vector]) -> Vec<u32> {
    positions
        .iter()
        .flat_map(|p| p.coords.iter().copied())
        .chain(normals.iter().flat_map(|n| n.iter().copied()))
        .map(f32::to_bits)
        .collect()
}

fn bits(ctx: &ExtractionContext) -> Vec<u32> {
    vertex_bits(ctx.positions(), ctx.normals())
}

struct SerialSurface {
    active_voxels: usize,
    positions: Vec<Point>,
    normals: Vec<Vector>,
}

/// Single-threaded extraction: visits voxels in index order and appends the
/// vertices of every triangle-table row, no scans or slot arithmetic involved.
fn extract_serial(field: &ScalarField, iso_value: Value, placement: &Placement) -> SerialSurface {
    let grid = field.grid();
    let mut surface = SerialSurface {
        active_voxels: 0,
        positions: Vec::new(),
        normals: Vec::new(),
    };
    for voxel in 0..grid.num_voxels() as u32 {
        let [x, y, z] = grid.coords(voxel);
        let corners = CORNER_OFFSETS.map(|[ox, oy, oz]| [x + ox, y + oy, z + oz]);
        let values = corners.map(|[cx, cy, cz]| field.sample(cx, cy, cz));
        let config = (0..8)
            .filter(|&i| values[i] < iso_value)
            .fold(0, |config, i| config | (1 << i));

        let before = surface.positions.len();
        for edge in triangle_edges(config) {
            let [a, b] = CORNER_POINT_INDICES[edge];
            let [pa, pb] = [a, b].map(|c| placement.position(corners[c]));
            let [ga, gb] = [a, b].map(|c| {
                let [cx, cy, cz] = corners[c];
                field.gradient(cx, cy, cz)
            });
            let vertex = vertex_interp(iso_value, &pa, &pb, values[a], values[b], &ga, &gb).vertex;
            surface.positions.push(vertex.position);
            surface.normals.push(vertex.normal);
        }
        surface.active_voxels += usize::from(surface.positions.len() > before);
    }
    surface
}

#[test]
fn matches_a_serial_extraction() {
    // Grids past one scan block and past one generation block.
    let grids = [
        GridSize::uniform(1).unwrap(),
        GridSize::uniform(5).unwrap(),
        GridSize::new(6, 5, 4).unwrap(),
        GridSize::new(2, 7, 3).unwrap(),
    ];
    for (seed, grid) in grids.into_iter().enumerate() {
        let field = noise_field(grid, seed as u64);
        for iso_value in [-0.5, 0.0, 0.1, 0.2, 0.5, 0.99, 1.5] {
            let config = ExtractionConfig::new(grid)
                .with_iso_value(iso_value)
                .with_max_verts(grid.num_voxels() * 15);
            let expected = extract_serial(&field, iso_value, &config.placement);
            let expected_bits = vertex_bits(&expected.positions, &expected.normals);

            for skip_empty_voxels in [true, false] {
                let ctx = extract(&field, config.clone().with_skip_empty_voxels(skip_empty_voxels));
                let case = format!("{:?} iso {iso_value} skip {skip_empty_voxels}", grid.dims());
                assert_eq!(ctx.active_voxels(), expected.active_voxels, "{case}");
                assert_eq!(ctx.total_verts(), expected.positions.len(), "{case}");
                assert!(bits(&ctx) == expected_bits, "{case}");
            }
        }
    }
}

#[test]
fn repeated_runs_are_bit_identical() {
    let grid = GridSize::new(5, 4, 3).unwrap();
    let field = noise_field(grid, 7);
    let config = ExtractionConfig::new(grid).with_max_verts(grid.num_voxels() * 15);

    let first = extract(&field, config.clone());
    assert!(first.total_verts() > 0);
    for _ in 0..3 {
        let again = extract(&field, config.clone());
        assert_eq!(again.summary(), first.summary());
        assert_eq!(bits(&again), bits(&first));
    }
}

#[test]
fn compaction_does_not_change_the_output() {
    let grid = GridSize::uniform(4).unwrap();
    for seed in 0..4 {
        let field = noise_field(grid, seed);
        let config = ExtractionConfig::new(grid).with_max_verts(grid.num_voxels() * 15);
        let compacted = extract(&field, config.clone());
        let full = extract(&field, config.with_skip_empty_voxels(false));
        assert_eq!(compacted.total_verts(), full.total_verts());
        assert_eq!(bits(&compacted), bits(&full));
    }
}

#[test]
fn uniform_fields_produce_nothing() {
    let grid = GridSize::uniform(3).unwrap();
    for value in [0, 51, 52, 255] {
        let ctx = extract(&ScalarField::constant(grid, value), ExtractionConfig::new(grid));
        assert_eq!(ctx.active_voxels(), 0);
        assert_eq!(ctx.total_verts(), 0);
        assert!(ctx.compacted_voxels().is_empty());
        assert!(ctx.isosurface().is_empty());
    }
}

#[test]
fn one_low_corner_in_a_2x2x2_field() {
    let grid = GridSize::uniform(1).unwrap();
    let field = ScalarField::from_fn(grid, |x, y, z| if (x, y, z) == (0, 0, 0) { 0 } else { 255 });
    let ctx = extract(&field, ExtractionConfig::new(grid));

    // Every voxel sees sample (0, 0, 0) at one of its corners through wraparound.
    assert_eq!(ctx.active_voxels(), 8);
    assert_eq!(ctx.compacted_voxels(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(ctx.voxel_verts()[0], NUM_VERTS_TABLE[1] as u32);
    assert_eq!(ctx.total_verts(), 24);
    assert_eq!(ctx.isosurface().triangle_count(), 8);
}

#[test]
fn last_layer_wraps_to_the_first() {
    let grid = GridSize::uniform(3).unwrap();
    let field = ScalarField::from_fn(grid, |x, _, _| if x == 0 { 0 } else { 255 });
    let config = ExtractionConfig::new(grid);
    let size = config.placement.voxel_size.x;
    let ctx = extract(&field, config);

    // Two crossing sheets per row: one leaving x = 0, one re-entering it from x = 7.
    let [dx, dy, dz] = grid.dims();
    assert_eq!(ctx.active_voxels(), (2 * dy * dz) as usize);
    let last_layer_start = -1.0 + (dx - 1) as f32 * size;
    let wrapped = ctx
        .positions()
        .iter()
        .filter(|p| p.x > last_layer_start)
        .count();
    assert!(wrapped > 0);
    // Wrapped vertices sit past the last sample, on the far face of the domain.
    assert!(ctx.positions().iter().all(|p| p.x <= 1.0 + 1e-6));
}

#[test]
fn vertex_counts_and_slots_agree() {
    let grid = GridSize::new(4, 4, 3).unwrap();
    let field = noise_field(grid, 42);
    let config = ExtractionConfig::new(grid).with_max_verts(grid.num_voxels() * 15);
    let placement = config.placement;
    let ctx = extract(&field, config);

    let counted: u32 = ctx.voxel_verts().iter().sum();
    assert_eq!(counted as usize, ctx.total_verts());
    assert!(ctx.total_verts() % 3 == 0);

    let voxels = ctx.compacted_voxels();
    assert!(voxels.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(voxels.len(), ctx.active_voxels());

    // Consecutive active voxels own back-to-back slot ranges covering [0, total_verts).
    let mut next_slot = 0;
    for &voxel in voxels {
        let start = ctx.voxel_verts_scan()[voxel as usize] as usize;
        let count = ctx.voxel_verts()[voxel as usize] as usize;
        assert_eq!(start, next_slot);
        next_slot += count;

        let lo = placement.position(grid.coords(voxel));
        let hi = lo + placement.voxel_size;
        for p in &ctx.positions()[start..start + count] {
            for axis in 0..3 {
                assert!(p[axis] >= lo[axis] - 1e-5 && p[axis] <= hi[axis] + 1e-5);
            }
        }
        for n in &ctx.normals()[start..start + count] {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-4);
        }
    }
    assert_eq!(next_slot, ctx.total_verts());
}

#[test]
fn sphere_normals_point_up_the_density_gradient() {
    let grid = GridSize::uniform(5).unwrap();
    let field = ScalarField::sphere(grid, 12.0);
    let ctx = extract(&field, ExtractionConfig::new(grid));
    assert!(ctx.total_verts() > 0);

    // The sphere is centred on the world origin and densest there.
    for (p, n) in ctx.positions().iter().zip(ctx.normals()) {
        let to_center: Vector = Point::origin() - p;
        assert!(n.dot(&to_center.normalize()) > 0.8, "normal {n:?} at {p:?}");
    }

    // 0.2 keeps the surface at 0.8 of the 12-voxel falloff radius.
    let radius = 0.8 * 12.0 * ctx.config().placement.voxel_size.x;
    for p in ctx.positions() {
        assert_relative_eq!(p.coords.norm(), radius, epsilon = 0.02);
    }
}

#[test]
fn capacity_is_checked_before_any_output() {
    let grid = GridSize::uniform(4).unwrap();
    let field = ScalarField::sphere(grid, 6.0);
    let needed = extract(&field, ExtractionConfig::new(grid)).total_verts();

    let mut ctx = ExtractionContext::new(ExtractionConfig::new(grid).with_max_verts(needed)).unwrap();
    assert_eq!(ctx.compute_isosurface(&field).unwrap().total_verts, needed);

    let mut ctx =
        ExtractionContext::new(ExtractionConfig::new(grid).with_max_verts(needed - 1)).unwrap();
    let err = ctx.compute_isosurface(&field).unwrap_err();
    assert!(matches!(err, MarchingCubesError::Capacity { overflow: 1, .. }));
    assert!(err.to_string().contains("capacity"));
    assert_eq!(ctx.total_verts(), 0);
    assert!(ctx.positions().is_empty());
}

#[test]
fn invalid_configurations_are_rejected_up_front() {
    assert!(matches!(
        GridSize::new(5, 0, 5),
        Err(MarchingCubesError::Configuration(_))
    ));
    let grid = GridSize::uniform(3).unwrap();
    assert!(ExtractionContext::new(ExtractionConfig::new(grid).with_max_verts(0)).is_err());
    assert!(ExtractionContext::new(ExtractionConfig::new(grid).with_iso_value(f32::NAN)).is_err());
    assert!(matches!(
        ScalarField::from_raw(grid, vec![0; 100]),
        Err(MarchingCubesError::Input(_))
    ));
}

#[test]
fn scan_and_compaction_on_random_flags() {
    let mut rng = StdRng::seed_from_u64(3);
    for len in [0, 1, 2, 1000, (1 << 14) + 17, 3 * (1 << 14)] {
        let occupied: Vec<u32> = (0..len).map(|_| u32::from(rng.gen_bool(0.2))).collect();

        let mut scan = vec![0; len];
        let mut serial = vec![0; len];
        let active = exclusive_scan(&occupied, &mut scan);
        assert_eq!(exclusive_scan_serial(&occupied, &mut serial), active);
        assert_eq!(scan, serial);
        assert_eq!(active, occupied.iter().sum::<u32>());

        let mut compacted = vec![0; active as usize];
        compact_voxels(&occupied, &scan, &mut compacted);
        let expected: Vec<u32> = (0..len as u32).filter(|&v| occupied[v as usize] == 1).collect();
        assert_eq!(compacted, expected);
    }
}
