use crate::{
    error::{MarchingCubesError, Result},
    types::{GridSize, Point, Value, Vector},
};

/// Isovalue used when none is configured.
pub const DEFAULT_ISO_VALUE: Value = 0.2;

/// Increment applied by [`ExtractionConfig::raise_iso_value`] and
/// [`ExtractionConfig::lower_iso_value`].
pub const ISO_VALUE_STEP: Value = 0.005;

/// Default vertex capacity per `(x, y)` column of the grid.
pub const VERTS_PER_COLUMN: usize = 100;

/// Default vertex capacity for a grid: `X · Y · 100`.
pub fn default_max_verts(grid: GridSize) -> usize {
    let [x, y, _] = grid.dims();
    x as usize * y as usize * VERTS_PER_COLUMN
}

/// Maps grid coordinates to output positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Position of sample `(0, 0, 0)`.
    pub origin: Point,
    /// World-space extent of one voxel along each axis.
    pub voxel_size: Vector,
}

impl Placement {
    /// Stretches the grid over `[-1, 1]³`.
    pub fn unit_cube(grid: GridSize) -> Self {
        let [x, y, z] = grid.dims();
        Self {
            origin: Point::new(-1.0, -1.0, -1.0),
            voxel_size: Vector::new(2.0 / x as Value, 2.0 / y as Value, 2.0 / z as Value),
        }
    }

    /// Position of an unwrapped grid coordinate.
    ///
    /// Coordinates one past the last layer stay past it: wraparound only applies
    /// to density sampling.
    #[inline]
    pub fn position(&self, [x, y, z]: [u32; 3]) -> Point {
        self.origin + Vector::new(x as Value, y as Value, z as Value).component_mul(&self.voxel_size)
    }
}

/// Parameters of one extraction run.
///
/// ```rust,ignore
/// let config = ExtractionConfig::new(GridSize::uniform(6)?)
///     .with_iso_value(0.35)
///     .with_skip_empty_voxels(false);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub grid: GridSize,
    /// Corners with normalized density strictly below this are "inside".
    pub iso_value: Value,
    /// Compact occupied voxels before generating triangles.
    ///
    /// Both paths produce identical buffers; compaction only saves generator work
    /// on sparse surfaces.
    pub skip_empty_voxels: bool,
    /// Capacity of the output vertex buffers.
    pub max_verts: usize,
    pub placement: Placement,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::new(GridSize::default())
    }
}

impl ExtractionConfig {
    /// Default settings for `grid`: isovalue 0.2, compaction on,
    /// [`default_max_verts`] capacity, grid spanning `[-1, 1]³`.
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            iso_value: DEFAULT_ISO_VALUE,
            skip_empty_voxels: true,
            max_verts: default_max_verts(grid),
            placement: Placement::unit_cube(grid),
        }
    }

    pub fn with_iso_value(mut self, iso_value: Value) -> Self {
        self.iso_value = iso_value;
        self
    }

    pub fn with_skip_empty_voxels(mut self, skip: bool) -> Self {
        self.skip_empty_voxels = skip;
        self
    }

    pub fn with_max_verts(mut self, max_verts: usize) -> Self {
        self.max_verts = max_verts;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn raise_iso_value(&mut self) {
        self.iso_value += ISO_VALUE_STEP;
    }

    pub fn lower_iso_value(&mut self) {
        self.iso_value -= ISO_VALUE_STEP;
    }

    pub fn num_voxels(&self) -> usize {
        self.grid.num_voxels()
    }

    /// Rejects settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if !self.iso_value.is_finite() {
            return Err(MarchingCubesError::Configuration(format!(
                "isovalue must be finite, got {}",
                self.iso_value
            )));
        }
        if self.max_verts == 0 {
            return Err(MarchingCubesError::Configuration(
                "vertex capacity must be non-zero".into(),
            ));
        }
        if self.max_verts > u32::MAX as usize {
            return Err(MarchingCubesError::Configuration(format!(
                "vertex capacity {} does not fit 32-bit slot offsets",
                self.max_verts
            )));
        }
        let p = &self.placement;
        let finite_origin = p.origin.coords.iter().all(|c| c.is_finite());
        let positive_size = p.voxel_size.iter().all(|s| s.is_finite() && *s > 0.0);
        if !(finite_origin && positive_size) {
            return Err(MarchingCubesError::Configuration(format!(
                "invalid placement {:?}",
                self.placement
            )));
        }
        Ok(())
    }
}
