//! Extraction pipeline state and stage orchestration.
//!
//! ```text
//! classify_voxels   →  voxel_verts, voxel_occupied
//! exclusive_scan    →  voxel_occupied_scan   → active_voxels   (0: stop here)
//! compact_voxels    →  compacted_voxels                        (skip_empty_voxels only)
//! exclusive_scan    →  voxel_verts_scan      → total_verts     (> max_verts: Capacity)
//! generate_triangles → positions, normals
//! ```
//!
//! Every stage is a single blocking rayon call, so a stage only starts once the
//! previous one has finished writing.

use tracing::{debug, info, warn};

use crate::{
    classify::classify_voxels,
    compact::compact_voxels,
    config::ExtractionConfig,
    error::{MarchingCubesError, Result},
    field::ScalarField,
    generate::{ActiveVoxels, generate_triangles},
    mesh::Isosurface,
    scan::{exclusive_scan, scan_total},
    types::{Point, Value, Vector},
};

/// Scratch buffers longer than this are not dumped to the debug log.
const DEBUG_BUFFER_LIMIT: usize = 512;

/// Totals of the last successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Voxels that emit at least one vertex.
    pub active_voxels: usize,
    /// Valid entries in the position and normal buffers.
    pub total_verts: usize,
    /// Vertices that fell back to a midpoint or a `+Z` normal.
    pub degenerate_vertices: usize,
}

/// Owns every buffer of the extraction pipeline.
///
/// Scratch arrays are sized once from the grid and reused by every call to
/// [`compute_isosurface`](ExtractionContext::compute_isosurface); they carry no
/// meaning between runs. A failed run clears the summary, so the output accessors
/// never expose a partial result.
#[derive(Debug)]
pub struct ExtractionContext {
    config: ExtractionConfig,
    voxel_verts: Vec<u32>,
    voxel_verts_scan: Vec<u32>,
    voxel_occupied: Vec<u32>,
    voxel_occupied_scan: Vec<u32>,
    compacted_voxels: Vec<u32>,
    positions: Vec<Point>,
    normals: Vec<Vector>,
    summary: ExtractionSummary,
}

impl ExtractionContext {
    /// Validates `config` and allocates the per-voxel scratch arrays.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        let num_voxels = config.num_voxels();
        let [x, y, z] = config.grid.dims();
        info!("grid: {x} x {y} x {z} = {num_voxels} voxels");
        info!("max verts = {}", config.max_verts);
        Ok(Self {
            config,
            voxel_verts: vec![0; num_voxels],
            voxel_verts_scan: vec![0; num_voxels],
            voxel_occupied: vec![0; num_voxels],
            voxel_occupied_scan: vec![0; num_voxels],
            compacted_voxels: Vec::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            summary: ExtractionSummary::default(),
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Changes the isovalue used by the next run.
    pub fn set_iso_value(&mut self, iso_value: Value) -> Result<()> {
        let config = self.config.clone().with_iso_value(iso_value);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Switches between the compacted and the full generation pass.
    pub fn set_skip_empty_voxels(&mut self, skip: bool) {
        self.config.skip_empty_voxels = skip;
    }

    /// Runs the whole pipeline over `field`.
    ///
    /// Fails with [`MarchingCubesError::Input`] if the field's grid differs from the
    /// configured one, and with [`MarchingCubesError::Capacity`] if the surface
    /// needs more than `max_verts` vertices. Both are detected before any vertex is
    /// written.
    pub fn compute_isosurface(&mut self, field: &ScalarField) -> Result<ExtractionSummary> {
        self.summary = ExtractionSummary::default();
        match self.run(field) {
            Ok(summary) => {
                self.summary = summary;
                Ok(summary)
            }
            Err(e) => {
                self.compacted_voxels.clear();
                self.positions.clear();
                self.normals.clear();
                Err(e)
            }
        }
    }

    fn run(&mut self, field: &ScalarField) -> Result<ExtractionSummary> {
        if field.grid() != self.config.grid {
            return Err(MarchingCubesError::Input(format!(
                "volume is {:?} but the pipeline was configured for {:?}",
                field.grid().dims(),
                self.config.grid.dims()
            )));
        }

        let num_voxels = self.config.num_voxels();
        let iso_value = self.config.iso_value;
        let _span = tracing::info_span!("compute_isosurface", num_voxels, iso_value).entered();

        classify_voxels(field, iso_value, &mut self.voxel_verts, &mut self.voxel_occupied);
        debug_buffer("voxel_verts", &self.voxel_verts);

        exclusive_scan(&self.voxel_occupied, &mut self.voxel_occupied_scan);
        debug_buffer("voxel_occupied_scan", &self.voxel_occupied_scan);
        let active_voxels = scan_total(&self.voxel_occupied, &self.voxel_occupied_scan) as usize;
        debug!(active_voxels, "classified voxels");

        if active_voxels == 0 {
            self.compacted_voxels.clear();
            self.positions.clear();
            self.normals.clear();
            return Ok(ExtractionSummary::default());
        }

        if self.config.skip_empty_voxels {
            self.compacted_voxels.clear();
            self.compacted_voxels.resize(active_voxels, 0);
            compact_voxels(
                &self.voxel_occupied,
                &self.voxel_occupied_scan,
                &mut self.compacted_voxels,
            );
            debug_buffer("compacted_voxels", &self.compacted_voxels);
        } else {
            self.compacted_voxels.clear();
        }

        exclusive_scan(&self.voxel_verts, &mut self.voxel_verts_scan);
        debug_buffer("voxel_verts_scan", &self.voxel_verts_scan);
        let total_verts = scan_total(&self.voxel_verts, &self.voxel_verts_scan) as usize;
        debug!(total_verts, "scanned vertex counts");

        if total_verts > self.config.max_verts {
            return Err(MarchingCubesError::capacity(total_verts, self.config.max_verts));
        }

        self.positions.resize(total_verts, Point::origin());
        self.normals.resize(total_verts, Vector::zeros());

        let active = if self.config.skip_empty_voxels {
            ActiveVoxels::Compacted(&self.compacted_voxels)
        } else {
            ActiveVoxels::All(num_voxels)
        };
        let degenerate_vertices = generate_triangles(
            field,
            iso_value,
            &self.config.placement,
            active,
            &self.voxel_verts_scan,
            total_verts,
            &mut self.positions,
            &mut self.normals,
        );
        if degenerate_vertices > 0 {
            warn!("{degenerate_vertices} vertices used a degenerate-geometry fallback");
        }

        Ok(ExtractionSummary {
            active_voxels,
            total_verts,
            degenerate_vertices,
        })
    }

    pub fn summary(&self) -> ExtractionSummary {
        self.summary
    }

    pub fn active_voxels(&self) -> usize {
        self.summary.active_voxels
    }

    pub fn total_verts(&self) -> usize {
        self.summary.total_verts
    }

    /// Vertex positions of the last successful run.
    pub fn positions(&self) -> &[Point] {
        &self.positions[..self.summary.total_verts]
    }

    /// Vertex normals of the last successful run, parallel to [`positions`](Self::positions).
    pub fn normals(&self) -> &[Vector] {
        &self.normals[..self.summary.total_verts]
    }

    /// Occupied voxel indices in ascending order.
    ///
    /// Empty when compaction is disabled.
    pub fn compacted_voxels(&self) -> &[u32] {
        if self.config.skip_empty_voxels {
            &self.compacted_voxels[..self.summary.active_voxels.min(self.compacted_voxels.len())]
        } else {
            &[]
        }
    }

    /// Per-voxel vertex counts from the last classification.
    pub fn voxel_verts(&self) -> &[u32] {
        &self.voxel_verts
    }

    /// Exclusive scan of [`voxel_verts`](Self::voxel_verts): each voxel's first output slot.
    pub fn voxel_verts_scan(&self) -> &[u32] {
        &self.voxel_verts_scan
    }

    pub fn voxel_occupied(&self) -> &[u32] {
        &self.voxel_occupied
    }

    pub fn voxel_occupied_scan(&self) -> &[u32] {
        &self.voxel_occupied_scan
    }

    /// Copies the current output into an [`Isosurface`].
    pub fn isosurface(&self) -> Isosurface {
        Isosurface::from_buffers(self.positions(), self.normals())
    }
}

fn debug_buffer(name: &str, buffer: &[u32]) {
    if buffer.len() <= DEBUG_BUFFER_LIMIT {
        debug!("{name}: {buffer:?}");
    }
}
