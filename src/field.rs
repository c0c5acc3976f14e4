use std::{fs, path::Path};

use ndarray::Array3;

use crate::{
    error::{MarchingCubesError, Result},
    tables::CORNER_OFFSETS,
    types::{GridSize, Value, Vector},
};

/// Volume file read when none is given on the command line.
pub const DEFAULT_VOLUME_FILE: &str = "Bucky.raw";

/// A read-only volume of 8-bit density samples.
///
/// Samples are stored as `values[[z, y, x]]` in standard layout, so the backing
/// slice is addressed exactly like a voxel index: `x + y·X + z·X·Y`.
///
/// Every accessor wraps its coordinates onto the grid (`coord & mask`), which makes
/// the field periodic. A voxel on the last layer therefore reads its `+1` corners
/// from layer `0`.
#[derive(Debug, Clone)]
pub struct ScalarField {
    grid: GridSize,
    values: Array3<u8>,
}

impl ScalarField {
    /// Wraps a raw `X × Y × Z` byte buffer.
    ///
    /// Returns [`MarchingCubesError::Input`] if the buffer length doesn't match the grid.
    pub fn from_raw(grid: GridSize, bytes: Vec<u8>) -> Result<Self> {
        let [dx, dy, dz] = grid.dims().map(|d| d as usize);
        let len = bytes.len();
        let values = Array3::from_shape_vec((dz, dy, dx), bytes).map_err(|_| {
            MarchingCubesError::Input(format!(
                "volume holds {len} bytes but a {dx}x{dy}x{dz} grid needs {}",
                dx * dy * dz
            ))
        })?;
        Ok(Self { grid, values })
    }

    /// Loads a raw 8-bit volume from disk.
    pub fn load(path: impl AsRef<Path>, grid: GridSize) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            MarchingCubesError::Input(format!("could not read volume '{}': {e}", path.display()))
        })?;
        tracing::info!("read '{}', {} bytes", path.display(), bytes.len());
        Self::from_raw(grid, bytes)
    }

    /// Builds a field by evaluating `f(x, y, z)` at every sample.
    pub fn from_fn<F>(grid: GridSize, f: F) -> Self
    where
        F: Fn(u32, u32, u32) -> u8,
    {
        let [dx, dy, dz] = grid.dims().map(|d| d as usize);
        let values =
            Array3::from_shape_fn((dz, dy, dx), |(z, y, x)| f(x as u32, y as u32, z as u32));
        Self { grid, values }
    }

    /// A field holding `value` everywhere.
    pub fn constant(grid: GridSize, value: u8) -> Self {
        Self::from_fn(grid, |_, _, _| value)
    }

    /// A solid ball centred in the grid.
    ///
    /// Density is 255 at the centre and falls off linearly to 0 at `radius` voxels,
    /// so isovalue `τ` yields a sphere of radius `(1 - τ) · radius`.
    pub fn sphere(grid: GridSize, radius: f32) -> Self {
        let center = grid.dims().map(|d| d as f32 / 2.0);
        Self::from_fn(grid, |x, y, z| {
            let d = Vector::new(
                x as f32 - center[0],
                y as f32 - center[1],
                z as f32 - center[2],
            )
            .norm();
            ((1.0 - d / radius).clamp(0.0, 1.0) * 255.0).round() as u8
        })
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Raw samples in voxel-index order.
    pub fn as_slice(&self) -> &[u8] {
        // Built through `from_shape_vec`/`from_shape_fn`, both standard layout.
        self.values.as_slice().unwrap_or(&[])
    }

    /// Raw byte at `(x, y, z)`, wrapped onto the grid.
    #[inline]
    pub fn raw(&self, x: u32, y: u32, z: u32) -> u8 {
        let [mx, my, mz] = self.grid.mask();
        self.values[[(z & mz) as usize, (y & my) as usize, (x & mx) as usize]]
    }

    /// Normalized density at `(x, y, z)`, wrapped onto the grid.
    #[inline]
    pub fn sample(&self, x: u32, y: u32, z: u32) -> Value {
        self.raw(x, y, z) as Value / 255.0
    }

    /// Densities at the 8 corners of the voxel whose base corner is `base`.
    #[inline]
    pub fn corner_values(&self, base: [u32; 3]) -> [Value; 8] {
        CORNER_OFFSETS.map(|[ox, oy, oz]| self.sample(base[0] + ox, base[1] + oy, base[2] + oz))
    }

    /// Central-difference gradient of the normalized density at a sample.
    ///
    /// Neighbours wrap like every other access, so `x - 1` at `x = 0` reads `X - 1`.
    #[inline]
    pub fn gradient(&self, x: u32, y: u32, z: u32) -> Vector {
        Vector::new(
            self.sample(x.wrapping_add(1), y, z) - self.sample(x.wrapping_sub(1), y, z),
            self.sample(x, y.wrapping_add(1), z) - self.sample(x, y.wrapping_sub(1), z),
            self.sample(x, y, z.wrapping_add(1)) - self.sample(x, y, z.wrapping_sub(1)),
        ) * 0.5
    }
}
