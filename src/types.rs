use nalgebra::{Point3, Vector3};

use crate::error::{MarchingCubesError, Result};

/// Normalized scalar field value (`sample / 255`).
pub type Value = f32;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// Largest total exponent `log2(X) + log2(Y) + log2(Z)`.
///
/// Keeps `voxels × 15` inside `u32`, which is what every scan array stores.
pub const MAX_TOTAL_LOG2: u32 = 28;

/// Power-of-two grid dimensions.
///
/// Voxel `v` lives at `(x, y, z)` with `v = x + y·X + z·X·Y`. Because each axis
/// is a power of two the mapping is pure shifting and masking, which is also what
/// gives corner sampling its toroidal wraparound: `(coord + 1) & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    log2: [u32; 3],
}

impl Default for GridSize {
    fn default() -> Self {
        Self { log2: [5, 5, 5] }
    }
}

impl GridSize {
    /// Creates a grid of `2^x × 2^y × 2^z` voxels.
    pub fn new(log2_x: u32, log2_y: u32, log2_z: u32) -> Result<Self> {
        let log2 = [log2_x, log2_y, log2_z];
        if log2.contains(&0) {
            return Err(MarchingCubesError::Configuration(format!(
                "grid exponents must be at least 1, got {log2:?}"
            )));
        }
        let total: u32 = log2.iter().sum();
        if total > MAX_TOTAL_LOG2 {
            return Err(MarchingCubesError::Configuration(format!(
                "grid 2^{total} voxels exceeds the 2^{MAX_TOTAL_LOG2} limit"
            )));
        }
        Ok(Self { log2 })
    }

    /// Creates a cubic grid of `2^n` voxels per axis.
    pub fn uniform(n: u32) -> Result<Self> {
        Self::new(n, n, n)
    }

    pub fn log2(&self) -> [u32; 3] {
        self.log2
    }

    /// Samples per axis.
    pub fn dims(&self) -> [u32; 3] {
        self.log2.map(|n| 1 << n)
    }

    pub fn mask(&self) -> [u32; 3] {
        self.dims().map(|d| d - 1)
    }

    /// Bit offset of each axis inside a linear voxel index.
    pub fn shift(&self) -> [u32; 3] {
        [0, self.log2[0], self.log2[0] + self.log2[1]]
    }

    pub fn num_voxels(&self) -> usize {
        1 << self.log2.iter().sum::<u32>()
    }

    /// Inverse of [`index`](GridSize::index).
    #[inline]
    pub fn coords(&self, voxel: u32) -> [u32; 3] {
        let shift = self.shift();
        let mask = self.mask();
        [
            (voxel >> shift[0]) & mask[0],
            (voxel >> shift[1]) & mask[1],
            (voxel >> shift[2]) & mask[2],
        ]
    }

    /// Linear index of `(x, y, z)`, wrapping every coordinate onto the torus.
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let shift = self.shift();
        let mask = self.mask();
        (((x & mask[0]) << shift[0]) | ((y & mask[1]) << shift[1]) | ((z & mask[2]) << shift[2]))
            as usize
    }
}

/// One output vertex: interpolated position and unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point,
    pub normal: Vector,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_invert_index() {
        let grid = GridSize::new(3, 2, 4).unwrap();
        assert_eq!(grid.dims(), [8, 4, 16]);
        assert_eq!(grid.num_voxels(), 512);
        for v in 0..grid.num_voxels() as u32 {
            let [x, y, z] = grid.coords(v);
            assert_eq!(grid.index(x, y, z), v as usize);
            assert_eq!(v as usize, (x + y * 8 + z * 8 * 4) as usize);
        }
    }

    #[test]
    fn index_wraps_at_the_boundary() {
        let grid = GridSize::uniform(2).unwrap();
        assert_eq!(grid.index(4, 0, 0), grid.index(0, 0, 0));
        assert_eq!(grid.index(3 + 1, 3 + 1, 3 + 1), 0);
        assert_eq!(grid.index(u32::MAX, 0, 0), grid.index(3, 0, 0));
    }

    #[test]
    fn rejects_bad_exponents() {
        assert!(GridSize::new(0, 5, 5).is_err());
        assert!(GridSize::new(10, 10, 9).is_err());
        assert!(GridSize::new(10, 10, 8).is_ok());
    }
}
