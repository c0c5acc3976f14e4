//! Binary dumps of the output buffers and tolerance comparison against a
//! reference dump.
//!
//! Positions and normals are written as packed little-endian `float4`s (`w = 1`
//! for positions, `w = 0` for normals); compacted voxel indices as `u32`s. Only
//! the `total_verts` (or `active_voxels`) valid entries are written.

use std::{fs, path::Path};

use bytemuck::{Pod, Zeroable};
use derive_more::Display;
use tracing::info;

use crate::{
    context::ExtractionContext,
    error::{MarchingCubesError, Result},
    types::{Point, Vector},
};

/// Largest per-element difference that still counts as a match.
pub const EPSILON: f32 = 5.0;

/// Largest fraction of mismatching elements a passing comparison may have.
pub const THRESHOLD: f32 = 0.30;

/// The buffer a dump serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DumpTarget {
    #[display("positions")]
    Position,
    #[display("normals")]
    Normal,
    #[display("compacted voxels")]
    Voxel,
}

impl DumpTarget {
    /// Parses the `--dump` code: 0 positions, 1 normals, 2 compacted voxels.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Position),
            1 => Ok(Self::Normal),
            2 => Ok(Self::Voxel),
            _ => Err(MarchingCubesError::Configuration(format!(
                "invalid dump code {code}: use 0 (positions), 1 (normals) or 2 (voxels)"
            ))),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Voxel => 2,
        }
    }

    /// Default output file name.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Position => "marchCube_posArray.bin",
            Self::Normal => "marchCube_normalArray.bin",
            Self::Voxel => "marchCube_compVoxelArray.bin",
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct Float4 {
    x: f32,
    y: f32,
    z: f32,
    w: f32,
}

impl Float4 {
    fn point(p: &Point) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            w: 1.0,
        }
    }

    fn vector(v: &Vector) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            w: 0.0,
        }
    }
}

/// Serializes the buffer selected by `target`.
///
/// A voxel dump needs the compaction stage, so it is a configuration error when
/// `skip_empty_voxels` is off.
pub fn dump_bytes(ctx: &ExtractionContext, target: DumpTarget) -> Result<Vec<u8>> {
    let bytes = match target {
        DumpTarget::Position => {
            let packed: Vec<Float4> = ctx.positions().iter().map(Float4::point).collect();
            bytemuck::cast_slice(&packed).to_vec()
        }
        DumpTarget::Normal => {
            let packed: Vec<Float4> = ctx.normals().iter().map(Float4::vector).collect();
            bytemuck::cast_slice(&packed).to_vec()
        }
        DumpTarget::Voxel => {
            if !ctx.config().skip_empty_voxels {
                return Err(MarchingCubesError::Configuration(
                    "voxel dump requires compaction; drop --no-compaction".into(),
                ));
            }
            bytemuck::cast_slice(ctx.compacted_voxels()).to_vec()
        }
    };
    Ok(bytes)
}

/// Writes the buffer selected by `target` to `path`.
pub fn write_dump(ctx: &ExtractionContext, target: DumpTarget, path: &Path) -> Result<()> {
    let bytes = dump_bytes(ctx, target)?;
    fs::write(path, &bytes)?;
    info!("wrote {} ({} bytes) to {}", target, bytes.len(), path.display());
    Ok(())
}

/// Decodes a dump into comparable floats.
///
/// Voxel dumps hold `u32` indices, which are widened with `as f32`.
pub fn decode_dump(bytes: &[u8], target: DumpTarget) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(MarchingCubesError::Input(format!(
            "dump of {} bytes is not a whole number of 4-byte elements",
            bytes.len()
        )));
    }
    let words = bytes.chunks_exact(4);
    let values = match target {
        DumpTarget::Position | DumpTarget::Normal => {
            words.map(bytemuck::pod_read_unaligned::<f32>).collect()
        }
        DumpTarget::Voxel => words
            .map(|w| bytemuck::pod_read_unaligned::<u32>(w) as f32)
            .collect(),
    };
    Ok(values)
}

/// Reads and decodes a reference dump.
pub fn read_reference(path: &Path, target: DumpTarget) -> Result<Vec<f32>> {
    let bytes = fs::read(path).map_err(|e| {
        MarchingCubesError::Input(format!("cannot read reference {}: {e}", path.display()))
    })?;
    decode_dump(&bytes, target)
}

/// Outcome of [`compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Elements whose difference exceeds the tolerance.
    pub mismatches: usize,
    /// Elements compared.
    pub total: usize,
    /// Whether the lengths agree.
    pub same_length: bool,
    pub passed: bool,
}

/// Compares two dumps element by element.
///
/// Elements mismatch when `|a - b| > epsilon` (NaN always mismatches). The
/// comparison passes when the lengths agree and at most `threshold · total`
/// elements mismatch.
pub fn compare(actual: &[f32], reference: &[f32], epsilon: f32, threshold: f32) -> Comparison {
    let same_length = actual.len() == reference.len();
    let total = actual.len().min(reference.len());
    let mismatches = actual
        .iter()
        .zip(reference)
        .filter(|&(a, b)| {
            let diff = (a - b).abs();
            diff.is_nan() || diff > epsilon
        })
        .count();
    let passed = same_length && mismatches as f64 <= threshold as f64 * total as f64;
    Comparison {
        mismatches,
        total,
        same_length,
        passed,
    }
}

/// Compares the context's buffer against a reference dump with the default
/// [`EPSILON`] and [`THRESHOLD`].
pub fn verify(ctx: &ExtractionContext, target: DumpTarget, reference: &Path) -> Result<Comparison> {
    let actual = decode_dump(&dump_bytes(ctx, target)?, target)?;
    let expected = read_reference(reference, target)?;
    let comparison = compare(&actual, &expected, EPSILON, THRESHOLD);
    info!(
        "{}: {} of {} elements differ (lengths {} / {})",
        target,
        comparison.mismatches,
        comparison.total,
        actual.len(),
        expected.len()
    );
    Ok(comparison)
}
