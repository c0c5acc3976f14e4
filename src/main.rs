//! Marching cubes CLI
//!
//! Loads an 8-bit raw volume (or a synthetic sphere), extracts its isosurface and
//! optionally dumps one output buffer and compares it against a reference dump.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;

use par_marching_cubes::{
    ExtractionConfig, ExtractionContext, GridSize, MarchingCubesError, ScalarField, Value,
    config::{DEFAULT_ISO_VALUE, default_max_verts},
    dump::{DumpTarget, verify, write_dump},
    field::DEFAULT_VOLUME_FILE,
};

#[derive(Parser, Debug)]
#[command(name = "marching_cubes")]
#[command(about = "Extract an isosurface from a raw 8-bit volume", long_about = None)]
struct Cli {
    /// log2 of the grid size along every axis (default: 5)
    #[arg(long)]
    grid: Option<u32>,

    /// log2 of the grid size along X, overrides --grid
    #[arg(long)]
    gridx: Option<u32>,

    /// log2 of the grid size along Y, overrides --grid
    #[arg(long)]
    gridy: Option<u32>,

    /// log2 of the grid size along Z, overrides --grid
    #[arg(long)]
    gridz: Option<u32>,

    /// Raw volume of X·Y·Z bytes
    #[arg(long, default_value = DEFAULT_VOLUME_FILE)]
    file: PathBuf,

    /// Normalized density threshold
    #[arg(long, default_value_t = DEFAULT_ISO_VALUE)]
    isovalue: Value,

    /// Dump a buffer and compare it: 0 positions, 1 normals, 2 compacted voxels
    #[arg(long)]
    dump: Option<u32>,

    /// Reference dump to compare against (required with --dump)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Generate triangles for every voxel instead of compacting occupied ones
    #[arg(long)]
    no_compaction: bool,

    /// Vertex buffer capacity (default: X·Y·100)
    #[arg(long)]
    max_verts: Option<usize>,

    /// Extract a synthetic sphere instead of reading --file
    #[arg(long)]
    sphere: bool,

    /// Log stage totals and small scratch buffers (debug level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn grid_size(&self) -> par_marching_cubes::Result<GridSize> {
        let mut log2 = GridSize::default().log2();
        if let Some(n) = self.grid {
            log2 = [n; 3];
        }
        for (axis, n) in [self.gridx, self.gridy, self.gridz].into_iter().enumerate() {
            if let Some(n) = n {
                log2[axis] = n;
            }
        }
        GridSize::new(log2[0], log2[1], log2[2])
    }

    fn extraction_config(&self) -> par_marching_cubes::Result<ExtractionConfig> {
        let grid = self.grid_size()?;
        let config = ExtractionConfig::new(grid)
            .with_iso_value(self.isovalue)
            .with_skip_empty_voxels(!self.no_compaction)
            .with_max_verts(self.max_verts.unwrap_or_else(|| default_max_verts(grid)));
        config.validate()?;
        Ok(config)
    }

    /// Resolves `--dump` / `--reference` before any work is done.
    fn dump_request(
        &self,
        config: &ExtractionConfig,
    ) -> par_marching_cubes::Result<Option<(DumpTarget, &Path)>> {
        let Some(code) = self.dump else {
            return Ok(None);
        };
        let target = DumpTarget::from_code(code)?;
        let Some(reference) = self.reference.as_deref() else {
            return Err(MarchingCubesError::Configuration(
                "--dump requires --reference".into(),
            ));
        };
        if target == DumpTarget::Voxel && !config.skip_empty_voxels {
            return Err(MarchingCubesError::Configuration(
                "--dump 2 cannot be combined with --no-compaction".into(),
            ));
        }
        Ok(Some((target, reference)))
    }
}

/// Library trace events are compiled out, so verbosity tops out at debug.
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .parse_default_env()
        .init();

    let config = cli.extraction_config().context("Invalid grid or extraction settings")?;
    let dump = cli.dump_request(&config)?;

    let field = if cli.sphere {
        let [x, y, z] = config.grid.dims();
        ScalarField::sphere(config.grid, x.min(y).min(z) as f32 * 0.4)
    } else {
        ScalarField::load(&cli.file, config.grid)
            .with_context(|| format!("Failed to load volume {:?}", cli.file))?
    };

    let mut ctx = ExtractionContext::new(config)?;
    let summary = ctx.compute_isosurface(&field).context("Isosurface extraction failed")?;
    println!(
        "active voxels: {}, vertices: {}, triangles: {}",
        summary.active_voxels,
        summary.total_verts,
        summary.total_verts / 3
    );

    if let Some((target, reference)) = dump {
        let out = Path::new(target.file_name());
        write_dump(&ctx, target, out)?;
        let comparison = verify(&ctx, target, reference)?;
        if !comparison.passed {
            bail!(
                "{} differ from {:?}: {} of {} elements mismatch",
                target,
                reference,
                comparison.mismatches,
                comparison.total
            );
        }
        println!("{target} match {reference:?}");
    }

    Ok(())
}
