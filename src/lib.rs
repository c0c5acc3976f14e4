pub mod classify;
pub mod compact;
pub mod config;
pub mod context;
pub mod dump;
pub mod error;
pub mod field;
pub mod generate;
pub mod interp;
pub mod mesh;
#[cfg(feature = "bevy")]
pub mod render;
pub mod scan;
pub mod tables;
pub mod types;

pub use config::{ExtractionConfig, Placement};
pub use context::{ExtractionContext, ExtractionSummary};
pub use error::{MarchingCubesError, Result};
pub use field::ScalarField;
pub use mesh::Isosurface;
#[cfg(feature = "bevy")]
pub use render::IsosurfacePlugin;
pub use types::{GridSize, Point, Value, Vector, Vertex};
