use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, MarchingCubesError>;

#[derive(Debug, Display, From)]
pub enum MarchingCubesError {
    /// The volume or a reference file is missing, unreadable or the wrong size.
    #[display("input error: {_0}")]
    Input(String),
    /// The vertex-count scan asked for more slots than the output buffers hold.
    #[display(
        "vertex capacity exceeded: {required} vertices required, {capacity} allocated ({overflow} over)"
    )]
    Capacity {
        required: usize,
        capacity: usize,
        overflow: usize,
    },
    #[display("configuration error: {_0}")]
    Configuration(String),
    #[display("i/o error: {_0}")]
    #[from]
    Io(std::io::Error),
}

impl MarchingCubesError {
    pub(crate) fn capacity(required: usize, capacity: usize) -> Self {
        Self::Capacity {
            required,
            capacity,
            overflow: required.saturating_sub(capacity),
        }
    }
}

impl std::error::Error for MarchingCubesError {}
