use thiserror::Error;

/// Every way a benchmark run can be abandoned.
///
/// All variants are fatal: the harness reports the message together with
/// [`BenchError::code`] and stops.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("No platforms found")]
    NoPlatform,

    #[error("Could not get device in platform (allow_cpu={allow_cpu}, preferred={preferred:?})")]
    NoQualifyingDevice {
        allow_cpu: bool,
        preferred: Option<String>,
    },

    #[error("Unable to create device and queue: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Unable to render kernel template {name}: {source}")]
    KernelTemplate {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("Error building program {name}: {message}")]
    ShaderCompilation { name: &'static str, message: String },

    #[error("Error setting kernel {name}: {message}")]
    EntryPoint { name: &'static str, message: String },

    #[error("Unable to allocate device buffer of {bytes} bytes: {message}")]
    BufferAllocation { bytes: u64, message: String },

    #[error("Unable to read device buffer: {0}")]
    BufferRead(String),

    #[error("Timestamp query failed: {0}")]
    Timestamp(String),

    #[error("Dimension mismatch: {lhs:?} vs {rhs:?}")]
    DimensionMismatch {
        lhs: (usize, usize),
        rhs: (usize, usize),
    },

    #[error("Grid of {count} workgroups along {axis} exceeds device limit {limit}")]
    GridTooLarge { axis: char, count: u64, limit: u32 },

    #[error("{0}")]
    NotClose(String),

    #[error("Invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

impl BenchError {
    /// Opaque status code printed alongside the diagnostic.
    pub fn code(&self) -> i32 {
        match self {
            BenchError::NoPlatform => -1,
            BenchError::NoQualifyingDevice { .. } => -2,
            BenchError::DeviceRequest(_) => -3,
            BenchError::KernelTemplate { .. } => -4,
            BenchError::ShaderCompilation { .. } => -5,
            BenchError::EntryPoint { .. } => -6,
            BenchError::BufferAllocation { .. } => -7,
            BenchError::BufferRead(_) => -8,
            BenchError::Timestamp(_) => -9,
            BenchError::DimensionMismatch { .. } => -10,
            BenchError::GridTooLarge { .. } => -11,
            BenchError::NotClose(_) => -12,
            BenchError::InvalidConfig { .. } => -13,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
