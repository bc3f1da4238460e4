use std::fmt;

use crate::device::{DecodeError, DeviceError};

/// Failure reported by the render core to its caller.
///
/// Protocol violations (`BatchAlreadyStarted`, `BatchNotStarted`) and invalid
/// arguments are rejected before any state is touched. Resource exhaustion is
/// reported by the low-level pieces (index buffer, vertex storage) and turned
/// into skipped draws by the batchers.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// `begin` was called while the batch was already recording.
    BatchAlreadyStarted,
    /// `end` (or an add) was called without a matching `begin`.
    BatchNotStarted,
    /// Element access outside `0..len`.
    IndexOutOfRange { index: usize, len: usize },
    /// A coordinate or transform component was NaN or infinite.
    NonFinite { what: &'static str },
    /// A buffer would have to grow past its hard ceiling.
    CapacityExceeded { requested: usize, max: usize },
    /// CPU-side allocation failed.
    OutOfMemory { requested: usize },
    /// One or more programs failed to compile or link at startup.
    ShaderCompile { log: String },
    /// A program was asked for a uniform or texture slot it does not declare.
    UnknownUniform { program: String, name: String },
    Device(DeviceError),
    Decode(DecodeError),
}

impl RenderError {
    /// Returns `true` for failures a best-effort renderer degrades on
    /// (skip the draw) instead of surfacing.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            RenderError::CapacityExceeded { .. }
                | RenderError::OutOfMemory { .. }
                | RenderError::Device(DeviceError::OutOfMemory { .. })
        )
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::BatchAlreadyStarted => write!(f, "batch already started"),
            RenderError::BatchNotStarted => write!(f, "batch not yet started"),
            RenderError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range (len {len})")
            }
            RenderError::NonFinite { what } => write!(f, "{what} must be finite"),
            RenderError::CapacityExceeded { requested, max } => {
                write!(f, "requested capacity {requested} exceeds maximum {max}")
            }
            RenderError::OutOfMemory { requested } => {
                write!(f, "failed to allocate {requested} elements")
            }
            RenderError::ShaderCompile { log } => write!(f, "{log}"),
            RenderError::UnknownUniform { program, name } => {
                write!(f, "program \"{program}\" does not contain a uniform named \"{name}\"")
            }
            RenderError::Device(e) => write!(f, "graphics device: {e}"),
            RenderError::Decode(e) => write!(f, "image decode: {e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Device(e) => Some(e),
            RenderError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for RenderError {
    fn from(e: DeviceError) -> Self {
        RenderError::Device(e)
    }
}

impl From<DecodeError> for RenderError {
    fn from(e: DecodeError) -> Self {
        RenderError::Decode(e)
    }
}
