use std::fmt;

use super::{BufferId, ProgramId, TextureId};

/// Failure reported by a [`GraphicsDevice`](super::GraphicsDevice).
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    UnknownBuffer(BufferId),
    UnknownTexture(TextureId),
    UnknownProgram(ProgramId),
    /// A buffer or texture allocation of `requested` bytes failed.
    OutOfMemory { requested: u64 },
    /// Program compile/link failure with the backend's diagnostic text.
    Compile { label: String, log: String },
    /// A draw or clear was issued with no render target bound.
    NoTarget,
    /// Texture dimensions or pixel data the device cannot accept.
    InvalidTexture { width: u32, height: u32, reason: String },
    /// Any other backend-reported failure.
    Backend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::UnknownBuffer(id) => write!(f, "unknown buffer {id:?}"),
            DeviceError::UnknownTexture(id) => write!(f, "unknown texture {id:?}"),
            DeviceError::UnknownProgram(id) => write!(f, "unknown program {id:?}"),
            DeviceError::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {requested} bytes")
            }
            DeviceError::Compile { label, log } => {
                write!(f, "failed to compile program \"{label}\": {log}")
            }
            DeviceError::NoTarget => write!(f, "no render target bound"),
            DeviceError::InvalidTexture { width, height, reason } => {
                write!(f, "invalid {width}x{height} texture: {reason}")
            }
            DeviceError::Backend(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}
