//! Sock engine render core.
//!
//! Batched 2D drawing on top of a pluggable [`GraphicsDevice`](device::GraphicsDevice):
//! sprite and primitive batchers sharing one quad index buffer, an affine
//! camera, and a pool of reusable sprite batchers, all owned by a
//! [`RenderContext`](render::RenderContext).

pub mod config;
pub mod coords;
pub mod device;
pub mod error;
pub mod logging;
pub mod math;
pub mod paint;
pub mod render;

pub use config::RenderConfig;
pub use error::RenderError;
pub use render::RenderContext;
