//! Coordinate types shared by the render core.
//!
//! Canonical CPU space:
//! - Pixels of the internal resolution
//! - Origin top-left
//! - +X right, +Y down
//!
//! The camera matrix converts this space to clip space in the vertex shader.

mod layout;
mod vec2;

pub use layout::{Layout, LayoutOptions};
pub use vec2::Vec2;
