//! Color values passed to draw calls.

mod color;

pub use color::Color;
