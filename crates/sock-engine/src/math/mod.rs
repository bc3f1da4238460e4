//! 2D affine math.

mod affine;

pub use affine::{Affine, Transform};
