//! Batched 2D rendering.
//!
//! Draw calls append quads to a [`VertexBatcher`]; `end` uploads the
//! vertices and issues a single indexed draw against the shared
//! [`QuadIndexBuffer`], with the [`Camera`] matrix as uniform.
//!
//! Convention:
//! - world coordinates are pixels (top-left origin, +Y down)
//! - every draw is submitted in call order; nothing is sorted

mod batcher;
mod buffer;
mod camera;
mod ctx;
mod index_buffer;
mod pool;
mod quad;
mod shader;
mod sprite;
mod texture;
mod vertex;

pub use batcher::{MAX_BATCH_VERTICES, PrimitiveBatcher, SpriteBatcher, VertexBatcher};
pub use buffer::GrowBuffer;
pub use camera::Camera;
pub use ctx::{Gpu, RenderContext};
pub use index_buffer::{MAX_QUAD_INDICES, QuadIndexBuffer};
pub use pool::BatcherPool;
pub use quad::Quad;
pub use shader::{MATRIX_UNIFORM, Program, SPRITE_TEXTURE, ShaderTemplate, Shaders};
pub use sprite::Sprite;
pub use texture::{Texture, TextureOptions};
pub use vertex::{BatchVertex, PrimitiveVertex, SpriteVertex, VertexKind};
