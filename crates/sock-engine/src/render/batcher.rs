use crate::device::{BufferId, BufferKind, DrawIndexed, GraphicsDevice, TextureId};
use crate::error::RenderError;
use crate::math::Transform;
use crate::paint::Color;

use super::buffer::GrowBuffer;
use super::ctx::Gpu;
use super::quad::Quad;
use super::shader::{MATRIX_UNIFORM, SPRITE_TEXTURE};
use super::texture::Texture;
use super::vertex::{BatchVertex, PrimitiveVertex, SpriteVertex};

/// Vertices one draw can address with 16-bit indices.
pub const MAX_BATCH_VERTICES: usize = 65_536;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum BatchState {
    Idle,
    Recording { texture: Option<TextureId> },
}

/// Accumulates quads and flushes them as one indexed draw.
///
/// `begin` → any number of `add_quad`/`add_rect` → `end`. Quads past
/// [`MAX_BATCH_VERTICES`] (or past what memory allows) are dropped; the
/// batch still draws what it holds.
///
/// The GPU buffer is only freed by [`destroy`](Self::destroy) (or by handing
/// the batcher back to its pool); dropping a live batcher leaks it and logs a
/// warning.
#[derive(Debug)]
pub struct VertexBatcher<V: BatchVertex> {
    vertices: GrowBuffer<V>,
    state: BatchState,
    vertex_buffer: BufferId,
    /// Vertices the GPU buffer currently holds room for.
    gpu_capacity: usize,
    /// Set once a batch has warned about dropped quads.
    dropped: bool,
    /// Cleared once the GPU buffer has been deleted.
    live: bool,
}

/// Textured batcher; one texture per batch.
pub type SpriteBatcher = VertexBatcher<SpriteVertex>;

/// Untextured, vertex-colored batcher.
pub type PrimitiveBatcher = VertexBatcher<PrimitiveVertex>;

impl<V: BatchVertex> VertexBatcher<V> {
    /// Allocates CPU storage for `capacity` vertices and a matching GPU buffer.
    pub fn new<D: GraphicsDevice>(device: &mut D, capacity: usize) -> Result<Self, RenderError> {
        let vertices = GrowBuffer::with_capacity(capacity, MAX_BATCH_VERTICES)?;
        let gpu_capacity = vertices.capacity();
        let vertex_buffer =
            device.create_buffer(BufferKind::Vertex, (gpu_capacity * size_of::<V>()) as u64)?;

        Ok(Self {
            vertices,
            state: BatchState::Idle,
            vertex_buffer,
            gpu_capacity,
            dropped: false,
            live: true,
        })
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        matches!(self.state, BatchState::Recording { .. })
    }

    /// Vertices recorded since `begin`.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.vertices.capacity()
    }

    #[inline]
    pub fn vertices(&self) -> &[V] {
        self.vertices.as_slice()
    }

    #[inline]
    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    /// `false` once the GPU buffer has been freed.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    fn begin_with(&mut self, texture: Option<TextureId>) -> Result<(), RenderError> {
        if self.is_recording() {
            return Err(RenderError::BatchAlreadyStarted);
        }
        self.vertices.clear();
        self.dropped = false;
        self.state = BatchState::Recording { texture };
        Ok(())
    }

    /// Appends one quad.
    ///
    /// With a transform, corners are mapped around the transform's pivot
    /// (see [`Transform::apply_to_quad`]).
    pub fn add_quad(
        &mut self,
        quad: &Quad,
        z: f32,
        color: Color,
        transform: Option<&Transform>,
    ) -> Result<(), RenderError> {
        if !self.is_recording() {
            return Err(RenderError::BatchNotStarted);
        }
        if !quad.is_finite() || !z.is_finite() {
            return Err(RenderError::NonFinite { what: "quad" });
        }
        if transform.is_some_and(|t| !t.is_finite()) {
            return Err(RenderError::NonFinite { what: "transform" });
        }

        let mut corners = quad.corners;
        if let Some(t) = transform {
            t.apply_to_quad(&mut corners);
        }

        let verts: [V; 4] =
            std::array::from_fn(|i| V::corner(corners[i], z, color, quad.uvs[i]));

        match self.vertices.extend_from_slice(&verts) {
            Ok(()) => Ok(()),
            Err(e) if e.is_resource_exhaustion() => {
                if !self.dropped {
                    log::warn!(
                        "{:?} batch full at {} vertices, dropping quads: {e}",
                        V::KIND,
                        self.vertices.len()
                    );
                    self.dropped = true;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Appends the axis-aligned rect `(x1, y1)..(x2, y2)`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_rect(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        z: f32,
        color: Color,
        transform: Option<&Transform>,
    ) -> Result<(), RenderError> {
        self.add_quad(&Quad::rect(x1, y1, x2, y2), z, color, transform)
    }

    /// Flushes the batch as one draw and returns to idle.
    ///
    /// An empty batch issues no device calls. A draw that cannot get the
    /// memory it needs is skipped with a warning; the batcher is idle again
    /// either way.
    pub fn end<D: GraphicsDevice>(&mut self, gpu: &mut Gpu<D>) -> Result<(), RenderError> {
        let BatchState::Recording { texture } = self.state else {
            return Err(RenderError::BatchNotStarted);
        };
        self.state = BatchState::Idle;

        let count = self.vertices.len();
        if count == 0 {
            return Ok(());
        }

        let result = self.flush(gpu, texture);
        self.vertices.clear();

        match result {
            Err(e) if e.is_resource_exhaustion() => {
                log::warn!("skipping draw of {count} vertices: {e}");
                Ok(())
            }
            other => other,
        }
    }

    fn flush<D: GraphicsDevice>(
        &mut self,
        gpu: &mut Gpu<D>,
        texture: Option<TextureId>,
    ) -> Result<(), RenderError> {
        let count = self.vertices.len();

        if count > self.gpu_capacity {
            let capacity = self.vertices.capacity();
            gpu.device
                .allocate_buffer(self.vertex_buffer, (capacity * size_of::<V>()) as u64)?;
            self.gpu_capacity = capacity;
        }
        gpu.device
            .write_buffer(self.vertex_buffer, 0, bytemuck::cast_slice(self.vertices.as_slice()))?;

        let program = gpu.shaders.get(V::KIND);
        if let Some(texture) = texture {
            gpu.device.bind_texture(program.id(), program.texture_slot(SPRITE_TEXTURE)?, texture)?;
        }
        let matrix = gpu.camera.matrix();
        gpu.device.set_uniform_mat3(program.id(), program.uniform_slot(MATRIX_UNIFORM)?, &matrix)?;

        let index_count = count * 3 / 2;
        let index_buffer = gpu.quad_indices.ensure_capacity(&mut gpu.device, index_count)?;

        gpu.device.draw_indexed(&DrawIndexed {
            program: program.id(),
            vertex_buffer: self.vertex_buffer,
            index_buffer,
            index_count: index_count as u32,
        })?;
        Ok(())
    }

    /// Drops recorded vertices and returns to idle without drawing.
    pub fn abandon(&mut self) {
        self.vertices.clear();
        self.state = BatchState::Idle;
    }

    pub(crate) fn free<D: GraphicsDevice>(&mut self, device: &mut D) {
        if self.live {
            device.delete_buffer(self.vertex_buffer);
            self.live = false;
        }
    }

    /// Frees the GPU buffer.
    pub fn destroy<D: GraphicsDevice>(mut self, device: &mut D) {
        self.free(device);
    }
}

impl<V: BatchVertex> Drop for VertexBatcher<V> {
    fn drop(&mut self) {
        if self.live {
            log::warn!(
                "{:?} batcher dropped without being released, leaking {:?}",
                V::KIND,
                self.vertex_buffer
            );
        }
    }
}

impl SpriteBatcher {
    /// Starts a batch that samples `texture`.
    pub fn begin(&mut self, texture: &Texture) -> Result<(), RenderError> {
        self.begin_with(Some(texture.id()))
    }
}

impl PrimitiveBatcher {
    pub fn begin(&mut self) -> Result<(), RenderError> {
        self.begin_with(None)
    }
}
