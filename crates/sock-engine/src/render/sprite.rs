use crate::coords::Vec2;
use crate::device::{FilterMode, GraphicsDevice, WrapMode};
use crate::error::RenderError;
use crate::math::{Affine, Transform};
use crate::paint::Color;

use super::batcher::SpriteBatcher;
use super::ctx::RenderContext;
use super::quad::Quad;
use super::texture::Texture;

/// A texture drawn as rects, with an optional transform.
///
/// Draws outside [`begin_batch`](Self::begin_batch)/[`end_batch`](Self::end_batch)
/// are flushed one by one through the context's temp batcher.
///
/// Release it with [`free`](Self::free). A sprite dropped without it leaks its
/// texture, and its held batcher if mid-batch.
#[derive(Debug)]
pub struct Sprite {
    texture: Texture,
    transform: Option<Affine>,
    origin: Option<Vec2>,
    batcher: Option<SpriteBatcher>,
}

impl Sprite {
    pub fn new(texture: Texture) -> Self {
        Self { texture, transform: None, origin: None, batcher: None }
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    #[inline]
    pub fn transform(&self) -> Option<&Affine> {
        self.transform.as_ref()
    }

    /// Pivot relative to the drawn rect's top-left corner.
    #[inline]
    pub fn transform_origin(&self) -> Option<Vec2> {
        self.origin
    }

    #[inline]
    pub fn is_batching(&self) -> bool {
        self.batcher.is_some()
    }

    pub fn set_transform(&mut self, transform: Option<Affine>) -> Result<(), RenderError> {
        if transform.is_some_and(|t| !t.is_finite()) {
            return Err(RenderError::NonFinite { what: "sprite transform" });
        }
        self.transform = transform;
        Ok(())
    }

    pub fn set_transform_origin(&mut self, origin: Option<Vec2>) -> Result<(), RenderError> {
        if origin.is_some_and(|o| !o.is_finite()) {
            return Err(RenderError::NonFinite { what: "sprite transform origin" });
        }
        self.origin = origin;
        Ok(())
    }

    pub fn set_filter<D: GraphicsDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        filter: FilterMode,
    ) -> Result<(), RenderError> {
        ctx.set_texture_filter(&mut self.texture, filter)
    }

    pub fn set_wrap<D: GraphicsDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        wrap: WrapMode,
    ) -> Result<(), RenderError> {
        ctx.set_texture_wrap(&mut self.texture, wrap)
    }

    /// Holds a pooled batcher so following draws share one flush.
    pub fn begin_batch<D: GraphicsDevice>(&mut self, ctx: &mut RenderContext<D>) -> Result<(), RenderError> {
        if self.batcher.is_some() {
            return Err(RenderError::BatchAlreadyStarted);
        }
        let mut batcher = ctx.checkout()?;
        if let Err(e) = batcher.begin(&self.texture) {
            ctx.release(batcher);
            return Err(e);
        }
        self.batcher = Some(batcher);
        Ok(())
    }

    /// Flushes the held batch and hands the batcher back to the pool.
    pub fn end_batch<D: GraphicsDevice>(&mut self, ctx: &mut RenderContext<D>) -> Result<(), RenderError> {
        let Some(mut batcher) = self.batcher.take() else {
            return Err(RenderError::BatchNotStarted);
        };
        let result = batcher.end(ctx.gpu_mut());
        ctx.release(batcher);
        result
    }

    /// Draws the whole texture into `(x, y, width, height)`.
    pub fn draw<D: GraphicsDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    ) -> Result<(), RenderError> {
        let quad = Quad::rect(x, y, x + width, y + height);
        self.draw_quad(ctx, &quad, color)
    }

    /// Draws the texel region `(u, v, uw, vh)` into `(x, y, width, height)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_region<D: GraphicsDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        u: f32,
        v: f32,
        uw: f32,
        vh: f32,
        color: Color,
    ) -> Result<(), RenderError> {
        let tw = self.texture.width() as f32;
        let th = self.texture.height() as f32;
        let (u1, v1) = (u / tw, v / th);
        let quad = Quad::rect(x, y, x + width, y + height).with_uv_rect(u1, v1, u1 + uw / tw, v1 + vh / th);
        self.draw_quad(ctx, &quad, color)
    }

    fn draw_quad<D: GraphicsDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
        quad: &Quad,
        color: Color,
    ) -> Result<(), RenderError> {
        let transform = self.transform.map(|affine| Transform { affine, origin: self.origin });

        match self.batcher.as_mut() {
            Some(batcher) => batcher.add_quad(quad, 0.0, color, transform.as_ref()),
            None => ctx.draw_textured(&self.texture, quad, color, transform.as_ref()),
        }
    }

    /// Returns a held batcher to the pool and deletes the texture.
    pub fn free<D: GraphicsDevice>(mut self, ctx: &mut RenderContext<D>) {
        if let Some(batcher) = self.batcher.take() {
            ctx.release(batcher);
        }
        ctx.delete_texture(self.texture);
    }
}
