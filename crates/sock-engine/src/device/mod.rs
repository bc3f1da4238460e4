//! Graphics device seam.
//!
//! The render core talks to the GPU only through [`GraphicsDevice`]. Two
//! implementations ship with the crate:
//! - [`WgpuDevice`]: wgpu backend; every draw is one blocking submission
//! - [`HeadlessDevice`]: records calls in memory (tests, tooling, servers)
//!
//! Clears and draws land in an offscreen frame sized to the internal
//! resolution; [`GraphicsDevice::present`] scales that frame onto the screen.
//!
//! All calls happen on the thread that owns the device; nothing here is
//! `Send`-bound on purpose.

mod error;
pub mod headless;
mod decode;
mod types;
mod wgpu_device;

pub use error::DeviceError;
pub use headless::{DeviceCommand, HeadlessDevice};
pub use decode::{DecodeError, DecodedImage, ImageCrateDecoder, ImageDecoder};
pub use types::{
    AttributeFormat, BufferId, BufferKind, DrawIndexed, FilterMode, ProgramDesc, ProgramId,
    SamplerOptions, TextureId, VertexAttribute, VertexLayout, Viewport, WrapMode,
};
pub use wgpu_device::{WgpuDevice, WgpuInit};

/// Immediate-mode GPU interface consumed by the batchers.
pub trait GraphicsDevice {
    /// Creates a buffer with `size` bytes of undefined contents.
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferId, DeviceError>;

    /// Discards the buffer's storage and reallocates it with `size` bytes.
    fn allocate_buffer(&mut self, id: BufferId, size: u64) -> Result<(), DeviceError>;

    /// Writes `data` at `offset`. The range must fit the current allocation.
    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Reallocates the buffer to exactly `data.len()` bytes and fills it.
    fn upload_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        self.allocate_buffer(id, data.len() as u64)?;
        self.write_buffer(id, 0, data)
    }

    fn delete_buffer(&mut self, id: BufferId);

    /// Compiles and links a program together with its vertex layout.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError>;

    fn delete_program(&mut self, id: ProgramId);

    /// Sets `mat3` uniform `slot` (column-major) for subsequent draws.
    fn set_uniform_mat3(
        &mut self,
        program: ProgramId,
        slot: u32,
        matrix: &[f32; 9],
    ) -> Result<(), DeviceError>;

    /// Binds `texture` to sampler `slot` for subsequent draws.
    fn bind_texture(
        &mut self,
        program: ProgramId,
        slot: u32,
        texture: TextureId,
    ) -> Result<(), DeviceError>;

    /// Creates a texture from tightly packed RGBA8 rows.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        sampler: &SamplerOptions,
    ) -> Result<TextureId, DeviceError>;

    fn set_texture_sampler(
        &mut self,
        id: TextureId,
        sampler: &SamplerOptions,
    ) -> Result<(), DeviceError>;

    fn delete_texture(&mut self, id: TextureId);

    /// Largest width or height [`create_texture`](Self::create_texture) accepts.
    fn max_texture_dimension(&self) -> u32;

    /// (Re)creates the offscreen frame subsequent clears and draws render into.
    fn resize_frame(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;

    /// Draws the offscreen frame into `viewport` of the screen target,
    /// sampling it with `filter`. The rest of the screen is cleared to black.
    fn present(&mut self, viewport: &Viewport, filter: FilterMode) -> Result<(), DeviceError>;

    /// Clears the current target to a unit-float RGBA color.
    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError>;

    /// Issues one indexed triangle-list draw. Blocks until submitted.
    fn draw_indexed(&mut self, draw: &DrawIndexed) -> Result<(), DeviceError>;
}

/// Lets a context borrow a device instead of owning it.
impl<D: GraphicsDevice + ?Sized> GraphicsDevice for &mut D {
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferId, DeviceError> {
        (**self).create_buffer(kind, size)
    }

    fn allocate_buffer(&mut self, id: BufferId, size: u64) -> Result<(), DeviceError> {
        (**self).allocate_buffer(id, size)
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        (**self).write_buffer(id, offset, data)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        (**self).delete_buffer(id)
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError> {
        (**self).create_program(desc)
    }

    fn delete_program(&mut self, id: ProgramId) {
        (**self).delete_program(id)
    }

    fn set_uniform_mat3(
        &mut self,
        program: ProgramId,
        slot: u32,
        matrix: &[f32; 9],
    ) -> Result<(), DeviceError> {
        (**self).set_uniform_mat3(program, slot, matrix)
    }

    fn bind_texture(
        &mut self,
        program: ProgramId,
        slot: u32,
        texture: TextureId,
    ) -> Result<(), DeviceError> {
        (**self).bind_texture(program, slot, texture)
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        sampler: &SamplerOptions,
    ) -> Result<TextureId, DeviceError> {
        (**self).create_texture(width, height, rgba, sampler)
    }

    fn set_texture_sampler(
        &mut self,
        id: TextureId,
        sampler: &SamplerOptions,
    ) -> Result<(), DeviceError> {
        (**self).set_texture_sampler(id, sampler)
    }

    fn delete_texture(&mut self, id: TextureId) {
        (**self).delete_texture(id)
    }

    fn max_texture_dimension(&self) -> u32 {
        (**self).max_texture_dimension()
    }

    fn resize_frame(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        (**self).resize_frame(width, height)
    }

    fn present(&mut self, viewport: &Viewport, filter: FilterMode) -> Result<(), DeviceError> {
        (**self).present(viewport, filter)
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError> {
        (**self).clear(color)
    }

    fn draw_indexed(&mut self, draw: &DrawIndexed) -> Result<(), DeviceError> {
        (**self).draw_indexed(draw)
    }
}

/// Checks RGBA8 pixel data against its dimensions and a device size limit.
pub fn validate_texture(
    width: u32,
    height: u32,
    rgba_len: usize,
    max_dimension: u32,
) -> Result<(), DeviceError> {
    let invalid = |reason: String| DeviceError::InvalidTexture { width, height, reason };

    if width == 0 || height == 0 {
        return Err(invalid("size must be non-zero".to_owned()));
    }
    if width > max_dimension || height > max_dimension {
        return Err(invalid(format!("exceeds the device limit of {max_dimension}")));
    }
    let expected = width as u64 * height as u64 * 4;
    if rgba_len as u64 != expected {
        return Err(invalid(format!("data is {rgba_len} bytes, expected {expected}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_validation() {
        assert_eq!(validate_texture(2, 3, 24, 16), Ok(()));
        assert!(matches!(
            validate_texture(0, 0, 0, 16),
            Err(DeviceError::InvalidTexture { width: 0, height: 0, .. })
        ));
        assert!(validate_texture(17, 1, 68, 16).is_err());
        assert!(validate_texture(4, 4, 3, 16).is_err());
    }

    #[test]
    fn viewport_fits_target() {
        let v = Viewport { x: 80, y: 10, width: 640, height: 480 };
        assert!(v.fits(800, 500));
        assert!(!v.fits(719, 500));
        assert!(!v.fits(800, 489));
    }
}
