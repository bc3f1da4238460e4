use crate::device::{FilterMode, SamplerOptions, TextureId, WrapMode};

/// Filter and wrap settings requested for a texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TextureOptions {
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

impl TextureOptions {
    pub const fn new(filter: FilterMode, wrap: WrapMode) -> Self {
        Self { filter, wrap }
    }

    pub const fn sampler(self) -> SamplerOptions {
        SamplerOptions { min_filter: self.filter, mag_filter: self.filter, wrap: self.wrap }
    }
}

/// A GPU texture owned by the caller.
///
/// Not `Clone`: the handle is freed through
/// [`RenderContext::delete_texture`](super::RenderContext::delete_texture),
/// which consumes it.
#[derive(Debug, PartialEq)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    sampler: SamplerOptions,
}

impl Texture {
    pub(crate) fn new(id: TextureId, width: u32, height: u32, sampler: SamplerOptions) -> Self {
        Self { id, width, height, sampler }
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn sampler(&self) -> SamplerOptions {
        self.sampler
    }

    pub(crate) fn set_sampler(&mut self, sampler: SamplerOptions) {
        self.sampler = sampler;
    }
}

/// Forces clamp-to-edge on non-power-of-two textures, which cannot repeat
/// on every backend.
pub(crate) fn fix_npot(width: u32, height: u32, mut sampler: SamplerOptions) -> SamplerOptions {
    let npot = !width.is_power_of_two() || !height.is_power_of_two();
    if npot && sampler.wrap != WrapMode::ClampToEdge {
        log::warn!(
            "texture {width}x{height} is not a power of two; wrap mode {:?} forced to clamp",
            sampler.wrap
        );
        sampler.wrap = WrapMode::ClampToEdge;
    }
    sampler
}
