use crate::config::RenderConfig;
use crate::coords::{Layout, Vec2};
use crate::device::{
    validate_texture, DecodedImage, FilterMode, GraphicsDevice, ImageDecoder, SamplerOptions, WrapMode,
};
use crate::error::RenderError;
use crate::math::Transform;
use crate::paint::Color;

use super::batcher::{PrimitiveBatcher, SpriteBatcher};
use super::camera::Camera;
use super::index_buffer::QuadIndexBuffer;
use super::pool::BatcherPool;
use super::quad::Quad;
use super::shader::Shaders;
use super::texture::{fix_npot, Texture, TextureOptions};

/// Device-side state every flush needs.
///
/// Kept apart from the pool and the quad batcher so a batcher owned by the
/// context can be flushed while the rest of the context is borrowed.
#[derive(Debug)]
pub struct Gpu<D> {
    pub(crate) device: D,
    pub(crate) shaders: Shaders,
    pub(crate) quad_indices: QuadIndexBuffer,
    pub(crate) camera: Camera,
}

impl<D: GraphicsDevice> Gpu<D> {
    /// Compiles the programs. Compilation failure is fatal.
    pub fn new(mut device: D, config: &RenderConfig) -> Result<Self, RenderError> {
        let shaders = Shaders::compile(&mut device)?;
        let (width, height) = config.layout.resolution.unwrap_or((1, 1));

        Ok(Self {
            device,
            shaders,
            quad_indices: QuadIndexBuffer::new(config.quad_index_capacity),
            camera: Camera::new(width, height),
        })
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[inline]
    pub fn quad_indices(&self) -> &QuadIndexBuffer {
        &self.quad_indices
    }

    fn release(&mut self) {
        self.quad_indices.destroy(&mut self.device);
        self.shaders.destroy(&mut self.device);
    }
}

/// Owns everything the render core shares between draws: device, programs,
/// index buffer, camera, batcher pool and the quad batcher.
///
/// Construct once per device; dropping it frees every GPU object it created
/// (textures are owned by the caller and freed with
/// [`delete_texture`](Self::delete_texture)).
#[derive(Debug)]
pub struct RenderContext<D: GraphicsDevice> {
    gpu: Gpu<D>,
    pool: BatcherPool,
    quads: PrimitiveBatcher,
    layout: Layout,
    config: RenderConfig,
}

impl<D: GraphicsDevice> RenderContext<D> {
    /// Compiles the programs, creates the offscreen frame and the quad batcher.
    ///
    /// Renders at `config.layout.resolution` (or 1x1) until the first
    /// [`resize`](Self::resize).
    pub fn new(device: D, config: RenderConfig) -> Result<Self, RenderError> {
        let mut gpu = Gpu::new(device, &config)?;

        let (width, height) = gpu.camera.resolution();
        let layout = Layout::compute(width, height, &config.layout);
        if let Err(e) = gpu.device.resize_frame(layout.resolution_width, layout.resolution_height) {
            gpu.release();
            return Err(e.into());
        }

        let quads = match PrimitiveBatcher::new(&mut gpu.device, config.primitive_batch_capacity) {
            Ok(quads) => quads,
            Err(e) => {
                gpu.release();
                return Err(e);
            }
        };

        let pool = BatcherPool::new(config.pool_capacity, config.sprite_batch_capacity);

        log::debug!("render context ready ({width}x{height})");
        Ok(Self { gpu, pool, quads, layout, config })
    }

    #[inline]
    pub fn gpu(&self) -> &Gpu<D> {
        &self.gpu
    }

    /// Needed to flush a caller-held batcher.
    #[inline]
    pub fn gpu_mut(&mut self) -> &mut Gpu<D> {
        &mut self.gpu
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.gpu.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.gpu.device
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.gpu.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.gpu.camera
    }

    #[inline]
    pub fn pool(&self) -> &BatcherPool {
        &self.pool
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    // ── screen ────────────────────────────────────────────────────────────

    /// Reports a new window size and re-derives the internal resolution.
    ///
    /// The offscreen frame is recreated when the internal resolution changes.
    pub fn resize(&mut self, screen_width: u32, screen_height: u32) -> Result<&Layout, RenderError> {
        let layout = Layout::compute(screen_width, screen_height, &self.config.layout);
        let resolution = (layout.resolution_width, layout.resolution_height);
        if resolution != (self.layout.resolution_width, self.layout.resolution_height) {
            self.gpu.device.resize_frame(resolution.0, resolution.1)?;
        }

        self.layout = layout;
        self.gpu
            .camera
            .set_resolution(self.layout.resolution_width, self.layout.resolution_height);
        log::debug!(
            "resize {screen_width}x{screen_height}: resolution {}x{} at scale {}",
            self.layout.resolution_width,
            self.layout.resolution_height,
            self.layout.scale
        );
        Ok(&self.layout)
    }

    /// Scales the finished frame into the letterboxed viewport.
    pub fn present(&mut self) -> Result<(), RenderError> {
        let viewport = self.layout.viewport();
        self.gpu.device.present(&viewport, self.config.present_filter)?;
        Ok(())
    }

    pub fn set_present_filter(&mut self, filter: FilterMode) {
        self.config.present_filter = filter;
    }

    pub fn clear(&mut self, color: Color) -> Result<(), RenderError> {
        self.gpu.device.clear(color.to_unit())?;
        Ok(())
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Sampler used by [`create_texture`](Self::create_texture) without options.
    pub fn set_default_sampler(&mut self, sampler: SamplerOptions) {
        self.config.default_sampler = sampler;
    }

    pub fn create_texture(
        &mut self,
        image: &DecodedImage,
        options: Option<TextureOptions>,
    ) -> Result<Texture, RenderError> {
        validate_texture(
            image.width,
            image.height,
            image.pixels.len(),
            self.gpu.device.max_texture_dimension(),
        )?;

        let requested = options.map_or(self.config.default_sampler, TextureOptions::sampler);
        let sampler = fix_npot(image.width, image.height, requested);

        let id = self
            .gpu
            .device
            .create_texture(image.width, image.height, &image.pixels, &sampler)?;
        Ok(Texture::new(id, image.width, image.height, sampler))
    }

    /// Decodes `bytes` and uploads the result.
    pub fn load_texture(
        &mut self,
        decoder: &impl ImageDecoder,
        bytes: &[u8],
        options: Option<TextureOptions>,
    ) -> Result<Texture, RenderError> {
        let image = decoder.decode(bytes)?;
        self.create_texture(&image, options)
    }

    pub fn set_texture_filter(&mut self, texture: &mut Texture, filter: FilterMode) -> Result<(), RenderError> {
        let sampler = SamplerOptions { min_filter: filter, mag_filter: filter, ..texture.sampler() };
        self.apply_sampler(texture, sampler)
    }

    pub fn set_texture_wrap(&mut self, texture: &mut Texture, wrap: WrapMode) -> Result<(), RenderError> {
        let sampler = fix_npot(texture.width(), texture.height(), SamplerOptions { wrap, ..texture.sampler() });
        self.apply_sampler(texture, sampler)
    }

    fn apply_sampler(&mut self, texture: &mut Texture, sampler: SamplerOptions) -> Result<(), RenderError> {
        self.gpu.device.set_texture_sampler(texture.id(), &sampler)?;
        texture.set_sampler(sampler);
        Ok(())
    }

    pub fn delete_texture(&mut self, texture: Texture) {
        self.gpu.device.delete_texture(texture.id());
    }

    // ── sprite batchers ───────────────────────────────────────────────────

    /// Takes a sprite batcher out of the pool for the caller to hold.
    pub fn checkout(&mut self) -> Result<SpriteBatcher, RenderError> {
        self.pool.checkout(&mut self.gpu.device)
    }

    /// Returns a batcher to the pool, discarding anything still recorded.
    pub fn release(&mut self, batcher: SpriteBatcher) {
        self.pool.release(&mut self.gpu.device, batcher);
    }

    /// Draws one textured quad through the temp batcher.
    ///
    /// Each call is its own draw; hold a batcher from
    /// [`checkout`](Self::checkout) to batch.
    pub fn draw_textured(
        &mut self,
        texture: &Texture,
        quad: &Quad,
        color: Color,
        transform: Option<&Transform>,
    ) -> Result<(), RenderError> {
        let batcher = self.pool.temp(&mut self.gpu.device)?;
        batcher.begin(texture)?;
        let added = batcher.add_quad(quad, 0.0, color, transform);
        let ended = batcher.end(&mut self.gpu);
        added.and(ended)
    }

    // ── quads ─────────────────────────────────────────────────────────────

    pub fn begin_quads(&mut self) -> Result<(), RenderError> {
        self.quads.begin()
    }

    pub fn end_quads(&mut self) -> Result<(), RenderError> {
        self.quads.end(&mut self.gpu)
    }

    #[inline]
    pub fn in_quad_batch(&self) -> bool {
        self.quads.is_recording()
    }

    /// Solid rect at `(x, y)` sized `width` x `height`.
    pub fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) -> Result<(), RenderError> {
        self.draw_primitive(&Quad::rect(x, y, x + width, y + height), color)
    }

    /// Solid quad; corners in [`Quad`] order.
    pub fn draw_quad(&mut self, corners: [Vec2; 4], color: Color) -> Result<(), RenderError> {
        self.draw_primitive(&Quad::new(corners), color)
    }

    fn draw_primitive(&mut self, quad: &Quad, color: Color) -> Result<(), RenderError> {
        if self.quads.is_recording() {
            return self.quads.add_quad(quad, 0.0, color, None);
        }
        self.quads.begin()?;
        let added = self.quads.add_quad(quad, 0.0, color, None);
        let ended = self.quads.end(&mut self.gpu);
        added.and(ended)
    }
}

impl<D: GraphicsDevice> Drop for RenderContext<D> {
    fn drop(&mut self) {
        self.pool.drain(&mut self.gpu.device);
        self.quads.free(&mut self.gpu.device);
        self.gpu.release();
        log::debug!("render context released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::LayoutOptions;
    use crate::device::{DecodeError, DeviceCommand, DeviceError, HeadlessDevice, Viewport};
    use crate::render::PrimitiveVertex;

    fn ctx() -> RenderContext<HeadlessDevice> {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), RenderConfig::default()).unwrap();
        ctx.resize(320, 240).unwrap();
        ctx
    }

    fn image(width: u32, height: u32) -> DecodedImage {
        DecodedImage::from_rgba8(width, height, vec![255; (width * height * 4) as usize]).unwrap()
    }

    struct FixedDecoder(u32, u32);

    impl ImageDecoder for FixedDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
            if bytes.is_empty() {
                return Err(DecodeError::new("empty input"));
            }
            Ok(image(self.0, self.1))
        }
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn new_compiles_programs_and_creates_quad_batcher() {
        let ctx = RenderContext::new(HeadlessDevice::new(), RenderConfig::default()).unwrap();
        assert_eq!(ctx.device().live_programs(), 2);
        assert_eq!(ctx.device().live_buffers(), 1);
        assert!(ctx.gpu().quad_indices().buffer().is_none());
    }

    #[test]
    fn shader_failure_is_fatal() {
        let dev = HeadlessDevice::new().fail_compile("sprite", "bad token");
        let err = RenderContext::new(dev, RenderConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { .. }));
    }

    #[test]
    fn resize_updates_camera_resolution() {
        let ctx = ctx();
        assert_eq!(ctx.camera().resolution(), (320, 240));

        let config = RenderConfig {
            layout: LayoutOptions { resolution: Some((160, 120)), pixel_scaling: true, ..Default::default() },
            ..Default::default()
        };
        let mut fixed = RenderContext::new(HeadlessDevice::new(), config).unwrap();
        let layout = *fixed.resize(800, 600).unwrap();
        assert_eq!(fixed.camera().resolution(), (160, 120));
        assert_eq!(layout.scale, 5.0);
    }

    #[test]
    fn fixed_resolution_presents_letterboxed() {
        let config = RenderConfig {
            layout: LayoutOptions { resolution: Some((160, 120)), pixel_scaling: true, ..Default::default() },
            ..Default::default()
        };
        let mut ctx = RenderContext::new(HeadlessDevice::new(), config).unwrap();
        assert_eq!(ctx.device().frame_size(), Some((160, 120)));

        ctx.resize(800, 500).unwrap();
        ctx.draw_rect(0.0, 0.0, 160.0, 120.0, Color::WHITE).unwrap();
        ctx.present().unwrap();

        let viewport = Viewport { x: 80, y: 10, width: 640, height: 480 };
        assert_eq!(
            ctx.device().commands().last(),
            Some(&DeviceCommand::Present { viewport, filter: FilterMode::Nearest })
        );

        ctx.set_present_filter(FilterMode::Linear);
        ctx.present().unwrap();
        assert_eq!(
            ctx.device().commands().last(),
            Some(&DeviceCommand::Present { viewport, filter: FilterMode::Linear })
        );
    }

    #[test]
    fn frame_follows_internal_resolution() {
        let mut ctx = ctx();
        assert_eq!(ctx.device().frame_size(), Some((320, 240)));

        ctx.device_mut().take_commands();
        ctx.resize(320, 240).unwrap();
        assert!(ctx.device().commands().is_empty());

        ctx.resize(640, 360).unwrap();
        assert_eq!(ctx.device().commands(), [DeviceCommand::ResizeFrame { width: 640, height: 360 }]);
        ctx.present().unwrap();
        assert_eq!(
            ctx.device().commands().last(),
            Some(&DeviceCommand::Present {
                viewport: Viewport { x: 0, y: 0, width: 640, height: 360 },
                filter: FilterMode::Nearest,
            })
        );
    }

    #[test]
    fn clear_forwards_unit_color() {
        let mut ctx = ctx();
        ctx.clear(Color::WHITE).unwrap();
        assert_eq!(ctx.device().commands().last(), Some(&DeviceCommand::Clear([1.0; 4])));
    }

    // ── quads ─────────────────────────────────────────────────────────────

    #[test]
    fn implicit_quad_draws_flush_individually() {
        let mut ctx = ctx();
        ctx.draw_rect(0.0, 0.0, 10.0, 10.0, Color::WHITE).unwrap();
        ctx.draw_rect(10.0, 0.0, 10.0, 10.0, Color::WHITE).unwrap();
        assert_eq!(ctx.device().draw_calls().len(), 2);
        assert!(!ctx.in_quad_batch());
    }

    #[test]
    fn explicit_quad_batch_is_one_draw() {
        let mut ctx = ctx();
        ctx.begin_quads().unwrap();
        assert!(ctx.in_quad_batch());
        for i in 0..10 {
            ctx.draw_rect(i as f32 * 10.0, 0.0, 10.0, 10.0, Color::WHITE).unwrap();
        }
        ctx.draw_quad(
            [Vec2::new(0.0, 0.0), Vec2::new(0.0, 5.0), Vec2::new(5.0, 0.0), Vec2::new(6.0, 6.0)],
            Color::BLACK,
        )
        .unwrap();
        assert!(ctx.device().draw_calls().is_empty());

        ctx.end_quads().unwrap();
        let draws = ctx.device().draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 66);
    }

    #[test]
    fn draw_rect_uses_width_and_height() {
        let mut ctx = ctx();
        ctx.draw_rect(10.0, 10.0, 20.0, 20.0, Color::WHITE).unwrap();

        let draw = ctx.device().draw_calls()[0];
        let bytes = ctx.device().buffer_contents(draw.vertex_buffer).unwrap();
        let v: &[PrimitiveVertex] = bytemuck::cast_slice(&bytes[..64]);
        assert_eq!(v[0].position, [10.0, 10.0, 0.0]);
        assert_eq!(v[3].position, [30.0, 30.0, 0.0]);
    }

    #[test]
    fn quad_batch_protocol_errors() {
        let mut ctx = ctx();
        assert_eq!(ctx.end_quads(), Err(RenderError::BatchNotStarted));
        ctx.begin_quads().unwrap();
        assert_eq!(ctx.begin_quads(), Err(RenderError::BatchAlreadyStarted));
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn npot_texture_is_clamped() {
        let mut ctx = ctx();
        let options = TextureOptions::new(FilterMode::Linear, WrapMode::Repeat);
        let tex = ctx.create_texture(&image(3, 4), Some(options)).unwrap();
        assert_eq!(tex.sampler().wrap, WrapMode::ClampToEdge);
        assert_eq!(ctx.device().texture_sampler(tex.id()), Some(tex.sampler()));
    }

    #[test]
    fn invalid_texture_data_is_rejected_before_upload() {
        let mut ctx = RenderContext::new(
            HeadlessDevice::new().with_max_texture_dimension(64),
            RenderConfig::default(),
        )
        .unwrap();
        ctx.device_mut().take_commands();

        let empty = DecodedImage::from_rgba8(0, 0, vec![]).unwrap();
        let short = DecodedImage { width: 4, height: 4, pixels: vec![0; 3] };
        let huge = DecodedImage { width: 65, height: 1, pixels: vec![0; 65 * 4] };

        for image in [&empty, &short, &huge] {
            let err = ctx.create_texture(image, None).unwrap_err();
            assert!(
                matches!(err, RenderError::Device(DeviceError::InvalidTexture { .. })),
                "{}x{}: {err}",
                image.width,
                image.height
            );
        }
        assert!(ctx.device().commands().is_empty());
        assert_eq!(ctx.device().live_textures(), 0);
    }

    #[test]
    fn default_sampler_applies_without_options() {
        let mut ctx = ctx();
        let linear = TextureOptions::new(FilterMode::Linear, WrapMode::Repeat).sampler();
        ctx.set_default_sampler(linear);
        let tex = ctx.create_texture(&image(4, 4), None).unwrap();
        assert_eq!(tex.sampler(), linear);
    }

    #[test]
    fn filter_and_wrap_update_sampler() {
        let mut ctx = ctx();
        let mut tex = ctx.create_texture(&image(8, 8), None).unwrap();

        ctx.set_texture_filter(&mut tex, FilterMode::Linear).unwrap();
        ctx.set_texture_wrap(&mut tex, WrapMode::Repeat).unwrap();
        assert_eq!(tex.sampler().mag_filter, FilterMode::Linear);
        assert_eq!(tex.sampler().wrap, WrapMode::Repeat);
        assert_eq!(ctx.device().texture_sampler(tex.id()), Some(tex.sampler()));
    }

    #[test]
    fn load_texture_surfaces_decode_errors() {
        let mut ctx = ctx();
        let tex = ctx.load_texture(&FixedDecoder(2, 2), b"x", None).unwrap();
        assert_eq!((tex.width(), tex.height()), (2, 2));

        let err = ctx.load_texture(&FixedDecoder(2, 2), b"", None).unwrap_err();
        assert!(matches!(err, RenderError::Decode(_)));
    }

    #[test]
    fn delete_texture_frees_it() {
        let mut ctx = ctx();
        let tex = ctx.create_texture(&image(2, 2), None).unwrap();
        assert_eq!(ctx.device().texture_size(tex.id()), Some((2, 2)));
        assert_eq!(ctx.device().live_textures(), 1);
        ctx.delete_texture(tex);
        assert_eq!(ctx.device().live_textures(), 0);
    }

    // ── sprite batchers ───────────────────────────────────────────────────

    #[test]
    fn temp_draws_flush_between_calls() {
        let mut ctx = ctx();
        let tex = ctx.create_texture(&image(2, 2), None).unwrap();
        let quad = Quad::rect(0.0, 0.0, 2.0, 2.0);

        ctx.draw_textured(&tex, &quad, Color::WHITE, None).unwrap();
        ctx.draw_textured(&tex, &quad, Color::WHITE, None).unwrap();

        let draws = ctx.device().draw_calls();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].vertex_buffer, draws[1].vertex_buffer);
    }

    #[test]
    fn held_batcher_flushes_once() {
        let mut ctx = ctx();
        let tex = ctx.create_texture(&image(2, 2), None).unwrap();

        let mut batcher = ctx.checkout().unwrap();
        batcher.begin(&tex).unwrap();
        for i in 0..20 {
            let x = i as f32;
            batcher.add_rect(x, 0.0, x + 1.0, 1.0, 0.0, Color::WHITE, None).unwrap();
        }
        batcher.end(ctx.gpu_mut()).unwrap();
        ctx.release(batcher);

        let draws = ctx.device().draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 120);
        assert_eq!(ctx.pool().idle_count(), 1);
    }

    #[test]
    fn draw_order_is_preserved() {
        let mut ctx = ctx();
        let tex = ctx.create_texture(&image(2, 2), None).unwrap();

        ctx.draw_rect(0.0, 0.0, 1.0, 1.0, Color::WHITE).unwrap();
        ctx.draw_textured(&tex, &Quad::rect(0.0, 0.0, 1.0, 1.0), Color::WHITE, None).unwrap();
        ctx.draw_rect(0.0, 0.0, 1.0, 1.0, Color::WHITE).unwrap();

        let programs: Vec<_> = ctx.device().draw_calls().iter().map(|d| d.program).collect();
        assert_eq!(programs.len(), 3);
        assert_eq!(programs[0], programs[2]);
        assert_ne!(programs[0], programs[1]);
    }

    #[test]
    fn drop_frees_every_gpu_object() {
        let mut dev = HeadlessDevice::new();
        {
            let mut ctx = RenderContext::new(&mut dev, RenderConfig::default()).unwrap();
            ctx.resize(64, 64).unwrap();
            let tex = ctx.create_texture(&image(2, 2), None).unwrap();
            ctx.draw_textured(&tex, &Quad::rect(0.0, 0.0, 1.0, 1.0), Color::WHITE, None).unwrap();
            let held = ctx.checkout().unwrap();
            ctx.release(held);
            ctx.delete_texture(tex);
        }
        assert_eq!(dev.live_buffers(), 0);
        assert_eq!(dev.live_programs(), 0);
        assert_eq!(dev.live_textures(), 0);
    }
}
