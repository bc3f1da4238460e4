use std::collections::HashMap;

use anyhow::{Context, Result};

use super::{
    validate_texture, AttributeFormat, BufferId, BufferKind, DeviceError, DrawIndexed, FilterMode,
    GraphicsDevice, ProgramDesc, ProgramId, SamplerOptions, TextureId, Viewport, WrapMode,
};

/// `mat3x3<f32>` in a uniform block: three columns padded to 16 bytes.
const MAT3_UNIFORM_SIZE: u64 = 48;

/// Full-screen quad sampling the offscreen frame.
const BLIT_SOURCE: &str = r#"
@group(0) @binding(0) var frame: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(-1.0, 1.0),
        vec2<f32>(-1.0, 1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
    );
    let p = corners[index];
    var out: VertexOutput;
    out.clip = vec4<f32>(p, 0.0, 1.0);
    out.uv = vec2<f32>(0.5 + p.x * 0.5, 0.5 - p.y * 0.5);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame, frame_sampler, in.uv);
}
"#;

/// Initialization parameters for a standalone [`WgpuDevice`].
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Adapter preference.
    pub power_preference: wgpu::PowerPreference,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Color format of the views that will be bound as render targets.
    pub target_format: wgpu::TextureFormat,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::default(),
            target_format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    kind: BufferKind,
    size: u64,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Offscreen color target at the internal resolution.
struct Frame {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Pipeline that scales the frame onto the screen target.
struct Blit {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
}

impl Blit {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sock blit shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SOURCE.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sock blit bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sock blit pipeline layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sock blit"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = |filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("sock blit sampler"),
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };

        Self {
            pipeline,
            layout,
            nearest: sampler(wgpu::FilterMode::Nearest),
            linear: sampler(wgpu::FilterMode::Linear),
        }
    }
}

struct GpuProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: Option<wgpu::BindGroupLayout>,
    bound_textures: Vec<Option<TextureId>>,
}

/// [`GraphicsDevice`] on top of wgpu.
///
/// Clears and draws render into an offscreen frame created by
/// [`resize_frame`](GraphicsDevice::resize_frame);
/// [`present`](GraphicsDevice::present) scales it into the view last passed to
/// [`set_target`](Self::set_target) (usually a surface texture view). Each
/// draw records its own encoder and is submitted right away, so uniform
/// writes and buffer updates issued between draws land in order.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    target: Option<wgpu::TextureView>,
    frame: Option<Frame>,
    blit: Option<Blit>,

    next_id: u32,
    buffers: HashMap<BufferId, GpuBuffer>,
    textures: HashMap<TextureId, GpuTexture>,
    programs: HashMap<ProgramId, GpuProgram>,
}

impl WgpuDevice {
    /// Wraps an existing device/queue (typically owned by the windowing layer).
    pub fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
            target: None,
            frame: None,
            blit: None,
            next_id: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
        }
    }

    /// Creates a device without a surface (offscreen rendering).
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks.
    pub fn request(init: WgpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("sock-engine device"),
            required_features: wgpu::Features::empty(),
            required_limits: init.required_limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .context("failed to create wgpu device/queue")?;

        log::info!("wgpu device ready: {:?}", adapter.get_info().name);

        Ok(Self::from_parts(device, queue, init.target_format))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Binds the screen view frames are presented into. Until a frame
    /// exists, clears and draws go straight to this view.
    pub fn set_target(&mut self, view: wgpu::TextureView) {
        self.target = Some(view);
    }

    fn render_view(&self) -> Result<&wgpu::TextureView, DeviceError> {
        self.frame
            .as_ref()
            .map(|frame| &frame.view)
            .or(self.target.as_ref())
            .ok_or(DeviceError::NoTarget)
    }

    /// Runs `f` inside an out-of-memory error scope so a failed allocation
    /// comes back as an error instead of reaching the uncaptured handler.
    fn catch_oom<T>(
        &self,
        requested: u64,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, DeviceError> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = f(&self.device);
        match pollster::block_on(scope.pop()) {
            None => Ok(value),
            Some(e) => {
                log::warn!("GPU allocation of {requested} bytes failed: {e}");
                Err(DeviceError::OutOfMemory { requested })
            }
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn new_buffer(&self, kind: BufferKind, size: u64) -> Result<wgpu::Buffer, DeviceError> {
        // Copies must be 4-byte aligned; never allocate zero bytes.
        let size = size.max(4).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if size > self.device.limits().max_buffer_size {
            return Err(DeviceError::OutOfMemory { requested: size });
        }

        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        self.catch_oom(size, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(match kind {
                    BufferKind::Vertex => "sock vertex buffer",
                    BufferKind::Index => "sock index buffer",
                }),
                size,
                usage,
                mapped_at_creation: false,
            })
        })
    }

    fn new_sampler(&self, sampler: &SamplerOptions) -> wgpu::Sampler {
        let wrap = address_mode(sampler.wrap);
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sock sampler"),
            address_mode_u: wrap,
            address_mode_v: wrap,
            address_mode_w: wrap,
            mag_filter: filter_mode(sampler.mag_filter),
            min_filter: filter_mode(sampler.min_filter),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        })
    }

    fn color_pass<'e>(
        encoder: &'e mut wgpu::CommandEncoder,
        view: &'e wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sock batch pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferId, DeviceError> {
        let buffer = self.new_buffer(kind, size)?;
        let id = BufferId(self.next_id());
        self.buffers.insert(id, GpuBuffer { buffer, kind, size });
        Ok(id)
    }

    fn allocate_buffer(&mut self, id: BufferId, size: u64) -> Result<(), DeviceError> {
        let kind = self.buffers.get(&id).ok_or(DeviceError::UnknownBuffer(id))?.kind;
        let buffer = self.new_buffer(kind, size)?;

        if let Some(old) = self.buffers.insert(id, GpuBuffer { buffer, kind, size }) {
            old.buffer.destroy();
        }
        Ok(())
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let entry = self.buffers.get(&id).ok_or(DeviceError::UnknownBuffer(id))?;
        if offset + data.len() as u64 > entry.size {
            return Err(DeviceError::Backend(format!(
                "write of {} bytes at {offset} overruns buffer of {} bytes",
                data.len(),
                entry.size
            )));
        }
        self.queue.write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if let Some(entry) = self.buffers.remove(&id) {
            entry.buffer.destroy();
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError> {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(DeviceError::Compile {
                label: desc.label.to_owned(),
                log: errors.join("\n"),
            });
        }

        let uniform_size = (desc.uniforms.len() as u64 * MAT3_UNIFORM_SIZE).max(MAT3_UNIFORM_SIZE);
        let uniform_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sock uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sock uniform ubo"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sock uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = (!desc.textures.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..desc.textures.len() as u32)
                .flat_map(|slot| {
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: slot * 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: slot * 2 + 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ]
                })
                .collect();

            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("sock texture bgl"),
                entries: &entries,
            })
        });

        let mut layouts = vec![&uniform_layout];
        if let Some(tl) = texture_layout.as_ref() {
            layouts.push(tl);
        }
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sock pipeline layout"),
            bind_group_layouts: &layouts,
            immediate_size: 0,
        });

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .layout
            .attributes
            .iter()
            .enumerate()
            .map(|(location, attr)| wgpu::VertexAttribute {
                format: vertex_format(attr.format),
                offset: attr.offset as u64,
                shader_location: location as u32,
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: desc.layout.stride as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            GpuProgram {
                label: desc.label.to_owned(),
                pipeline,
                uniform_buffer,
                uniform_bind_group,
                texture_layout,
                bound_textures: vec![None; desc.textures.len()],
            },
        );
        log::debug!("compiled program \"{}\" as {id:?}", desc.label);
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        if let Some(program) = self.programs.remove(&id) {
            program.uniform_buffer.destroy();
        }
    }

    fn set_uniform_mat3(
        &mut self,
        program: ProgramId,
        slot: u32,
        matrix: &[f32; 9],
    ) -> Result<(), DeviceError> {
        let entry = self.programs.get(&program).ok_or(DeviceError::UnknownProgram(program))?;
        let padded = pad_mat3(matrix);
        self.queue.write_buffer(
            &entry.uniform_buffer,
            slot as u64 * MAT3_UNIFORM_SIZE,
            bytemuck::cast_slice(&padded),
        );
        Ok(())
    }

    fn bind_texture(
        &mut self,
        program: ProgramId,
        slot: u32,
        texture: TextureId,
    ) -> Result<(), DeviceError> {
        if !self.textures.contains_key(&texture) {
            return Err(DeviceError::UnknownTexture(texture));
        }
        let entry = self.programs.get_mut(&program).ok_or(DeviceError::UnknownProgram(program))?;
        let label = entry.label.clone();
        let bound = entry.bound_textures.get_mut(slot as usize).ok_or_else(|| {
            DeviceError::Backend(format!("program \"{label}\" has no texture slot {slot}"))
        })?;
        *bound = Some(texture);
        Ok(())
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        sampler: &SamplerOptions,
    ) -> Result<TextureId, DeviceError> {
        validate_texture(width, height, rgba.len(), self.max_texture_dimension())?;
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };

        let texture = self.catch_oom(rgba.len() as u64, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("sock texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.new_sampler(sampler);

        let id = TextureId(self.next_id());
        self.textures.insert(id, GpuTexture { texture, view, sampler });
        Ok(id)
    }

    fn set_texture_sampler(
        &mut self,
        id: TextureId,
        sampler: &SamplerOptions,
    ) -> Result<(), DeviceError> {
        if !self.textures.contains_key(&id) {
            return Err(DeviceError::UnknownTexture(id));
        }
        let sampler = self.new_sampler(sampler);
        if let Some(entry) = self.textures.get_mut(&id) {
            entry.sampler = sampler;
        }
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) {
        if let Some(entry) = self.textures.remove(&id) {
            entry.texture.destroy();
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn resize_frame(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let max = self.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::Backend(format!(
                "cannot create a {width}x{height} frame (limit {max})"
            )));
        }

        let format = self.target_format;
        let texture = self.catch_oom(width as u64 * height as u64 * 4, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("sock frame"),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(old) = self.frame.replace(Frame { texture, view }) {
            old.texture.destroy();
        }
        log::debug!("offscreen frame is {width}x{height}");
        Ok(())
    }

    fn present(&mut self, viewport: &Viewport, filter: FilterMode) -> Result<(), DeviceError> {
        let blit = self.blit.get_or_insert_with(|| Blit::new(&self.device, self.target_format));
        let target = self.target.as_ref().ok_or(DeviceError::NoTarget)?;
        let frame = self.frame.as_ref().ok_or(DeviceError::NoTarget)?;

        let (width, height) = (target.texture().width(), target.texture().height());
        if !viewport.fits(width, height) {
            return Err(DeviceError::Backend(format!(
                "viewport {viewport:?} exceeds the {width}x{height} target"
            )));
        }

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sock blit bind group"),
            layout: &blit.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&frame.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(match filter {
                        FilterMode::Nearest => &blit.nearest,
                        FilterMode::Linear => &blit.linear,
                    }),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sock present encoder"),
        });
        {
            let mut pass =
                Self::color_pass(&mut encoder, target, wgpu::LoadOp::Clear(wgpu::Color::BLACK));
            if viewport.width > 0 && viewport.height > 0 {
                pass.set_viewport(
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_pipeline(&blit.pipeline);
                pass.set_bind_group(0, &group, &[]);
                pass.draw(0..6, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError> {
        let view = self.render_view()?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sock clear encoder"),
        });

        let [r, g, b, a] = color.map(f64::from);
        drop(Self::color_pass(
            &mut encoder,
            view,
            wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
        ));

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawIndexed) -> Result<(), DeviceError> {
        let view = self.render_view()?;
        let program = self
            .programs
            .get(&draw.program)
            .ok_or(DeviceError::UnknownProgram(draw.program))?;
        let vertices = self
            .buffers
            .get(&draw.vertex_buffer)
            .ok_or(DeviceError::UnknownBuffer(draw.vertex_buffer))?;
        let indices = self
            .buffers
            .get(&draw.index_buffer)
            .ok_or(DeviceError::UnknownBuffer(draw.index_buffer))?;

        let texture_group = match program.texture_layout.as_ref() {
            None => None,
            Some(layout) => {
                let mut entries = Vec::with_capacity(program.bound_textures.len() * 2);
                for (slot, bound) in program.bound_textures.iter().enumerate() {
                    let id = bound.ok_or_else(|| {
                        DeviceError::Backend(format!(
                            "program \"{}\" drawn with texture slot {slot} unbound",
                            program.label
                        ))
                    })?;
                    let tex = self.textures.get(&id).ok_or(DeviceError::UnknownTexture(id))?;
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot as u32 * 2,
                        resource: wgpu::BindingResource::TextureView(&tex.view),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot as u32 * 2 + 1,
                        resource: wgpu::BindingResource::Sampler(&tex.sampler),
                    });
                }
                Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("sock texture bind group"),
                    layout,
                    entries: &entries,
                }))
            }
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sock draw encoder"),
        });
        {
            let mut pass = Self::color_pass(&mut encoder, view, wgpu::LoadOp::Load);
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &program.uniform_bind_group, &[]);
            if let Some(group) = texture_group.as_ref() {
                pass.set_bind_group(1, group, &[]);
            }
            pass.set_vertex_buffer(0, vertices.buffer.slice(..));
            pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

/// Lays a column-major `mat3` out as three 16-byte uniform columns.
fn pad_mat3(m: &[f32; 9]) -> [f32; 12] {
    [
        m[0], m[1], m[2], 0.0, //
        m[3], m[4], m[5], 0.0, //
        m[6], m[7], m[8], 0.0,
    ]
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat3_columns_are_padded() {
        let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let padded = pad_mat3(&m);
        assert_eq!(padded, [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]);
        assert_eq!(std::mem::size_of_val(&padded) as u64, MAT3_UNIFORM_SIZE);
    }

    #[test]
    fn attribute_formats_match_sizes() {
        for format in [AttributeFormat::Float32x2, AttributeFormat::Float32x3, AttributeFormat::Unorm8x4] {
            assert_eq!(vertex_format(format).size(), format.size() as u64);
        }
        assert_eq!(vertex_format(AttributeFormat::Unorm8x4), wgpu::VertexFormat::Unorm8x4);
    }

    #[test]
    fn sampler_modes_map_to_wgpu() {
        assert_eq!(filter_mode(FilterMode::Nearest), wgpu::FilterMode::Nearest);
        assert_eq!(filter_mode(FilterMode::Linear), wgpu::FilterMode::Linear);
        assert_eq!(address_mode(WrapMode::ClampToEdge), wgpu::AddressMode::ClampToEdge);
        assert_eq!(address_mode(WrapMode::Repeat), wgpu::AddressMode::Repeat);
        assert_eq!(address_mode(WrapMode::MirroredRepeat), wgpu::AddressMode::MirrorRepeat);
    }
}
