//! In-memory [`GraphicsDevice`] that records every call.
//!
//! Buffer contents are kept byte-exact, so callers can inspect exactly what
//! would have been uploaded to the GPU.

use std::collections::HashMap;

use super::{
    validate_texture, BufferId, BufferKind, DeviceError, DrawIndexed, FilterMode, GraphicsDevice,
    ProgramDesc, ProgramId, SamplerOptions, TextureId, Viewport,
};

/// Texture size limit reported unless overridden; matches wgpu's default limits.
pub const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateBuffer { id: BufferId, kind: BufferKind, size: u64 },
    AllocateBuffer { id: BufferId, size: u64 },
    WriteBuffer { id: BufferId, offset: u64, len: usize },
    DeleteBuffer(BufferId),
    CreateProgram { id: ProgramId, label: String },
    DeleteProgram(ProgramId),
    SetUniformMat3 { program: ProgramId, slot: u32, matrix: [f32; 9] },
    BindTexture { program: ProgramId, slot: u32, texture: TextureId },
    CreateTexture { id: TextureId, width: u32, height: u32 },
    SetTextureSampler { id: TextureId, sampler: SamplerOptions },
    DeleteTexture(TextureId),
    ResizeFrame { width: u32, height: u32 },
    Present { viewport: Viewport, filter: FilterMode },
    Clear([f32; 4]),
    DrawIndexed(DrawIndexed),
}

#[derive(Debug)]
struct HeadlessBuffer {
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessTexture {
    width: u32,
    height: u32,
    sampler: SamplerOptions,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    commands: Vec<DeviceCommand>,
    buffers: HashMap<BufferId, HeadlessBuffer>,
    textures: HashMap<TextureId, HeadlessTexture>,
    programs: HashMap<ProgramId, String>,
    next_id: u32,
    max_buffer_size: Option<u64>,
    max_texture_dimension: Option<u32>,
    frame: Option<(u32, u32)>,
    failing_programs: HashMap<String, String>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes any buffer allocation larger than `bytes` fail with
    /// [`DeviceError::OutOfMemory`].
    pub fn with_max_buffer_size(mut self, bytes: u64) -> Self {
        self.max_buffer_size = Some(bytes);
        self
    }

    /// Lowers the largest texture width or height the device accepts.
    pub fn with_max_texture_dimension(mut self, dimension: u32) -> Self {
        self.max_texture_dimension = Some(dimension);
        self
    }

    /// Makes compiling the program labelled `label` fail with `log`.
    pub fn fail_compile(mut self, label: &str, log: &str) -> Self {
        self.failing_programs.insert(label.to_owned(), log.to_owned());
        self
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Returns and clears the recorded commands. Resource state is kept.
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> Vec<DrawIndexed> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawIndexed(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.data.as_slice())
    }

    pub fn buffer_kind(&self, id: BufferId) -> Option<BufferKind> {
        self.buffers.get(&id).map(|b| b.kind)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).map(|t| (t.width, t.height))
    }

    /// Size of the offscreen frame, once one has been created.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame
    }

    pub fn texture_sampler(&self, id: TextureId) -> Option<SamplerOptions> {
        self.textures.get(&id).map(|t| t.sampler)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_size(&self, size: u64) -> Result<(), DeviceError> {
        match self.max_buffer_size {
            Some(max) if size > max => Err(DeviceError::OutOfMemory { requested: size }),
            _ => Ok(()),
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferId, DeviceError> {
        self.check_size(size)?;
        let id = BufferId(self.next_id());
        self.buffers.insert(id, HeadlessBuffer { kind, data: vec![0; size as usize] });
        self.commands.push(DeviceCommand::CreateBuffer { id, kind, size });
        Ok(id)
    }

    fn allocate_buffer(&mut self, id: BufferId, size: u64) -> Result<(), DeviceError> {
        self.check_size(size)?;
        let buffer = self.buffers.get_mut(&id).ok_or(DeviceError::UnknownBuffer(id))?;
        buffer.data = vec![0; size as usize];
        self.commands.push(DeviceCommand::AllocateBuffer { id, size });
        Ok(())
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self.buffers.get_mut(&id).ok_or(DeviceError::UnknownBuffer(id))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.data.len() {
            return Err(DeviceError::Backend(format!(
                "write of {} bytes at {offset} overruns buffer of {} bytes",
                data.len(),
                buffer.data.len()
            )));
        }
        buffer.data[start..end].copy_from_slice(data);
        self.commands.push(DeviceCommand::WriteBuffer { id, offset, len: data.len() });
        Ok(())
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_some() {
            self.commands.push(DeviceCommand::DeleteBuffer(id));
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError> {
        if let Some(log) = self.failing_programs.get(desc.label) {
            return Err(DeviceError::Compile { label: desc.label.to_owned(), log: log.clone() });
        }
        let id = ProgramId(self.next_id());
        self.programs.insert(id, desc.label.to_owned());
        self.commands.push(DeviceCommand::CreateProgram { id, label: desc.label.to_owned() });
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        if self.programs.remove(&id).is_some() {
            self.commands.push(DeviceCommand::DeleteProgram(id));
        }
    }

    fn set_uniform_mat3(
        &mut self,
        program: ProgramId,
        slot: u32,
        matrix: &[f32; 9],
    ) -> Result<(), DeviceError> {
        if !self.programs.contains_key(&program) {
            return Err(DeviceError::UnknownProgram(program));
        }
        self.commands.push(DeviceCommand::SetUniformMat3 { program, slot, matrix: *matrix });
        Ok(())
    }

    fn bind_texture(
        &mut self,
        program: ProgramId,
        slot: u32,
        texture: TextureId,
    ) -> Result<(), DeviceError> {
        if !self.programs.contains_key(&program) {
            return Err(DeviceError::UnknownProgram(program));
        }
        if !self.textures.contains_key(&texture) {
            return Err(DeviceError::UnknownTexture(texture));
        }
        self.commands.push(DeviceCommand::BindTexture { program, slot, texture });
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
        let id = TextureId(self.next_id());
        self.textures.insert(id, HeadlessTexture { width, height, sampler: *sampler });
        self.commands.push(DeviceCommand::CreateTexture { id, width, height });
        Ok(id)
    }

    fn set_texture_sampler(
        &mut self,
        id: TextureId,
        sampler: &SamplerOptions,
    ) -> Result<(), DeviceError> {
        let texture = self.textures.get_mut(&id).ok_or(DeviceError::UnknownTexture(id))?;
        texture.sampler = *sampler;
        self.commands.push(DeviceCommand::SetTextureSampler { id, sampler: *sampler });
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            self.commands.push(DeviceCommand::DeleteTexture(id));
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension.unwrap_or(DEFAULT_MAX_TEXTURE_DIMENSION)
    }

    fn resize_frame(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let max = self.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::Backend(format!("cannot create a {width}x{height} frame")));
        }
        self.frame = Some((width, height));
        self.commands.push(DeviceCommand::ResizeFrame { width, height });
        Ok(())
    }

    fn present(&mut self, viewport: &Viewport, filter: FilterMode) -> Result<(), DeviceError> {
        if self.frame.is_none() {
            return Err(DeviceError::NoTarget);
        }
        self.commands.push(DeviceCommand::Present { viewport: *viewport, filter });
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), DeviceError> {
        self.commands.push(DeviceCommand::Clear(color));
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawIndexed) -> Result<(), DeviceError> {
        if !self.programs.contains_key(&draw.program) {
            return Err(DeviceError::UnknownProgram(draw.program));
        }
        for id in [draw.vertex_buffer, draw.index_buffer] {
            if !self.buffers.contains_key(&id) {
                return Err(DeviceError::UnknownBuffer(id));
            }
        }
        self.commands.push(DeviceCommand::DrawIndexed(*draw));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_reallocates_and_records() {
        let mut dev = HeadlessDevice::new();
        let id = dev.create_buffer(BufferKind::Vertex, 4).unwrap();
        dev.upload_buffer(id, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(dev.buffer_contents(id), Some(&[1, 2, 3, 4, 5, 6, 7, 8][..]));
        assert_eq!(
            dev.commands()[1..],
            [
                DeviceCommand::AllocateBuffer { id, size: 8 },
                DeviceCommand::WriteBuffer { id, offset: 0, len: 8 },
            ]
        );
    }

    #[test]
    fn overrunning_write_is_rejected() {
        let mut dev = HeadlessDevice::new();
        let id = dev.create_buffer(BufferKind::Index, 4).unwrap();
        assert_eq!(dev.buffer_kind(id), Some(BufferKind::Index));
        assert!(dev.write_buffer(id, 2, &[0; 4]).is_err());
        assert_eq!(dev.buffer_contents(id), Some(&[0, 0, 0, 0][..]));
    }

    #[test]
    fn size_limit_simulates_allocation_failure() {
        let mut dev = HeadlessDevice::new().with_max_buffer_size(16);
        let id = dev.create_buffer(BufferKind::Vertex, 16).unwrap();
        assert_eq!(
            dev.allocate_buffer(id, 32),
            Err(DeviceError::OutOfMemory { requested: 32 })
        );
        assert_eq!(dev.buffer_contents(id).map(<[u8]>::len), Some(16));
    }

    #[test]
    fn deleting_unknown_handles_records_nothing() {
        let mut dev = HeadlessDevice::new();
        dev.delete_buffer(BufferId(42));
        dev.delete_texture(TextureId(42));
        assert!(dev.commands().is_empty());
    }

    #[test]
    fn textures_are_validated() {
        let mut dev = HeadlessDevice::new().with_max_texture_dimension(4);
        let sampler = SamplerOptions::default();

        let id = dev.create_texture(4, 2, &[0; 32], &sampler).unwrap();
        assert_eq!(dev.texture_size(id), Some((4, 2)));

        for (w, h, len) in [(0, 0, 0), (8, 1, 32), (2, 2, 3)] {
            let err = dev.create_texture(w, h, &vec![0; len], &sampler).unwrap_err();
            assert!(matches!(err, DeviceError::InvalidTexture { .. }), "{w}x{h}: {err}");
        }
        assert_eq!(dev.live_textures(), 1);
    }

    #[test]
    fn present_requires_frame() {
        let mut dev = HeadlessDevice::new();
        let viewport = Viewport { x: 0, y: 0, width: 4, height: 4 };
        assert_eq!(dev.present(&viewport, FilterMode::Nearest), Err(DeviceError::NoTarget));

        dev.resize_frame(4, 4).unwrap();
        dev.present(&viewport, FilterMode::Linear).unwrap();
        assert_eq!(dev.frame_size(), Some((4, 4)));
        assert_eq!(
            dev.commands(),
            [
                DeviceCommand::ResizeFrame { width: 4, height: 4 },
                DeviceCommand::Present { viewport, filter: FilterMode::Linear },
            ]
        );
    }
}
