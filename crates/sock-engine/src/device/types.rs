//! Handles and descriptors exchanged with a [`GraphicsDevice`](super::GraphicsDevice).

/// Opaque GPU buffer handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u32);

/// Opaque GPU texture handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

/// Opaque compiled + linked program handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
    /// Four bytes read as a normalized `vec4`.
    Unorm8x4,
}

impl AttributeFormat {
    pub const fn size(self) -> u32 {
        match self {
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Unorm8x4 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub format: AttributeFormat,
    pub offset: u32,
}

/// Interleaved vertex layout bound with a program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: &'static [VertexAttribute],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SamplerOptions {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap: WrapMode,
}

/// Everything a backend needs to compile and link one program.
///
/// `uniforms` are `mat3` slots addressed by position; `textures` are sampled
/// 2D texture slots addressed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub layout: VertexLayout,
    pub uniforms: &'a [&'a str],
    pub textures: &'a [&'a str],
}

/// One indexed triangle-list draw using 16-bit indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawIndexed {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
}

/// Destination rectangle on the screen target, in pixels from the top-left.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Returns `true` if the rectangle lies inside a `width` x `height` target.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}
