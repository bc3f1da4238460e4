//! Vertex formats written by the batchers.

use bytemuck::{Pod, Zeroable};

use crate::coords::Vec2;
use crate::device::{AttributeFormat, VertexAttribute, VertexLayout};
use crate::paint::Color;

/// Which program draws a vertex format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexKind {
    Sprite,
    Primitive,
}

/// A vertex format a [`VertexBatcher`](super::VertexBatcher) can accumulate.
pub trait BatchVertex: Pod {
    const KIND: VertexKind;
    const LAYOUT: VertexLayout;

    /// Builds one quad corner. Formats without texture coordinates ignore `uv`.
    fn corner(position: Vec2, z: f32, color: Color, uv: Vec2) -> Self;
}

/// Textured vertex: position, RGBA8 color, texture coordinates (24 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
}

/// Untextured vertex: position and RGBA8 color (16 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PrimitiveVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
}

const SPRITE_ATTRIBUTES: &[VertexAttribute] = &[
    VertexAttribute { name: "position", format: AttributeFormat::Float32x3, offset: 0 },
    VertexAttribute { name: "color", format: AttributeFormat::Unorm8x4, offset: 12 },
    VertexAttribute { name: "uv", format: AttributeFormat::Float32x2, offset: 16 },
];

const PRIMITIVE_ATTRIBUTES: &[VertexAttribute] = &[
    VertexAttribute { name: "position", format: AttributeFormat::Float32x3, offset: 0 },
    VertexAttribute { name: "color", format: AttributeFormat::Unorm8x4, offset: 12 },
];

impl BatchVertex for SpriteVertex {
    const KIND: VertexKind = VertexKind::Sprite;
    const LAYOUT: VertexLayout = VertexLayout { stride: 24, attributes: SPRITE_ATTRIBUTES };

    #[inline]
    fn corner(position: Vec2, z: f32, color: Color, uv: Vec2) -> Self {
        Self {
            position: [position.x, position.y, z],
            color: [color.r, color.g, color.b, color.a],
            uv: [uv.x, uv.y],
        }
    }
}

impl BatchVertex for PrimitiveVertex {
    const KIND: VertexKind = VertexKind::Primitive;
    const LAYOUT: VertexLayout = VertexLayout { stride: 16, attributes: PRIMITIVE_ATTRIBUTES };

    #[inline]
    fn corner(position: Vec2, z: f32, color: Color, _uv: Vec2) -> Self {
        Self {
            position: [position.x, position.y, z],
            color: [color.r, color.g, color.b, color.a],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_match_struct_sizes() {
        assert_eq!(size_of::<SpriteVertex>(), 24);
        assert_eq!(size_of::<PrimitiveVertex>(), 16);
        assert_eq!(SpriteVertex::LAYOUT.stride as usize, size_of::<SpriteVertex>());
        assert_eq!(PrimitiveVertex::LAYOUT.stride as usize, size_of::<PrimitiveVertex>());
    }

    #[test]
    fn attributes_tile_the_stride() {
        for layout in [SpriteVertex::LAYOUT, PrimitiveVertex::LAYOUT] {
            let end = layout.attributes.iter().map(|a| a.offset + a.format.size()).max();
            assert_eq!(end, Some(layout.stride));
        }
    }

    #[test]
    fn color_bytes_are_in_memory_order() {
        let v = PrimitiveVertex::corner(Vec2::new(1.0, 2.0), 0.5, Color::rgba(1, 2, 3, 4), Vec2::zero());
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(&bytes[12..16], &[1, 2, 3, 4]);
        assert_eq!(v.position, [1.0, 2.0, 0.5]);
    }
}
