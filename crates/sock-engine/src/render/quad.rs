use crate::coords::Vec2;

/// Four corners plus their texture coordinates.
///
/// Corners are ordered top-left, bottom-left, top-right, bottom-right for a
/// rect: the index buffer draws triangles `0 1 2` and `1 3 2`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    pub corners: [Vec2; 4],
    pub uvs: [Vec2; 4],
}

const FULL_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
];

impl Quad {
    /// Arbitrary quad mapped to the whole texture.
    pub const fn new(corners: [Vec2; 4]) -> Self {
        Self { corners, uvs: FULL_UVS }
    }

    /// Axis-aligned rect between `(x1, y1)` and `(x2, y2)`.
    pub const fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new([
            Vec2::new(x1, y1),
            Vec2::new(x1, y2),
            Vec2::new(x2, y1),
            Vec2::new(x2, y2),
        ])
    }

    /// Maps the quad to the normalized texture region `(u1, v1)..(u2, v2)`.
    pub const fn with_uv_rect(mut self, u1: f32, v1: f32, u2: f32, v2: f32) -> Self {
        self.uvs = [
            Vec2::new(u1, v1),
            Vec2::new(u1, v2),
            Vec2::new(u2, v1),
            Vec2::new(u2, v2),
        ];
        self
    }

    pub fn is_finite(&self) -> bool {
        self.corners.iter().chain(&self.uvs).all(|p| p.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_corner_order() {
        let q = Quad::rect(10.0, 10.0, 30.0, 30.0);
        assert_eq!(
            q.corners,
            [
                Vec2::new(10.0, 10.0),
                Vec2::new(10.0, 30.0),
                Vec2::new(30.0, 10.0),
                Vec2::new(30.0, 30.0),
            ]
        );
        assert_eq!(q.uvs, FULL_UVS);
    }

    #[test]
    fn uv_rect_follows_corner_order() {
        let q = Quad::rect(0.0, 0.0, 1.0, 1.0).with_uv_rect(0.25, 0.5, 0.75, 1.0);
        assert_eq!(q.uvs[1], Vec2::new(0.25, 1.0));
        assert_eq!(q.uvs[2], Vec2::new(0.75, 0.5));
    }

    #[test]
    fn nan_corner_is_not_finite() {
        let mut q = Quad::rect(0.0, 0.0, 1.0, 1.0);
        assert!(q.is_finite());
        q.corners[3].y = f32::NAN;
        assert!(!q.is_finite());
    }
}
