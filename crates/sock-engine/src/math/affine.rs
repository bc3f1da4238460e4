use std::f32::consts::TAU;
use std::ops::Mul;

use crate::coords::Vec2;
use crate::error::RenderError;

/// 2D affine transform stored as `[a, b, c, d, tx, ty]`.
///
/// Represents the matrix
///
/// ```text
/// | a  c  tx |
/// | b  d  ty |
/// | 0  0  1  |
/// ```
///
/// so a point maps as `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.
///
/// Angles are turn fractions (`0.25` is a quarter turn), not radians.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine {
    m: [f32; 6],
}

impl Affine {
    pub const IDENTITY: Affine = Affine { m: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] };

    pub const LEN: usize = 6;

    #[inline]
    pub const fn from_array(m: [f32; 6]) -> Self {
        Self { m }
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 6] {
        self.m
    }

    pub const fn translation(x: f32, y: f32) -> Self {
        Self { m: [1.0, 0.0, 0.0, 1.0, x, y] }
    }

    pub fn rotation(turns: f32) -> Self {
        let (sin, cos) = (turns * TAU).sin_cos();
        Self { m: [cos, sin, -sin, cos, 0.0, 0.0] }
    }

    pub const fn scaling(x: f32, y: f32) -> Self {
        Self { m: [x, 0.0, 0.0, y, 0.0, 0.0] }
    }

    /// Applies a rotation after the transform's current effect.
    pub fn rotate(&mut self, turns: f32) -> &mut Self {
        self.premultiply(&Affine::rotation(turns))
    }

    /// Applies a scale after the transform's current effect.
    pub fn scale(&mut self, x: f32, y: f32) -> &mut Self {
        self.premultiply(&Affine::scaling(x, y))
    }

    /// Applies a translation after the transform's current effect.
    pub fn translate(&mut self, x: f32, y: f32) -> &mut Self {
        self.m[4] += x;
        self.m[5] += y;
        self
    }

    /// `self = lhs * self`: `lhs` is applied after `self`.
    pub fn premultiply(&mut self, lhs: &Affine) -> &mut Self {
        *self = Affine::multiply(lhs, self);
        self
    }

    /// Composition such that `multiply(a, b).apply(p) == a.apply(b.apply(p))`.
    ///
    /// The result is computed into a fresh value, so either operand may be
    /// the destination of the assignment.
    pub fn multiply(a: &Affine, b: &Affine) -> Affine {
        let [aa, ab, ac, ad, atx, aty] = a.m;
        let [ba, bb, bc, bd, btx, bty] = b.m;

        Affine {
            m: [
                aa * ba + ac * bb,
                ab * ba + ad * bb,
                aa * bc + ac * bd,
                ab * bc + ad * bd,
                aa * btx + ac * bty + atx,
                ab * btx + ad * bty + aty,
            ],
        }
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        let [a, b, c, d, tx, ty] = self.m;
        Vec2::new(a * p.x + c * p.y + tx, b * p.x + d * p.y + ty)
    }

    /// Applies only the 2×2 linear part (no translation).
    #[inline]
    pub fn apply_linear(&self, p: Vec2) -> Vec2 {
        let [a, b, c, d, _, _] = self.m;
        Vec2::new(a * p.x + c * p.y, b * p.x + d * p.y)
    }

    #[inline]
    pub fn translation_part(&self) -> Vec2 {
        Vec2::new(self.m[4], self.m[5])
    }

    pub fn is_finite(&self) -> bool {
        self.m.iter().all(|v| v.is_finite())
    }

    /// Returns element `index` (`0..6`, in `[a, b, c, d, tx, ty]` order).
    pub fn get(&self, index: usize) -> Result<f32, RenderError> {
        self.m
            .get(index)
            .copied()
            .ok_or(RenderError::IndexOutOfRange { index, len: Self::LEN })
    }

    /// Sets element `index`. Non-finite values are rejected and leave the
    /// transform untouched.
    pub fn set(&mut self, index: usize, value: f32) -> Result<(), RenderError> {
        if index >= Self::LEN {
            return Err(RenderError::IndexOutOfRange { index, len: Self::LEN });
        }
        if !value.is_finite() {
            return Err(RenderError::NonFinite { what: "transform component" });
        }
        self.m[index] = value;
        Ok(())
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        Affine::multiply(&self, &rhs)
    }
}

/// An affine transform plus the pivot it is applied around.
///
/// `origin` is relative to the first corner of the shape being drawn. When
/// absent, the pivot is the centre of the shape.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub affine: Affine,
    pub origin: Option<Vec2>,
}

impl Transform {
    pub const fn new(affine: Affine) -> Self {
        Self { affine, origin: None }
    }

    pub const fn with_origin(affine: Affine, origin: Vec2) -> Self {
        Self { affine, origin: Some(origin) }
    }

    pub fn is_finite(&self) -> bool {
        self.affine.is_finite() && self.origin.is_none_or(|o| o.is_finite())
    }

    /// Transforms `corners` in place around the pivot.
    ///
    /// Each corner is mapped by the full affine transform, then shifted by
    /// `pivot - L * pivot` (with `L` the linear part), which keeps the pivot
    /// fixed under rotation/scale while still honouring the translation.
    pub fn apply_to_quad(&self, corners: &mut [Vec2; 4]) {
        let pivot = match self.origin {
            Some(origin) => corners[0] + origin,
            None => Vec2::mean(corners),
        };
        let correction = pivot - self.affine.apply_linear(pivot);

        for corner in corners.iter_mut() {
            *corner = self.affine.apply(*corner) + correction;
        }
    }
}
