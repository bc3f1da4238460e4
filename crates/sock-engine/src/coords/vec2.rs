use core::ops::{Add, Div, Mul, Sub};

/// 2D vector in pixels (top-left origin, +Y down).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Snaps both components down to whole pixels.
    #[inline]
    pub fn floor(self) -> Self {
        Self::new(self.x.floor(), self.y.floor())
    }

    /// Arithmetic mean of a set of points. Returns zero for an empty slice.
    pub fn mean(points: &[Vec2]) -> Self {
        if points.is_empty() {
            return Self::zero();
        }
        let sum = points.iter().fold(Self::zero(), |acc, &p| acc + p);
        sum / points.len() as f32
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_rect_corners_is_center() {
        let corners = [
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 30.0),
            Vec2::new(30.0, 10.0),
            Vec2::new(30.0, 30.0),
        ];
        assert_eq!(Vec2::mean(&corners), Vec2::new(20.0, 20.0));
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(Vec2::mean(&[]), Vec2::zero());
    }

    #[test]
    fn floor_snaps_negative_down() {
        assert_eq!(Vec2::new(-0.5, 2.9).floor(), Vec2::new(-1.0, 2.0));
    }
}
