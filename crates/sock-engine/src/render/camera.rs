use crate::coords::Vec2;
use crate::error::RenderError;
use crate::math::Affine;

/// How the camera point is anchored in the viewport.
#[derive(Debug, Copy, Clone, PartialEq)]
enum Anchor {
    /// The point lands on the viewport's top-left corner.
    Origin(Vec2),
    /// The point lands on the viewport's centre.
    LookAt(Vec2),
}

/// World to clip-space projection.
///
/// The derived matrix is a column-major `mat3` (`m[6]`, `m[7]` carry the
/// translation) and is cached until the resolution, anchor or transform
/// changes.
#[derive(Debug, Clone)]
pub struct Camera {
    width: u32,
    height: u32,
    anchor: Anchor,
    transform: Option<Affine>,
    matrix: Option<[f32; 9]>,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            anchor: Anchor::Origin(Vec2::zero()),
            transform: None,
            matrix: None,
        }
    }

    #[inline]
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `true` when the next [`matrix`](Self::matrix) call re-derives.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.matrix.is_none()
    }

    pub fn transform(&self) -> Option<&Affine> {
        self.transform.as_ref()
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.matrix = None;
        }
    }

    /// Places world point `(x, y)` at the viewport's top-left corner.
    ///
    /// Without a transform the point is floored so sprites stay on whole
    /// pixels.
    pub fn set_origin(&mut self, x: f32, y: f32, transform: Option<Affine>) -> Result<(), RenderError> {
        let point = Self::anchor_point(x, y, transform.as_ref())?;
        self.anchor = Anchor::Origin(point);
        self.transform = transform;
        self.matrix = None;
        Ok(())
    }

    /// Places world point `(x, y)` at the viewport's centre.
    pub fn look_at(&mut self, x: f32, y: f32, transform: Option<Affine>) -> Result<(), RenderError> {
        let point = Self::anchor_point(x, y, transform.as_ref())?;
        self.anchor = Anchor::LookAt(point);
        self.transform = transform;
        self.matrix = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.anchor = Anchor::Origin(Vec2::zero());
        self.transform = None;
        self.matrix = None;
    }

    fn anchor_point(x: f32, y: f32, transform: Option<&Affine>) -> Result<Vec2, RenderError> {
        let point = Vec2::new(x, y);
        if !point.is_finite() {
            return Err(RenderError::NonFinite { what: "camera point" });
        }
        match transform {
            Some(t) if !t.is_finite() => Err(RenderError::NonFinite { what: "camera transform" }),
            Some(_) => Ok(point),
            None => Ok(point.floor()),
        }
    }

    /// Returns the projection matrix, deriving it if stale.
    pub fn matrix(&mut self) -> [f32; 9] {
        match self.matrix {
            Some(m) => m,
            None => {
                let m = self.derive();
                self.matrix = Some(m);
                m
            }
        }
    }

    /// Maps a world point to clip space.
    pub fn project(&mut self, x: f32, y: f32) -> Vec2 {
        let m = self.matrix();
        Vec2::new(m[0] * x + m[3] * y + m[6], m[1] * x + m[4] * y + m[7])
    }

    // device = L * (p - anchor) + t (+ half viewport for look-at)
    // clip   = (sx * device.x - 1, sy * device.y + 1)
    fn derive(&self) -> [f32; 9] {
        let sx = 2.0 / self.width as f32;
        let sy = -2.0 / self.height as f32;

        let [a, b, c, d, tx, ty] = self.transform.unwrap_or(Affine::IDENTITY).to_array();

        let (point, center) = match self.anchor {
            Anchor::Origin(p) => (p, Vec2::zero()),
            Anchor::LookAt(p) => (p, Vec2::new(half(self.width), half(self.height))),
        };

        let dev_x = tx - a * point.x - c * point.y + center.x;
        let dev_y = ty - b * point.x - d * point.y + center.y;

        [
            sx * a, sy * b, 0.0, //
            sx * c, sy * d, 0.0, //
            sx * dev_x - 1.0, sy * dev_y + 1.0, 1.0,
        ]
    }
}

/// Device coordinate the look-at point lands on. Odd sizes shift by half a
/// pixel so whole world coordinates stay on pixel boundaries.
fn half(size: u32) -> f32 {
    size as f32 / 2.0 + if size % 2 == 1 { 0.5 } else { 0.0 }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
