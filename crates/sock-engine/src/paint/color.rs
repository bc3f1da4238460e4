use std::fmt;

/// Packed 8-bit RGBA color.
///
/// Memory layout is `R, G, B, A`, which is exactly what the vertex formats
/// store and the shaders read as a normalized `vec4`. [`Color::packed`] is
/// the little-endian `u32` view of those four bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    #[inline]
    pub const fn from_packed(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn packed(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    /// Creates a color from unit floats.
    ///
    /// Channels are clamped to `[0, 1]` and scaled by `255.999` before
    /// truncation so that `1.0` maps to 255 and the byte buckets are even.
    pub fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: unit_to_byte(r),
            g: unit_to_byte(g),
            b: unit_to_byte(b),
            a: unit_to_byte(a),
        }
    }

    /// Returns the channels as unit floats.
    pub fn to_unit(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    #[inline]
    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<u32> for Color {
    fn from(packed: u32) -> Self {
        Self::from_packed(packed)
    }
}

/// `#rrggbb`, or `#rrggbbaa` when not fully opaque.
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if !self.is_opaque() {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

fn unit_to_byte(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.999) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_is_rgba_in_memory_order() {
        let c = Color::rgba(0x11, 0x22, 0x33, 0x44);
        assert_eq!(c.packed(), 0x4433_2211);
        assert_eq!(c.packed().to_le_bytes(), [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(Color::from_packed(0x4433_2211), c);
    }

    #[test]
    fn white_packs_to_all_ones() {
        assert_eq!(Color::WHITE.packed(), 0xffff_ffff);
    }

    #[test]
    fn from_unit_scales_and_clamps() {
        let c = Color::from_unit(1.0, 0.5, -3.0, f32::NAN);
        assert_eq!(c, Color::rgba(255, 127, 0, 0));
    }

    #[test]
    fn display_omits_opaque_alpha() {
        assert_eq!(Color::rgb(255, 0, 128).to_string(), "#ff0080");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#01020304");
    }

    #[test]
    fn default_is_opaque_black() {
        assert_eq!(Color::default(), Color::BLACK);
    }
}
