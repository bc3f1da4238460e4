use super::Vec2;
use crate::device::Viewport;

/// Host-configurable sizing policy for the internal render resolution.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayoutOptions {
    /// Fixed internal resolution in pixels. `None` renders at screen size.
    pub resolution: Option<(u32, u32)>,

    /// Restrict upscaling to whole-number factors (crisp pixel art).
    pub pixel_scaling: bool,

    /// Upper bound on the scale factor.
    pub max_scale: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            resolution: None,
            pixel_scaling: false,
            max_scale: f32::INFINITY,
        }
    }
}

/// Computed placement of the internal resolution inside the screen.
///
/// All sizes are in physical pixels. The viewport is centred; offsets are
/// floored so the viewport always starts on a whole pixel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Layout {
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub offset: Vec2,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub scale: f32,
}

impl Layout {
    pub fn compute(screen_width: u32, screen_height: u32, options: &LayoutOptions) -> Self {
        let screen_width = screen_width.max(1);
        let screen_height = screen_height.max(1);

        let (res_w, res_h, scale) = match options.resolution {
            Some((rw, rh)) => {
                let rw = rw.max(1);
                let rh = rh.max(1);

                let scale_x = screen_width as f32 / rw as f32;
                let scale_y = screen_height as f32 / rh as f32;
                let mut scale = scale_x.min(scale_y).min(options.max_scale);

                if options.pixel_scaling && scale > 1.0 {
                    scale = scale.floor();
                }

                (rw, rh, scale)
            }
            None => (screen_width, screen_height, 1.0),
        };

        let viewport_width = (scale * res_w as f32).floor() as u32;
        let viewport_height = (scale * res_h as f32).floor() as u32;

        let offset = Vec2::new(
            ((screen_width as f32 - viewport_width as f32) / 2.0).floor(),
            ((screen_height as f32 - viewport_height as f32) / 2.0).floor(),
        );

        Self {
            resolution_width: res_w,
            resolution_height: res_h,
            screen_width,
            screen_height,
            offset,
            viewport_width,
            viewport_height,
            scale,
        }
    }

    /// Screen rectangle the frame is presented into.
    pub fn viewport(&self) -> Viewport {
        Viewport {
            x: self.offset.x.max(0.0) as u32,
            y: self.offset.y.max(0.0) as u32,
            width: self.viewport_width,
            height: self.viewport_height,
        }
    }

    /// Converts a screen-space point (e.g. a mouse position) into internal
    /// resolution pixels.
    pub fn screen_to_resolution(&self, p: Vec2) -> Vec2 {
        (p - self.offset) / self.scale
    }
}
