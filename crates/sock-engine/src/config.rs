use crate::coords::LayoutOptions;
use crate::device::{FilterMode, SamplerOptions};

/// Render core configuration.
///
/// Capacities are initial sizes only; every buffer doubles on demand.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Initial vertex capacity of each sprite batcher.
    pub sprite_batch_capacity: usize,

    /// Initial vertex capacity of the context's quad batcher.
    pub primitive_batch_capacity: usize,

    /// Initial index capacity of the shared quad index buffer.
    pub quad_index_capacity: usize,

    /// Idle sprite batchers kept for reuse. Releases past this are freed.
    pub pool_capacity: usize,

    /// Sampler used by textures created without explicit options.
    pub default_sampler: SamplerOptions,

    pub layout: LayoutOptions,

    /// Filter used when the frame is scaled onto the screen.
    pub present_filter: FilterMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sprite_batch_capacity: 128,
            primitive_batch_capacity: 256,
            quad_index_capacity: 256,
            pool_capacity: 8,
            default_sampler: SamplerOptions::default(),
            layout: LayoutOptions::default(),
            present_filter: FilterMode::Nearest,
        }
    }
}
