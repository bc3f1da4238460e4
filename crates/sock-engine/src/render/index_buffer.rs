use crate::device::{BufferId, BufferKind, GraphicsDevice};
use crate::error::RenderError;

use super::buffer::grown_capacity;

/// Index capacity that still addresses only 16-bit vertex indices
/// (16384 quads, 65536 vertices).
pub const MAX_QUAD_INDICES: usize = 98_304;

/// Index run for quad `q`: two triangles sharing the diagonal 1-2.
#[inline]
fn quad_indices(q: usize) -> [u16; 6] {
    let v = (q * 4) as u16;
    [v, v + 1, v + 2, v + 1, v + 3, v + 2]
}

/// One index buffer shared by every batcher.
///
/// The CPU copy only ever grows: on growth the indices already written are
/// kept as they are and only the run past the watermark is generated. The
/// watermark is always a multiple of 6 and never exceeds the capacity.
#[derive(Debug)]
pub struct QuadIndexBuffer {
    indices: Vec<u16>,
    capacity: usize,
    buffer: Option<BufferId>,
    /// `false` when the GPU copy may not match `indices` (failed upload).
    synced: bool,
}

impl QuadIndexBuffer {
    /// Creates the CPU side only; the GPU buffer is created on first use.
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            indices: Vec::new(),
            capacity: initial_capacity.clamp(6, MAX_QUAD_INDICES),
            buffer: None,
            synced: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of indices generated so far.
    #[inline]
    pub fn watermark(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    #[inline]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Makes sure at least `required` indices are generated and uploaded,
    /// returning the buffer to draw with.
    ///
    /// On failure the buffer keeps its previous capacity and contents.
    pub fn ensure_capacity<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        required: usize,
    ) -> Result<BufferId, RenderError> {
        if required > MAX_QUAD_INDICES {
            return Err(RenderError::CapacityExceeded { requested: required, max: MAX_QUAD_INDICES });
        }

        if let Some(id) = self.buffer {
            if self.synced && required <= self.indices.len() {
                return Ok(id);
            }
        }

        let capacity = if required <= self.capacity {
            self.capacity
        } else {
            grown_capacity(self.capacity, required).min(MAX_QUAD_INDICES)
        };

        let mut next = Vec::new();
        next.try_reserve_exact(capacity)
            .map_err(|_| RenderError::OutOfMemory { requested: capacity })?;
        next.extend_from_slice(&self.indices);

        let mut quad = next.len() / 6;
        while next.len() + 6 <= capacity {
            next.extend_from_slice(&quad_indices(quad));
            quad += 1;
        }

        let bytes = (capacity * size_of::<u16>()) as u64;
        let id = match self.buffer {
            Some(id) => {
                device.allocate_buffer(id, bytes)?;
                id
            }
            None => {
                let id = device.create_buffer(BufferKind::Index, bytes)?;
                self.buffer = Some(id);
                id
            }
        };

        self.synced = false;
        device.write_buffer(id, 0, bytemuck::cast_slice(&next))?;

        if capacity != self.capacity {
            log::debug!("quad index buffer: {} -> {capacity} indices", self.capacity);
        }
        self.indices = next;
        self.capacity = capacity;
        self.synced = true;
        Ok(id)
    }

    /// Frees the GPU buffer. The next `ensure_capacity` recreates it.
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        if let Some(id) = self.buffer.take() {
            device.delete_buffer(id);
        }
        self.synced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCommand, HeadlessDevice};

    fn expected_run(from: usize, to: usize) -> Vec<u16> {
        (from / 6..to / 6).flat_map(quad_indices).collect()
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn first_use_creates_and_fills_initial_capacity() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        assert!(ibo.buffer().is_none());

        let id = ibo.ensure_capacity(&mut dev, 6).unwrap();
        assert_eq!(ibo.capacity(), 256);
        assert_eq!(ibo.watermark(), 252);
        assert_eq!(ibo.indices(), expected_run(0, 252).as_slice());
        assert_eq!(dev.buffer_contents(id).map(<[u8]>::len), Some(512));
    }

    #[test]
    fn index_pattern_for_first_quads() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(12);
        ibo.ensure_capacity(&mut dev, 12).unwrap();
        assert_eq!(ibo.indices(), &[0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
    }

    #[test]
    fn satisfied_request_touches_nothing() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        ibo.ensure_capacity(&mut dev, 6).unwrap();
        dev.take_commands();

        ibo.ensure_capacity(&mut dev, 252).unwrap();
        assert!(dev.commands().is_empty());
    }

    // ── growth ────────────────────────────────────────────────────────────

    #[test]
    fn growth_appends_without_touching_prefix() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        ibo.ensure_capacity(&mut dev, 6).unwrap();

        let before = ibo.indices().to_vec();
        let w = ibo.watermark();

        ibo.ensure_capacity(&mut dev, 600).unwrap();
        assert_eq!(ibo.capacity(), 1024);
        assert_eq!(&ibo.indices()[..w], before.as_slice());
        assert_eq!(&ibo.indices()[w..], expected_run(w, ibo.watermark()).as_slice());
        assert_eq!(ibo.watermark() % 6, 0);
    }

    #[test]
    fn growth_reuploads_whole_buffer() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        let id = ibo.ensure_capacity(&mut dev, 6).unwrap();
        dev.take_commands();

        ibo.ensure_capacity(&mut dev, 300).unwrap();
        assert_eq!(
            dev.commands(),
            &[
                DeviceCommand::AllocateBuffer { id, size: 1024 },
                DeviceCommand::WriteBuffer { id, offset: 0, len: 1020 },
            ]
        );
        let uploaded: &[u16] = bytemuck::cast_slice(&dev.buffer_contents(id).unwrap()[..1020]);
        assert_eq!(uploaded, ibo.indices());
    }

    #[test]
    fn growth_is_logarithmic_in_quads() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        for quads in 1..=4000usize {
            ibo.ensure_capacity(&mut dev, quads * 6).unwrap();
        }
        let reallocations = dev
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::AllocateBuffer { .. }))
            .count();
        // 256 -> 32768 is seven doublings.
        assert_eq!(reallocations, 7);
        assert_eq!(ibo.capacity(), 32768);
    }

    #[test]
    fn ceiling_clamps_capacity_and_keeps_indices_16_bit() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        ibo.ensure_capacity(&mut dev, MAX_QUAD_INDICES).unwrap();

        assert_eq!(ibo.capacity(), MAX_QUAD_INDICES);
        assert_eq!(ibo.watermark(), MAX_QUAD_INDICES);
        assert_eq!(ibo.indices().last(), Some(&65534));
        assert_eq!(ibo.indices().iter().max(), Some(&65535));
    }

    // ── failure ───────────────────────────────────────────────────────────

    #[test]
    fn request_past_ceiling_is_rejected() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        let err = ibo.ensure_capacity(&mut dev, MAX_QUAD_INDICES + 6).unwrap_err();
        assert!(err.is_resource_exhaustion());
        assert!(ibo.buffer().is_none());
    }

    #[test]
    fn failed_growth_keeps_previous_capacity() {
        let mut dev = HeadlessDevice::new().with_max_buffer_size(1024);
        let mut ibo = QuadIndexBuffer::new(256);
        ibo.ensure_capacity(&mut dev, 6).unwrap();
        let before = ibo.indices().to_vec();

        let err = ibo.ensure_capacity(&mut dev, 2000).unwrap_err();
        assert!(err.is_resource_exhaustion());
        assert_eq!(ibo.capacity(), 256);
        assert_eq!(ibo.indices(), before.as_slice());

        // Draws within the old capacity still work.
        assert!(ibo.ensure_capacity(&mut dev, 252).is_ok());
    }

    #[test]
    fn destroy_frees_gpu_buffer() {
        let mut dev = HeadlessDevice::new();
        let mut ibo = QuadIndexBuffer::new(256);
        ibo.ensure_capacity(&mut dev, 6).unwrap();
        ibo.destroy(&mut dev);
        assert_eq!(dev.live_buffers(), 0);
        assert!(ibo.buffer().is_none());
    }
}
