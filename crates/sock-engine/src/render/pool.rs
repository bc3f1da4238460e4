use crate::device::GraphicsDevice;
use crate::error::RenderError;

use super::batcher::SpriteBatcher;

/// Reuses sprite batchers so their GPU buffers survive between batches.
///
/// Checked-out batchers are owned by the caller until handed back with
/// [`release`](Self::release). The temp batcher never leaves the pool; it is
/// lent out for one begin/add/end round.
#[derive(Debug)]
pub struct BatcherPool {
    idle: Vec<SpriteBatcher>,
    temp: Option<SpriteBatcher>,
    max_idle: usize,
    batch_capacity: usize,
}

impl BatcherPool {
    pub fn new(max_idle: usize, batch_capacity: usize) -> Self {
        Self { idle: Vec::new(), temp: None, max_idle, batch_capacity }
    }

    #[inline]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    #[inline]
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Pops the most recently released batcher, or creates one.
    pub fn checkout<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<SpriteBatcher, RenderError> {
        if let Some(batcher) = self.idle.pop() {
            return Ok(batcher);
        }
        log::debug!("allocate new sprite batcher");
        SpriteBatcher::new(device, self.batch_capacity)
    }

    /// Takes a batcher back. Anything it was recording is discarded.
    ///
    /// Past `max_idle` the batcher is destroyed instead of kept.
    pub fn release<D: GraphicsDevice>(&mut self, device: &mut D, mut batcher: SpriteBatcher) {
        batcher.abandon();
        if self.idle.len() < self.max_idle {
            self.idle.push(batcher);
        } else {
            log::debug!("sprite batcher pool full, freeing batcher");
            batcher.destroy(device);
        }
    }

    /// The shared one-shot batcher, created on first use.
    pub fn temp<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<&mut SpriteBatcher, RenderError> {
        let batcher = match self.temp.take() {
            Some(batcher) => batcher,
            None => {
                log::debug!("allocate temp sprite batcher");
                SpriteBatcher::new(device, self.batch_capacity)?
            }
        };
        Ok(self.temp.insert(batcher))
    }

    /// Destroys every pooled batcher, including the temp one.
    pub fn drain<D: GraphicsDevice>(&mut self, device: &mut D) {
        let count = self.idle.len() + usize::from(self.temp.is_some());
        for batcher in self.idle.drain(..).chain(self.temp.take()) {
            batcher.destroy(device);
        }
        if count > 0 {
            log::debug!("drained {count} sprite batchers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    // ── checkout / release ────────────────────────────────────────────────

    #[test]
    fn miss_allocates_new_batcher() {
        let mut dev = HeadlessDevice::new();
        let mut pool = BatcherPool::new(2, 128);

        let a = pool.checkout(&mut dev).unwrap();
        let b = pool.checkout(&mut dev).unwrap();
        assert_ne!(a.vertex_buffer(), b.vertex_buffer());
        assert_eq!(dev.live_buffers(), 2);
        assert_eq!(a.capacity(), 128);
    }

    #[test]
    fn reuse_is_lifo() {
        let mut dev = HeadlessDevice::new();
        let mut pool = BatcherPool::new(4, 128);

        let a = pool.checkout(&mut dev).unwrap();
        let b = pool.checkout(&mut dev).unwrap();
        let (a_buf, b_buf) = (a.vertex_buffer(), b.vertex_buffer());

        pool.release(&mut dev, a);
        pool.release(&mut dev, b);
        assert_eq!(pool.idle_count(), 2);

        assert_eq!(pool.checkout(&mut dev).unwrap().vertex_buffer(), b_buf);
        assert_eq!(pool.checkout(&mut dev).unwrap().vertex_buffer(), a_buf);
        assert_eq!(dev.live_buffers(), 2);
    }

    #[test]
    fn release_past_capacity_frees_batcher() {
        let mut dev = HeadlessDevice::new();
        let mut pool = BatcherPool::new(1, 128);

        let a = pool.checkout(&mut dev).unwrap();
        let b = pool.checkout(&mut dev).unwrap();
        pool.release(&mut dev, a);
        pool.release(&mut dev, b);

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(dev.live_buffers(), 1);
    }

    // ── temp ──────────────────────────────────────────────────────────────

    #[test]
    fn temp_is_created_once() {
        let mut dev = HeadlessDevice::new();
        let mut pool = BatcherPool::new(4, 128);

        let first = pool.temp(&mut dev).unwrap().vertex_buffer();
        let second = pool.temp(&mut dev).unwrap().vertex_buffer();
        assert_eq!(first, second);
        assert_eq!(dev.live_buffers(), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn drain_frees_everything() {
        let mut dev = HeadlessDevice::new();
        let mut pool = BatcherPool::new(4, 128);

        let a = pool.checkout(&mut dev).unwrap();
        pool.release(&mut dev, a);
        pool.temp(&mut dev).unwrap();
        assert_eq!(dev.live_buffers(), 2);

        pool.drain(&mut dev);
        assert_eq!(dev.live_buffers(), 0);
        assert_eq!(pool.idle_count(), 0);
    }
}
