//! Growable CPU-side storage with an explicit capacity.
//!
//! `Vec` already grows geometrically, but the batchers need the capacity to
//! be observable (it decides when the GPU copy is reallocated) and bounded,
//! and they need allocation failure reported rather than aborting.

use crate::error::RenderError;

/// Doubles `current` until it reaches `required`.
pub(crate) fn grown_capacity(current: usize, required: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < required {
        capacity = capacity.saturating_mul(2);
    }
    capacity
}

/// Append-only buffer whose capacity doubles on overflow, up to a ceiling.
///
/// Invariant: `len() <= capacity()`, and capacity never exceeds the ceiling
/// given at construction. Capacity never shrinks; `clear` only resets the
/// length.
#[derive(Debug, Clone)]
pub struct GrowBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    max_capacity: usize,
}

impl<T> GrowBuffer<T> {
    pub fn with_capacity(initial: usize, max_capacity: usize) -> Result<Self, RenderError> {
        let capacity = initial.clamp(1, max_capacity.max(1));
        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| RenderError::OutOfMemory { requested: capacity })?;

        Ok(Self { items, capacity, max_capacity: max_capacity.max(1) })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Makes room for `additional` more items.
    ///
    /// On failure the buffer is left exactly as it was.
    pub fn reserve(&mut self, additional: usize) -> Result<(), RenderError> {
        let required = self.items.len().saturating_add(additional);
        if required <= self.capacity {
            return Ok(());
        }
        if required > self.max_capacity {
            return Err(RenderError::CapacityExceeded { requested: required, max: self.max_capacity });
        }

        let capacity = grown_capacity(self.capacity, required).min(self.max_capacity);
        self.items
            .try_reserve_exact(capacity - self.items.len())
            .map_err(|_| RenderError::OutOfMemory { requested: capacity })?;

        log::trace!("grow buffer: {} -> {capacity}", self.capacity);
        self.capacity = capacity;
        Ok(())
    }

}

impl<T: Clone> GrowBuffer<T> {
    /// Appends all of `items` or none of them.
    pub fn extend_from_slice(&mut self, items: &[T]) -> Result<(), RenderError> {
        self.reserve(items.len())?;
        self.items.extend_from_slice(items);
        Ok(())
    }
}
