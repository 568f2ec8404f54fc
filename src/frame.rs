//! Preview frames and the buffer pool that backs them.
//!
//! Buffers circulate between the device, the pool and frame consumers. A
//! [`Frame`] borrows its buffer from the pool; releasing (or dropping) the
//! frame sends the buffer back. Buffers come back tagged with the pool
//! generation they were allocated under, so a pool reconfigured for a new
//! preview size silently discards stale ones.

use crate::types::{ImageFormat, Size};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;

struct ReturnedBuffer {
    generation: u64,
    data: Vec<u8>,
}

/// One preview image handed to a frame consumer.
pub struct Frame {
    data: Vec<u8>,
    timestamp: DateTime<Utc>,
    rotation: u32,
    size: Size,
    format: ImageFormat,
    generation: u64,
    returns: Option<Sender<ReturnedBuffer>>,
}

impl Frame {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Clockwise rotation from sensor to output coordinates.
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Copy the pixel data out so the buffer can go back right away.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Give the buffer back to the pool. Dropping the frame does the same.
    pub fn release(self) {}
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(returns) = self.returns.take() {
            let data = std::mem::take(&mut self.data);
            // The pool may already be gone; the buffer is simply freed then.
            let _ = returns.send(ReturnedBuffer {
                generation: self.generation,
                data,
            });
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("timestamp", &self.timestamp)
            .field("rotation", &self.rotation)
            .field("size", &self.size)
            .field("format", &self.format)
            .finish()
    }
}

/// Reusable preview buffers sized to the negotiated format and resolution.
pub struct FramePool {
    capacity: usize,
    size: Size,
    format: ImageFormat,
    buffer_len: usize,
    generation: u64,
    allocations: usize,
    returns_tx: Sender<ReturnedBuffer>,
    returns_rx: Receiver<ReturnedBuffer>,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        let (returns_tx, returns_rx) = unbounded();
        Self {
            capacity: capacity.max(1),
            size: Size::default(),
            format: ImageFormat::default(),
            buffer_len: 0,
            generation: 0,
            allocations: 0,
            returns_tx,
            returns_rx,
        }
    }

    /// Bytes needed for one image of `size` in `format`.
    pub fn buffer_len(size: Size, format: ImageFormat) -> usize {
        let bits = size.area() * u64::from(format.bits_per_pixel());
        usize::try_from(bits.div_ceil(8)).unwrap_or(usize::MAX)
    }

    /// Reconfigure for a new preview geometry and return the initial
    /// buffers to queue on the device. Outstanding buffers become stale.
    pub fn allocate(&mut self, size: Size, format: ImageFormat) -> Vec<Vec<u8>> {
        self.generation += 1;
        self.size = size;
        self.format = format;
        self.buffer_len = Self::buffer_len(size, format);
        self.allocations = 0;
        while self.returns_rx.try_recv().is_ok() {}

        log::debug!(
            "frame pool: {} buffers of {} bytes for {} {:?}",
            self.capacity,
            self.buffer_len,
            size,
            format
        );
        (0..self.capacity).map(|_| self.new_buffer()).collect()
    }

    /// Drop all state; every outstanding buffer becomes stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.buffer_len = 0;
        self.size = Size::default();
        while self.returns_rx.try_recv().is_ok() {}
    }

    pub fn is_configured(&self) -> bool {
        self.buffer_len > 0
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers allocated since the last [`FramePool::allocate`], initial ones included.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Wrap a filled device buffer into a [`Frame`] on loan from this pool.
    pub fn wrap(&self, data: Vec<u8>, rotation: u32) -> Frame {
        Frame {
            data,
            timestamp: Utc::now(),
            rotation,
            size: self.size,
            format: self.format,
            generation: self.generation,
            returns: Some(self.returns_tx.clone()),
        }
    }

    /// A buffer for the device: a released one when available, a fresh
    /// allocation otherwise. Never blocks. `None` while unconfigured.
    pub fn acquire(&mut self) -> Option<Vec<u8>> {
        if !self.is_configured() {
            return None;
        }
        while let Ok(returned) = self.returns_rx.try_recv() {
            if returned.generation == self.generation && returned.data.len() == self.buffer_len {
                return Some(returned.data);
            }
        }
        Some(self.new_buffer())
    }

    fn new_buffer(&mut self) -> Vec<u8> {
        self.allocations += 1;
        vec![0; self.buffer_len]
    }
}

impl fmt::Debug for FramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("capacity", &self.capacity)
            .field("size", &self.size)
            .field("format", &self.format)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len_for_nv21() {
        assert_eq!(FramePool::buffer_len(Size::new(640, 480), ImageFormat::Nv21), 460_800);
        assert_eq!(FramePool::buffer_len(Size::new(640, 480), ImageFormat::Yuy2), 614_400);
    }

    #[test]
    fn test_allocate_returns_capacity_buffers() {
        let mut pool = FramePool::new(3);
        let buffers = pool.allocate(Size::new(4, 4), ImageFormat::Nv21);
        assert_eq!(buffers.len(), 3);
        assert!(buffers.iter().all(|b| b.len() == 24));
        assert_eq!(pool.allocations(), 3);
    }

    #[test]
    fn test_released_buffer_is_reused() {
        let mut pool = FramePool::new(1);
        let mut buffers = pool.allocate(Size::new(4, 4), ImageFormat::Nv21);
        let frame = pool.wrap(buffers.remove(0), 90);
        assert_eq!(frame.rotation(), 90);
        frame.release();

        let reused = pool.acquire().unwrap();
        assert_eq!(reused.len(), 24);
        assert_eq!(pool.allocations(), 1);
    }

    #[test]
    fn test_unreturned_buffer_allocates_replacement() {
        let mut pool = FramePool::new(1);
        let mut buffers = pool.allocate(Size::new(4, 4), ImageFormat::Nv21);
        let _held = pool.wrap(buffers.remove(0), 0);

        assert!(pool.acquire().is_some());
        assert_eq!(pool.allocations(), 2);
    }

    #[test]
    fn test_stale_buffers_are_discarded() {
        let mut pool = FramePool::new(1);
        let mut buffers = pool.allocate(Size::new(4, 4), ImageFormat::Nv21);
        let frame = pool.wrap(buffers.remove(0), 0);
        pool.allocate(Size::new(8, 8), ImageFormat::Nv21);
        drop(frame);

        let buffer = pool.acquire().unwrap();
        assert_eq!(buffer.len(), 96);
        assert_eq!(pool.allocations(), 2);
    }

    #[test]
    fn test_unconfigured_pool_has_nothing() {
        let mut pool = FramePool::new(2);
        assert!(pool.acquire().is_none());
        pool.allocate(Size::new(2, 2), ImageFormat::Nv21);
        pool.clear();
        assert!(pool.acquire().is_none());
    }
}
