//! Pooled scratch buffers.
//!
//! Cascades stage the ids they are about to touch before mutating the
//! collections that hold them. The buffers are rented from a small pool
//! owned by the database and handed back when the call ends.

use crate::builder::ObjectId;

/// A pool of reusable id buffers.
#[derive(Debug, Clone, Default)]
pub struct ScratchPool {
    free: Vec<Vec<ObjectId>>,
    capacity: usize,
}

impl ScratchPool {
    /// Creates a pool retaining at most `capacity` idle buffers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Takes an empty buffer out of the pool.
    pub fn rent(&mut self) -> Vec<ObjectId> {
        self.free.pop().unwrap_or_default()
    }

    /// Returns a buffer to the pool.
    pub fn release(&mut self, mut buffer: Vec<ObjectId>) {
        buffer.clear();
        if self.free.len() < self.capacity {
            self.free.push(buffer);
        }
    }

    /// Number of idle buffers.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_and_release() {
        let mut pool = ScratchPool::new(1);
        let mut a = pool.rent();
        a.push(ObjectId::new(1));
        let b = pool.rent();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);

        let reused = pool.rent();
        assert!(reused.is_empty());
        assert_eq!(pool.idle(), 0);
    }
}
