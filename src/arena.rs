//! Arena - scoped bulk storage with O(1) reset
//!
//! One backing buffer is carved into blocks. Handles carry the generation
//! they were issued in; after [`Arena::reset`] every older handle resolves
//! to `None` instead of aliasing new data.

use crate::error::{FieldError, FieldResult};

/// Handle to a block inside an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockId {
    offset: usize,
    len: usize,
    generation: u64,
}

impl BlockId {
    /// Elements in the block.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Arena usage counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArenaStats {
    pub used: usize,
    pub capacity: usize,
    pub blocks: usize,
    pub generation: u64,
}

impl ArenaStats {
    /// Fraction of capacity in use.
    pub fn utilization(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used as f32 / self.capacity as f32
        }
    }
}

/// Bump allocator over `T`. Capacity only changes through [`Arena::reserve`].
#[derive(Clone, Debug)]
pub struct Arena<T> {
    buffer: Vec<T>,
    used: usize,
    blocks: usize,
    generation: u64,
}

impl<T: Copy + Default> Arena<T> {
    /// Reserve storage for `capacity` elements up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity],
            used: 0,
            blocks: 0,
            generation: 0,
        }
    }

    /// Grow to at least `capacity` elements. Outstanding blocks stay valid.
    ///
    /// An allocation failure is reported as
    /// [`FieldError::CapacityExhausted`] instead of aborting.
    pub fn reserve(&mut self, capacity: usize) -> FieldResult<()> {
        let Some(additional) = capacity.checked_sub(self.buffer.len()) else {
            return Ok(());
        };
        self.buffer
            .try_reserve_exact(additional)
            .map_err(|_| FieldError::CapacityExhausted { capacity })?;
        self.buffer.resize(capacity, T::default());
        Ok(())
    }

    /// Carve a zero-initialised block of `len` elements.
    pub fn allocate(&mut self, len: usize) -> FieldResult<BlockId> {
        let end = self
            .used
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(FieldError::CapacityExhausted {
                capacity: self.buffer.len(),
            })?;

        self.buffer[self.used..end].fill(T::default());
        let id = BlockId {
            offset: self.used,
            len,
            generation: self.generation,
        };
        self.used = end;
        self.blocks += 1;
        Ok(id)
    }

    /// Block contents, or `None` for a handle issued before the last reset.
    pub fn get(&self, id: BlockId) -> Option<&[T]> {
        if id.generation != self.generation {
            return None;
        }
        self.buffer.get(id.offset..id.offset + id.len)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut [T]> {
        if id.generation != self.generation {
            return None;
        }
        self.buffer.get_mut(id.offset..id.offset + id.len)
    }

    /// Reclaim every block at once.
    pub fn reset(&mut self) {
        self.used = 0;
        self.blocks = 0;
        self.generation += 1;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Elements still available.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.used
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            used: self.used,
            capacity: self.buffer.len(),
            blocks: self.blocks,
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_write() {
        let mut arena = Arena::<f32>::with_capacity(16);
        let a = arena.allocate(4).unwrap();
        let b = arena.allocate(8).unwrap();

        arena.get_mut(a).unwrap().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        arena.get_mut(b).unwrap()[7] = 9.0;

        assert_eq!(arena.get(a).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(arena.get(b).unwrap()[7], 9.0);
        assert_eq!(arena.remaining(), 4);
    }

    #[test]
    fn test_exhaustion_leaves_state() {
        let mut arena = Arena::<u32>::with_capacity(10);
        arena.allocate(6).unwrap();

        let err = arena.allocate(5).unwrap_err();
        assert!(matches!(err, FieldError::CapacityExhausted { capacity: 10 }));
        assert_eq!(arena.stats().used, 6);
        assert!(arena.allocate(4).is_ok());
    }

    #[test]
    fn test_handles_rejected_after_reset() {
        let mut arena = Arena::<f32>::with_capacity(8);
        let old = arena.allocate(8).unwrap();
        arena.get_mut(old).unwrap()[0] = 5.0;

        arena.reset();
        assert!(arena.get(old).is_none());
        assert!(arena.get_mut(old).is_none());

        // New blocks reuse the space, zeroed.
        let fresh = arena.allocate(8).unwrap();
        assert_eq!(arena.get(fresh).unwrap()[0], 0.0);
    }

    #[test]
    fn test_stats() {
        let mut arena = Arena::<f32>::with_capacity(100);
        arena.allocate(25).unwrap();
        arena.allocate(25).unwrap();

        let stats = arena.stats();
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.used, 50);
        assert!((stats.utilization() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reserve_grows_without_invalidating() {
        let mut arena = Arena::<f32>::with_capacity(0);
        assert!(arena.allocate(1).is_err());

        arena.reserve(4).unwrap();
        let a = arena.allocate(4).unwrap();
        arena.get_mut(a).unwrap()[3] = 2.5;

        arena.reserve(12).unwrap();
        let b = arena.allocate(8).unwrap();
        assert_eq!(arena.get(a).unwrap()[3], 2.5);
        assert_eq!(arena.get(b).unwrap().len(), 8);

        // Never shrinks.
        arena.reserve(2).unwrap();
        assert_eq!(arena.capacity(), 12);
    }

    #[test]
    fn test_reserve_reports_impossible_request() {
        let mut arena = Arena::<f32>::with_capacity(0);
        let err = arena.reserve(usize::MAX).unwrap_err();
        assert!(matches!(err, FieldError::CapacityExhausted { .. }));
        assert_eq!(arena.capacity(), 0);
    }
}
