/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::{PipelineError, Result};
use std::ops::{Deref, DerefMut};

/// Host buffer with a capacity that is fixed at allocation time.
/// The memory is acquired once during setup and released when the buffer is dropped.
#[derive(Clone, Debug)]
pub struct FixedBuffer<T> {
    what: &'static str,
    inner: Vec<T>,
}

impl<T> FixedBuffer<T>
where
    T: Copy + Default,
{
    /// Allocates a zeroed buffer of `len` elements.
    /// Returns an allocation error instead of aborting when the memory can't be reserved.
    pub fn allocate(what: &'static str, len: usize) -> Result<Self> {
        let mut inner = Vec::new();
        inner
            .try_reserve_exact(len)
            .map_err(|_| PipelineError::Allocation { what, len })?;
        inner.resize(len, T::default());
        log::trace!("Allocated {} elements for {}", len, what);

        Ok(Self { what, inner })
    }

    /// Allocates `n_blocks` blocks of `block_len` elements each
    pub fn allocate_blocks(what: &'static str, n_blocks: usize, block_len: usize) -> Result<Self> {
        let len = n_blocks
            .checked_mul(block_len)
            .ok_or(PipelineError::Allocation {
                what,
                len: usize::MAX,
            })?;
        Self::allocate(what, len)
    }

    pub fn capacity(&self) -> usize {
        self.inner.len()
    }

    /// Returns the `index`th block of `block_len` elements
    pub fn block(&self, index: usize, block_len: usize) -> &[T] {
        &self.inner[index * block_len..(index + 1) * block_len]
    }

    pub fn block_mut(&mut self, index: usize, block_len: usize) -> &mut [T] {
        &mut self.inner[index * block_len..(index + 1) * block_len]
    }

    /// Returns `count` consecutive blocks starting at block `index`
    pub fn blocks(&self, index: usize, count: usize, block_len: usize) -> &[T] {
        &self.inner[index * block_len..(index + count) * block_len]
    }

    pub fn blocks_mut(&mut self, index: usize, count: usize, block_len: usize) -> &mut [T] {
        &mut self.inner[index * block_len..(index + count) * block_len]
    }

    /// Sets every element back to its default
    pub fn reset(&mut self) {
        for value in self.inner.iter_mut() {
            *value = T::default();
        }
    }
}

impl<T> Deref for FixedBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.inner[..]
    }
}

impl<T> DerefMut for FixedBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner[..]
    }
}

impl<T> Drop for FixedBuffer<T> {
    fn drop(&mut self) {
        log::trace!("Releasing {} ({} elements)", self.what, self.inner.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_zeroed_with_fixed_capacity() {
        let buffer: FixedBuffer<i32> = FixedBuffer::allocate("histogram", 12).unwrap();
        assert_eq!(buffer.capacity(), 12);
        assert!(buffer.iter().all(|v| *v == 0));
    }

    #[test]
    fn blocks_address_disjoint_ranges() {
        let mut buffer: FixedBuffer<i32> = FixedBuffer::allocate("data", 12).unwrap();
        buffer.block_mut(1, 4).copy_from_slice(&[1, 2, 3, 4]);
        buffer.blocks_mut(2, 1, 4)[0] = 9;

        assert_eq!(buffer.block(0, 4), &[0, 0, 0, 0]);
        assert_eq!(buffer.block(1, 4), &[1, 2, 3, 4]);
        assert_eq!(buffer.blocks(1, 2, 4), &[1, 2, 3, 4, 9, 0, 0, 0]);

        buffer.reset();
        assert!(buffer.iter().all(|v| *v == 0));
    }

    #[test]
    fn overflowing_block_count_is_an_allocation_error() {
        let result: Result<FixedBuffer<i32>> =
            FixedBuffer::allocate_blocks("data pool", usize::MAX / 2, 3);
        assert!(matches!(
            result,
            Err(PipelineError::Allocation {
                what: "data pool",
                ..
            })
        ));
        let buffer: FixedBuffer<i32> = FixedBuffer::allocate_blocks("queue", 3, 4).unwrap();
        assert_eq!(buffer.capacity(), 12);
    }

    #[test]
    fn oversized_allocation_is_an_error() {
        let result: Result<FixedBuffer<u64>> = FixedBuffer::allocate("huge", usize::MAX / 4);
        match result {
            Err(PipelineError::Allocation { what, len }) => {
                assert_eq!(what, "huge");
                assert_eq!(len, usize::MAX / 4);
            }
            other => panic!("expected allocation error, got {:?}", other.map(|_| ())),
        }
    }
}
