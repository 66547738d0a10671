/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::buffers::FixedBuffer;
use crate::error::Result;

pub mod pipeline;

/// Operation code understood by the histogram kernel.
/// Any other code makes the engines skip the task and leave its histogram zeroed.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOp {
    #[cfg(test)]
    Terminate = 0,
    Work = 1,
}

/// A unit of work. The layout matches the `task_t` struct of the device kernels.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Task {
    pub id: i32,
    pub op: i32,
}

#[cfg(feature = "opencl")]
unsafe impl ocl::OclPrm for Task {}

impl Task {
    pub fn work(id: usize) -> Self {
        Self {
            id: id as i32,
            op: TaskOp::Work as i32,
        }
    }

    pub fn is_work(&self) -> bool {
        self.op == TaskOp::Work as i32
    }
}

/// All tasks of a repetition together with one payload frame per task
pub struct TaskPool {
    tasks: FixedBuffer<Task>,
    data: FixedBuffer<i32>,
    frame_size: usize,
}

impl TaskPool {
    /// Allocates a pool of `pool_size` work tasks with zeroed frames
    pub fn allocate(pool_size: usize, frame_size: usize) -> Result<Self> {
        let mut tasks = FixedBuffer::allocate("task pool", pool_size)?;
        for (id, task) in tasks.iter_mut().enumerate() {
            *task = Task::work(id);
        }
        let data = FixedBuffer::allocate_blocks("data pool", pool_size, frame_size)?;

        Ok(Self {
            tasks,
            data,
            frame_size,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.capacity()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[cfg(test)]
    pub fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    pub fn frame(&self, index: usize) -> &[i32] {
        self.data.block(index, self.frame_size)
    }

    pub fn frame_mut(&mut self, index: usize) -> &mut [i32] {
        self.data.block_mut(index, self.frame_size)
    }
}

/// Fixed capacity staging area for one batch of tasks, their frames and results
pub struct TaskQueue {
    tasks: FixedBuffer<Task>,
    data: FixedBuffer<i32>,
    results: FixedBuffer<i32>,
    len: usize,
    frame_size: usize,
    n_bins: usize,
}

impl TaskQueue {
    pub fn allocate(capacity: usize, frame_size: usize, n_bins: usize) -> Result<Self> {
        Ok(Self {
            tasks: FixedBuffer::allocate("task queue", capacity)?,
            data: FixedBuffer::allocate_blocks("data queue", capacity, frame_size)?,
            results: FixedBuffer::allocate_blocks("histogram queue", capacity, n_bins)?,
            len: 0,
            frame_size,
            n_bins,
        })
    }

    pub fn capacity(&self) -> usize {
        self.tasks.capacity()
    }

    /// Number of tasks staged by the last insert
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// The whole task buffer including stale entries after `len`
    pub fn task_buffer(&self) -> &[Task] {
        &self.tasks
    }

    pub fn data_buffer(&self) -> &[i32] {
        &self.data
    }

    pub fn result_buffer(&self) -> &[i32] {
        &self.results
    }

    pub fn result_buffer_mut(&mut self) -> &mut [i32] {
        &mut self.results
    }

    #[cfg(test)]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks[..self.len]
    }

    #[cfg(test)]
    pub fn data(&self) -> &[i32] {
        self.data.blocks(0, self.len, self.frame_size)
    }

    pub fn results(&self) -> &[i32] {
        self.results.blocks(0, self.len, self.n_bins)
    }

    /// Splits the queue into the staged frames and the matching result blocks
    pub fn frames_and_results_mut(&mut self) -> (&[Task], &[i32], &mut [i32]) {
        let len = self.len;
        (
            &self.tasks[..len],
            self.data.blocks(0, len, self.frame_size),
            self.results.blocks_mut(0, len, self.n_bins),
        )
    }
}

/// Copies up to `queue.capacity()` tasks and their frames from the pool, starting at
/// `pool_cursor`, into the queue and zeroes the result region.
/// Returns the number of staged tasks and adds it to `written`.
pub fn insert_tasks(
    queue: &mut TaskQueue,
    pool: &TaskPool,
    written: &mut usize,
    pool_cursor: usize,
) -> usize {
    let count = queue
        .capacity()
        .min(pool.len().saturating_sub(pool_cursor));
    let frame_size = queue.frame_size;

    queue.tasks[..count].copy_from_slice(&pool.tasks()[pool_cursor..pool_cursor + count]);
    queue
        .data
        .blocks_mut(0, count, frame_size)
        .copy_from_slice(pool.data.blocks(pool_cursor, count, frame_size));
    queue.results.reset();
    queue.len = count;
    *written += count;
    log::trace!(
        "Inserted {} tasks starting at {} ({} written)",
        count,
        pool_cursor,
        written
    );

    count
}

/// Yields `(offset, len)` for every batch of a pool that is drained by a queue
/// of `queue_size` tasks
pub fn batch_offsets(pool_size: usize, queue_size: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..pool_size)
        .step_by(queue_size.max(1))
        .map(move |offset| (offset, queue_size.min(pool_size - offset)))
}
