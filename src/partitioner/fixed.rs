/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::partitioner::{Partitioner, Worker};

/// Static split at `cut`. Host threads stride through `[0, cut)`,
/// device groups stride through `[cut, n_tasks)`.
#[derive(Clone, Debug)]
pub struct StaticPartitioner {
    n_tasks: usize,
    cut: usize,
    current: usize,
    worker: Worker,
}

impl StaticPartitioner {
    pub fn new(n_tasks: usize, cut: usize, worker: Worker) -> Self {
        Self {
            n_tasks,
            cut: cut.min(n_tasks),
            current: 0,
            worker,
        }
    }
}

impl Partitioner for StaticPartitioner {
    fn first(&mut self) -> usize {
        self.current = match self.worker {
            Worker::Host { thread_id, .. } => thread_id,
            Worker::Device { group_id, .. } => self.cut + group_id,
        };
        self.current
    }

    fn more(&self) -> bool {
        match self.worker {
            Worker::Host { .. } => self.current < self.cut,
            Worker::Device { .. } => self.current < self.n_tasks,
        }
    }

    fn next(&mut self) -> usize {
        self.current += match self.worker {
            Worker::Host { n_threads, .. } => n_threads,
            Worker::Device { num_groups, .. } => num_groups,
        };
        self.current
    }
}
