/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::partitioner::{Partitioner, Worker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Work stealing over a counter that is shared by every host thread and device group.
/// Each fetch-and-add hands out an index that no other worker receives.
#[derive(Debug)]
pub struct DynamicPartitioner {
    n_tasks: usize,
    current: usize,
    worker: Worker,
    worklist: Arc<AtomicUsize>,
}

impl DynamicPartitioner {
    pub fn new(n_tasks: usize, worker: Worker, worklist: Arc<AtomicUsize>) -> Self {
        Self {
            n_tasks,
            current: 0,
            worker,
            worklist,
        }
    }

    fn steal(&mut self) -> usize {
        self.current = self.worklist.fetch_add(1, Ordering::SeqCst);
        log::trace!("{:?} stole index {}", self.worker, self.current);
        self.current
    }
}

impl Partitioner for DynamicPartitioner {
    fn first(&mut self) -> usize {
        self.steal()
    }

    fn more(&self) -> bool {
        self.current < self.n_tasks
    }

    fn next(&mut self) -> usize {
        self.steal()
    }
}
