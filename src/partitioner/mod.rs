/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

//! Splits a range of task indices between host threads and device work-groups.
//!
//! The same `first`/`more`/`next` cursor protocol is used on both sides.
//! The device side lives in `kernels/partitioner.cl`.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod dynamic;
mod fixed;

pub use dynamic::DynamicPartitioner;
pub use fixed::StaticPartitioner;

/// The role of the worker that iterates over the task indices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Worker {
    Host { thread_id: usize, n_threads: usize },
    Device { group_id: usize, num_groups: usize },
}

impl Worker {
    pub fn host(thread_id: usize, n_threads: usize) -> Self {
        Self::Host {
            thread_id,
            n_threads,
        }
    }

    pub fn device(group_id: usize, num_groups: usize) -> Self {
        Self::Device {
            group_id,
            num_groups,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// The host processes `[0, cut)` and the device `[cut, n_tasks)`
    Static { cut: usize },
    /// Host and device steal indices from a shared counter
    Dynamic,
}

impl Strategy {
    /// Any `alpha` inside `[0, 1]` selects a static split, everything else
    /// selects dynamic work stealing
    pub fn from_alpha(n_tasks: usize, alpha: f64) -> Self {
        if (0.0..=1.0).contains(&alpha) {
            Self::Static {
                cut: (n_tasks as f64 * alpha).floor() as usize,
            }
        } else {
            Self::Dynamic
        }
    }
}

pub trait Partitioner: Send {
    /// Returns the first index for this worker
    fn first(&mut self) -> usize;

    /// Returns if the current index still belongs to this worker
    fn more(&self) -> bool;

    /// Advances to the next index of this worker
    fn next(&mut self) -> usize;
}

/// Creates the partitioner for a worker.
/// The worklist is only used with the dynamic strategy and has to be shared by all workers.
pub fn create(
    n_tasks: usize,
    alpha: f64,
    worker: Worker,
    worklist: Arc<AtomicUsize>,
) -> Box<dyn Partitioner> {
    match Strategy::from_alpha(n_tasks, alpha) {
        Strategy::Static { cut } => Box::new(StaticPartitioner::new(n_tasks, cut, worker)),
        Strategy::Dynamic => Box::new(DynamicPartitioner::new(n_tasks, worker, worklist)),
    }
}

/// Drives a partitioner through the `first`/`more`/`next` protocol
pub struct Indices<'a, P: Partitioner + ?Sized> {
    partitioner: &'a mut P,
    started: bool,
    done: bool,
}

impl<'a, P: Partitioner + ?Sized> Indices<'a, P> {
    pub fn new(partitioner: &'a mut P) -> Self {
        Self {
            partitioner,
            started: false,
            done: false,
        }
    }
}

impl<'a, P: Partitioner + ?Sized> Iterator for Indices<'a, P> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = if self.started {
            self.partitioner.next()
        } else {
            self.started = true;
            self.partitioner.first()
        };
        if self.partitioner.more() {
            Some(current)
        } else {
            self.done = true;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::Strategy;
    use std::collections::BTreeSet;

    fn collect(n_tasks: usize, alpha: f64, worker: Worker, worklist: &Arc<AtomicUsize>) -> Vec<usize> {
        let mut partitioner = create(n_tasks, alpha, worker, Arc::clone(worklist));
        Indices::new(partitioner.as_mut()).collect()
    }

    #[test]
    fn alpha_selects_strategy() {
        assert_eq!(Strategy::from_alpha(100, 0.5), Strategy::Static { cut: 50 });
        assert_eq!(Strategy::from_alpha(100, 0.0), Strategy::Static { cut: 0 });
        assert_eq!(Strategy::from_alpha(100, 1.0), Strategy::Static { cut: 100 });
        assert_eq!(Strategy::from_alpha(7, 0.5), Strategy::Static { cut: 3 });
        assert_eq!(Strategy::from_alpha(100, -1.0), Strategy::Dynamic);
        assert_eq!(Strategy::from_alpha(100, 1.5), Strategy::Dynamic);
    }

    #[test]
    fn half_split_between_four_threads_and_groups() {
        let worklist = Arc::new(AtomicUsize::new(0));
        for thread_id in 0..4 {
            let indices = collect(100, 0.5, Worker::host(thread_id, 4), &worklist);
            let expected = (thread_id..50).step_by(4).collect::<Vec<usize>>();
            assert_eq!(indices, expected);
        }
        let mut device = Vec::new();
        for group_id in 0..4 {
            let indices = collect(100, 0.5, Worker::device(group_id, 4), &worklist);
            assert!(indices.iter().all(|i| (50..100).contains(i)));
            device.extend(indices);
        }
        device.sort_unstable();
        assert_eq!(device, (50..100).collect::<Vec<usize>>());
    }

    #[test]
    fn host_thread_beyond_cut_gets_nothing() {
        let worklist = Arc::new(AtomicUsize::new(0));
        assert!(collect(10, 0.2, Worker::host(3, 4), &worklist).is_empty());
    }

    #[test]
    fn dynamic_hands_out_sequential_indices() {
        let worklist = Arc::new(AtomicUsize::new(0));
        let host = collect(5, 2.0, Worker::host(0, 1), &worklist);
        assert_eq!(host, vec![0, 1, 2, 3, 4]);
        assert!(collect(5, 2.0, Worker::device(0, 1), &worklist).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn static_workers_cover_every_index_once(
            n_tasks in 0usize..400,
            alpha in 0.0f64..=1.0,
            n_threads in 1usize..9,
            n_groups in 1usize..9,
        ) {
            let worklist = Arc::new(AtomicUsize::new(0));
            let mut seen = Vec::new();
            for thread_id in 0..n_threads {
                seen.extend(collect(n_tasks, alpha, Worker::host(thread_id, n_threads), &worklist));
            }
            for group_id in 0..n_groups {
                seen.extend(collect(n_tasks, alpha, Worker::device(group_id, n_groups), &worklist));
            }
            let unique = seen.iter().copied().collect::<BTreeSet<usize>>();
            prop_assert_eq!(unique.len(), seen.len());
            prop_assert_eq!(unique, (0..n_tasks).collect::<BTreeSet<usize>>());
        }
    }
}
