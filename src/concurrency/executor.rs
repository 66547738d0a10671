/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::{PipelineError, Result};
use crate::partitioner::{self, Indices, Strategy, Worker};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread::Builder as ThreadBuilder;

/// Indices processed by every worker of a cooperative run
#[derive(Clone, Debug)]
pub struct PartitionReport {
    pub strategy: Strategy,
    pub workers: Vec<(Worker, Vec<usize>)>,
}

impl PartitionReport {
    /// Returns if every index in `[0, n_tasks)` was processed by exactly one worker
    pub fn is_exact_cover(&self, n_tasks: usize) -> bool {
        let mut seen = BTreeSet::new();
        for (_, indices) in &self.workers {
            for index in indices {
                if *index >= n_tasks || !seen.insert(*index) {
                    return false;
                }
            }
        }
        seen.len() == n_tasks
    }

    pub fn host_tasks(&self) -> usize {
        self.count(true)
    }

    pub fn device_tasks(&self) -> usize {
        self.count(false)
    }

    fn count(&self, host: bool) -> usize {
        self.workers
            .iter()
            .filter(|(worker, _)| worker.is_host() == host)
            .map(|(_, indices)| indices.len())
            .sum()
    }
}

/// Runs host threads and emulated device work-groups side by side, each driven
/// by its own partitioner
pub struct CooperativeExecutor {
    n_threads: usize,
    n_groups: usize,
}

impl CooperativeExecutor {
    pub fn new(n_threads: usize, n_groups: usize) -> Self {
        Self {
            n_threads,
            n_groups,
        }
    }

    pub fn run<F>(&self, n_tasks: usize, alpha: f64, work: F) -> Result<PartitionReport>
    where
        F: Fn(usize, Worker) + Send + Sync + 'static,
    {
        let strategy = Strategy::from_alpha(n_tasks, alpha);
        self.validate(n_tasks, strategy)?;
        log::debug!(
            "Running {} tasks on {} threads and {} groups with {:?}",
            n_tasks,
            self.n_threads,
            self.n_groups,
            strategy
        );

        let worklist = Arc::new(AtomicUsize::new(0));
        let work = Arc::new(work);
        let workers = (0..self.n_threads)
            .map(|i| (format!("host-{}", i), Worker::host(i, self.n_threads)))
            .chain((0..self.n_groups).map(|i| (format!("group-{}", i), Worker::device(i, self.n_groups))));
        let mut handles = Vec::new();

        for (name, worker) in workers {
            let worklist = Arc::clone(&worklist);
            let work = Arc::clone(&work);

            let handle = ThreadBuilder::new()
                .name(name.clone())
                .spawn(move || {
                    let mut partitioner = partitioner::create(n_tasks, alpha, worker, worklist);
                    let mut processed = Vec::new();
                    for index in Indices::new(partitioner.as_mut()) {
                        (*work)(index, worker);
                        processed.push(index);
                    }
                    log::trace!("Processed {} tasks", processed.len());
                    processed
                })
                .map_err(|e| PipelineError::WorkerPanicked(format!("{}: {}", name, e)))?;
            handles.push((name, worker, handle));
        }

        let mut report = PartitionReport {
            strategy,
            workers: Vec::with_capacity(handles.len()),
        };
        for (name, worker, handle) in handles {
            let processed = handle
                .join()
                .map_err(|_| PipelineError::WorkerPanicked(name))?;
            report.workers.push((worker, processed));
        }

        Ok(report)
    }

    fn validate(&self, n_tasks: usize, strategy: Strategy) -> Result<()> {
        let (needs_threads, needs_groups) = match strategy {
            Strategy::Static { cut } => (cut > 0, cut < n_tasks),
            Strategy::Dynamic => (n_tasks > 0 && self.n_groups == 0, false),
        };
        if needs_threads && self.n_threads == 0 {
            return Err(PipelineError::InvalidParams(
                "the host share needs at least one thread".to_string(),
            ));
        }
        if needs_groups && self.n_groups == 0 {
            return Err(PipelineError::InvalidParams(
                "the device share needs at least one work-group".to_string(),
            ));
        }
        Ok(())
    }
}
