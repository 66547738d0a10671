/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::buffers::FixedBuffer;
use crate::engine::{BatchParams, BatchTimings, ComputeEngine};
use crate::error::{PipelineError, Result};
use crate::task_queue::{batch_offsets, insert_tasks, TaskPool, TaskQueue};
use crate::utils::timer::Timer;
use std::time::{Duration, Instant};

pub const TIMER_INSERT: &str = "Kernel-CPU";
pub const TIMER_COPY_TO: &str = "Copy To Device";
pub const TIMER_KERNEL: &str = "Kernel";
pub const TIMER_COPY_BACK: &str = "Copy Back and Merge";

#[derive(Clone, Debug, Default)]
pub struct PassReport {
    pub batches: usize,
    pub tasks: usize,
    /// Time spent filling the queue on the host
    pub insert_duration: Duration,
    pub timings: BatchTimings,
}

/// Streams a task pool through a fixed size queue into a compute engine
pub struct TaskQueuePipeline {
    queue: TaskQueue,
}

impl TaskQueuePipeline {
    pub fn new(queue_size: usize, frame_size: usize, n_bins: usize) -> Result<Self> {
        if queue_size == 0 || frame_size == 0 || n_bins == 0 {
            return Err(PipelineError::InvalidParams(format!(
                "queue size ({}), frame size ({}) and bin count ({}) need to be positive",
                queue_size, frame_size, n_bins
            )));
        }

        Ok(Self {
            queue: TaskQueue::allocate(queue_size, frame_size, n_bins)?,
        })
    }

    /// Runs one pass over the whole pool. The histogram of pool task `i` is written to
    /// block `i` of the accumulator. Timings are only recorded if a timer is given.
    pub fn run_pass<E>(
        &mut self,
        engine: &mut E,
        pool: &TaskPool,
        accumulator: &mut FixedBuffer<i32>,
        mut timer: Option<&mut Timer>,
    ) -> Result<PassReport>
    where
        E: ComputeEngine + ?Sized,
    {
        let n_bins = self.queue.n_bins();
        let frame_size = self.queue.frame_size();
        if pool.frame_size() != frame_size
            || pool.len().checked_mul(n_bins) != Some(accumulator.capacity())
        {
            return Err(PipelineError::InvalidParams(format!(
                "pool of {} tasks with frame size {} does not fit an accumulator of {} values",
                pool.len(),
                pool.frame_size(),
                accumulator.capacity()
            )));
        }
        let mut report = PassReport::default();
        let mut n_written_tasks = 0;

        for (n_consumed_tasks, _) in batch_offsets(pool.len(), self.queue.capacity()) {
            let insert_start = Instant::now();
            let len = insert_tasks(&mut self.queue, pool, &mut n_written_tasks, n_consumed_tasks);
            let insert_duration = insert_start.elapsed();

            let params = BatchParams {
                offset: n_consumed_tasks,
                len,
                frame_size,
                n_bins,
            };
            let mut timings = engine.process_batch(&mut self.queue, &params)?;

            let merge_start = Instant::now();
            accumulator
                .blocks_mut(n_consumed_tasks, len, n_bins)
                .copy_from_slice(self.queue.results());
            timings.copy_back += merge_start.elapsed();
            log::trace!("Merged batch at {} with {} tasks", n_consumed_tasks, len);

            if let Some(timer) = timer.as_deref_mut() {
                timer.add(TIMER_INSERT, insert_duration);
                timer.add(TIMER_COPY_TO, timings.copy_to_device);
                timer.add(TIMER_KERNEL, timings.kernel);
                timer.add(TIMER_COPY_BACK, timings.copy_back);
            }
            report.batches += 1;
            report.tasks += len;
            report.insert_duration += insert_duration;
            report.timings += timings;
        }
        debug_assert_eq!(n_written_tasks, pool.len());

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cpu::CpuEngine;
    use crate::engine::{bin_of, ClusterDims};

    /// Fills every result block with the id of its task and records the batches
    #[derive(Default)]
    struct RecordingEngine {
        batches: Vec<BatchParams>,
    }

    impl ComputeEngine for RecordingEngine {
        fn name(&self) -> String {
            "recording".to_string()
        }

        fn process_batch(
            &mut self,
            queue: &mut TaskQueue,
            params: &BatchParams,
        ) -> Result<BatchTimings> {
            let (tasks, _, results) = queue.frames_and_results_mut();
            for (block, task) in results.chunks_mut(params.n_bins).zip(tasks) {
                assert!(block.iter().all(|v| *v == 0));
                for value in block {
                    *value = task.id;
                }
            }
            self.batches.push(*params);
            Ok(BatchTimings::default())
        }

        fn load_features(&mut self, _: &[f32], _: ClusterDims) -> Result<()> {
            Ok(())
        }

        fn assign_clusters(&mut self, _: &[f32], _: usize, _: &mut [i32]) -> Result<Duration> {
            Ok(Duration::default())
        }
    }

    fn accumulator(len: usize) -> FixedBuffer<i32> {
        let mut buffer = FixedBuffer::allocate("histogram", len).unwrap();
        for value in buffer.iter_mut() {
            *value = -1;
        }
        buffer
    }

    #[test]
    fn default_configuration_runs_five_batches() {
        let pool = TaskPool::allocate(1600, 1).unwrap();
        let mut pipeline = TaskQueuePipeline::new(320, 1, 2).unwrap();
        let mut engine = RecordingEngine::default();
        let mut histo = accumulator(1600 * 2);

        let report = pipeline
            .run_pass(&mut engine, &pool, &mut histo, None)
            .unwrap();
        assert_eq!(report.batches, 5);
        assert_eq!(report.tasks, 1600);
        assert!(engine.batches.iter().all(|b| b.len == 320));
        assert_eq!(
            engine.batches.iter().map(|b| b.offset).collect::<Vec<usize>>(),
            vec![0, 320, 640, 960, 1280]
        );
    }

    #[test]
    fn every_slot_is_written_by_its_task() {
        let pool = TaskPool::allocate(23, 2).unwrap();
        let mut pipeline = TaskQueuePipeline::new(5, 2, 3).unwrap();
        let mut engine = RecordingEngine::default();
        let mut histo = accumulator(23 * 3);

        let report = pipeline
            .run_pass(&mut engine, &pool, &mut histo, None)
            .unwrap();
        assert_eq!(report.batches, 5);
        assert_eq!(engine.batches.last().map(|b| b.len), Some(3));
        for task in 0..23 {
            assert_eq!(histo.block(task, 3), &[task as i32; 3]);
        }
    }

    #[test]
    fn cpu_pass_matches_host_histograms() {
        let mut pool = TaskPool::allocate(7, 16).unwrap();
        for task in 0..7 {
            for (i, value) in pool.frame_mut(task).iter_mut().enumerate() {
                *value = ((task * 37 + i * 11) % 256) as i32;
            }
        }
        let mut pipeline = TaskQueuePipeline::new(3, 16, 8).unwrap();
        let mut histo = accumulator(7 * 8);
        let mut timer = Timer::new();

        let report = pipeline
            .run_pass(&mut CpuEngine::new(), &pool, &mut histo, Some(&mut timer))
            .unwrap();
        for task in 0..7 {
            let mut expected = vec![0; 8];
            for value in pool.frame(task) {
                expected[bin_of(*value, 8)] += 1;
            }
            assert_eq!(histo.block(task, 8), &expected[..]);
        }
        assert_eq!(timer.total(TIMER_KERNEL), report.timings.kernel);
        assert_eq!(timer.total(TIMER_COPY_BACK), report.timings.copy_back);
    }

    #[test]
    fn mismatching_accumulator_is_rejected() {
        let pool = TaskPool::allocate(4, 2).unwrap();
        let mut pipeline = TaskQueuePipeline::new(2, 2, 3).unwrap();
        let mut histo = accumulator(4);
        assert!(pipeline
            .run_pass(&mut CpuEngine::new(), &pool, &mut histo, None)
            .is_err());
        assert!(TaskQueuePipeline::new(0, 2, 3).is_err());
    }
}
