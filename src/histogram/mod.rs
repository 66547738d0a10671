/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

//! Task queue histogram benchmark: frames are streamed in batches through
//! a bounded task queue and one histogram per frame is collected.

use crate::buffers::FixedBuffer;
use crate::engine::{bin_of, ComputeEngine};
use crate::error::{PipelineError, Result};
use crate::task_queue::pipeline::{PassReport, TaskQueuePipeline};
use crate::task_queue::TaskPool;
use crate::utils::progress::{advance, repetition_bar};
use crate::utils::timer::Timer;
use crate::verify::{self, Verdict};
use std::path::PathBuf;

pub mod input;

#[derive(Clone, Debug)]
pub struct HistogramParams {
    pub n_warmup: usize,
    pub n_reps: usize,
    pub file_name: PathBuf,
    pub pool_size: usize,
    pub queue_size: usize,
    /// Frame height
    pub m: usize,
    /// Frame width
    pub n: usize,
    pub n_bins: usize,
    pub reference: Option<PathBuf>,
}

impl HistogramParams {
    pub fn frame_size(&self) -> usize {
        self.m * self.n
    }

    pub fn validate(&self) -> Result<()> {
        if self.m.checked_mul(self.n).is_none() {
            return Err(PipelineError::InvalidParams(format!(
                "frame of {}x{} values is too large",
                self.m, self.n
            )));
        }
        if self.pool_size == 0 || self.queue_size == 0 || self.frame_size() == 0 || self.n_bins == 0
        {
            return Err(PipelineError::InvalidParams(format!(
                "pool size, queue size, frame dimensions and bin count need to be positive: {:?}",
                self
            )));
        }
        Ok(())
    }
}

pub struct HistogramReport {
    /// Reports of the measured repetitions
    pub passes: Vec<PassReport>,
    pub verdict: Verdict,
}

/// Runs the warmup and measured repetitions over the pool and verifies the final histograms
pub fn run<E>(
    engine: &mut E,
    params: &HistogramParams,
    pool: &TaskPool,
    timer: &mut Timer,
) -> Result<HistogramReport>
where
    E: ComputeEngine + ?Sized,
{
    params.validate()?;
    timer.start("Allocation");
    let mut pipeline = TaskQueuePipeline::new(params.queue_size, params.frame_size(), params.n_bins)?;
    let mut histograms = FixedBuffer::allocate_blocks("histograms", params.pool_size, params.n_bins)?;
    timer.stop("Allocation");
    timer.print("Allocation", 1);

    let mut passes = Vec::with_capacity(params.n_reps);
    let progress = repetition_bar(params.n_warmup, params.n_reps);
    for rep in 0..(params.n_warmup + params.n_reps) {
        let measured = rep >= params.n_warmup;
        let report = pipeline.run_pass(
            engine,
            pool,
            &mut histograms,
            if measured { Some(&mut *timer) } else { None },
        )?;
        log::debug!(
            "Repetition {} processed {} tasks in {} batches",
            rep,
            report.tasks,
            report.batches
        );
        if measured {
            passes.push(report);
        }
        advance(&progress, params.n_warmup);
    }
    progress.finish_and_clear();

    let verdict = match &params.reference {
        Some(path) => verify::compare(&verify::read_reference(path)?, &histograms),
        None => verify::compare(&reference_histograms(pool, params.n_bins), &histograms),
    };

    Ok(HistogramReport {
        passes,
        verdict,
    })
}

/// Computes the expected histogram of every frame on the host
pub fn reference_histograms(pool: &TaskPool, n_bins: usize) -> Vec<i32> {
    let mut histograms = vec![0; pool.len() * n_bins];

    for (task, histogram) in pool.tasks().iter().zip(histograms.chunks_mut(n_bins)) {
        if !task.is_work() {
            continue;
        }
        for value in pool.frame(task.id as usize) {
            histogram[bin_of(*value, n_bins)] += 1;
        }
    }

    histograms
}
