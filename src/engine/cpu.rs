/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::engine::{bin_of, stream_ranges, BatchParams, BatchTimings, ClusterDims, ComputeEngine};
use crate::error::{PipelineError, Result};
use crate::task_queue::TaskQueue;
use rayon::prelude::*;
use std::mem;
use std::time::{Duration, Instant};

/// Reference engine that computes the kernel results on the host with rayon
#[derive(Default)]
pub struct CpuEngine {
    features: Vec<f32>,
    dims: Option<ClusterDims>,
}

impl CpuEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeEngine for CpuEngine {
    fn name(&self) -> String {
        format!("cpu ({} threads)", rayon::current_num_threads())
    }

    fn process_batch(
        &mut self,
        queue: &mut TaskQueue,
        params: &BatchParams,
    ) -> Result<BatchTimings> {
        let start = Instant::now();
        let (tasks, data, results) = queue.frames_and_results_mut();

        results
            .par_chunks_mut(params.n_bins)
            .zip(data.par_chunks(params.frame_size))
            .zip(tasks.par_iter())
            .filter(|(_, task)| task.is_work())
            .for_each(|((histogram, frame), _)| {
                for value in frame {
                    histogram[bin_of(*value, params.n_bins)] += 1;
                }
            });

        Ok(BatchTimings {
            kernel: start.elapsed(),
            ..Default::default()
        })
    }

    fn load_features(&mut self, features: &[f32], dims: ClusterDims) -> Result<()> {
        if features.len() != dims.n_points * dims.n_features {
            return Err(PipelineError::InvalidParams(format!(
                "feature matrix has {} values, expected {}",
                features.len(),
                dims.n_points * dims.n_features
            )));
        }
        self.features = features.to_vec();
        self.dims = Some(dims);

        Ok(())
    }

    fn assign_clusters(
        &mut self,
        clusters: &[f32],
        n_streams: usize,
        membership: &mut [i32],
    ) -> Result<Duration> {
        let dims = self.dims.ok_or_else(|| {
            PipelineError::InvalidParams("features need to be loaded before clustering".into())
        })?;
        if membership.len() < dims.n_points || clusters.len() < dims.n_clusters * dims.n_features {
            return Err(PipelineError::InvalidParams(format!(
                "cluster buffers are too small for {:?}",
                dims
            )));
        }
        let start = Instant::now();
        let features = &self.features[..];

        let mut streams = Vec::new();
        let mut rest = &mut membership[..dims.n_points];
        for (offset, len) in stream_ranges(dims.n_points, n_streams) {
            let (head, tail) = mem::take(&mut rest).split_at_mut(len);
            streams.push((offset, head));
            rest = tail;
        }
        log::trace!("Assigning {} points on {} streams", dims.n_points, streams.len());

        streams.into_par_iter().for_each(|(offset, stream)| {
            for (local, assignment) in stream.iter_mut().enumerate() {
                *assignment = nearest_cluster(features, clusters, dims, offset + local) as i32;
            }
        });

        Ok(start.elapsed())
    }
}

/// Finds the closest center by squared euclidean distance.
/// Features are stored column-major (`features[feature * n_points + point]`).
fn nearest_cluster(features: &[f32], clusters: &[f32], dims: ClusterDims, point: usize) -> usize {
    let mut best = 0;
    let mut best_distance = f32::MAX;

    for cluster in 0..dims.n_clusters {
        let distance = (0..dims.n_features)
            .map(|f| {
                let diff = features[f * dims.n_points + point] - clusters[cluster * dims.n_features + f];
                diff * diff
            })
            .sum::<f32>();
        if distance < best_distance {
            best_distance = distance;
            best = cluster;
        }
    }

    best
}
