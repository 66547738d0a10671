/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::Result;
use crate::task_queue::TaskQueue;
use std::ops::{Add, AddAssign};
use std::time::Duration;

pub mod cpu;
#[cfg(feature = "opencl")]
pub mod opencl;

/// Scalar parameters that are passed to the histogram kernel for one batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchParams {
    /// Position of the first queued task in the pool
    pub offset: usize,
    pub len: usize,
    pub frame_size: usize,
    pub n_bins: usize,
}

/// Shape of the k-means problem
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterDims {
    pub n_points: usize,
    pub n_features: usize,
    pub n_clusters: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BatchTimings {
    pub copy_to_device: Duration,
    pub kernel: Duration,
    pub copy_back: Duration,
}

impl Add for BatchTimings {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            copy_to_device: self.copy_to_device + rhs.copy_to_device,
            kernel: self.kernel + rhs.kernel,
            copy_back: self.copy_back + rhs.copy_back,
        }
    }
}

impl AddAssign for BatchTimings {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// The compute device the pipelines submit their buffers to.
/// Every call blocks until the device signaled completion.
pub trait ComputeEngine {
    fn name(&self) -> String;

    /// Computes one histogram per staged task into the result buffer of the queue
    fn process_batch(&mut self, queue: &mut TaskQueue, params: &BatchParams)
        -> Result<BatchTimings>;

    /// Uploads the column-major feature matrix once before the clustering passes
    fn load_features(&mut self, features: &[f32], dims: ClusterDims) -> Result<()>;

    /// Assigns every point to its nearest cluster center.
    /// The points are split into `n_streams` disjoint ranges that are processed concurrently,
    /// the centers are shared read-only by all streams.
    fn assign_clusters(
        &mut self,
        clusters: &[f32],
        n_streams: usize,
        membership: &mut [i32],
    ) -> Result<Duration>;
}

/// Splits `n_points` into `n_streams` contiguous ranges of almost equal size
pub fn stream_ranges(n_points: usize, n_streams: usize) -> Vec<(usize, usize)> {
    let n_streams = n_streams.max(1);
    let chunk = (n_points + n_streams - 1) / n_streams;
    (0..n_streams)
        .map(|i| {
            let start = (i * chunk).min(n_points);
            let end = ((i + 1) * chunk).min(n_points);
            (start, end - start)
        })
        .filter(|(_, len)| *len > 0)
        .collect()
}

/// Returns the histogram bin of a pixel value in `[0, 255]`
#[inline]
pub fn bin_of(value: i32, n_bins: usize) -> usize {
    ((value.max(0).min(255) as usize) * n_bins) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_ranges_are_disjoint_and_complete() {
        assert_eq!(stream_ranges(10, 3), vec![(0, 4), (4, 4), (8, 2)]);
        assert_eq!(stream_ranges(2, 8), vec![(0, 1), (1, 1)]);
        assert_eq!(stream_ranges(0, 4), vec![]);
        assert_eq!(stream_ranges(5, 0), vec![(0, 5)]);
    }

    #[test]
    fn bins_scale_with_bin_count() {
        assert_eq!(bin_of(0, 256), 0);
        assert_eq!(bin_of(255, 256), 255);
        assert_eq!(bin_of(255, 16), 15);
        assert_eq!(bin_of(128, 2), 1);
        assert_eq!(bin_of(-3, 256), 0);
        assert_eq!(bin_of(300, 256), 255);
    }
}
