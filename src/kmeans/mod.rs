/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

//! K-means clustering where the nearest cluster search runs on several
//! concurrent compute streams and the host recomputes the centers.

use crate::engine::{ClusterDims, ComputeEngine};
use crate::error::{PipelineError, Result};
use crate::kmeans::input::Points;
use crate::verify::{self, Verdict};
use std::path::PathBuf;
use std::time::Duration;

pub mod input;

#[derive(Clone, Debug)]
pub struct KmeansParams {
    pub n_clusters: usize,
    pub max_iterations: usize,
    /// Stops once no more than this many points changed their cluster
    pub threshold: usize,
    pub n_streams: usize,
    pub reference: Option<PathBuf>,
}

pub struct KmeansState {
    features: Vec<f32>,
    dims: ClusterDims,
    membership: Vec<i32>,
}

impl KmeansState {
    pub fn new(points: Points, n_clusters: usize) -> Result<Self> {
        if n_clusters == 0 || n_clusters > points.n_points {
            return Err(PipelineError::InvalidParams(format!(
                "can't build {} clusters from {} points",
                n_clusters, points.n_points
            )));
        }
        let dims = ClusterDims {
            n_points: points.n_points,
            n_features: points.n_features,
            n_clusters,
        };

        Ok(Self {
            features: points.features,
            dims,
            membership: vec![-1; dims.n_points],
        })
    }

    pub fn dims(&self) -> ClusterDims {
        self.dims
    }

    pub fn membership(&self) -> &[i32] {
        &self.membership
    }

    fn point(&self, index: usize) -> &[f32] {
        &self.features[index * self.dims.n_features..(index + 1) * self.dims.n_features]
    }
}

/// Result of a single pass
#[derive(Clone, Debug)]
pub struct PassOutcome {
    /// Number of points whose cluster changed
    pub delta: usize,
    pub new_centers_len: Vec<usize>,
    /// Per cluster sum of the assigned points
    pub new_centers: Vec<f32>,
    pub kernel_duration: Duration,
}

#[derive(Clone, Debug)]
pub struct ClusterReport {
    pub iterations: usize,
    pub delta: usize,
    pub clusters: Vec<f32>,
    pub kernel_duration: Duration,
    /// Only set if the run converged to zero changes and a reference was configured
    pub verdict: Option<Verdict>,
}

/// Stores the features column-major (`[feature][point]`) as the kernels expect them
pub fn transpose_features(features: &[f32], n_points: usize, n_features: usize) -> Vec<f32> {
    let mut swapped = vec![0f32; n_points * n_features];
    for point in 0..n_points {
        for feature in 0..n_features {
            swapped[feature * n_points + point] = features[point * n_features + feature];
        }
    }
    swapped
}

/// The first `n_clusters` points are the initial centers
pub fn initial_clusters(state: &KmeansState) -> Vec<f32> {
    state.features[..state.dims.n_clusters * state.dims.n_features].to_vec()
}

/// Assigns all points to their nearest center on the engine and accumulates the new centers.
/// The centers must not change while the streams are running.
pub fn kmeans_pass<E>(
    engine: &mut E,
    state: &mut KmeansState,
    clusters: &[f32],
    n_streams: usize,
) -> Result<PassOutcome>
where
    E: ComputeEngine + ?Sized,
{
    let dims = state.dims;
    let mut assigned = vec![0i32; dims.n_points];
    let kernel_duration = engine.assign_clusters(clusters, n_streams, &mut assigned)?;

    let mut delta = 0;
    let mut new_centers_len = vec![0usize; dims.n_clusters];
    let mut new_centers = vec![0f32; dims.n_clusters * dims.n_features];

    for (point, cluster) in assigned.iter().enumerate() {
        let cluster = *cluster as usize;
        if cluster >= dims.n_clusters {
            return Err(PipelineError::InvalidParams(format!(
                "engine assigned point {} to unknown cluster {}",
                point, cluster
            )));
        }
        new_centers_len[cluster] += 1;
        if state.membership[point] != assigned[point] {
            delta += 1;
            state.membership[point] = assigned[point];
        }
        let center = &mut new_centers[cluster * dims.n_features..(cluster + 1) * dims.n_features];
        for (sum, value) in center.iter_mut().zip(state.point(point)) {
            *sum += value;
        }
    }

    Ok(PassOutcome {
        delta,
        new_centers_len,
        new_centers,
        kernel_duration,
    })
}

/// Runs passes until at most `threshold` points change or the iteration cap is reached
pub fn cluster<E>(engine: &mut E, state: &mut KmeansState, params: &KmeansParams) -> Result<ClusterReport>
where
    E: ComputeEngine + ?Sized,
{
    let dims = state.dims;
    engine.load_features(
        &transpose_features(&state.features, dims.n_points, dims.n_features),
        dims,
    )?;
    let mut clusters = initial_clusters(state);
    let mut iterations = 0;
    let mut kernel_duration = Duration::default();

    let delta = loop {
        let outcome = kmeans_pass(engine, state, &clusters, params.n_streams)?;
        iterations += 1;
        kernel_duration += outcome.kernel_duration;
        log::debug!("Pass {} changed {} assignments", iterations, outcome.delta);

        for (cluster, count) in outcome.new_centers_len.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let range = cluster * dims.n_features..(cluster + 1) * dims.n_features;
            for (center, sum) in clusters[range.clone()].iter_mut().zip(&outcome.new_centers[range]) {
                *center = sum / *count as f32;
            }
        }

        if outcome.delta <= params.threshold || iterations >= params.max_iterations {
            break outcome.delta;
        }
    };

    let verdict = match (&params.reference, delta) {
        (Some(path), 0) => {
            let verdict = verify::compare(&verify::read_reference(path)?, &state.membership);
            if verdict.passed() {
                log::info!("Membership matches the reference");
            } else {
                log::warn!("Membership verification {}", verdict);
            }
            Some(verdict)
        }
        _ => None,
    };

    Ok(ClusterReport {
        iterations,
        delta,
        clusters,
        kernel_duration,
        verdict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cpu::CpuEngine;
    use crate::kmeans::input::read_points;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    const CENTERS: [(f32, f32); 3] = [(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)];

    /// Writes `n_points` points around three centers, point `i` belongs to center `i % 3`
    fn write_seeded_points(path: &Path, n_points: usize, mut seed: u64) {
        let mut noise = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as f32 / (1u64 << 31) as f32) * 2.0 - 1.0
        };
        let mut file = File::create(path).unwrap();
        for i in 0..n_points {
            let (x, y) = CENTERS[i % 3];
            writeln!(file, "{} {} {}", i + 1, x + noise(), y + noise()).unwrap();
        }
    }

    fn params(reference: Option<PathBuf>) -> KmeansParams {
        KmeansParams {
            n_clusters: 3,
            max_iterations: 500,
            threshold: 0,
            n_streams: 8,
            reference,
        }
    }

    #[test]
    fn transpose_swaps_layout() {
        let swapped = transpose_features(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        assert_eq!(swapped, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn first_pass_counts_every_point_as_changed() {
        let points = Points {
            features: vec![0.0, 0.0, 5.0, 5.0, 0.5, 0.5, 5.5, 5.5],
            n_points: 4,
            n_features: 2,
        };
        let mut state = KmeansState::new(points, 2).unwrap();
        let mut engine = CpuEngine::new();
        let dims = state.dims();
        engine
            .load_features(&transpose_features(&state.features, 4, 2), dims)
            .unwrap();
        let clusters = initial_clusters(&state);
        assert_eq!(clusters, vec![0.0, 0.0, 5.0, 5.0]);

        let outcome = kmeans_pass(&mut engine, &mut state, &clusters, 2).unwrap();
        assert_eq!(outcome.delta, 4);
        assert_eq!(outcome.new_centers_len, vec![2, 2]);
        assert_eq!(outcome.new_centers, vec![0.5, 0.5, 10.5, 10.5]);
        assert_eq!(state.membership(), &[0, 1, 0, 1]);

        let outcome = kmeans_pass(&mut engine, &mut state, &clusters, 3).unwrap();
        assert_eq!(outcome.delta, 0);
    }

    #[test]
    fn seeded_input_converges_to_reference() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.txt");
        let reference = dir.path().join("output.txt");
        write_seeded_points(&input, 300, 42);
        let mut file = File::create(&reference).unwrap();
        for i in 0..300 {
            writeln!(file, "{}", i % 3).unwrap();
        }

        let mut state = KmeansState::new(read_points(&input).unwrap(), 3).unwrap();
        let report = cluster(&mut CpuEngine::new(), &mut state, &params(Some(reference))).unwrap();

        assert_eq!(report.delta, 0);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.verdict, Some(Verdict::Pass));
        for (cluster, (x, y)) in CENTERS.iter().enumerate() {
            assert!((report.clusters[cluster * 2] - x).abs() < 0.5);
            assert!((report.clusters[cluster * 2 + 1] - y).abs() < 0.5);
        }
    }

    #[test]
    fn diverging_reference_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.txt");
        let reference = dir.path().join("output.txt");
        write_seeded_points(&input, 30, 7);
        let mut file = File::create(&reference).unwrap();
        for i in 0..30 {
            writeln!(file, "{}", if i == 4 { 2 } else { i % 3 }).unwrap();
        }

        let mut state = KmeansState::new(read_points(&input).unwrap(), 3).unwrap();
        let report = cluster(&mut CpuEngine::new(), &mut state, &params(Some(reference))).unwrap();
        assert_eq!(
            report.verdict,
            Some(Verdict::Fail {
                mismatches: 1,
                index: 4,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn iteration_cap_stops_without_verification() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.txt");
        write_seeded_points(&input, 30, 3);

        let mut state = KmeansState::new(read_points(&input).unwrap(), 3).unwrap();
        let mut params = params(Some(dir.path().join("missing.txt")));
        params.max_iterations = 1;
        let report = cluster(&mut CpuEngine::new(), &mut state, &params).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(report.delta, 30);
        assert_eq!(report.verdict, None);
    }

    #[test]
    fn too_many_clusters_are_rejected() {
        let points = Points {
            features: vec![1.0, 2.0],
            n_points: 2,
            n_features: 1,
        };
        assert!(KmeansState::new(points, 3).is_err());
    }
}
