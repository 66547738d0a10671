/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Clone, Debug)]
#[structopt()]
pub enum Opts {
    /// Streams frames through a bounded task queue and computes one histogram per frame
    #[structopt(name = "histogram")]
    Histogram(HistogramOptions),

    /// Clusters points with k-means, assigning them on multiple compute streams
    #[structopt(name = "kmeans")]
    Kmeans(KmeansOptions),

    /// Splits tasks between host threads and device work-groups
    #[structopt(name = "partition")]
    Partition(PartitionOptions),

    /// Prints OpenCL device information
    #[structopt(name = "info")]
    Info(GeneralOptions),
}

#[derive(StructOpt, Clone, Debug)]
pub struct HistogramOptions {
    #[structopt(flatten)]
    pub general_options: GeneralOptions,

    /// Number of repetitions that are run before timing starts
    #[structopt(short = "w", long = "warmup", default_value = "1")]
    pub n_warmup: usize,

    /// Number of timed repetitions
    #[structopt(short = "r", long = "reps", default_value = "10")]
    pub n_reps: usize,

    /// Base name of the frame files. The frames are read from <file>0.float and <file>1.float
    #[structopt(short = "f", long = "file", default_value = "input/basket/basket")]
    pub file_name: PathBuf,

    /// Number of tasks (frames) in the pool
    #[structopt(long = "pool-size", default_value = "1600")]
    pub pool_size: usize,

    /// Number of tasks that are sent to the device per batch
    #[structopt(long = "queue-size", default_value = "320")]
    pub queue_size: usize,

    /// Frame height
    #[structopt(short = "m", long = "height", default_value = "288")]
    pub m: usize,

    /// Frame width
    #[structopt(short = "n", long = "width", default_value = "352")]
    pub n: usize,

    /// Number of histogram bins
    #[structopt(long = "bins", default_value = "256")]
    pub n_bins: usize,

    /// File with the expected histograms. If not given the histograms are verified on the host
    #[structopt(long = "reference")]
    pub reference: Option<PathBuf>,

    /// The output file for the timings of every measured repetition
    #[structopt(long = "timings-output")]
    pub timings_file: Option<PathBuf>,
}

#[derive(StructOpt, Clone, Debug)]
pub struct KmeansOptions {
    #[structopt(flatten)]
    pub general_options: GeneralOptions,

    /// Input file with one point per line: <id> <f1> ... <fN>
    #[structopt(short = "i", long = "input")]
    pub input: PathBuf,

    /// Number of clusters
    #[structopt(short = "k", long = "clusters", default_value = "5")]
    pub n_clusters: usize,

    /// Maximum number of passes
    #[structopt(long = "max-iterations", default_value = "500")]
    pub max_iterations: usize,

    /// Stops once no more than this number of points changed their cluster
    #[structopt(long = "threshold", default_value = "0")]
    pub threshold: usize,

    /// Number of concurrent compute streams
    #[structopt(short = "s", long = "streams", default_value = "8")]
    pub n_streams: usize,

    /// File with the expected membership that is checked after converging
    #[structopt(long = "reference")]
    pub reference: Option<PathBuf>,
}

#[derive(StructOpt, Clone, Debug)]
pub struct PartitionOptions {
    #[structopt(flatten)]
    pub general_options: GeneralOptions,

    /// Number of tasks to distribute
    #[structopt(long = "tasks", default_value = "100")]
    pub n_tasks: usize,

    /// Share of the tasks processed by the host. Values outside of [0, 1]
    /// select dynamic partitioning
    #[structopt(long = "alpha", default_value = "0.5", allow_hyphen_values = true)]
    pub alpha: f64,

    /// Number of host threads
    #[structopt(long = "host-threads", default_value = "4")]
    pub n_host_threads: usize,

    /// Number of emulated device work-groups. 0 uses the number of cpus
    #[structopt(short = "g", long = "groups", default_value = "4")]
    pub n_groups: usize,
}

#[derive(StructOpt, Clone, Debug)]
pub struct GeneralOptions {
    /// If the output should be colored
    #[structopt(long = "color", possible_values = &UseColors::variants(), case_insensitive = true, default_value = "auto")]
    pub color: UseColors,

    /// number of used host threads
    #[structopt(short = "p", long = "threads", default_value = "1")]
    pub threads: usize,

    /// The engine that runs the kernels
    #[structopt(short = "e", long = "engine", possible_values = &EngineKind::variants(), case_insensitive = true, default_value = "cpu")]
    pub engine: EngineKind,

    /// Index of the OpenCL platform
    #[structopt(long = "platform", default_value = "0")]
    pub platform: usize,

    /// Index of the OpenCL device on the platform
    #[structopt(long = "device", default_value = "0")]
    pub device: usize,
}

arg_enum! {
    #[derive(Clone, Debug)]
    pub enum UseColors {
        Off,
        On,
        Auto,
    }
}

arg_enum! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum EngineKind {
        Cpu,
        OpenCL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_defaults() {
        let opts = Opts::from_iter(&["hetero-pipeline", "histogram"]);
        match opts {
            Opts::Histogram(options) => {
                assert_eq!(options.pool_size, 1600);
                assert_eq!(options.queue_size, 320);
                assert_eq!(options.m * options.n, 288 * 352);
                assert_eq!(options.n_bins, 256);
                assert_eq!(options.n_warmup, 1);
                assert_eq!(options.n_reps, 10);
                assert_eq!(options.general_options.threads, 1);
                assert_eq!(options.general_options.engine, EngineKind::Cpu);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn negative_alpha_is_accepted() {
        let opts = Opts::from_iter(&["hetero-pipeline", "partition", "--alpha", "-1", "--engine", "opencl"]);
        match opts {
            Opts::Partition(options) => {
                assert_eq!(options.alpha, -1.0);
                assert_eq!(options.n_host_threads, 4);
                assert_eq!(options.n_groups, 4);
                assert_eq!(options.general_options.engine, EngineKind::OpenCL);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
