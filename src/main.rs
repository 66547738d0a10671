/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

#[macro_use]
extern crate clap;

use crate::concurrency::executor::CooperativeExecutor;
use crate::engine::cpu::CpuEngine;
use crate::engine::ComputeEngine;
use crate::error::{PipelineError, Result};
use crate::histogram::input::read_input;
use crate::histogram::HistogramParams;
use crate::kmeans::input::read_points;
use crate::kmeans::{KmeansParams, KmeansState};
use crate::output::csv::{ThreadedCSVWriter, TIMING_COLUMNS};
use crate::partitioner::Worker;
use crate::task_queue::pipeline::{TIMER_COPY_BACK, TIMER_COPY_TO, TIMER_INSERT, TIMER_KERNEL};
use crate::utils::args::{
    EngineKind, GeneralOptions, HistogramOptions, KmeansOptions, Opts, PartitionOptions,
};
use crate::utils::logging::init_logger;
use crate::utils::timer::Timer;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use structopt::StructOpt;

#[cfg(feature = "opencl")]
mod benching;
mod buffers;
mod concurrency;
mod engine;
mod error;
mod histogram;
mod kmeans;
mod output;
mod partitioner;
mod task_queue;
mod utils;
mod verify;

fn main() {
    let opts: Opts = Opts::from_args();
    let general_options = match &opts {
        Opts::Histogram(o) => &o.general_options,
        Opts::Kmeans(o) => &o.general_options,
        Opts::Partition(o) => &o.general_options,
        Opts::Info(o) => o,
    };
    init_logger(&general_options.color);

    let result = set_host_threads(general_options.threads).and_then(|_| match opts {
        Opts::Histogram(histogram_opts) => run_histogram(histogram_opts),
        Opts::Kmeans(kmeans_opts) => run_kmeans(kmeans_opts),
        Opts::Partition(partition_opts) => run_partition(partition_opts),
        Opts::Info(general) => print_info(general),
    });

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    }
}

fn set_host_threads(threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("rayon-{}", i))
        .build_global()
        .map_err(|e| PipelineError::InvalidParams(format!("can't use {} threads: {}", threads, e)))
}

/// Creates the engine selected on the command line
#[cfg_attr(not(feature = "opencl"), allow(unused_variables))]
fn create_engine(options: &GeneralOptions, n_streams: usize) -> Result<Box<dyn ComputeEngine>> {
    let engine: Box<dyn ComputeEngine> = match options.engine {
        EngineKind::Cpu => Box::new(CpuEngine::new()),
        #[cfg(feature = "opencl")]
        EngineKind::OpenCL => Box::new(engine::opencl::OpenClEngine::new(
            options.platform,
            options.device,
            n_streams,
        )?),
        #[cfg(not(feature = "opencl"))]
        EngineKind::OpenCL => {
            return Err(PipelineError::InvalidParams(
                "the binary was built without the opencl feature".to_string(),
            ))
        }
    };
    log::info!("Running on {}", engine.name());

    Ok(engine)
}

/// Runs the task queue histogram benchmark. Returns if the histograms were verified
fn run_histogram(opts: HistogramOptions) -> Result<bool> {
    let params = HistogramParams {
        n_warmup: opts.n_warmup,
        n_reps: opts.n_reps,
        file_name: opts.file_name,
        pool_size: opts.pool_size,
        queue_size: opts.queue_size,
        m: opts.m,
        n: opts.n,
        n_bins: opts.n_bins,
        reference: opts.reference,
    };
    params.validate()?;
    let mut engine = create_engine(&opts.general_options, 1)?;
    let mut timer = Timer::new();

    timer.start("Initialization");
    let pool = read_input(&params.file_name, params.pool_size, params.frame_size())?;
    timer.stop("Initialization");
    timer.print("Initialization", 1);

    let report = histogram::run(engine.as_mut(), &params, &pool, &mut timer)?;
    for section in &[TIMER_INSERT, TIMER_COPY_TO, TIMER_KERNEL, TIMER_COPY_BACK] {
        timer.print(section, params.n_reps);
    }

    if let Some(path) = opts.timings_file {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| PipelineError::output(path.display(), e))?;
        let writer = ThreadedCSVWriter::new(
            &path.display().to_string(),
            BufWriter::new(file),
            TIMING_COLUMNS,
        )?;
        for (rep, pass) in report.passes.iter().enumerate() {
            writer.add_pass(rep, pass)?;
        }
        writer.close()?;
        log::info!("Wrote timings to {:?}", path);
    }

    if report.verdict.passed() {
        log::info!("Test Passed");
    } else {
        log::error!("Histogram verification {}", report.verdict);
    }

    Ok(report.verdict.passed())
}

/// Clusters the input points. Returns false if the membership didn't match the reference
fn run_kmeans(opts: KmeansOptions) -> Result<bool> {
    let params = KmeansParams {
        n_clusters: opts.n_clusters,
        max_iterations: opts.max_iterations,
        threshold: opts.threshold,
        n_streams: opts.n_streams,
        reference: opts.reference,
    };
    if params.n_streams == 0 || params.max_iterations == 0 {
        return Err(PipelineError::InvalidParams(
            "streams and iterations need to be positive".to_string(),
        ));
    }
    let mut timer = Timer::new();

    timer.start("Initialization");
    let points = read_points(&opts.input)?;
    log::info!(
        "Read {} points with {} features",
        points.n_points,
        points.n_features
    );
    let mut state = KmeansState::new(points, params.n_clusters)?;
    let mut engine = create_engine(&opts.general_options, params.n_streams)?;
    timer.stop("Initialization");
    timer.print("Initialization", 1);

    timer.start("Clustering");
    let report = kmeans::cluster(engine.as_mut(), &mut state, &params)?;
    timer.stop("Clustering");
    timer.add("Kernel", report.kernel_duration);
    timer.print("Clustering", 1);
    timer.print("Kernel", report.iterations);

    log::info!(
        "Finished after {} iterations with {} changed assignments",
        report.iterations,
        report.delta
    );
    let dims = state.dims();
    let mut sizes = vec![0usize; dims.n_clusters];
    for cluster in state.membership() {
        if let Some(size) = sizes.get_mut(*cluster as usize) {
            *size += 1;
        }
    }
    for (i, center) in report.clusters.chunks(dims.n_features).enumerate() {
        println!("{}: {} points around {:?}", i, sizes[i], center);
    }

    Ok(report.verdict.map_or(true, |v| v.passed()))
}

/// Distributes tasks between host threads and emulated work-groups and prints the split
fn run_partition(opts: PartitionOptions) -> Result<bool> {
    let n_groups = if opts.n_groups == 0 {
        num_cpus::get()
    } else {
        opts.n_groups
    };
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executed);

    let report = CooperativeExecutor::new(opts.n_host_threads, n_groups).run(
        opts.n_tasks,
        opts.alpha,
        move |index, worker| {
            log::trace!("Task {} on {:?}", index, worker);
            counter.fetch_add(1, Ordering::Relaxed);
        },
    )?;

    log::info!("Strategy: {:?}", report.strategy);
    for (worker, indices) in &report.workers {
        match worker {
            Worker::Host { thread_id, .. } => println!("host thread {}: {} tasks", thread_id, indices.len()),
            Worker::Device { group_id, .. } => println!("work-group {}: {} tasks", group_id, indices.len()),
        }
    }
    println!(
        "host: {}, device: {}, executed: {}",
        report.host_tasks(),
        report.device_tasks(),
        executed.load(Ordering::SeqCst)
    );

    Ok(report.is_exact_cover(opts.n_tasks))
}

#[cfg(feature = "opencl")]
fn print_info(options: GeneralOptions) -> Result<bool> {
    let ctx = engine::opencl::EngineContext::create(options.platform, options.device, 1)?;
    ctx.print_info()?;
    Ok(true)
}

#[cfg(not(feature = "opencl"))]
fn print_info(_: GeneralOptions) -> Result<bool> {
    println!("Built without the opencl feature, only the cpu engine is available.");
    println!("Host threads: {}", rayon::current_num_threads());
    Ok(true)
}
