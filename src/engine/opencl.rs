/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::benching::{enqueue_profiled, profiled_span};
use crate::engine::{stream_ranges, BatchParams, BatchTimings, ClusterDims, ComputeEngine};
use crate::error::{DeviceResultExt, PipelineError, Result};
use crate::task_queue::{Task, TaskQueue};
use ocl::core::DeviceInfo;
use ocl::{Buffer, CommandQueueProperties, Context, Device, Kernel, Platform, Program, Queue};
use std::time::{Duration, Instant};

const PARTITIONER_SRC: &str = include_str!("../../kernels/partitioner.cl");
const HISTOGRAM_SRC: &str = include_str!("../../kernels/histogram.cl");
const KMEANS_SRC: &str = include_str!("../../kernels/kmeans.cl");

/// Work-items per group for the histogram kernel
const LOCAL_SIZE: usize = 256;

/// Every handle needed to talk to the device.
/// Created once on init and released when dropped.
pub struct EngineContext {
    pub platform: Platform,
    pub device: Device,
    pub context: Context,
    pub program: Program,
    /// Queue for transfers and the histogram kernel
    pub queue_in: Queue,
    /// One queue per concurrent compute stream
    pub streams: Vec<Queue>,
}

impl EngineContext {
    pub fn create(platform_index: usize, device_index: usize, n_streams: usize) -> Result<Self> {
        let platform = Platform::list()
            .get(platform_index)
            .cloned()
            .ok_or_else(|| {
                PipelineError::InvalidParams(format!("no OpenCL platform {}", platform_index))
            })?;
        let device = Device::list_all(platform)
            .op("listing devices")?
            .get(device_index)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidParams(format!("no device {}", device_index)))?;

        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .op("creating context")?;
        let program = Program::builder()
            .src(format!("{}\n{}\n{}", PARTITIONER_SRC, HISTOGRAM_SRC, KMEANS_SRC))
            .devices(device)
            .build(&context)
            .op("building program")?;
        let queue_in = Queue::new(
            &context,
            device,
            Some(CommandQueueProperties::PROFILING_ENABLE),
        )
        .op("creating command queue")?;
        let streams = (0..n_streams.max(1))
            .map(|_| Queue::new(&context, device, None).map_err(ocl::Error::from))
            .collect::<ocl::Result<Vec<Queue>>>()
            .op("creating stream queues")?;
        log::info!(
            "Using device {} with {} streams",
            device.name().op("querying device name")?,
            streams.len()
        );

        Ok(Self {
            platform,
            device,
            context,
            program,
            queue_in,
            streams,
        })
    }

    /// Waits for every queue of the context
    pub fn finish(&self) -> Result<()> {
        self.queue_in.finish().op("finishing input queue")?;
        for queue in &self.streams {
            queue.finish().op("finishing stream queue")?;
        }
        Ok(())
    }

    /// Prints information about the device capabilities
    pub fn print_info(&self) -> Result<()> {
        let info_keys = vec![
            DeviceInfo::Type,
            DeviceInfo::Vendor,
            DeviceInfo::DriverVersion,
            DeviceInfo::MaxComputeUnits,
            DeviceInfo::MaxWorkGroupSize,
            DeviceInfo::MaxClockFrequency,
            DeviceInfo::GlobalMemSize,
            DeviceInfo::LocalMemSize,
            DeviceInfo::MaxMemAllocSize,
            DeviceInfo::OpenclCVersion,
        ];

        println!("Platform: {}", self.platform.name().op("querying platform")?);
        println!("Devices in context: {}", self.context.devices().len());
        for info in info_keys {
            println!("{:?}: {}", info, self.device.info(info).op("querying device")?)
        }
        println!();

        Ok(())
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("Failed to drain the command queues on release: {}", e);
        }
        log::debug!("Releasing OpenCL context");
    }
}

struct HistogramBuffers {
    capacity: usize,
    frame_size: usize,
    n_bins: usize,
    tasks: Buffer<Task>,
    data: Buffer<i32>,
    histo: Buffer<i32>,
    /// Worklist of the device partitioner, cleared before every batch
    consumed: Buffer<i32>,
    kernel: Kernel,
}

struct ClusterBuffers {
    dims: ClusterDims,
    clusters: Buffer<f32>,
    membership: Buffer<i32>,
    kernels: Vec<Kernel>,
    // keeps the feature matrix alive for the stream kernels
    _features: Buffer<f32>,
}

/// Runs the kernels on an OpenCL device
pub struct OpenClEngine {
    ctx: EngineContext,
    histogram: Option<HistogramBuffers>,
    cluster: Option<ClusterBuffers>,
}

impl OpenClEngine {
    pub fn new(platform_index: usize, device_index: usize, n_streams: usize) -> Result<Self> {
        Ok(Self {
            ctx: EngineContext::create(platform_index, device_index, n_streams)?,
            histogram: None,
            cluster: None,
        })
    }

    fn histogram_buffers(&mut self, queue: &TaskQueue) -> Result<&mut HistogramBuffers> {
        let fits = self.histogram.as_ref().map_or(false, |b| {
            b.capacity == queue.capacity()
                && b.frame_size == queue.frame_size()
                && b.n_bins == queue.n_bins()
        });
        if !fits {
            self.histogram = Some(self.create_histogram_buffers(queue)?);
        }
        self.histogram
            .as_mut()
            .ok_or_else(|| PipelineError::InvalidParams("histogram buffers missing".into()))
    }

    fn create_histogram_buffers(&self, queue: &TaskQueue) -> Result<HistogramBuffers> {
        log::debug!("Allocating device queues for {} tasks", queue.capacity());
        let capacity = queue.capacity();
        let tasks = Buffer::<Task>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(capacity)
            .build()
            .op("allocating task queue")?;
        let data = Buffer::<i32>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(capacity * queue.frame_size())
            .build()
            .op("allocating data queue")?;
        let histo = Buffer::<i32>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(capacity * queue.n_bins())
            .build()
            .op("allocating histogram queue")?;
        let consumed = Buffer::<i32>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(1)
            .fill_val(0)
            .build()
            .op("allocating consumed counter")?;

        let kernel = Kernel::builder()
            .program(&self.ctx.program)
            .name("histogram_tq")
            .queue(self.ctx.queue_in.clone())
            .global_work_size(capacity * LOCAL_SIZE)
            .local_work_size(LOCAL_SIZE)
            .arg(&tasks)
            .arg(&data)
            .arg(&histo)
            .arg(&consumed)
            .arg_named("offset", 0i32)
            .arg_named("len", 0i32)
            .arg(queue.frame_size() as i32)
            .arg(queue.n_bins() as i32)
            .arg_local::<i32>(queue.n_bins())
            .arg_local::<i32>(1)
            .build()
            .op("building histogram kernel")?;

        Ok(HistogramBuffers {
            capacity,
            frame_size: queue.frame_size(),
            n_bins: queue.n_bins(),
            tasks,
            data,
            histo,
            consumed,
            kernel,
        })
    }
}

impl ComputeEngine for OpenClEngine {
    fn name(&self) -> String {
        self.ctx
            .device
            .name()
            .unwrap_or_else(|_| "unknown OpenCL device".to_string())
    }

    fn process_batch(
        &mut self,
        queue: &mut TaskQueue,
        params: &BatchParams,
    ) -> Result<BatchTimings> {
        let profiling_queue = self.ctx.queue_in.clone();
        let buffers = self.histogram_buffers(queue)?;

        let (_, copy_to_device) = profiled_span(&profiling_queue, || {
            buffers.tasks.write(queue.task_buffer()).enq()?;
            buffers.data.write(queue.data_buffer()).enq()?;
            buffers.histo.write(queue.result_buffer()).enq()?;
            buffers.consumed.write(&[0i32][..]).enq()
        })
        .op("writing task queue")?;

        buffers
            .kernel
            .set_arg("offset", params.offset as i32)
            .op("setting kernel offset")?;
        buffers
            .kernel
            .set_arg("len", params.len as i32)
            .op("setting kernel length")?;
        let kernel = enqueue_profiled(&profiling_queue, &buffers.kernel).op("running histogram kernel")?;
        profiling_queue.finish().op("waiting for histogram kernel")?;

        let (_, copy_back) = profiled_span(&profiling_queue, || {
            buffers.histo.read(queue.result_buffer_mut()).enq()
        })
        .op("reading histogram queue")?;

        Ok(BatchTimings {
            copy_to_device,
            kernel,
            copy_back,
        })
    }

    fn load_features(&mut self, features: &[f32], dims: ClusterDims) -> Result<()> {
        let features_buffer = Buffer::<f32>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(dims.n_points * dims.n_features)
            .build()
            .op("allocating features")?;
        features_buffer
            .write(features)
            .enq()
            .op("writing features")?;
        let clusters = Buffer::<f32>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(dims.n_clusters * dims.n_features)
            .build()
            .op("allocating clusters")?;
        let membership = Buffer::<i32>::builder()
            .queue(self.ctx.queue_in.clone())
            .len(dims.n_points)
            .build()
            .op("allocating membership")?;

        let mut kernels = Vec::new();
        let ranges = stream_ranges(dims.n_points, self.ctx.streams.len());
        for ((offset, len), stream) in ranges.into_iter().zip(&self.ctx.streams) {
            let kernel = Kernel::builder()
                .program(&self.ctx.program)
                .name("kmeans_assign")
                .queue(stream.clone())
                .global_work_offset(offset)
                .global_work_size(len)
                .arg(&features_buffer)
                .arg(&clusters)
                .arg(&membership)
                .arg(dims.n_points as i32)
                .arg(dims.n_clusters as i32)
                .arg(dims.n_features as i32)
                .build()
                .op("building kmeans kernel")?;
            kernels.push(kernel);
        }
        self.ctx.queue_in.finish().op("waiting for feature upload")?;

        self.cluster = Some(ClusterBuffers {
            dims,
            clusters,
            membership,
            kernels,
            _features: features_buffer,
        });
        Ok(())
    }

    fn assign_clusters(
        &mut self,
        clusters: &[f32],
        n_streams: usize,
        membership: &mut [i32],
    ) -> Result<Duration> {
        let buffers = self.cluster.as_ref().ok_or_else(|| {
            PipelineError::InvalidParams("features need to be loaded before clustering".into())
        })?;
        if n_streams != self.ctx.streams.len() {
            log::debug!(
                "Using the {} streams of the context instead of {}",
                self.ctx.streams.len(),
                n_streams
            );
        }
        buffers
            .clusters
            .write(clusters)
            .enq()
            .op("writing clusters")?;
        self.ctx.queue_in.finish().op("waiting for cluster upload")?;

        let start = Instant::now();
        for kernel in &buffers.kernels {
            unsafe {
                kernel.enq().op("enqueueing kmeans stream")?;
            }
        }
        for stream in &self.ctx.streams {
            stream.finish().op("waiting for kmeans stream")?;
        }
        let duration = start.elapsed();

        buffers
            .membership
            .read(&mut membership[..buffers.dims.n_points])
            .enq()
            .op("reading membership")?;

        Ok(duration)
    }
}
