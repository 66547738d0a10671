/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

//! Device side timing with marker events.
//! Every queue passed in here needs to have profiling enabled.

use ocl::core::{get_event_profiling_info, wait_for_event, ProfilingInfo};
use ocl::{EventList, Kernel, Queue};
use std::time::Duration;

/// Runs `commands` between two markers on `queue` and returns their result
/// together with the device time spent between the markers.
/// The commands have to be enqueued on `queue` itself.
pub fn profiled_span<T, F>(queue: &Queue, commands: F) -> ocl::Result<(T, Duration)>
where
    F: FnOnce() -> ocl::Result<T>,
{
    let event_start = queue.enqueue_marker::<EventList>(None)?;
    let value = commands()?;
    let event_stop = queue.enqueue_marker::<EventList>(None)?;

    wait_for_event(&event_start)?;
    wait_for_event(&event_stop)?;
    let start = get_event_profiling_info(&event_start, ProfilingInfo::End)?;
    let stop = get_event_profiling_info(&event_stop, ProfilingInfo::Start)?;
    let duration = Duration::from_nanos(stop.time()?.saturating_sub(start.time()?));
    log::trace!("Device span took {:?}", duration);

    Ok((value, duration))
}

/// Runs the kernel on its default queue, which has to be `queue`
pub fn enqueue_profiled(queue: &Queue, kernel: &Kernel) -> ocl::Result<Duration> {
    log::trace!("Enqueueing kernel with profiling");
    let ((), duration) = profiled_span(queue, || unsafe { kernel.enq() })?;

    Ok(duration)
}
