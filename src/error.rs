/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use std::io;
#[cfg(feature = "opencl")]
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every error is fatal for the benchmark run. The orchestrators propagate
/// them to `main` which reports the diagnostic and terminates.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Allocation error: could not acquire {len} elements for {what}")]
    Allocation { what: &'static str, len: usize },

    #[cfg(feature = "opencl")]
    #[error("OpenCL error during {op} at {location}: {source}")]
    Device {
        op: &'static str,
        location: &'static Location<'static>,
        #[source]
        source: ocl::Error,
    },

    #[error("Unable to open file {path:?}: {source}")]
    InputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to write to {target}: {source}")]
    Output {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid token {token:?} in {path:?}")]
    Parse { path: PathBuf, token: String },

    #[error("File {path:?} contains {found} values but {expected} are required")]
    ShortInput {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Worker {0} panicked")]
    WorkerPanicked(String),
}

impl PipelineError {
    pub fn input_file<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::InputFile {
            path: path.into(),
            source,
        }
    }

    pub fn output<T: ToString>(target: T, source: io::Error) -> Self {
        Self::Output {
            target: target.to_string(),
            source,
        }
    }
}

/// Attaches the operation name to device results
#[cfg(feature = "opencl")]
pub trait DeviceResultExt<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

#[cfg(feature = "opencl")]
impl<T, E> DeviceResultExt<T> for std::result::Result<T, E>
where
    E: Into<ocl::Error>,
{
    #[track_caller]
    fn op(self, op: &'static str) -> Result<T> {
        let location = Location::caller();
        self.map_err(|source| PipelineError::Device {
            op,
            location,
            source: source.into(),
        })
    }
}
