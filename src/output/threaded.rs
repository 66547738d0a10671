/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::{PipelineError, Result};
use crossbeam_channel::Sender;
use std::io::{self, Write};
use std::mem;
use std::thread::{self, JoinHandle};

/// Moves writes to a separate io thread so that the measured loops don't block on disk
pub struct ThreadedWriter<T>
where
    T: Send + Sync,
{
    handle: JoinHandle<io::Result<()>>,
    tx: Sender<T>,
    target: String,
}

impl<T> ThreadedWriter<T>
where
    T: Send + Sync + 'static,
{
    /// Creates a new threaded writer. `target` names the destination in error messages
    pub fn new<W, F>(target: &str, mut writer: W, serializer: F) -> Result<Self>
    where
        F: Fn(T) -> Vec<u8> + Send + Sync + 'static,
        W: Write + Send + Sync + 'static,
    {
        log::trace!("Creating new threaded writer");
        let (tx, rx) = crossbeam_channel::bounded(1024);
        let handle = thread::Builder::new()
            .name("io-thread".to_string())
            .spawn(move || {
                log::trace!("Writing thread running");

                for value in rx {
                    let bytes = serializer(value);
                    writer.write_all(&bytes[..])?;
                    writer.flush()?;
                }
                Ok(())
            })
            .map_err(|e| PipelineError::WorkerPanicked(format!("io-thread: {}", e)))?;

        Ok(Self {
            handle,
            tx,
            target: target.to_string(),
        })
    }

    /// Writes a value. Fails if the io thread already stopped
    pub fn write(&self, value: T) -> Result<()> {
        log::trace!("Writing into threaded writer");
        self.tx
            .send(value)
            .map_err(|_| PipelineError::WorkerPanicked(format!("io-thread for {}", self.target)))
    }

    /// Closes the channel to the writer and waits for the writer thread to stop
    pub fn close(self) -> Result<()> {
        log::trace!("Closing file and shutting down thread");
        mem::drop(self.tx);
        match self.handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PipelineError::output(self.target, e)),
            Err(_) => Err(PipelineError::WorkerPanicked(format!("io-thread for {}", self.target))),
        }
    }
}
