/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::error::Result;
use crate::output::threaded::ThreadedWriter;
use crate::task_queue::pipeline::PassReport;
use std::io::Write;
use std::time::Duration;

/// Columns of the per repetition timings file
pub const TIMING_COLUMNS: &[&str] = &[
    "repetition",
    "batches",
    "tasks",
    "copy_to_device_ms",
    "kernel_cpu_ms",
    "kernel_ms",
    "copy_back_ms",
];

pub struct ThreadedCSVWriter {
    inner: ThreadedWriter<String>,
    n_columns: usize,
}

impl ThreadedCSVWriter {
    /// Creates a new CSVWriter with a defined list of columns
    pub fn new<W>(target: &str, writer: W, columns: &[&str]) -> Result<Self>
    where
        W: Write + Send + Sync + 'static,
    {
        let column_vec = columns
            .iter()
            .map(|column| column.to_string())
            .collect::<Vec<String>>();
        log::trace!("Creating new CSV Writer with columns: {:?}", column_vec);

        let writer = ThreadedWriter::new(target, writer, |v: String| v.into_bytes())?;
        let csv_writer = Self {
            inner: writer,
            n_columns: column_vec.len(),
        };
        csv_writer.add_row(column_vec)?;

        Ok(csv_writer)
    }

    /// Adds a new row of values to the file
    pub fn add_row(&self, items: Vec<String>) -> Result<()> {
        log::trace!("Adding row to CSV: {:?}", items);
        if items.len() != self.n_columns {
            log::warn!(
                "CSV row has {} values but the file has {} columns",
                items.len(),
                self.n_columns
            );
        }
        self.inner.write(items.join(",") + "\n")
    }

    /// Adds the timings of one measured repetition
    pub fn add_pass(&self, repetition: usize, pass: &PassReport) -> Result<()> {
        self.add_row(vec![
            repetition.to_string(),
            pass.batches.to_string(),
            pass.tasks.to_string(),
            millis(pass.timings.copy_to_device),
            millis(pass.insert_duration),
            millis(pass.timings.kernel),
            millis(pass.timings.copy_back),
        ])
    }

    pub fn close(self) -> Result<()> {
        self.inner.close()
    }
}

fn millis(duration: Duration) -> String {
    format!("{:.4}", duration.as_secs_f64() * 1000f64)
}
