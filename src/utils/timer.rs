/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Default, Debug)]
struct Section {
    started: Option<Instant>,
    total: Duration,
}

/// Accumulates the elapsed time of named sections over multiple repetitions
#[derive(Default, Debug)]
pub struct Timer {
    sections: HashMap<String, Section>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: &str) {
        self.section(name).started = Some(Instant::now());
    }

    /// Stops the section and adds the elapsed time to its total.
    /// Stopping a section that wasn't started is a no-op.
    pub fn stop(&mut self, name: &str) {
        let section = self.section(name);
        if let Some(start) = section.started.take() {
            section.total += start.elapsed();
        }
    }

    /// Adds a duration that was measured elsewhere, e.g. with device events
    pub fn add(&mut self, name: &str, duration: Duration) {
        self.section(name).total += duration;
    }

    pub fn total(&self, name: &str) -> Duration {
        self.sections
            .get(name)
            .map(|s| s.total)
            .unwrap_or_default()
    }

    /// Returns the average duration of a section in milliseconds
    pub fn average_ms(&self, name: &str, repetitions: usize) -> f64 {
        if repetitions == 0 {
            return 0f64;
        }
        self.total(name).as_secs_f64() * 1000f64 / repetitions as f64
    }

    pub fn print(&self, name: &str, repetitions: usize) {
        log::info!(
            "{} Time (ms): {:.4}",
            name,
            self.average_ms(name, repetitions)
        );
    }

    fn section(&mut self, name: &str) -> &mut Section {
        self.sections.entry(name.to_string()).or_default()
    }
}
