/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use crate::utils::args::UseColors;
use chrono::Local;
use colored::*;
use log::{Level, LevelFilter};
use std::str::FromStr;
use std::thread;

/// Initializes the logger. Every line carries the worker thread name
/// since host threads, work-group emulation and the io thread log concurrently.
pub fn init_logger(colors: &UseColors) {
    match colors {
        UseColors::On => colored::control::set_override(true),
        UseColors::Off => colored::control::set_override(false),
        UseColors::Auto => {}
    }

    fern::Dispatch::new()
        .format(|out, message, record| {
            let mut thread_name = thread::current().name().unwrap_or("main").to_string();
            thread_name.truncate(16);
            let target = record
                .target()
                .trim_start_matches("hetero_pipeline::")
                .to_string();

            out.finish(format_args!(
                "{} {:<16} {:<24}| {}: {}",
                Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                thread_name.dimmed(),
                target.italic(),
                record
                    .level()
                    .to_string()
                    .to_lowercase()
                    .color(level_color(record.level())),
                message
            ))
        })
        .level(level_from(std::env::var("RUST_LOG").ok().as_deref()))
        .chain(std::io::stdout())
        .apply()
        .expect("failed to init logger");
}

/// Parses a `RUST_LOG` style level and falls back to info
fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Trace => Color::Magenta,
        Level::Debug => Color::Blue,
        Level::Info => Color::Green,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(level_from(None), LevelFilter::Info);
        assert_eq!(level_from(Some("verbose")), LevelFilter::Info);
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from(Some(" TRACE ")), LevelFilter::Trace);
    }
}
