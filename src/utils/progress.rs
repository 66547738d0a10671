/*
 * opencl demos with rust
 * Copyright (C) 2021 trivernis
 * See LICENSE for more information
 */

use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

/// Bar over the warmup and measured repetitions of a benchmark.
/// Hidden unless the log level is exactly info, so it doesn't mix with debug output.
pub fn repetition_bar(n_warmup: usize, n_reps: usize) -> ProgressBar {
    if log::max_level() != LevelFilter::Info {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new((n_warmup + n_reps) as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[ETA:{eta}] {bar:60.cyan/blue} {pos:>4}/{len:4} {msg}")
            .progress_chars("#>-"),
    );
    bar.set_message(if n_warmup > 0 { "warmup" } else { "measuring" });
    bar
}

/// Advances the bar and switches the label once the warmup is over
pub fn advance(bar: &ProgressBar, n_warmup: usize) {
    bar.inc(1);
    if bar.position() == n_warmup as u64 {
        bar.set_message("measuring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_counts_all_repetitions() {
        let bar = ProgressBar::new(4);
        for _ in 0..3 {
            advance(&bar, 1);
        }
        assert_eq!(bar.position(), 3);
    }
}
