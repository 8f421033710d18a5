//! Progress reporting for the CLI.
//!
//! Bars are hidden in log-only mode, where periodic `info!` lines take over so
//! output stays readable under `tail -f`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}

/// Whether `current` is a point at which log-only mode reports progress.
pub fn should_log(current: u64, total: u64, interval: u64) -> bool {
    interval > 0 && (current % interval == 0 || current == total)
}

pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if is_log_only() && should_log(current, total, interval) {
        let pct = if total == 0 { 100.0 } else { 100.0 * current as f64 / total as f64 };
        info!(phase, current, total, "{:.1}%", pct);
    }
}
