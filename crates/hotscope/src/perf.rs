// perf.rs - Performance timing infrastructure for hotscope
//
// Timing instrumentation for startup indexing and request latency.
// Controlled via the HOTSCOPE_PERF environment variable.
//
// Usage:
//   HOTSCOPE_PERF=1 hotscope --stdio       # Enable basic timing logs
//   HOTSCOPE_PERF=verbose hotscope --stdio # Also warn on slow operations

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PERF_ENABLED: OnceLock<bool> = OnceLock::new();

static PERF_VERBOSE: OnceLock<bool> = OnceLock::new();

/// Check if performance timing is enabled
pub fn is_enabled() -> bool {
    *PERF_ENABLED.get_or_init(|| {
        std::env::var("HOTSCOPE_PERF")
            .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
            .unwrap_or(false)
    })
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    *PERF_VERBOSE.get_or_init(|| {
        std::env::var("HOTSCOPE_PERF")
            .map(|v| v.to_lowercase() == "verbose")
            .unwrap_or(false)
    })
}

/// RAII timing guard that logs duration on drop
///
/// ```
/// use hotscope::perf::TimingGuard;
///
/// let _guard = TimingGuard::new("workspace_index");
/// // ... do work ...
/// // Duration logged when _guard goes out of scope
/// ```
pub struct TimingGuard {
    start: Instant,
    name: &'static str,
    threshold_warn_ms: Option<u64>,
    enabled: bool,
}

impl TimingGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
            threshold_warn_ms: None,
            enabled: is_enabled(),
        }
    }

    /// Like [`TimingGuard::new`], additionally warning in verbose mode when
    /// the scope takes longer than `threshold_ms`
    pub fn with_threshold(name: &'static str, threshold_ms: u64) -> Self {
        Self {
            threshold_warn_ms: Some(threshold_ms),
            ..Self::new(name)
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timing without logging and return the duration
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        std::mem::forget(self); // Prevent Drop from running
        elapsed
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }

        let elapsed = self.start.elapsed();
        log::info!("[PERF] {} completed in {:?}", self.name, elapsed);

        if let Some(threshold) = self.threshold_warn_ms {
            if elapsed.as_millis() > threshold as u128 && is_verbose() {
                log::warn!(
                    "[PERF] {} exceeded threshold ({}ms > {}ms)",
                    self.name,
                    elapsed.as_millis(),
                    threshold
                );
            }
        }
    }
}

/// Aggregated startup metrics
#[derive(Debug, Default, Clone)]
pub struct PerfMetrics {
    /// Duration of file discovery across all workspace folders
    pub workspace_scan_duration: Option<Duration>,
    pub files_scanned: usize,
    /// Duration of reading and parsing the discovered files
    pub index_duration: Option<Duration>,
    pub files_indexed: usize,
    pub methods_indexed: usize,
}

impl PerfMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_summary(&self) {
        if !is_enabled() {
            return;
        }

        log::info!("[PERF] === Startup Performance Summary ===");

        if let Some(d) = self.workspace_scan_duration {
            log::info!(
                "[PERF] Workspace scan: {:?} ({} files)",
                d,
                self.files_scanned
            );
        }

        if let Some(d) = self.index_duration {
            log::info!(
                "[PERF] Indexing: {:?} ({} files, {} methods)",
                d,
                self.files_indexed,
                self.methods_indexed
            );
        }

        if let Some(rss) = peak_rss_bytes() {
            log::info!("[PERF] Peak RSS: {:.1} MiB", rss as f64 / (1024.0 * 1024.0));
        }
    }
}

static STARTUP_METRICS: OnceLock<std::sync::Mutex<PerfMetrics>> = OnceLock::new();

pub fn startup_metrics() -> &'static std::sync::Mutex<PerfMetrics> {
    STARTUP_METRICS.get_or_init(|| std::sync::Mutex::new(PerfMetrics::new()))
}

/// Record workspace scan completion
pub fn record_workspace_scan(duration: Duration, files_scanned: usize) {
    if !is_enabled() {
        return;
    }
    if let Ok(mut metrics) = startup_metrics().lock() {
        metrics.workspace_scan_duration = Some(duration);
        metrics.files_scanned = files_scanned;
    }
}

/// Record completion of the initial indexing pass
pub fn record_indexing(duration: Duration, files_indexed: usize, methods_indexed: usize) {
    if !is_enabled() {
        return;
    }
    if let Ok(mut metrics) = startup_metrics().lock() {
        metrics.index_duration = Some(duration);
        metrics.files_indexed = files_indexed;
        metrics.methods_indexed = methods_indexed;
    }
}

/// Returns the peak resident set size (RSS) of the current process in bytes.
///
/// - **macOS**: Uses `libc::getrusage` (`ru_maxrss`, which is in bytes on macOS).
/// - **Linux**: Reads `/proc/self/status` and parses the `VmHWM` field (reported in kB).
/// - **Other platforms**: Returns `None`.
pub fn peak_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        peak_rss_macos()
    }
    #[cfg(target_os = "linux")]
    {
        peak_rss_linux()
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

#[cfg(target_os = "macos")]
fn peak_rss_macos() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut usage = MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: getrusage writes into the provided pointer; we check the return value.
    let ret = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if ret == 0 {
        // SAFETY: getrusage succeeded, so the struct is fully initialized.
        let usage = unsafe { usage.assume_init() };
        Some(usage.ru_maxrss as u64)
    } else {
        None
    }
}

#[cfg(target_os = "linux")]
fn peak_rss_linux() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmHWM:") {
            // Format: "VmHWM:    12345 kB"
            let trimmed = rest.trim();
            let kb_str = trimmed.strip_suffix("kB").unwrap_or(trimmed).trim();
            let kb: u64 = kb_str.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_guard_finish() {
        let guard = TimingGuard::with_threshold("test", 1);
        std::thread::sleep(Duration::from_millis(10));
        assert!(guard.elapsed().as_millis() >= 10);
        assert!(guard.finish().as_millis() >= 10);
    }

    #[test]
    fn test_perf_metrics_default() {
        let metrics = PerfMetrics::new();
        assert!(metrics.workspace_scan_duration.is_none());
        assert!(metrics.index_duration.is_none());
        assert_eq!(metrics.files_scanned, 0);
    }

    #[test]
    fn test_peak_rss_bytes_returns_value_on_supported_platforms() {
        let rss = peak_rss_bytes();
        if cfg!(any(target_os = "macos", target_os = "linux")) {
            assert!(rss.is_some_and(|bytes| bytes > 0));
        } else {
            assert!(rss.is_none());
        }
    }
}
