//! Reactor tunables.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Implementation cap on the worker/thread count the `0`/`PerCoreSquared`
/// resolution can produce, regardless of detected core count.
pub const MAX_AUTO_COUNT: usize = 64;

/// How a thread or worker count argument resolves against the detected CPU
/// count, expressed as a closed set of named cases instead of sentinel
/// integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuCount {
    /// An explicit, literal count.
    Fixed(usize),
    /// `cores / n`, floored at 1.
    Auto(NonZeroUsize),
    /// Leave one core for the kernel when more than 3 are detected,
    /// otherwise use every core.
    LeaveOneCore,
    /// `cores * cores`, capped at [`MAX_AUTO_COUNT`].
    PerCoreSquared,
}

impl CpuCount {
    pub fn resolve(self, detected_cores: usize) -> usize {
        let cores = detected_cores.max(1);
        match self {
            CpuCount::Fixed(n) => n.max(1),
            CpuCount::Auto(n) => (cores / n.get()).max(1),
            CpuCount::LeaveOneCore => if cores > 3 { cores - 1 } else { cores },
            CpuCount::PerCoreSquared => (cores * cores).min(MAX_AUTO_COUNT),
        }
    }
}

/// Builder for a [`crate::reactor::Reactor`]. Every field has a sensible
/// default; call `with_*` to override before `build`.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    pub(crate) threads: CpuCount,
    pub(crate) workers: CpuCount,
    pub(crate) default_timeout_secs: u32,
    pub(crate) slowloris_queue_threshold: usize,
    pub(crate) slowloris_min_bytes_per_window: usize,
    pub(crate) idle_poll_timeout: Duration,
    pub(crate) cluster_socket_dir: Option<PathBuf>,
}

impl Default for ReactorConfig {
    fn default() -> ReactorConfig {
        ReactorConfig {
            threads: CpuCount::PerCoreSquared,
            workers: CpuCount::Fixed(1),
            default_timeout_secs: crate::conn::DEFAULT_TIMEOUT_SECS,
            slowloris_queue_threshold: 1024,
            slowloris_min_bytes_per_window: 32 * 1024,
            idle_poll_timeout: crate::timer::DEFAULT_MAX_WAIT,
            cluster_socket_dir: None,
        }
    }
}

impl ReactorConfig {
    pub fn new() -> ReactorConfig {
        ReactorConfig::default()
    }

    pub fn with_threads(mut self, threads: CpuCount) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_workers(mut self, workers: CpuCount) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_default_timeout_secs(mut self, secs: u32) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    pub fn with_slowloris_queue_threshold(mut self, threshold: usize) -> Self {
        self.slowloris_queue_threshold = threshold;
        self
    }

    pub fn with_slowloris_min_bytes_per_window(mut self, bytes: usize) -> Self {
        self.slowloris_min_bytes_per_window = bytes;
        self
    }

    pub fn with_idle_poll_timeout(mut self, timeout: Duration) -> Self {
        self.idle_poll_timeout = timeout;
        self
    }

    pub fn with_cluster_socket_dir(mut self, dir: PathBuf) -> Self {
        self.cluster_socket_dir = Some(dir);
        self
    }

    /// The directory the cluster listener socket is created in: the
    /// configured override, then `$TMPDIR`, then `/tmp`.
    pub(crate) fn resolved_cluster_socket_dir(&self) -> PathBuf {
        self.cluster_socket_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
