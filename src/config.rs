/// Runtime configuration values consumed by the dispatcher and medium.
///
/// This is deliberately not a file reader: the access point and its
/// stations don't know how they were configured, only what the values
/// are. The host process builds a `RuntimeConfig` however it likes
/// (parsed file, CLI flags, hardcoded defaults for a test harness) and
/// hands it to `Dispatcher::new`. Log-file routing is a separate
/// concern the host wires up on its own by installing a
/// `tracing_subscriber::Layer` such as `StationLogLayer` before it
/// starts a run; a `Dispatcher` never touches the filesystem itself.
use std::time::Duration;

/// Values that parameterize a single simulation run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Inter-frame-space used by stations that do not specify one.
    pub default_ifs: Duration,

    /// Per-attempt timer length while awaiting CTS or ACK.
    pub wait_time: Duration,

    /// Backoff slot granularity multiplied by the chosen slot count R.
    pub time_slot: Duration,

    /// Capacity in bytes of each medium's ring buffer.
    pub medium_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_ifs: crate::DEFAULT_IFS,
            wait_time: crate::WAIT_TIME,
            time_slot: crate::TIME_SLOT,
            medium_capacity: 64 * 1024,
        }
    }
}
