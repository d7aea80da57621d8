use crate::latency::DEFAULT_LATENCY_WINDOW;
use std::time::Duration;

/// Tuning knobs shared by the shipper, sorter, and processor.
///
/// Construct with struct-update syntax to override individual fields:
///
/// ```
/// use reliable_dgram::Config;
///
/// let config = Config {
///     mtu: 512,
///     ..Config::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum datagram size. `BigData` payloads are split into chunks that
    /// fit within this size after framing overhead.
    pub mtu: usize,
    /// How long an unacknowledged reliable packet waits before it is resent.
    /// Also the period of the processor's resend tick.
    pub retry_delay: Duration,
    /// Silence on the inbound path longer than this marks the connection as
    /// timed out.
    pub timeout: Duration,
    /// Number of samples the latency moving average is spread across.
    pub latency_window: usize,
    /// Incomplete `BigData` transmissions older than this are discarded.
    pub assembly_timeout: Duration,
    /// Drop sequenced packets with a nonzero id while the matching
    /// next-expected counter is still zero. Protects a freshly constructed
    /// sorter from in-flight retries of a previous connection reusing the
    /// same address, at the cost of dropping legitimate first packets that
    /// were reordered ahead of id 0 (the retry mechanism re-delivers them).
    pub stale_startup_guard: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mtu: 1400,
            retry_delay: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
            latency_window: DEFAULT_LATENCY_WINDOW,
            assembly_timeout: Duration::from_secs(30),
            stale_startup_guard: true,
        }
    }
}
