use std::time::Duration;

/// Tunables for the background workers.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Probability (0.0 to 1.0) that the simulated gateway approves a charge.
    pub charge_approval_rate: f64,
    /// Simulated gateway latency.
    pub charge_delay: Duration,
    /// Delay between a return being filed and being marked processed.
    pub return_processing_delay: Duration,
    /// Interval of the session supervisor's heartbeat.
    pub session_heartbeat: Duration,
    /// End the session after this much inactivity. `None` disables it.
    pub session_idle_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            charge_approval_rate: 0.95,
            charge_delay: Duration::from_millis(1500),
            return_processing_delay: Duration::from_secs(1),
            session_heartbeat: Duration::from_secs(30),
            session_idle_timeout: None,
        }
    }
}

impl WorkerConfig {
    /// Configuration with no simulated delays.
    pub fn immediate() -> Self {
        Self {
            charge_delay: Duration::ZERO,
            return_processing_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
