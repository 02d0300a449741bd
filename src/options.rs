use std::time::Duration;

/// Timing and safety limits for a run.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Pause after every executed block so chains interleave.
    pub step_delay: Duration,
    /// Settle time between pressing the flag and the first block running.
    pub start_delay: Duration,
    /// How long "Sorry, I couldn't make that." stays up.
    pub failure_message_duration: Duration,
    /// Cap on reporter nesting, C-block nesting and `run script` calls.
    pub max_depth: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(50),
            start_delay: Duration::from_millis(50),
            failure_message_duration: Duration::from_secs(2),
            max_depth: 64,
        }
    }
}
