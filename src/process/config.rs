use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::terminate::TerminationMode;

/// Timing and termination settings for a [`ProcessController`](super::ProcessController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// How long a graceful stop waits after the interrupt before killing.
    pub grace_period: Duration,
    /// Receive timeout of the dispatch loop between liveness checks.
    pub poll_interval: Duration,
    /// How long the dispatch loop keeps draining after the process exited.
    pub drain_window: Duration,
    pub termination: TerminationMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            drain_window: Duration::from_secs(1),
            termination: TerminationMode::Auto,
        }
    }
}

impl ControllerConfig {
    /// Number of consecutive empty polls that end the post-exit drain.
    pub(crate) fn drain_polls(&self) -> u32 {
        let poll = self.poll_interval.as_millis().max(1);
        let polls = self.drain_window.as_millis().div_ceil(poll);
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_drain_is_ten_polls() {
        assert_eq!(ControllerConfig::default().drain_polls(), 10);
    }

    #[test]
    fn test_drain_polls_at_least_one() {
        let config = ControllerConfig {
            drain_window: Duration::ZERO,
            ..ControllerConfig::default()
        };
        assert_eq!(config.drain_polls(), 1);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"termination": "forced_tree"}"#).unwrap();
        assert_eq!(config.termination, TerminationMode::ForcedTree);
        assert_eq!(config.grace_period, Duration::from_secs(5));
    }
}
