//! Event loop configuration

/// What the loop does when nothing is ready but the root task is pending
///
/// Every future in a running loop is completed by code running on the
/// loop's own thread. An empty ready queue therefore means the remaining
/// tasks wait on futures that nothing will ever complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallPolicy {
    /// Return [`Error::Stalled`](crate::Error::Stalled) from the run
    #[default]
    Fail,

    /// Keep polling the empty queue, backing off between polls
    ///
    /// The run never returns unless a future is completed some other way.
    Spin,
}

/// Settings for an [`EventLoop`](crate::EventLoop)
///
/// # Example
///
/// ```
/// use spindle::{LoopConfig, StallPolicy};
///
/// let config = LoopConfig::new().name("ingest").stall_policy(StallPolicy::Fail);
/// assert_eq!(config.name, "ingest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Name reported in log events
    pub name: String,

    /// Behavior when the ready queue empties before the root task is done
    pub stall_policy: StallPolicy,
}

impl LoopConfig {
    /// Returns the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name reported in log events
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the stall policy
    pub fn stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            name: String::from("spindle"),
            stall_policy: StallPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_on_stall() {
        let config = LoopConfig::default();
        assert_eq!(config.stall_policy, StallPolicy::Fail);
        assert_eq!(config.name, "spindle");
        assert_eq!(LoopConfig::new(), config);
    }

    #[test]
    fn setters_chain() {
        let config = LoopConfig::new().stall_policy(StallPolicy::Spin).name("worker");
        assert_eq!(config.stall_policy, StallPolicy::Spin);
        assert_eq!(config.name, "worker");
    }
}
