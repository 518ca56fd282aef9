//! Per-machine configuration.

/// Settings applied when a [`Machine`](crate::Machine) is created.
///
/// ```rust
/// # use jump_fsm_core::Config;
/// let config = Config::default().with_history(16);
/// assert_eq!(config.channel_size, 100);
/// assert_eq!(config.history_capacity, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the input queue shared by handles and timer expiries
    /// (default: 100, minimum 1).
    pub channel_size: usize,

    /// Number of history records kept (default: 0, history disabled).
    pub history_capacity: usize,
}

fn default_channel_size() -> usize {
    100
}

fn default_history_capacity() -> usize {
    0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_size: default_channel_size(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl Config {
    /// Sets the input queue capacity.
    #[must_use]
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size;
        self
    }

    /// Enables history with room for `capacity` records.
    #[must_use]
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub(crate) fn effective_channel_size(&self) -> usize {
        self.channel_size.max(1)
    }
}
