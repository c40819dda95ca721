//! Orchestrator configuration.

use std::time::Duration;

use crate::widgets::TerminalOptions;

/// Default relay location.
pub const DEFAULT_RELAY_URL: &str = "http://localhost:5000";

/// Banner written to the terminal once it is ready.
pub const DEFAULT_BANNER: &str = "Welcome to runpad. Press Run to execute your code.";

/// What to do when a run is requested while another is still in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Keep the outstanding request and refuse the new one.
    #[default]
    Reject,
    /// Abort the outstanding request and start the new one.
    Replace,
}

/// Configuration for the [`crate::Orchestrator`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the execution relay, used by [`crate::RelayBackend::from_config`]
    pub relay_url: String,
    /// Interval between library registry polls
    pub poll_interval: Duration,
    /// Upper bound on waiting for the widget libraries (None waits forever)
    pub load_timeout: Option<Duration>,
    /// Delay between editor construction and enabling run, used when the
    /// editor has no layout-complete event. A heuristic, not a guarantee.
    pub settle_delay: Duration,
    /// Upper bound on waiting for an editor's layout-complete event before
    /// enabling run anyway
    pub layout_timeout: Duration,
    /// Timeout for a single execution round trip
    pub request_timeout: Duration,
    /// Behaviour for overlapping runs
    pub overlap_policy: OverlapPolicy,
    /// First line written to the terminal
    pub banner: String,
    /// Options passed to the terminal widget
    pub terminal_options: TerminalOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            poll_interval: Duration::from_millis(200),
            load_timeout: Some(Duration::from_secs(30)),
            settle_delay: Duration::from_millis(100),
            layout_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            overlap_policy: OverlapPolicy::default(),
            banner: DEFAULT_BANNER.to_string(),
            terminal_options: TerminalOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_layout_timeout(mut self, timeout: Duration) -> Self {
        self.layout_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    pub fn with_terminal_options(mut self, options: TerminalOptions) -> Self {
        self.terminal_options = options;
        self
    }
}
