//! Repository configuration.

use std::time::Duration;

/// Configuration for a [`crate::Repository`].
#[derive(Debug, Clone)]
pub struct Config {
    /// How long an edit lock is honoured before another user may take it over.
    pub lock_timeout: Duration,

    /// Upper bound on waiting for a per-key critical section.
    pub region_wait: Duration,

    /// Whether the auto-save performed on lock takeover is a major version.
    pub takeover_major: bool,

    /// Whether restores append a major version.
    pub restore_major: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(60 * 60),
            region_wait: Duration::from_secs(5),
            takeover_major: false,
            restore_major: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the edit lock timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the maximum wait for a per-key critical section.
    #[must_use]
    pub const fn region_wait(mut self, wait: Duration) -> Self {
        self.region_wait = wait;
        self
    }

    /// Sets whether takeover auto-saves are major versions.
    #[must_use]
    pub const fn takeover_major(mut self, value: bool) -> Self {
        self.takeover_major = value;
        self
    }

    /// Sets whether restores are major versions.
    #[must_use]
    pub const fn restore_major(mut self, value: bool) -> Self {
        self.restore_major = value;
        self
    }
}
