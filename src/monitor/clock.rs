//! Time source for record timestamps.

use std::fmt;

/// Abstraction over wall-clock time so tests can pin timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in seconds since the UNIX epoch.
    fn now(&self) -> i64;
}

/// Production clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
