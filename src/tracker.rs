//! Reference-counted activate/deactivate helper.
//!
//! A [`UsageTracker`] guards a global, non-reentrant side effect shared by
//! concurrent callers: the setup block runs exactly once while any caller is
//! active (on the 0 to 1 transition) and the teardown block exactly once when
//! the last caller finishes. The count never goes negative.

use parking_lot::Mutex;

use crate::error::Result;

/// Reference-counted activation of a shared side effect.
#[derive(Default)]
pub struct UsageTracker {
    count: Mutex<u64>,
}

impl UsageTracker {
    /// Create an inactive tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any caller is currently active.
    pub fn active(&self) -> bool {
        *self.count.lock() > 0
    }

    /// Register a caller, running `on_first` only on the 0 to 1 transition.
    ///
    /// Returns true only on that transition. If `on_first` fails the count is
    /// left untouched so a later caller retries the setup.
    pub fn activate<F>(&self, on_first: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut count = self.count.lock();
        let first = *count == 0;
        if first {
            on_first()?;
        }
        *count += 1;
        Ok(first)
    }

    /// Unregister a caller, running `on_last` only on the transition to 0.
    ///
    /// Returns true only on that transition. If the tracker is already
    /// inactive, nothing runs and false is returned.
    pub fn deactivate<F>(&self, on_last: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut count = self.count.lock();
        if *count == 0 {
            return Ok(false);
        }
        let last = *count == 1;
        if last {
            on_last()?;
        }
        *count -= 1;
        Ok(last)
    }
}
