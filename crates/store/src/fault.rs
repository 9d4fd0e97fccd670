//! Failure injection for the in-memory stores.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{Result, StoreError};

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    fail_writes: bool,
    failing_writes: u32,
    delay: Option<Duration>,
}

/// Shared switchboard for simulating outages, write failures and latency.
///
/// Cloning yields a handle to the same switchboard.
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    faults: Arc<Mutex<Faults>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read and write fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unwrap().unavailable = unavailable;
    }

    /// Makes every write fail with `Unavailable` while reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.faults.lock().unwrap().fail_writes = fail;
    }

    /// Makes the next `count` writes fail with `Unavailable`.
    pub fn fail_next_writes(&self, count: u32) {
        self.faults.lock().unwrap().failing_writes = count;
    }

    /// Delays every call by `delay` before it touches the records.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.faults.lock().unwrap().delay = delay;
    }

    /// Clears every injected fault.
    pub fn reset(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub(crate) async fn before_read(&self, store: &'static str) -> Result<()> {
        let (unavailable, delay) = {
            let faults = self.faults.lock().unwrap();
            (faults.unavailable, faults.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unavailable {
            return Err(StoreError::Unavailable(format!("{store} is unavailable")));
        }
        Ok(())
    }

    pub(crate) async fn before_write(&self, store: &'static str) -> Result<()> {
        let (failed, delay) = {
            let mut faults = self.faults.lock().unwrap();
            let failed = if faults.unavailable || faults.fail_writes {
                true
            } else if faults.failing_writes > 0 {
                faults.failing_writes -= 1;
                true
            } else {
                false
            };
            (failed, faults.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failed {
            return Err(StoreError::Unavailable(format!(
                "{store} rejected the write"
            )));
        }
        Ok(())
    }
}
