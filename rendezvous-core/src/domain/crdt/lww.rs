use serde::{Deserialize, Serialize};

/// Last-writer-wins register. Ties (equal timestamps) keep the current value
/// so that merge stays idempotent.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LwwRegister<T: Clone> {
    value: Option<T>,
    timestamp_ms: u64,
}

impl<T: Clone> Default for LwwRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LwwRegister<T> {
    pub fn new() -> Self {
        Self { value: None, timestamp_ms: 0 }
    }

    pub fn with_value(value: T, timestamp_ms: u64) -> Self {
        Self { value: Some(value), timestamp_ms }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Write wins only with a strictly newer timestamp. Returns whether the
    /// register changed.
    pub fn set(&mut self, value: T, timestamp_ms: u64) -> bool {
        if timestamp_ms > self.timestamp_ms {
            self.value = Some(value);
            self.timestamp_ms = timestamp_ms;
            true
        } else {
            false
        }
    }

    pub fn merge(&mut self, other: &LwwRegister<T>) -> bool {
        if other.timestamp_ms > self.timestamp_ms {
            self.value = other.value.clone();
            self.timestamp_ms = other.timestamp_ms;
            true
        } else {
            false
        }
    }
}
