use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one diagnostic provider to the problem list it publishes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ProviderId(u64);

impl ProviderId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate a process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
