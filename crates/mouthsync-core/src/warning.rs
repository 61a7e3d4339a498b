//! Deduplicated, bounded warning log
//!
//! Every stage records operator-facing problems here. A message is stored
//! once no matter how often it recurs, and the oldest entry is evicted when
//! the log is full, so a persistent fault cannot grow memory.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Maximum number of distinct warnings kept
pub const MAX_WARNINGS: usize = 50;

/// Plain warning list
#[derive(Clone, Debug)]
pub struct WarningLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_WARNINGS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        WarningLog {
            entries: VecDeque::with_capacity(capacity.min(MAX_WARNINGS)),
            capacity: capacity.max(1),
        }
    }

    /// Record a message. Returns false if it was already present.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.entries.iter().any(|m| *m == message) {
            return false;
        }

        self.entries.push_back(message);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries.iter().any(|m| m == message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a warning log
///
/// Cloning shares the same log. New messages are also emitted through
/// `tracing::warn!` exactly once.
#[derive(Clone, Debug, Default)]
pub struct Warnings {
    inner: Arc<Mutex<WarningLog>>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Warnings {
            inner: Arc::new(Mutex::new(WarningLog::with_capacity(capacity))),
        }
    }

    /// Record a warning, logging it the first time it is seen
    pub fn warn(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let fresh = self.inner.lock().push(message.clone());
        if fresh {
            tracing::warn!("{}", message);
        }
        fresh
    }

    pub fn contains(&self, message: &str) -> bool {
        self.inner.lock().contains(message)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_message() {
        let mut log = WarningLog::new();
        assert!(log.push("link lost"));
        assert!(!log.push("link lost"));
        assert!(log.push("scene missing"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut log = WarningLog::with_capacity(3);
        for i in 0..5 {
            log.push(format!("w{}", i));
        }
        assert_eq!(log.to_vec(), vec!["w2", "w3", "w4"]);
    }

    #[test]
    fn test_default_cap() {
        let mut log = WarningLog::new();
        for i in 0..(MAX_WARNINGS + 10) {
            log.push(format!("w{}", i));
        }
        assert_eq!(log.len(), MAX_WARNINGS);
        assert!(!log.contains("w0"));
        assert!(log.contains(&format!("w{}", MAX_WARNINGS + 9)));
    }

    #[test]
    fn test_shared_handle() {
        let warnings = Warnings::new();
        let other = warnings.clone();
        assert!(warnings.warn("device gone"));
        assert!(!other.warn("device gone"));
        assert_eq!(other.snapshot(), vec!["device gone"]);
        other.clear();
        assert!(warnings.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn test_log_never_exceeds_capacity(messages in proptest::collection::vec("[a-d]{1,3}", 0..200)) {
            let mut log = WarningLog::with_capacity(8);
            for m in &messages {
                log.push(m.clone());
            }
            proptest::prop_assert!(log.len() <= 8);
            let all = log.to_vec();
            let mut dedup = all.clone();
            dedup.sort();
            dedup.dedup();
            proptest::prop_assert_eq!(dedup.len(), all.len());
        }
    }
}
