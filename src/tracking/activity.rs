use std::collections::HashSet;

use crate::protocol::DetectionEvent;

/// Tracks when an allowed object class was first and most recently observed
/// since the last [`clear`](Self::clear).
///
/// Timestamps are milliseconds since the epoch, as stamped by the capturing
/// client. Both threshold checks are inclusive.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    allowed: HashSet<String>,
    first_seen: Option<i64>,
    last_seen: Option<i64>,
}

impl ActivityTracker {
    pub fn new<I, S>(allowed_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed_classes.into_iter().map(Into::into).collect(),
            first_seen: None,
            last_seen: None,
        }
    }

    /// Folds a batch of detections in. Returns whether any of them matched.
    pub fn update(&mut self, events: &[DetectionEvent]) -> bool {
        let mut matched = false;
        for event in events.iter().filter(|e| self.allowed.contains(&e.class_name)) {
            matched = true;
            if self.first_seen.is_none() {
                self.first_seen = Some(event.timestamp_ms);
            }
            // last_seen only moves forward, even if the client reorders events.
            self.last_seen = Some(match self.last_seen {
                Some(prev) => prev.max(event.timestamp_ms),
                None => event.timestamp_ms,
            });
        }
        matched
    }

    pub fn has_been_present_for(&self, now_ms: i64, threshold_ms: i64) -> bool {
        match self.first_seen {
            Some(first) => now_ms.saturating_sub(first) >= threshold_ms,
            None => false,
        }
    }

    /// Never having seen the target counts as absent.
    pub fn has_been_absent_for(&self, now_ms: i64, threshold_ms: i64) -> bool {
        match self.last_seen {
            Some(last) => now_ms.saturating_sub(last) >= threshold_ms,
            None => true,
        }
    }

    pub fn clear(&mut self) {
        self.first_seen = None;
        self.last_seen = None;
    }

    pub fn first_seen(&self) -> Option<i64> {
        self.first_seen
    }

    pub fn last_seen(&self) -> Option<i64> {
        self.last_seen
    }
}
