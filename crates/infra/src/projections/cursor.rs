//! Per-stream projection cursors.
//!
//! A cursor is the last sequence number a projection applied for one
//! aggregate stream. Redelivered events (`seq <= cursor`) are skipped, so
//! delivery may be at-least-once. A jump past `cursor + 1` is a gap.

use std::collections::HashMap;
use std::sync::RwLock;

use storefront_core::AggregateId;

use super::ProjectionError;

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: AggregateId) -> u64 {
        match self.inner.read() {
            Ok(map) => map.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// `Ok(true)` when `seq` is the next event of the stream, `Ok(false)`
    /// when it was already applied.
    pub fn should_apply(&self, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let last = self.get(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::SequenceGap {
                aggregate_id,
                last,
                found: seq,
            });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::SequenceGap {
                aggregate_id,
                last,
                found: seq,
            });
        }
        Ok(true)
    }

    /// Record `seq` as applied. Call only after the read model was updated.
    pub fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(aggregate_id, seq);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redelivery_is_skipped_and_gaps_are_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.should_apply(id, 1).unwrap());
        cursors.advance(id, 1);

        assert!(!cursors.should_apply(id, 1).unwrap());
        assert!(cursors.should_apply(id, 2).unwrap());
        assert!(matches!(
            cursors.should_apply(id, 4),
            Err(ProjectionError::SequenceGap { last: 1, found: 4, .. })
        ));
    }

    #[test]
    fn streams_are_tracked_independently() {
        let cursors = StreamCursors::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        cursors.advance(a, 3);
        assert_eq!(cursors.get(a), 3);
        assert_eq!(cursors.get(b), 0);

        cursors.clear();
        assert_eq!(cursors.get(a), 0);
    }
}
