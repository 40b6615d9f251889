use std::collections::BTreeMap;

use crate::foundation::core::{FrameIndex, FrameRange};

/// Restores frame order between unordered process workers and the encoder.
///
/// Slots arrive in any order; [`ReorderBuffer::pop_ready`] releases them strictly in index order
/// and never releases an index twice.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<T> {
    next: u64,
    end: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    pub(crate) fn new(range: FrameRange) -> Self {
        Self {
            next: range.start.0,
            end: range.end.0,
            pending: BTreeMap::new(),
        }
    }

    /// Park `slot` for `idx`. Indices already released, outside the range or already parked are
    /// refused and returned.
    pub(crate) fn insert(&mut self, idx: FrameIndex, slot: T) -> Result<(), T> {
        if idx.0 < self.next || idx.0 >= self.end || self.pending.contains_key(&idx.0) {
            return Err(slot);
        }
        self.pending.insert(idx.0, slot);
        Ok(())
    }

    /// Next slot in order, if it has arrived.
    pub(crate) fn pop_ready(&mut self) -> Option<(FrameIndex, T)> {
        let slot = self.pending.remove(&self.next)?;
        let idx = FrameIndex(self.next);
        self.next += 1;
        Some((idx, slot))
    }

    /// Index the encoder waits for.
    pub(crate) fn next(&self) -> FrameIndex {
        FrameIndex(self.next)
    }

    /// All indices of the range were released.
    pub(crate) fn is_done(&self) -> bool {
        self.next >= self.end
    }

    /// Parked slots.
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/reorder.rs"]
mod tests;
