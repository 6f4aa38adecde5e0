//! Ordered local views: tombstoned positional arrays over a registry.
//!
//! Each statement and policy gets a slot when it is created. A slot index
//! never changes; deleting the object only clears the slot's valid flag, so
//! cursor-based enumeration stays stable while other entries are removed.

use crate::bulk::BulkPage;

/// One positional entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalViewSlot {
    pub valid: bool,
    /// Registry key of the object that owns this slot.
    pub name: String,
}

/// Append-only array of [`LocalViewSlot`]s.
#[derive(Debug, Clone, Default)]
pub struct LocalView {
    slots: Vec<LocalViewSlot>,
}

impl LocalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next slot to `name` and returns its index.
    pub fn append(&mut self, name: impl Into<String>) -> usize {
        self.slots.push(LocalViewSlot {
            valid: true,
            name: name.into(),
        });
        self.slots.len() - 1
    }

    /// Marks a previously assigned slot invalid.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was never assigned; slot indices only come from
    /// [`LocalView::append`].
    pub fn invalidate(&mut self, idx: usize) {
        self.slots[idx].valid = false;
    }

    pub fn slot(&self, idx: usize) -> Option<&LocalViewSlot> {
        self.slots.get(idx)
    }

    /// Total slots ever assigned, valid or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|s| s.valid).count()
    }

    /// Returns up to `count` valid names starting at slot `cur_mark`.
    pub fn get_bulk(&self, cur_mark: usize, count: usize) -> BulkPage<String> {
        if cur_mark >= self.slots.len() || count == 0 {
            return BulkPage::end(cur_mark.min(self.slots.len()));
        }

        let mut items = Vec::with_capacity(count.min(self.slots.len() - cur_mark));
        let mut idx = cur_mark;
        while idx < self.slots.len() && items.len() < count {
            let slot = &self.slots[idx];
            if slot.valid {
                items.push(slot.name.clone());
            }
            idx += 1;
        }

        let more = self.slots[idx..].iter().any(|s| s.valid);
        BulkPage {
            items,
            next_mark: idx,
            more,
        }
    }
}
