use std::collections::BTreeMap;

use crate::model::{EventRecord, Group, Record};

pub const INITIAL_WINDOW: usize = 20;
pub const WINDOW_STEP: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub snapshot: Option<Record>,
    pub history: Vec<EventRecord>,
    visible_window: usize,
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self {
            snapshot: None,
            history: Vec::new(),
            visible_window: INITIAL_WINDOW,
        }
    }
}

impl EntityRecord {
    pub fn visible_window(&self) -> usize {
        self.visible_window
    }
}

/// Last known data per (group, entity). Reloads replace snapshot and history
/// but never touch the visible window.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: BTreeMap<(Group, String), EntityRecord>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, group: Group, id: &str) -> &EntityRecord {
        self.slot(group, id)
    }

    /// Read-only lookup that does not create the entry.
    pub fn entry(&self, group: Group, id: &str) -> Option<&EntityRecord> {
        self.entries.get(&(group, id.to_string()))
    }

    pub fn set_snapshot(&mut self, group: Group, id: &str, snapshot: Option<Record>) {
        self.slot(group, id).snapshot = snapshot;
    }

    pub fn set_history(&mut self, group: Group, id: &str, history: Vec<EventRecord>) {
        self.slot(group, id).history = history;
    }

    /// Returns the new window size.
    pub fn grow_window(&mut self, group: Group, id: &str) -> usize {
        let slot = self.slot(group, id);
        slot.visible_window = slot.visible_window.saturating_add(WINDOW_STEP);
        slot.visible_window
    }

    pub fn visible_window(&self, group: Group, id: &str) -> usize {
        self.entry(group, id)
            .map(EntityRecord::visible_window)
            .unwrap_or(INITIAL_WINDOW)
    }

    pub fn history(&self, group: Group, id: &str) -> &[EventRecord] {
        self.entry(group, id)
            .map(|e| e.history.as_slice())
            .unwrap_or(&[])
    }

    pub fn snapshot(&self, group: Group, id: &str) -> Option<&Record> {
        self.entry(group, id).and_then(|e| e.snapshot.as_ref())
    }

    /// Entities of `group` in id order.
    pub fn entities(&self, group: Group) -> impl Iterator<Item = (&str, &EntityRecord)> {
        self.entries
            .iter()
            .filter(move |((g, _), _)| *g == group)
            .map(|((_, id), rec)| (id.as_str(), rec))
    }

    fn slot(&mut self, group: Group, id: &str) -> &mut EntityRecord {
        self.entries.entry((group, id.to_string())).or_default()
    }
}
