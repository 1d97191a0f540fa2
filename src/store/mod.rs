use time::OffsetDateTime;
use uuid::Uuid;

/// One posted status. `id` only lives in memory; the remote document knows
/// nothing about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub id: Uuid,
    pub text: String,
    pub time: OffsetDateTime,
}

impl StatusEntry {
    pub fn new(text: impl Into<String>, time: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            time,
        }
    }
}

/// Stable sort, newest first. Entries sharing a timestamp keep their relative
/// order, so sorting an already sorted slice changes nothing.
pub fn sort_newest_first(entries: &mut [StatusEntry]) {
    entries.sort_by(|a, b| b.time.cmp(&a.time));
}

/// The editable, positionally addressed list behind the admin editor.
///
/// Every mutation that targets a missing position or id is a silent no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusStore {
    entries: Vec<StatusEntry>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<StatusEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StatusEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter()
    }

    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Prepends regardless of `time`. Returns false (and does nothing) for
    /// empty text.
    pub fn insert_front(&mut self, entry: StatusEntry) -> bool {
        if entry.text.is_empty() {
            return false;
        }
        self.entries.insert(0, entry);
        true
    }

    pub fn update_text(&mut self, index: usize, new_text: impl Into<String>) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.text = new_text.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<StatusEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn update_text_by_id(&mut self, id: Uuid, new_text: impl Into<String>) -> bool {
        match self.position_of(id) {
            Some(index) => self.update_text(index, new_text),
            None => false,
        }
    }

    pub fn remove_by_id(&mut self, id: Uuid) -> Option<StatusEntry> {
        self.position_of(id).and_then(|index| self.remove_at(index))
    }

    /// Full copy of the current order, meant to be written out wholesale.
    pub fn snapshot(&self) -> Vec<StatusEntry> {
        self.entries.clone()
    }
}
