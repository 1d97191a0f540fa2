use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::remote::{FetchFailure, LoadedStatuses, SaveFailure, SaveReceipt};
use crate::store::{StatusEntry, StatusStore};

pub const SAVE_OK_MESSAGE: &str = "Statuses uploaded successfully!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminPhase {
    Loading,
    Ready,
    /// Nothing was loaded, so editing and saving stay off: saving an empty
    /// list here would wipe the remote document.
    LoadFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Saving,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminInput {
    Browse,
    Compose(String),
    Edit { id: Uuid, buffer: String },
}

/// What a save pushes: the whole local list, as it stands right now.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub entries: Vec<StatusEntry>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdminView {
    phase: AdminPhase,
    store: StatusStore,
    etag: Option<String>,
    skipped: usize,
    selected: usize,
    input: AdminInput,
    save_state: SaveState,
    pending_saves: usize,
}

impl Default for AdminView {
    fn default() -> Self {
        Self::mount()
    }
}

impl AdminView {
    pub fn mount() -> Self {
        Self {
            phase: AdminPhase::Loading,
            store: StatusStore::new(),
            etag: None,
            skipped: 0,
            selected: 0,
            input: AdminInput::Browse,
            save_state: SaveState::Idle,
            pending_saves: 0,
        }
    }

    pub fn phase(&self) -> &AdminPhase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == AdminPhase::Ready
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn input(&self) -> &AdminInput {
        &self.input
    }

    pub fn save_state(&self) -> &SaveState {
        &self.save_state
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn apply_load(&mut self, result: Result<LoadedStatuses, FetchFailure>) {
        if self.phase != AdminPhase::Loading {
            tracing::debug!("admin view already loaded, ignoring late load");
            return;
        }
        match result {
            Ok(loaded) => {
                self.store = StatusStore::from_entries(loaded.entries);
                self.etag = loaded.etag;
                self.skipped = loaded.skipped;
                self.phase = AdminPhase::Ready;
            }
            Err(err) => {
                self.phase = AdminPhase::LoadFailed(err.to_string());
            }
        }
    }

    /// Prepends a status stamped with `now`. Empty text does nothing.
    pub fn add_status(&mut self, text: &str, now: OffsetDateTime) -> bool {
        if !self.is_ready() {
            return false;
        }
        let added = self.store.insert_front(StatusEntry::new(text, now));
        if added {
            self.selected = 0;
        }
        added
    }

    pub fn update_text(&mut self, index: usize, text: &str) -> bool {
        self.is_ready() && self.store.update_text(index, text)
    }

    pub fn remove_at(&mut self, index: usize) -> bool {
        if !self.is_ready() || self.store.remove_at(index).is_none() {
            return false;
        }
        self.clamp_selection();
        true
    }

    pub fn remove_selected(&mut self) -> bool {
        self.remove_at(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.store.is_empty() {
            self.selected = 0;
            return;
        }
        let max = self.store.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, max) as usize;
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.store.len() {
            self.selected = self.store.len().saturating_sub(1);
        }
    }

    pub fn begin_compose(&mut self) {
        if self.is_ready() {
            self.input = AdminInput::Compose(String::new());
        }
    }

    pub fn begin_edit_selected(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.store.get(self.selected) {
            Some(entry) => {
                self.input = AdminInput::Edit {
                    id: entry.id,
                    buffer: entry.text.clone(),
                };
                true
            }
            None => false,
        }
    }

    pub fn push_char(&mut self, ch: char) {
        if let Some(buffer) = self.input_buffer_mut() {
            buffer.push(ch);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(buffer) = self.input_buffer_mut() {
            if let Some((idx, _)) = buffer.grapheme_indices(true).next_back() {
                buffer.truncate(idx);
            }
        }
    }

    fn input_buffer_mut(&mut self) -> Option<&mut String> {
        match &mut self.input {
            AdminInput::Browse => None,
            AdminInput::Compose(buffer) | AdminInput::Edit { buffer, .. } => Some(buffer),
        }
    }

    /// Enter in the input field. Composing with an empty buffer is a no-op
    /// and keeps the field open.
    pub fn commit_input(&mut self, now: OffsetDateTime) -> bool {
        match std::mem::replace(&mut self.input, AdminInput::Browse) {
            AdminInput::Browse => false,
            AdminInput::Compose(text) => {
                if self.add_status(&text, now) {
                    true
                } else {
                    self.input = AdminInput::Compose(text);
                    false
                }
            }
            AdminInput::Edit { id, buffer } => {
                self.is_ready() && self.store.update_text_by_id(id, buffer)
            }
        }
    }

    pub fn cancel_input(&mut self) {
        self.input = AdminInput::Browse;
    }

    /// Starts a save of the full local list. Editing stays unlocked while it
    /// is in flight.
    pub fn begin_save(&mut self) -> Option<SaveRequest> {
        if !self.is_ready() {
            return None;
        }
        self.pending_saves += 1;
        self.save_state = SaveState::Saving;
        Some(SaveRequest {
            entries: self.store.snapshot(),
            etag: self.etag.clone(),
        })
    }

    pub fn apply_save(&mut self, result: Result<SaveReceipt, SaveFailure>) {
        self.pending_saves = self.pending_saves.saturating_sub(1);
        let outcome = match result {
            Ok(receipt) => {
                if receipt.etag.is_some() {
                    self.etag = receipt.etag;
                }
                SaveState::Succeeded
            }
            Err(err) => SaveState::Failed(err.to_string()),
        };
        self.save_state = if self.pending_saves > 0 {
            SaveState::Saving
        } else {
            outcome
        };
    }

    pub fn status_message(&self) -> Option<String> {
        match &self.save_state {
            SaveState::Idle => None,
            SaveState::Saving => Some("Saving statuses...".to_string()),
            SaveState::Succeeded => Some(SAVE_OK_MESSAGE.to_string()),
            SaveState::Failed(reason) => Some(format!("Failed to upload statuses: {reason}")),
        }
    }
}
