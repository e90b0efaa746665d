//! Ordered, append-only mission transcript.
//!
//! Entries keep their arrival order and are never edited, with one exception:
//! a `STREAM` fragment arriving right after a `THOUGHT`/`STREAM` entry from the
//! same agent is concatenated onto that entry instead of becoming a new line.
//! That rule lives in [`Transcript::append`] and nowhere else.

use std::ops::Index;
use std::sync::Arc;

use crate::models::{EntryKind, LogEntry, Payload};

/// Entries per sealed chunk.
const CHUNK_LEN: usize = 64;

/// What [`Transcript::append`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new entry was pushed at this index.
    Appended(usize),
    /// The fragment was concatenated onto the entry at this index.
    Merged(usize),
}

// ── TranscriptView ────────────────────────────────────────────────────────────

/// The entries of a transcript, cheap to clone.
///
/// Older entries live in immutable chunks shared by every clone; only the
/// short open tail, which always holds the newest entry, is copied. Cloning
/// therefore costs at most `CHUNK_LEN` entry copies however long the mission
/// runs.
#[derive(Debug, Clone, Default)]
pub struct TranscriptView {
    sealed: Arc<Vec<Arc<[LogEntry]>>>,
    tail: Vec<LogEntry>,
}

impl TranscriptView {
    pub fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LEN + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&LogEntry> {
        let sealed_len = self.sealed.len() * CHUNK_LEN;
        if idx < sealed_len {
            Some(&self.sealed[idx / CHUNK_LEN][idx % CHUNK_LEN])
        } else {
            self.tail.get(idx - sealed_len)
        }
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.tail.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.iter_from(0)
    }

    /// Entries from index `start` onwards, without walking the ones before.
    pub fn iter_from(&self, start: usize) -> impl Iterator<Item = &LogEntry> + '_ {
        let sealed_len = self.sealed.len() * CHUNK_LEN;
        let within_chunk = if start < sealed_len { start % CHUNK_LEN } else { 0 };
        let sealed = self
            .sealed
            .iter()
            .skip(start / CHUNK_LEN)
            .flat_map(|chunk| chunk.iter())
            .skip(within_chunk);
        sealed.chain(self.tail.iter().skip(start.saturating_sub(sealed_len)))
    }

    fn push(&mut self, entry: LogEntry) {
        self.tail.push(entry);
        // Seal all but the newest entry, which may still absorb fragments.
        if self.tail.len() > CHUNK_LEN {
            let open = self.tail.split_off(CHUNK_LEN);
            let chunk: Arc<[LogEntry]> = std::mem::replace(&mut self.tail, open).into();
            Arc::make_mut(&mut self.sealed).push(chunk);
        }
    }

    fn last_mut(&mut self) -> Option<&mut LogEntry> {
        self.tail.last_mut()
    }
}

impl Index<usize> for TranscriptView {
    type Output = LogEntry;

    fn index(&self, idx: usize) -> &LogEntry {
        match self.get(idx) {
            Some(entry) => entry,
            None => panic!("transcript index {idx} out of range (len {})", self.len()),
        }
    }
}

impl PartialEq for TranscriptView {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

// ── Transcript ────────────────────────────────────────────────────────────────

/// The session's log of events.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: TranscriptView,
    /// Bumped on every change, including in-place merges.
    revision: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, consolidating stream fragments.
    ///
    /// Entries of kind [`EntryKind::Stream`] are stored as
    /// [`EntryKind::Thought`]. Structured payloads are never merged.
    pub fn append(&mut self, mut entry: LogEntry) -> AppendOutcome {
        self.revision += 1;

        if entry.kind != EntryKind::Stream {
            self.entries.push(entry);
            return AppendOutcome::Appended(self.entries.len() - 1);
        }

        let last_idx = self.entries.len().checked_sub(1);
        if let (Some(idx), Payload::Text(fragment)) = (last_idx, &entry.payload) {
            if let Some(last) = self.entries.last_mut() {
                let mergeable_kind = matches!(last.kind, EntryKind::Thought | EntryKind::Stream);
                if mergeable_kind && last.agent_label == entry.agent_label {
                    if let Payload::Text(existing) = &mut last.payload {
                        existing.push_str(fragment);
                        last.kind = EntryKind::Thought;
                        return AppendOutcome::Merged(idx);
                    }
                }
            }
        }

        entry.kind = EntryKind::Thought;
        self.entries.push(entry);
        AppendOutcome::Appended(self.entries.len() - 1)
    }

    pub fn entries(&self) -> &TranscriptView {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drop every entry. Used only when a new mission is launched.
    pub fn clear(&mut self) {
        self.entries = TranscriptView::default();
        self.revision += 1;
    }
}
