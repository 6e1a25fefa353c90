//! Token-budgeted rolling context store with compaction

use std::collections::VecDeque;

use uuid::Uuid;

use crate::config::ContextConfig;

/// Replacement content for entries degraded past truncation
pub const COMPACTION_PLACEHOLDER: &str = "[compressed-context]";

/// Entries longer than this are truncated before being placeholdered
const TRUNCATE_ABOVE_CHARS: usize = 64;

/// Length kept when truncating, before the ellipsis marker
const TRUNCATED_CHARS: usize = 60;

/// Kind of a context entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Audio,
    Visual,
    Gesture,
    System,
}

/// A single entry in the rolling context log
#[derive(Debug, Clone)]
pub struct ContextEntry {
    /// Unique entry ID
    pub id: Uuid,
    /// Entry kind (audio, visual, gesture, system)
    pub kind: EntryKind,
    /// Entry text content
    pub content: String,
    /// Estimated token cost of `content`
    pub token_cost: usize,
    /// Capture timestamp (unix millis)
    pub timestamp: i64,
}

/// Estimate the token cost of a piece of content.
///
/// A fixed `ceil(chars / 4)` approximation, not a real tokenizer. The
/// compaction thresholds are calibrated against this estimate, so it must
/// not be swapped for an exact tokenizer without retuning them.
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    content.chars().count().div_ceil(4)
}

/// Ordered log of context entries with a token budget.
///
/// Every mutation ends with a compaction pass: once the estimated total
/// reaches `compression_trigger`, older entries are degraded in place
/// (truncation, then a fixed placeholder), and if the total still exceeds
/// `max_tokens` the oldest entries are evicted outright.
#[derive(Debug)]
pub struct ContextStore {
    entries: VecDeque<ContextEntry>,
    config: ContextConfig,
}

impl ContextStore {
    /// Create an empty store with the given budget configuration
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            config,
        }
    }

    /// Record an audio transcript and/or visual description at `timestamp`.
    ///
    /// Appends an audio entry when `audio` is non-empty, then a visual entry
    /// when `visual` is non-empty. A visual append trims the oldest visual
    /// entries beyond the configured history size. Returns a snapshot of the
    /// log in insertion order.
    pub fn update_context(
        &mut self,
        audio: Option<&str>,
        visual: Option<&str>,
        timestamp: i64,
    ) -> Vec<ContextEntry> {
        if let Some(transcript) = audio.filter(|t| !t.is_empty()) {
            self.add_entry(EntryKind::Audio, transcript, timestamp);
        }

        if let Some(description) = visual.filter(|d| !d.is_empty()) {
            self.add_entry(EntryKind::Visual, description, timestamp);
            self.trim_visual_history();
        }

        self.compact_if_necessary();
        self.entries.iter().cloned().collect()
    }

    /// Append a system entry timestamped now
    pub fn add_system_message(&mut self, content: &str) -> ContextEntry {
        let entry = self.add_entry(
            EntryKind::System,
            content,
            chrono::Utc::now().timestamp_millis(),
        );
        self.compact_if_necessary();
        entry
    }

    /// Append a gesture entry at `timestamp`
    pub fn add_gesture(&mut self, content: &str, timestamp: i64) -> ContextEntry {
        let entry = self.add_entry(EntryKind::Gesture, content, timestamp);
        self.compact_if_necessary();
        entry
    }

    /// Snapshot of all entries in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<ContextEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Estimated token cost of the whole log
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.entries.iter().map(|e| e.token_cost).sum()
    }

    /// Number of entries currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add_entry(&mut self, kind: EntryKind, content: &str, timestamp: i64) -> ContextEntry {
        let entry = ContextEntry {
            id: Uuid::new_v4(),
            kind,
            content: content.to_string(),
            token_cost: estimate_tokens(content),
            timestamp,
        };
        self.entries.push_back(entry.clone());
        entry
    }

    /// Drop the oldest visual entries beyond the configured history size.
    ///
    /// FIFO by insertion order, not by content; non-visual entries are
    /// untouched.
    fn trim_visual_history(&mut self) {
        let visual_count = self
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Visual)
            .count();
        if visual_count <= self.config.visual_history_size {
            return;
        }

        let mut excess = visual_count - self.config.visual_history_size;
        self.entries.retain(|e| {
            if excess > 0 && e.kind == EntryKind::Visual {
                excess -= 1;
                return false;
            }
            true
        });
    }

    /// Degrade old entries, then hard-evict from the front if still over
    /// budget.
    fn compact_if_necessary(&mut self) {
        let mut running = self.total_tokens();
        if running < self.config.compression_trigger {
            return;
        }

        // Degrade pass, oldest first: truncate long entries, placeholder the
        // rest. Each edit recomputes the running total before moving on.
        for i in 0..self.entries.len() {
            if running <= self.config.max_tokens {
                break;
            }

            let entry = &mut self.entries[i];
            if entry.content.chars().count() > TRUNCATE_ABOVE_CHARS {
                let truncated: String = entry.content.chars().take(TRUNCATED_CHARS).collect();
                entry.content = format!("{truncated}...");
            } else {
                entry.content = COMPACTION_PLACEHOLDER.to_string();
            }
            entry.token_cost = estimate_tokens(&entry.content);

            running = self.entries.iter().map(|e| e.token_cost).sum();
        }

        // Hard trim: evict oldest entries until the budget is satisfied
        while self.total_tokens() > self.config.max_tokens && !self.entries.is_empty() {
            self.entries.pop_front();
            tracing::debug!(remaining = self.entries.len(), "evicted oldest context entry");
        }
    }
}
