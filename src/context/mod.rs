//! Rolling conversational context for realtime sessions
//!
//! Holds the ordered log of audio/visual/gesture/system entries and keeps
//! its estimated token cost inside the configured budget via compaction.

mod store;

pub use store::{COMPACTION_PLACEHOLDER, ContextEntry, ContextStore, EntryKind, estimate_tokens};
