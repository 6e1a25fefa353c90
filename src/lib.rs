//! Iris Gateway - Realtime audio/visual perception gateway for AI assistants
//!
//! This library provides the core functionality for the Iris gateway:
//! - Token-budgeted rolling context with compaction
//! - Content-addressed perceptual caching of frame descriptions
//! - Frame change detection with active-region extraction
//! - Dual-channel event queueing with interrupt semantics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Clients                           │
//! │     Screen capture  │  Camera  │  Audio stream      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ WebSocket (/visual)
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Iris Gateway                         │
//! │   Session  │  Frame pipeline  │  Context  │  Cache  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │             Captioning provider                      │
//! │   Vision API  │  Ephemeral realtime credentials     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod queue;
pub mod registry;
pub mod session;
pub mod vision;

pub use cache::{CachedDescription, PerceptualCache, fingerprint};
pub use config::Config;
pub use context::{ContextEntry, ContextStore, EntryKind};
pub use credentials::{CredentialMinter, EphemeralCredential};
pub use error::{Error, Result};
pub use queue::{DualQueue, QueueItem, QueueObserver};
pub use registry::{SessionMode, SessionRecord, SessionRegistry};
pub use session::{SessionController, SessionEvent};
pub use vision::captioner::{Captioner, DetailLevel, OfflineCaptioner, VisionCaptioner};
pub use vision::diff::{FrameDiff, FrameDiffEngine, Region};
pub use vision::pipeline::{ContextReady, FramePipeline, FrameSource, ProcessedFrame};
