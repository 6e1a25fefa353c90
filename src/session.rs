//! Per-session orchestration
//!
//! Each active session owns a private instance of every core component:
//! context store, perceptual cache, dual queue, and frame pipeline. A
//! single worker task drains a bounded intake channel so frames are
//! processed strictly in capture order and the diff baseline never races.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::cache::{self, PerceptualCache};
use crate::config::Config;
use crate::context::{ContextEntry, ContextStore};
use crate::queue::{DualQueue, QueueItem, QueueObserver};
use crate::vision::captioner::{Captioner, DetailLevel};
use crate::vision::pipeline::{ContextReady, FramePipeline, FrameSource, ProcessedFrame};

/// Outbound notification from a session
#[derive(Debug)]
pub enum SessionEvent {
    /// A frame completed captioning and entered the context
    VisualContext(ContextReady),
    /// The session acknowledged an interrupt
    Interrupted,
    /// A frame failed during processing; the session itself is unaffected
    FrameFailed {
        /// Human-readable failure reason
        reason: String,
    },
}

/// A frame waiting for the session worker
struct FrameJob {
    bytes: Vec<u8>,
    source: FrameSource,
    detail: DetailLevel,
}

/// Controller for one realtime session.
///
/// Created per connection and torn down with it; no component instance is
/// ever shared across sessions.
pub struct SessionController {
    id: String,
    context: Arc<Mutex<ContextStore>>,
    queue: Arc<Mutex<DualQueue<serde_json::Value>>>,
    recent: Arc<Mutex<VecDeque<ProcessedFrame>>>,
    jobs: mpsc::Sender<FrameJob>,
    events: mpsc::Sender<SessionEvent>,
    sweeper: tokio::task::JoinHandle<()>,
    worker: tokio::task::JoinHandle<()>,
}

impl SessionController {
    /// Build the session's component graph and start its worker tasks.
    ///
    /// Returns the controller and the receiver for outbound events.
    #[must_use]
    pub fn new(
        id: String,
        config: &Config,
        captioner: Arc<dyn Captioner>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let context = Arc::new(Mutex::new(ContextStore::new(config.context.clone())));
        let perceptual = Arc::new(Mutex::new(PerceptualCache::new(&config.cache)));
        let sweeper = cache::spawn_sweeper(Arc::clone(&perceptual));

        let session_id = id.clone();
        let queue = Arc::new(Mutex::new(DualQueue::new(QueueObserver {
            on_enqueue: None,
            on_dequeue: None,
            on_clear: Some(Box::new(move || {
                tracing::debug!(session = %session_id, "queue lane cleared");
            })),
        })));

        let (events_tx, events_rx) = mpsc::channel::<SessionEvent>(32);
        let (delivery_tx, mut delivery_rx) = mpsc::channel::<ContextReady>(32);
        let (jobs_tx, mut jobs_rx) = mpsc::channel::<FrameJob>(config.pipeline.buffer_size.max(1));

        let mut pipeline = FramePipeline::new(
            config.pipeline.clone(),
            config.diff.clone(),
            Arc::clone(&perceptual),
            Arc::clone(&context),
            captioner,
            delivery_tx,
        );
        let recent = pipeline.recent_handle();

        // Bridge pipeline notifications into the session's event stream
        let bridge_events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(ready) = delivery_rx.recv().await {
                if bridge_events
                    .send(SessionEvent::VisualContext(ready))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // Single worker: frames are diffed and captioned one at a time
        let worker_events = events_tx.clone();
        let worker_queue = Arc::clone(&queue);
        let worker_id = id.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = jobs_rx.recv().await {
                if let Ok(mut q) = worker_queue.lock() {
                    q.dequeue_visual();
                }

                match pipeline.handle_frame(&job.bytes, job.source, job.detail).await {
                    Ok(Some(frame)) => {
                        tracing::debug!(
                            session = %worker_id,
                            fingerprint = %frame.fingerprint,
                            "frame processed"
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(session = %worker_id, error = %e, "frame failed");
                        let _ = worker_events
                            .send(SessionEvent::FrameFailed {
                                reason: e.to_string(),
                            })
                            .await;
                    }
                }
            }
        });

        let controller = Self {
            id,
            context,
            queue,
            recent,
            jobs: jobs_tx,
            events: events_tx,
            sweeper,
            worker,
        };
        (controller, events_rx)
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Submit a raw frame for processing.
    ///
    /// Best-effort: the frame is dropped when the visual lane is paused or
    /// the intake channel is full. Dropped frames are never replayed.
    pub fn submit_frame(&self, bytes: Vec<u8>, source: FrameSource, quick: bool) {
        // Ledger the frame before handing it to the worker so the worker
        // always finds a stub to retire.
        {
            let Ok(mut queue) = self.queue.lock() else {
                return;
            };
            if queue.is_visual_paused() {
                tracing::debug!(session = %self.id, "visual lane paused, dropping frame");
                return;
            }
            queue.enqueue_visual(QueueItem::new(
                serde_json::json!({ "source": source.to_string() }),
            ));
        }

        let detail = if quick {
            DetailLevel::Quick
        } else {
            DetailLevel::Detailed
        };
        let job = FrameJob {
            bytes,
            source,
            detail,
        };

        if let Err(e) = self.jobs.try_send(job) {
            if let Ok(mut queue) = self.queue.lock() {
                queue.dequeue_visual();
            }
            match e {
                TrySendError::Full(_) => {
                    tracing::warn!(session = %self.id, "frame intake full, dropping frame");
                }
                TrySendError::Closed(_) => {
                    tracing::warn!(session = %self.id, "frame worker gone, dropping frame");
                }
            }
        }
    }

    /// Ledger an opaque audio event
    pub fn submit_audio(&self, payload: serde_json::Value) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.enqueue_audio(QueueItem::new(payload));
        }
    }

    /// Handle a user interrupt.
    ///
    /// Clears the audio lane, pauses visual admission, and emits
    /// [`SessionEvent::Interrupted`]. An in-flight captioning call is not
    /// cancelled; its result is still cached.
    pub async fn interrupt(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear_audio();
            queue.pause_visual();
        }
        tracing::info!(session = %self.id, "session interrupted");
        let _ = self.events.send(SessionEvent::Interrupted).await;
    }

    /// Re-enable visual admission. Dropped frames are not replayed.
    pub fn resume_visual(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.resume_visual();
        }
        tracing::debug!(session = %self.id, "visual lane resumed");
    }

    /// Snapshot of the session's context log
    #[must_use]
    pub fn context_snapshot(&self) -> Vec<ContextEntry> {
        self.context.lock().map(|c| c.entries()).unwrap_or_default()
    }

    /// Shared handle to the context store (gestures, system messages)
    #[must_use]
    pub fn context(&self) -> Arc<Mutex<ContextStore>> {
        Arc::clone(&self.context)
    }

    /// Snapshot of the most recently processed frames, oldest first
    #[must_use]
    pub fn recent_frames(&self) -> Vec<ProcessedFrame> {
        self.recent
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Items currently ledgered in the audio lane
    #[must_use]
    pub fn audio_backlog(&self) -> usize {
        self.queue.lock().map(|q| q.audio_size()).unwrap_or(0)
    }

    /// Items currently ledgered in the visual lane
    #[must_use]
    pub fn visual_backlog(&self) -> usize {
        self.queue.lock().map(|q| q.visual_size()).unwrap_or(0)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.sweeper.abort();
        self.worker.abort();
        tracing::debug!(session = %self.id, "session torn down");
    }
}
