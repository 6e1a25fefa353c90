//! Dual-channel event queue
//!
//! Two independent FIFO lanes (audio, visual) that ledger the events
//! currently in flight for a session. The queue does not gate processing —
//! it exists so an interrupt can account for and discard buffered events.
//! The visual lane supports pause/resume; while paused, enqueues are
//! silently dropped.

use std::collections::VecDeque;

use uuid::Uuid;

/// An item held in one of the queue lanes
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    /// Unique item ID
    pub id: Uuid,
    /// The carried payload
    pub payload: T,
    /// Enqueue timestamp (unix millis)
    pub enqueued_at: i64,
}

impl<T> QueueItem<T> {
    /// Wrap a payload with a fresh ID and the current timestamp
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            enqueued_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Observer hooks invoked on queue mutations.
///
/// Side-effect callbacks for downstream bookkeeping (logging, metrics);
/// they are not part of the queue's consistency contract.
pub struct QueueObserver<T> {
    /// Invoked after an item is admitted to either lane
    pub on_enqueue: Option<Box<dyn Fn(&QueueItem<T>) + Send + Sync>>,
    /// Invoked after an item is popped from either lane
    pub on_dequeue: Option<Box<dyn Fn(&QueueItem<T>) + Send + Sync>>,
    /// Invoked after either lane is cleared
    pub on_clear: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<T> Default for QueueObserver<T> {
    fn default() -> Self {
        Self {
            on_enqueue: None,
            on_dequeue: None,
            on_clear: None,
        }
    }
}

impl<T> std::fmt::Debug for QueueObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueObserver")
            .field("on_enqueue", &self.on_enqueue.is_some())
            .field("on_dequeue", &self.on_dequeue.is_some())
            .field("on_clear", &self.on_clear.is_some())
            .finish()
    }
}

/// Dual-lane FIFO queue with visual pause semantics
#[derive(Debug)]
pub struct DualQueue<T> {
    audio: VecDeque<QueueItem<T>>,
    visual: VecDeque<QueueItem<T>>,
    visual_paused: bool,
    observer: QueueObserver<T>,
}

impl<T> Default for DualQueue<T> {
    fn default() -> Self {
        Self::new(QueueObserver::default())
    }
}

impl<T> DualQueue<T> {
    /// Create an empty queue with the given observer hooks
    #[must_use]
    pub fn new(observer: QueueObserver<T>) -> Self {
        Self {
            audio: VecDeque::new(),
            visual: VecDeque::new(),
            visual_paused: false,
            observer,
        }
    }

    /// Admit an item to the audio lane
    pub fn enqueue_audio(&mut self, item: QueueItem<T>) {
        if let Some(hook) = &self.observer.on_enqueue {
            hook(&item);
        }
        self.audio.push_back(item);
    }

    /// Admit an item to the visual lane.
    ///
    /// While paused this is a silent no-op: the item is dropped, not
    /// buffered.
    pub fn enqueue_visual(&mut self, item: QueueItem<T>) {
        if self.visual_paused {
            return;
        }
        if let Some(hook) = &self.observer.on_enqueue {
            hook(&item);
        }
        self.visual.push_back(item);
    }

    /// Pop the front of the audio lane
    pub fn dequeue_audio(&mut self) -> Option<QueueItem<T>> {
        let item = self.audio.pop_front();
        if let (Some(item), Some(hook)) = (&item, &self.observer.on_dequeue) {
            hook(item);
        }
        item
    }

    /// Pop the front of the visual lane
    pub fn dequeue_visual(&mut self) -> Option<QueueItem<T>> {
        let item = self.visual.pop_front();
        if let (Some(item), Some(hook)) = (&item, &self.observer.on_dequeue) {
            hook(item);
        }
        item
    }

    /// Drop everything in the audio lane
    pub fn clear_audio(&mut self) {
        self.audio.clear();
        if let Some(hook) = &self.observer.on_clear {
            hook();
        }
    }

    /// Drop everything in the visual lane
    pub fn clear_visual(&mut self) {
        self.visual.clear();
        if let Some(hook) = &self.observer.on_clear {
            hook();
        }
    }

    /// Drop everything in both lanes
    pub fn clear_all(&mut self) {
        self.clear_audio();
        self.clear_visual();
    }

    /// Stop admitting items to the visual lane.
    ///
    /// Items already enqueued are unaffected.
    pub fn pause_visual(&mut self) {
        self.visual_paused = true;
    }

    /// Resume admitting items to the visual lane
    pub fn resume_visual(&mut self) {
        self.visual_paused = false;
    }

    /// Whether the visual lane is currently paused
    #[must_use]
    pub const fn is_visual_paused(&self) -> bool {
        self.visual_paused
    }

    /// Number of items in the audio lane
    #[must_use]
    pub fn audio_size(&self) -> usize {
        self.audio.len()
    }

    /// Number of items in the visual lane
    #[must_use]
    pub fn visual_size(&self) -> usize {
        self.visual.len()
    }
}
