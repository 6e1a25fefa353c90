//! Session controller integration tests
//!
//! Covers the interrupt flow and the per-frame notification ordering
//! guarantee using an offline captioner.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use iris_gateway::{
    Captioner, Config, DetailLevel, FrameSource, Result, SessionController, SessionEvent,
};

mod common;
use common::solid_png;

/// Captioner that returns sequentially numbered descriptions
struct SequenceCaptioner {
    counter: AtomicUsize,
}

impl SequenceCaptioner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            counter: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Captioner for SequenceCaptioner {
    async fn describe(
        &self,
        _jpeg: &[u8],
        _source: FrameSource,
        _detail: DetailLevel,
    ) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("caption-{n}"))
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

#[tokio::test]
async fn notifications_arrive_in_capture_order() {
    let config = Config::default();
    let (session, mut rx) =
        SessionController::new("order".to_string(), &config, SequenceCaptioner::new());

    // Distinct shades so every frame clears the change gate
    for shade in [0u8, 100, 200] {
        session.submit_frame(
            solid_png(24, 24, [shade, shade, shade]),
            FrameSource::Screen,
            true,
        );
    }

    let mut descriptions = Vec::new();
    for _ in 0..3 {
        match next_event(&mut rx).await {
            SessionEvent::VisualContext(ready) => descriptions.push(ready.description),
            other => panic!("expected VisualContext, got {other:?}"),
        }
    }

    assert_eq!(descriptions, vec!["caption-1", "caption-2", "caption-3"]);
}

#[tokio::test]
async fn interrupt_flushes_audio_and_gates_frames() {
    let config = Config::default();
    let (session, mut rx) =
        SessionController::new("interrupt".to_string(), &config, SequenceCaptioner::new());

    session.submit_audio(serde_json::json!({ "pcm": "AAAA" }));
    session.submit_audio(serde_json::json!({ "pcm": "BBBB" }));
    assert_eq!(session.audio_backlog(), 2);

    session.interrupt().await;
    assert!(matches!(next_event(&mut rx).await, SessionEvent::Interrupted));
    assert_eq!(session.audio_backlog(), 0);

    // Frames submitted after the interrupt are dropped, not buffered
    session.submit_frame(solid_png(24, 24, [50, 50, 50]), FrameSource::Screen, true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.context_snapshot().is_empty());
    assert_eq!(session.visual_backlog(), 0);

    // Resume does not replay the dropped frame
    session.resume_visual();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.context_snapshot().is_empty());

    // But new frames flow again
    session.submit_frame(solid_png(24, 24, [220, 10, 10]), FrameSource::Screen, true);
    assert!(matches!(
        next_event(&mut rx).await,
        SessionEvent::VisualContext(_)
    ));
}

#[tokio::test]
async fn bad_frame_fails_without_killing_the_session() {
    let config = Config::default();
    let (session, mut rx) =
        SessionController::new("resilient".to_string(), &config, SequenceCaptioner::new());

    session.submit_frame(b"definitely not an image".to_vec(), FrameSource::Screen, true);
    match next_event(&mut rx).await {
        SessionEvent::FrameFailed { reason } => {
            assert!(reason.contains("frame"));
        }
        other => panic!("expected FrameFailed, got {other:?}"),
    }

    // The session keeps working afterwards
    session.submit_frame(solid_png(24, 24, [5, 5, 5]), FrameSource::Screen, true);
    assert!(matches!(
        next_event(&mut rx).await,
        SessionEvent::VisualContext(_)
    ));
}
