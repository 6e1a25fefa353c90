//! Frame processing pipeline
//!
//! Orchestrates one accepted frame end to end: decode, change gate, crop
//! to the active region, resize, JPEG encode, fingerprint, cache or
//! caption, context update, delivery notification.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::captioner::{Captioner, DetailLevel};
use super::diff::{FrameDiffEngine, crop_to_region};
use crate::cache::{PerceptualCache, fingerprint};
use crate::config::{DiffConfig, PipelineConfig};
use crate::context::ContextStore;
use crate::{Error, Result};

/// Where a frame was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSource {
    Screen,
    Camera,
}

impl std::fmt::Display for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Screen => write!(f, "screen"),
            Self::Camera => write!(f, "camera"),
        }
    }
}

/// A frame that survived the change gate and was re-encoded
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFrame {
    /// JPEG payload, base64-encoded
    pub base64: String,
    /// Encoded width in pixels
    pub width: u32,
    /// Encoded height in pixels
    pub height: u32,
    /// Capture timestamp (unix millis)
    pub captured_at: i64,
    /// Content fingerprint of the encoded bytes
    pub fingerprint: String,
    /// Capture source
    pub source: FrameSource,
}

/// Notification sent once per frame that completes captioning
#[derive(Debug, Clone)]
pub struct ContextReady {
    /// The frame's description (cached or freshly captioned)
    pub description: String,
    /// Metadata of the processed frame
    pub frame: ProcessedFrame,
}

/// Per-session frame pipeline.
///
/// Owned and driven by a single session worker; frames for one session are
/// never processed concurrently, so the diff baseline cannot race.
pub struct FramePipeline {
    config: PipelineConfig,
    diff_config: DiffConfig,
    engine: FrameDiffEngine,
    cache: Arc<Mutex<PerceptualCache>>,
    context: Arc<Mutex<ContextStore>>,
    captioner: Arc<dyn Captioner>,
    delivery: mpsc::Sender<ContextReady>,
    recent: Arc<Mutex<VecDeque<ProcessedFrame>>>,
}

impl FramePipeline {
    /// Assemble a pipeline over the session's shared components
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        diff_config: DiffConfig,
        cache: Arc<Mutex<PerceptualCache>>,
        context: Arc<Mutex<ContextStore>>,
        captioner: Arc<dyn Captioner>,
        delivery: mpsc::Sender<ContextReady>,
    ) -> Self {
        Self {
            config,
            diff_config,
            engine: FrameDiffEngine::new(),
            cache,
            context,
            captioner,
            delivery,
            recent: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Handle to the recent-frames ring buffer for introspection
    #[must_use]
    pub fn recent_handle(&self) -> Arc<Mutex<VecDeque<ProcessedFrame>>> {
        Arc::clone(&self.recent)
    }

    /// Process one raw frame.
    ///
    /// Returns `Ok(None)` when the frame was skipped by the change gate.
    /// Decode and encode failures are logged and propagated; captioner
    /// failures propagate unchanged and leave no partial context entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frame`] for undecodable or unencodable frames and
    /// [`Error::Caption`] when the captioning collaborator fails.
    pub async fn handle_frame(
        &mut self,
        bytes: &[u8],
        source: FrameSource,
        detail: DetailLevel,
    ) -> Result<Option<ProcessedFrame>> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| {
                tracing::error!(error = %e, %source, "failed to decode frame");
                Error::Frame(format!("undecodable frame: {e}"))
            })?
            .to_rgb8();

        let diff = self.engine.observe(&decoded);
        if diff.change_ratio < self.diff_config.change_threshold {
            tracing::debug!(
                change_ratio = diff.change_ratio,
                %source,
                "frame below change threshold, skipping"
            );
            return Ok(None);
        }

        // Crop to the padded active region when one exists; a degenerate
        // region falls back to the full frame.
        let (width, height) = decoded.dimensions();
        let working = match diff.region {
            Some(region) => {
                let padded = region.pad(self.diff_config.region_padding, width, height);
                if padded.is_empty() {
                    decoded
                } else {
                    crop_to_region(&decoded, padded)
                }
            }
            None => decoded,
        };

        let working = self.resize_to_fit(&working);
        let jpeg = self.encode_jpeg(&working)?;

        let frame = ProcessedFrame {
            base64: base64::engine::general_purpose::STANDARD.encode(&jpeg),
            width: working.width(),
            height: working.height(),
            captured_at: chrono::Utc::now().timestamp_millis(),
            fingerprint: fingerprint(&jpeg),
            source,
        };
        self.push_recent(frame.clone());

        let description = self.describe(&jpeg, &frame, detail).await?;

        if let Ok(mut context) = self.context.lock() {
            context.update_context(None, Some(&description), frame.captured_at);
        }

        let notification = ContextReady {
            description,
            frame: frame.clone(),
        };
        if self.delivery.send(notification).await.is_err() {
            // Session already moved on; caching and context still happened
            tracing::debug!("delivery channel closed, dropping notification");
        }

        Ok(Some(frame))
    }

    /// Snapshot of the most recently processed frames, oldest first
    #[must_use]
    pub fn recent_frames(&self) -> Vec<ProcessedFrame> {
        self.recent
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Cached or freshly captioned description for an encoded frame
    async fn describe(
        &self,
        jpeg: &[u8],
        frame: &ProcessedFrame,
        detail: DetailLevel,
    ) -> Result<String> {
        let cached = self
            .cache
            .lock()
            .ok()
            .and_then(|c| c.get(&frame.fingerprint));
        if let Some(hit) = cached {
            tracing::debug!(fingerprint = %frame.fingerprint, "perceptual cache hit");
            return Ok(hit.description);
        }

        let description = self
            .captioner
            .describe(jpeg, frame.source, detail)
            .await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.set(&frame.fingerprint, &description);
        }
        Ok(description)
    }

    /// Downscale so the longest side fits `max_resolution`, preserving
    /// aspect ratio. Frames already within bounds pass through untouched.
    fn resize_to_fit(&self, frame: &RgbImage) -> RgbImage {
        let (width, height) = frame.dimensions();
        let longest = width.max(height);
        if longest <= self.config.max_resolution {
            return frame.clone();
        }

        let scale = f64::from(self.config.max_resolution) / f64::from(longest);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let new_width = ((f64::from(width) * scale).floor() as u32).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let new_height = ((f64::from(height) * scale).floor() as u32).max(1);

        image::imageops::resize(frame, new_width, new_height, FilterType::Triangle)
    }

    fn encode_jpeg(&self, frame: &RgbImage) -> Result<Vec<u8>> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let quality = ((self.config.compression_quality * 100.0).round() as u8).clamp(1, 100);

        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(frame).map_err(|e| {
            tracing::error!(error = %e, "failed to encode frame");
            Error::Frame(format!("jpeg encoding failed: {e}"))
        })?;

        Ok(buffer.into_inner())
    }

    fn push_recent(&self, frame: ProcessedFrame) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.push_back(frame);
            while recent.len() > self.config.buffer_size {
                recent.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use image::Rgb;

    use super::*;
    use crate::config::{CacheConfig, ContextConfig};

    /// Captioner that counts invocations and returns a fixed description
    struct CountingCaptioner {
        calls: AtomicUsize,
    }

    impl CountingCaptioner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Captioner for CountingCaptioner {
        async fn describe(
            &self,
            _jpeg: &[u8],
            _source: FrameSource,
            _detail: DetailLevel,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("a test scene".to_string())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn png_frame(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn build_pipeline(
        captioner: Arc<dyn Captioner>,
    ) -> (FramePipeline, mpsc::Receiver<ContextReady>) {
        let cache = Arc::new(Mutex::new(PerceptualCache::new(&CacheConfig::default())));
        let context = Arc::new(Mutex::new(ContextStore::new(ContextConfig::default())));
        let (tx, rx) = mpsc::channel(16);
        let pipeline = FramePipeline::new(
            PipelineConfig::default(),
            DiffConfig::default(),
            cache,
            context,
            captioner,
            tx,
        );
        (pipeline, rx)
    }

    #[tokio::test]
    async fn first_frame_is_always_processed() {
        let captioner = CountingCaptioner::new();
        let (mut pipeline, mut rx) = build_pipeline(captioner.clone());

        let frame = pipeline
            .handle_frame(&png_frame(32, 24, [50, 60, 70]), FrameSource::Screen, DetailLevel::Quick)
            .await
            .unwrap()
            .expect("first frame must not be skipped");

        assert_eq!(frame.source, FrameSource::Screen);
        assert_eq!(captioner.calls(), 1);

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.description, "a test scene");
        assert_eq!(notification.frame.fingerprint, frame.fingerprint);
    }

    #[tokio::test]
    async fn identical_frame_is_skipped_before_captioning() {
        let captioner = CountingCaptioner::new();
        let (mut pipeline, _rx) = build_pipeline(captioner.clone());
        let bytes = png_frame(32, 24, [50, 60, 70]);

        let first = pipeline
            .handle_frame(&bytes, FrameSource::Screen, DetailLevel::Quick)
            .await
            .unwrap();
        let second = pipeline
            .handle_frame(&bytes, FrameSource::Screen, DetailLevel::Quick)
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(captioner.calls(), 1);
    }

    #[tokio::test]
    async fn repeated_content_hits_the_cache() {
        let captioner = CountingCaptioner::new();
        let (mut pipeline, _rx) = build_pipeline(captioner.clone());

        // Alternate between two colors so the change gate always passes but
        // the encoded bytes repeat
        let a = png_frame(32, 24, [0, 0, 0]);
        let b = png_frame(32, 24, [250, 250, 250]);

        pipeline.handle_frame(&a, FrameSource::Camera, DetailLevel::Quick).await.unwrap();
        pipeline.handle_frame(&b, FrameSource::Camera, DetailLevel::Quick).await.unwrap();
        pipeline.handle_frame(&a, FrameSource::Camera, DetailLevel::Quick).await.unwrap();
        pipeline.handle_frame(&b, FrameSource::Camera, DetailLevel::Quick).await.unwrap();

        // Four processed frames but only two distinct fingerprints
        assert_eq!(captioner.calls(), 2);
    }

    #[tokio::test]
    async fn undecodable_bytes_propagate_an_error() {
        let captioner = CountingCaptioner::new();
        let (mut pipeline, _rx) = build_pipeline(captioner.clone());

        let result = pipeline
            .handle_frame(b"not an image", FrameSource::Screen, DetailLevel::Quick)
            .await;

        assert!(matches!(result, Err(Error::Frame(_))));
        assert_eq!(captioner.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_frames_are_downscaled() {
        let captioner = CountingCaptioner::new();
        let (mut pipeline, _rx) = build_pipeline(captioner);
        pipeline.config.max_resolution = 16;
        // Disable cropping noise: full-change first frame covers everything
        let frame = pipeline
            .handle_frame(&png_frame(64, 32, [5, 5, 5]), FrameSource::Screen, DetailLevel::Quick)
            .await
            .unwrap()
            .unwrap();

        assert!(frame.width <= 16 && frame.height <= 16);
        // Aspect ratio preserved: 2:1
        assert_eq!(frame.width, 16);
        assert_eq!(frame.height, 8);
    }

    #[tokio::test]
    async fn ring_buffer_is_bounded() {
        let captioner = CountingCaptioner::new();
        let (mut pipeline, _rx) = build_pipeline(captioner);
        pipeline.config.buffer_size = 2;

        // Cycle distinct colors so every frame passes the gate
        for shade in [10u8, 80, 160, 240] {
            let bytes = png_frame(16, 16, [shade, shade, shade]);
            pipeline
                .handle_frame(&bytes, FrameSource::Screen, DetailLevel::Quick)
                .await
                .unwrap();
        }

        let recent = pipeline.recent_frames();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn caption_failure_leaves_no_context_entry() {
        struct FailingCaptioner;

        #[async_trait]
        impl Captioner for FailingCaptioner {
            async fn describe(
                &self,
                _jpeg: &[u8],
                _source: FrameSource,
                _detail: DetailLevel,
            ) -> Result<String> {
                Err(Error::Caption("provider down".to_string()))
            }

            fn name(&self) -> &'static str {
                "failing"
            }
        }

        let cache = Arc::new(Mutex::new(PerceptualCache::new(&CacheConfig::default())));
        let context = Arc::new(Mutex::new(ContextStore::new(ContextConfig::default())));
        let (tx, _rx) = mpsc::channel(16);
        let mut pipeline = FramePipeline::new(
            PipelineConfig::default(),
            DiffConfig::default(),
            cache,
            Arc::clone(&context),
            Arc::new(FailingCaptioner),
            tx,
        );

        let result = pipeline
            .handle_frame(&png_frame(16, 16, [1, 2, 3]), FrameSource::Screen, DetailLevel::Quick)
            .await;

        assert!(matches!(result, Err(Error::Caption(_))));
        assert!(context.lock().unwrap().is_empty());
    }
}
