//! Frame change detection
//!
//! Compares consecutive frames pixel-by-pixel and reports how much of the
//! scene changed and where. The result gates the rest of the pipeline: a
//! frame below the change threshold is never resized, encoded, or
//! captioned.

use image::RgbImage;

/// Per-channel mean absolute difference above which a pixel counts as changed
const INTENSITY_THRESHOLD: u32 = 32;

/// A rectangular region in pixel coordinates.
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    /// The full frame of the given dimensions
    #[must_use]
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    /// Region width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Region height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Whether the region covers no pixels
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Expand by `padding` on every side, clamped to `width` × `height`
    #[must_use]
    pub fn pad(&self, padding: u32, width: u32, height: u32) -> Self {
        Self {
            left: self.left.saturating_sub(padding),
            top: self.top.saturating_sub(padding),
            right: (self.right + padding).min(width),
            bottom: (self.bottom + padding).min(height),
        }
    }
}

/// Result of comparing two frames
#[derive(Debug, Clone, Copy)]
pub struct FrameDiff {
    /// Fraction of pixels that changed, in `[0, 1]`
    pub change_ratio: f64,
    /// Tight bounding box over changed pixels; absent when nothing changed
    pub region: Option<Region>,
}

impl FrameDiff {
    /// A full-frame change, used when no comparison baseline exists
    #[must_use]
    pub const fn full_change(width: u32, height: u32) -> Self {
        Self {
            change_ratio: 1.0,
            region: Some(Region::full(width, height)),
        }
    }
}

/// Compare two frames pixel-by-pixel.
///
/// A missing or shape-mismatched `previous` reports a full-frame change so
/// a fresh baseline is never incorrectly skipped.
#[must_use]
pub fn frame_diff(previous: Option<&RgbImage>, current: &RgbImage) -> FrameDiff {
    let (width, height) = current.dimensions();

    let Some(previous) = previous else {
        return FrameDiff::full_change(width, height);
    };
    if previous.dimensions() != current.dimensions() {
        return FrameDiff::full_change(width, height);
    }

    let mut changed: u64 = 0;
    let mut left = width;
    let mut top = height;
    let mut right = 0u32;
    let mut bottom = 0u32;

    for (x, y, pixel) in current.enumerate_pixels() {
        let prev = previous.get_pixel(x, y);
        let sum: u32 = (0..3)
            .map(|c| u32::from(pixel.0[c].abs_diff(prev.0[c])))
            .sum();

        // Equivalent to mean-of-three-channels > threshold
        if sum > 3 * INTENSITY_THRESHOLD {
            changed += 1;
            left = left.min(x);
            right = right.max(x);
            top = top.min(y);
            bottom = bottom.max(y);
        }
    }

    if changed == 0 {
        return FrameDiff {
            change_ratio: 0.0,
            region: None,
        };
    }

    let total = u64::from(width) * u64::from(height);
    #[allow(clippy::cast_precision_loss)]
    let change_ratio = changed as f64 / total as f64;

    FrameDiff {
        change_ratio,
        region: Some(Region {
            left,
            top,
            right: right + 1,
            bottom: bottom + 1,
        }),
    }
}

/// Change detector holding the previous frame as its comparison baseline.
///
/// The baseline advances on every observation, including frames the
/// pipeline later skips, so the ratio always measures change against the
/// most recent capture.
#[derive(Debug, Default)]
pub struct FrameDiffEngine {
    previous: Option<RgbImage>,
}

impl FrameDiffEngine {
    /// Create an engine with no baseline
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// Diff `current` against the stored baseline and advance the baseline
    pub fn observe(&mut self, current: &RgbImage) -> FrameDiff {
        let diff = frame_diff(self.previous.as_ref(), current);
        self.previous = Some(current.clone());
        diff
    }

    /// Drop the baseline; the next observation reports full change
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Crop a frame to the given region.
///
/// Callers are expected to pass a non-empty region clamped to the frame.
#[must_use]
pub fn crop_to_region(frame: &RgbImage, region: Region) -> RgbImage {
    image::imageops::crop_imm(
        frame,
        region.left,
        region.top,
        region.width(),
        region.height(),
    )
    .to_image()
}
