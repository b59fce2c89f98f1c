use serde::{Deserialize, Serialize};

/// An input rectangle to be placed, plus its placement once a fit is found.
///
/// `key` is an opaque user handle carried through unchanged (e.g., an asset
/// path or an index into the caller's own records). `width`/`height` are the
/// rectangle's dimensions in pixels and may be zero. The `out_*` fields are
/// written by a successful [`fit_areas`](crate::fit_areas) call and are
/// meaningless before that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitArea<K = ()> {
    /// User-specified handle; never inspected by the search.
    pub key: K,
    /// X size of the area, including any spacing the caller baked in.
    pub width: i32,
    /// Y size of the area, including any spacing the caller baked in.
    pub height: i32,
    /// Index of the output image this area was placed into.
    pub out_image: i32,
    /// X offset of this area within its output image.
    pub out_x: i32,
    /// Y offset of this area within its output image.
    pub out_y: i32,
}

impl<K> FitArea<K> {
    pub fn new(key: K, width: i32, height: i32) -> Self {
        Self {
            key,
            width,
            height,
            out_image: 0,
            out_x: 0,
            out_y: 0,
        }
    }
}

/// A rectangular output image (bin) receiving placed areas.
///
/// `size` caches `width * height` and is kept consistent by everything in
/// this crate that resizes an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutImage {
    pub width: i32,
    pub height: i32,
    pub size: i32,
}

impl OutImage {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            size: width * height,
        }
    }
}

/// Outcome of a successful fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitReport {
    /// `100 * ideal summed area / achieved summed area`, in (0, 100].
    /// 100 means no wasted output pixels.
    pub fit_quality: f64,
    /// Summed size of all output images in the best fit.
    pub total_out_size: i64,
    /// Number of output images in the best fit, including any zero-sized
    /// seed images that stayed unused.
    pub image_count: usize,
    /// Search calls consumed out of the configured budget.
    pub calls_used: i32,
    /// Number of times the search improved on its best complete placement.
    pub improvements: u32,
}

impl FitReport {
    /// Human-readable one-liner for logs.
    pub fn summary(&self) -> String {
        format!(
            "Images: {}, Quality: {:.2}%, Total Area: {} px², Calls: {}, Improvements: {}",
            self.image_count, self.fit_quality, self.total_out_size, self.calls_used, self.improvements,
        )
    }

    /// Wasted output pixels relative to the ideal packing.
    pub fn wasted_area(&self, ideal: i64) -> i64 {
        self.total_out_size - ideal
    }
}
