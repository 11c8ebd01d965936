use serde::{Deserialize, Serialize};

use crate::pose::{Peak, Point};

/// Network input size `(width, height)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSize {
    pub width: usize,
    pub height: usize,
}

impl ModelSize {
    pub const BEST: ModelSize = ModelSize { width: 1312, height: 736 };
    pub const BETTER: ModelSize = ModelSize { width: 656, height: 368 };
    pub const CMU: ModelSize = ModelSize { width: 640, height: 360 };
    pub const DEFAULT: ModelSize = ModelSize { width: 432, height: 368 };
    pub const FASTER: ModelSize = ModelSize { width: 336, height: 288 };
    pub const FASTEST: ModelSize = ModelSize { width: 304, height: 240 };
}

impl Default for ModelSize {
    fn default() -> Self {
        ModelSize::DEFAULT
    }
}

///
/// Share of the network input covered by the resized image, per axis.
///
/// Letterboxing resizes the image to fit the input while keeping its aspect
/// ratio and pads the rest; working-resolution coordinates divided by the map
/// size and then by these factors land back in the original image frame.
///
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormPadding {
    pub width: f64,
    pub height: f64,
}

impl Default for NormPadding {
    fn default() -> Self {
        Self::identity()
    }
}

impl NormPadding {
    #[inline]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// No padding: the image filled the whole network input.
    #[inline]
    pub fn identity() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Padding produced by letterboxing a `src_w x src_h` image into `target`.
    pub fn letterbox(src_w: f64, src_h: f64, target: ModelSize) -> Self {
        let (target_w, target_h) = (target.width as f64, target.height as f64);

        let scale = if target_h / target_w > src_h / src_w {
            target_w / src_w
        } else {
            target_h / src_h
        };

        let resized_w = (src_w * scale).trunc();
        let resized_h = (src_h * scale).trunc();

        Self::new(resized_w / target_w, resized_h / target_h)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.width <= 1e-15 && self.height <= 1e-15
    }

    /// Map a pixel of a `rows x cols` working map to normalized image space.
    #[inline]
    pub fn normalize(&self, peak: Peak, rows: usize, cols: usize) -> Point {
        Point::new(
            peak.col as f64 / cols as f64 / self.width,
            peak.row as f64 / rows as f64 / self.height,
        )
    }

    /// Inverse of `normalize`, in fractional working-map pixels `(x, y)`.
    #[inline]
    pub fn denormalize(&self, point: Point, rows: usize, cols: usize) -> (f64, f64) {
        (
            point.x * self.width * cols as f64,
            point.y * self.height * rows as f64,
        )
    }
}

#[test]
fn letterbox_wide_image_test() {
    // 1280x720 into 432x368: width bound, height padded
    let pad = NormPadding::letterbox(1280.0, 720.0, ModelSize::DEFAULT);

    assert_eq!(pad.width, 1.0);
    assert!((pad.height - 243.0 / 368.0).abs() < 1e-12);
}

#[test]
fn letterbox_tall_image_test() {
    let pad = NormPadding::letterbox(360.0, 720.0, ModelSize::DEFAULT);

    assert!((pad.width - 184.0 / 432.0).abs() < 1e-12);
    assert_eq!(pad.height, 1.0);
}

#[test]
fn normalize_test() {
    let pad = NormPadding::new(1.0, 0.5);
    let p = pad.normalize(Peak::new(23, 27), 46, 54);

    assert!((p.x - 0.5).abs() < 1e-12);
    assert!((p.y - 1.0).abs() < 1e-12);
}

#[test]
fn normalize_round_trip_test() {
    let pad = NormPadding::letterbox(1280.0, 720.0, ModelSize::DEFAULT);
    let (rows, cols) = (46, 54);

    for &(row, col) in &[(0, 0), (12, 40), (45, 53), (30, 7)] {
        let p = pad.normalize(Peak::new(row, col), rows, cols);
        let (x, y) = pad.denormalize(p, rows, cols);

        assert!((x - col as f64).abs() < 1e-9);
        assert!((y - row as f64).abs() < 1e-9);
    }
}
