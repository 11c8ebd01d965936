use ndarray::prelude::*;

/// Pixel distance between neighbouring NMS cells, before scaling.
const CELL_STRIDE: f64 = 2.0;

/// Side of the square NMS box of one cell, before scaling.
const CELL_SIZE: f64 = 12.0;

/// A local maximum of a confidence map, in working-resolution pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Peak {
    pub row: usize,
    pub col: usize,
}

impl Peak {
    #[inline(always)]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Copy, Clone)]
struct CellBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl CellBox {
    fn for_cell(row: usize, col: usize, scale: f64) -> Self {
        let edge = |v: usize, extra: f64| ((CELL_STRIDE * v as f64 + 1.0 + extra) / scale + 0.5).floor() as f32;

        Self {
            x1: edge(col, 0.0),
            y1: edge(row, 0.0),
            x2: edge(col, CELL_SIZE),
            y2: edge(row, CELL_SIZE),
        }
    }

    #[inline]
    fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    fn iou(&self, other: &CellBox) -> f32 {
        let (area_a, area_b) = (self.area(), other.area());

        if area_a <= 0.0 || area_b <= 0.0 {
            return 0.0;
        }

        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = iw * ih;

        intersection / (area_a + area_b - intersection)
    }
}

///
/// Threshold used both as NMS overlap limit and as minimal peak score:
/// `multiplier * mean` over the whole stack, clamped to `[floor, cap]`.
///
pub fn adaptive_threshold(heatmaps: ArrayView3<'_, f32>, multiplier: f32, floor: f32, cap: f32) -> f32 {
    if heatmaps.is_empty() {
        return floor;
    }

    let mean = heatmaps.iter().sum::<f32>() / heatmaps.len() as f32;

    (mean * multiplier).max(floor).min(cap)
}

/// Image pyramid scales for a `h x w` map, largest first.
pub fn scales(h: f64, w: f64, factor: f64, min_size: f64) -> Vec<f64> {
    let m = 12.0 / min_size;
    let mut minl = h.min(w) * m;
    let mut scales = Vec::new();
    let mut count = 0;

    while minl > 12.0 {
        scales.push(m * factor.powi(count));
        minl *= factor;
        count += 1;
    }

    scales
}

///
/// Greedy box non-max suppression over the cells of one confidence map.
///
/// Every cell above `threshold` stands for a square box derived from its
/// position and `scale`. Boxes are visited by descending score, ties in
/// row-major order; a box is dropped when its IoU with an already kept box
/// exceeds `threshold`. At most `rows` cells survive. The result holds the
/// score of kept cells and zero elsewhere.
///
pub fn non_max_suppression(plane: ArrayView2<'_, f32>, scale: f64, threshold: f32) -> Array2<f32> {
    let (rows, _) = plane.dim();
    let mut out = Array2::zeros(plane.dim());

    let mut cells: Vec<((usize, usize), f32)> = plane
        .indexed_iter()
        .filter(|&(_, &v)| v > threshold)
        .map(|(idx, &v)| (idx, v))
        .collect();

    // stable, so equal scores keep scan order
    cells.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<CellBox> = Vec::with_capacity(rows);

    for ((row, col), score) in cells {
        if kept.len() >= rows {
            break;
        }

        let cell = CellBox::for_cell(row, col, scale);

        if kept.iter().any(|k| k.iou(&cell) > threshold) {
            continue;
        }

        kept.push(cell);
        out[(row, col)] = score;
    }

    out
}

/// Cells strictly above `threshold`, in row-major order.
pub fn maximum_filter(plane: ArrayView2<'_, f32>, threshold: f32) -> Vec<Peak> {
    plane
        .indexed_iter()
        .filter(|&(_, &v)| v > threshold)
        .map(|((row, col), _)| Peak::new(row, col))
        .collect()
}

/// Peaks of the first `parts` channels of a smoothed confidence stack.
pub fn extract_peaks(heatmaps: ArrayView3<'_, f32>, parts: usize, scale: f64, threshold: f32) -> Vec<Vec<Peak>> {
    heatmaps
        .axis_iter(Axis(0))
        .take(parts)
        .enumerate()
        .map(|(part, plane)| {
            let suppressed = non_max_suppression(plane, scale, threshold);
            let peaks = maximum_filter(suppressed.view(), threshold);

            log::trace!("part {}: {} peaks", part, peaks.len());

            peaks
        })
        .collect()
}

#[test]
fn adaptive_threshold_test() {
    let flat = Array3::from_elem((2, 4, 4), 0.01f32);
    assert_eq!(adaptive_threshold(flat.view(), 4.0, 0.1, 0.3), 0.1);

    let mid = Array3::from_elem((2, 4, 4), 0.05f32);
    assert!((adaptive_threshold(mid.view(), 4.0, 0.1, 0.3) - 0.2).abs() < 1e-6);

    let hot = Array3::from_elem((2, 4, 4), 0.5f32);
    assert_eq!(adaptive_threshold(hot.view(), 4.0, 0.1, 0.3), 0.3);
}

#[test]
fn scales_test() {
    let s = scales(46.0, 54.0, 0.709, 5.0);

    assert!((s[0] - 2.4).abs() < 1e-9);
    assert!((s[1] - 2.4 * 0.709).abs() < 1e-9);
    assert!(s.windows(2).all(|w| w[0] > w[1]));
    assert!(scales(4.0, 4.0, 0.709, 5.0).is_empty());
}

#[test]
fn single_spike_test() {
    let mut plane = Array2::from_elem((20, 24), 0.05f32);
    plane[(7, 11)] = 0.9;

    let suppressed = non_max_suppression(plane.view(), 2.4, 0.1);
    let peaks = maximum_filter(suppressed.view(), 0.1);

    assert_eq!(peaks, vec![Peak::new(7, 11)]);
}

#[test]
fn neighbours_are_suppressed_test() {
    let mut plane = Array2::zeros((20, 20));
    plane[(10, 10)] = 1.0f32;
    plane[(10, 11)] = 0.8;
    plane[(11, 10)] = 0.8;
    plane[(12, 12)] = 0.6;
    // far enough to get its own box
    plane[(2, 2)] = 0.5;

    let peaks = maximum_filter(non_max_suppression(plane.view(), 2.4, 0.1).view(), 0.1);

    assert_eq!(peaks, vec![Peak::new(2, 2), Peak::new(10, 10)]);
}

#[test]
fn equal_neighbours_are_deterministic_test() {
    let mut plane = Array2::zeros((16, 16));
    plane[(5, 5)] = 0.7f32;
    plane[(5, 6)] = 0.7;

    let first = maximum_filter(non_max_suppression(plane.view(), 2.4, 0.1).view(), 0.1);
    let second = maximum_filter(non_max_suppression(plane.view(), 2.4, 0.1).view(), 0.1);

    assert_eq!(first, second);
    assert_eq!(first, vec![Peak::new(5, 5)]);
}

#[test]
fn kept_peaks_are_capped_by_rows_test() {
    let mut plane = Array2::zeros((3, 60));
    for col in (0..60).step_by(10) {
        plane[(1, col)] = 0.5f32 + col as f32 / 100.0;
    }

    let peaks = maximum_filter(non_max_suppression(plane.view(), 2.4, 0.1).view(), 0.1);

    assert_eq!(peaks.len(), 3);
    assert_eq!(peaks, vec![Peak::new(1, 30), Peak::new(1, 40), Peak::new(1, 50)]);
}

#[test]
fn extract_peaks_per_part_test() {
    let mut maps = Array3::zeros((3, 12, 12));
    maps[(0, 3, 3)] = 0.8f32;
    maps[(1, 6, 9)] = 0.8;
    maps[(1, 2, 1)] = 0.4;

    let peaks = extract_peaks(maps.view(), 2, 2.4, 0.1);

    assert_eq!(peaks.len(), 2);
    assert_eq!(peaks[0], vec![Peak::new(3, 3)]);
    assert_eq!(peaks[1], vec![Peak::new(2, 1), Peak::new(6, 9)]);
}
