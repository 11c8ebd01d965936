#![allow(dead_code)]

use ndarray::prelude::*;
use openpose::pose::{CocoPart, COCO_PAIRS, COCO_PAIRS_NETWORK};
use openpose::{MapShape, NetworkOutput, PoseNetwork};

/// Confidence written at every part position before smoothing.
pub const SPIKE: f32 = 15.0;

/// One upright person on a 64x64 grid, `(part, x, y)`.
pub const PERSON: [(CocoPart, usize, usize); 18] = [
    (CocoPart::Nose, 32, 10),
    (CocoPart::Neck, 32, 18),
    (CocoPart::RShoulder, 24, 18),
    (CocoPart::RElbow, 20, 28),
    (CocoPart::RWrist, 18, 38),
    (CocoPart::LShoulder, 40, 18),
    (CocoPart::LElbow, 44, 28),
    (CocoPart::LWrist, 46, 38),
    (CocoPart::RHip, 27, 38),
    (CocoPart::RKnee, 27, 48),
    (CocoPart::RAnkle, 27, 58),
    (CocoPart::LHip, 37, 38),
    (CocoPart::LKnee, 37, 48),
    (CocoPart::LAnkle, 37, 58),
    (CocoPart::REye, 30, 8),
    (CocoPart::LEye, 34, 8),
    (CocoPart::REar, 28, 9),
    (CocoPart::LEar, 36, 9),
];

pub fn position(part: CocoPart) -> (usize, usize) {
    PERSON
        .iter()
        .find(|&&(p, _, _)| p == part)
        .map(|&(_, x, y)| (x, y))
        .unwrap()
}

///
/// Maps with a copy of `PERSON` shifted right by each of `offsets`.
///
/// Every part is a single spike in its own channel; every limb field is the
/// unit direction of that limb over the whole map.
///
pub fn synthetic_output(rows: usize, cols: usize, offsets: &[usize]) -> NetworkOutput {
    let shape = MapShape::coco(rows, cols);

    let mut heatmaps = Array3::zeros((shape.heatmap_channels, rows, cols));
    let mut pafs = Array3::zeros((shape.paf_channels, rows, cols));

    for &offset in offsets {
        for &(part, x, y) in PERSON.iter() {
            heatmaps[(part.index(), y, x + offset)] = SPIKE;
        }
    }

    for (&(a, b), &(cx, cy)) in COCO_PAIRS.iter().zip(COCO_PAIRS_NETWORK.iter()) {
        let (xa, ya) = position(a);
        let (xb, yb) = position(b);

        let (dx, dy) = (xb as f32 - xa as f32, yb as f32 - ya as f32);
        let norm = (dx * dx + dy * dy).sqrt();

        pafs.index_axis_mut(Axis(0), cx).fill(dx / norm);
        pafs.index_axis_mut(Axis(0), cy).fill(dy / norm);
    }

    NetworkOutput { pafs, heatmaps }
}

/// Network replaying canned maps.
pub struct CannedNetwork {
    pub shape: MapShape,
    pub output: NetworkOutput,
    pub calls: usize,
}

impl CannedNetwork {
    pub fn new(rows: usize, cols: usize, offsets: &[usize]) -> Self {
        Self {
            shape: MapShape::coco(rows, cols),
            output: synthetic_output(rows, cols, offsets),
            calls: 0,
        }
    }
}

impl PoseNetwork for CannedNetwork {
    type Input = ();
    type Error = std::io::Error;

    fn output_shape(&self) -> MapShape {
        self.shape
    }

    fn infer(&mut self, _: &()) -> Result<NetworkOutput, Self::Error> {
        self.calls += 1;

        Ok(self.output.clone())
    }
}
