use ndarray::prelude::*;
use openpose::pose::{CocoPart, COCO_PAIRS, COCO_PAIRS_NETWORK};
use openpose::{
    FaceBoxMode, MapShape, ModelSize, NetworkOutput, NormPadding, PoseConfig, PoseEstimator, PoseNetwork,
};

const ROWS: usize = 64;
const COLS: usize = 128;
const PEAK: f32 = 15.0;

// (part, x, y) of an upright figure in a 64x64 cell
const FIGURE: [(CocoPart, usize, usize); 18] = [
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

/// Stands in for a real model: draws a figure at each column offset.
struct StickFigures {
    offsets: Vec<usize>,
}

impl PoseNetwork for StickFigures {
    type Input = ();
    type Error = std::io::Error;

    fn output_shape(&self) -> MapShape {
        MapShape::coco(ROWS, COLS)
    }

    fn infer(&mut self, _: &()) -> Result<NetworkOutput, Self::Error> {
        let shape = self.output_shape();
        let mut heatmaps = Array3::zeros((shape.heatmap_channels, ROWS, COLS));
        let mut pafs = Array3::zeros((shape.paf_channels, ROWS, COLS));

        for &offset in &self.offsets {
            for &(part, x, y) in FIGURE.iter() {
                heatmaps[(part.index(), y, x + offset)] = PEAK;
            }
        }

        let position = |part: CocoPart| FIGURE[part.index()];

        for (&(a, b), &(cx, cy)) in COCO_PAIRS.iter().zip(COCO_PAIRS_NETWORK.iter()) {
            let (_, xa, ya) = position(a);
            let (_, xb, yb) = position(b);

            let (dx, dy) = (xb as f32 - xa as f32, yb as f32 - ya as f32);
            let norm = (dx * dx + dy * dy).sqrt();

            pafs.index_axis_mut(Axis(0), cx).fill(dx / norm);
            pafs.index_axis_mut(Axis(0), cy).fill(dy / norm);
        }

        Ok(NetworkOutput { pafs, heatmaps })
    }
}

fn main() -> anyhow::Result<()> {
    let config = PoseConfig::new();
    let threshold = config.part_confidence_threshold;

    let network = StickFigures { offsets: vec![0, 64] };
    let mut estimator = PoseEstimator::new(config, network)?;

    // pretend a 1280x720 frame was letterboxed into the network input
    let padding = NormPadding::letterbox(1280.0, 720.0, ModelSize::DEFAULT);
    let humans = estimator.estimate(&(), padding)?;

    println!("{} humans", humans.len());

    for (idx, human) in humans.iter().enumerate() {
        println!("human #{}: {} parts, score {:.3}", idx, human.part_count(), human.score());

        for part in human.parts() {
            println!("  {:?}: ({:.3}, {:.3}) {:.2}", part.part, part.point.x, part.point.y, part.score);
        }

        println!("  face {:?}", human.face_box(1280.0, 720.0, FaceBoxMode::TopLeft, threshold));
        println!("  upper body {:?}", human.upper_body_box(1280.0, 720.0, threshold));
        println!("  {}", serde_json::to_string(human)?);
    }

    Ok(())
}
