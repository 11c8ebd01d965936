use ndarray::prelude::*;

use crate::error::Error;
use crate::pose::{self, TOTAL_BODY_PARTS};

/// Dimensions of the two dense maps a pose network produces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MapShape {
    /// Confidence channels, one per part (a trailing background channel is allowed).
    pub heatmap_channels: usize,
    /// PAF channels, an (x, y) pair per limb.
    pub paf_channels: usize,
    pub rows: usize,
    pub cols: usize,
}

impl MapShape {
    /// Shape of a COCO network with a background channel.
    #[inline]
    pub fn coco(rows: usize, cols: usize) -> Self {
        Self {
            heatmap_channels: TOTAL_BODY_PARTS + 1,
            paf_channels: pose::paf_channels(),
            rows,
            cols,
        }
    }

    /// Check that the part and limb tables fit into maps of this shape.
    pub fn validate(&self) -> Result<(), Error> {
        if self.heatmap_channels < TOTAL_BODY_PARTS {
            return Err(Error::ShapeMismatch(format!(
                "{} heatmap channels, {} body parts expected", self.heatmap_channels, TOTAL_BODY_PARTS)));
        }

        if self.paf_channels < pose::paf_channels() {
            return Err(Error::ShapeMismatch(format!(
                "{} PAF channels, limb table addresses {}", self.paf_channels, pose::paf_channels())));
        }

        if self.rows == 0 || self.cols == 0 {
            return Err(Error::ShapeMismatch(format!("empty {}x{} maps", self.rows, self.cols)));
        }

        Ok(())
    }

    /// Check a pair of maps against this shape.
    pub fn check(&self, pafs: ArrayView3<'_, f32>, heatmaps: ArrayView3<'_, f32>) -> Result<(), Error> {
        let expected_heat = (self.heatmap_channels, self.rows, self.cols);
        let expected_paf = (self.paf_channels, self.rows, self.cols);

        if heatmaps.dim() != expected_heat {
            return Err(Error::ShapeMismatch(format!("heatmaps {:?}, expected {:?}", heatmaps.dim(), expected_heat)));
        }

        if pafs.dim() != expected_paf {
            return Err(Error::ShapeMismatch(format!("PAFs {:?}, expected {:?}", pafs.dim(), expected_paf)));
        }

        Ok(())
    }
}

/// Raw network output, both maps laid out `[channel][row][col]`.
#[derive(Debug, Clone)]
pub struct NetworkOutput {
    pub pafs: Array3<f32>,
    pub heatmaps: Array3<f32>,
}

///
/// A pose network: turns a preprocessed input into PAF and confidence maps.
///
/// Loading the model, letterboxing the image and running the forward pass
/// all live behind this trait.
///
pub trait PoseNetwork {
    type Input;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Shape of every output of `infer`.
    fn output_shape(&self) -> MapShape;

    fn infer(&mut self, input: &Self::Input) -> Result<NetworkOutput, Self::Error>;
}

#[test]
fn coco_shape_test() {
    let shape = MapShape::coco(46, 54);

    assert_eq!(shape.heatmap_channels, 19);
    assert_eq!(shape.paf_channels, 38);
    assert!(shape.validate().is_ok());

    let pafs = Array3::<f32>::zeros((38, 46, 54));
    let heat = Array3::<f32>::zeros((19, 46, 54));
    assert!(shape.check(pafs.view(), heat.view()).is_ok());

    let short = Array3::<f32>::zeros((19, 46, 50));
    assert!(matches!(shape.check(pafs.view(), short.view()), Err(Error::ShapeMismatch(_))));
}

#[test]
fn invalid_shape_test() {
    let mut shape = MapShape::coco(46, 54);
    shape.heatmap_channels = 17;
    assert!(matches!(shape.validate(), Err(Error::ShapeMismatch(_))));

    let mut shape = MapShape::coco(46, 54);
    shape.paf_channels = 36;
    assert!(shape.validate().is_err());

    assert!(MapShape::coco(0, 54).validate().is_err());
}
