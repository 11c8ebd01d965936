pub mod deep;
pub mod pose;
pub mod error;

pub use deep::{MapShape, NetworkOutput, PoseNetwork};
pub use pose::{
    BodyPart, ClusterStrategy, CocoPart, FaceBoxMode, Human, ModelSize, NearLimbRule, NormPadding, Pipeline, Point,
    Rect,
};

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use error::Error;
use pose::clustering::ClusterFilter;
use pose::connection::LimbScoring;

///
/// Tunables of the post-processing.
///
/// `Default` carries the values the COCO networks were trained against.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Minimal part score for a part to count as visible in the box helpers.
    pub part_confidence_threshold: f32,
    pub inter_threshold: f32,
    pub inter_min_above_threshold: usize,
    pub nms_threshold_floor: f32,
    pub nms_threshold_cap: f32,
    pub nms_mean_multiplier: f32,
    pub min_subset_count: usize,
    pub min_subset_score: f32,
    pub threshold_human_score: f32,
    pub gaussian_kernel_size: usize,
    pub gaussian_sigma: f64,
    pub paf_samples: usize,
    pub scale_factor: f64,
    pub min_size: f64,
    pub near_limb_rule: NearLimbRule,
    pub clustering: ClusterStrategy,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            part_confidence_threshold: 0.3,
            inter_threshold: 0.1,
            inter_min_above_threshold: 6,
            nms_threshold_floor: 0.1,
            nms_threshold_cap: 0.3,
            nms_mean_multiplier: 4.0,
            min_subset_count: 4,
            min_subset_score: 0.8,
            threshold_human_score: 0.4,
            gaussian_kernel_size: 5,
            gaussian_sigma: 2.5,
            paf_samples: 10,
            scale_factor: 0.709,
            min_size: 5.0,
            near_limb_rule: NearLimbRule::default(),
            clustering: ClusterStrategy::default(),
        }
    }
}

impl PoseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), Error> {
        pose::GaussianKernel::new(self.gaussian_kernel_size, self.gaussian_sigma)?;

        if !(self.nms_threshold_floor >= 0.0 && self.nms_threshold_floor <= self.nms_threshold_cap) {
            return Err(Error::InvalidConfig(format!(
                "nms threshold bounds out of order: floor {}, cap {}",
                self.nms_threshold_floor, self.nms_threshold_cap
            )));
        }

        if !(self.nms_mean_multiplier >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "nms mean multiplier must not be negative, got {}", self.nms_mean_multiplier)));
        }

        if self.paf_samples == 0 {
            return Err(Error::InvalidConfig("paf_samples must be at least 1".into()));
        }

        if self.inter_min_above_threshold > self.paf_samples {
            return Err(Error::InvalidConfig(format!(
                "inter_min_above_threshold {} exceeds paf_samples {}",
                self.inter_min_above_threshold, self.paf_samples
            )));
        }

        if !(self.min_size > 0.0) {
            return Err(Error::InvalidConfig(format!("min_size must be positive, got {}", self.min_size)));
        }

        if !(self.scale_factor > 0.0 && self.scale_factor < 1.0) {
            return Err(Error::InvalidConfig(format!("scale_factor must be in (0, 1), got {}", self.scale_factor)));
        }

        Ok(())
    }

    #[inline]
    pub fn limb_scoring(&self) -> LimbScoring {
        LimbScoring {
            samples: self.paf_samples,
            inter_threshold: self.inter_threshold,
            min_above_threshold: self.inter_min_above_threshold,
            near_limb_rule: self.near_limb_rule,
        }
    }

    #[inline]
    pub fn cluster_filter(&self) -> ClusterFilter {
        ClusterFilter {
            min_subset_count: self.min_subset_count,
            min_subset_score: self.min_subset_score,
            threshold_human_score: self.threshold_human_score,
        }
    }
}

pub struct PoseEstimator<N: PoseNetwork> {
    network: N,
    pipeline: Pipeline,
}

impl<N: PoseNetwork> PoseEstimator<N> {
    pub fn new(config: PoseConfig, network: N) -> Result<Self, Error> {
        let pipeline = Pipeline::new(config, network.output_shape())?;

        Ok(Self { network, pipeline })
    }

    #[inline]
    pub fn config(&self) -> &PoseConfig {
        self.pipeline.config()
    }

    #[inline]
    pub fn network(&self) -> &N {
        &self.network
    }

    #[inline]
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the network on `input` and assemble the humans it sees.
    pub fn estimate(&mut self, input: &N::Input, norm_padding: NormPadding) -> Result<Vec<Human>, Error> {
        let output = self.network.infer(input).map_err(Error::inference)?;

        self.pipeline.run(output.pafs.view(), output.heatmaps.view(), norm_padding)
    }

    /// Assemble humans from maps produced elsewhere.
    pub fn estimate_from_maps(
        &self,
        pafs: ArrayView3<'_, f32>,
        heatmaps: ArrayView3<'_, f32>,
        norm_padding: NormPadding,
    ) -> Result<Vec<Human>, Error> {
        self.pipeline.run(pafs, heatmaps, norm_padding)
    }
}

#[cfg(test)]
struct FailingNetwork;

#[cfg(test)]
impl PoseNetwork for FailingNetwork {
    type Input = ();
    type Error = std::io::Error;

    fn output_shape(&self) -> MapShape {
        MapShape::coco(16, 16)
    }

    fn infer(&mut self, _: &()) -> Result<NetworkOutput, Self::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "device lost"))
    }
}

#[test]
fn config_defaults_test() {
    let config = PoseConfig::new();

    assert_eq!(config.inter_min_above_threshold, 6);
    assert_eq!(config.gaussian_kernel_size, 5);
    assert_eq!(config.near_limb_rule, NearLimbRule::CountOnly);
    assert_eq!(config.clustering, ClusterStrategy::RestartScan);
    assert!(config.validate().is_ok());
}

#[test]
fn config_json_test() -> anyhow::Result<()> {
    let config = PoseConfig {
        threshold_human_score: 0.5,
        clustering: ClusterStrategy::UnionFind,
        ..PoseConfig::default()
    };

    let json = serde_json::to_string(&config)?;
    let back: PoseConfig = serde_json::from_str(&json)?;
    assert_eq!(back, config);

    // missing fields fall back to defaults
    let partial: PoseConfig = serde_json::from_str(r#"{ "min_subset_count": 6 }"#)?;
    assert_eq!(partial.min_subset_count, 6);
    assert_eq!(partial.paf_samples, 10);

    Ok(())
}

#[test]
fn config_validate_test() {
    let even = PoseConfig { gaussian_kernel_size: 4, ..PoseConfig::default() };
    assert!(matches!(even.validate(), Err(Error::InvalidConfig(_))));

    let bounds = PoseConfig { nms_threshold_floor: 0.5, ..PoseConfig::default() };
    assert!(bounds.validate().is_err());

    let samples = PoseConfig { inter_min_above_threshold: 11, ..PoseConfig::default() };
    assert!(samples.validate().is_err());

    let sigma = PoseConfig { gaussian_sigma: 0.0, ..PoseConfig::default() };
    assert!(sigma.validate().is_err());
}

#[test]
fn inference_error_test() {
    let mut estimator = PoseEstimator::new(PoseConfig::default(), FailingNetwork).unwrap();

    let err = estimator.estimate(&(), NormPadding::identity()).unwrap_err();
    assert!(matches!(err, Error::InferenceError(_)));
    assert_eq!(err.to_string(), "Inference Error: device lost");
}
