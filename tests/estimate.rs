mod common;

use ndarray::prelude::*;
use openpose::error::Error;
use openpose::pose::CocoPart;
use openpose::{
    ClusterStrategy, FaceBoxMode, Human, MapShape, NearLimbRule, NormPadding, PoseConfig, PoseEstimator, Rect,
};

use common::{CannedNetwork, PERSON};

const FULL_SCORE: f32 = 19.0 * (10.0 + 1.0) / 18.0;

fn assert_person(human: &Human, offset: usize, rows: usize, cols: usize) {
    assert_eq!(human.part_count(), 18);
    assert!((human.score() - FULL_SCORE).abs() < 1e-3, "score {}", human.score());

    for &(part, x, y) in PERSON.iter() {
        let found = human.part(part).unwrap();

        assert!((found.point.x - (x + offset) as f64 / cols as f64).abs() < 1e-9, "{:?}", part);
        assert!((found.point.y - y as f64 / rows as f64).abs() < 1e-9, "{:?}", part);
        assert!((found.score - 1.0).abs() < 1e-5);
    }
}

#[test]
fn single_person_test() -> anyhow::Result<()> {
    let mut estimator = PoseEstimator::new(PoseConfig::default(), CannedNetwork::new(64, 64, &[0]))?;

    let humans = estimator.estimate(&(), NormPadding::identity())?;

    assert_eq!(estimator.network().calls, 1);
    assert_eq!(humans.len(), 1);
    assert_person(&humans[0], 0, 64, 64);

    Ok(())
}

#[test]
fn two_people_test() -> anyhow::Result<()> {
    let mut estimator = PoseEstimator::new(PoseConfig::default(), CannedNetwork::new(64, 128, &[0, 64]))?;

    let humans = estimator.estimate(&(), NormPadding::identity())?;

    assert_eq!(humans.len(), 2);
    assert_person(&humans[0], 0, 64, 128);
    assert_person(&humans[1], 64, 64, 128);

    Ok(())
}

#[test]
fn variants_agree_test() -> anyhow::Result<()> {
    let network = CannedNetwork::new(64, 128, &[0, 64]);
    let output = network.output.clone();

    let baseline = PoseEstimator::new(PoseConfig::default(), network)?
        .estimate_from_maps(output.pafs.view(), output.heatmaps.view(), NormPadding::identity())?;

    let variants = vec![
        PoseConfig { clustering: ClusterStrategy::UnionFind, ..PoseConfig::default() },
        PoseConfig { near_limb_rule: NearLimbRule::Uniform, ..PoseConfig::default() },
    ];

    for config in variants {
        let estimator = PoseEstimator::new(config, CannedNetwork::new(64, 128, &[0, 64]))?;
        let humans = estimator.estimate_from_maps(output.pafs.view(), output.heatmaps.view(), NormPadding::identity())?;

        assert_eq!(humans.len(), baseline.len());

        for (human, expected) in humans.iter().zip(baseline.iter()) {
            assert!(human.parts().eq(expected.parts()));
            assert!((human.score() - expected.score()).abs() < 1e-4);
        }
    }

    Ok(())
}

#[test]
fn empty_maps_test() -> anyhow::Result<()> {
    let estimator = PoseEstimator::new(PoseConfig::default(), CannedNetwork::new(64, 64, &[]))?;

    let pafs = Array3::<f32>::zeros((38, 64, 64));
    let heatmaps = Array3::<f32>::zeros((19, 64, 64));

    assert!(estimator.estimate_from_maps(pafs.view(), heatmaps.view(), NormPadding::identity())?.is_empty());

    Ok(())
}

#[test]
fn partial_person_is_rejected_test() -> anyhow::Result<()> {
    let network = CannedNetwork::new(64, 64, &[0]);
    let mut output = network.output.clone();

    // keep the head only: two connections are too few for a human
    let head = [CocoPart::Nose, CocoPart::Neck, CocoPart::REye];

    for channel in 0..output.heatmaps.len_of(Axis(0)) {
        if !head.iter().any(|part| part.index() == channel) {
            output.heatmaps.index_axis_mut(Axis(0), channel).fill(0.0);
        }
    }

    let estimator = PoseEstimator::new(PoseConfig::default(), network)?;
    let humans = estimator.estimate_from_maps(output.pafs.view(), output.heatmaps.view(), NormPadding::identity())?;

    assert!(humans.is_empty());

    let lenient = PoseConfig { min_subset_count: 2, ..PoseConfig::default() };
    let estimator = PoseEstimator::new(lenient, CannedNetwork::new(64, 64, &[0]))?;
    let humans = estimator.estimate_from_maps(output.pafs.view(), output.heatmaps.view(), NormPadding::identity())?;

    assert_eq!(humans.len(), 1);
    assert_eq!(humans[0].part_count(), 3);

    Ok(())
}

#[test]
fn padding_test() -> anyhow::Result<()> {
    let mut estimator = PoseEstimator::new(PoseConfig::default(), CannedNetwork::new(64, 64, &[0]))?;

    let humans = estimator.estimate(&(), NormPadding::new(1.0, 0.5))?;
    let nose = humans[0].part(CocoPart::Nose).unwrap();

    assert!((nose.point.x - 0.5).abs() < 1e-9);
    assert!((nose.point.y - 0.3125).abs() < 1e-9);

    Ok(())
}

#[test]
fn boxes_test() -> anyhow::Result<()> {
    let mut estimator = PoseEstimator::new(PoseConfig::default(), CannedNetwork::new(64, 64, &[0]))?;

    let humans = estimator.estimate(&(), NormPadding::identity())?;
    let threshold = estimator.config().part_confidence_threshold;

    assert_eq!(humans[0].face_box(640.0, 640.0, FaceBoxMode::Centered, threshold), Rect::new(320, 122, 128, 128));
    assert_eq!(humans[0].upper_body_box(640.0, 640.0, threshold), Rect::new(320, 190, 208, 380));

    Ok(())
}

#[test]
fn shape_mismatch_test() {
    let mut network = CannedNetwork::new(64, 64, &[0]);
    network.shape = MapShape { heatmap_channels: 17, ..network.shape };

    assert!(matches!(
        PoseEstimator::new(PoseConfig::default(), network),
        Err(Error::ShapeMismatch(_))
    ));

    let estimator = PoseEstimator::new(PoseConfig::default(), CannedNetwork::new(64, 64, &[0])).unwrap();
    let pafs = Array3::<f32>::zeros((38, 32, 32));
    let heatmaps = Array3::<f32>::zeros((19, 32, 32));

    assert!(matches!(
        estimator.estimate_from_maps(pafs.view(), heatmaps.view(), NormPadding::identity()),
        Err(Error::ShapeMismatch(_))
    ));
}

#[test]
fn invalid_config_test() {
    let config = PoseConfig { gaussian_kernel_size: 6, ..PoseConfig::default() };

    assert!(matches!(
        PoseEstimator::new(config, CannedNetwork::new(64, 64, &[0])),
        Err(Error::InvalidConfig(_))
    ));
}
