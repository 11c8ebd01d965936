use ndarray::prelude::*;

use crate::deep::MapShape;
use crate::error::Error;
use crate::pose::{
    clustering, connection, peaks, Connection, GaussianKernel, Human, NormPadding, Peak, COCO_PAIRS,
    COCO_PAIRS_NETWORK, TOTAL_BODY_PARTS,
};
use crate::PoseConfig;

/// NMS cell size, the numerator of the fallback box scale.
const FALLBACK_SCALE_BASE: f64 = 12.0;

///
/// Post-processing from network maps to humans.
///
/// Built once per network output shape: the configuration is validated and
/// the smoothing kernel prepared up front, `run` only reads the maps.
///
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PoseConfig,
    kernel: GaussianKernel,
    shape: MapShape,
    nms_scale: f64,
}

impl Pipeline {
    pub fn new(config: PoseConfig, shape: MapShape) -> Result<Self, Error> {
        config.validate()?;
        shape.validate()?;

        let kernel = GaussianKernel::new(config.gaussian_kernel_size, config.gaussian_sigma)?;

        let nms_scale = peaks::scales(shape.rows as f64, shape.cols as f64, config.scale_factor, config.min_size)
            .first()
            .copied()
            .unwrap_or(FALLBACK_SCALE_BASE / config.min_size);

        log::debug!(
            "pipeline for {}x{} maps ({} heatmap, {} PAF channels), nms scale {:.3}",
            shape.rows,
            shape.cols,
            shape.heatmap_channels,
            shape.paf_channels,
            nms_scale
        );

        Ok(Self {
            config,
            kernel,
            shape,
            nms_scale,
        })
    }

    #[inline]
    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    #[inline]
    pub fn shape(&self) -> MapShape {
        self.shape
    }

    /// Smooth the confidence maps and pick the peaks of every part.
    pub fn find_peaks(&self, heatmaps: ArrayView3<'_, f32>) -> (Array3<f32>, Vec<Vec<Peak>>) {
        let smoothed = self.kernel.apply(heatmaps);

        let threshold = peaks::adaptive_threshold(
            smoothed.view(),
            self.config.nms_mean_multiplier,
            self.config.nms_threshold_floor,
            self.config.nms_threshold_cap,
        );

        let found = peaks::extract_peaks(smoothed.view(), TOTAL_BODY_PARTS, self.nms_scale, threshold);

        log::debug!(
            "peak threshold {:.3}, {} peaks",
            threshold,
            found.iter().map(|p| p.len()).sum::<usize>()
        );

        (smoothed, found)
    }

    /// Score and greedily match the candidates of every limb type.
    pub fn connect(
        &self,
        pafs: ArrayView3<'_, f32>,
        smoothed: ArrayView3<'_, f32>,
        peaks: &[Vec<Peak>],
    ) -> Vec<Connection> {
        let scoring = self.config.limb_scoring();
        let mut connections = Vec::new();

        for (&(part_a, part_b), &(paf_x, paf_y)) in COCO_PAIRS.iter().zip(COCO_PAIRS_NETWORK.iter()) {
            let (peaks_a, peaks_b) = (&peaks[part_a.index()], &peaks[part_b.index()]);

            if peaks_a.is_empty() || peaks_b.is_empty() {
                continue;
            }

            let candidates = connection::score_candidates(
                (part_a, part_b),
                peaks_a,
                peaks_b,
                pafs.index_axis(Axis(0), paf_x),
                pafs.index_axis(Axis(0), paf_y),
                smoothed,
                &scoring,
            );

            let total = candidates.len();
            let matched = connection::greedy_match(candidates);

            log::trace!("{:?}-{:?}: {} candidates, {} matched", part_a, part_b, total, matched.len());

            connections.extend(matched);
        }

        log::debug!("{} connections", connections.len());

        connections
    }

    ///
    /// Run the whole post-processing on one network output.
    ///
    /// Maps must match the shape the pipeline was built for.
    ///
    pub fn run(
        &self,
        pafs: ArrayView3<'_, f32>,
        heatmaps: ArrayView3<'_, f32>,
        norm_padding: NormPadding,
    ) -> Result<Vec<Human>, Error> {
        self.shape.check(pafs, heatmaps)?;

        let (smoothed, peaks) = self.find_peaks(heatmaps);
        let connections = self.connect(pafs, smoothed.view(), &peaks);

        let clusters = clustering::join_connections(&connections, self.config.clustering);

        Ok(clustering::connections_to_humans(
            clusters,
            self.shape.rows,
            self.shape.cols,
            norm_padding,
            &self.config.cluster_filter(),
        ))
    }
}

#[cfg(test)]
fn spike_maps(shape: MapShape, spikes: &[(usize, usize, usize)]) -> Array3<f32> {
    let mut maps = Array3::zeros((shape.heatmap_channels, shape.rows, shape.cols));

    for &(part, row, col) in spikes {
        maps[(part, row, col)] = 15.0;
    }

    maps
}

#[test]
fn find_peaks_test() {
    let shape = MapShape::coco(32, 32);
    let pipeline = Pipeline::new(PoseConfig::default(), shape).unwrap();

    let heat = spike_maps(shape, &[(0, 10, 12), (0, 24, 20), (3, 16, 16)]);
    let (smoothed, peaks) = pipeline.find_peaks(heat.view());

    assert_eq!(smoothed.dim(), heat.dim());
    assert_eq!(peaks.len(), TOTAL_BODY_PARTS);
    assert_eq!(peaks[0], vec![Peak::new(10, 12), Peak::new(24, 20)]);
    assert_eq!(peaks[3], vec![Peak::new(16, 16)]);
    assert!(peaks[1].is_empty());
}

#[test]
fn connect_single_limb_test() {
    let shape = MapShape::coco(32, 32);
    let pipeline = Pipeline::new(PoseConfig::default(), shape).unwrap();

    // right shoulder left of the neck, limb field pointing left
    let heat = spike_maps(shape, &[(1, 10, 20), (2, 10, 12)]);
    let mut pafs = Array3::zeros((shape.paf_channels, shape.rows, shape.cols));
    pafs.index_axis_mut(Axis(0), 12).fill(-1.0);

    let (smoothed, peaks) = pipeline.find_peaks(heat.view());
    let conns = pipeline.connect(pafs.view(), smoothed.view(), &peaks);

    assert_eq!(conns.len(), 1);
    assert_eq!(conns[0].coords, [Peak::new(10, 20), Peak::new(10, 12)]);
    assert_eq!(conns[0].samples, 10);
    assert!((conns[0].score - 10.0).abs() < 1e-4);
}

#[test]
fn run_rejects_wrong_maps_test() {
    let shape = MapShape::coco(32, 32);
    let pipeline = Pipeline::new(PoseConfig::default(), shape).unwrap();

    let pafs = Array3::<f32>::zeros((38, 32, 32));
    let heat = Array3::<f32>::zeros((19, 16, 32));

    assert!(matches!(
        pipeline.run(pafs.view(), heat.view(), NormPadding::identity()),
        Err(Error::ShapeMismatch(_))
    ));
}

#[test]
fn run_on_empty_maps_test() {
    let shape = MapShape::coco(32, 32);
    let pipeline = Pipeline::new(PoseConfig::default(), shape).unwrap();

    let pafs = Array3::<f32>::zeros((38, 32, 32));
    let heat = Array3::<f32>::zeros((19, 32, 32));

    let humans = pipeline.run(pafs.view(), heat.view(), NormPadding::identity()).unwrap();
    assert!(humans.is_empty());
}
