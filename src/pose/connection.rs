use std::collections::HashSet;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pose::{CocoPart, EndpointKey, Peak};

/// Limbs that are accepted on sample count alone under `NearLimbRule::CountOnly`.
pub const NEAR_LIMBS: [(CocoPart, CocoPart); 4] = [
    (CocoPart::RShoulder, CocoPart::RElbow),
    (CocoPart::RElbow, CocoPart::RWrist),
    (CocoPart::LShoulder, CocoPart::LElbow),
    (CocoPart::LElbow, CocoPart::LWrist),
];

///
/// Acceptance rule for limb candidates besides the sample count.
///
/// `CountOnly` lets the arm limbs in `NEAR_LIMBS` through on the sample count
/// alone and asks every other limb for a positive score as well. `Uniform`
/// asks every limb for both.
///
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NearLimbRule {
    CountOnly,
    Uniform,
}

impl Default for NearLimbRule {
    fn default() -> Self {
        NearLimbRule::CountOnly
    }
}

impl NearLimbRule {
    pub fn requires_positive_score(self, parts: (CocoPart, CocoPart)) -> bool {
        match self {
            NearLimbRule::Uniform => true,
            NearLimbRule::CountOnly => !NEAR_LIMBS.contains(&parts),
        }
    }
}

/// Scoring parameters of one limb matching pass.
#[derive(Debug, Copy, Clone)]
pub struct LimbScoring {
    /// Points sampled along a candidate segment.
    pub samples: usize,
    /// Minimal PAF projection for a sample to count.
    pub inter_threshold: f32,
    /// Minimal number of counted samples.
    pub min_above_threshold: usize,
    pub near_limb_rule: NearLimbRule,
}

///
/// A limb segment between two peaks.
///
/// Produced as a candidate by `score_candidates`; the ones kept by
/// `greedy_match` are the connections handed to clustering.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub parts: [CocoPart; 2],
    pub coords: [Peak; 2],
    /// Index of each endpoint in its part's peak list.
    pub idx: [usize; 2],
    /// Smoothed confidence at each endpoint.
    pub part_scores: [f32; 2],
    /// Sum of the accepted PAF projections.
    pub score: f32,
    /// Number of accepted samples.
    pub samples: usize,
}

impl Connection {
    #[inline]
    pub fn endpoints(&self) -> [EndpointKey; 2] {
        [
            EndpointKey::new(self.coords[0], self.parts[0]),
            EndpointKey::new(self.coords[1], self.parts[1]),
        ]
    }

    pub fn shares_endpoint(&self, other: &Connection) -> bool {
        let mine = self.endpoints();

        other.endpoints().iter().any(|k| mine.contains(k))
    }
}

///
/// Line integral of a PAF along the segment `p1 -> p2`.
///
/// `samples` points starting at `p1` and stepping by `(p2 - p1) / samples` are
/// rounded to the nearest pixel; an axis on which both endpoints agree is
/// not interpolated. Projections of the field onto the segment direction that
/// exceed `inter_threshold` are summed and counted.
///
/// Returns `(score, count)`; a degenerate segment scores `(0, 0)`.
///
pub fn pair_score(
    p1: Peak,
    p2: Peak,
    paf_x: ArrayView2<'_, f32>,
    paf_y: ArrayView2<'_, f32>,
    samples: usize,
    inter_threshold: f32,
) -> (f32, usize) {
    let (x1, y1) = (p1.col as f64, p1.row as f64);
    let (x2, y2) = (p2.col as f64, p2.row as f64);
    let (dx, dy) = (x2 - x1, y2 - y1);
    let norm = (dx * dx + dy * dy).sqrt();

    if norm < 1e-4 || samples == 0 {
        return (0.0, 0);
    }

    let (vx, vy) = ((dx / norm) as f32, (dy / norm) as f32);
    let (step_x, step_y) = (dx / samples as f64, dy / samples as f64);
    let (rows, cols) = paf_x.dim();

    let mut score = 0.0f32;
    let mut count = 0;
    let (mut xv, mut yv) = (x1, y1);

    for _ in 0..samples {
        let x = ((xv + 0.5).floor() as usize).min(cols - 1);
        let y = ((yv + 0.5).floor() as usize).min(rows - 1);

        let local = paf_x[(y, x)] * vx + paf_y[(y, x)] * vy;
        if local > inter_threshold {
            score += local;
            count += 1;
        }

        if p1.col != p2.col {
            xv += step_x;
        }

        if p1.row != p2.row {
            yv += step_y;
        }
    }

    (score, count)
}

///
/// Score every `(source, destination)` peak pair of one limb type.
///
/// Pairs are visited source-major in peak list order; pairs failing the
/// sample count (and, depending on `scoring.near_limb_rule`, the positive
/// score test) are dropped.
///
pub fn score_candidates(
    parts: (CocoPart, CocoPart),
    peaks_a: &[Peak],
    peaks_b: &[Peak],
    paf_x: ArrayView2<'_, f32>,
    paf_y: ArrayView2<'_, f32>,
    heatmaps: ArrayView3<'_, f32>,
    scoring: &LimbScoring,
) -> Vec<Connection> {
    let needs_positive = scoring.near_limb_rule.requires_positive_score(parts);
    let mut candidates = Vec::with_capacity(peaks_a.len() * peaks_b.len());

    for (idx1, &p1) in peaks_a.iter().enumerate() {
        for (idx2, &p2) in peaks_b.iter().enumerate() {
            let (score, count) = pair_score(p1, p2, paf_x, paf_y, scoring.samples, scoring.inter_threshold);

            if count < scoring.min_above_threshold || (needs_positive && score <= 0.0) {
                continue;
            }

            candidates.push(Connection {
                parts: [parts.0, parts.1],
                coords: [p1, p2],
                idx: [idx1, idx2],
                part_scores: [
                    heatmaps[(parts.0.index(), p1.row, p1.col)],
                    heatmaps[(parts.1.index(), p2.row, p2.col)],
                ],
                score,
                samples: count,
            });
        }
    }

    candidates
}

///
/// Greedy one-to-one assignment of candidates of one limb type.
///
/// Candidates are visited by descending score (stable, so equal scores keep
/// discovery order) and taken when neither endpoint has been used yet.
///
pub fn greedy_match(mut candidates: Vec<Connection>) -> Vec<Connection> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_a = HashSet::new();
    let mut used_b = HashSet::new();

    candidates
        .into_iter()
        .filter(|c| {
            if used_a.contains(&c.idx[0]) || used_b.contains(&c.idx[1]) {
                return false;
            }

            used_a.insert(c.idx[0]);
            used_b.insert(c.idx[1]);

            true
        })
        .collect()
}

#[cfg(test)]
fn uniform_field(rows: usize, cols: usize, vx: f32, vy: f32) -> (Array2<f32>, Array2<f32>) {
    (Array2::from_elem((rows, cols), vx), Array2::from_elem((rows, cols), vy))
}

#[cfg(test)]
fn scoring() -> LimbScoring {
    LimbScoring {
        samples: 10,
        inter_threshold: 0.1,
        min_above_threshold: 6,
        near_limb_rule: NearLimbRule::CountOnly,
    }
}

#[test]
fn aligned_field_scores_every_sample_test() {
    let (px, py) = uniform_field(20, 20, 1.0, 0.0);
    let (score, count) = pair_score(Peak::new(5, 2), Peak::new(5, 15), px.view(), py.view(), 10, 0.1);

    assert_eq!(count, 10);
    assert!((score - 10.0).abs() < 1e-5);

    // the opposite direction projects negatively
    let (score, count) = pair_score(Peak::new(5, 15), Peak::new(5, 2), px.view(), py.view(), 10, 0.1);
    assert_eq!((score, count), (0.0, 0));
}

#[test]
fn degenerate_segment_test() {
    let (px, py) = uniform_field(8, 8, 1.0, 1.0);

    assert_eq!(pair_score(Peak::new(3, 3), Peak::new(3, 3), px.view(), py.view(), 10, 0.1), (0.0, 0));
}

#[test]
fn partially_aligned_segment_test() {
    // field points right only on the left half of the map
    let px = Array2::from_shape_fn((10, 20), |(_, x)| if x < 10 { 1.0f32 } else { 0.0 });
    let py = Array2::zeros((10, 20));

    let (score, count) = pair_score(Peak::new(4, 0), Peak::new(4, 19), px.view(), py.view(), 10, 0.1);

    // samples land on columns 0, 2, 4, 6, 8, 10, ...
    assert_eq!(count, 5);
    assert!((score - 5.0).abs() < 1e-5);
}

#[test]
fn near_limb_rule_test() {
    let arm = (CocoPart::RShoulder, CocoPart::RElbow);
    let torso = (CocoPart::Neck, CocoPart::RHip);

    assert!(!NearLimbRule::CountOnly.requires_positive_score(arm));
    assert!(NearLimbRule::CountOnly.requires_positive_score(torso));
    assert!(NearLimbRule::Uniform.requires_positive_score(arm));
    assert!(NearLimbRule::Uniform.requires_positive_score(torso));
}

#[test]
fn near_limbs_skip_positive_score_test() {
    // every sample projects to -0.05, which a negative threshold still counts
    let (px, py) = uniform_field(20, 20, 0.0, -0.05);
    let heat = Array3::zeros((18, 20, 20));

    let upper = [Peak::new(5, 5)];
    let lower = [Peak::new(15, 5)];

    let candidates = |parts: (CocoPart, CocoPart), rule: NearLimbRule| {
        let scoring = LimbScoring {
            inter_threshold: -0.1,
            near_limb_rule: rule,
            ..scoring()
        };

        score_candidates(parts, &upper, &lower, px.view(), py.view(), heat.view(), &scoring)
    };

    let arm = (CocoPart::RShoulder, CocoPart::RElbow);
    let torso = (CocoPart::Neck, CocoPart::RHip);

    let kept = candidates(arm, NearLimbRule::CountOnly);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].samples, 10);
    assert!((kept[0].score + 0.5).abs() < 1e-5);

    assert!(candidates(arm, NearLimbRule::Uniform).is_empty());
    assert!(candidates(torso, NearLimbRule::CountOnly).is_empty());
    assert!(candidates(torso, NearLimbRule::Uniform).is_empty());
}

#[test]
fn higher_scoring_source_wins_test() {
    // neck peaks at (10, 2) and (10, 5), shoulder at (10, 15); field points right
    // but is weak around the first neck
    let px = Array2::from_shape_fn((20, 20), |(_, x)| if x < 5 { 0.3f32 } else { 1.0 });
    let py = Array2::zeros((20, 20));
    let heat = Array3::from_elem((18, 20, 20), 0.5f32);

    let necks = [Peak::new(10, 2), Peak::new(10, 5)];
    let shoulders = [Peak::new(10, 15)];

    let candidates = score_candidates(
        (CocoPart::Neck, CocoPart::RShoulder),
        &necks,
        &shoulders,
        px.view(),
        py.view(),
        heat.view(),
        &scoring(),
    );
    assert_eq!(candidates.len(), 2);

    let connections = greedy_match(candidates);

    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].coords, [Peak::new(10, 5), Peak::new(10, 15)]);
    assert_eq!(connections[0].idx, [1, 0]);
    assert_eq!(connections[0].part_scores, [0.5, 0.5]);
}

#[test]
fn greedy_keeps_peaks_exclusive_test() {
    let (px, py) = uniform_field(30, 30, 0.0, 1.0);
    let heat = Array3::zeros((18, 30, 30));

    let hips = [Peak::new(5, 5), Peak::new(5, 20)];
    let knees = [Peak::new(20, 5), Peak::new(20, 20)];

    let connections = greedy_match(score_candidates(
        (CocoPart::RHip, CocoPart::RKnee),
        &hips,
        &knees,
        px.view(),
        py.view(),
        heat.view(),
        &scoring(),
    ));

    assert_eq!(connections.len(), 2);
    assert_eq!(connections[0].idx, [0, 0]);
    assert_eq!(connections[1].idx, [1, 1]);
}

#[test]
fn equal_scores_keep_discovery_order_test() {
    let mk = |idx: [usize; 2], score: f32| Connection {
        parts: [CocoPart::Nose, CocoPart::REye],
        coords: [Peak::new(idx[0], 0), Peak::new(idx[1], 1)],
        idx,
        part_scores: [0.0, 0.0],
        score,
        samples: 10,
    };

    let matched = greedy_match(vec![mk([0, 0], 5.0), mk([1, 0], 5.0), mk([1, 1], 4.0)]);

    assert_eq!(matched.iter().map(|c| c.idx).collect::<Vec<_>>(), vec![[0, 0], [1, 1]]);
}

#[test]
fn shares_endpoint_test() {
    let a = Connection {
        parts: [CocoPart::Neck, CocoPart::RShoulder],
        coords: [Peak::new(10, 10), Peak::new(10, 4)],
        idx: [0, 0],
        part_scores: [0.0, 0.0],
        score: 1.0,
        samples: 10,
    };

    let mut b = a.clone();
    b.parts = [CocoPart::RShoulder, CocoPart::RElbow];
    b.coords = [Peak::new(10, 4), Peak::new(16, 3)];
    assert!(a.shares_endpoint(&b));

    // same pixel but another part type is a different endpoint
    b.parts = [CocoPart::LShoulder, CocoPart::LElbow];
    assert!(!a.shares_endpoint(&b));
}
