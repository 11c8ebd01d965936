use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pose::{CocoPart, Connection, NormPadding, Point, MPII_PART_PAIRS};

/// A located body part in normalized image coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPart {
    pub part: CocoPart,
    pub point: Point,
    pub score: f32,
}

impl BodyPart {
    #[inline]
    pub fn new(part: CocoPart, point: Point, score: f32) -> Self {
        Self { part, point, score }
    }
}

///
/// One assembled skeleton.
///
/// Holds at most one `BodyPart` per part type, only for parts seen in one of
/// the connections it was built from, plus the aggregate score.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Human {
    parts: BTreeMap<CocoPart, BodyPart>,
    score: f32,
}

impl Human {
    ///
    /// Build a human from the connections of one cluster.
    ///
    /// Both endpoints of every connection are written in order, so a later
    /// connection overwrites an earlier one for the same part type. The score
    /// is the sum of `connection.score + destination part score` divided by
    /// the final part count.
    ///
    pub fn from_connections(connections: &[Connection], rows: usize, cols: usize, norm_padding: NormPadding) -> Self {
        let mut parts = BTreeMap::new();
        let mut score = 0.0f32;

        for conn in connections {
            for end in 0..2 {
                let part = BodyPart::new(
                    conn.parts[end],
                    norm_padding.normalize(conn.coords[end], rows, cols),
                    conn.part_scores[end],
                );

                parts.insert(part.part, part);
            }

            score += conn.score + conn.part_scores[1];
        }

        if !parts.is_empty() {
            score /= parts.len() as f32;
        }

        Self { parts, score }
    }

    /// Human made of already located parts; later duplicates win.
    pub fn from_parts<I: IntoIterator<Item = BodyPart>>(parts: I, score: f32) -> Self {
        Self {
            parts: parts.into_iter().map(|p| (p.part, p)).collect(),
            score,
        }
    }

    #[inline]
    pub fn score(&self) -> f32 {
        self.score
    }

    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn has_part(&self, part: CocoPart) -> bool {
        self.parts.contains_key(&part)
    }

    #[inline]
    pub fn part(&self, part: CocoPart) -> Option<&BodyPart> {
        self.parts.get(&part)
    }

    /// Parts in `CocoPart` order.
    #[inline]
    pub fn parts(&self) -> impl Iterator<Item = &BodyPart> + '_ {
        self.parts.values()
    }

    /// Best part confidence, zero for an empty human.
    pub fn max_part_score(&self) -> f32 {
        self.parts.values().fold(0.0, |acc, p| acc.max(p.score))
    }

    /// Points and visibility flags in MPII part order.
    pub fn mpii_points(&self) -> (Vec<Point>, Vec<bool>) {
        MPII_PART_PAIRS
            .iter()
            .map(|&(_, coco)| match self.parts.get(&coco) {
                Some(part) => (part.point, true),
                None => (Point::default(), false),
            })
            .unzip()
    }
}

#[cfg(test)]
use crate::pose::Peak;

#[cfg(test)]
fn limb(a: CocoPart, pa: (usize, usize), b: CocoPart, pb: (usize, usize), scores: [f32; 2], score: f32) -> Connection {
    Connection {
        parts: [a, b],
        coords: [Peak::new(pa.0, pa.1), Peak::new(pb.0, pb.1)],
        idx: [0, 0],
        part_scores: scores,
        score,
        samples: 10,
    }
}

#[test]
fn from_connections_test() {
    let conns = vec![
        limb(CocoPart::Neck, (10, 20), CocoPart::RShoulder, (10, 10), [0.9, 0.8], 6.0),
        limb(CocoPart::RShoulder, (10, 10), CocoPart::RElbow, (20, 8), [0.8, 0.7], 5.0),
    ];

    let human = Human::from_connections(&conns, 40, 40, NormPadding::identity());

    assert_eq!(human.part_count(), 3);
    assert!(human.has_part(CocoPart::RElbow));
    assert!(!human.has_part(CocoPart::Nose));
    assert!(((6.0 + 0.8 + 5.0 + 0.7) / 3.0 - human.score()).abs() < 1e-6);

    let neck = human.part(CocoPart::Neck).unwrap();
    assert_eq!(neck.point, Point::new(0.5, 0.25));
    assert_eq!(neck.score, 0.9);
    assert_eq!(human.max_part_score(), 0.9);

    let order: Vec<_> = human.parts().map(|p| p.part).collect();
    assert_eq!(order, vec![CocoPart::Neck, CocoPart::RShoulder, CocoPart::RElbow]);
}

#[test]
fn last_write_wins_test() {
    let conns = vec![
        limb(CocoPart::Neck, (10, 20), CocoPart::Nose, (4, 20), [0.9, 0.6], 6.0),
        limb(CocoPart::Neck, (12, 22), CocoPart::LShoulder, (12, 30), [0.4, 0.5], 5.0),
    ];

    let human = Human::from_connections(&conns, 40, 40, NormPadding::identity());

    let neck = human.part(CocoPart::Neck).unwrap();
    assert_eq!(neck.point, Point::new(22.0 / 40.0, 12.0 / 40.0));
    assert_eq!(neck.score, 0.4);
}

#[test]
fn padding_is_applied_test() {
    let conns = vec![limb(CocoPart::Neck, (10, 20), CocoPart::Nose, (5, 20), [0.9, 0.6], 6.0)];
    let human = Human::from_connections(&conns, 40, 40, NormPadding::new(1.0, 0.5));

    assert_eq!(human.part(CocoPart::Neck).unwrap().point, Point::new(0.5, 0.5));
    assert_eq!(human.part(CocoPart::Nose).unwrap().point, Point::new(0.5, 0.25));
}

#[test]
fn mpii_points_test() {
    let conns = vec![limb(CocoPart::Neck, (10, 20), CocoPart::Nose, (4, 20), [0.9, 0.6], 6.0)];
    let human = Human::from_connections(&conns, 40, 40, NormPadding::identity());

    let (points, visible) = human.mpii_points();

    assert_eq!(points.len(), 14);
    assert_eq!(visible[..3], [true, true, false]);
    assert_eq!(points[0], Point::new(0.5, 0.1));
    assert!(points[2].is_zero());
}

#[test]
fn serialize_test() {
    let conns = vec![limb(CocoPart::Neck, (10, 20), CocoPart::Nose, (4, 20), [0.9, 0.6], 6.0)];
    let human = Human::from_connections(&conns, 40, 40, NormPadding::identity());

    let json = serde_json::to_string(&human).unwrap();
    let back: Human = serde_json::from_str(&json).unwrap();

    assert_eq!(back, human);
}
