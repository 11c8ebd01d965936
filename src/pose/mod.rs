pub mod clustering;
pub mod combinations;
pub mod connection;
pub mod gaussian;
pub mod geometry;
pub mod human;
pub mod normalize;
pub mod peaks;
pub mod pipeline;

pub use clustering::{ClusterStrategy, EndpointKey};
pub use combinations::CombinatorialIter;
pub use connection::{Connection, NearLimbRule};
pub use gaussian::GaussianKernel;
pub use geometry::FaceBoxMode;
pub use human::{BodyPart, Human};
pub use normalize::{ModelSize, NormPadding};
pub use peaks::Peak;
pub use pipeline::Pipeline;

use serde::{Deserialize, Serialize};

pub const TOTAL_BODY_PARTS: usize = 18;

/// Number of limb types, one pair of PAF channels each.
pub const TOTAL_LIMBS: usize = 19;

/// COCO body parts in network channel order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CocoPart {
    Nose,
    Neck,
    RShoulder,
    RElbow,
    RWrist,
    LShoulder,
    LElbow,
    LWrist,
    RHip,
    RKnee,
    RAnkle,
    LHip,
    LKnee,
    LAnkle,
    REye,
    LEye,
    REar,
    LEar,
}

impl CocoPart {
    pub const ALL: [CocoPart; TOTAL_BODY_PARTS] = [
        CocoPart::Nose,
        CocoPart::Neck,
        CocoPart::RShoulder,
        CocoPart::RElbow,
        CocoPart::RWrist,
        CocoPart::LShoulder,
        CocoPart::LElbow,
        CocoPart::LWrist,
        CocoPart::RHip,
        CocoPart::RKnee,
        CocoPart::RAnkle,
        CocoPart::LHip,
        CocoPart::LKnee,
        CocoPart::LAnkle,
        CocoPart::REye,
        CocoPart::LEye,
        CocoPart::REar,
        CocoPart::LEar,
    ];

    /// Heatmap channel of this part.
    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// MPII body parts, used when exporting skeletons in MPII order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MpiiPart {
    RAnkle,
    RKnee,
    RHip,
    LHip,
    LKnee,
    LAnkle,
    RWrist,
    RElbow,
    RShoulder,
    LShoulder,
    LElbow,
    LWrist,
    Neck,
    Head,
}

pub const MPII_PART_PAIRS: [(MpiiPart, CocoPart); 14] = [
    (MpiiPart::Head, CocoPart::Nose),
    (MpiiPart::Neck, CocoPart::Neck),
    (MpiiPart::RShoulder, CocoPart::RShoulder),
    (MpiiPart::RElbow, CocoPart::RElbow),
    (MpiiPart::RWrist, CocoPart::RWrist),
    (MpiiPart::LShoulder, CocoPart::LShoulder),
    (MpiiPart::LElbow, CocoPart::LElbow),
    (MpiiPart::LWrist, CocoPart::LWrist),
    (MpiiPart::RHip, CocoPart::RHip),
    (MpiiPart::RKnee, CocoPart::RKnee),
    (MpiiPart::RAnkle, CocoPart::RAnkle),
    (MpiiPart::LHip, CocoPart::LHip),
    (MpiiPart::LKnee, CocoPart::LKnee),
    (MpiiPart::LAnkle, CocoPart::LAnkle),
];

/// Limb types as (source, destination) part pairs.
pub const COCO_PAIRS: [(CocoPart, CocoPart); TOTAL_LIMBS] = [
    (CocoPart::Neck, CocoPart::RShoulder),
    (CocoPart::Neck, CocoPart::LShoulder),
    (CocoPart::RShoulder, CocoPart::RElbow),
    (CocoPart::RElbow, CocoPart::RWrist),
    (CocoPart::LShoulder, CocoPart::LElbow),
    (CocoPart::LElbow, CocoPart::LWrist),
    (CocoPart::Neck, CocoPart::RHip),
    (CocoPart::RHip, CocoPart::RKnee),
    (CocoPart::RKnee, CocoPart::RAnkle),
    (CocoPart::Neck, CocoPart::LHip),
    (CocoPart::LHip, CocoPart::LKnee),
    (CocoPart::LKnee, CocoPart::LAnkle),
    (CocoPart::Neck, CocoPart::Nose),
    (CocoPart::Nose, CocoPart::REye),
    (CocoPart::REye, CocoPart::REar),
    (CocoPart::Nose, CocoPart::LEye),
    (CocoPart::LEye, CocoPart::LEar),
    (CocoPart::RShoulder, CocoPart::REar),
    (CocoPart::LShoulder, CocoPart::LEar),
];

/// PAF (x, y) channel indices for each entry of `COCO_PAIRS`.
pub const COCO_PAIRS_NETWORK: [(usize, usize); TOTAL_LIMBS] = [
    (12, 13),
    (20, 21),
    (14, 15),
    (16, 17),
    (22, 23),
    (24, 25),
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (8, 9),
    (10, 11),
    (28, 29),
    (30, 31),
    (34, 35),
    (32, 33),
    (36, 37),
    (18, 19),
    (26, 27),
];

/// Limbs worth drawing; the shoulder-ear pairs are left out.
pub const COCO_PAIRS_RENDER: &[(CocoPart, CocoPart)] = &[
    (CocoPart::Neck, CocoPart::RShoulder),
    (CocoPart::Neck, CocoPart::LShoulder),
    (CocoPart::RShoulder, CocoPart::RElbow),
    (CocoPart::RElbow, CocoPart::RWrist),
    (CocoPart::LShoulder, CocoPart::LElbow),
    (CocoPart::LElbow, CocoPart::LWrist),
    (CocoPart::Neck, CocoPart::RHip),
    (CocoPart::RHip, CocoPart::RKnee),
    (CocoPart::RKnee, CocoPart::RAnkle),
    (CocoPart::Neck, CocoPart::LHip),
    (CocoPart::LHip, CocoPart::LKnee),
    (CocoPart::LKnee, CocoPart::LAnkle),
    (CocoPart::Neck, CocoPart::Nose),
    (CocoPart::Nose, CocoPart::REye),
    (CocoPart::REye, CocoPart::REar),
    (CocoPart::Nose, CocoPart::LEye),
    (CocoPart::LEye, CocoPart::LEar),
];

/// Number of PAF channels the limb table addresses.
#[inline]
pub fn paf_channels() -> usize {
    COCO_PAIRS_NETWORK
        .iter()
        .map(|&(x, y)| x.max(y) + 1)
        .max()
        .unwrap_or(0)
}

/// Point in normalized `[0, 1]` image space (or pixel space once projected).
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline(always)]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x <= 1e-15 && self.y <= 1e-15
    }
}

/// Integer rectangle `(x, y, w, h)`; the zero rectangle means "no result".
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect { x: 0, y: 0, w: 0, h: 0 };

    #[inline(always)]
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    #[inline(always)]
    pub fn area(&self) -> i32 {
        self.w * self.h
    }

    /// Zero width or height.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

#[test]
fn part_tables_test() {
    assert_eq!(CocoPart::ALL.len(), TOTAL_BODY_PARTS);
    for (idx, part) in CocoPart::ALL.iter().enumerate() {
        assert_eq!(part.index(), idx);
        assert_eq!(CocoPart::from_index(idx), Some(*part));
    }
    assert_eq!(CocoPart::from_index(TOTAL_BODY_PARTS), None);

    assert_eq!(paf_channels(), 38);
    assert_eq!(COCO_PAIRS_RENDER, &COCO_PAIRS[..TOTAL_LIMBS - 2]);

    let mut channels: Vec<usize> = COCO_PAIRS_NETWORK
        .iter()
        .flat_map(|&(x, y)| vec![x, y])
        .collect();
    channels.sort();
    channels.dedup();
    assert_eq!(channels.len(), 38);
}
