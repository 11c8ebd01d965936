use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pose::{BodyPart, CocoPart, Human, Point, Rect};

/// Parts whose positions span the face and upper-body extent.
pub const COORD_PARTS: [CocoPart; 10] = [
    CocoPart::Nose,
    CocoPart::Neck,
    CocoPart::RShoulder,
    CocoPart::LShoulder,
    CocoPart::RHip,
    CocoPart::LHip,
    CocoPart::REye,
    CocoPart::LEye,
    CocoPart::REar,
    CocoPart::LEar,
];

/// Fewer visible landmarks than this give no box.
const MIN_LANDMARKS: usize = 5;

/// Form of the rectangle returned by `Human::face_box`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceBoxMode {
    /// `x, y` is the box center.
    Centered,
    /// `x, y` is the top-left corner; at least one eye must be visible.
    TopLeft,
}

#[derive(Debug, Copy, Clone)]
struct Extent {
    x: f64,
    y: f64,
    x2: f64,
    y2: f64,
}

impl Extent {
    fn grow(extent: Option<Extent>, p: Point) -> Extent {
        match extent {
            None => Extent { x: p.x, y: p.y, x2: p.x, y2: p.y },
            Some(e) => Extent {
                x: e.x.min(p.x),
                y: e.y.min(p.y),
                x2: e.x2.max(p.x),
                y2: e.y2.max(p.y),
            },
        }
    }

    // Fit into a `w x h` frame; `None` when nothing is left.
    fn clamp(self, w: f64, h: f64) -> Option<Extent> {
        let x = self.x.max(0.0);
        let y = self.y.max(0.0);
        let x2 = (w - x).min(self.x2 - x) + x;
        let y2 = (h - y).min(self.y2 - y) + y;

        if (x2 - x).round() < 1.0 || (y2 - y).round() < 1.0 {
            return None;
        }

        Some(Extent { x, y, x2, y2 })
    }

    fn centered(&self) -> Rect {
        Rect::new(
            ((self.x + self.x2) / 2.0).round() as i32,
            ((self.y + self.y2) / 2.0).round() as i32,
            (self.x2 - self.x).round() as i32,
            (self.y2 - self.y).round() as i32,
        )
    }

    fn top_left(&self) -> Rect {
        Rect::new(
            self.x.round() as i32,
            self.y.round() as i32,
            (self.x2 - self.x).round() as i32,
            (self.y2 - self.y).round() as i32,
        )
    }
}

// Confident parts and the pixel extent of the confident landmarks.
struct Visible {
    parts: BTreeMap<CocoPart, BodyPart>,
    extent: Option<Extent>,
    landmarks: usize,
}

impl Visible {
    fn collect(human: &Human, img_w: f64, img_h: f64, threshold: f32) -> Self {
        let mut visible = Visible {
            parts: BTreeMap::new(),
            extent: None,
            landmarks: 0,
        };

        for part in human.parts().filter(|p| p.score > threshold) {
            visible.parts.insert(part.part, *part);

            if COORD_PARTS.contains(&part.part) {
                let pixel = Point::new(img_w * part.point.x, img_h * part.point.y);

                visible.extent = Some(Extent::grow(visible.extent, pixel));
                visible.landmarks += 1;
            }
        }

        visible
    }

    #[inline]
    fn get(&self, part: CocoPart) -> Option<&BodyPart> {
        self.parts.get(&part)
    }
}

impl Human {
    ///
    /// Face rectangle in pixels of a `img_w x img_h` image.
    ///
    /// Needs five confident landmarks and a confident nose. The box side is
    /// the largest of the nose-neck, eye-eye and ear-ear based estimates and
    /// is shifted sideways depending on which eyes are seen. Returns
    /// `Rect::ZERO` when any requirement fails or the box leaves the frame.
    ///
    pub fn face_box(&self, img_w: f64, img_h: f64, mode: FaceBoxMode, threshold: f32) -> Rect {
        let visible = Visible::collect(self, img_w, img_h, threshold);

        if visible.landmarks < MIN_LANDMARKS {
            return Rect::ZERO;
        }

        let nose = match visible.get(CocoPart::Nose) {
            Some(nose) => nose.point,
            None => return Rect::ZERO,
        };

        let r_eye = visible.get(CocoPart::REye).map(|p| p.point);
        let l_eye = visible.get(CocoPart::LEye).map(|p| p.point);

        if mode == FaceBoxMode::TopLeft && r_eye.is_none() && l_eye.is_none() {
            return Rect::ZERO;
        }

        let mut size: f64 = 0.0;

        if let Some(neck) = visible.get(CocoPart::Neck) {
            size = size.max(img_h * (neck.point.y - nose.y) * 0.8);
        }

        if let (Some(r), Some(l)) = (r_eye, l_eye) {
            let (dx, dy) = (r.x - l.x, r.y - l.y);
            size = size.max(img_w * (dx * dx + dy * dy).sqrt() * 2.0);
        }

        if let (Some(r), Some(l)) = (visible.get(CocoPart::REar), visible.get(CocoPart::LEar)) {
            size = size.max(img_w * (r.point.x - l.point.x).abs() * 1.6);
        }

        if size <= 1e-15 {
            return Rect::ZERO;
        }

        let shift = match (r_eye.is_some(), l_eye.is_some()) {
            (false, true) => (size / 3.0).floor() * 2.0,
            (true, false) => (size / 3.0).floor(),
            _ => (size / 2.0).floor(),
        };

        let x = nose.x * img_w - shift;
        let y = match mode {
            FaceBoxMode::Centered => nose.y * img_h - (size / 3.0).floor(),
            FaceBoxMode::TopLeft => nose.y * img_h - (size / 2.0 * 1.2).round(),
        };

        let face = Extent { x, y, x2: x + size, y2: y + size };

        match (face.clamp(img_w, img_h), mode) {
            (None, _) => Rect::ZERO,
            (Some(e), FaceBoxMode::Centered) => e.centered(),
            (Some(e), FaceBoxMode::TopLeft) => e.top_left(),
        }
    }

    ///
    /// Upper-body rectangle (centered form) in pixels of a `img_w x img_h` image.
    ///
    /// Starts from the extent of the confident landmarks, raises the top edge
    /// above the face when nose and neck are seen and widens the box using
    /// the shoulders.
    ///
    pub fn upper_body_box(&self, img_w: f64, img_h: f64, threshold: f32) -> Rect {
        let visible = Visible::collect(self, img_w, img_h, threshold);

        let mut body = match visible.extent {
            Some(extent) if visible.landmarks >= MIN_LANDMARKS => extent,
            _ => return Rect::ZERO,
        };

        let neck = visible.get(CocoPart::Neck).map(|p| p.point);

        if let (Some(_), Some(neck)) = (visible.get(CocoPart::Nose), neck) {
            body.y -= (neck.y * img_h - body.y) * 0.8;
        }

        let l_shoulder = visible.get(CocoPart::LShoulder).map(|p| p.point);
        let r_shoulder = visible.get(CocoPart::RShoulder).map(|p| p.point);

        match (l_shoulder, r_shoulder, neck) {
            (Some(_), Some(_), _) => {
                let dx = (body.x2 - body.x) * 0.15;
                body.x -= dx;
                body.x2 += dx;
            }
            (Some(shoulder), None, Some(neck)) | (None, Some(shoulder), Some(neck)) => {
                let half_w = (shoulder.x - neck.x).abs() * img_w * 1.15;
                body.x = body.x.min(neck.x * img_w - half_w);
                body.x2 = body.x2.max(neck.x * img_w + half_w);
            }
            _ => {}
        }

        body.clamp(img_w, img_h)
            .map(|e| e.centered())
            .unwrap_or(Rect::ZERO)
    }
}

#[cfg(test)]
fn person(nose_x: f64, skip: &[CocoPart]) -> Human {
    let parts = vec![
        (CocoPart::Nose, nose_x, 0.375),
        (CocoPart::Neck, 0.5, 0.5),
        (CocoPart::REye, 0.4375, 0.3125),
        (CocoPart::LEye, 0.5625, 0.3125),
        (CocoPart::REar, 0.375, 0.34375),
        (CocoPart::LEar, 0.625, 0.34375),
        (CocoPart::RShoulder, 0.25, 0.5),
        (CocoPart::LShoulder, 0.75, 0.5),
        (CocoPart::RHip, 0.375, 0.875),
        (CocoPart::LHip, 0.625, 0.875),
        (CocoPart::RWrist, 0.1, 0.9),
    ];

    Human::from_parts(
        parts
            .into_iter()
            .map(|(part, x, y)| {
                let score = if skip.contains(&part) { 0.1 } else { 0.9 };
                BodyPart::new(part, Point::new(x, y), score)
            }),
        1.0,
    )
}

#[test]
fn face_box_modes_test() {
    let human = person(0.5, &[]);

    assert_eq!(human.face_box(200.0, 200.0, FaceBoxMode::Centered, 0.3), Rect::new(100, 89, 80, 80));
    assert_eq!(human.face_box(200.0, 200.0, FaceBoxMode::TopLeft, 0.3), Rect::new(60, 27, 80, 80));
}

#[test]
fn face_box_single_eye_shift_test() {
    let human = person(0.5, &[CocoPart::REye]);
    let rect = human.face_box(200.0, 200.0, FaceBoxMode::TopLeft, 0.3);

    // only the left eye: shifted by two thirds of the side
    assert_eq!(rect, Rect::new(48, 27, 80, 80));
}

#[test]
fn face_box_clamped_to_frame_test() {
    let human = person(0.125, &[]);

    assert_eq!(human.face_box(200.0, 200.0, FaceBoxMode::TopLeft, 0.3), Rect::new(0, 27, 65, 80));
}

#[test]
fn face_box_requirements_test() {
    let no_nose = person(0.5, &[CocoPart::Nose]);
    assert_eq!(no_nose.face_box(200.0, 200.0, FaceBoxMode::Centered, 0.3), Rect::ZERO);

    let no_eyes = person(0.5, &[CocoPart::REye, CocoPart::LEye]);
    assert_eq!(no_eyes.face_box(200.0, 200.0, FaceBoxMode::TopLeft, 0.3), Rect::ZERO);
    assert!(!no_eyes.face_box(200.0, 200.0, FaceBoxMode::Centered, 0.3).is_empty());

    let sparse = person(0.5, &[
        CocoPart::Neck,
        CocoPart::RShoulder,
        CocoPart::LShoulder,
        CocoPart::RHip,
        CocoPart::LHip,
        CocoPart::REar,
    ]);
    assert_eq!(sparse.face_box(200.0, 200.0, FaceBoxMode::Centered, 0.3), Rect::ZERO);
}

#[test]
fn upper_body_box_test() {
    let human = person(0.5, &[]);

    assert_eq!(human.upper_body_box(200.0, 200.0, 0.3), Rect::new(100, 104, 130, 143));
}

#[test]
fn upper_body_single_shoulder_test() {
    let human = person(0.5, &[CocoPart::LShoulder]);

    assert_eq!(human.upper_body_box(200.0, 200.0, 0.3), Rect::new(100, 104, 115, 143));
}

#[test]
fn upper_body_degenerate_test() {
    let sparse = person(0.5, &[
        CocoPart::Nose,
        CocoPart::Neck,
        CocoPart::RShoulder,
        CocoPart::LShoulder,
        CocoPart::RHip,
        CocoPart::LHip,
    ]);

    assert_eq!(sparse.upper_body_box(200.0, 200.0, 0.3), Rect::ZERO);
    assert_eq!(Human::default().upper_body_box(200.0, 200.0, 0.3), Rect::ZERO);
}
