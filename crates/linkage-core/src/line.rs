//! Master lines of prismatic, cylindric and cam joints.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_vec};
use crate::geometry::{Mat34, Vec3};
use crate::id::EntityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineKind {
    /// Straight segments, used by prismatic and cylindric joints.
    #[default]
    Straight,
    /// Cam curve through the master triads.
    CamCurve { looping: bool },
}

/// An ordered sequence of independent triads shared by line joints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineMaster {
    pub kind: LineKind,
    pub triads: Vec<EntityKey>,
}

impl LineMaster {
    pub fn new(kind: LineKind, triads: Vec<EntityKey>) -> Self {
        Self { kind, triads }
    }

    pub fn len(&self) -> usize {
        self.triads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triads.is_empty()
    }

    pub fn is_looping(&self) -> bool {
        matches!(self.kind, LineKind::CamCurve { looping: true })
    }

    pub fn contains(&self, triad: EntityKey) -> bool {
        self.triads.contains(&triad)
    }

    /// Detach one triad, keeping the order of the others.
    pub fn release_triad(&mut self, triad: EntityKey) -> bool {
        let before = self.triads.len();
        self.triads.retain(|t| *t != triad);
        before != self.triads.len()
    }
}

impl References for LineMaster {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        for t in &self.triads {
            f(*t);
        }
    }

    fn release(&mut self, gone: EntityKey) {
        release_vec(&mut self.triads, gone);
    }
}

// ---------------------------------------------------------------------------
// Slider geometry
// ---------------------------------------------------------------------------

/// Cumulative arc length at each point of a polyline, starting at zero.
pub fn slide_values(points: &[Vec3]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            acc += p.sub(&points[i - 1]).length();
        }
        out.push(acc);
    }
    out
}

/// Slide value of the point on the polyline closest to `p`, together
/// with the index of the segment it lies on.
pub fn project_onto(points: &[Vec3], p: &Vec3) -> (f64, usize) {
    if points.len() < 2 {
        return (0.0, 0);
    }
    let slides = slide_values(points);
    let mut best = (f64::INFINITY, 0.0, 0);
    for i in 0..points.len() - 1 {
        let a = points[i];
        let seg = points[i + 1].sub(&a);
        let len2 = seg.dot(&seg);
        let t = if len2 > 0.0 {
            (p.sub(&a).dot(&seg) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let foot = Vec3::new(a[0] + t * seg[0], a[1] + t * seg[1], a[2] + t * seg[2]);
        let dist = p.sub(&foot).length();
        if dist < best.0 {
            best = (dist, slides[i] + t * len2.sqrt(), i);
        }
    }
    (best.1, best.2)
}

/// Point at arc length `slide` along the polyline, clamped to its ends.
pub fn point_at(points: &[Vec3], slide: f64) -> Vec3 {
    let Some(first) = points.first() else {
        return Vec3::ZERO;
    };
    let mut acc = 0.0;
    for pair in points.windows(2) {
        let seg = pair[1].sub(&pair[0]);
        let len = seg.length();
        if len > 0.0 && slide <= acc + len {
            let t = ((slide - acc) / len).max(0.0);
            return pair[0].add(&seg.scale(t));
        }
        acc += len;
    }
    if slide <= 0.0 { *first } else { points[points.len() - 1] }
}

// ---------------------------------------------------------------------------
// Cam curve sections
// ---------------------------------------------------------------------------

/// One chord of a cam curve. Both end systems have Z along the chord and
/// keep the end triad's Y axis as close as possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSection {
    pub start: Mat34,
    pub end: Mat34,
    pub start_slide: f64,
    pub end_slide: f64,
}

/// Chords between consecutive triad systems; a looping curve gets a
/// closing chord back to the first triad.
pub fn curve_sections(frames: &[Mat34], looping: bool) -> Vec<CurveSection> {
    let n = frames.len();
    if n < 2 {
        return Vec::new();
    }
    let count = if looping { n } else { n - 1 };
    let mut out = Vec::with_capacity(count);
    let mut slide = 0.0;
    for i in 0..count {
        let a = &frames[i];
        let b = &frames[(i + 1) % n];
        let chord = b.translation().sub(&a.translation());
        let z = chord.normalized();
        let len = chord.length();
        out.push(CurveSection {
            start: chord_frame(a, &z),
            end: chord_frame(b, &z),
            start_slide: slide,
            end_slide: slide + len,
        });
        slide += len;
    }
    out
}

fn chord_frame(triad: &Mat34, z: &Vec3) -> Mat34 {
    let x = triad.axis(1).cross(z).normalized();
    let y = z.cross(&x);
    Mat34 {
        cols: [x, y, *z, triad.translation()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(3.0, 4.0, 0.0),
            Vec3::new(3.0, 4.0, 2.0),
        ]
    }

    #[test]
    fn arc_length_accumulates() {
        assert_eq!(slide_values(&pts()), vec![0.0, 5.0, 7.0]);
    }

    #[test]
    fn projection_picks_nearest_segment() {
        let (s, seg) = project_onto(&pts(), &Vec3::new(3.5, 4.0, 1.0));
        assert_eq!(seg, 1);
        assert!((s - 6.0).abs() < 1e-12);
    }

    #[test]
    fn projection_clamps_to_ends() {
        let (s, seg) = project_onto(&pts(), &Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!((s, seg), (0.0, 0));
    }

    #[test]
    fn point_at_interpolates_and_clamps() {
        assert_eq!(point_at(&pts(), 2.5), Vec3::new(1.5, 2.0, 0.0));
        assert_eq!(point_at(&pts(), 6.0), Vec3::new(3.0, 4.0, 1.0));
        assert_eq!(point_at(&pts(), 99.0), Vec3::new(3.0, 4.0, 2.0));
        assert_eq!(point_at(&pts(), -1.0), Vec3::ZERO);
        assert_eq!(point_at(&[], 1.0), Vec3::ZERO);
    }

    #[test]
    fn open_curve_has_one_section_less_than_triads() {
        let frames: Vec<Mat34> = pts().into_iter().map(Mat34::at).collect();
        let sections = curve_sections(&frames, false);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].start_slide, 5.0);
        assert_eq!(sections[1].end_slide, 7.0);
        assert_eq!(sections[1].start.axis(2), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(curve_sections(&frames, true).len(), 3);
    }

    #[test]
    fn section_frames_are_orthonormal() {
        let frames = [Mat34::at(Vec3::ZERO), Mat34::at(Vec3::new(2.0, 0.0, 0.0))];
        let s = curve_sections(&frames, false)[0];
        assert_eq!(s.start.axis(2), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(s.start.axis(0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(s.start.axis(1), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(s.end.translation(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn release_keeps_order() {
        let mut sm: slotmap::SlotMap<EntityKey, ()> = slotmap::SlotMap::with_key();
        let keys: Vec<EntityKey> = (0..3).map(|_| sm.insert(())).collect();
        let mut line = LineMaster::new(LineKind::Straight, keys.clone());
        assert!(line.release_triad(keys[1]));
        assert_eq!(line.triads, vec![keys[0], keys[2]]);
        assert!(!line.release_triad(keys[1]));
    }
}
