//! Minimal placement math: 3-vectors and 3x4 coordinate systems.

use serde::{Deserialize, Serialize};

/// A 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3(pub [f64; 3]);

impl Vec3 {
    pub const ZERO: Vec3 = Vec3([0.0; 3]);

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3([
            self.0[0] - other.0[0],
            self.0[1] - other.0[1],
            self.0[2] - other.0[2],
        ])
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.0[0] * other.0[0] + self.0[1] * other.0[1] + self.0[2] * other.0[2]
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3([
            self.0[0] + other.0[0],
            self.0[1] + other.0[1],
            self.0[2] + other.0[2],
        ])
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3([self.0[0] * s, self.0[1] * s, self.0[2] * s])
    }

    pub fn cross(&self, o: &Vec3) -> Vec3 {
        Vec3([
            self.0[1] * o.0[2] - self.0[2] * o.0[1],
            self.0[2] * o.0[0] - self.0[0] * o.0[2],
            self.0[0] * o.0[1] - self.0[1] * o.0[0],
        ])
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len > 0.0 { self.scale(1.0 / len) } else { *self }
    }

    pub fn equals(&self, other: &Vec3, tol: f64) -> bool {
        self.sub(other).length() <= tol
    }
}

impl std::ops::Index<usize> for Vec3 {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

/// A coordinate system stored column-wise: three axis columns followed by
/// the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat34 {
    pub cols: [Vec3; 4],
}

impl Default for Mat34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat34 {
    pub const IDENTITY: Mat34 = Mat34 {
        cols: [
            Vec3([1.0, 0.0, 0.0]),
            Vec3([0.0, 1.0, 0.0]),
            Vec3([0.0, 0.0, 1.0]),
            Vec3([0.0, 0.0, 0.0]),
        ],
    };

    /// An axis-aligned system located at `origin`.
    pub fn at(origin: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = origin;
        m
    }

    pub fn translation(&self) -> Vec3 {
        self.cols[3]
    }

    pub fn axis(&self, i: usize) -> Vec3 {
        self.cols[i]
    }

    /// Row `r` of the matrix as `[c0[r], c1[r], c2[r], origin[r]]`.
    pub fn row(&self, r: usize) -> [f64; 4] {
        [
            self.cols[0].0[r],
            self.cols[1].0[r],
            self.cols[2].0[r],
            self.cols[3].0[r],
        ]
    }

    /// Map a point given in this system to the parent system.
    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        self.cols[0]
            .scale(p[0])
            .add(&self.cols[1].scale(p[1]))
            .add(&self.cols[2].scale(p[2]))
            .add(&self.cols[3])
    }

    /// `self * local`: a system given in `self` coordinates expressed in
    /// the parent system.
    pub fn compose(&self, local: &Mat34) -> Mat34 {
        let mut out = Mat34::IDENTITY;
        for c in 0..3 {
            let v = local.cols[c];
            out.cols[c] = self.cols[0]
                .scale(v[0])
                .add(&self.cols[1].scale(v[1]))
                .add(&self.cols[2].scale(v[2]));
        }
        out.cols[3] = self.transform_point(&local.cols[3]);
        out
    }

    /// A system at `from` with its X axis pointing towards `to`. Y lies in
    /// the global XY plane unless X is parallel to global Z.
    pub fn directed(from: Vec3, to: Vec3) -> Mat34 {
        let x = to.sub(&from).normalized();
        if x.is_zero() {
            return Mat34::at(from);
        }
        let mut y = Vec3::new(0.0, 0.0, 1.0).cross(&x);
        if y.length() < 1.0e-10 {
            y = Vec3::new(0.0, 1.0, 0.0);
        }
        let y = y.normalized();
        Mat34 {
            cols: [x, y, x.cross(&y), from],
        }
    }

    /// Express `self` in the coordinate system `frame` (orthonormal).
    pub fn relative_to(&self, frame: &Mat34) -> Mat34 {
        let d = self.translation().sub(&frame.translation());
        let mut out = Mat34::IDENTITY;
        for c in 0..3 {
            let col = self.cols[c];
            out.cols[c] = Vec3([
                frame.cols[0].dot(&col),
                frame.cols[1].dot(&col),
                frame.cols[2].dot(&col),
            ]);
        }
        out.cols[3] = Vec3([frame.cols[0].dot(&d), frame.cols[1].dot(&d), frame.cols[2].dot(&d)]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_read_across_columns() {
        let m = Mat34::at(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.row(0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(m.row(2), [0.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn relative_to_shifts_origin() {
        let a = Mat34::at(Vec3::new(5.0, 0.0, 0.0));
        let b = Mat34::at(Vec3::new(2.0, 1.0, 0.0));
        let rel = a.relative_to(&b);
        assert_eq!(rel.translation(), Vec3::new(3.0, -1.0, 0.0));
    }

    #[test]
    fn compose_then_relative_is_identity_on_local() {
        let mut frame = Mat34::at(Vec3::new(1.0, 2.0, 3.0));
        frame.cols[0] = Vec3::new(0.0, 1.0, 0.0);
        frame.cols[1] = Vec3::new(-1.0, 0.0, 0.0);
        let local = Mat34::at(Vec3::new(0.5, 0.0, 0.0));
        let global = frame.compose(&local);
        assert_eq!(global.translation(), Vec3::new(1.0, 2.5, 3.0));
        let back = global.relative_to(&frame);
        assert!(back.translation().equals(&local.translation(), 1e-12));
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        let z = Vec3::new(1.0, 0.0, 0.0).cross(&Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(z, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(Vec3::ZERO.normalized(), Vec3::ZERO);
    }

    #[test]
    fn directed_system_points_along_segment() {
        let m = Mat34::directed(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(m.axis(0), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(m.axis(1), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(m.axis(2), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(m.translation(), Vec3::new(1.0, 0.0, 0.0));

        let up = Mat34::directed(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(up.axis(1), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(Mat34::directed(Vec3::ZERO, Vec3::ZERO), Mat34::IDENTITY);
    }

    #[test]
    fn length_of_difference() {
        let d = Vec3::new(3.0, 4.0, 0.0).sub(&Vec3::ZERO);
        assert_eq!(d.length(), 5.0);
    }
}
