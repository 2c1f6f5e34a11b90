//! Model-level settings and solver-file emission options.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

/// Settings owned by the model context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanismSettings {
    /// Model file name written into the solver heading.
    pub model_file: String,
    pub gravity: Vec3,
    /// Initial velocity applied to triads without their own.
    pub init_vel: Vec3,
    /// Quasi-static analysis rejects velocity and acceleration motions.
    pub quasi_static: bool,
    /// Distance below which two positions are considered equal.
    pub position_tolerance: f64,
}

impl Default for MechanismSettings {
    fn default() -> Self {
        Self {
            model_file: String::new(),
            gravity: Vec3::new(0.0, 0.0, -9.81),
            init_vel: Vec3::ZERO,
            quasi_static: false,
            position_tolerance: 1.0e-4,
        }
    }
}

/// Options for writing a solver input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Prefix applied to relative file names of device functions, tires
    /// and roads.
    pub rel_path_correction: String,
    /// Suffix of the temporary file renamed into place on success.
    pub tmp_suffix: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            rel_path_correction: String::new(),
            tmp_suffix: ".tmp".into(),
        }
    }
}

impl EmitOptions {
    /// Resolve `file` against the relative-path correction unless it is
    /// absolute or empty.
    pub fn correct_path(&self, file: &str) -> String {
        if file.is_empty() || self.rel_path_correction.is_empty() || is_absolute(file) {
            return file.to_string();
        }
        let mut out = self.rel_path_correction.clone();
        if !out.ends_with('/') && !out.ends_with('\\') {
            out.push('/');
        }
        out.push_str(file);
        out
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
        || path.starts_with('\\')
        || (path.len() > 1 && path.as_bytes()[1] == b':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gravity_points_down() {
        let s = MechanismSettings::default();
        assert_eq!(s.gravity, Vec3::new(0.0, 0.0, -9.81));
        assert!(!s.quasi_static);
    }

    #[test]
    fn path_correction_skips_absolute() {
        let opts = EmitOptions {
            rel_path_correction: "../model".into(),
            ..EmitOptions::default()
        };
        assert_eq!(opts.correct_path("data/f.asc"), "../model/data/f.asc");
        assert_eq!(opts.correct_path("/abs/f.asc"), "/abs/f.asc");
        assert_eq!(opts.correct_path("C:/f.asc"), "C:/f.asc");
        assert_eq!(opts.correct_path(""), "");
        assert_eq!(EmitOptions::default().correct_path("f.asc"), "f.asc");
    }
}
