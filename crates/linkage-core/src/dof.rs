//! Degree-of-freedom vocabulary shared by triads and joints.

use serde::{Deserialize, Serialize};

pub const X_TRANS: usize = 0;
pub const Y_TRANS: usize = 1;
pub const Z_TRANS: usize = 2;
pub const X_ROT: usize = 3;
pub const Y_ROT: usize = 4;
pub const Z_ROT: usize = 5;
pub const MAX_DOF: usize = 6;

/// Short DOF names used as model-file key prefixes.
pub const DOF_NAMES: [&str; MAX_DOF] = ["TX", "TY", "TZ", "RX", "RY", "RZ"];

/// Six-entry DOF mask.
pub type DofMask = [bool; MAX_DOF];

// ---------------------------------------------------------------------------
// DofStatus
// ---------------------------------------------------------------------------

/// Status of one DOF. The declaration order is significant: statuses at
/// or beyond [`DofStatus::SpringConstrained`] activate springs and dampers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum DofStatus {
    #[default]
    Free,
    Fixed,
    Prescribed,
    FreeDynamics,
    SpringConstrained,
    SpringDynamics,
}

impl DofStatus {
    pub const ALL: [DofStatus; 6] = [
        DofStatus::Free,
        DofStatus::Fixed,
        DofStatus::Prescribed,
        DofStatus::FreeDynamics,
        DofStatus::SpringConstrained,
        DofStatus::SpringDynamics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DofStatus::Free => "FREE",
            DofStatus::Fixed => "FIXED",
            DofStatus::Prescribed => "PRESCRIBED",
            DofStatus::FreeDynamics => "FREE_DYNAMICS",
            DofStatus::SpringConstrained => "SPRING_CONSTRAINED",
            DofStatus::SpringDynamics => "SPRING_CONSTR_DYN",
        }
    }

    pub fn parse(text: &str) -> Option<DofStatus> {
        Self::ALL.into_iter().find(|s| s.as_str() == text)
    }

    /// Boundary code written to `BC =` fields: 0 fixed, 1 free,
    /// 2 fixed in statics only.
    pub fn code(self) -> i32 {
        match self {
            DofStatus::Fixed => 0,
            DofStatus::FreeDynamics | DofStatus::SpringDynamics => 2,
            _ => 1,
        }
    }

    pub fn is_spring_active(self) -> bool {
        self >= DofStatus::SpringConstrained
    }
}

// ---------------------------------------------------------------------------
// Rotation parameterisation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RotFormulation {
    #[default]
    FollowerAxis,
    OrthogonalAxis,
    RotAxis,
}

impl RotFormulation {
    pub const ALL: [RotFormulation; 3] = [
        RotFormulation::FollowerAxis,
        RotFormulation::OrthogonalAxis,
        RotFormulation::RotAxis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RotFormulation::FollowerAxis => "FOLLOWER_AXIS",
            RotFormulation::OrthogonalAxis => "ORTHOGONAL_AXIS",
            RotFormulation::RotAxis => "ROT_AXIS",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == text)
    }

    /// Reference-frame codes for the three rotation variables.
    pub fn frame_codes(self) -> [i32; 3] {
        match self {
            RotFormulation::RotAxis => [1, 1, 1],
            RotFormulation::FollowerAxis => [3, 2, 1],
            RotFormulation::OrthogonalAxis => [1, 2, 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RotSequence {
    #[default]
    Zyx,
    Yxz,
    Xzy,
    Xyz,
    Yzx,
    Zxy,
}

impl RotSequence {
    pub const ALL: [RotSequence; 6] = [
        RotSequence::Zyx,
        RotSequence::Yxz,
        RotSequence::Xzy,
        RotSequence::Xyz,
        RotSequence::Yzx,
        RotSequence::Zxy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RotSequence::Zyx => "rZYX",
            RotSequence::Yxz => "rYXZ",
            RotSequence::Xzy => "rXZY",
            RotSequence::Xyz => "rXYZ",
            RotSequence::Yzx => "rYZX",
            RotSequence::Zxy => "rZXY",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == text)
    }

    /// Rotation DOF indices in application order.
    pub fn axes(self) -> [usize; 3] {
        match self {
            RotSequence::Zyx => [Z_ROT, Y_ROT, X_ROT],
            RotSequence::Yxz => [Y_ROT, X_ROT, Z_ROT],
            RotSequence::Xzy => [X_ROT, Z_ROT, Y_ROT],
            RotSequence::Xyz => [X_ROT, Y_ROT, Z_ROT],
            RotSequence::Yzx => [Y_ROT, Z_ROT, X_ROT],
            RotSequence::Zxy => [Z_ROT, X_ROT, Y_ROT],
        }
    }
}

/// Resolve a formulation and sequence into `(dof, frame code)` pairs.
/// The rotational-vector formulation ignores the sequence.
pub fn rotation_var_defs(formulation: RotFormulation, sequence: RotSequence) -> [(usize, i32); 3] {
    let axes = match formulation {
        RotFormulation::RotAxis => [X_ROT, Y_ROT, Z_ROT],
        _ => sequence.axes(),
    };
    let codes = formulation.frame_codes();
    [(axes[0], codes[0]), (axes[1], codes[1]), (axes[2], codes[2])]
}

// ---------------------------------------------------------------------------
// Spring coupling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpringCoupling {
    #[default]
    None,
    CylindricalZ,
    CylindricalX,
    CylindricalY,
    Spherical,
}

impl SpringCoupling {
    pub const ALL: [SpringCoupling; 5] = [
        SpringCoupling::None,
        SpringCoupling::CylindricalZ,
        SpringCoupling::CylindricalX,
        SpringCoupling::CylindricalY,
        SpringCoupling::Spherical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SpringCoupling::None => "None",
            SpringCoupling::CylindricalZ => "Cylindrical Z",
            SpringCoupling::CylindricalX => "Cylindrical X",
            SpringCoupling::CylindricalY => "Cylindrical Y",
            SpringCoupling::Spherical => "Spherical",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == text)
    }

    /// Name used in solver input records.
    pub fn solver_name(self) -> &'static str {
        match self {
            SpringCoupling::None => "NONE",
            SpringCoupling::CylindricalZ => "CYLINDRIC_Z",
            SpringCoupling::CylindricalX => "CYLINDRIC_X",
            SpringCoupling::CylindricalY => "CYLINDRIC_Y",
            SpringCoupling::Spherical => "SPHERICAL",
        }
    }
}

// ---------------------------------------------------------------------------
// Multi-turn rotation bookkeeping
// ---------------------------------------------------------------------------

/// Wrap an angle into (-pi, pi].
pub fn normalize_angle(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut a = angle % two_pi;
    if a > std::f64::consts::PI {
        a -= two_pi;
    } else if a <= -std::f64::consts::PI {
        a += two_pi;
    }
    a
}

/// Quadrant correction for an accumulated angle: +1 beyond pi, -1 beyond
/// -pi (up to one extra turn), otherwise 0.
pub fn rotation_quadrant(angle: f64) -> i32 {
    let turns = angle / std::f64::consts::PI;
    if turns > 1.0 && turns < 2.0 {
        1
    } else if turns < -1.0 && turns > -2.0 {
        -1
    } else {
        0
    }
}
