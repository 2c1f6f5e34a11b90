//! Joints: closed variant set, per-DOF status and child slots.

use serde::{Deserialize, Serialize};

use crate::dof::{
    DofMask, DofStatus, MAX_DOF, RotFormulation, RotSequence, SpringCoupling, X_ROT, X_TRANS,
    Y_ROT, Y_TRANS, Z_ROT, Z_TRANS, normalize_angle, rotation_quadrant,
};
use crate::entity::{References, release_all, release_opt, visit_all, visit_opt};
use crate::geometry::Mat34;
use crate::id::EntityKey;

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointVariant {
    Rigid,
    /// `tz_dof` makes the Z translation a legal DOF.
    Revolute { tz_dof: bool },
    Ball,
    Free,
    Prismatic,
    /// A screw transmission couples Z rotation to Z translation.
    Cylindric { screw_ratio: Option<f64> },
    Cam {
        thickness: f64,
        width: f64,
        radial: bool,
    },
}

impl JointVariant {
    pub fn name(&self) -> &'static str {
        match self {
            JointVariant::Rigid => "RIGID",
            JointVariant::Revolute { .. } => "REVOLUTE",
            JointVariant::Ball => "BALL",
            JointVariant::Free => "FREE",
            JointVariant::Prismatic => "PRISMATIC",
            JointVariant::Cylindric { .. } => "CYLINDRIC",
            JointVariant::Cam { .. } => "CAM",
        }
    }

    /// Line joints slide along a master line of two or more triads.
    pub fn is_line(&self) -> bool {
        matches!(
            self,
            JointVariant::Prismatic | JointVariant::Cylindric { .. } | JointVariant::Cam { .. }
        )
    }

    pub fn legal_mask(&self) -> DofMask {
        let mut mask = [false; MAX_DOF];
        match self {
            JointVariant::Rigid => {}
            JointVariant::Revolute { tz_dof } => {
                mask[Z_ROT] = true;
                mask[Z_TRANS] = *tz_dof;
            }
            JointVariant::Ball => {
                mask[X_ROT] = true;
                mask[Y_ROT] = true;
                mask[Z_ROT] = true;
            }
            JointVariant::Free | JointVariant::Cam { .. } => mask = [true; MAX_DOF],
            JointVariant::Prismatic => mask[Z_TRANS] = true,
            JointVariant::Cylindric { .. } => {
                mask[Z_TRANS] = true;
                mask[Z_ROT] = true;
            }
        }
        mask
    }

    fn default_status(&self, dof: usize) -> DofStatus {
        match self {
            JointVariant::Cam { .. } if dof == X_TRANS || dof == Y_TRANS => {
                DofStatus::SpringConstrained
            }
            _ => DofStatus::Free,
        }
    }
}

// ---------------------------------------------------------------------------
// Joint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub variant: JointVariant,
    /// Joint coordinate system in global coordinates.
    pub placement: Mat34,
    /// Dependent triad.
    pub slave: Option<EntityKey>,
    /// Independent triad of point joints.
    pub master: Option<EntityKey>,
    /// Master line of line joints.
    pub line: Option<EntityKey>,
    status: [DofStatus; MAX_DOF],
    pub springs: [Option<EntityKey>; MAX_DOF],
    pub dampers: [Option<EntityKey>; MAX_DOF],
    pub motions: [Option<EntityKey>; MAX_DOF],
    pub loads: [Option<EntityKey>; MAX_DOF],
    pub friction: Option<EntityKey>,
    /// DOF the friction acts on.
    pub friction_dof: usize,
    init_vel: Vec<f64>,
    init_acc: Vec<f64>,
    /// Initial joint variables; rotations are kept in (-pi, pi].
    variables: [f64; MAX_DOF],
    quadrants: [i32; 3],
    pub rot_formulation: RotFormulation,
    pub rot_sequence: RotSequence,
    pub rot_coupling: SpringCoupling,
    pub tran_coupling: SpringCoupling,
}

impl Joint {
    pub fn new(variant: JointVariant) -> Self {
        let mut status = [DofStatus::Free; MAX_DOF];
        for (dof, s) in status.iter_mut().enumerate() {
            *s = variant.default_status(dof);
        }
        Self {
            variant,
            placement: Mat34::IDENTITY,
            slave: None,
            master: None,
            line: None,
            status,
            springs: [None; MAX_DOF],
            dampers: [None; MAX_DOF],
            motions: [None; MAX_DOF],
            loads: [None; MAX_DOF],
            friction: None,
            friction_dof: match variant {
                JointVariant::Revolute { .. } | JointVariant::Cylindric { .. } => Z_ROT,
                _ => Z_TRANS,
            },
            init_vel: Vec::new(),
            init_acc: Vec::new(),
            variables: [0.0; MAX_DOF],
            quadrants: [0; 3],
            rot_formulation: RotFormulation::default(),
            rot_sequence: RotSequence::default(),
            rot_coupling: SpringCoupling::default(),
            tran_coupling: SpringCoupling::default(),
        }
    }

    pub fn is_line(&self) -> bool {
        self.variant.is_line()
    }

    pub fn legal_mask(&self) -> DofMask {
        self.variant.legal_mask()
    }

    pub fn is_legal(&self, dof: usize) -> bool {
        dof < MAX_DOF && self.legal_mask()[dof]
    }

    pub fn legal_dofs(&self) -> Vec<usize> {
        (0..MAX_DOF).filter(|d| self.is_legal(*d)).collect()
    }

    /// Status of `dof`; illegal DOFs read as FIXED.
    pub fn status(&self, dof: usize) -> DofStatus {
        if self.is_legal(dof) {
            self.status[dof]
        } else {
            DofStatus::Fixed
        }
    }

    /// Assign a status to a legal DOF. Illegal DOFs are left untouched.
    pub fn set_status(&mut self, dof: usize, status: DofStatus) -> bool {
        if !self.is_legal(dof) {
            return false;
        }
        self.status[dof] = status;
        true
    }

    pub fn has_constraints(&self, fixed_only: bool) -> bool {
        self.legal_dofs().into_iter().any(|d| match self.status[d] {
            DofStatus::Fixed | DofStatus::FreeDynamics | DofStatus::SpringDynamics => true,
            DofStatus::Prescribed => !fixed_only,
            _ => false,
        })
    }

    pub fn init_vel(&self, dof: usize) -> f64 {
        self.init_value(&self.init_vel, dof)
    }

    pub fn init_acc(&self, dof: usize) -> f64 {
        self.init_value(&self.init_acc, dof)
    }

    fn init_value(&self, values: &[f64], dof: usize) -> f64 {
        if dof < values.len() && self.is_legal(dof) && self.status[dof] != DofStatus::Fixed {
            values[dof]
        } else {
            0.0
        }
    }

    /// Stored initial velocity regardless of legality, for rigid-joint
    /// releases.
    pub fn raw_init_vel(&self, dof: usize) -> f64 {
        self.init_vel.get(dof).copied().unwrap_or(0.0)
    }

    pub fn raw_init_acc(&self, dof: usize) -> f64 {
        self.init_acc.get(dof).copied().unwrap_or(0.0)
    }

    pub fn set_init_vel(&mut self, dof: usize, value: f64) -> bool {
        let legal = self.is_legal(dof) || matches!(self.variant, JointVariant::Rigid);
        legal && set_lazy(&mut self.init_vel, dof, value)
    }

    pub fn set_init_acc(&mut self, dof: usize, value: f64) -> bool {
        let legal = self.is_legal(dof) || matches!(self.variant, JointVariant::Rigid);
        legal && set_lazy(&mut self.init_acc, dof, value)
    }

    /// Initial joint variable of `dof`, with rotations unwrapped by the
    /// stored quadrant.
    pub fn joint_variable(&self, dof: usize) -> f64 {
        if !self.is_legal(dof) {
            return 0.0;
        }
        if dof >= X_ROT {
            self.variables[dof]
                + 2.0 * std::f64::consts::PI * f64::from(self.quadrants[dof - X_ROT])
        } else {
            self.variables[dof]
        }
    }

    pub fn set_joint_variable(&mut self, dof: usize, value: f64) -> bool {
        if !self.is_legal(dof) {
            return false;
        }
        if dof >= X_ROT {
            self.variables[dof] = normalize_angle(value);
            self.quadrants[dof - X_ROT] = rotation_quadrant(value);
        } else {
            self.variables[dof] = value;
        }
        true
    }

    pub fn quadrant(&self, dof: usize) -> i32 {
        if (X_ROT..MAX_DOF).contains(&dof) {
            self.quadrants[dof - X_ROT]
        } else {
            0
        }
    }

    pub fn spring_at(&self, dof: usize) -> Option<EntityKey> {
        if self.is_legal(dof) { self.springs[dof] } else { None }
    }

    pub fn damper_at(&self, dof: usize) -> Option<EntityKey> {
        if self.is_legal(dof) { self.dampers[dof] } else { None }
    }
}

fn set_lazy(values: &mut Vec<f64>, dof: usize, value: f64) -> bool {
    if dof >= MAX_DOF {
        return false;
    }
    if values.len() <= dof {
        if value == 0.0 {
            return true;
        }
        values.resize(MAX_DOF, 0.0);
    }
    values[dof] = value;
    true
}

impl References for Joint {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.slave, f);
        visit_opt(&self.master, f);
        visit_opt(&self.line, f);
        visit_all(&self.springs, f);
        visit_all(&self.dampers, f);
        visit_all(&self.motions, f);
        visit_all(&self.loads, f);
        visit_opt(&self.friction, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.slave, gone);
        release_opt(&mut self.master, gone);
        release_opt(&mut self.line, gone);
        release_all(&mut self.springs, gone);
        release_all(&mut self.dampers, gone);
        release_all(&mut self.motions, gone);
        release_all(&mut self.loads, gone);
        release_opt(&mut self.friction, gone);
    }
}

// ---------------------------------------------------------------------------
// Higher pairs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionKind {
    Gear,
    RackPinion,
}

impl TransmissionKind {
    pub fn ui_name(self) -> &'static str {
        match self {
            TransmissionKind::Gear => "Gear",
            TransmissionKind::RackPinion => "Rack-and-pinion",
        }
    }
}

/// Kinematic coupling between a DOF of one joint and a DOF of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HigherPair {
    pub kind: TransmissionKind,
    pub input_joint: Option<EntityKey>,
    pub input_dof: i32,
    pub output_joint: Option<EntityKey>,
    pub output_dof: i32,
    pub ratio: f64,
}

impl HigherPair {
    pub fn new(kind: TransmissionKind) -> Self {
        Self {
            kind,
            input_joint: None,
            input_dof: 1,
            output_joint: None,
            output_dof: 1,
            ratio: 1.0,
        }
    }
}

impl References for HigherPair {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.input_joint, f);
        visit_opt(&self.output_joint, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.input_joint, gone);
        release_opt(&mut self.output_joint, gone);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    // -----------------------------------------------------------------------
    // Masks
    // -----------------------------------------------------------------------

    #[test]
    fn revolute_mask_follows_tz_toggle() {
        let plain = JointVariant::Revolute { tz_dof: false }.legal_mask();
        assert_eq!(plain, [false, false, false, false, false, true]);
        let tz = JointVariant::Revolute { tz_dof: true }.legal_mask();
        assert_eq!(tz, [false, false, true, false, false, true]);
    }

    #[test]
    fn variant_masks() {
        assert_eq!(JointVariant::Rigid.legal_mask(), [false; 6]);
        assert_eq!(JointVariant::Free.legal_mask(), [true; 6]);
        assert_eq!(JointVariant::Ball.legal_mask(), [false, false, false, true, true, true]);
        assert_eq!(JointVariant::Prismatic.legal_mask(), [false, false, true, false, false, false]);
        let cyl = JointVariant::Cylindric { screw_ratio: None }.legal_mask();
        assert_eq!(cyl, [false, false, true, false, false, true]);
    }

    #[test]
    fn cam_defaults_to_spring_constrained_in_plane() {
        let j = Joint::new(JointVariant::Cam {
            thickness: 0.1,
            width: 0.2,
            radial: false,
        });
        assert_eq!(j.status(X_TRANS), DofStatus::SpringConstrained);
        assert_eq!(j.status(Y_TRANS), DofStatus::SpringConstrained);
        assert_eq!(j.status(Z_TRANS), DofStatus::Free);
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    #[test]
    fn illegal_dof_reads_fixed_and_refuses_assignment() {
        let mut j = Joint::new(JointVariant::Revolute { tz_dof: false });
        assert_eq!(j.status(X_TRANS), DofStatus::Fixed);
        assert!(!j.set_status(X_TRANS, DofStatus::Free));
        assert_eq!(j.legal_mask(), JointVariant::Revolute { tz_dof: false }.legal_mask());
        assert!(j.set_status(Z_ROT, DofStatus::FreeDynamics));
        assert_eq!(j.status(Z_ROT), DofStatus::FreeDynamics);
    }

    #[test]
    fn constraints_include_spring_dynamics() {
        let mut j = Joint::new(JointVariant::Ball);
        assert!(!j.has_constraints(false));
        j.set_status(Y_ROT, DofStatus::SpringDynamics);
        assert!(j.has_constraints(true));
    }

    #[test]
    fn prescribed_counts_unless_fixed_only() {
        let mut j = Joint::new(JointVariant::Free);
        j.set_status(X_TRANS, DofStatus::Prescribed);
        assert!(j.has_constraints(false));
        assert!(!j.has_constraints(true));
    }

    // -----------------------------------------------------------------------
    // Initial conditions
    // -----------------------------------------------------------------------

    #[test]
    fn init_vel_hidden_when_fixed() {
        let mut j = Joint::new(JointVariant::Revolute { tz_dof: false });
        assert!(j.set_init_vel(Z_ROT, 2.0));
        assert_eq!(j.init_vel(Z_ROT), 2.0);
        j.set_status(Z_ROT, DofStatus::Fixed);
        assert_eq!(j.init_vel(Z_ROT), 0.0);
        assert!(!j.set_init_vel(X_TRANS, 1.0));
    }

    #[test]
    fn rigid_accepts_raw_releases() {
        let mut j = Joint::new(JointVariant::Rigid);
        assert!(j.set_init_vel(X_TRANS, 0.5));
        assert_eq!(j.init_vel(X_TRANS), 0.0);
        assert_eq!(j.raw_init_vel(X_TRANS), 0.5);
    }

    #[test]
    fn joint_variable_unwraps_quadrant() {
        let mut j = Joint::new(JointVariant::Revolute { tz_dof: false });
        assert!(j.set_joint_variable(Z_ROT, 1.5 * PI));
        assert_eq!(j.quadrant(Z_ROT), 1);
        assert!((j.joint_variable(Z_ROT) - 1.5 * PI).abs() < 1e-12);
        assert_eq!(j.joint_variable(Z_TRANS), 0.0);
    }

    #[test]
    fn children_on_illegal_dofs_are_hidden() {
        let mut j = Joint::new(JointVariant::Prismatic);
        let mut sm: slotmap::SlotMap<EntityKey, ()> = slotmap::SlotMap::with_key();
        let k = sm.insert(());
        j.springs[Z_ROT] = Some(k);
        assert_eq!(j.spring_at(Z_ROT), None);
        j.release(k);
        assert_eq!(j.springs[Z_ROT], None);
    }
}
