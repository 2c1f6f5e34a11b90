//! Springs, dampers, spring characteristics and friction sets.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_all, release_opt, visit_all, visit_opt};
use crate::id::EntityKey;

// ---------------------------------------------------------------------------
// Spring and damper bases
// ---------------------------------------------------------------------------

/// Stiffness data shared by axial and joint springs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpringBase {
    /// Stress-free length (or angle).
    pub init_length: f64,
    pub length_engine: Option<EntityKey>,
    pub stiffness: f64,
    pub function: Option<EntityKey>,
    /// The function gives force rather than stiffness.
    pub force_function: bool,
    pub scale_engine: Option<EntityKey>,
    pub spring_char: Option<EntityKey>,
}

impl SpringBase {
    pub fn with_stiffness(stiffness: f64) -> Self {
        Self {
            stiffness,
            ..Self::default()
        }
    }

    /// Nonzero stiffness from a constant or a function.
    pub fn has_stiffness(&self) -> bool {
        self.function.is_some() || self.stiffness != 0.0
    }

    fn visit(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.length_engine, f);
        visit_opt(&self.function, f);
        visit_opt(&self.scale_engine, f);
        visit_opt(&self.spring_char, f);
    }

    fn drop_ref(&mut self, gone: EntityKey) {
        release_opt(&mut self.length_engine, gone);
        release_opt(&mut self.function, gone);
        release_opt(&mut self.scale_engine, gone);
        release_opt(&mut self.spring_char, gone);
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DamperBase {
    pub coefficient: f64,
    pub function: Option<EntityKey>,
    pub force_function: bool,
    pub scale_engine: Option<EntityKey>,
    /// Damping proportional to deformation velocity.
    pub is_def_damper: bool,
}

impl DamperBase {
    pub fn with_coefficient(coefficient: f64) -> Self {
        Self {
            coefficient,
            ..Self::default()
        }
    }

    pub fn has_coefficient(&self) -> bool {
        self.function.is_some() || self.coefficient != 0.0
    }

    fn visit(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.function, f);
        visit_opt(&self.scale_engine, f);
    }

    fn drop_ref(&mut self, gone: EntityKey) {
        release_opt(&mut self.function, gone);
        release_opt(&mut self.scale_engine, gone);
    }
}

// ---------------------------------------------------------------------------
// Owned springs and dampers
// ---------------------------------------------------------------------------

/// Spring on one DOF of a joint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointSpring {
    pub owner: Option<EntityKey>,
    pub dof: usize,
    pub base: SpringBase,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointDamper {
    pub owner: Option<EntityKey>,
    pub dof: usize,
    pub base: DamperBase,
}

/// Spring acting along the line between two triads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxialSpring {
    pub triads: [Option<EntityKey>; 2],
    pub base: SpringBase,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxialDamper {
    pub triads: [Option<EntityKey>; 2],
    pub base: DamperBase,
}

impl References for JointSpring {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.owner, f);
        self.base.visit(f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.owner, gone);
        self.base.drop_ref(gone);
    }
}

impl References for JointDamper {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.owner, f);
        self.base.visit(f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.owner, gone);
        self.base.drop_ref(gone);
    }
}

impl References for AxialSpring {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_all(&self.triads, f);
        self.base.visit(f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_all(&mut self.triads, gone);
        self.base.drop_ref(gone);
    }
}

impl References for AxialDamper {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_all(&self.triads, f);
        self.base.visit(f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_all(&mut self.triads, gone);
        self.base.drop_ref(gone);
    }
}

// ---------------------------------------------------------------------------
// Spring characteristic
// ---------------------------------------------------------------------------

/// Failure and yield limits shared by one or more springs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpringChar {
    pub deflection_max: Option<f64>,
    pub deflection_min: Option<f64>,
    pub force_max: Option<f64>,
    pub force_min: Option<f64>,
    /// Failure in any direction fails the whole spring.
    pub fail_all: bool,
    pub yield_force_max: Option<f64>,
    pub yield_force_max_engine: Option<EntityKey>,
    pub yield_force_min: Option<f64>,
    pub yield_force_min_engine: Option<EntityKey>,
    pub yield_deflection_max: Option<f64>,
}

impl SpringChar {
    pub fn has_failure(&self) -> bool {
        self.deflection_max.is_some()
            || self.deflection_min.is_some()
            || self.force_max.is_some()
            || self.force_min.is_some()
    }

    pub fn has_yield(&self) -> bool {
        self.yield_force_max.is_some()
            || self.yield_force_min.is_some()
            || self.yield_deflection_max.is_some()
    }
}

impl References for SpringChar {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.yield_force_max_engine, f);
        visit_opt(&self.yield_force_min_engine, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.yield_force_max_engine, gone);
        release_opt(&mut self.yield_force_min_engine, gone);
    }
}

// ---------------------------------------------------------------------------
// Friction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FrictionKind {
    Rotational { radius: f64 },
    Ball { radius: f64, two_param: bool },
    Bearing { radius: f64, capacity: f64, constant: f64 },
    Prismatic { radius: f64, constant: f64 },
    Translational,
    Cam,
}

impl FrictionKind {
    pub fn fsi_name(&self) -> &'static str {
        match self {
            FrictionKind::Rotational { .. } => "ROT_FRICTION",
            FrictionKind::Ball { two_param: true, .. } => "BALL_FRICTION2",
            FrictionKind::Ball { .. } => "BALL_FRICTION",
            FrictionKind::Bearing { .. } => "BEARING_FRICTION",
            FrictionKind::Prismatic { .. } => "PRISMATIC_FRICTION",
            FrictionKind::Translational => "TRANS_FRICTION",
            FrictionKind::Cam => "CAM_FRICTION",
        }
    }

    pub fn type_dep_params(&self) -> Vec<f64> {
        match *self {
            FrictionKind::Rotational { radius } | FrictionKind::Ball { radius, .. } => vec![radius],
            FrictionKind::Bearing {
                radius,
                capacity,
                constant,
            } => vec![radius, capacity, constant],
            FrictionKind::Prismatic { radius, constant } => vec![radius, constant, 0.0],
            FrictionKind::Translational | FrictionKind::Cam => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friction {
    pub kind: FrictionKind,
    pub prestress_load: f64,
    pub coulomb_coeff: f64,
    pub stribeck_magn: f64,
    pub stribeck_speed: f64,
    /// Stiffness of the stick spring; zero disables it.
    pub stick_stiffness: f64,
}

impl Friction {
    pub fn new(kind: FrictionKind) -> Self {
        Self {
            kind,
            prestress_load: 0.0,
            coulomb_coeff: 0.0,
            stribeck_magn: 0.0,
            stribeck_speed: 0.0,
            stick_stiffness: 0.0,
        }
    }
}

impl References for Friction {
    fn for_each_ref(&self, _f: &mut dyn FnMut(EntityKey)) {}

    fn release(&mut self, _gone: EntityKey) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stiffness_from_constant_or_function() {
        assert!(!SpringBase::default().has_stiffness());
        assert!(SpringBase::with_stiffness(1.0e3).has_stiffness());
        let mut sm: slotmap::SlotMap<EntityKey, ()> = slotmap::SlotMap::with_key();
        let f = sm.insert(());
        let base = SpringBase {
            function: Some(f),
            ..SpringBase::default()
        };
        assert!(base.has_stiffness());
    }

    #[test]
    fn char_failure_and_yield_are_independent() {
        let mut c = SpringChar::default();
        assert!(!c.has_failure() && !c.has_yield());
        c.yield_force_max = Some(10.0);
        assert!(c.has_yield());
        assert!(!c.has_failure());
        c.force_min = Some(-5.0);
        assert!(c.has_failure());
    }

    #[test]
    fn friction_names_and_params() {
        let f = FrictionKind::Prismatic {
            radius: 0.1,
            constant: 2.0,
        };
        assert_eq!(f.fsi_name(), "PRISMATIC_FRICTION");
        assert_eq!(f.type_dep_params(), vec![0.1, 2.0, 0.0]);
        assert!(FrictionKind::Cam.type_dep_params().is_empty());
    }

    #[test]
    fn release_clears_owner() {
        let mut sm: slotmap::SlotMap<EntityKey, ()> = slotmap::SlotMap::with_key();
        let j = sm.insert(());
        let mut s = JointSpring {
            owner: Some(j),
            dof: 5,
            base: SpringBase::default(),
        };
        s.release(j);
        assert!(s.owner.is_none());
    }
}
