//! External loads and prescribed motions.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_opt, visit_opt};
use crate::geometry::Vec3;
use crate::id::EntityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadKind {
    #[default]
    Force,
    Moment,
}

impl LoadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadKind::Force => "force",
            LoadKind::Moment => "moment",
        }
    }
}

/// Force or moment applied at a triad. The direction runs from `from`
/// to `to`; each point may be expressed relative to a part or a triad.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Load {
    pub kind: LoadKind,
    pub triad: Option<EntityKey>,
    pub from: Vec3,
    pub from_ref: Option<EntityKey>,
    pub to: Vec3,
    pub to_ref: Option<EntityKey>,
    pub magnitude: f64,
    pub engine: Option<EntityKey>,
}

impl References for Load {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.triad, f);
        visit_opt(&self.from_ref, f);
        visit_opt(&self.to_ref, f);
        visit_opt(&self.engine, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.triad, gone);
        release_opt(&mut self.from_ref, gone);
        release_opt(&mut self.to_ref, gone);
        release_opt(&mut self.engine, gone);
    }
}

/// Load on one DOF of a triad or joint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DofLoad {
    pub owner: Option<EntityKey>,
    pub dof: usize,
    pub value: f64,
    pub engine: Option<EntityKey>,
}

impl References for DofLoad {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.owner, f);
        visit_opt(&self.engine, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.owner, gone);
        release_opt(&mut self.engine, gone);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionType {
    #[default]
    Deflection,
    Velocity,
    Acceleration,
}

impl MotionType {
    pub fn as_str(self) -> &'static str {
        match self {
            MotionType::Deflection => "deflection",
            MotionType::Velocity => "velocity",
            MotionType::Acceleration => "acceleration",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        [MotionType::Deflection, MotionType::Velocity, MotionType::Acceleration]
            .into_iter()
            .find(|m| m.as_str() == text)
    }
}

/// Prescribed motion on one DOF of a triad or joint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DofMotion {
    pub owner: Option<EntityKey>,
    pub dof: usize,
    pub motion_type: MotionType,
    pub value: f64,
    pub engine: Option<EntityKey>,
}

impl References for DofMotion {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.owner, f);
        visit_opt(&self.engine, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.owner, gone);
        release_opt(&mut self.engine, gone);
    }
}
