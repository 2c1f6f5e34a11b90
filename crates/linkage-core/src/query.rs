//! Read-only queries over the model graph.
//!
//! Suppression, chain-joint detection and the "active owner" rules that
//! decide whether a DOF child takes part in the solver input.

use std::collections::BTreeSet;

use crate::dof::DofStatus;
use crate::entity::{EntityData, EntityType};
use crate::id::EntityKey;
use crate::joint::JointVariant;
use crate::model::Model;

impl Model {
    // -----------------------------------------------------------------------
    // Joint classification
    // -----------------------------------------------------------------------

    /// Independent triads of a joint: the line's triads or the single
    /// master.
    pub fn master_triads(&self, joint: EntityKey) -> Vec<EntityKey> {
        let Some(j) = self.joint(joint) else {
            return Vec::new();
        };
        if j.is_line() {
            j.line
                .and_then(|l| self.line_master(l))
                .map(|l| l.triads.clone())
                .unwrap_or_default()
        } else {
            j.master.into_iter().collect()
        }
    }

    /// Free joint flagged `#GlobalSpring`.
    pub fn is_global_spring(&self, joint: EntityKey) -> bool {
        matches!(self.joint(joint).map(|j| j.variant), Some(JointVariant::Free))
            && self.header(joint).is_some_and(|h| h.has_flag("#GlobalSpring"))
    }

    /// Cam joints act as contact elements unless flagged `#MasterSlaveCam`.
    pub fn is_contact_element(&self, joint: EntityKey) -> bool {
        matches!(self.joint(joint).map(|j| j.variant), Some(JointVariant::Cam { .. }))
            && !self.header(joint).is_some_and(|h| h.has_flag("#MasterSlaveCam"))
    }

    /// Free joint flagged `#Axial`, reduced to the single axial DOF. With
    /// `local_dofs` a `#LocalDofs` flag also counts, for positioning only.
    pub fn is_axial_joint(&self, joint: EntityKey, local_dofs: bool) -> bool {
        if !matches!(self.joint(joint).map(|j| j.variant), Some(JointVariant::Free)) {
            return false;
        }
        let Some(h) = self.header(joint) else {
            return false;
        };
        h.has_flag("#Axial") || (local_dofs && h.has_flag("#LocalDofs"))
    }

    /// Joints using `triad` as their dependent triad.
    pub fn joints_with_slave(&self, triad: EntityKey) -> Vec<EntityKey> {
        self.iter()
            .filter(|(_, e)| e.data.as_joint().is_some_and(|j| j.slave == Some(triad)))
            .map(|(k, _)| k)
            .collect()
    }

    /// Whether `triad` is the dependent triad of some joint.
    pub fn is_slave_triad(&self, triad: EntityKey) -> bool {
        !self.joints_with_slave(triad).is_empty()
    }

    /// Whether `triad` is an independent triad of some joint.
    pub fn is_master_triad(&self, triad: EntityKey) -> bool {
        self.keys_of_type(EntityType::Joint)
            .into_iter()
            .any(|j| self.master_triads(j).contains(&triad))
    }

    /// Connected triads attached to `part`, by user id.
    pub fn triads_on_part(&self, part: EntityKey) -> Vec<EntityKey> {
        self.keys_of_type(EntityType::Triad)
            .into_iter()
            .filter(|t| self.triad(*t).is_some_and(|t| t.parts.contains(&part)))
            .collect()
    }

    /// A chain joint has an independent triad that is dependent in
    /// another joint.
    pub fn is_chain_joint(&self, joint: EntityKey) -> bool {
        self.master_triads(joint).into_iter().any(|t| {
            self.joints_with_slave(t).into_iter().any(|other| other != joint)
        })
    }

    /// Connected joints in emission order: plain joints first, chain
    /// joints last, each group by user id.
    pub fn joints_in_emit_order(&self) -> Vec<EntityKey> {
        let (chain, plain): (Vec<_>, Vec<_>) = self
            .keys_of_type(EntityType::Joint)
            .into_iter()
            .partition(|j| self.is_chain_joint(*j));
        plain.into_iter().chain(chain).collect()
    }

    // -----------------------------------------------------------------------
    // Suppression
    // -----------------------------------------------------------------------

    /// A triad is suppressed when it is attached and every part it is
    /// attached to is suppressed.
    pub fn is_triad_suppressed(&self, triad: EntityKey) -> bool {
        let Some(t) = self.triad(triad) else {
            return false;
        };
        !t.parts.is_empty()
            && t.parts.iter().all(|p| self.part(*p).is_some_and(|p| p.suppressed))
    }

    /// A joint is suppressed when both its dependent and independent sides
    /// are.
    pub fn is_joint_suppressed(&self, joint: EntityKey) -> bool {
        let Some(j) = self.joint(joint) else {
            return false;
        };
        let slave_gone = j.slave.is_some_and(|s| self.is_triad_suppressed(s));
        if !slave_gone {
            return false;
        }
        let masters = self.master_triads(joint);
        !masters.is_empty() && masters.iter().all(|m| self.is_triad_suppressed(*m))
    }

    /// Suppression of a DOF owner (triad or joint).
    pub fn is_owner_suppressed(&self, owner: EntityKey) -> bool {
        match self.entity_type(owner) {
            Some(EntityType::Triad) => self.is_triad_suppressed(owner),
            Some(EntityType::Joint) => self.is_joint_suppressed(owner),
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Active owners
    // -----------------------------------------------------------------------

    fn owner_status(&self, owner: EntityKey, dof: usize) -> Option<DofStatus> {
        if let Some(j) = self.joint(owner) {
            return j.is_legal(dof).then(|| j.status(dof));
        }
        let t = self.triad(owner)?;
        t.is_legal(dof).then(|| t.status(dof))
    }

    /// Owner of a joint spring whose DOF is spring-constrained and which has
    /// a stiffness.
    pub fn spring_active_owner(&self, spring: EntityKey) -> Option<EntityKey> {
        let s = self.joint_spring(spring)?;
        let owner = s.owner?;
        let status = self.owner_status(owner, s.dof)?;
        (status.is_spring_active() && s.base.has_stiffness()).then_some(owner)
    }

    /// Like [`Model::spring_active_owner`]; global-spring joints never
    /// carry dampers.
    pub fn damper_active_owner(&self, damper: EntityKey) -> Option<EntityKey> {
        let d = self.joint_damper(damper)?;
        let owner = d.owner?;
        if self.is_global_spring(owner) {
            return None;
        }
        let status = self.owner_status(owner, d.dof)?;
        (status.is_spring_active() && d.base.has_coefficient()).then_some(owner)
    }

    pub fn load_active_owner(&self, load: EntityKey) -> Option<EntityKey> {
        let l = self.dof_load(load)?;
        let owner = l.owner?;
        let status = self.owner_status(owner, l.dof)?;
        if matches!(status, DofStatus::Fixed | DofStatus::Prescribed) {
            return None;
        }
        (l.engine.is_some() || l.value.abs() >= 1.0e-30).then_some(owner)
    }

    pub fn motion_active_owner(&self, motion: EntityKey) -> Option<EntityKey> {
        let m = self.dof_motion(motion)?;
        let owner = m.owner?;
        (self.owner_status(owner, m.dof)? == DofStatus::Prescribed).then_some(owner)
    }

    /// Base id of the joint's DOF child when it is active, else 0.
    pub fn active_spring_id(&self, joint: EntityKey, dof: usize) -> i32 {
        let spring = self.joint(joint).and_then(|j| j.spring_at(dof));
        match spring {
            Some(s) if self.spring_active_owner(s).is_some() => self.base_id(s).0,
            _ => 0,
        }
    }

    pub fn active_damper_id(&self, joint: EntityKey, dof: usize) -> i32 {
        let damper = self.joint(joint).and_then(|j| j.damper_at(dof));
        match damper {
            Some(d) if self.damper_active_owner(d).is_some() => self.base_id(d).0,
            _ => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Engines
    // -----------------------------------------------------------------------

    /// An engine is active when flagged as output or used by something that
    /// is itself active.
    pub fn is_engine_active(&self, engine: EntityKey) -> bool {
        let mut visited = BTreeSet::new();
        self.engine_active_inner(engine, &mut visited)
    }

    fn engine_active_inner(&self, engine: EntityKey, visited: &mut BTreeSet<EntityKey>) -> bool {
        if !visited.insert(engine) {
            return false;
        }
        let Some(e) = self.engine(engine) else {
            return false;
        };
        if e.output {
            return true;
        }
        self.referrers(engine).into_iter().any(|user| {
            let Some(entity) = self.get(user) else {
                return false;
            };
            match &entity.data {
                EntityData::JointSpring(_) => self.spring_active_owner(user).is_some(),
                EntityData::JointDamper(_) => self.damper_active_owner(user).is_some(),
                EntityData::DofLoad(_) => self.load_active_owner(user).is_some(),
                EntityData::DofMotion(_) => self.motion_active_owner(user).is_some(),
                EntityData::Sensor(_) => self
                    .referrers(user)
                    .into_iter()
                    .filter(|k| self.engine(*k).is_some())
                    .any(|k| self.engine_active_inner(k, visited)),
                _ => entity.is_connected(),
            }
        })
    }

    /// Engines whose arguments measure `engine`.
    pub fn engine_dependents(&self, engine: EntityKey) -> Vec<EntityKey> {
        let sensors: Vec<EntityKey> = self
            .iter()
            .filter(|(_, e)| e.data.as_sensor().and_then(|s| s.measured()) == Some(engine))
            .map(|(k, _)| k)
            .collect();
        self.iter()
            .filter(|(_, e)| {
                e.data
                    .as_engine()
                    .is_some_and(|en| sensors.iter().any(|s| en.uses_sensor(*s)))
            })
            .map(|(k, _)| k)
            .collect()
    }
}
