//! Triads: positioned connection points carrying 0, 3 or 6 DOFs.

use serde::{Deserialize, Serialize};

use crate::dof::{DofStatus, MAX_DOF};
use crate::entity::{References, release_all, release_opt, release_vec, visit_all, visit_opt};
use crate::geometry::Mat34;
use crate::id::EntityKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triad {
    /// Global coordinate system.
    pub placement: Mat34,
    ndofs: usize,
    /// Boundary conditions. Empty means all FREE.
    bc: Vec<DofStatus>,
    /// Additional mass: three translational masses and three inertias.
    pub add_mass: Vec<f64>,
    pub mass_engine: Option<EntityKey>,
    pub inertia_engine: Option<EntityKey>,
    pub init_vel: Vec<f64>,
    pub init_acc: Vec<f64>,
    /// Parts this triad is attached to. Non-owning.
    pub parts: Vec<EntityKey>,
    pub loads: [Option<EntityKey>; MAX_DOF],
    pub motions: [Option<EntityKey>; MAX_DOF],
}

impl Default for Triad {
    fn default() -> Self {
        Self {
            placement: Mat34::IDENTITY,
            ndofs: 6,
            bc: Vec::new(),
            add_mass: Vec::new(),
            mass_engine: None,
            inertia_engine: None,
            init_vel: Vec::new(),
            init_acc: Vec::new(),
            parts: Vec::new(),
            loads: [None; MAX_DOF],
            motions: [None; MAX_DOF],
        }
    }
}

impl Triad {
    pub fn at(placement: Mat34) -> Self {
        Self {
            placement,
            ..Self::default()
        }
    }

    /// Raw DOF count, ignoring suppression of attached parts.
    pub fn ndofs(&self) -> usize {
        self.ndofs
    }

    /// Set the DOF count (0, 3 or 6). Non-empty per-DOF vectors follow.
    pub fn set_ndofs(&mut self, n: usize) -> bool {
        if !matches!(n, 0 | 3 | 6) {
            return false;
        }
        self.ndofs = n;
        if !self.bc.is_empty() {
            self.bc.resize(n, DofStatus::Free);
        }
        for v in [&mut self.init_vel, &mut self.init_acc] {
            if !v.is_empty() {
                v.resize(n, 0.0);
            }
        }
        true
    }

    pub fn is_legal(&self, dof: usize) -> bool {
        dof < self.ndofs
    }

    pub fn status(&self, dof: usize) -> DofStatus {
        self.bc.get(dof).copied().unwrap_or(DofStatus::Free)
    }

    pub fn statuses(&self) -> &[DofStatus] {
        &self.bc
    }

    /// Assign a status. Triads accept FREE through FREE_DYNAMICS; an
    /// all-FREE vector collapses back to empty.
    pub fn set_status(&mut self, dof: usize, status: DofStatus) -> bool {
        if !self.is_legal(dof) {
            return false;
        }
        if self.bc.is_empty() {
            if status == DofStatus::Free {
                return false;
            }
            self.bc.resize(self.ndofs, DofStatus::Free);
        }
        if status > DofStatus::FreeDynamics || self.bc[dof] == status {
            return false;
        }
        self.bc[dof] = status;
        if self.bc.iter().all(|s| *s == DofStatus::Free) {
            self.bc.clear();
        }
        true
    }

    pub fn has_constraints(&self, fixed_only: bool) -> bool {
        self.bc.iter().take(self.ndofs).any(|s| match s {
            DofStatus::Fixed | DofStatus::FreeDynamics => true,
            DofStatus::Prescribed => !fixed_only,
            _ => false,
        })
    }

    /// Every DOF is FIXED, or PRESCRIBED unless `fixed_only`.
    pub fn fully_constrained(&self, fixed_only: bool) -> bool {
        if self.bc.is_empty() {
            return false;
        }
        let constrained = self
            .bc
            .iter()
            .filter(|s| match s {
                DofStatus::Fixed => true,
                DofStatus::Prescribed => !fixed_only,
                _ => false,
            })
            .count();
        constrained == self.ndofs
    }

    pub fn has_add_mass(&self) -> bool {
        self.add_mass.iter().any(|m| *m != 0.0)
    }

    /// Additional mass for `dof`; `None` returns the average of the three
    /// translational masses.
    pub fn add_mass(&self, dof: Option<usize>) -> f64 {
        match dof {
            Some(d) => self.add_mass.get(d).copied().unwrap_or(0.0),
            None if self.add_mass.len() > 2 => {
                (self.add_mass[0] + self.add_mass[1] + self.add_mass[2]) / 3.0
            }
            None => 0.0,
        }
    }

    pub fn set_add_mass(&mut self, dof: usize, value: f64) {
        if dof >= MAX_DOF {
            return;
        }
        if self.add_mass.len() <= dof {
            if value == 0.0 {
                return;
            }
            self.add_mass.resize(MAX_DOF, 0.0);
        }
        self.add_mass[dof] = value;
    }

    pub fn has_init_vel(&self) -> bool {
        self.init_vel.iter().any(|v| *v != 0.0)
    }

    pub fn has_init_acc(&self) -> bool {
        self.init_acc.iter().any(|v| *v != 0.0)
    }

    pub fn init_vel(&self, dof: usize) -> f64 {
        self.init_vel.get(dof).copied().unwrap_or(0.0)
    }

    pub fn init_acc(&self, dof: usize) -> f64 {
        self.init_acc.get(dof).copied().unwrap_or(0.0)
    }

    pub fn set_init_vel(&mut self, dof: usize, value: f64) {
        set_lazy(&mut self.init_vel, self.ndofs, dof, value);
    }

    pub fn set_init_acc(&mut self, dof: usize, value: f64) {
        set_lazy(&mut self.init_acc, self.ndofs, dof, value);
    }

    pub fn is_attached(&self) -> bool {
        !self.parts.is_empty()
    }
}

fn set_lazy(values: &mut Vec<f64>, ndofs: usize, dof: usize, value: f64) {
    if dof >= ndofs {
        return;
    }
    if values.len() <= dof {
        if value == 0.0 {
            return;
        }
        values.resize(ndofs, 0.0);
    }
    values[dof] = value;
}

impl References for Triad {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.mass_engine, f);
        visit_opt(&self.inertia_engine, f);
        for p in &self.parts {
            f(*p);
        }
        visit_all(&self.loads, f);
        visit_all(&self.motions, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.mass_engine, gone);
        release_opt(&mut self.inertia_engine, gone);
        release_vec(&mut self.parts, gone);
        release_all(&mut self.loads, gone);
        release_all(&mut self.motions, gone);
    }
}
