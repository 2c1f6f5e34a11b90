//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::dof::{DofStatus, MAX_DOF};
use crate::function::{Engine, EngineArg, Function, FunctionKind};
use crate::geometry::{Mat34, Vec3};
use crate::id::EntityKey;
use crate::joint::{Joint, JointVariant};
use crate::line::{LineKind, LineMaster};
use crate::model::Model;
use crate::part::Part;
use crate::sensor::SensorEntity;
use crate::triad::Triad;

// ===========================================================================
// Triads and parts
// ===========================================================================

pub fn triad_at(model: &mut Model, x: f64, y: f64, z: f64) -> EntityKey {
    model.insert(Triad::at(Mat34::at(Vec3::new(x, y, z))))
}

/// A triad with every DOF FIXED.
pub fn ground_triad(model: &mut Model, x: f64, y: f64, z: f64) -> EntityKey {
    let t = triad_at(model, x, y, z);
    for dof in 0..MAX_DOF {
        model.set_triad_status(t, dof, DofStatus::Fixed);
    }
    t
}

/// A triad attached to `part`.
pub fn attached_triad(model: &mut Model, part: EntityKey, x: f64, y: f64, z: f64) -> EntityKey {
    let mut t = Triad::at(Mat34::at(Vec3::new(x, y, z)));
    t.parts.push(part);
    model.insert(t)
}

pub fn massive_part(model: &mut Model, mass: f64) -> EntityKey {
    model.insert(Part {
        mass,
        inertia: [1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        ..Part::default()
    })
}

// ===========================================================================
// Joints
// ===========================================================================

/// Keys of a single pendulum.
#[derive(Debug, Clone, Copy)]
pub struct Pendulum {
    pub part: EntityKey,
    pub ground: EntityKey,
    pub slave: EntityKey,
    pub joint: EntityKey,
}

/// A part hanging from a fixed triad through a revolute joint. Passes
/// validation as built.
pub fn pendulum(model: &mut Model) -> Pendulum {
    let ground = ground_triad(model, 0.0, 0.0, 0.0);
    let part = massive_part(model, 2.0);
    let slave = attached_triad(model, part, 0.0, 0.0, 0.0);
    attached_triad(model, part, 1.0, 0.0, 0.0);
    let mut j = Joint::new(JointVariant::Revolute { tz_dof: false });
    j.slave = Some(slave);
    j.master = Some(ground);
    let joint = model.insert(j);
    Pendulum {
        part,
        ground,
        slave,
        joint,
    }
}

pub fn point_joint(model: &mut Model, variant: JointVariant) -> (EntityKey, EntityKey, EntityKey) {
    let slave = triad_at(model, 0.0, 0.0, 0.0);
    let master = triad_at(model, 0.0, 0.0, 0.0);
    let mut j = Joint::new(variant);
    j.slave = Some(slave);
    j.master = Some(master);
    (model.insert(j), slave, master)
}

/// Keys of a prismatic joint sliding on a straight line.
#[derive(Debug, Clone)]
pub struct Slider {
    pub joint: EntityKey,
    pub slave: EntityKey,
    pub line: EntityKey,
    pub masters: Vec<EntityKey>,
}

/// A prismatic joint on a line of `n` fixed master triads along X.
pub fn slider(model: &mut Model, n: usize) -> Slider {
    let masters: Vec<EntityKey> = (0..n).map(|i| ground_triad(model, i as f64, 0.0, 0.0)).collect();
    let line = model.insert(LineMaster::new(LineKind::Straight, masters.clone()));
    let part = massive_part(model, 1.0);
    let slave = attached_triad(model, part, 0.5, 0.0, 0.0);
    let mut j = Joint::new(JointVariant::Prismatic);
    j.slave = Some(slave);
    j.line = Some(line);
    let joint = model.insert(j);
    Slider {
        joint,
        slave,
        line,
        masters,
    }
}

// ===========================================================================
// Functions and engines
// ===========================================================================

pub fn ramp(model: &mut Model, slope: f64) -> EntityKey {
    model.insert(Function::new(FunctionKind::LinVar {
        values: vec![0.0, 0.0, 1.0, slope],
    }))
}

/// `n` engines where each one reads the previous one. The first reads time.
pub fn engine_chain(model: &mut Model, n: usize) -> Vec<EntityKey> {
    let time = model.time_sensor();
    let mut engines = Vec::with_capacity(n);
    for i in 0..n {
        let f = ramp(model, 1.0 + i as f64);
        let mut e = Engine::with_function(f);
        let arg = match engines.last() {
            Some(prev) => EngineArg::new(model.sensor_for(*prev), 0, SensorEntity::Pos),
            None => EngineArg::new(time, 0, SensorEntity::Pos),
        };
        e.args.push(arg);
        engines.push(model.insert(e));
    }
    engines
}
