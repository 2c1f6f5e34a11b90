//! External loads, DOF loads and prescribed motions.

use tracing::warn;

use super::format::e17;
use super::writer::SolverWriter;
use crate::dof::{X_TRANS, Z_TRANS};
use crate::entity::EntityType;
use crate::geometry::Vec3;
use crate::id::EntityKey;
use crate::load::Load;
use crate::model::Model;

/// Solver DOF number of the slider in line joints.
const SLIDER_LDOF: usize = 7;

fn is_owner_suppressed(model: &Model, owner: EntityKey) -> bool {
    if model.joint(owner).is_some() {
        model.is_joint_suppressed(owner)
    } else {
        model.is_triad_suppressed(owner)
    }
}

/// 1-based DOF number the solver uses for `dof` on `owner`.
fn solver_dof(model: &Model, owner: EntityKey, dof: usize) -> usize {
    match model.joint(owner) {
        Some(j) if j.is_line() && dof == Z_TRANS => SLIDER_LDOF,
        _ => dof + 1,
    }
}

// ---------------------------------------------------------------------------
// Triad loads
// ---------------------------------------------------------------------------

pub(super) fn write_loads(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::Load) {
        let Some(load) = model.load(key) else {
            continue;
        };
        let Some(triad) = load.triad else {
            continue;
        };
        if model.is_triad_suppressed(triad) {
            continue;
        }
        write_load(w, key, triad, load);
    }
}

fn write_load(w: &mut SolverWriter<'_>, key: EntityKey, triad: EntityKey, load: &Load) {
    let model = w.model;
    w.begin("LOAD");
    w.print_id(key);
    put!(w, "  type = '{}'\n", load.kind.as_str());
    put!(w, "  triadId = {}\n", model.base_id(triad).0);
    if w.description(key).contains("#PrevStep") {
        w.put("  updateFlag = 1\n");
    }

    write_load_point(w, key, "vec1", "1", &load.from, load.from_ref, "from");
    w.put("\n");
    write_load_point(w, key, "vec2", "2", &load.to, load.to_ref, "to");

    match load.engine {
        Some(engine) => put!(w, "\n  f1 = 1.0, loadEngineId = {}\n", model.base_id(engine).0),
        None => put!(w, "\n  f0 = {}\n", e17(load.magnitude)),
    }
    w.save_var(key, 3);
    w.put("/\n\n");
}

/// One end of the load direction. A point on a part, or on a triad
/// attached to a part, is given in that part's system; a point on a loose
/// triad in the triad's system; anything else in global coordinates.
fn write_load_point(
    w: &mut SolverWriter<'_>,
    key: EntityKey,
    name: &str,
    suffix: &str,
    point: &Vec3,
    reference: Option<EntityKey>,
    which: &str,
) {
    let model = w.model;
    let [x, y, z] = point.0;
    put!(w, "  {name} = {} {} {}", e17(x), e17(y), e17(z));
    let Some(reference) = reference else {
        warn!(
            load = %model.id_string(key),
            "no {which}-object specified, assuming its {which}-point is referring to global axes"
        );
        return;
    };
    if model.part(reference).is_some() {
        put!(w, ", supEl{suffix}Id = {}", model.base_id(reference).0);
    } else if let Some(t) = model.triad(reference) {
        match t.parts.first() {
            Some(part) => put!(w, ", supEl{suffix}Id = {}", model.base_id(*part).0),
            None => put!(w, ", triad{suffix}Id = {}", model.base_id(reference).0),
        }
    }
}

// ---------------------------------------------------------------------------
// DOF loads
// ---------------------------------------------------------------------------

pub(super) fn write_dof_loads(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::DofLoad) {
        let Some(owner) = model.load_active_owner(key) else {
            continue;
        };
        let Some(load) = model.dof_load(key) else {
            continue;
        };
        if is_owner_suppressed(model, owner) {
            continue;
        }

        w.begin("LOAD");
        w.print_id(key);
        let descr = w.description(key);
        let mut update_flag = if descr.contains("#PrevStep") { 1 } else { 2 };
        if descr.contains("#LocalAx") {
            update_flag += 10;
        }
        if model.joint(owner).is_some() {
            put!(w, "  jointId = {}\n", model.base_id(owner).0);
        } else {
            put!(w, "  triadId = {}\n", model.base_id(owner).0);
        }
        if update_flag != 2 {
            put!(w, "  updateFlag = {update_flag}\n");
        }
        put!(w, "  lDof = {}\n", solver_dof(model, owner, load.dof));
        match load.engine {
            Some(engine) => put!(w, "  f1 = 1.0, loadEngineId = {}\n", model.base_id(engine).0),
            None => put!(w, "  f0 = {}\n", e17(load.value)),
        }
        w.save_var(key, 3);
        w.put("/\n\n");
    }
}

// ---------------------------------------------------------------------------
// Prescribed motions
// ---------------------------------------------------------------------------

pub(super) fn write_motions(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::DofMotion) {
        let Some(owner) = model.motion_active_owner(key) else {
            continue;
        };
        let Some(motion) = model.dof_motion(key) else {
            continue;
        };
        if is_owner_suppressed(model, owner) {
            continue;
        }

        w.begin("MOTION");
        w.print_id(key);
        let mut d0 = motion.value;
        if model.joint(owner).is_some() {
            put!(w, "  jointId = {}\n", model.base_id(owner).0);
            if model.is_axial_joint(owner, false) {
                d0 = axial_motion_offset(model, owner);
            }
        } else {
            put!(w, "  triadId = {}\n", model.base_id(owner).0);
        }
        put!(w, "  lDof = {}\n", solver_dof(model, owner, motion.dof));
        put!(w, "  type = '{}'\n", motion.motion_type.as_str());

        if d0.abs() > 1.0e-15 {
            put!(w, "  d0 = {}", e17(d0));
            w.put(if motion.engine.is_some() { "," } else { "\n" });
        }
        if let Some(engine) = motion.engine {
            put!(w, "  d1 = 1.0,  motionEngineId = {}\n", model.base_id(engine).0);
        }
        w.save_var(key, 2);
        w.put("/\n\n");
    }
}

/// Constant motion of an axial joint: the triad distance less the initial
/// deflection of the axial spring.
fn axial_motion_offset(model: &Model, joint: EntityKey) -> f64 {
    let Some(j) = model.joint(joint) else {
        return 0.0;
    };
    let position = |t: Option<EntityKey>| {
        t.and_then(|t| model.triad(t))
            .map_or(Vec3::ZERO, |t| t.placement.translation())
    };
    let distance = position(j.slave).sub(&position(j.master)).length();
    let deflection = j
        .spring_at(X_TRANS)
        .and_then(|s| model.joint_spring(s))
        .map_or(0.0, |s| distance - s.base.init_length);
    distance - deflection
}
