//! Joint records: master-slave joints, contact elements, global spring
//! elements and the friction springs that go with them.
//!
//! Each master-slave joint lists its joint variables in solver order.
//! `dofs` tracks which model DOF every variable corresponds to; it is
//! reused for the friction set, and afterwards for the `BC` line.

use tracing::warn;

use super::format::{e17, f6, g};
use super::structure::solver_ndofs;
use super::writer::SolverWriter;
use crate::dof::{Z_TRANS, rotation_var_defs};
use crate::entity::{double_after, int_after};
use crate::geometry::Mat34;
use crate::id::EntityKey;
use crate::joint::{Joint, JointVariant};
use crate::line::curve_sections;

/// Joint variable index used for the slider DOF of line joints.
const SLIDER_DOF: usize = 6;

pub(super) fn write_joints(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.joints_in_emit_order() {
        if model.is_joint_suppressed(key) {
            continue;
        }
        let Some(joint) = model.joint(key) else {
            continue;
        };
        if model.is_contact_element(key) {
            write_contact_element(w, key, joint);
        } else if model.is_global_spring(key) {
            write_global_spring(w, key);
        } else {
            write_master_slave(w, key, joint);
        }
        write_friction_spring(w, key, joint);
    }
}

// ---------------------------------------------------------------------------
// Contact elements and global springs
// ---------------------------------------------------------------------------

fn write_contact_element(w: &mut SolverWriter<'_>, key: EntityKey, joint: &Joint) {
    let model = w.model;
    w.begin("CONTACT_ELEMENT");
    w.print_id(key);
    if w.description(key).contains("#Width") {
        w.warn_ignored(key, " #Width <w>", "Use the \"Width\" field in the joint property window instead.");
    }
    if let JointVariant::Cam {
        thickness,
        width,
        radial,
    } = joint.variant
    {
        let name = if radial { "radius" } else { "thickness" };
        put!(w, "  {name} ={}\n", e17(thickness));
        put!(w, "  width ={}\n", e17(width));
    }
    let springs: Vec<i32> = (0..6).map(|d| model.active_spring_id(key, d)).collect();
    let dampers: Vec<i32> = (0..6).map(|d| model.active_damper_id(key, d)).collect();
    w.int_list("  springId =", &springs);
    w.int_list("  damperId =", &dampers);

    let nvar = if write_friction(w, key, joint, &[SLIDER_DOF]) { 4 } else { 2 };
    w.save_var(key, nvar);
    put!(w, "  followerTriad = {}\n", model.id_of(joint.slave));
    if let Some(line) = joint.line {
        put!(w, "  contactSurface = {}\n", model.base_id(line).0);
    }
    w.put("/\n\n");
}

fn write_global_spring(w: &mut SolverWriter<'_>, key: EntityKey) {
    let model = w.model;
    let descr = w.description(key);
    w.put("! Global spring\n");
    w.begin("SPRING_ELEMENT");
    w.print_id(key);
    w.put("  springBaseId =");
    for d in 0..6 {
        put!(w, " {}", model.active_spring_id(key, d));
    }
    // Trailing 1 marks a global (six-DOF) spring.
    w.put(" 1");

    if descr.contains("#K") {
        w.put("\n  couplStiff =");
        for i in 1..=6 {
            for j in i + 1..=6 {
                put!(w, " {}", g(double_after(descr, &format!("#K{i}{j}"))));
            }
        }
    }

    let mut triads = model.master_triads(key);
    triads.extend(model.joint(key).and_then(|j| j.slave));
    w.put("\n  triadIDs =");
    for t in triads {
        if solver_ndofs(w, t) > 0 {
            put!(w, " {}", model.base_id(t).0);
        }
    }
    w.put("\n/\n\n");
}

// ---------------------------------------------------------------------------
// Master-slave joints
// ---------------------------------------------------------------------------

/// Initial joint system, the slider system of line joints and the
/// current dependent triad system.
struct Position {
    ur: Mat34,
    slider: Mat34,
    slave: Mat34,
    slide: f64,
}

fn joint_position(w: &SolverWriter<'_>, key: EntityKey, joint: &Joint) -> Position {
    let model = w.model;
    let slave = joint
        .slave
        .and_then(|t| model.triad(t))
        .map_or(Mat34::IDENTITY, |t| t.placement);
    let mut pos = Position {
        ur: slave,
        slider: Mat34::IDENTITY,
        slave,
        slide: 0.0,
    };

    if matches!(joint.variant, JointVariant::Cam { .. }) {
        if let Some(line) = joint.line.and_then(|l| model.line_master(l)) {
            let frames: Vec<Mat34> = line
                .triads
                .iter()
                .filter_map(|t| model.triad(*t))
                .map(|t| t.placement)
                .collect();
            let (slide, slider) = slider_position(&frames, line.is_looping(), &slave);
            pos.slide = slide;
            pos.slider = slider;
            pos.ur = slider;
        }
    } else if model.is_axial_joint(key, true) {
        let master = joint
            .master
            .and_then(|t| model.triad(t))
            .map_or(Mat34::IDENTITY, |t| t.placement);
        pos.slider = master;
        pos.ur = Mat34::directed(master.translation(), slave.translation());
    } else if !joint.is_line() {
        pos.ur = joint.placement;
    }
    pos
}

/// Slide value and slider system of the point on a cam curve that
/// `slave` is opposite to. Outside every section the slide is -999.999.
fn slider_position(frames: &[Mat34], looping: bool, slave: &Mat34) -> (f64, Mat34) {
    let p = slave.translation();
    let section = curve_sections(frames, looping).into_iter().find(|cs| {
        let r1 = p.sub(&cs.start.translation());
        let r2 = p.sub(&cs.end.translation());
        cs.start.axis(2).dot(&r1) >= 0.0 && cs.end.axis(2).dot(&r2) < 0.0
    });
    let Some(cs) = section else {
        return (-999.999, Mat34::IDENTITY);
    };
    let chord = cs.end.translation().sub(&cs.start.translation());
    let len = chord.length();
    let frac = if len > 0.0 {
        p.sub(&cs.start.translation()).dot(&chord.normalized()) / len
    } else {
        0.0
    };
    let mut ur = cs.start;
    ur.cols[3] = cs
        .start
        .translation()
        .scale(1.0 - frac)
        .add(&cs.end.translation().scale(frac));
    ((1.0 - frac) * cs.start_slide + frac * cs.end_slide, ur)
}

fn row(values: &[f64]) -> String {
    values.iter().map(|v| format!(" {}", e17(*v))).collect()
}

fn id_row(values: &[i32]) -> String {
    values.iter().map(|v| format!(" {v}")).collect()
}

fn write_master_slave(w: &mut SolverWriter<'_>, key: EntityKey, joint: &Joint) {
    let model = w.model;
    let descr = w.description(key);
    w.begin("MASTERSLAVEJOINT");
    w.print_id(key);

    let pos = joint_position(w, key, joint);
    w.matrix17("  InitPosInGlobal =", &pos.ur);

    let ignored: String = ["#InitTXvel", "#InitTYvel", "#InitTZvel", "#InitRXvel", "#InitRYvel", "#InitRZvel"]
        .iter()
        .filter(|flag| descr.contains(*flag))
        .map(|flag| format!(" {flag}"))
        .collect();
    if !ignored.is_empty() {
        w.warn_ignored(
            key,
            &ignored,
            "Use the \"Initial velocity\" field in the joint property window instead.",
        );
    }

    let version = int_after(descr, "#Version");
    if version != 0 {
        put!(w, "  version      = {version}\n");
    }

    let spring = |d: usize| model.active_spring_id(key, d);
    let damper = |d: usize| model.active_damper_id(key, d);
    let var = |d: usize| joint.joint_variable(d);
    let vel = |d: usize| joint.init_vel(d);
    let acc = |d: usize| joint.init_acc(d);

    let mut dofs: Vec<usize> = Vec::new();
    let n_vars: usize;
    let mut cv_joint = false;
    let mut screw_ratio = None;

    if model.is_axial_joint(key, false) {
        n_vars = 1;
        dofs.push(0);
        let length = pos.slave.translation().sub(&pos.ur.translation()).length();
        w.put("  type         = 8\n  nJointVars   = 1\n  JointVarDefs = 1 1\n");
        put!(w, "  JVarInitVal  ={}\n", row(&[length]));
        put!(w, "  JVarInitVel  ={}\n", row(&[vel(0)]));
        put!(w, "  JVarInitAcc  ={}\n", row(&[acc(0)]));
        put!(w, "  springId     = {}\n  damperId     = {}\n", spring(0), damper(0));
    } else {
        match joint.variant {
            JointVariant::Revolute { .. } => {
                w.put("  type         = 1\n");
                if descr.contains("#FreeZ") {
                    w.warn_ignored(
                        key,
                        " #FreeZ",
                        "Use the \"Z translation DOF\" toggle in the joint property window instead.",
                    );
                }
                dofs.push(5);
                if joint.is_legal(2) {
                    dofs.push(2);
                    n_vars = 2;
                    w.put("  nJointVars   = 2\n  JointVarDefs = 6 1   3 1\n");
                } else {
                    n_vars = 1;
                    w.put("  nJointVars   = 1\n  JointVarDefs = 6 1\n");
                }
                write_var_rows(w, &dofs, var, vel, acc);
                let springs: Vec<i32> = dofs.iter().map(|d| spring(*d)).collect();
                let dampers: Vec<i32> = dofs.iter().map(|d| damper(*d)).collect();
                put!(w, "  springId     ={}\n  damperId     ={}\n", id_row(&springs), id_row(&dampers));
                write_friction(w, key, joint, &dofs);
            }

            JointVariant::Ball if descr.contains("#UniversalJoint") => {
                w.put("  type         = 2\n");
                n_vars = 2;
                w.put("  nJointVars   = 2\n  JointVarDefs = 6 2   5 1\n");
                write_var_rows(w, &[5, 4], var, vel, acc);
                put!(w, "  springId     = {} {}\n", spring(5), spring(4));
                put!(w, "  damperId     = {} {}\n", damper(5), damper(4));
            }

            JointVariant::Ball if descr.contains("#CVJoint") => {
                w.put("  type         = 2\n");
                cv_joint = true;
                n_vars = 4;
                w.put("  nJointVars   = 4\n  JointVarDefs = 6 4   5 3   5 2   6 1\n");
                let rz = double_after(descr, "#RZ") * 0.5;
                let ry = double_after(descr, "#RY") * 0.5;
                put!(w, "  JVarInitVal  ={}\n", row(&[rz, ry, ry, rz]));
                put!(w, "  JVarInitVel  ={} 0.0 0.0\n", row(&[vel(5), vel(4)]));
                put!(w, "  JVarInitAcc  ={} 0.0 0.0\n", row(&[acc(5), acc(4)]));
                put!(w, "  springId     = {} {} 0 0\n", spring(5), spring(4));
                put!(w, "  damperId     = {} {} 0 0\n", damper(5), damper(4));
            }

            JointVariant::Ball => {
                w.put("  type         = 2\n");
                n_vars = 3;
                w.put("  nJointVars   = 3\n");
                dofs = write_rotation_var_defs(w, key, joint, "JointVarDefs =");
                write_var_rows(w, &dofs, var, vel, acc);
                put!(w, "  rotSpringCpl = '{}'\n", joint.rot_coupling.solver_name());
                let springs: Vec<i32> = dofs.iter().map(|d| spring(*d)).collect();
                let dampers: Vec<i32> = dofs.iter().map(|d| damper(*d)).collect();
                put!(w, "  springId     ={}\n  damperId     ={}\n", id_row(&springs), id_row(&dampers));
                if !write_friction(w, key, joint, &dofs) && descr.contains("#BallFriction") {
                    let id = int_after(descr, "#BallFriction");
                    put!(w, "  frictionSetId = {id} {id} {id}\n");
                }
            }

            JointVariant::Rigid => {
                w.put("  type         = 3\n  JointVarDefs =");
                let released: Vec<usize> = ["#FreeX", "#FreeY", "#FreeZ", "#FreeRX", "#FreeRY", "#FreeRZ"]
                    .iter()
                    .enumerate()
                    .filter(|(_, flag)| descr.contains(*flag))
                    .map(|(d, _)| d)
                    .collect();
                for d in &released {
                    put!(w, "   {} 1", d + 1);
                }
                n_vars = released.len();
                put!(w, "   0 0\n  nJointVars   = {n_vars}\n");
                if n_vars > 0 {
                    w.put("  JVarInitVel  =");
                    for d in &released {
                        put!(w, " {}", e17(joint.raw_init_vel(*d)));
                    }
                    w.put("\n  JVarInitAcc  =");
                    for d in &released {
                        put!(w, " {}", e17(joint.raw_init_acc(*d)));
                    }
                    w.put("\n");
                }
            }

            JointVariant::Free => {
                n_vars = 6;
                w.put("  type         = 4\n");
                if version == 0 && descr.contains("#noRotTransCoupling") {
                    w.put("  version      = -1\n");
                }
                w.put("  nJointVars   = 6\n");
                let rot = write_rotation_var_defs(w, key, joint, "JointVarDefs = 1 3   2 3   3 3  ");
                dofs = vec![0, 1, 2];
                dofs.extend(rot);
                write_var_rows(w, &dofs, var, vel, acc);
                put!(w, "  rotSpringCpl = '{}'\n", joint.rot_coupling.solver_name());
                put!(w, "  tranSpringCpl = '{}'\n", joint.tran_coupling.solver_name());
                let springs: Vec<i32> = dofs.iter().map(|d| spring(*d)).collect();
                let dampers: Vec<i32> = dofs.iter().map(|d| damper(*d)).collect();
                put!(w, "  springId     ={}\n  damperId     ={}\n", id_row(&springs), id_row(&dampers));
                write_friction(w, key, joint, &dofs);
            }

            JointVariant::Prismatic => {
                w.put("  type         = 5\n");
                if version == 0 && descr.contains("#Cubic") {
                    w.put("  version      = 3\n");
                }
                n_vars = 3;
                w.put("  nJointVars   = 2\n  JointVarDefs = 5 2   4 1\n");
                put!(w, "  JVarInitVal  = 0.0 0.0{}\n", row(&[var(2)]));
                put!(w, "  JVarInitVel  ={}\n", row(&[vel(4), vel(3), vel(2)]));
                put!(w, "  JVarInitAcc  ={}\n", row(&[acc(4), acc(3), acc(2)]));
                put!(w, "  springId     = 0 0 {}\n", spring(2));
                put!(w, "  damperId     = 0 0 {}\n", damper(2));
                write_friction(w, key, joint, &[0, 0, SLIDER_DOF]);
                dofs = vec![4, 3, 2];
            }

            JointVariant::Cylindric { screw_ratio: ratio } => {
                screw_ratio = ratio;
                w.put("  type         = 6\n");
                if descr.contains("#Cubic") {
                    w.put("  version      = 3\n");
                }
                n_vars = 4;
                w.put("  nJointVars   = 3\n");
                if descr.contains("#RotAxisParam") {
                    w.put("  JointVarDefs = 6 1   5 1   4 1\n");
                } else {
                    w.put("  JointVarDefs = 6 3   5 2   4 1\n");
                }
                put!(w, "  JVarInitVal  ={} 0.0 0.0{}\n", row(&[var(5)]), row(&[var(2)]));
                put!(w, "  JVarInitVel  ={}\n", row(&[vel(5), vel(4), vel(3), vel(2)]));
                put!(w, "  JVarInitAcc  ={}\n", row(&[acc(5), acc(4), acc(3), acc(2)]));
                put!(w, "  springId     = {} 0 0 {}\n", spring(5), spring(2));
                put!(w, "  damperId     = {} 0 0 {}\n", damper(5), damper(2));
                dofs = vec![5, 4, 3, 2];
            }

            JointVariant::Cam { thickness, .. } => {
                w.put("  type         = 7\n");
                if descr.contains("#SpringActiveRadius") {
                    w.warn_ignored(
                        key,
                        " #SpringActiveRadius",
                        "Use the \"Thickness\" field in the joint property window instead.",
                    );
                }
                put!(w, "  camThickness ={}\n", e17(thickness));

                let free_x = !descr.contains("#FixX");
                let free_y = !descr.contains("#FixY");
                // The slider position is a variable but not counted in the record.
                let counted = 3 + usize::from(free_x) + usize::from(free_y);
                put!(w, "  nJointVars   = {counted}\n");
                n_vars = counted + 1;

                w.put("  JointVarDefs = ");
                let code = if descr.contains("#RotAxisParam") { 1 } else { 3 };
                if free_x {
                    put!(w, "1 {code}  ");
                }
                if free_y {
                    put!(w, "2 {code}  ");
                }
                if code == 1 {
                    w.put("6 1   5 1   4 1\n");
                } else {
                    w.put("6 3   5 2   4 1\n");
                }

                let dist = pos.slave.translation().sub(&pos.slider.translation());
                let mut lateral = Vec::new();
                if free_x {
                    lateral.push(0);
                }
                if free_y {
                    lateral.push(1);
                }
                let offsets: Vec<f64> = lateral.iter().map(|d| pos.ur.axis(*d).dot(&dist)).collect();
                put!(w, "  JVarInitVal  ={} 0.0 0.0 0.0{}\n", row(&offsets), row(&[pos.slide]));
                let lat_vel: Vec<f64> = lateral.iter().map(|d| vel(*d)).collect();
                let lat_acc: Vec<f64> = lateral.iter().map(|d| acc(*d)).collect();
                put!(w, "  JVarInitVel  ={}{}\n", row(&lat_vel), row(&[vel(5), vel(4), vel(3), vel(2)]));
                put!(w, "  JVarInitAcc  ={}{}\n", row(&lat_acc), row(&[acc(5), acc(4), acc(3), acc(2)]));
                let lat_springs: Vec<i32> = lateral.iter().map(|d| spring(*d)).collect();
                let lat_dampers: Vec<i32> = lateral.iter().map(|d| damper(*d)).collect();
                put!(w, "  springId     ={} 0 0 0 0\n", id_row(&lat_springs));
                put!(w, "  damperId     ={} 0 0 0 0\n", id_row(&lat_dampers));

                let mut friction_dofs = vec![0; n_vars];
                friction_dofs[n_vars - 1] = SLIDER_DOF;
                write_friction(w, key, joint, &friction_dofs);

                dofs = vec![5, 4, 3];
                dofs.extend(&lateral);
                dofs.push(2);
            }
        }
    }

    if !dofs.is_empty() && joint.has_constraints(true) {
        let codes: Vec<i32> = dofs.iter().map(|d| joint.status(*d).code()).collect();
        w.int_list("  BC =", &codes);
    }
    w.save_var(key, 5 * n_vars);

    let master = if joint.is_line() {
        model.id_of(joint.line)
    } else {
        model.id_of(joint.master)
    };
    put!(w, "  slaveId  = {}\n  masterId = {master}\n", model.id_of(joint.slave));
    w.put("/\n\n");

    let base = model.base_id(key).0;
    if cv_joint {
        w.put("! Constant velocity joint internal connections\n");
        for (slave_dof, master_dof, end) in [(4, 1, "/\n"), (3, 2, "/\n\n")] {
            w.begin("HIGHER_PAIR");
            w.print_id(key);
            put!(w, "  slaveJoint     = {base}\n  slaveJointDof  = {slave_dof}\n");
            put!(w, "  masterJoint    = {base}\n  masterJointDof = {master_dof}\n");
            put!(w, "  coeff          = 1.0\n{end}");
        }
    } else if let Some(ratio) = screw_ratio {
        w.put("! Screw transmission internal connection\n");
        w.begin("HIGHER_PAIR");
        w.print_id(key);
        put!(w, "  slaveJoint     = {base}\n  slaveJointDof  = 4\n");
        put!(w, "  masterJoint    = {base}\n  masterJointDof = 1\n");
        put!(w, "  coeff          = {}\n/\n\n", e17(ratio));
    }

    if descr.contains("#JointLoadEngine") {
        w.warn_ignored(
            key,
            " #JointLoadEngine",
            "Use the \"Load magnitude\" field in the joint property window instead.",
        );
    }
}

fn write_var_rows(
    w: &mut SolverWriter<'_>,
    dofs: &[usize],
    var: impl Fn(usize) -> f64,
    vel: impl Fn(usize) -> f64,
    acc: impl Fn(usize) -> f64,
) {
    let pick = |f: &dyn Fn(usize) -> f64| -> Vec<f64> { dofs.iter().map(|d| f(*d)).collect() };
    put!(w, "  JVarInitVal  ={}\n", row(&pick(&var)));
    put!(w, "  JVarInitVel  ={}\n", row(&pick(&vel)));
    put!(w, "  JVarInitAcc  ={}\n", row(&pick(&acc)));
}

/// Rotation variable definitions after `prefix`. Returns the rotation DOFs
/// in variable order.
fn write_rotation_var_defs(
    w: &mut SolverWriter<'_>,
    key: EntityKey,
    joint: &Joint,
    prefix: &str,
) -> Vec<usize> {
    let defs = rotation_var_defs(joint.rot_formulation, joint.rot_sequence);
    if w.description(key).contains("#RotAxisParam") {
        w.warn_ignored(
            key,
            " #RotAxisParam",
            "Use the \"Rotation formulation\" menu in the \"Advanced\" tab of the joint property window instead.",
        );
    }
    put!(
        w,
        "  {prefix} {} {}   {} {}   {} {}\n",
        defs[0].0 + 1,
        defs[0].1,
        defs[1].0 + 1,
        defs[1].1,
        defs[2].0 + 1,
        defs[2].1
    );
    defs.iter().map(|(d, _)| *d).collect()
}

// ---------------------------------------------------------------------------
// Friction
// ---------------------------------------------------------------------------

/// DOF the friction acts on, in joint variable numbering. Line joints
/// carry their friction on the slider.
fn friction_dof(joint: &Joint) -> usize {
    if joint.is_line() && joint.friction_dof == Z_TRANS {
        SLIDER_DOF
    } else {
        joint.friction_dof
    }
}

/// `frictionSetId` and related lines. Returns false when the joint has
/// no friction.
fn write_friction(w: &mut SolverWriter<'_>, key: EntityKey, joint: &Joint, dofs: &[usize]) -> bool {
    let model = w.model;
    let Some(fkey) = joint.friction else {
        return false;
    };
    let Some(friction) = model.friction(fkey) else {
        return false;
    };
    let on = friction_dof(joint);
    let set_id = model.base_id(fkey).0;
    let mut ids: Vec<i32> = dofs.iter().map(|d| if *d == on { set_id } else { 0 }).collect();
    w.int_list("  frictionSetId =", &ids);

    if friction.stick_stiffness > 0.0 {
        let base = model.base_id(key).0;
        for id in ids.iter_mut().filter(|id| **id != 0) {
            *id = base;
        }
        w.put("  frictionSpringId =");
        for id in &ids {
            put!(w, " {id}");
        }
    }

    let fdescr = w.description(fkey);
    if fdescr.contains("#PipeRadius") {
        for (name, flag) in [
            ("pipeRadius", "#PipeRadius"),
            ("outerPipeRadius", "#OuterPipeRadius"),
            ("hydroFricCoeff", "#HydroFric"),
            ("skinFricCoeff", "#SkinFric"),
            ("radFricCoeff", "#RadFric"),
        ] {
            put!(w, " {name} = {}\n", f6(double_after(fdescr, flag)));
        }
    }

    let engine = int_after(w.description(key), "#FrictionForceEngine");
    if engine > 0 {
        for id in ids.iter_mut().filter(|id| **id != 0) {
            *id = engine;
        }
        w.put("  frictionEngineId =");
        for id in &ids {
            put!(w, " {id}");
        }
    }
    true
}

/// Stick spring of a friction with stiffness: a yield limit record and
/// the spring base using it, both identified by the joint.
fn write_friction_spring(w: &mut SolverWriter<'_>, key: EntityKey, joint: &Joint) {
    let model = w.model;
    let Some(friction) = joint.friction.and_then(|f| model.friction(f)) else {
        return;
    };
    if friction.stick_stiffness <= 0.0 {
        return;
    }
    if friction.stick_stiffness.is_nan() {
        warn!(joint = %model.id_string(key), "friction stick stiffness is not a number");
        return;
    }
    w.put("! Friction limit used by joint friction spring\n");
    w.begin("SPRING_YIELD");
    w.print_id(key);
    w.put("/\n");
    w.put("! Friction spring for joint or contact element\n");
    w.begin("SPRING_BASE");
    w.print_id(key);
    put!(w, "  s0 = {}\n", e17(friction.stick_stiffness));
    put!(w, "  springYieldId = {}\n/\n\n", model.base_id(key).0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::emit_to_string;
    use crate::config::EmitOptions;
    use crate::dof::{DofStatus, Z_ROT};
    use crate::geometry::Vec3;
    use crate::line::{LineKind, LineMaster};
    use crate::model::Model;
    use crate::spring::{Friction, FrictionKind};
    use crate::triad::Triad;

    fn render(m: &mut Model) -> String {
        emit_to_string(m, &EmitOptions::default()).unwrap()
    }

    fn record<'a>(text: &'a str, head: &str) -> &'a str {
        let start = text.find(head).unwrap_or_else(|| panic!("no {head} in\n{text}"));
        let rest = &text[start..];
        let end = rest.find("\n/\n").map_or(rest.len(), |e| e + 3);
        &rest[..end]
    }

    fn massive_triad(m: &mut Model, at: Vec3) -> EntityKey {
        let mut t = Triad::at(Mat34::at(at));
        t.set_add_mass(0, 1.0);
        m.insert(t)
    }

    fn point_joint(m: &mut Model, variant: JointVariant) -> EntityKey {
        let slave = massive_triad(m, Vec3::ZERO);
        let master = massive_triad(m, Vec3::ZERO);
        let mut j = Joint::new(variant);
        j.slave = Some(slave);
        j.master = Some(master);
        m.insert(j)
    }

    // -----------------------------------------------------------------------
    // Point joints
    // -----------------------------------------------------------------------

    #[test]
    fn revolute_with_free_dynamics() {
        let mut m = Model::default();
        let j = point_joint(&mut m, JointVariant::Revolute { tz_dof: false });
        m.set_joint_status(j, Z_ROT, DofStatus::FreeDynamics);
        let text = render(&mut m);
        let rec = record(&text, "&MASTERSLAVEJOINT");
        assert!(rec.starts_with("&MASTERSLAVEJOINT\n  id = 3\n  extId = 1\n  InitPosInGlobal =  1.000000000e+00"));
        assert!(rec.contains(
            "  type         = 1\n  nJointVars   = 1\n  JointVarDefs = 6 1\n\
             \x20 JVarInitVal  =   0.000000000e+00\n\
             \x20 JVarInitVel  =   0.000000000e+00\n\
             \x20 JVarInitAcc  =   0.000000000e+00\n\
             \x20 springId     = 0\n  damperId     = 0\n  BC = 2\n\
             \x20 slaveId  = 1\n  masterId = 2\n/\n"
        ));
    }

    #[test]
    fn ball_joint_follows_rotation_sequence() {
        let mut m = Model::default();
        point_joint(&mut m, JointVariant::Ball);
        let text = render(&mut m);
        let rec = record(&text, "&MASTERSLAVEJOINT");
        assert!(rec.contains("  type         = 2\n  nJointVars   = 3\n  JointVarDefs = 6 3   5 2   4 1\n"));
        assert!(rec.contains("  rotSpringCpl = 'NONE'\n  springId     = 0 0 0\n"));
        assert!(!rec.contains("BC ="));
    }

    #[test]
    fn rigid_joint_releases() {
        let mut m = Model::default();
        let j = point_joint(&mut m, JointVariant::Rigid);
        m.header_mut(j).unwrap().description = "#FreeX #FreeRZ".into();
        m.joint_mut(j).unwrap().set_init_vel(0, 2.0);
        let text = render(&mut m);
        assert!(text.contains(
            "  type         = 3\n  JointVarDefs =   1 1   6 1   0 0\n  nJointVars   = 2\n\
             \x20 JVarInitVel  =   2.000000000e+00   0.000000000e+00\n\
             \x20 JVarInitAcc  =   0.000000000e+00   0.000000000e+00\n"
        ));
    }

    #[test]
    fn free_joint_lists_six_variables() {
        let mut m = Model::default();
        point_joint(&mut m, JointVariant::Free);
        let text = render(&mut m);
        assert!(text.contains("  type         = 4\n  nJointVars   = 6\n  JointVarDefs = 1 3   2 3   3 3   6 3   5 2   4 1\n"));
        assert!(text.contains("  tranSpringCpl = 'NONE'\n  springId     = 0 0 0 0 0 0\n"));
    }

    #[test]
    fn axial_joint_measures_distance() {
        let mut m = Model::default();
        let slave = massive_triad(&mut m, Vec3::new(3.0, 4.0, 0.0));
        let master = massive_triad(&mut m, Vec3::ZERO);
        let mut j = Joint::new(JointVariant::Free);
        j.slave = Some(slave);
        j.master = Some(master);
        let j = m.insert(j);
        m.header_mut(j).unwrap().description = "#Axial".into();
        let text = render(&mut m);
        assert!(text.contains(
            "  type         = 8\n  nJointVars   = 1\n  JointVarDefs = 1 1\n  JVarInitVal  =   5.000000000e+00\n"
        ));
        assert!(text.contains("  InitPosInGlobal =  6.000000000e-01  -8.000000000e-01"));
    }

    #[test]
    fn screw_transmission_adds_higher_pair() {
        let mut m = Model::default();
        let a = massive_triad(&mut m, Vec3::ZERO);
        let b = massive_triad(&mut m, Vec3::new(0.0, 0.0, 1.0));
        let slave = massive_triad(&mut m, Vec3::new(0.0, 0.0, 0.5));
        let line = m.insert(LineMaster::new(LineKind::Straight, vec![a, b]));
        let mut j = Joint::new(JointVariant::Cylindric {
            screw_ratio: Some(0.01),
        });
        j.slave = Some(slave);
        j.line = Some(line);
        m.insert(j);
        let text = render(&mut m);
        assert!(text.contains("  slaveId  = 3\n  masterId = 4\n/\n\n"));
        assert!(text.contains(
            "! Screw transmission internal connection\n&HIGHER_PAIR\n  id = 5\n  extId = 1\n\
             \x20 slaveJoint     = 5\n  slaveJointDof  = 4\n  masterJoint    = 5\n  masterJointDof = 1\n\
             \x20 coeff          =   1.000000000e-02\n/\n\n"
        ));
    }

    #[test]
    fn master_slave_cam_counts_slider_variable() {
        let mut m = Model::default();
        let a = massive_triad(&mut m, Vec3::ZERO);
        let b = massive_triad(&mut m, Vec3::new(2.0, 0.0, 0.0));
        let slave = massive_triad(&mut m, Vec3::new(0.5, 0.0, 0.0));
        let line = m.insert(LineMaster::new(LineKind::Straight, vec![a, b]));
        let mut j = Joint::new(JointVariant::Cam {
            thickness: 0.0,
            width: 0.0,
            radial: false,
        });
        j.slave = Some(slave);
        j.line = Some(line);
        let j = m.insert(j);
        m.header_mut(j).unwrap().description = "#MasterSlaveCam #FixY".into();
        let f = m.insert(Friction::new(FrictionKind::Cam));
        m.joint_mut(j).unwrap().friction = Some(f);

        let text = render(&mut m);
        let rec = record(&text, "&MASTERSLAVEJOINT");
        assert!(rec.contains("  type         = 7\n"));
        assert!(rec.contains("  nJointVars   = 4\n  JointVarDefs = 1 3  6 3   5 2   4 1\n"));
        // four counted variables plus the slider, friction on the slider
        let fid = m.base_id(f).0;
        assert!(rec.contains(&format!("  frictionSetId = 0 0 0 0 {fid}\n")));
    }

    // -----------------------------------------------------------------------
    // Friction
    // -----------------------------------------------------------------------

    #[test]
    fn friction_with_stick_spring() {
        let mut m = Model::default();
        let j = point_joint(&mut m, JointVariant::Revolute { tz_dof: false });
        let mut f = Friction::new(FrictionKind::Rotational { radius: 0.1 });
        f.stick_stiffness = 1.0e4;
        let f = m.insert(f);
        m.joint_mut(j).unwrap().friction = Some(f);
        let text = render(&mut m);
        assert!(text.contains("  frictionSetId = 4\n  frictionSpringId = 3  slaveId  = 1\n"));
        assert!(text.contains(
            "! Friction limit used by joint friction spring\n&SPRING_YIELD\n  id = 3\n  extId = 1\n/\n\
             ! Friction spring for joint or contact element\n&SPRING_BASE\n  id = 3\n  extId = 1\n\
             \x20 s0 =   1.000000000e+04\n  springYieldId = 3\n/\n\n"
        ));
    }

    #[test]
    fn slider_position_interpolates_along_chord() {
        let frames = [
            Mat34::at(Vec3::ZERO),
            Mat34::at(Vec3::new(2.0, 0.0, 0.0)),
            Mat34::at(Vec3::new(2.0, 2.0, 0.0)),
        ];
        let (slide, ur) = slider_position(&frames, false, &Mat34::at(Vec3::new(2.0, 0.5, 1.0)));
        assert!((slide - 2.5).abs() < 1e-12);
        assert_eq!(ur.translation(), Vec3::new(2.0, 0.5, 0.0));
        let (outside, _) = slider_position(&frames, false, &Mat34::at(Vec3::new(-1.0, -1.0, 0.0)));
        assert_eq!(outside, -999.999);
    }
}
