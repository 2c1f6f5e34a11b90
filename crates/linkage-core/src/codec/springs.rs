//! Spring bases, axial spring elements, dampers and spring
//! characteristics.

use super::format::{e17, f3_1};
use super::writer::SolverWriter;
use crate::entity::{EntityType, int_after};
use crate::id::EntityKey;
use crate::joint::JointVariant;
use crate::spring::{DamperBase, SpringBase};

// ---------------------------------------------------------------------------
// Spring bases
// ---------------------------------------------------------------------------

/// `SPRING_BASE` records: axial springs first, then every active joint
/// spring on a joint that is not suppressed.
pub(super) fn write_spring_bases(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::AxialSpring) {
        if let Some(s) = model.axial_spring(key) {
            w.put("! Axial spring\n");
            write_spring_base(w, key, &s.base);
        }
    }

    for key in model.keys_of_type(EntityType::JointSpring) {
        let Some(owner) = model.spring_active_owner(key) else {
            continue;
        };
        let (Some(spring), Some(joint)) = (model.joint_spring(key), model.joint(owner)) else {
            continue;
        };
        if model.is_joint_suppressed(owner) {
            continue;
        }
        if model.is_contact_element(owner) {
            w.put("! Contact element spring\n");
        } else if is_fixed_cam_dof(&joint.variant, w.description(owner), spring.dof) {
            continue;
        } else if model.is_global_spring(owner) {
            w.put("! Global spring\n");
        } else {
            w.put("! Joint spring\n");
        }
        write_spring_base(w, key, &spring.base);
    }
}

/// Cam joints flagged `#FixX`/`#FixY`/`#FixZ` have no such DOF.
fn is_fixed_cam_dof(variant: &JointVariant, descr: &str, dof: usize) -> bool {
    if !matches!(variant, JointVariant::Cam { .. }) {
        return false;
    }
    match dof {
        0 => descr.contains("#FixX"),
        1 => descr.contains("#FixY"),
        2 => descr.contains("#FixZ"),
        _ => false,
    }
}

fn write_spring_base(w: &mut SolverWriter<'_>, key: EntityKey, base: &SpringBase) {
    let model = w.model;
    let descr = w.description(key);
    w.begin("SPRING_BASE");
    w.print_id(key);

    let length_engine = model.id_of(base.length_engine);
    put!(
        w,
        "  l0 ={}, l1 = {}, lengthEngineId = {length_engine}\n",
        e17(base.init_length),
        f3_1(if length_engine > 0 { 1.0 } else { 0.0 })
    );

    let cyclic = if descr.contains("#Cyclic") {
        int_after(descr, "#Cyclic").max(1)
    } else {
        0
    };

    let func = model.id_of(base.function);
    let s0 = if func > 0 && cyclic != 3 {
        0.0
    } else {
        base.stiffness
    };
    if s0.abs() > 1.0e-15 {
        put!(w, "  s0 ={}{}", e17(s0), if func > 0 { "," } else { "\n" });
    } else if func > 0 {
        w.put(" ");
    }
    if func > 0 {
        let kind = if base.force_function { "force" } else { "stiff" };
        put!(w, " s1 = 1.0, {kind}FuncId = {func}\n");
    }

    let mut pos = int_after(descr, "#PosStiffScaleEngine");
    let mut neg = int_after(descr, "#NegStiffScaleEngine");
    let scale = model.id_of(base.scale_engine);
    if scale > 0 {
        if pos <= 0 {
            pos = scale;
        }
        if neg <= 0 {
            neg = scale;
        }
    }
    if pos > 0 || neg > 0 {
        put!(w, "  stiffScaleEnginePosId = {pos}\n  stiffScaleEngineNegId = {neg}\n");
    }

    if let Some(c) = base.spring_char.and_then(|k| model.spring_char(k).map(|c| (k, c))) {
        let (char_key, data) = c;
        let id = model.base_id(char_key).0;
        if data.has_failure() {
            put!(w, "  springFailureId = {id}\n");
        }
        if data.has_yield() {
            put!(w, "  springYieldId = {id}\n");
        }
    }
    if cyclic > 0 {
        put!(w, "  unLoadType = {cyclic}\n");
    }
    w.save_var(key, 5);
    w.put("/\n\n");
}

pub(super) fn write_axial_spring_elements(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::AxialSpring) {
        let Some(s) = model.axial_spring(key) else {
            continue;
        };
        let descr = w.description(key);
        w.put("! Axial spring\n");
        w.begin("SPRING_ELEMENT");
        w.print_id(key);
        put!(w, "  springBaseId = {}\n", model.base_id(key).0);
        if descr.contains("#Rayleigh") {
            put!(
                w,
                "  alpha2 = {}\n",
                super::format::f6(crate::entity::double_after(descr, "#Rayleigh"))
            );
        }
        w.put("  triadIDs =");
        for t in &s.triads {
            put!(w, " {}", model.id_of(*t));
        }
        w.put("\n/\n\n");
    }
}

// ---------------------------------------------------------------------------
// Dampers
// ---------------------------------------------------------------------------

/// Axial dampers, then active joint dampers. Dampers of contact elements
/// are written as bare `DAMPER_BASE` records.
pub(super) fn write_dampers(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::AxialDamper) {
        let Some(d) = model.axial_damper(key) else {
            continue;
        };
        w.put("! Axial damper\n");
        w.begin("DAMPER");
        w.print_id(key);
        for (i, t) in d.triads.iter().enumerate() {
            put!(w, "  triad{}Id = {}\n", i + 1, model.id_of(*t));
        }
        write_damper_base(w, key, &d.base);
    }

    for key in model.keys_of_type(EntityType::JointDamper) {
        let Some(owner) = model.damper_active_owner(key) else {
            continue;
        };
        let Some(d) = model.joint_damper(key) else {
            continue;
        };
        if model.is_joint_suppressed(owner) {
            continue;
        }
        if model.is_contact_element(owner) {
            w.put("! Contact element damper\n");
            w.begin("DAMPER_BASE");
        } else {
            w.put("! Joint damper\n");
            w.begin("DAMPER");
        }
        w.print_id(key);
        write_damper_base(w, key, &d.base);
    }
}

fn write_damper_base(w: &mut SolverWriter<'_>, key: EntityKey, base: &DamperBase) {
    let model = w.model;
    let func = model.id_of(base.function);
    if func > 0 {
        let kind = if base.force_function { "force" } else { "coeff" };
        put!(w, "  d1 = 1.0, {kind}FuncId = {func}\n");
    } else if base.coefficient.abs() > 1.0e-15 {
        put!(w, "  d0 ={}\n", e17(base.coefficient));
    }
    let scale = model.id_of(base.scale_engine);
    if scale > 0 {
        put!(w, "  coeffScaleEngineId = {scale}\n");
    }
    if base.is_def_damper {
        w.put("  isDefDamper = .true.\n");
    }
    w.save_var(key, 5);
    w.put("/\n\n");
}

// ---------------------------------------------------------------------------
// Spring characteristics
// ---------------------------------------------------------------------------

pub(super) fn write_spring_chars(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::SpringChar) {
        let Some(c) = model.spring_char(key) else {
            continue;
        };
        if c.has_failure() {
            w.begin("SPRING_FAILURE");
            w.print_id(key);
            for (name, value) in [
                ("deflectionMax", c.deflection_max),
                ("deflectionMin", c.deflection_min),
                ("forceMax", c.force_max),
                ("forceMin", c.force_min),
            ] {
                if let Some(v) = value {
                    put!(w, "  {name} = {}\n", e17(v));
                }
            }
            if c.fail_all || w.description(key).contains("#FailAll") {
                w.put("  compFailure = .true.\n");
            }
            w.put("/\n\n");
        }

        if c.has_yield() {
            w.begin("SPRING_YIELD");
            w.print_id(key);
            for (name, value, engine) in [
                ("yieldForceMax", c.yield_force_max, c.yield_force_max_engine),
                ("yieldForceMin", c.yield_force_min, c.yield_force_min_engine),
            ] {
                let Some(v) = value else {
                    continue;
                };
                match engine {
                    Some(e) => put!(w, "  {name}Engine = {}\n", model.base_id(e).0),
                    None => put!(w, "  {name} = {}\n", e17(v)),
                }
            }
            if let Some(v) = c.yield_deflection_max {
                put!(w, "  yieldDeflectionAbsMax = {}\n", e17(v));
            }
            w.put("/\n\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::emit_to_string;
    use crate::config::EmitOptions;
    use crate::dof::{DofStatus, Z_ROT};
    use crate::joint::{Joint, JointVariant};
    use crate::model::{DofChild, Model};
    use crate::spring::{AxialDamper, AxialSpring, DamperBase, SpringBase, SpringChar};
    use crate::triad::Triad;

    fn render(m: &mut Model) -> String {
        emit_to_string(m, &EmitOptions::default()).unwrap()
    }

    fn massive_triad(m: &mut Model) -> crate::id::EntityKey {
        let mut t = Triad::default();
        t.set_add_mass(0, 1.0);
        m.insert(t)
    }

    // -----------------------------------------------------------------------
    // Axial springs and dampers
    // -----------------------------------------------------------------------

    #[test]
    fn axial_spring_writes_base_and_element() {
        let mut m = Model::default();
        let a = massive_triad(&mut m);
        let b = massive_triad(&mut m);
        let s = m.insert(AxialSpring {
            triads: [Some(a), Some(b)],
            base: SpringBase {
                init_length: 2.0,
                ..SpringBase::with_stiffness(1.0e3)
            },
        });
        let text = render(&mut m);
        assert!(text.contains(
            "! Axial spring\n&SPRING_BASE\n  id = 3\n  extId = 1\n\
             \x20 l0 =  2.000000000e+00, l1 = 0.0, lengthEngineId = 0\n\
             \x20 s0 =  1.000000000e+03\n/\n\n"
        ));
        assert!(text.contains(
            "! Axial spring\n&SPRING_ELEMENT\n  id = 3\n  extId = 1\n  springBaseId = 3\n  triadIDs = 1 2\n/\n\n"
        ));
        let base_at = text.find("&SPRING_BASE").unwrap();
        let elem_at = text.find("&SPRING_ELEMENT").unwrap();
        assert!(base_at < elem_at);
        assert_eq!(m.base_id(s).0, 3);
    }

    #[test]
    fn spring_function_and_scale_engines() {
        let mut m = Model::default();
        let a = massive_triad(&mut m);
        let b = massive_triad(&mut m);
        let f = m.insert(crate::function::Function::constant(1.0));
        let e = m.insert(crate::function::Engine::with_function(f));
        let s = m.insert(AxialSpring {
            triads: [Some(a), Some(b)],
            base: SpringBase {
                function: Some(f),
                force_function: true,
                scale_engine: Some(e),
                ..SpringBase::with_stiffness(5.0)
            },
        });
        m.header_mut(s).unwrap().description = "#NegStiffScaleEngine 77".into();
        let text = render(&mut m);
        assert!(text.contains("lengthEngineId = 0\n  s1 = 1.0, forceFuncId = 3\n"));
        assert!(text.contains("  stiffScaleEnginePosId = 4\n  stiffScaleEngineNegId = 77\n"));
    }

    #[test]
    fn axial_damper_record() {
        let mut m = Model::default();
        let a = massive_triad(&mut m);
        let b = massive_triad(&mut m);
        m.insert(AxialDamper {
            triads: [Some(a), Some(b)],
            base: DamperBase {
                is_def_damper: true,
                ..DamperBase::with_coefficient(0.5)
            },
        });
        let text = render(&mut m);
        assert!(text.contains(
            "! Axial damper\n&DAMPER\n  id = 3\n  extId = 1\n  triad1Id = 1\n  triad2Id = 2\n\
             \x20 d0 =  5.000000000e-01\n  isDefDamper = .true.\n/\n\n"
        ));
    }

    // -----------------------------------------------------------------------
    // Joint springs
    // -----------------------------------------------------------------------

    #[test]
    fn only_active_joint_springs_are_written() {
        let mut m = Model::default();
        let a = massive_triad(&mut m);
        let b = massive_triad(&mut m);
        let mut joint = Joint::new(JointVariant::Revolute { tz_dof: false });
        joint.slave = Some(a);
        joint.master = Some(b);
        let j = m.insert(joint);
        let spring = m.joint_child(j, DofChild::Spring, Z_ROT, true).unwrap();
        m.joint_spring_mut(spring).unwrap().base = SpringBase::with_stiffness(10.0);

        let text = render(&mut m);
        assert!(!text.contains("! Joint spring"));

        m.set_joint_status(j, Z_ROT, DofStatus::SpringConstrained);
        let text = render(&mut m);
        assert!(text.contains("! Joint spring\n&SPRING_BASE\n"));
        assert!(text.contains("  s0 =  1.000000000e+01\n"));
    }

    // -----------------------------------------------------------------------
    // Spring characteristics
    // -----------------------------------------------------------------------

    #[test]
    fn failure_and_yield_records() {
        let mut m = Model::default();
        let a = massive_triad(&mut m);
        let b = massive_triad(&mut m);
        let c = m.insert(SpringChar {
            force_max: Some(100.0),
            yield_force_min: Some(-50.0),
            ..SpringChar::default()
        });
        m.insert(AxialSpring {
            triads: [Some(a), Some(b)],
            base: SpringBase {
                spring_char: Some(c),
                ..SpringBase::with_stiffness(1.0)
            },
        });
        let text = render(&mut m);
        assert!(text.contains("  springFailureId = 3\n  springYieldId = 3\n"));
        assert!(text.contains(
            "&SPRING_FAILURE\n  id = 3\n  extId = 1\n  forceMax =   1.000000000e+02\n/\n\n"
        ));
        assert!(text.contains(
            "&SPRING_YIELD\n  id = 3\n  extId = 1\n  yieldForceMin =  -5.000000000e+01\n/\n\n"
        ));
    }
}
