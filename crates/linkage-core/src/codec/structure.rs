//! Structural records: heading, environment, triads, parts, beams,
//! user-defined elements, tires, roads, the turbine configuration,
//! additional masses and strain rosettes.

use tracing::{debug, error, warn};

use super::format::{e17, e18, f6, g};
use super::writer::SolverWriter;
use crate::entity::{EntityType, doubles_after, ints_after};
use crate::geometry::{Mat34, Vec3};
use crate::id::EntityKey;
use crate::part::{
    GENERATOR_JOINT, HUB, HUB_TRIAD, NACELLE_TRIAD, PartStiffness, ShadowPosition, TOWER_TRIAD,
    reference_points,
};

/// DOF count written for a triad: none when it sits on a suppressed part.
pub(super) fn solver_ndofs(w: &SolverWriter<'_>, triad: EntityKey) -> usize {
    let Some(t) = w.model.triad(triad) else {
        return 0;
    };
    let on_suppressed = t
        .parts
        .iter()
        .any(|p| w.model.part(*p).is_some_and(|p| p.suppressed));
    if on_suppressed { 0 } else { t.ndofs() }
}

// ---------------------------------------------------------------------------
// Heading and environment
// ---------------------------------------------------------------------------

pub(super) fn write_heading(w: &mut SolverWriter<'_>) {
    w.begin("HEADING");
    put!(w, "  modelFile = '{}'\n", w.model.settings.model_file);
    w.put("  version = 3.0\n/\n\n");
}

pub(super) fn write_environment(w: &mut SolverWriter<'_>) {
    let gravity = w.model.settings.gravity;
    if gravity.is_zero() {
        return;
    }
    w.begin("ENVIRONMENT");
    put!(
        w,
        "  gravity  ={} {} {}\n/\n\n",
        e17(gravity[0]),
        e17(gravity[1]),
        e17(gravity[2])
    );
}

// ---------------------------------------------------------------------------
// Triads
// ---------------------------------------------------------------------------

pub(super) fn write_triads(w: &mut SolverWriter<'_>) {
    for triad in w.model.keys_of_type(EntityType::Triad) {
        write_triad(w, triad);
    }
}

fn write_triad(w: &mut SolverWriter<'_>, key: EntityKey) {
    let model = w.model;
    let Some(t) = model.triad(key) else {
        return;
    };
    let n = solver_ndofs(w, key);
    w.begin("TRIAD");
    w.print_id(key);
    put!(w, "  nDOFs = {n}\n");
    w.matrix18("  ur  =", &t.placement);

    if n > 0 {
        if t.has_init_vel() {
            w.put("  urd =");
            for dof in 0..n {
                w.put(&e18(t.init_vel(dof)));
            }
            w.put("\n");
        } else if let Some(v0) = inherited_velocity(w, key) {
            put!(w, "  urd ={}{}{}", e18(v0[0]), e18(v0[1]), e18(v0[2]));
            for _ in 3..n {
                w.put(&e18(0.0));
            }
            w.put("\n");
        }

        if t.has_init_acc() {
            w.put("  urdd=");
            for dof in 0..n {
                w.put(&e18(t.init_acc(dof)));
            }
            w.put("\n");
        }

        if t.has_constraints(true) {
            let codes: Vec<i32> = (0..n).map(|d| t.status(d).code()).collect();
            w.int_list("  BC =", &codes);
        }
        if w.description(key).contains("#savePos") {
            w.put("  savePos = 1\n");
        }
        w.save_var(key, 7);
    }
    w.put("/\n\n");
}

/// `#InitTransVel` on the owning part, else the global initial velocity.
fn inherited_velocity(w: &SolverWriter<'_>, triad: EntityKey) -> Option<Vec3> {
    let owner = w.model.triad(triad)?.parts.first().copied();
    if let Some(part) = owner {
        let v = doubles_after(w.description(part), "#InitTransVel", 3);
        if !v.is_empty() {
            let at = |i: usize| v.get(i).copied().unwrap_or(0.0);
            return Some(Vec3::new(at(0), at(1), at(2)));
        }
    }
    let global = w.model.settings.init_vel;
    (!global.is_zero()).then_some(global)
}

/// `TRIAD_UNDPOS`: the transposed orientation and the origin of `cs`,
/// given in the element system.
fn write_undeformed_position(w: &mut SolverWriter<'_>, element: i32, triad: i32, cs: &Mat34) {
    w.begin("TRIAD_UNDPOS");
    put!(w, "  supElId = {element}\n  triadId = {triad}\n");
    for r in 0..3 {
        let lead = if r == 0 {
            "  undPosInSupElSystem ="
        } else {
            "                       "
        };
        let c = cs.cols[r];
        put!(
            w,
            "{lead}{}{}{}{}\n",
            e17(c[0]),
            e18(c[1]),
            e18(c[2]),
            e18(cs.cols[3][r])
        );
    }
    w.put("/\n");
}

fn write_triad_ids(w: &mut SolverWriter<'_>, ids: &[i32]) {
    put!(w, "  numTriads = {}\n  triadIds =", ids.len());
    for (j, id) in ids.iter().enumerate() {
        if j % 10 == 0 && j > 0 {
            put!(w, "\n             {id}");
        } else {
            put!(w, " {id}");
        }
    }
    w.put("\n");
}

/// `refTriad<i>Id` lines for a triangle-fit shadow. Returns false when the
/// element has no triads.
fn write_ref_triads(w: &mut SolverWriter<'_>, triads: &[EntityKey], frame: &Mat34) -> bool {
    let local: Vec<Vec3> = triads
        .iter()
        .filter_map(|t| w.model.triad(*t))
        .map(|t| t.placement.relative_to(frame).translation())
        .collect();
    let Some(refs) = reference_points(&local) else {
        return false;
    };
    for i in 0..3 {
        let id = w.base(triads.get(refs.nodes[i]).copied());
        let off = refs.offsets[i];
        put!(
            w,
            "  refTriad{n}Id = {id}, offset{n} ={} {} {}\n",
            e17(off[0]),
            e17(off[1]),
            e17(off[2]),
            n = i + 1
        );
    }
    true
}

// ---------------------------------------------------------------------------
// Generic parts
// ---------------------------------------------------------------------------

pub(super) fn write_parts(w: &mut SolverWriter<'_>) {
    for part in w.model.keys_of_type(EntityType::Part) {
        if w.model.part(part).is_some_and(|p| !p.suppressed) {
            write_part(w, part);
        }
    }
}

fn write_part(w: &mut SolverWriter<'_>, key: EntityKey) {
    let model = w.model;
    let Some(p) = model.part(key) else {
        return;
    };
    let base = model.base_id(key).0;
    let descr = w.description(key);
    let triads = model.triads_on_part(key);
    let tol = model.settings.position_tolerance;
    let cog = p.global_cog();

    w.begin("SUP_EL");
    w.print_id(key);

    // The first solver node is the centre of gravity, either an existing
    // triad located there or a dummy triad with a negative id.
    let mut cg_triad = -base;
    if triads.len() > 1 {
        if let Some(at_cog) = triads.iter().find(|t| {
            model
                .triad(**t)
                .is_some_and(|t| t.placement.translation().equals(&cog.translation(), tol))
        }) {
            cg_triad = model.base_id(*at_cog).0;
        }
    }
    let mut ids = vec![cg_triad];
    ids.extend(
        triads
            .iter()
            .map(|t| model.base_id(*t).0)
            .filter(|id| *id != cg_triad),
    );
    write_triad_ids(w, &ids);

    let shadow = if descr.contains("#Fixed") {
        ShadowPosition::Fixed.code()
    } else {
        p.shadow.code()
    };
    put!(w, "  shadowPosAlg = {shadow}\n");
    if shadow == 1 && !write_ref_triads(w, &triads, &p.placement) {
        w.error(Some(key), format!("{} has no triads.", model.id_string(key)));
    }

    if descr.contains("#DynStressStiffening") {
        w.put("  stressStiffFlag = 1\n");
    } else if descr.contains("#NoDynStressStiffening") {
        w.put("  stressStiffFlag = 0\n");
    }
    let projection = crate::entity::int_after(descr, "#Projection");
    if projection > 0 {
        put!(w, "  projDefFlag = {projection}\n");
    }
    if let Some(correct) = p.centrip_correction {
        put!(w, "  massCorrFlag = {}\n", i32::from(correct));
    }
    for flag in ["#MassCorrection", "#NoMassCorrection", "#MassCorrFlag"] {
        if descr.contains(flag) {
            w.warn_ignored(key, &format!(" {flag}"), "Set the mass correction option instead.");
        }
    }

    put!(w, "  stiffScale ={}\n  massScale  ={}\n", e17(p.stiff_scale), e17(p.mass_scale));
    let stiff_engine = crate::entity::int_after(descr, "#StiffScaleEngine");
    if stiff_engine > 0 {
        put!(w, "  stiffEngineId = {stiff_engine}\n");
    }
    put!(w, "  alpha1 ={},  alpha2 ={}\n", e17(p.alpha1), e17(p.alpha2));
    w.matrix17("  supPos =", &p.placement);
    if descr.contains("#savePos") {
        w.put("  savePos = 1\n");
    }
    w.save_var(key, 3);
    w.put("/\n");

    if cg_triad > 0 {
        debug!(part = %model.id_string(key), triad = cg_triad, "centre of gravity at existing triad");
    } else {
        write_cog_triad(w, key, cg_triad, &cog);
        if !triads.is_empty() {
            write_undeformed_position(w, base, cg_triad, &p.cog);
        }
    }
    for t in &triads {
        if let Some(triad) = model.triad(*t) {
            let local = triad.placement.relative_to(&p.placement);
            write_undeformed_position(w, base, model.base_id(*t).0, &local);
        }
    }
    w.put("\n");

    w.begin("GENERIC_PART");
    put!(w, "  supElId =  {base}\n  mass    = {}\n  inertia =", e17(p.mass));
    for v in p.inertia {
        put!(w, " {}", e17(v));
    }
    match p.stiffness {
        PartStiffness::Nodal { kt, kr } => {
            put!(w, "\n  kt      = {}\n  kr      = {}", e17(kt), e17(kr));
        }
        PartStiffness::Rigid => w.put("\n  isRigid =  1"),
    }
    w.put("\n/\n\n");
}

/// Dummy solver triad at the centre of gravity of a generic part.
fn write_cog_triad(w: &mut SolverWriter<'_>, part: EntityKey, id: i32, cog: &Mat34) {
    let model = w.model;
    let Some(p) = model.part(part) else {
        return;
    };
    let descr = w.description(part);
    let n = if p.condense_cog { 0 } else { 6 };

    w.put("\n! Center of Gravity solver triad\n");
    w.begin("TRIAD");
    put!(w, "  id = {id}\n  nDOFs = {n}\n");
    w.matrix17("  ur  =", cog);

    if n > 0 {
        let trans = doubles_after(descr, "#InitTransVel", 3);
        let rot = doubles_after(descr, "#InitRotVel", 3);
        let global = model.settings.init_vel;
        let has_trans = descr.contains("#InitTransVel");
        let has_rot = descr.contains("#InitRotVel");
        let mut vel = [0.0; 6];
        if has_trans {
            vel[..trans.len()].copy_from_slice(&trans);
        } else if !global.is_zero() {
            vel[..3].copy_from_slice(&global.0);
        }
        if has_rot {
            vel[3..3 + rot.len()].copy_from_slice(&rot);
        }
        if has_trans || has_rot || !global.is_zero() {
            put!(w, "  urd ={}", e17(vel[0]));
            for v in &vel[1..] {
                put!(w, " {}", e17(*v));
            }
            w.put("\n");
        }
    }
    w.put("/\n\n");
}

// ---------------------------------------------------------------------------
// Beams
// ---------------------------------------------------------------------------

pub(super) fn write_beams(w: &mut SolverWriter<'_>) {
    for beam in w.model.keys_of_type(EntityType::Beam) {
        write_beam(w, beam);
    }
}

fn write_beam(w: &mut SolverWriter<'_>, key: EntityKey) {
    let model = w.model;
    let Some(b) = model.beam(key) else {
        return;
    };
    let descr = w.description(key);
    let triads: Vec<EntityKey> = b.triads.iter().flatten().copied().collect();

    w.begin("SUP_EL");
    w.print_id(key);
    put!(w, "  numTriads = {}\n  triadIds =", triads.len());
    for t in &triads {
        put!(w, " {}", model.base_id(*t).0);
    }
    w.put("\n");

    match b.property {
        Some(prop) => put!(w, "  elPropId = {}\n", model.base_id(prop).0),
        None => w.error(
            Some(key),
            format!("{} has no cross section property.", model.id_string(key)),
        ),
    }

    let shadow = b.shadow.code();
    put!(w, "  shadowPosAlg = {shadow}\n");
    if shadow == 1 && !write_ref_triads(w, &triads, &b.placement) {
        w.error(Some(key), format!("{} is not connected.", model.id_string(key)));
    }

    w.put("  massCorrFlag = 0\n");
    put!(w, "  stiffScale ={}\n  massScale  ={}\n", e17(b.stiff_scale), e17(b.mass_scale));
    let stiff_engine = crate::entity::int_after(descr, "#StiffScaleEngine");
    if stiff_engine > 0 {
        put!(w, "  stiffEngineId = {stiff_engine}\n");
    }
    let mass_engine = crate::entity::int_after(descr, "#MassScaleEngine");
    if mass_engine > 0 {
        put!(w, "  massEngineId = {mass_engine}\n");
    }
    put!(w, "  alpha1 ={},  alpha2 ={}\n", e17(b.alpha1), e17(b.alpha2));
    w.matrix17("  supPos =", &b.placement);
    if descr.contains("#savePos") {
        w.put("  savePos = 1\n");
    }
    w.save_var(key, 3);
    w.put("/\n");

    let base = model.base_id(key).0;
    for t in &triads {
        if let Some(triad) = model.triad(*t) {
            let local = triad.placement.relative_to(&b.placement);
            write_undeformed_position(w, base, model.base_id(*t).0, &local);
        }
    }
    w.put("\n");
}

// ---------------------------------------------------------------------------
// User-defined elements, tires and roads
// ---------------------------------------------------------------------------

pub(super) fn write_user_elements(w: &mut SolverWriter<'_>) {
    for key in w.model.keys_of_type(EntityType::UserDefinedElement) {
        let Some(u) = w.model.user_element(key) else {
            continue;
        };
        let descr = w.description(key);
        put!(w, "' {}\n", u.name);
        w.begin("USER_EL");
        w.print_id(key);
        put!(w, "  eType = {}\n  numTriads = {}\n  triadIDs =", u.type_id, u.triads.len());
        for t in &u.triads {
            put!(w, " {}", w.model.base_id(*t).0);
        }
        if u.stiff_scale != 1.0 {
            put!(w, "  stiffScale ={}\n", e17(u.stiff_scale));
        }
        if u.mass_scale != 1.0 {
            put!(w, "  massScale  ={}\n", e17(u.mass_scale));
        }
        put!(w, "\n  alpha1 ={}, alpha2 ={}\n", e17(u.alpha1), e17(u.alpha2));

        let ipar = ints_after(descr, "#Params", 100);
        let rpar = doubles_after(descr, "#Property", 100);
        let id_var = ints_after(descr, "#Engine", 10);
        put!(w, "  nipar = {}, nrpar = {}", ipar.len(), rpar.len());
        if !ipar.is_empty() {
            w.put("\n  ipar =");
            for v in &ipar {
                put!(w, " {v}");
            }
        }
        if !rpar.is_empty() {
            w.put("\n  rpar =");
            for v in &rpar {
                w.put(&e17(*v));
            }
        }
        if !id_var.is_empty() {
            put!(w, "  nvar = {}\n  idVar =", id_var.len());
            for v in &id_var {
                put!(w, " {v}");
            }
        }
        let morison = doubles_after(descr, "#Morison", 10);
        if !morison.is_empty() {
            w.put("\n  morison =");
            for v in &morison {
                w.put(&e17(*v));
            }
        }
        w.put("\n/\n\n");

        if u.triads.is_empty() {
            let name = w.model.id_string(key);
            w.error(Some(key), format!("{name} has no triads."));
        }
    }
}

pub(super) fn write_tires(w: &mut SolverWriter<'_>) {
    for key in w.model.keys_of_type(EntityType::Tire) {
        let model = w.model;
        let Some(t) = model.tire(key) else {
            continue;
        };
        let descr = w.description(key);
        w.begin("TIRE");
        w.print_id(key);
        put!(w, "  type         = '{}'\n", t.tire_type);
        put!(w, "  api          = '{}'\n", t.api);
        put!(w, "  tireDataFile = '{}'\n", w.options.correct_path(&t.data_file));

        let (Some(road), Some(joint)) = (t.road, t.joint) else {
            w.error(
                Some(key),
                format!(
                    "{} is inconsistent, no road or bearing joint connected.",
                    model.id_string(key)
                ),
            );
            w.put("/\n\n");
            continue;
        };
        put!(w, "  roadId       = {}\n", model.base_id(road).0);
        put!(w, "  jointId      = {}\n", model.base_id(joint).0);

        let mut tire_char = 14;
        if descr.contains("#SteadyState") {
            tire_char = 4;
        }
        if descr.contains("#MirrorTChar") {
            tire_char = -tire_char;
        }
        if descr.contains("#ISWTCH") {
            tire_char = crate::entity::int_after(descr, "#ISWTCH");
        }
        put!(w, "  tireChar     = {tire_char}\n");
        put!(w, "  Zoffset      = {}\n", e17(t.spindle_offset));
        if descr.contains("#FlipWCaxis") {
            w.put("  WCYalongZ    = 0\n");
        }
        let stiff = if descr.contains("#radialStiff") {
            crate::entity::double_after(descr, "#radialStiff")
        } else {
            t.vertical_stiffness
        };
        let damp = if descr.contains("#radialDamp") {
            crate::entity::double_after(descr, "#radialDamp")
        } else {
            t.vertical_damping
        };
        put!(w, "  radialStiff  = {}\n  radialDamp   = {}\n", e17(stiff), e17(damp));
        w.save_var(key, 9);
        w.put("/\n\n");
    }
}

pub(super) fn write_roads(w: &mut SolverWriter<'_>) {
    for key in w.model.keys_of_type(EntityType::Road) {
        let model = w.model;
        let Some(r) = model.road(key) else {
            continue;
        };
        let descr = w.description(key);
        w.begin("ROAD");
        w.print_id(key);
        if let Some(file) = &r.data_file {
            put!(w, "  roadDataFileName = '{}'\n", w.options.correct_path(file));
        } else if let Some(f) = r.function {
            put!(w, "  roadFuncId = {}\n", model.base_id(f).0);
            put!(w, "  Xoffset    = {}\n", g(r.x_offset));
            put!(w, "  Zshift     = {}\n", g(r.z_shift));
            w.put("  ThetaInRad = .false.\n");
            put!(w, "  Theta      = {}\n", g(r.z_rotation));
        }
        for (flag, field) in [
            ("#RoadXengId", "roadXengId"),
            ("#RoadYengId", "roadYengId"),
            ("#RoadZengId", "roadZengId"),
        ] {
            if descr.contains(flag) {
                put!(w, "  {field} = {}\n", crate::entity::int_after(descr, flag));
            }
        }
        w.put("/\n\n");
    }
}

// ---------------------------------------------------------------------------
// Turbine
// ---------------------------------------------------------------------------

/// `TURBINE_CONFIG` for the first turbine of the model. A turbine without
/// complete topology is skipped: the run goes ahead without wind loads.
pub(super) fn write_turbine(w: &mut SolverWriter<'_>) {
    let model = w.model;
    let turbines = model.keys_of_type(EntityType::Turbine);
    let Some(&key) = turbines.first() else {
        return;
    };
    if turbines.len() > 1 {
        warn!(count = turbines.len(), "only the first turbine is written");
    }
    let Some(turbine) = model.turbine(key) else {
        return;
    };
    if turbine.is_empty() {
        return;
    }

    if turbine.pitch_joints.len() < turbine.n_blades {
        let which = if turbine.pitch_joints.is_empty() { "no" } else { "too few" };
        w.error(Some(key), format!("{} has {which} pitch joints", model.id_string(key)));
        return;
    }
    let mut topology = [0; 5];
    for (id, slot) in topology.iter_mut().zip(&turbine.topology) {
        match slot {
            Some(k) => *id = model.base_id(*k).0,
            None => {
                error!(
                    turbine = %model.id_string(key),
                    "insufficient topology definition; wind loads will not be included"
                );
                return;
            }
        }
    }
    let pitch = &turbine.pitch_joints[..turbine.n_blades];

    w.begin("TURBINE_CONFIG");
    w.print_id(key);
    w.put("  ADFile = 'fedem_aerodyn.ipt'\n");
    put!(w, "  PtfmRef = {} HubRad = {}\n", f6(turbine.platform_ref), f6(turbine.hub_radius()));
    put!(
        w,
        "  towerTriad = {} nacelleTriad = {} hubTriad = {}\n",
        topology[TOWER_TRIAD],
        topology[NACELLE_TRIAD],
        topology[HUB_TRIAD]
    );
    put!(w, "  hubId = {} generatorJoint = {}", topology[HUB], topology[GENERATOR_JOINT]);
    if !pitch.is_empty() {
        w.put(" pitchJoint =");
    }
    for joint in pitch {
        put!(w, " {}", model.base_id(*joint).0);
    }

    // Two beam elements per blade segment.
    let n_tb = 2 * turbine.aero_centres.len();
    put!(w, "\n  nBlade = {} nTB = {n_tb} firstTriadID =", pitch.len());
    for joint in pitch {
        let slave = model.joint(*joint).and_then(|j| j.slave);
        put!(w, " {}", model.id_of(slave));
    }

    if let Some((first, rest)) = turbine.aero_centres.split_first() {
        put!(w, "\n  ADcentre = {} {}", e17(first[0]), e17(first[1]));
        for centre in rest {
            put!(w, "\n             {} {}", e17(centre[0]), e17(centre[1]));
        }
        w.put("\n  ADnodes =");
        for _ in &turbine.aero_centres {
            w.put(" 1 0");
        }
    }

    put!(w, "\n  CompAero = .{}. UserID = .false.\n/\n\n", turbine.wind);
}

// ---------------------------------------------------------------------------
// Additional masses
// ---------------------------------------------------------------------------

pub(super) fn write_masses(w: &mut SolverWriter<'_>) {
    for triad in w.model.keys_of_type(EntityType::Triad) {
        let has_mass = w.model.triad(triad).is_some_and(|t| t.has_add_mass());
        if has_mass && solver_ndofs(w, triad) > 0 {
            write_mass(w, triad);
        }
    }
}

fn write_mass(w: &mut SolverWriter<'_>, key: EntityKey) {
    let model = w.model;
    let Some(t) = model.triad(key) else {
        return;
    };
    let descr = w.description(key);

    w.begin("MASS");
    w.print_id_no_base(key);
    put!(w, "  triadId = {}", model.base_id(key).0);

    let m = t.add_mass(None);
    let mut mass = Vec3::new(m, 0.0, 0.0);
    let direction = |flag: &str| {
        let d = doubles_after(descr, flag, 3);
        let at = |i: usize| d.get(i).copied().unwrap_or(0.0);
        Vec3::new(at(0), at(1), at(2))
    };
    let m_dof = if descr.contains("#AddedMass") {
        mass = direction("#AddedMass").scale(m);
        -2
    } else if descr.contains("#MassDir") {
        mass = direction("#MassDir").normalized().scale(m);
        -1
    } else if descr.contains("#MassX") {
        1
    } else if descr.contains("#MassY") {
        2
    } else if descr.contains("#MassZ") {
        3
    } else {
        0
    };
    if m_dof != 0 {
        put!(w, "\n  dof = {m_dof}");
    }
    if m_dof == -2 {
        w.put("\n  addedMass = .true.");
    }

    let mut engine = crate::entity::int_after(descr, "#MassScaleEngine");
    if engine > 0 {
        let is_engine = model
            .find_by_base_id(crate::id::BaseId(engine))
            .is_some_and(|k| model.engine(k).is_some());
        if !is_engine {
            warn!(
                "#MassScaleEngine {engine} ignored for {}. No Engine with this base ID.",
                model.id_string(key)
            );
            engine = 0;
        }
    }
    if engine <= 0 {
        engine = model.id_of(t.mass_engine);
    }

    let six = t.ndofs() == 6;
    if engine > 0 {
        put!(w, "\n  mass1 ={}", e17(mass[0]));
        if m_dof < 0 {
            put!(w, "{}{}", e18(mass[1]), e18(mass[2]));
        }
        put!(w, "\n  massEngineId = {engine}");
        if six {
            write_inertia_rows(w, "II1", t.add_mass(Some(3)), t.add_mass(Some(4)), t.add_mass(Some(5)));
            let ii_engine = match model.id_of(t.inertia_engine) {
                0 => engine,
                id => id,
            };
            put!(w, "\n  IIengineId = {ii_engine}");
        }
    } else {
        put!(w, "\n  mass0 ={}", e17(mass[0]));
        if m_dof < 0 {
            put!(w, "{}{}\n", e18(mass[1]), e18(mass[2]));
        }
        if six {
            write_inertia_rows(w, "II0", t.add_mass(Some(3)), t.add_mass(Some(4)), t.add_mass(Some(5)));
        }
    }
    w.put("\n/\n\n");
}

fn write_inertia_rows(w: &mut SolverWriter<'_>, name: &str, ixx: f64, iyy: f64, izz: f64) {
    put!(w, "\n  {name}   ={}{}{}", e17(ixx), e18(0.0), e18(0.0));
    put!(w, "\n         {}{}{}", e17(0.0), e18(iyy), e18(0.0));
    put!(w, "\n         {}{}{}", e17(0.0), e18(0.0), e18(izz));
}

// ---------------------------------------------------------------------------
// Strain rosettes
// ---------------------------------------------------------------------------

pub(super) fn write_rosettes(w: &mut SolverWriter<'_>) {
    for key in w.model.keys_of_type(EntityType::StrainRosette) {
        let model = w.model;
        let Some(r) = model.strain_rosette(key) else {
            continue;
        };
        let part = r.part.and_then(|p| model.part(p).map(|data| (p, data)));
        if part.is_some_and(|(_, p)| p.suppressed) {
            continue;
        }
        w.begin("STRAIN_ROSETTE");
        w.print_id(key);
        if let Some((p, _)) = part {
            put!(w, "  linkId = {}\n", model.base_id(p).0);
        }
        put!(w, "  type = '{}'\n", r.rosette_type.as_str());
        put!(w, "  zeroInit = {}\n", i32::from(r.zero_init));
        put!(w, "  numnod = {}\n  nodes =", r.nodes.len());
        for n in &r.nodes {
            put!(w, " {n}");
        }
        w.put("\n");
        let pos = part.map_or(r.placement, |(_, p)| p.placement.compose(&r.placement));
        w.matrix17("  rPos =", &pos);
        put!(w, "  zPos ={}\n  Emod ={}\n  nu   ={}\n", e17(r.z_pos), e17(r.e_mod), e17(r.nu));
        w.put("/\n\n");
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::emit_to_string;
    use crate::config::EmitOptions;
    use crate::dof::DofStatus;
    use crate::geometry::{Mat34, Vec3};
    use crate::model::Model;
    use crate::codec::CodecError;
    use crate::id::EntityKey;
    use crate::joint::{Joint, JointVariant};
    use crate::load::Load;
    use crate::part::{Beam, BeamProperty, Material, Part, PartStiffness, Road, Tire, Turbine};
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

    // -----------------------------------------------------------------------
    // Triads
    // -----------------------------------------------------------------------

    #[test]
    fn triad_record_layout() {
        let mut m = Model::default();
        let mut t = Triad::at(Mat34::at(Vec3::new(1.0, 2.0, 3.0)));
        t.set_add_mass(0, 1.0);
        t.set_status(2, DofStatus::Fixed);
        let t = m.insert(t);
        m.header_mut(t).unwrap().description = "Hub\nsecond line".into();
        let text = render(&mut m);
        let triad = record(&text, "&TRIAD");
        assert!(triad.starts_with(
            "&TRIAD\n  id = 1\n  extId = 1\n  extDescr = 'Hub'\n  nDOFs = 6\n\
             \x20 ur  =   1.000000000e+00   0.000000000e+00   0.000000000e+00   1.000000000e+00\n"
        ));
        assert!(triad.contains("   3.000000000e+00\n  BC = 1 1 0 1 1 1\n/\n"));
        assert!(!triad.contains("urd"));
    }

    #[test]
    fn global_velocity_fills_translations() {
        let mut m = Model::default();
        m.settings.init_vel = Vec3::new(2.0, 0.0, 0.0);
        let mut t = Triad::default();
        t.set_add_mass(0, 1.0);
        m.insert(t);
        let text = render(&mut m);
        assert!(text.contains(
            "  urd =   2.000000000e+00   0.000000000e+00   0.000000000e+00   0.000000000e+00   0.000000000e+00   0.000000000e+00\n"
        ));
    }

    #[test]
    fn triad_on_suppressed_part_has_no_dofs() {
        let mut m = Model::default();
        let p = m.insert(Part {
            suppressed: true,
            ..Part::default()
        });
        let mut t = Triad::default();
        t.parts.push(p);
        t.set_init_vel(0, 1.0);
        m.insert(t);
        let text = render(&mut m);
        assert!(text.contains("  nDOFs = 0\n"));
        assert!(!text.contains("urd"));
        assert!(!text.contains("&SUP_EL"));
    }

    // -----------------------------------------------------------------------
    // Parts and beams
    // -----------------------------------------------------------------------

    #[test]
    fn generic_part_gets_dummy_cog_triad() {
        let mut m = Model::default();
        let p = m.insert(Part {
            mass: 10.0,
            stiffness: PartStiffness::Rigid,
            ..Part::default()
        });
        for x in [1.0, 2.0] {
            let mut t = Triad::at(Mat34::at(Vec3::new(x, 0.0, 0.0)));
            t.parts.push(p);
            m.insert(t);
        }
        let text = render(&mut m);
        let sup = record(&text, "&SUP_EL");
        assert!(sup.contains("  numTriads = 3\n  triadIds = -1 2 3\n"));
        assert!(sup.contains("  shadowPosAlg = 1\n  refTriad1Id = "));
        assert!(sup.contains("  alpha1 =  0.000000000e+00,  alpha2 =  0.000000000e+00\n"));
        assert!(text.contains("\n! Center of Gravity solver triad\n&TRIAD\n  id = -1\n  nDOFs = 6\n"));
        assert!(text.contains("&TRIAD_UNDPOS\n  supElId = 1\n  triadId = -1\n"));
        assert!(text.contains(
            "&TRIAD_UNDPOS\n  supElId = 1\n  triadId = 3\n\
             \x20 undPosInSupElSystem =  1.000000000e+00   0.000000000e+00   0.000000000e+00   2.000000000e+00\n"
        ));
        assert!(text.contains(
            "&GENERIC_PART\n  supElId =  1\n  mass    =   1.000000000e+01\n  inertia ="
        ));
        assert!(text.contains("\n  isRigid =  1\n/\n\n"));
    }

    #[test]
    fn triad_at_cog_replaces_dummy() {
        let mut m = Model::default();
        let p = m.insert(Part::default());
        for x in [0.0, 2.0] {
            let mut t = Triad::at(Mat34::at(Vec3::new(x, 0.0, 0.0)));
            t.parts.push(p);
            m.insert(t);
        }
        let text = render(&mut m);
        assert!(text.contains("  numTriads = 2\n  triadIds = 2 3\n"));
        assert!(!text.contains("Center of Gravity"));
        assert!(text.contains("\n  kt      =   1.000000000e+09\n  kr      =   1.000000000e+09\n/\n"));
    }

    #[test]
    fn beam_without_property_is_a_record_error() {
        let mut m = Model::default();
        let a = m.insert(Triad::default());
        let b = m.insert(Triad::at(Mat34::at(Vec3::new(1.0, 0.0, 0.0))));
        let beam = m.insert(Beam {
            triads: [Some(a), Some(b)],
            ..Beam::default()
        });
        let err = emit_to_string(&mut m, &EmitOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("A total of 1 errors"));

        let steel = Material {
            rho: 7850.0,
            e: 2.1e11,
            g: 8.0e10,
        };
        let prop = m.insert(BeamProperty::pipe(1.0, 2.0, 3.0, Some(steel)));
        m.beam_mut(beam).unwrap().property = Some(prop);
        let text = render(&mut m);
        let sup = record(&text, "&SUP_EL");
        assert!(sup.contains("  numTriads = 2\n  triadIds = 1 2\n  elPropId = 4\n"));
        assert!(sup.contains("  massCorrFlag = 0\n"));
    }

    // -----------------------------------------------------------------------
    // Tires, roads and masses
    // -----------------------------------------------------------------------

    #[test]
    fn road_from_function() {
        let mut m = Model::default();
        let f = m.insert(crate::function::Function::constant(0.0));
        m.insert(Road {
            function: Some(f),
            x_offset: 1.5,
            ..Road::default()
        });
        let text = render(&mut m);
        assert!(text.contains(
            "&ROAD\n  id = 2\n  extId = 1\n  roadFuncId = 1\n  Xoffset    = 1.5\n  Zshift     = 0\n\
             \x20 ThetaInRad = .false.\n  Theta      = 0\n/\n"
        ));
    }

    #[test]
    fn tire_without_road_is_error() {
        let mut m = Model::default();
        m.insert(Tire::default());
        assert!(emit_to_string(&mut m, &EmitOptions::default()).is_err());
    }

    #[test]
    fn directional_mass() {
        let mut m = Model::default();
        let mut t = Triad::default();
        t.set_ndofs(3);
        t.set_add_mass(0, 3.0);
        t.set_add_mass(1, 3.0);
        t.set_add_mass(2, 3.0);
        let t = m.insert(t);
        m.header_mut(t).unwrap().description = "#MassY".into();
        let text = render(&mut m);
        assert!(text.contains(
            "&MASS\n  extId = 1\n  extDescr = '#MassY'\n  triadId = 1\n  dof = 2\n  mass0 =  3.000000000e+00\n/\n"
        ));
    }

    // -----------------------------------------------------------------------
    // Turbine
    // -----------------------------------------------------------------------

    fn massive(m: &mut Model, at: Vec3) -> EntityKey {
        let mut t = Triad::at(Mat34::at(at));
        t.set_add_mass(0, 1.0);
        m.insert(t)
    }

    fn revolute(m: &mut Model, slave: EntityKey, master: EntityKey) -> EntityKey {
        let mut j = Joint::new(JointVariant::Revolute { tz_dof: false });
        j.slave = Some(slave);
        j.master = Some(master);
        m.insert(j)
    }

    /// Tower, nacelle, hub triad and hub apex get ids 1-4, the generator
    /// joint 5, blade roots 6.., then one pitch joint per root.
    fn turbine_model(m: &mut Model, roots: usize) -> (EntityKey, Vec<EntityKey>) {
        let topo: Vec<EntityKey> = (0..4).map(|i| massive(m, Vec3::new(0.0, 0.0, i as f64))).collect();
        let generator = revolute(m, topo[2], topo[1]);
        let blade_roots: Vec<EntityKey> = (0..roots).map(|i| massive(m, Vec3::new(1.0, i as f64, 4.0))).collect();
        let pitch = blade_roots.iter().map(|r| revolute(m, *r, topo[3])).collect();
        let turbine = m.insert(Turbine {
            platform_ref: 10.0,
            hub_diameter: 3.0,
            n_blades: 3,
            topology: [Some(topo[0]), Some(topo[1]), Some(topo[2]), Some(topo[3]), Some(generator)],
            pitch_joints: pitch,
            aero_centres: vec![[0.25, 0.0], [0.3, -0.1]],
            wind: true,
        });
        (turbine, topo)
    }

    #[test]
    fn turbine_config_record() {
        let mut m = Model::default();
        turbine_model(&mut m, 3);
        let text = render(&mut m);
        assert_eq!(
            record(&text, "&TURBINE_CONFIG"),
            "&TURBINE_CONFIG\n  id = 12\n  extId = 1\n  ADFile = 'fedem_aerodyn.ipt'\n\
             \x20 PtfmRef = 10.000000 HubRad = 1.500000\n\
             \x20 towerTriad = 1 nacelleTriad = 2 hubTriad = 3\n\
             \x20 hubId = 4 generatorJoint = 5 pitchJoint = 9 10 11\n\
             \x20 nBlade = 3 nTB = 4 firstTriadID = 6 7 8\n\
             \x20 ADcentre =   2.500000000e-01   0.000000000e+00\n\
             \x20              3.000000000e-01  -1.000000000e-01\n\
             \x20 ADnodes = 1 0 1 0\n\
             \x20 CompAero = .true. UserID = .false.\n/\n"
        );
    }

    #[test]
    fn turbine_follows_beam_properties_and_precedes_loads() {
        let mut m = Model::default();
        let (_, topo) = turbine_model(&mut m, 3);
        let prop = m.insert(BeamProperty::pipe(1.0, 2.0, 3.0, None));
        m.insert(Beam {
            triads: [Some(topo[0]), Some(topo[1])],
            property: Some(prop),
            ..Beam::default()
        });
        m.insert(Load {
            triad: Some(topo[0]),
            magnitude: 5.0,
            ..Load::default()
        });
        let text = render(&mut m);

        let property = text.find("&ELEMENT_PROPERTY\n").unwrap();
        let turbine = text.find("&TURBINE_CONFIG\n").unwrap();
        let load = text.find("&LOAD\n").unwrap();
        assert!(property < turbine && turbine < load);
        assert_eq!(text.matches("&TURBINE_CONFIG\n").count(), 1);
    }

    #[test]
    fn turbine_without_enough_pitch_joints_is_record_error() {
        let mut m = Model::default();
        turbine_model(&mut m, 2);
        match emit_to_string(&mut m, &EmitOptions::default()) {
            Err(CodecError::Records(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].message.ends_with("has too few pitch joints"));
            }
            other => panic!("expected record error, got {other:?}"),
        }
    }

    #[test]
    fn turbine_with_incomplete_topology_is_skipped() {
        let mut m = Model::default();
        let (turbine, _) = turbine_model(&mut m, 3);
        m.turbine_mut(turbine).unwrap().topology[4] = None;
        let text = render(&mut m);
        assert!(!text.contains("TURBINE_CONFIG"));

        m.turbine_mut(turbine).unwrap().topology = [None; 5];
        assert!(!render(&mut m).contains("TURBINE_CONFIG"));
    }
}
