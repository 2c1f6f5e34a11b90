//! Master lines, transmissions, generic objects and beam properties.

use super::format::{e17, f6};
use super::writer::SolverWriter;
use crate::entity::EntityType;
use crate::geometry::Mat34;
use crate::id::EntityKey;
use crate::line::{LineKind, LineMaster, curve_sections};
use crate::part::CrossSection;

// ---------------------------------------------------------------------------
// Master lines
// ---------------------------------------------------------------------------

pub(super) fn write_line_masters(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::LineMaster) {
        let Some(line) = model.line_master(key) else {
            continue;
        };
        match line.kind {
            LineKind::Straight => write_straight_master(w, key, line),
            LineKind::CamCurve { .. } => write_cam_master(w, key, line),
        }
    }
}

fn triad_frames(w: &SolverWriter<'_>, line: &LineMaster) -> Vec<Mat34> {
    line.triads
        .iter()
        .filter_map(|t| w.model.triad(*t))
        .map(|t| t.placement)
        .collect()
}

fn write_master_curve(w: &mut SolverWriter<'_>, key: EntityKey, line: &LineMaster, loop_length: f64) {
    let model = w.model;
    w.begin("MASTER_CURVE");
    w.print_id(key);
    put!(w, "  nTriads = {}\n  triadIds =", line.triads.len());
    for (i, t) in line.triads.iter().enumerate() {
        let id = model.base_id(*t).0;
        if i % 8 == 0 {
            put!(w, "\n             {id}");
        } else {
            put!(w, " {id}");
        }
    }

    let extended = w.description(key).contains("#Extended")
        || model
            .referrers(key)
            .into_iter()
            .filter(|r| model.joint(*r).is_some())
            .any(|r| w.description(r).contains("#Extended"));
    if extended {
        w.put("\n  isExtended = 1\n");
    }
    if loop_length > 0.0 {
        put!(w, "\n  isLooping = 1\n  loopLength ={}", e17(loop_length));
    }
    w.put("\n/\n");
}

fn write_master_pos(w: &mut SolverWriter<'_>, key: EntityKey, triad: EntityKey, ur: &Mat34) {
    put!(
        w,
        "&MASTER_POS\n  masterId = {}\n  triadId  = {}\n",
        w.model.base_id(key).0,
        w.model.base_id(triad).0
    );
    w.records += 1;
    w.matrix17("  PosInGlobal =", ur);
}

fn write_straight_master(w: &mut SolverWriter<'_>, key: EntityKey, line: &LineMaster) {
    write_master_curve(w, key, line, 0.0);
    let frames = triad_frames(w, line);
    let mut slide = 0.0;
    for (i, (triad, ur)) in line.triads.iter().zip(&frames).enumerate() {
        if i > 0 {
            slide += ur.translation().sub(&frames[i - 1].translation()).length();
        }
        write_master_pos(w, key, *triad, ur);
        let up = ur.axis(0);
        put!(w, "  slideVarVal ={}\n", e17(slide));
        put!(w, "  upVec       ={} {} {}\n/\n", e17(up.0[0]), e17(up.0[1]), e17(up.0[2]));
    }
    w.put("\n");
}

/// Cam curves are written as straight chords between the master triads,
/// so every section has zero curvature.
fn write_cam_master(w: &mut SolverWriter<'_>, key: EntityKey, line: &LineMaster) {
    let model = w.model;
    let frames = triad_frames(w, line);
    let looping = line.is_looping();
    let sections = curve_sections(&frames, looping);
    let loop_length = if looping {
        sections.last().map_or(0.0, |s| s.end_slide)
    } else {
        0.0
    };
    write_master_curve(w, key, line, loop_length);

    if sections.is_empty() {
        let owner = model
            .referrers(key)
            .into_iter()
            .find(|r| model.joint(*r).is_some())
            .unwrap_or(key);
        w.error(Some(key), format!("{} has zero length.", model.id_string(owner)));
        return;
    }

    let n = line.triads.len().min(frames.len());
    for i in 0..n {
        let (ur, slide, up) = if !looping && i == n - 1 {
            let s = &sections[i - 1];
            (s.end, s.end_slide, s.end.axis(0))
        } else {
            let s = &sections[i];
            (s.start, s.start_slide, s.start.axis(0))
        };
        write_master_pos(w, key, line.triads[i], &ur);
        put!(w, "  curvature   ={}\n", e17(0.0));
        put!(w, "  slideVarVal ={}\n", e17(slide));
        put!(w, "  upVec       ={} {} {}\n", e17(up.0[0]), e17(up.0[1]), e17(up.0[2]));
        w.put("/\n");
    }
    w.put("\n");
}

// ---------------------------------------------------------------------------
// Transmissions
// ---------------------------------------------------------------------------

pub(super) fn write_higher_pairs(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::HigherPair) {
        let Some(hp) = model.higher_pair(key) else {
            continue;
        };
        let (Some(input), Some(output)) = (hp.input_joint, hp.output_joint) else {
            w.error(
                Some(key),
                format!("{} is not connected to two joints.", model.id_string(key)),
            );
            continue;
        };
        put!(w, "! {} transmission internal connection\n", hp.kind.ui_name());
        w.begin("HIGHER_PAIR");
        w.print_id(key);
        put!(w, "  slaveJoint     = {}\n", model.base_id(output).0);
        put!(w, "  slaveJointDof  = {}\n", hp.output_dof);
        put!(w, "  masterJoint    = {}\n", model.base_id(input).0);
        put!(w, "  masterJointDof = {}\n", hp.input_dof);
        put!(w, "  coeff          = {}\n", e17(hp.ratio));
        w.put("/\n\n");
    }
}

// ---------------------------------------------------------------------------
// Generic objects
// ---------------------------------------------------------------------------

/// Records given verbatim by the user: a record name and its body.
pub(super) fn write_generic_objects(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::GenericObject) {
        let Some(obj) = model.generic_object(key) else {
            continue;
        };
        if obj.object_type.is_empty() {
            continue;
        }
        w.put("'Generic DB-object\n");
        w.begin(&obj.object_type);
        w.print_id(key);
        put!(w, "{}\n/\n\n", obj.definition);
    }
}

// ---------------------------------------------------------------------------
// Beam properties
// ---------------------------------------------------------------------------

/// `ELEMENT_PROPERTY` for every property used by at least one beam.
pub(super) fn write_beam_properties(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::BeamProperty) {
        let Some(prop) = model.beam_property(key) else {
            continue;
        };
        let Some(beam) = model
            .referrers(key)
            .into_iter()
            .find(|r| model.beam(*r).is_some())
        else {
            continue;
        };

        w.put("'Beam properties\n");
        w.begin("ELEMENT_PROPERTY");
        w.print_id(key);
        let [sy, sz] = prop.shear_centre;
        match prop.section {
            CrossSection::Generic {
                ea,
                ei,
                git,
                gas,
                mass,
                ro_ip,
            } => {
                put!(
                    w,
                    "  geometry = {} {} {} {} {} {} {} {}\n",
                    e17(ea),
                    e17(ei[0]),
                    e17(ei[1]),
                    e17(git),
                    e17(gas[0]),
                    e17(gas[1]),
                    f6(sy),
                    f6(sz)
                );
                // Negative E: stiffness values are given on the geometry line.
                put!(w, "  material = {}  -1.0  1.0        {}\n", e17(mass), e17(ro_ip));
            }
            CrossSection::Pipe {
                area,
                iy,
                iz,
                ip,
                shear_reduction,
                material,
            } => {
                put!(
                    w,
                    "  geometry = {} {} {} {} {} {} {} {}\n",
                    e17(area),
                    e17(iy),
                    e17(iz),
                    e17(ip),
                    f6(shear_reduction[0]),
                    f6(shear_reduction[1]),
                    f6(sy),
                    f6(sz)
                );
                match material {
                    Some(m) => put!(w, "  material = {} {} {}\n", e17(m.rho), e17(m.e), e17(m.g)),
                    None => w.error(
                        Some(key),
                        format!(
                            "No material has been assigned to {} which is used by {}",
                            model.id_string(key),
                            model.id_string(beam)
                        ),
                    ),
                }
            }
        }
        w.put("/\n\n");
    }
}
