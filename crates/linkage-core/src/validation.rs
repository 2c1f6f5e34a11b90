//! Consistency checks run before a solver file is written.
//!
//! Every check appends [`ValidationIssue`]s to a [`ValidationReport`]; any
//! issue blocks emission. The pass also materialises motion children for
//! PRESCRIBED DOFs so that the writer finds them.

use tracing::{error, warn};

use crate::control::ControlKind;
use crate::dof::{DofStatus, MAX_DOF};
use crate::entity::{EntityData, EntityType};
use crate::function::FunctionKind;
use crate::graph::EngineGraph;
use crate::id::EntityKey;
use crate::load::MotionType;
use crate::model::{DofChild, Model};
use crate::spring::SpringBase;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Domain area a check belongs to, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckArea {
    Joints,
    Parts,
    Triads,
    AxialSprings,
    AxialDampers,
    JointSprings,
    JointDampers,
    Motions,
    Splines,
    Control,
    DeviceFunctions,
    Engines,
}

/// One detected inconsistency.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub area: CheckArea,
    pub entity: Option<EntityKey>,
    pub message: String,
}

/// Aggregated result of [`validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    /// Non-blocking remarks.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.issues.len()
    }

    pub fn count(&self, area: CheckArea) -> usize {
        self.issues.iter().filter(|i| i.area == area).count()
    }

    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// The closing line printed when checks fail.
    pub fn summary(&self) -> String {
        format!("A total of {} errors were found.", self.total())
    }

    fn fail(&mut self, area: CheckArea, entity: Option<EntityKey>, message: String) {
        error!(?area, "{message}");
        self.issues.push(ValidationIssue {
            area,
            entity,
            message,
        });
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in &self.issues {
            writeln!(f, "ERROR: {}", issue.message)?;
        }
        if !self.is_ok() {
            write!(f, "\n---> {}\n", self.summary())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run every check over `model`.
pub fn validate(model: &mut Model) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_joints(model, &mut report);
    check_parts(model, &mut report);
    check_triads(model, &mut report);
    check_axial_springs(model, &mut report);
    check_axial_dampers(model, &mut report);
    check_joint_springs(model, &mut report);
    check_joint_dampers(model, &mut report);
    check_motions(model, &mut report);
    check_splines(model, &mut report);
    check_control(model, &mut report);
    check_device_functions(model, &mut report);
    check_engines(model, &mut report);
    report
}

fn check_joints(model: &mut Model, report: &mut ValidationReport) {
    for joint in model.keys_of_type(EntityType::Joint) {
        if model.is_joint_suppressed(joint) && model.is_measured(joint) {
            report.fail(
                CheckArea::Joints,
                Some(joint),
                format!("{} is suppressed and used as Function argument.", model.id_string(joint)),
            );
            continue;
        }
        for dof in 0..MAX_DOF {
            let prescribed = model
                .joint(joint)
                .is_some_and(|j| j.is_legal(dof) && j.status(dof) == DofStatus::Prescribed);
            if prescribed {
                model.joint_child(joint, DofChild::Motion, dof, true);
            }
        }
    }
}

fn check_parts(model: &Model, report: &mut ValidationReport) {
    for part in model.keys_of_type(EntityType::Part) {
        if model.part(part).is_some_and(|p| p.suppressed) {
            continue;
        }
        if model.triads_on_part(part).is_empty() {
            report.fail(
                CheckArea::Parts,
                Some(part),
                format!("{} has no Triads attached to it.", model.id_string(part)),
            );
        }
    }
}

fn check_triads(model: &mut Model, report: &mut ValidationReport) {
    for triad in model.keys_of_type(EntityType::Triad) {
        let dependent_in = model
            .joints_with_slave(triad)
            .into_iter()
            .filter(|j| !model.is_contact_element(*j) && !model.is_global_spring(*j))
            .count();
        let Some(t) = model.triad(triad) else {
            continue;
        };
        let name = model.id_string(triad);

        if dependent_in > 1 {
            report.fail(
                CheckArea::Triads,
                Some(triad),
                format!("{name} is dependent in more than one joint."),
            );
        } else if dependent_in == 1 && t.has_constraints(false) {
            report.fail(
                CheckArea::Triads,
                Some(triad),
                format!("{name} is dependent but has explicit constraints."),
            );
        } else {
            let prescribed: Vec<usize> = (0..t.ndofs())
                .filter(|d| t.status(*d) == DofStatus::Prescribed)
                .collect();
            for dof in prescribed {
                model.triad_child(triad, DofChild::Motion, dof, true);
            }
        }

        let Some(t) = model.triad(triad) else {
            continue;
        };
        if t.fully_constrained(false) {
            if t.has_add_mass() {
                report.warn(format!("Additional mass on fully constrained {name} has no effect."));
            }
            continue;
        }

        if !t.is_attached() {
            if model.is_master_triad(triad) {
                continue;
            }
            if t.has_add_mass() || has_element_binding(model, triad) {
                report.warn(format!("{name} is not attached to a part."));
                continue;
            }
            report.fail(
                CheckArea::Triads,
                Some(triad),
                format!(
                    "{name} is not attached to a part or element, and has neither \
                     additional mass, springs nor dampers coupled to it."
                ),
            );
        } else if model.is_triad_suppressed(triad) && model.is_measured(triad) {
            report.fail(
                CheckArea::Triads,
                Some(triad),
                format!("{name} is on suppressed parts, but has sensors coupled to it."),
            );
        }
    }
}

/// Beams, user elements and axial springs or dampers connected to `triad`.
fn has_element_binding(model: &Model, triad: EntityKey) -> bool {
    model.referrers(triad).into_iter().any(|k| {
        matches!(
            model.entity_type(k),
            Some(
                EntityType::Beam
                    | EntityType::UserDefinedElement
                    | EntityType::AxialSpring
                    | EntityType::AxialDamper
            )
        )
    })
}

fn yield_without_stiffness(model: &Model, base: &SpringBase) -> bool {
    let has_yield = base
        .spring_char
        .and_then(|c| model.spring_char(c))
        .is_some_and(|c| c.has_yield());
    has_yield && base.function.is_none() && !base.has_stiffness()
}

fn check_axial_springs(model: &Model, report: &mut ValidationReport) {
    for spring in model.keys_of_type(EntityType::AxialSpring) {
        let Some(s) = model.axial_spring(spring) else {
            continue;
        };
        let name = model.id_string(spring);
        if s.triads.iter().any(Option::is_none) {
            report.fail(
                CheckArea::AxialSprings,
                Some(spring),
                format!("{name} is not attached to any triads."),
            );
        } else if yield_without_stiffness(model, &s.base) {
            report.fail(
                CheckArea::AxialSprings,
                Some(spring),
                format!("{name} has a yield characteristic but no base stiffness."),
            );
        }
    }
}

fn check_axial_dampers(model: &Model, report: &mut ValidationReport) {
    for damper in model.keys_of_type(EntityType::AxialDamper) {
        if model
            .axial_damper(damper)
            .is_some_and(|d| d.triads.iter().any(Option::is_none))
        {
            report.fail(
                CheckArea::AxialDampers,
                Some(damper),
                format!("{} is not attached to any triads.", model.id_string(damper)),
            );
        }
    }
}

fn check_joint_springs(model: &Model, report: &mut ValidationReport) {
    for spring in model.keys_of_type(EntityType::JointSpring) {
        let Some(s) = model.joint_spring(spring) else {
            continue;
        };
        let name = model.id_string(spring);
        match s.owner.and_then(|o| model.joint(o)) {
            None => report.fail(
                CheckArea::JointSprings,
                Some(spring),
                format!("{name} is not attached to a joint."),
            ),
            Some(j) if !j.is_legal(s.dof) => report.fail(
                CheckArea::JointSprings,
                Some(spring),
                format!("{name} is attached to an illegal joint DOF."),
            ),
            Some(_) if yield_without_stiffness(model, &s.base) => report.fail(
                CheckArea::JointSprings,
                Some(spring),
                format!("{name} has a yield characteristic but no base stiffness."),
            ),
            Some(_) => {}
        }
    }
}

fn check_joint_dampers(model: &Model, report: &mut ValidationReport) {
    for damper in model.keys_of_type(EntityType::JointDamper) {
        let Some(d) = model.joint_damper(damper) else {
            continue;
        };
        let name = model.id_string(damper);
        match d.owner.and_then(|o| model.joint(o)) {
            None => report.fail(
                CheckArea::JointDampers,
                Some(damper),
                format!("{name} is not attached to a joint."),
            ),
            Some(j) if !j.is_legal(d.dof) => report.fail(
                CheckArea::JointDampers,
                Some(damper),
                format!("{name} is attached to an illegal joint DOF."),
            ),
            Some(_) => {}
        }
    }
}

fn check_motions(model: &Model, report: &mut ValidationReport) {
    if !model.settings.quasi_static {
        return;
    }
    for motion in model.keys_of_type(EntityType::DofMotion) {
        let Some(m) = model.dof_motion(motion) else {
            continue;
        };
        if m.owner.is_some() && m.motion_type != MotionType::Deflection {
            report.fail(
                CheckArea::Motions,
                Some(motion),
                format!(
                    "{} prescribes a {} in a quasi-static setup.",
                    model.id_string(motion),
                    m.motion_type.as_str()
                ),
            );
        }
    }
}

fn check_splines(model: &Model, report: &mut ValidationReport) {
    for function in model.keys_of_type(EntityType::Function) {
        if let Some(FunctionKind::Spline { values }) = model.function(function).map(|f| &f.kind) {
            if values.len() < 8 {
                report.fail(
                    CheckArea::Splines,
                    Some(function),
                    format!("Too few control points in {}.", model.id_string(function)),
                );
            }
        }
    }
}

fn check_control(model: &Model, report: &mut ValidationReport) {
    let lines: Vec<_> = model
        .keys_of_type(EntityType::ControlLine)
        .into_iter()
        .filter_map(|k| model.control_line(k).cloned())
        .collect();

    for element in model.keys_of_type(EntityType::ControlElement) {
        let Some(e) = model.control_element(element) else {
            continue;
        };
        let id = model.user_id(element).0;
        let ui = e.kind.name();
        for port in 1..=e.kind.input_ports() {
            let connected = lines
                .iter()
                .any(|l| l.end == Some(element) && l.port == port);
            if !connected {
                report.fail(
                    CheckArea::Control,
                    Some(element),
                    format!("Port {port} in element {id} ({ui}) is not connected."),
                );
            }
        }
        let has_output = lines.iter().any(|l| l.start == Some(element));
        if e.kind != ControlKind::Output && !has_output {
            report.fail(
                CheckArea::Control,
                Some(element),
                format!("Output port in element {id} ({ui}) is not connected."),
            );
        }
        if e.kind == ControlKind::Input && e.engine.is_none() {
            report.fail(
                CheckArea::Control,
                Some(element),
                format!("No input specified for element {id}."),
            );
        }
    }
}

fn check_device_functions(model: &Model, report: &mut ValidationReport) {
    for function in model.keys_of_type(EntityType::Function) {
        let Some(entity) = model.get(function) else {
            continue;
        };
        if let EntityData::Function(f) = &entity.data {
            if let FunctionKind::Device { file_name, .. } = &f.kind {
                if file_name.trim().is_empty() {
                    report.fail(
                        CheckArea::DeviceFunctions,
                        Some(function),
                        format!("No file specified for {}.", entity.id_string()),
                    );
                }
            }
        }
    }
}

fn check_engines(model: &Model, report: &mut ValidationReport) {
    for engine in EngineGraph::from_model(model).cyclic_engines() {
        report.fail(
            CheckArea::Engines,
            Some(engine),
            format!("{} depends on its own output.", model.id_string(engine)),
        );
    }
}
