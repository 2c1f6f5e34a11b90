//! Name resolution: turns a [`ModelData`] description into a connected
//! [`Model`].
//!
//! All names share one namespace. Entities are created in dependency
//! order (functions, parts, triads, joints, springs, engines, loads,
//! motions); engines are created before any of their arguments are
//! resolved so that they may measure each other. Each entity keeps its
//! name as its tag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use linkage_core::config::MechanismSettings;
use linkage_core::dof::{DOF_NAMES, DofStatus};
use linkage_core::entity::{EntityData, EntityType};
use linkage_core::function::{Engine, EngineArg, Function, FunctionKind};
use linkage_core::geometry::{Mat34, Vec3};
use linkage_core::id::EntityKey;
use linkage_core::joint::{Joint, JointVariant};
use linkage_core::line::{LineKind, LineMaster};
use linkage_core::load::{Load, LoadKind, MotionType};
use linkage_core::model::{DofChild, Model};
use linkage_core::part::Part;
use linkage_core::sensor::SensorEntity;
use linkage_core::spring::{AxialDamper, AxialSpring, DamperBase, SpringBase};
use linkage_core::triad::Triad;
use tracing::{debug, info};

use crate::loader::{DataLoadError, check_duplicate, resolve_name};
use crate::schema::*;

/// Name that engine arguments use for simulation time.
pub const TIME_NAME: &str = "time";

/// A model built from a description, with its name table.
#[derive(Debug, Clone)]
pub struct BuiltModel {
    pub model: Model,
    pub names: HashMap<String, EntityKey>,
}

impl BuiltModel {
    pub fn key(&self, name: &str) -> Option<EntityKey> {
        self.names.get(name).copied()
    }
}

struct Builder<'a> {
    file: &'a Path,
    model: Model,
    names: HashMap<String, EntityKey>,
}

/// Build a model from `data` under `settings`. `file` labels errors.
pub fn build_model(
    data: &ModelData,
    settings: MechanismSettings,
    file: &Path,
) -> Result<BuiltModel, DataLoadError> {
    let mut b = Builder {
        file,
        model: Model::new(settings),
        names: HashMap::new(),
    };

    for f in &data.functions {
        b.function(f)?;
    }
    for p in &data.parts {
        b.part(p)?;
    }
    for t in &data.triads {
        b.triad(t)?;
    }
    for j in &data.joints {
        b.joint(j)?;
    }
    for s in &data.springs {
        b.spring(s)?;
    }
    for d in &data.dampers {
        b.damper(d)?;
    }
    let engines = data
        .engines
        .iter()
        .map(|e| b.engine(e))
        .collect::<Result<Vec<_>, _>>()?;
    for (key, e) in engines.into_iter().zip(&data.engines) {
        b.engine_args(key, e)?;
    }
    for l in &data.loads {
        b.load(l)?;
    }
    for m in &data.motions {
        b.motion(m)?;
    }

    info!(
        file = %file.display(),
        entities = b.model.len(),
        named = b.names.len(),
        "mechanism description built"
    );
    Ok(BuiltModel {
        model: b.model,
        names: b.names,
    })
}

impl Builder<'_> {
    fn file(&self) -> PathBuf {
        self.file.to_path_buf()
    }

    /// Insert `data` under `name`.
    fn add(&mut self, name: &str, data: impl Into<EntityData>) -> Result<EntityKey, DataLoadError> {
        check_duplicate(&self.names, name, self.file)?;
        if name == TIME_NAME {
            return Err(DataLoadError::DuplicateName {
                file: self.file(),
                name: name.to_string(),
            });
        }
        let key = self.model.insert(data);
        if let Some(h) = self.model.header_mut(key) {
            h.tag = name.to_string();
        }
        self.names.insert(name.to_string(), key);
        debug!(name, id = %self.model.id_string(key), "named entity created");
        Ok(key)
    }

    /// Key of `name`, which must be one of `types`.
    fn lookup(
        &self,
        name: &str,
        types: &[EntityType],
        expected_kind: &'static str,
    ) -> Result<EntityKey, DataLoadError> {
        let key = *resolve_name(&self.names, name, self.file, expected_kind)?;
        match self.model.entity_type(key) {
            Some(t) if types.contains(&t) => Ok(key),
            _ => Err(DataLoadError::UnresolvedRef {
                file: self.file(),
                name: name.to_string(),
                expected_kind,
            }),
        }
    }

    fn lookup_opt(
        &self,
        name: Option<&String>,
        types: &[EntityType],
        expected_kind: &'static str,
    ) -> Result<Option<EntityKey>, DataLoadError> {
        name.map(|n| self.lookup(n, types, expected_kind)).transpose()
    }

    fn invalid(&self, field: &'static str, value: &str) -> DataLoadError {
        DataLoadError::InvalidValue {
            file: self.file(),
            field,
            value: value.to_string(),
        }
    }

    fn dof(&self, name: &str) -> Result<usize, DataLoadError> {
        DOF_NAMES
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| self.invalid("DOF", name))
    }

    fn status(&self, word: &str) -> Result<DofStatus, DataLoadError> {
        DofStatus::parse(word).ok_or_else(|| self.invalid("DOF status", word))
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    fn part(&mut self, p: &PartData) -> Result<EntityKey, DataLoadError> {
        let [ixx, iyy, izz] = p.inertia;
        self.add(
            &p.name,
            Part {
                mass: p.mass,
                inertia: [ixx, iyy, izz, 0.0, 0.0, 0.0],
                suppressed: p.suppressed,
                ..Part::default()
            },
        )
    }

    fn triad(&mut self, t: &TriadData) -> Result<EntityKey, DataLoadError> {
        let [x, y, z] = t.position;
        let mut triad = Triad::at(Mat34::at(Vec3::new(x, y, z)));
        for part in &t.parts {
            triad.parts.push(self.lookup(part, &[EntityType::Part], "part")?);
        }
        if t.add_mass != 0.0 {
            for dof in 0..3 {
                triad.set_add_mass(dof, t.add_mass);
            }
        }
        let statuses = t
            .dofs
            .iter()
            .map(|(dof, word)| Ok((self.dof(dof)?, self.status(word)?)))
            .collect::<Result<Vec<_>, DataLoadError>>()?;

        let key = self.add(&t.name, triad)?;
        for (dof, status) in statuses {
            if !self.model.set_triad_status(key, dof, status) {
                return Err(self.invalid("triad DOF status", status.as_str()));
            }
        }
        Ok(key)
    }

    fn joint(&mut self, j: &JointData) -> Result<EntityKey, DataLoadError> {
        let variant = match j.kind {
            JointKind::Rigid => JointVariant::Rigid,
            JointKind::Revolute => JointVariant::Revolute { tz_dof: j.tz_dof },
            JointKind::Ball => JointVariant::Ball,
            JointKind::Free => JointVariant::Free,
            JointKind::Prismatic => JointVariant::Prismatic,
            JointKind::Cylindric => JointVariant::Cylindric { screw_ratio: None },
            JointKind::Cam => JointVariant::Cam {
                thickness: 0.0,
                width: 0.0,
                radial: false,
            },
        };
        let mut joint = Joint::new(variant);
        joint.slave = Some(self.lookup(&j.slave, &[EntityType::Triad], "triad")?);

        if variant.is_line() {
            if j.line.len() < 2 {
                return Err(self.invalid("master line", &j.line.join(",")));
            }
            let triads = j
                .line
                .iter()
                .map(|t| self.lookup(t, &[EntityType::Triad], "triad"))
                .collect::<Result<Vec<_>, _>>()?;
            let kind = match variant {
                JointVariant::Cam { .. } => LineKind::CamCurve { looping: false },
                _ => LineKind::Straight,
            };
            joint.line = Some(self.model.insert(LineMaster::new(kind, triads)));
        } else {
            joint.master = self.lookup_opt(j.master.as_ref(), &[EntityType::Triad], "triad")?;
        }

        for (dof, value) in &j.variables {
            let dof = self.dof(dof)?;
            if !joint.set_joint_variable(dof, *value) {
                return Err(self.invalid("joint variable DOF", DOF_NAMES[dof]));
            }
        }
        let statuses = j
            .dofs
            .iter()
            .map(|(dof, word)| Ok((self.dof(dof)?, self.status(word)?)))
            .collect::<Result<Vec<_>, DataLoadError>>()?;

        let key = self.add(&j.name, joint)?;
        for (dof, status) in statuses {
            if !self.model.set_joint_status(key, dof, status) {
                return Err(self.invalid("joint DOF status", DOF_NAMES[dof]));
            }
        }
        Ok(key)
    }

    fn triad_pair(&self, names: &[String; 2]) -> Result<[Option<EntityKey>; 2], DataLoadError> {
        Ok([
            Some(self.lookup(&names[0], &[EntityType::Triad], "triad")?),
            Some(self.lookup(&names[1], &[EntityType::Triad], "triad")?),
        ])
    }

    fn spring(&mut self, s: &SpringData) -> Result<EntityKey, DataLoadError> {
        let spring = AxialSpring {
            triads: self.triad_pair(&s.triads)?,
            base: SpringBase {
                init_length: s.length,
                stiffness: s.stiffness,
                function: self.lookup_opt(s.function.as_ref(), &[EntityType::Function], "function")?,
                ..SpringBase::default()
            },
        };
        self.add(&s.name, spring)
    }

    fn damper(&mut self, d: &DamperData) -> Result<EntityKey, DataLoadError> {
        let damper = AxialDamper {
            triads: self.triad_pair(&d.triads)?,
            base: DamperBase {
                coefficient: d.coefficient,
                function: self.lookup_opt(d.function.as_ref(), &[EntityType::Function], "function")?,
                ..DamperBase::default()
            },
        };
        self.add(&d.name, damper)
    }

    // -----------------------------------------------------------------------
    // Functions and engines
    // -----------------------------------------------------------------------

    fn function(&mut self, f: &FunctionData) -> Result<EntityKey, DataLoadError> {
        let points = || f.points.iter().flat_map(|(x, y)| [*x, *y]).collect::<Vec<f64>>();
        let kind = match f.function_type {
            FunctionType::Constant => FunctionKind::Constant { value: f.value },
            FunctionType::Ramp => FunctionKind::Ramp {
                amplitude_displacement: f.value,
                slope: f.slope,
                delay: f.delay,
            },
            FunctionType::Sinusoidal => FunctionKind::Sinusoidal {
                frequency: f.frequency,
                delay: f.delay,
                amplitude: f.amplitude,
                amplitude_displacement: f.value,
                max_time: 0.0,
            },
            FunctionType::LinVar => FunctionKind::LinVar { values: points() },
            FunctionType::Spline => FunctionKind::Spline { values: points() },
        };
        self.add(&f.name, Function::new(kind))
    }

    fn engine(&mut self, e: &EngineData) -> Result<EntityKey, DataLoadError> {
        let function = self.lookup(&e.function, &[EntityType::Function], "function")?;
        let mut engine = Engine::with_function(function);
        engine.output = e.output;
        self.add(&e.name, engine)
    }

    fn engine_args(&mut self, key: EntityKey, e: &EngineData) -> Result<(), DataLoadError> {
        let mut args = Vec::with_capacity(e.args.len());
        for a in &e.args {
            let dof = self.dof(&a.dof)?;
            let entity = SensorEntity::parse(&a.entity).ok_or_else(|| self.invalid("sensor entity", &a.entity))?;
            let sensor = if a.measure == TIME_NAME {
                self.model.time_sensor()
            } else {
                let measured = self.lookup(
                    &a.measure,
                    &[
                        EntityType::Triad,
                        EntityType::Joint,
                        EntityType::AxialSpring,
                        EntityType::AxialDamper,
                        EntityType::Engine,
                    ],
                    "measurable entity",
                )?;
                self.model.sensor_for(measured)
            };
            args.push(EngineArg::new(sensor, dof, entity));
        }
        if let Some(engine) = self.model.engine_mut(key) {
            engine.args = args;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loads and motions
    // -----------------------------------------------------------------------

    fn load(&mut self, l: &LoadData) -> Result<EntityKey, DataLoadError> {
        let [x, y, z] = l.direction;
        let load = Load {
            kind: match l.load_type {
                LoadType::Force => LoadKind::Force,
                LoadType::Moment => LoadKind::Moment,
            },
            triad: Some(self.lookup(&l.triad, &[EntityType::Triad], "triad")?),
            from: Vec3::ZERO,
            to: Vec3::new(x, y, z),
            magnitude: l.magnitude,
            engine: self.lookup_opt(l.engine.as_ref(), &[EntityType::Engine], "engine")?,
            ..Load::default()
        };
        self.add(&l.name, load)
    }

    fn motion(&mut self, m: &MotionData) -> Result<EntityKey, DataLoadError> {
        let owner = self.lookup(&m.owner, &[EntityType::Triad, EntityType::Joint], "triad or joint")?;
        let dof = self.dof(&m.dof)?;
        let motion_type =
            MotionType::parse(&m.motion_type).ok_or_else(|| self.invalid("motion type", &m.motion_type))?;
        let engine = self.lookup_opt(m.engine.as_ref(), &[EntityType::Engine], "engine")?;

        let is_joint = self.model.entity_type(owner) == Some(EntityType::Joint);
        let motion = if is_joint {
            self.model.set_joint_status(owner, dof, DofStatus::Prescribed);
            self.model.joint_child(owner, DofChild::Motion, dof, false)
        } else {
            self.model.set_triad_status(owner, dof, DofStatus::Prescribed);
            self.model.triad_child(owner, DofChild::Motion, dof, false)
        };
        let motion = motion.ok_or_else(|| self.invalid("prescribed DOF", DOF_NAMES[dof]))?;
        if let Some(dm) = self.model.dof_motion_mut(motion) {
            dm.motion_type = motion_type;
            dm.value = m.value;
            dm.engine = engine;
        }
        Ok(motion)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Format, deserialize_str};
    use linkage_core::dof::{X_TRANS, Z_ROT};
    use linkage_core::validation::validate;

    const CRANK: &str = r#"(
        parts: [(name: "crank", mass: 2.0, inertia: (1.0, 1.0, 0.5))],
        triads: [
            (name: "ground", position: (0.0, 0.0, 0.0),
             dofs: {"TX": "FIXED", "TY": "FIXED", "TZ": "FIXED", "RX": "FIXED", "RY": "FIXED", "RZ": "FIXED"}),
            (name: "pin", position: (0.0, 0.0, 0.0), parts: ["crank"]),
            (name: "tip", position: (1.0, 0.0, 0.0), parts: ["crank"]),
        ],
        joints: [
            (name: "hinge", kind: revolute, slave: "pin", master: Some("ground"),
             dofs: {"RZ": "FREE_DYNAMICS"}, variables: {"RZ": 0.25}),
        ],
        functions: [(name: "spin", type: ramp, slope: 2.0)],
        engines: [
            (name: "drive", function: "spin", args: [(measure: "time")]),
            (name: "watch", function: "spin", output: true,
             args: [(measure: "tip", dof: "TY", entity: "GLOBAL_VEL"), (measure: "drive")]),
        ],
        loads: [(name: "push", triad: "tip", magnitude: 10.0, direction: (0.0, 1.0, 0.0), engine: Some("drive"))],
    )"#;

    fn build(text: &str) -> Result<BuiltModel, DataLoadError> {
        let path = Path::new("model.ron");
        let data: ModelData = deserialize_str(text, Format::Ron, path)?;
        build_model(&data, MechanismSettings::default(), path)
    }

    #[test]
    fn crank_resolves_every_name() {
        let mut built = build(CRANK).unwrap();
        assert_eq!(built.names.len(), 9);
        let hinge = built.key("hinge").unwrap();
        let pin = built.key("pin").unwrap();
        let crank = built.key("crank").unwrap();

        let m = &built.model;
        let j = m.joint(hinge).unwrap();
        assert_eq!(j.slave, Some(pin));
        assert_eq!(j.master, built.key("ground"));
        assert_eq!(j.status(Z_ROT), DofStatus::FreeDynamics);
        assert!(j.springs[Z_ROT].is_some());
        assert_eq!(j.joint_variable(Z_ROT), 0.25);
        assert_eq!(m.triad(pin).unwrap().parts, vec![crank]);
        assert_eq!(m.header(hinge).unwrap().tag, "hinge");

        let watch = m.engine(built.key("watch").unwrap()).unwrap();
        assert_eq!(watch.args.len(), 2);
        assert_eq!(watch.args[0].dof, 1);
        assert_eq!(watch.args[0].entity, SensorEntity::GlobalVel);
        let load = m.load(built.key("push").unwrap()).unwrap();
        assert_eq!(load.engine, built.key("drive"));

        assert!(validate(&mut built.model).is_ok());
    }

    #[test]
    fn motions_prescribe_their_dof() {
        let text = r#"(
            triads: [(name: "t", position: (0.0, 0.0, 0.0), add_mass: 1.0)],
            functions: [(name: "f", type: constant, value: 1.0)],
            engines: [(name: "e", function: "f")],
            motions: [(owner: "t", dof: "TX", motion_type: "velocity", engine: Some("e"))],
        )"#;
        let built = build(text).unwrap();
        let t = built.key("t").unwrap();
        let m = &built.model;
        assert_eq!(m.triad(t).unwrap().status(X_TRANS), DofStatus::Prescribed);
        let motion = m.triad(t).unwrap().motions[X_TRANS].unwrap();
        let dm = m.dof_motion(motion).unwrap();
        assert_eq!(dm.motion_type, MotionType::Velocity);
        assert_eq!(dm.engine, built.key("e"));
    }

    #[test]
    fn line_joint_builds_master_line() {
        let text = r#"(
            triads: [
                (name: "a", position: (0.0, 0.0, 0.0)),
                (name: "b", position: (1.0, 0.0, 0.0)),
                (name: "s", position: (0.5, 0.0, 0.0)),
            ],
            joints: [(name: "slide", kind: prismatic, slave: "s", line: ["a", "b"])],
        )"#;
        let built = build(text).unwrap();
        let m = &built.model;
        let line = m.joint(built.key("slide").unwrap()).unwrap().line.unwrap();
        let lm = m.line_master(line).unwrap();
        assert_eq!(lm.kind, LineKind::Straight);
        assert_eq!(lm.triads, vec![built.key("a").unwrap(), built.key("b").unwrap()]);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_name_is_rejected() {
        let text = r#"(parts: [(name: "p")], triads: [(name: "p", position: (0.0, 0.0, 0.0))])"#;
        assert!(matches!(
            build(text),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "p"
        ));
        let text = r#"(parts: [(name: "time")])"#;
        assert!(matches!(build(text), Err(DataLoadError::DuplicateName { .. })));
    }

    #[test]
    fn wrong_kind_is_unresolved() {
        let text = r#"(
            parts: [(name: "p")],
            joints: [(name: "j", kind: revolute, slave: "p")],
        )"#;
        match build(text) {
            Err(DataLoadError::UnresolvedRef {
                name, expected_kind, ..
            }) => {
                assert_eq!(name, "p");
                assert_eq!(expected_kind, "triad");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn illegal_values_are_reported() {
        let text = r#"(triads: [(name: "t", position: (0.0, 0.0, 0.0), dofs: {"TW": "FIXED"})])"#;
        assert!(matches!(
            build(text),
            Err(DataLoadError::InvalidValue { field: "DOF", .. })
        ));

        let text = r#"(
            triads: [(name: "a", position: (0.0, 0.0, 0.0)), (name: "b", position: (0.0, 0.0, 0.0))],
            joints: [(name: "j", kind: revolute, slave: "a", master: Some("b"), dofs: {"TX": "FREE"})],
        )"#;
        assert!(matches!(
            build(text),
            Err(DataLoadError::InvalidValue { field: "joint DOF status", .. })
        ));
    }
}
