//! Per-type field layout of the model file.
//!
//! Each entity type has one visitor function that walks its fields in
//! file order through [`Fields`]. Writing and reading share that function:
//! [`BlockWriter`] prints the current values, [`BlockReader`] overwrites
//! them with whatever the block holds and leaves absent keys untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::str::FromStr;

use tracing::warn;

use super::text::{RawBlock, quote, unquote};
use super::{ModelFileError, UnresolvedReference};
use crate::config::MechanismSettings;
use crate::control::{ControlElement, ControlKind, ControlLine};
use crate::dof::{DofStatus, MAX_DOF, RotFormulation, RotSequence, SpringCoupling};
use crate::entity::{EntityData, EntityType, Header};
use crate::function::{Engine, EngineArg, Function, FunctionKind};
use crate::geometry::{Mat34, Vec3};
use crate::id::{BaseId, EntityKey, UserId};
use crate::joint::{HigherPair, Joint, JointVariant, TransmissionKind};
use crate::line::{LineKind, LineMaster};
use crate::load::{DofLoad, DofMotion, Load, LoadKind, MotionType};
use crate::model::Model;
use crate::part::{
    Assembly, Beam, BeamProperty, CrossSection, GenericObject, Material, Part, PartStiffness,
    Road, RosetteType, ShadowPosition, StrainRosette, Tire, Turbine, UserElement,
};
use crate::sensor::{Sensor, SensorEntity, SensorKind};
use crate::spring::{
    AxialDamper, AxialSpring, DamperBase, Friction, FrictionKind, JointDamper, JointSpring,
    SpringBase, SpringChar,
};
use crate::triad::Triad;

// ---------------------------------------------------------------------------
// Visitor seam
// ---------------------------------------------------------------------------

pub(super) trait Fields {
    fn reading(&self) -> bool;
    fn real(&mut self, key: &str, v: &mut f64);
    fn opt_real(&mut self, key: &str, v: &mut Option<f64>);
    /// Fixed-length real vector.
    fn reals(&mut self, key: &str, v: &mut [f64]);
    /// Variable-length real vector, omitted when empty.
    fn real_list(&mut self, key: &str, v: &mut Vec<f64>);
    fn int(&mut self, key: &str, v: &mut i32);
    fn index(&mut self, key: &str, v: &mut usize);
    fn int_list(&mut self, key: &str, v: &mut Vec<i32>);
    fn flag(&mut self, key: &str, v: &mut bool);
    fn text(&mut self, key: &str, v: &mut String);
    /// Unquoted symbol.
    fn word(&mut self, key: &str, v: &mut String);
    fn words(&mut self, key: &str, v: &mut Vec<String>);
    fn reference(&mut self, key: &str, v: &mut Option<EntityKey>);
    /// Positional references; written as base ids with 0 for an empty slot.
    fn ref_slots(&mut self, key: &str, v: &mut Vec<Option<EntityKey>>);
    fn ref_list(&mut self, key: &str, v: &mut Vec<EntityKey>);
    /// Report a value that parsed but means nothing for its field.
    fn reject(&mut self, key: &str, value: &str);
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub(super) struct BlockWriter<'a> {
    model: &'a Model,
    body: String,
}

impl<'a> BlockWriter<'a> {
    pub(super) fn new(model: &'a Model) -> Self {
        Self {
            model,
            body: String::new(),
        }
    }

    fn put(&mut self, key: &str, value: impl std::fmt::Display) {
        let _ = writeln!(self.body, "  {key} = {value};");
    }

    fn put_list<T: std::fmt::Display>(&mut self, key: &str, values: impl IntoIterator<Item = T>) {
        let joined: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        self.put(key, joined.join(" "));
    }

    fn id(&self, key: Option<EntityKey>) -> i32 {
        self.model.id_of(key)
    }

    pub(super) fn finish_into(self, keyword: &str, out: &mut String) {
        let _ = write!(out, "{keyword}\n{{\n{}}}\n\n", self.body);
    }
}

impl Fields for BlockWriter<'_> {
    fn reading(&self) -> bool {
        false
    }

    fn real(&mut self, key: &str, v: &mut f64) {
        self.put(key, *v);
    }

    fn opt_real(&mut self, key: &str, v: &mut Option<f64>) {
        if let Some(x) = v {
            self.put(key, *x);
        }
    }

    fn reals(&mut self, key: &str, v: &mut [f64]) {
        self.put_list(key, v.iter());
    }

    fn real_list(&mut self, key: &str, v: &mut Vec<f64>) {
        if !v.is_empty() {
            self.put_list(key, v.iter());
        }
    }

    fn int(&mut self, key: &str, v: &mut i32) {
        self.put(key, *v);
    }

    fn index(&mut self, key: &str, v: &mut usize) {
        self.put(key, *v);
    }

    fn int_list(&mut self, key: &str, v: &mut Vec<i32>) {
        if !v.is_empty() {
            self.put_list(key, v.iter());
        }
    }

    fn flag(&mut self, key: &str, v: &mut bool) {
        self.put(key, *v);
    }

    fn text(&mut self, key: &str, v: &mut String) {
        self.put(key, quote(v));
    }

    fn word(&mut self, key: &str, v: &mut String) {
        self.put(key, v);
    }

    fn words(&mut self, key: &str, v: &mut Vec<String>) {
        if !v.is_empty() {
            self.put(key, v.join(" "));
        }
    }

    fn reference(&mut self, key: &str, v: &mut Option<EntityKey>) {
        let id = self.id(*v);
        if id > 0 {
            self.put(key, id);
        }
    }

    fn ref_slots(&mut self, key: &str, v: &mut Vec<Option<EntityKey>>) {
        if v.iter().any(Option::is_some) {
            let ids: Vec<i32> = v.iter().map(|k| self.id(*k)).collect();
            self.put_list(key, ids);
        }
    }

    fn ref_list(&mut self, key: &str, v: &mut Vec<EntityKey>) {
        if !v.is_empty() {
            let ids: Vec<i32> = v.iter().map(|k| self.id(Some(*k))).collect();
            self.put_list(key, ids);
        }
    }

    fn reject(&mut self, _key: &str, _value: &str) {}
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub(super) struct BlockReader<'a> {
    block: &'a RawBlock,
    /// File base id to the key created for it.
    ids: &'a BTreeMap<i32, EntityKey>,
    used: BTreeSet<&'a str>,
    unresolved: Vec<UnresolvedReference>,
    error: Option<ModelFileError>,
}

impl<'a> BlockReader<'a> {
    pub(super) fn new(block: &'a RawBlock, ids: &'a BTreeMap<i32, EntityKey>) -> Self {
        Self {
            block,
            ids,
            used: BTreeSet::new(),
            unresolved: Vec::new(),
            error: None,
        }
    }

    /// Cleared references, or the first bad value. Keys nothing asked for
    /// are logged.
    pub(super) fn finish(self) -> Result<Vec<UnresolvedReference>, ModelFileError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for key in self.block.keys().filter(|k| !self.used.contains(k)) {
            warn!(block = %self.block.keyword, line = self.block.line, key, "unknown field ignored");
        }
        Ok(self.unresolved)
    }

    fn lookup(&mut self, key: &str) -> Option<&'a str> {
        let block: &'a RawBlock = self.block;
        let (name, value) = block.field(key)?;
        self.used.insert(name);
        Some(value)
    }

    fn parsed<T: FromStr>(&mut self, key: &str, raw: &str) -> Option<T> {
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.reject(key, raw);
                None
            }
        }
    }

    fn parsed_list<T: FromStr>(&mut self, key: &str, raw: &str) -> Option<Vec<T>> {
        match raw.split_whitespace().map(str::parse).collect() {
            Ok(v) => Some(v),
            Err(_) => {
                self.reject(key, raw);
                None
            }
        }
    }

    fn resolve(&mut self, key: &str, id: i32) -> Option<EntityKey> {
        if id <= 0 {
            return None;
        }
        if let Some(k) = self.ids.get(&id) {
            return Some(*k);
        }
        warn!(
            block = %self.block.keyword,
            line = self.block.line,
            field = key,
            id,
            "unresolved reference cleared"
        );
        self.unresolved.push(UnresolvedReference {
            keyword: self.block.keyword.clone(),
            line: self.block.line,
            field: key.to_owned(),
            id,
        });
        None
    }
}

impl Fields for BlockReader<'_> {
    fn reading(&self) -> bool {
        true
    }

    fn real(&mut self, key: &str, v: &mut f64) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(x) = self.parsed(key, raw) {
            *v = x;
        }
    }

    fn opt_real(&mut self, key: &str, v: &mut Option<f64>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(x) = self.parsed(key, raw) {
            *v = Some(x);
        }
    }

    fn reals(&mut self, key: &str, v: &mut [f64]) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        let Some(values) = self.parsed_list::<f64>(key, raw) else {
            return;
        };
        if values.len() == v.len() {
            v.copy_from_slice(&values);
        } else {
            self.reject(key, raw);
        }
    }

    fn real_list(&mut self, key: &str, v: &mut Vec<f64>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(values) = self.parsed_list(key, raw) {
            *v = values;
        }
    }

    fn int(&mut self, key: &str, v: &mut i32) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(x) = self.parsed(key, raw) {
            *v = x;
        }
    }

    fn index(&mut self, key: &str, v: &mut usize) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(x) = self.parsed(key, raw) {
            *v = x;
        }
    }

    fn int_list(&mut self, key: &str, v: &mut Vec<i32>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(values) = self.parsed_list(key, raw) {
            *v = values;
        }
    }

    fn flag(&mut self, key: &str, v: &mut bool) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        match raw {
            "true" | "1" => *v = true,
            "false" | "0" => *v = false,
            other => self.reject(key, other),
        }
    }

    fn text(&mut self, key: &str, v: &mut String) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        match unquote(raw) {
            Some(s) => *v = s,
            None => self.reject(key, raw),
        }
    }

    fn word(&mut self, key: &str, v: &mut String) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        *v = raw.to_owned();
    }

    fn words(&mut self, key: &str, v: &mut Vec<String>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        *v = raw.split_whitespace().map(str::to_owned).collect();
    }

    fn reference(&mut self, key: &str, v: &mut Option<EntityKey>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(id) = self.parsed::<i32>(key, raw) {
            *v = self.resolve(key, id);
        }
    }

    fn ref_slots(&mut self, key: &str, v: &mut Vec<Option<EntityKey>>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(ids) = self.parsed_list::<i32>(key, raw) {
            *v = ids.into_iter().map(|id| self.resolve(key, id)).collect();
        }
    }

    fn ref_list(&mut self, key: &str, v: &mut Vec<EntityKey>) {
        let Some(raw) = self.lookup(key) else {
            return;
        };
        if let Some(ids) = self.parsed_list::<i32>(key, raw) {
            *v = ids.into_iter().filter_map(|id| self.resolve(key, id)).collect();
        }
    }

    fn reject(&mut self, key: &str, value: &str) {
        if self.error.is_none() {
            self.error = Some(ModelFileError::InvalidValue {
                keyword: self.block.keyword.clone(),
                line: self.block.line,
                key: key.to_owned(),
                value: value.to_owned(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// An enum field stored by name.
fn named<T: Copy>(
    f: &mut dyn Fields,
    key: &str,
    v: &mut T,
    name: impl Fn(T) -> &'static str,
    parse: impl Fn(&str) -> Option<T>,
) {
    let mut word = name(*v).to_owned();
    f.word(key, &mut word);
    match parse(&word) {
        Some(p) => *v = p,
        None => f.reject(key, &word),
    }
}

/// An enum field stored through a name table.
fn choice<T: Copy + PartialEq>(f: &mut dyn Fields, key: &str, v: &mut T, table: &[(T, &'static str)]) {
    named(
        f,
        key,
        v,
        |x| table.iter().find(|(t, _)| *t == x).map_or("", |(_, n)| *n),
        |w| table.iter().find(|(_, n)| *n == w).map(|(t, _)| *t),
    );
}

/// Read the variant name first; on a change the payload is replaced by
/// the blank of the new variant before its fields are visited.
fn variant<T>(
    f: &mut dyn Fields,
    key: &str,
    v: &mut T,
    name: impl Fn(&T) -> &'static str,
    blank: impl Fn(&str) -> Option<T>,
) {
    let current = name(v);
    let mut word = current.to_owned();
    f.word(key, &mut word);
    if word != current {
        match blank(&word) {
            Some(fresh) => *v = fresh,
            None => f.reject(key, &word),
        }
    }
}

fn placement(f: &mut dyn Fields, key: &str, m: &mut Mat34) {
    let mut flat = [0.0; 12];
    for (i, col) in m.cols.iter().enumerate() {
        flat[3 * i..3 * i + 3].copy_from_slice(&col.0);
    }
    f.reals(key, &mut flat);
    for (i, col) in m.cols.iter_mut().enumerate() {
        col.0.copy_from_slice(&flat[3 * i..3 * i + 3]);
    }
}

fn point(f: &mut dyn Fields, key: &str, p: &mut Vec3) {
    f.reals(key, &mut p.0);
}

fn slots<const N: usize>(f: &mut dyn Fields, key: &str, v: &mut [Option<EntityKey>; N]) {
    let mut list = v.to_vec();
    f.ref_slots(key, &mut list);
    *v = [None; N];
    for (slot, k) in v.iter_mut().zip(list) {
        *slot = k;
    }
}

fn scales(f: &mut dyn Fields, stiff: &mut f64, mass: &mut f64, alpha1: &mut f64, alpha2: &mut f64) {
    f.real("STIFF_SCALE", stiff);
    f.real("MASS_SCALE", mass);
    f.real("ALPHA1", alpha1);
    f.real("ALPHA2", alpha2);
}

const SHADOWS: [(ShadowPosition, &str); 3] = [
    (ShadowPosition::TriangleFit, "TRIANGLE_FIT"),
    (ShadowPosition::MassAverage, "MASS_AVERAGE"),
    (ShadowPosition::Fixed, "FIXED"),
];

// ---------------------------------------------------------------------------
// Header and settings
// ---------------------------------------------------------------------------

pub(super) fn header_fields(h: &mut Header, f: &mut dyn Fields) {
    let mut user = h.user_id.0;
    f.int("ID", &mut user);
    h.user_id = UserId(user);
    let mut base = h.base_id.0;
    f.int("BASE_ID", &mut base);
    h.base_id = BaseId(base);
    if f.reading() || !h.tag.is_empty() {
        f.text("TAG", &mut h.tag);
    }
    if f.reading() || !h.description.is_empty() {
        f.text("DESCR", &mut h.description);
    }
    f.reference("PARENT_ASSEMBLY", &mut h.parent_assembly);
    let mut save: Vec<i32> = h.save_vars.iter().map(|b| i32::from(*b)).collect();
    f.int_list("SAVE_VARS", &mut save);
    h.save_vars = save.into_iter().map(|v| v != 0).collect();
}

pub(super) fn settings_fields(s: &mut MechanismSettings, f: &mut dyn Fields) {
    f.text("MODEL_FILE", &mut s.model_file);
    point(f, "GRAVITY", &mut s.gravity);
    point(f, "INIT_VELOCITY", &mut s.init_vel);
    f.flag("QUASI_STATIC", &mut s.quasi_static);
    f.real("POSITION_TOLERANCE", &mut s.position_tolerance);
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Payload a block is decoded into.
pub(super) fn blank(etype: EntityType) -> EntityData {
    match etype {
        EntityType::Triad => Triad::default().into(),
        EntityType::Part => Part::default().into(),
        EntityType::Beam => Beam::default().into(),
        EntityType::BeamProperty => BeamProperty::pipe(0.0, 0.0, 0.0, None).into(),
        EntityType::Joint => Joint::new(JointVariant::Rigid).into(),
        EntityType::LineMaster => LineMaster::default().into(),
        EntityType::HigherPair => HigherPair::new(TransmissionKind::Gear).into(),
        EntityType::JointSpring => JointSpring::default().into(),
        EntityType::JointDamper => JointDamper::default().into(),
        EntityType::AxialSpring => AxialSpring::default().into(),
        EntityType::AxialDamper => AxialDamper::default().into(),
        EntityType::SpringChar => SpringChar::default().into(),
        EntityType::Friction => Friction::new(FrictionKind::Translational).into(),
        EntityType::Load => Load::default().into(),
        EntityType::DofLoad => DofLoad::default().into(),
        EntityType::DofMotion => DofMotion::default().into(),
        EntityType::Function => Function::constant(0.0).into(),
        EntityType::Engine => Engine::default().into(),
        EntityType::Sensor => Sensor::time().into(),
        EntityType::ControlElement => ControlElement::new(ControlKind::Input).into(),
        EntityType::ControlLine => ControlLine::default().into(),
        EntityType::GenericObject => GenericObject::default().into(),
        EntityType::Assembly => Assembly::default().into(),
        EntityType::StrainRosette => StrainRosette::default().into(),
        EntityType::Tire => Tire::default().into(),
        EntityType::Road => Road::default().into(),
        EntityType::UserDefinedElement => UserElement::new(0, "").into(),
        EntityType::Turbine => Turbine::default().into(),
    }
}

pub(super) fn entity_fields(data: &mut EntityData, f: &mut dyn Fields) {
    match data {
        EntityData::Triad(t) => triad(t, f),
        EntityData::Part(p) => part(p, f),
        EntityData::Beam(b) => beam(b, f),
        EntityData::BeamProperty(p) => beam_property(p, f),
        EntityData::Joint(j) => joint(j, f),
        EntityData::LineMaster(l) => line_master(l, f),
        EntityData::HigherPair(h) => higher_pair(h, f),
        EntityData::JointSpring(s) => {
            f.reference("OWNER", &mut s.owner);
            f.index("DOF", &mut s.dof);
            spring_base(&mut s.base, f);
        }
        EntityData::JointDamper(d) => {
            f.reference("OWNER", &mut d.owner);
            f.index("DOF", &mut d.dof);
            damper_base(&mut d.base, f);
        }
        EntityData::AxialSpring(s) => {
            slots(f, "TRIADS", &mut s.triads);
            spring_base(&mut s.base, f);
        }
        EntityData::AxialDamper(d) => {
            slots(f, "TRIADS", &mut d.triads);
            damper_base(&mut d.base, f);
        }
        EntityData::SpringChar(c) => spring_char(c, f),
        EntityData::Friction(fr) => friction(fr, f),
        EntityData::Load(l) => load(l, f),
        EntityData::DofLoad(l) => {
            f.reference("OWNER", &mut l.owner);
            f.index("DOF", &mut l.dof);
            f.real("VALUE", &mut l.value);
            f.reference("ENGINE", &mut l.engine);
        }
        EntityData::DofMotion(m) => {
            f.reference("OWNER", &mut m.owner);
            f.index("DOF", &mut m.dof);
            named(f, "MOTION_TYPE", &mut m.motion_type, MotionType::as_str, MotionType::parse);
            f.real("VALUE", &mut m.value);
            f.reference("ENGINE", &mut m.engine);
        }
        EntityData::Function(func) => function(func, f),
        EntityData::Engine(e) => engine(e, f),
        EntityData::Sensor(s) => sensor(s, f),
        EntityData::ControlElement(e) => {
            variant(f, "TYPE", &mut e.kind, |k| k.name(), ControlKind::parse);
            if f.reading() && e.params.len() != e.kind.param_count() {
                *e = ControlElement::new(e.kind);
            }
            f.real_list("PARAMETERS", &mut e.params);
            f.reference("ENGINE", &mut e.engine);
        }
        EntityData::ControlLine(l) => {
            f.reference("START", &mut l.start);
            f.reference("END", &mut l.end);
            f.index("PORT", &mut l.port);
        }
        EntityData::GenericObject(g) => {
            f.text("OBJECT_TYPE", &mut g.object_type);
            f.text("DEFINITION", &mut g.definition);
        }
        EntityData::Assembly(a) => f.text("NAME", &mut a.name),
        EntityData::StrainRosette(r) => rosette(r, f),
        EntityData::Tire(t) => tire(t, f),
        EntityData::Road(r) => road(r, f),
        EntityData::UserDefinedElement(u) => {
            f.int("TYPE_ID", &mut u.type_id);
            f.text("NAME", &mut u.name);
            f.ref_list("TRIADS", &mut u.triads);
            scales(f, &mut u.stiff_scale, &mut u.mass_scale, &mut u.alpha1, &mut u.alpha2);
        }
        EntityData::Turbine(t) => turbine(t, f),
    }
}

fn turbine(t: &mut Turbine, f: &mut dyn Fields) {
    f.real("PLATFORM_REFERENCE_HEIGHT", &mut t.platform_ref);
    f.real("HUB_DIAMETER", &mut t.hub_diameter);
    f.index("NUMBER_OF_BLADES", &mut t.n_blades);
    slots(f, "TOPOLOGY", &mut t.topology);
    f.ref_list("PITCH_JOINTS", &mut t.pitch_joints);
    let mut centres: Vec<f64> = t.aero_centres.iter().flatten().copied().collect();
    f.real_list("AERO_CENTRES", &mut centres);
    if f.reading() {
        if centres.len() % 2 != 0 {
            f.reject("AERO_CENTRES", &centres.len().to_string());
        }
        t.aero_centres = centres.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
    }
    f.flag("WIND", &mut t.wind);
}

fn triad(t: &mut Triad, f: &mut dyn Fields) {
    placement(f, "POSITION", &mut t.placement);
    let mut ndofs = t.ndofs();
    f.index("NDOFS", &mut ndofs);
    if !t.set_ndofs(ndofs) {
        f.reject("NDOFS", &ndofs.to_string());
    }
    let mut statuses: Vec<String> = t.statuses().iter().map(|s| s.as_str().to_owned()).collect();
    f.words("DOF_STATUS", &mut statuses);
    for (dof, word) in statuses.iter().enumerate() {
        match DofStatus::parse(word) {
            Some(s) => {
                t.set_status(dof, s);
            }
            None => f.reject("DOF_STATUS", word),
        }
    }
    f.real_list("ADD_MASS", &mut t.add_mass);
    f.reference("MASS_ENGINE", &mut t.mass_engine);
    f.reference("INERTIA_ENGINE", &mut t.inertia_engine);
    f.real_list("INIT_VELOCITY", &mut t.init_vel);
    f.real_list("INIT_ACCELERATION", &mut t.init_acc);
    f.ref_list("PARTS", &mut t.parts);
    slots(f, "LOADS", &mut t.loads);
    slots(f, "MOTIONS", &mut t.motions);
}

fn part(p: &mut Part, f: &mut dyn Fields) {
    placement(f, "POSITION", &mut p.placement);
    placement(f, "COG", &mut p.cog);
    f.real("MASS", &mut p.mass);
    f.reals("INERTIA", &mut p.inertia);
    variant(
        f,
        "STIFFNESS_TYPE",
        &mut p.stiffness,
        |s| match s {
            PartStiffness::Rigid => "RIGID",
            PartStiffness::Nodal { .. } => "NODAL",
        },
        |w| match w {
            "RIGID" => Some(PartStiffness::Rigid),
            "NODAL" => Some(PartStiffness::Nodal { kt: 0.0, kr: 0.0 }),
            _ => None,
        },
    );
    if let PartStiffness::Nodal { kt, kr } = &mut p.stiffness {
        f.real("STIFFNESS_KT", kt);
        f.real("STIFFNESS_KR", kr);
    }
    f.flag("SUPPRESSED", &mut p.suppressed);
    choice(f, "SHADOW_POSITION", &mut p.shadow, &SHADOWS);
    let mut centrip = match p.centrip_correction {
        None => "MODEL_DEFAULT",
        Some(true) => "ON",
        Some(false) => "OFF",
    }
    .to_owned();
    f.word("CENTRIP_CORRECTION", &mut centrip);
    p.centrip_correction = match centrip.as_str() {
        "ON" => Some(true),
        "OFF" => Some(false),
        "MODEL_DEFAULT" => None,
        other => {
            f.reject("CENTRIP_CORRECTION", other);
            p.centrip_correction
        }
    };
    f.flag("CONDENSE_COG", &mut p.condense_cog);
    scales(f, &mut p.stiff_scale, &mut p.mass_scale, &mut p.alpha1, &mut p.alpha2);
}

fn beam(b: &mut Beam, f: &mut dyn Fields) {
    placement(f, "POSITION", &mut b.placement);
    slots(f, "TRIADS", &mut b.triads);
    f.reference("PROPERTY", &mut b.property);
    choice(f, "SHADOW_POSITION", &mut b.shadow, &SHADOWS);
    scales(f, &mut b.stiff_scale, &mut b.mass_scale, &mut b.alpha1, &mut b.alpha2);
}

fn beam_property(p: &mut BeamProperty, f: &mut dyn Fields) {
    variant(
        f,
        "SECTION",
        &mut p.section,
        |s| match s {
            CrossSection::Generic { .. } => "GENERIC",
            CrossSection::Pipe { .. } => "PIPE",
        },
        |w| match w {
            "GENERIC" => Some(CrossSection::Generic {
                ea: 0.0,
                ei: [0.0; 2],
                git: 0.0,
                gas: [0.0; 2],
                mass: 0.0,
                ro_ip: 0.0,
            }),
            "PIPE" => Some(BeamProperty::pipe(0.0, 0.0, 0.0, None).section),
            _ => None,
        },
    );
    match &mut p.section {
        CrossSection::Generic {
            ea,
            ei,
            git,
            gas,
            mass,
            ro_ip,
        } => {
            f.real("EA", ea);
            f.reals("EI", ei);
            f.real("GIT", git);
            f.reals("GAS", gas);
            f.real("MASS", mass);
            f.real("RO_IP", ro_ip);
        }
        CrossSection::Pipe {
            area,
            iy,
            iz,
            ip,
            shear_reduction,
            material,
        } => {
            f.real("AREA", area);
            f.real("IY", iy);
            f.real("IZ", iz);
            f.real("IP", ip);
            f.reals("SHEAR_REDUCTION", shear_reduction);
            let mut rho_e_g = material.map(|m| vec![m.rho, m.e, m.g]).unwrap_or_default();
            f.real_list("MATERIAL", &mut rho_e_g);
            *material = match rho_e_g.as_slice() {
                [] => None,
                [rho, e, g] => Some(Material {
                    rho: *rho,
                    e: *e,
                    g: *g,
                }),
                _ => {
                    f.reject("MATERIAL", "expected rho E G");
                    *material
                }
            };
        }
    }
    f.reals("SHEAR_CENTRE", &mut p.shear_centre);
}

fn joint(j: &mut Joint, f: &mut dyn Fields) {
    variant(f, "VARIANT", j, |j| j.variant.name(), |w| {
        let v = match w {
            "RIGID" => JointVariant::Rigid,
            "REVOLUTE" => JointVariant::Revolute { tz_dof: false },
            "BALL" => JointVariant::Ball,
            "FREE" => JointVariant::Free,
            "PRISMATIC" => JointVariant::Prismatic,
            "CYLINDRIC" => JointVariant::Cylindric { screw_ratio: None },
            "CAM" => JointVariant::Cam {
                thickness: 0.0,
                width: 0.0,
                radial: false,
            },
            _ => return None,
        };
        Some(Joint::new(v))
    });
    match &mut j.variant {
        JointVariant::Revolute { tz_dof } => f.flag("TZ_DOF", tz_dof),
        JointVariant::Cylindric { screw_ratio } => f.opt_real("SCREW_RATIO", screw_ratio),
        JointVariant::Cam {
            thickness,
            width,
            radial,
        } => {
            f.real("THICKNESS", thickness);
            f.real("WIDTH", width);
            f.flag("RADIAL", radial);
        }
        _ => {}
    }
    placement(f, "POSITION", &mut j.placement);
    f.reference("SLAVE", &mut j.slave);
    f.reference("MASTER", &mut j.master);
    f.reference("LINE", &mut j.line);

    let mut statuses: Vec<String> = (0..MAX_DOF).map(|d| j.status(d).as_str().to_owned()).collect();
    f.words("DOF_STATUS", &mut statuses);
    for (dof, word) in statuses.iter().enumerate() {
        match DofStatus::parse(word) {
            Some(s) => {
                j.set_status(dof, s);
            }
            None => f.reject("DOF_STATUS", word),
        }
    }

    slots(f, "SPRINGS", &mut j.springs);
    slots(f, "DAMPERS", &mut j.dampers);
    slots(f, "MOTIONS", &mut j.motions);
    slots(f, "LOADS", &mut j.loads);
    f.reference("FRICTION", &mut j.friction);
    f.index("FRICTION_DOF", &mut j.friction_dof);

    let sparse = |values: [f64; MAX_DOF]| -> Vec<f64> {
        if values.iter().any(|v| *v != 0.0) {
            values.to_vec()
        } else {
            Vec::new()
        }
    };
    let mut vel = sparse(std::array::from_fn(|d| j.raw_init_vel(d)));
    f.real_list("INIT_VELOCITY", &mut vel);
    for (dof, v) in vel.iter().enumerate() {
        j.set_init_vel(dof, *v);
    }
    let mut acc = sparse(std::array::from_fn(|d| j.raw_init_acc(d)));
    f.real_list("INIT_ACCELERATION", &mut acc);
    for (dof, v) in acc.iter().enumerate() {
        j.set_init_acc(dof, *v);
    }
    let mut vars = sparse(std::array::from_fn(|d| j.joint_variable(d)));
    f.real_list("JOINT_VARIABLES", &mut vars);
    if f.reading() {
        for (dof, v) in vars.iter().enumerate() {
            j.set_joint_variable(dof, *v);
        }
    }

    named(f, "ROT_FORMULATION", &mut j.rot_formulation, RotFormulation::as_str, RotFormulation::parse);
    named(f, "ROT_SEQUENCE", &mut j.rot_sequence, RotSequence::as_str, RotSequence::parse);
    named(f, "ROT_SPRING_COUPLING", &mut j.rot_coupling, SpringCoupling::as_str, SpringCoupling::parse);
    named(f, "TRAN_SPRING_COUPLING", &mut j.tran_coupling, SpringCoupling::as_str, SpringCoupling::parse);
}

fn line_master(l: &mut LineMaster, f: &mut dyn Fields) {
    variant(
        f,
        "TYPE",
        &mut l.kind,
        |k| match k {
            LineKind::Straight => "STRAIGHT",
            LineKind::CamCurve { .. } => "CAM_CURVE",
        },
        |w| match w {
            "STRAIGHT" => Some(LineKind::Straight),
            "CAM_CURVE" => Some(LineKind::CamCurve { looping: false }),
            _ => None,
        },
    );
    if let LineKind::CamCurve { looping } = &mut l.kind {
        f.flag("LOOPING", looping);
    }
    f.ref_list("TRIADS", &mut l.triads);
}

fn higher_pair(h: &mut HigherPair, f: &mut dyn Fields) {
    choice(
        f,
        "TYPE",
        &mut h.kind,
        &[(TransmissionKind::Gear, "GEAR"), (TransmissionKind::RackPinion, "RACK_PINION")],
    );
    f.reference("INPUT_JOINT", &mut h.input_joint);
    f.int("INPUT_DOF", &mut h.input_dof);
    f.reference("OUTPUT_JOINT", &mut h.output_joint);
    f.int("OUTPUT_DOF", &mut h.output_dof);
    f.real("RATIO", &mut h.ratio);
}

fn spring_base(s: &mut SpringBase, f: &mut dyn Fields) {
    f.real("INIT_LENGTH", &mut s.init_length);
    f.reference("LENGTH_ENGINE", &mut s.length_engine);
    f.real("STIFFNESS", &mut s.stiffness);
    f.reference("STIFFNESS_FUNCTION", &mut s.function);
    f.flag("FORCE_FUNCTION", &mut s.force_function);
    f.reference("SCALE_ENGINE", &mut s.scale_engine);
    f.reference("SPRING_CHARACTERISTICS", &mut s.spring_char);
}

fn damper_base(d: &mut DamperBase, f: &mut dyn Fields) {
    f.real("COEFFICIENT", &mut d.coefficient);
    f.reference("COEFFICIENT_FUNCTION", &mut d.function);
    f.flag("FORCE_FUNCTION", &mut d.force_function);
    f.reference("SCALE_ENGINE", &mut d.scale_engine);
    f.flag("DEFORMATIONAL", &mut d.is_def_damper);
}

fn spring_char(c: &mut SpringChar, f: &mut dyn Fields) {
    f.opt_real("DEFLECTION_MAX", &mut c.deflection_max);
    f.opt_real("DEFLECTION_MIN", &mut c.deflection_min);
    f.opt_real("FORCE_MAX", &mut c.force_max);
    f.opt_real("FORCE_MIN", &mut c.force_min);
    f.flag("FAIL_ALL", &mut c.fail_all);
    f.opt_real("YIELD_FORCE_MAX", &mut c.yield_force_max);
    f.reference("YIELD_FORCE_MAX_ENGINE", &mut c.yield_force_max_engine);
    f.opt_real("YIELD_FORCE_MIN", &mut c.yield_force_min);
    f.reference("YIELD_FORCE_MIN_ENGINE", &mut c.yield_force_min_engine);
    f.opt_real("YIELD_DEFLECTION_MAX", &mut c.yield_deflection_max);
}

fn friction(fr: &mut Friction, f: &mut dyn Fields) {
    variant(f, "TYPE", &mut fr.kind, |k| k.fsi_name(), |w| {
        Some(match w {
            "ROT_FRICTION" => FrictionKind::Rotational { radius: 0.0 },
            "BALL_FRICTION" => FrictionKind::Ball {
                radius: 0.0,
                two_param: false,
            },
            "BALL_FRICTION2" => FrictionKind::Ball {
                radius: 0.0,
                two_param: true,
            },
            "BEARING_FRICTION" => FrictionKind::Bearing {
                radius: 0.0,
                capacity: 0.0,
                constant: 0.0,
            },
            "PRISMATIC_FRICTION" => FrictionKind::Prismatic {
                radius: 0.0,
                constant: 0.0,
            },
            "TRANS_FRICTION" => FrictionKind::Translational,
            "CAM_FRICTION" => FrictionKind::Cam,
            _ => return None,
        })
    });
    match &mut fr.kind {
        FrictionKind::Rotational { radius } | FrictionKind::Ball { radius, .. } => {
            f.real("RADIUS", radius);
        }
        FrictionKind::Bearing {
            radius,
            capacity,
            constant,
        } => {
            f.real("RADIUS", radius);
            f.real("CAPACITY", capacity);
            f.real("CONSTANT", constant);
        }
        FrictionKind::Prismatic { radius, constant } => {
            f.real("RADIUS", radius);
            f.real("CONSTANT", constant);
        }
        FrictionKind::Translational | FrictionKind::Cam => {}
    }
    f.real("PRESTRESS_LOAD", &mut fr.prestress_load);
    f.real("COULOMB_COEFF", &mut fr.coulomb_coeff);
    f.real("STRIBECK_MAGN", &mut fr.stribeck_magn);
    f.real("STRIBECK_SPEED", &mut fr.stribeck_speed);
    f.real("STICK_STIFFNESS", &mut fr.stick_stiffness);
}

fn load(l: &mut Load, f: &mut dyn Fields) {
    choice(f, "TYPE", &mut l.kind, &[(LoadKind::Force, "FORCE"), (LoadKind::Moment, "MOMENT")]);
    f.reference("TRIAD", &mut l.triad);
    point(f, "FROM_POINT", &mut l.from);
    f.reference("FROM_REF", &mut l.from_ref);
    point(f, "TO_POINT", &mut l.to);
    f.reference("TO_REF", &mut l.to_ref);
    f.real("MAGNITUDE", &mut l.magnitude);
    f.reference("ENGINE", &mut l.engine);
}

fn function(func: &mut Function, f: &mut dyn Fields) {
    variant(f, "TYPE", &mut func.kind, |k| k.fsi_name(), |w| {
        Some(match w {
            "CONSTANT" => FunctionKind::Constant { value: 0.0 },
            "SCALE" => FunctionKind::Scale { factor: 1.0 },
            "RAMP" => FunctionKind::Ramp {
                amplitude_displacement: 0.0,
                slope: 0.0,
                delay: 0.0,
            },
            "SINUSOIDAL" => FunctionKind::Sinusoidal {
                frequency: 0.0,
                delay: 0.0,
                amplitude: 0.0,
                amplitude_displacement: 0.0,
                max_time: 0.0,
            },
            "LIN_VAR" => FunctionKind::LinVar { values: Vec::new() },
            "SPLINE" => FunctionKind::Spline { values: Vec::new() },
            "DEVICE_FUNCTION" => FunctionKind::Device {
                file_name: String::new(),
                channel: 0,
                shift: 0.0,
                scale: 1.0,
                zero_adjust: false,
            },
            "EXTERNAL_FUNCTION" => FunctionKind::External {
                channel: 0,
                shift: 0.0,
                scale: 1.0,
            },
            "USER_DEFINED" => FunctionKind::UserDefined {
                function_id: 0,
                parameters: Vec::new(),
            },
            _ => return None,
        })
    });
    f.int("EXTRAPOLATION", &mut func.extrapolation);
    match &mut func.kind {
        FunctionKind::Constant { value } => f.real("VALUE", value),
        FunctionKind::Scale { factor } => f.real("FACTOR", factor),
        FunctionKind::Ramp {
            amplitude_displacement,
            slope,
            delay,
        } => {
            f.real("AMPLITUDE_DISPLACEMENT", amplitude_displacement);
            f.real("SLOPE", slope);
            f.real("DELAY", delay);
        }
        FunctionKind::Sinusoidal {
            frequency,
            delay,
            amplitude,
            amplitude_displacement,
            max_time,
        } => {
            f.real("FREQUENCY", frequency);
            f.real("DELAY", delay);
            f.real("AMPLITUDE", amplitude);
            f.real("AMPLITUDE_DISPLACEMENT", amplitude_displacement);
            f.real("MAX_TIME", max_time);
        }
        FunctionKind::LinVar { values } | FunctionKind::Spline { values } => {
            f.real_list("VALUES", values);
        }
        FunctionKind::Device {
            file_name,
            channel,
            shift,
            scale,
            zero_adjust,
        } => {
            f.text("FILE_NAME", file_name);
            f.int("CHANNEL", channel);
            f.real("SHIFT", shift);
            f.real("SCALE", scale);
            f.flag("ZERO_ADJUST", zero_adjust);
        }
        FunctionKind::External {
            channel,
            shift,
            scale,
        } => {
            f.int("CHANNEL", channel);
            f.real("SHIFT", shift);
            f.real("SCALE", scale);
        }
        FunctionKind::UserDefined {
            function_id,
            parameters,
        } => {
            f.int("FUNCTION_ID", function_id);
            f.real_list("PARAMETERS", parameters);
        }
    }
}

fn engine(e: &mut Engine, f: &mut dyn Fields) {
    f.reference("FUNCTION", &mut e.function);
    f.flag("OUTPUT", &mut e.output);

    let mut sensors: Vec<Option<EntityKey>> = e.args.iter().map(|a| a.sensor).collect();
    let mut dofs: Vec<i32> = e.args.iter().map(|a| a.dof as i32).collect();
    let mut entities: Vec<String> = e.args.iter().map(|a| a.entity.as_str().to_owned()).collect();
    f.ref_slots("ARG_SENSORS", &mut sensors);
    f.int_list("ARG_DOFS", &mut dofs);
    f.words("ARG_ENTITIES", &mut entities);
    if !f.reading() {
        return;
    }
    let mut args = Vec::with_capacity(sensors.len());
    for (i, sensor) in sensors.into_iter().enumerate() {
        let dof = dofs.get(i).copied().unwrap_or(0);
        let entity = match entities.get(i) {
            Some(word) => match SensorEntity::parse(word) {
                Some(ent) => ent,
                None => {
                    f.reject("ARG_ENTITIES", word);
                    SensorEntity::default()
                }
            },
            None => SensorEntity::default(),
        };
        args.push(EngineArg {
            sensor,
            dof: usize::try_from(dof).unwrap_or(0),
            entity,
        });
    }
    e.args = args;
}

fn sensor(s: &mut Sensor, f: &mut dyn Fields) {
    variant(
        f,
        "TYPE",
        &mut s.kind,
        |k| match k {
            SensorKind::Time => "TIME",
            SensorKind::Simple { .. } => "SIMPLE",
        },
        |w| match w {
            "TIME" => Some(SensorKind::Time),
            "SIMPLE" => Some(SensorKind::Simple { measured: None }),
            _ => None,
        },
    );
    if let SensorKind::Simple { measured } = &mut s.kind {
        f.reference("MEASURED", measured);
    }
}

fn rosette(r: &mut StrainRosette, f: &mut dyn Fields) {
    f.reference("PART", &mut r.part);
    named(f, "ROSETTE_TYPE", &mut r.rosette_type, RosetteType::as_str, RosetteType::parse);
    f.flag("ZERO_INIT", &mut r.zero_init);
    f.int_list("NODES", &mut r.nodes);
    placement(f, "POSITION", &mut r.placement);
    f.real("Z_POS", &mut r.z_pos);
    f.real("E_MOD", &mut r.e_mod);
    f.real("NU", &mut r.nu);
}

fn tire(t: &mut Tire, f: &mut dyn Fields) {
    f.reference("ROAD", &mut t.road);
    f.reference("JOINT", &mut t.joint);
    f.text("TIRE_TYPE", &mut t.tire_type);
    f.text("API", &mut t.api);
    f.text("DATA_FILE", &mut t.data_file);
    f.real("SPINDLE_OFFSET", &mut t.spindle_offset);
    f.real("VERTICAL_STIFFNESS", &mut t.vertical_stiffness);
    f.real("VERTICAL_DAMPING", &mut t.vertical_damping);
}

fn road(r: &mut Road, f: &mut dyn Fields) {
    let mut file = r.data_file.clone().unwrap_or_default();
    if f.reading() || r.data_file.is_some() {
        f.text("DATA_FILE", &mut file);
    }
    r.data_file = (!file.is_empty()).then_some(file);
    f.reference("FUNCTION", &mut r.function);
    f.real("X_OFFSET", &mut r.x_offset);
    f.real("Z_SHIFT", &mut r.z_shift);
    f.real("Z_ROTATION", &mut r.z_rotation);
}
