//! The model context: entity arena, identity registry and lifecycle.
//!
//! All entities live in one [`SlotMap`] owned by [`Model`]. Base ids are
//! handed out by an [`IdentityRegistry`]; loading runs inside a
//! [`Model::begin_load`] / [`Model::finish_load`] bracket so that id
//! conflicts are resolved once every entity has arrived.

use std::collections::BTreeSet;

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::config::MechanismSettings;
use crate::control::{ControlElement, ControlLine};
use crate::dof::DofStatus;
use crate::entity::{Entity, EntityData, EntityType, Header, LifecycleState, References};
use crate::function::{Engine, Function};
use crate::geometry::Mat34;
use crate::id::{BaseId, EntityKey, UserId};
use crate::joint::{HigherPair, Joint};
use crate::line::LineMaster;
use crate::load::{DofLoad, DofMotion, Load};
use crate::part::{
    Assembly, Beam, BeamProperty, GenericObject, Part, Road, StrainRosette, Tire, Turbine,
    UserElement,
};
use crate::registry::{IdReassignment, IdentityRegistry, InsertOutcome};
use crate::sensor::Sensor;
use crate::spring::{
    AxialDamper, AxialSpring, DamperBase, Friction, JointDamper, JointSpring, SpringBase,
    SpringChar,
};
use crate::triad::Triad;

/// Errors from model operations that cannot simply be refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown entity key {0:?}")]
    UnknownKey(EntityKey),
    #[error("{entity} is not a {expected:?}")]
    WrongType { entity: String, expected: EntityType },
    #[error("DOF {dof} is not legal for {entity}")]
    IllegalDof { entity: String, dof: usize },
    #[error("{0} is already connected")]
    AlreadyConnected(String),
    #[error("{0} is not connected")]
    NotConnected(String),
}

/// Per-DOF child slots of triads and joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DofChild {
    Spring,
    Damper,
    Motion,
    Load,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One open model. Creating it opens the model, dropping it closes it.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entities: SlotMap<EntityKey, Entity>,
    registry: IdentityRegistry<EntityKey>,
    pub settings: MechanismSettings,
    loading: bool,
}

impl Model {
    pub fn new(settings: MechanismSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities.iter()
    }

    pub fn header(&self, key: EntityKey) -> Option<&Header> {
        self.entities.get(key).map(|e| &e.header)
    }

    pub fn header_mut(&mut self, key: EntityKey) -> Option<&mut Header> {
        self.entities.get_mut(key).map(|e| &mut e.header)
    }

    pub fn entity_type(&self, key: EntityKey) -> Option<EntityType> {
        self.entities.get(key).map(Entity::entity_type)
    }

    pub fn base_id(&self, key: EntityKey) -> BaseId {
        self.header(key).map_or(BaseId::UNASSIGNED, |h| h.base_id)
    }

    /// Base id of an optional reference, 0 when absent.
    pub fn id_of(&self, key: Option<EntityKey>) -> i32 {
        key.and_then(|k| self.header(k)).map_or(0, |h| h.base_id.0)
    }

    pub fn user_id(&self, key: EntityKey) -> UserId {
        self.header(key).map_or(UserId(0), |h| h.user_id)
    }

    pub fn id_string(&self, key: EntityKey) -> String {
        self.get(key).map_or_else(|| format!("{key:?}"), Entity::id_string)
    }

    pub fn registry(&self) -> &IdentityRegistry<EntityKey> {
        &self.registry
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // -----------------------------------------------------------------------
    // Creation and lifecycle
    // -----------------------------------------------------------------------

    /// Add an unconnected entity to the arena.
    pub fn create(&mut self, data: impl Into<EntityData>) -> EntityKey {
        self.entities.insert(Entity::new(data))
    }

    /// Add an unconnected entity with a prepared header (loaded entities,
    /// clones).
    pub fn create_with_header(&mut self, header: Header, data: impl Into<EntityData>) -> EntityKey {
        let mut entity = Entity::new(data);
        entity.header = header;
        entity.header.state = LifecycleState::Unconnected;
        self.entities.insert(entity)
    }

    /// Create and connect in one step.
    pub fn insert(&mut self, data: impl Into<EntityData>) -> EntityKey {
        let key = self.create(data);
        self.connect_unchecked(key);
        key
    }

    /// Create and connect inside `assembly`.
    pub fn insert_in(&mut self, data: impl Into<EntityData>, assembly: Option<EntityKey>) -> EntityKey {
        let key = self.create(data);
        if let Some(h) = self.header_mut(key) {
            h.parent_assembly = assembly;
        }
        self.connect_unchecked(key);
        key
    }

    /// Register the entity and make it visible to queries.
    ///
    /// A fresh entity draws the next free base id. One that carries an id
    /// keeps it when possible; conflicts are resolved at the end of the
    /// current load, or immediately outside a load.
    pub fn connect(&mut self, key: EntityKey) -> Result<BaseId, ModelError> {
        let entity = self.entities.get(key).ok_or(ModelError::UnknownKey(key))?;
        if entity.is_connected() {
            return Err(ModelError::AlreadyConnected(entity.id_string()));
        }
        Ok(self.connect_unchecked(key))
    }

    fn connect_unchecked(&mut self, key: EntityKey) -> BaseId {
        let Some(entity) = self.entities.get(key) else {
            return BaseId::UNASSIGNED;
        };
        let etype = entity.entity_type();
        let requested = entity.header.base_id;
        let result_bearing = etype.is_result_bearing();
        let user_id = if entity.header.user_id.0 == 0 {
            self.next_user_id(etype)
        } else {
            entity.header.user_id
        };

        let mut deferred = false;
        let id = match self.registry.insert_requested(key, requested, result_bearing) {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Evicted {
                id,
                evicted,
                relocated_to,
            } => {
                if let Some(h) = self.header_mut(evicted) {
                    h.base_id = relocated_to;
                }
                id
            }
            InsertOutcome::Deferred { requested } => {
                deferred = true;
                requested
            }
        };

        if let Some(entity) = self.entities.get_mut(key) {
            entity.header.base_id = id;
            entity.header.user_id = user_id;
            entity.header.state = LifecycleState::Connected;
        }

        if deferred && !self.loading {
            self.resolve_conflicts();
        }
        self.base_id(key)
    }

    /// Remove the entity from the registry. It stays in the arena and may
    /// be connected again.
    pub fn disconnect(&mut self, key: EntityKey) -> Result<(), ModelError> {
        let entity = self.entities.get_mut(key).ok_or(ModelError::UnknownKey(key))?;
        if !entity.is_connected() {
            return Err(ModelError::NotConnected(entity.id_string()));
        }
        entity.header.state = LifecycleState::Disconnecting;
        let id = entity.header.base_id;
        if !self.registry.remove(id, key) {
            self.registry.cancel_deferred(key);
        }
        if let Some(entity) = self.entities.get_mut(key) {
            entity.header.state = LifecycleState::Disconnected;
        }
        Ok(())
    }

    /// Start a load or merge: id conflicts are collected, not resolved.
    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Finish a load: resolve deferred id conflicts. Entities whose
    /// results are keyed on the lost id are logged as warnings.
    pub fn finish_load(&mut self) -> Vec<IdReassignment<EntityKey>> {
        self.loading = false;
        self.resolve_conflicts()
    }

    fn resolve_conflicts(&mut self) -> Vec<IdReassignment<EntityKey>> {
        let reassigned = self.registry.resolve_deferred();
        for r in &reassigned {
            if let Some(h) = self.header_mut(r.key) {
                h.base_id = r.assigned;
            }
            if r.result_bearing {
                warn!(
                    entity = %self.id_string(r.key),
                    requested = r.requested.0,
                    assigned = r.assigned.0,
                    "base id changed; stored result curves for the old id no longer match"
                );
            } else {
                debug!(requested = r.requested.0, assigned = r.assigned.0, "base id reassigned");
            }
        }
        reassigned
    }

    fn next_user_id(&self, etype: EntityType) -> UserId {
        let used: BTreeSet<i32> = self
            .entities
            .values()
            .filter(|e| e.entity_type() == etype && e.is_connected())
            .map(|e| e.header.user_id.0)
            .collect();
        let max = used.last().copied().unwrap_or(0);
        match max.checked_add(1) {
            Some(next) => UserId(next.max(1)),
            None => UserId((1..).find(|id| !used.contains(id)).unwrap_or(i32::MAX)),
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn find_by_base_id(&self, id: BaseId) -> Option<EntityKey> {
        self.registry.find(id)
    }

    pub fn find_by_user_id(&self, etype: EntityType, user_id: UserId) -> Option<EntityKey> {
        self.entities
            .iter()
            .find(|(_, e)| e.entity_type() == etype && e.header.user_id == user_id && e.is_connected())
            .map(|(k, _)| k)
    }

    /// Connected entities of one type, ordered by user id then base id.
    pub fn keys_of_type(&self, etype: EntityType) -> Vec<EntityKey> {
        let mut keys: Vec<(UserId, BaseId, EntityKey)> = self
            .entities
            .iter()
            .filter(|(_, e)| e.entity_type() == etype && e.is_connected())
            .map(|(k, e)| (e.header.user_id, e.header.base_id, k))
            .collect();
        keys.sort_by_key(|(u, b, _)| (*u, *b));
        keys.into_iter().map(|(_, _, k)| k).collect()
    }

    /// Entities referring to `key`, excluding owner back-references from
    /// its own DOF children.
    pub fn referrers(&self, key: EntityKey) -> Vec<EntityKey> {
        self.entities
            .iter()
            .filter(|(k, e)| *k != key && e.refers_to(key) && !is_owner_backref(e, key))
            .map(|(k, _)| k)
            .collect()
    }

    /// Whether anything still needs `key`. Triads attached to a part are
    /// always needed.
    pub fn is_referenced(&self, key: EntityKey) -> bool {
        if self.triad(key).is_some_and(Triad::is_attached) {
            return true;
        }
        self.entities
            .iter()
            .any(|(k, e)| k != key && e.refers_to(key) && !is_owner_backref(e, key))
    }

    /// User ids of the enclosing assemblies, outermost first.
    pub fn assembly_path(&self, key: EntityKey) -> Vec<i32> {
        let mut path = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cur = self.header(key).and_then(|h| h.parent_assembly);
        while let Some(a) = cur {
            if !seen.insert(a) {
                break;
            }
            path.push(self.user_id(a).0);
            cur = self.header(a).and_then(|h| h.parent_assembly);
        }
        path.reverse();
        path
    }

    // -----------------------------------------------------------------------
    // DOF status and children
    // -----------------------------------------------------------------------

    /// Assign a joint DOF status. Spring-type and free-dynamics statuses
    /// materialise the spring and damper, PRESCRIBED the motion.
    pub fn set_joint_status(&mut self, joint: EntityKey, dof: usize, status: DofStatus) -> bool {
        let Some(j) = self.joint_mut(joint) else {
            return false;
        };
        if !j.set_status(dof, status) {
            return false;
        }
        if status >= DofStatus::FreeDynamics {
            self.joint_child(joint, DofChild::Spring, dof, true);
            self.joint_child(joint, DofChild::Damper, dof, true);
        } else if status == DofStatus::Prescribed {
            self.joint_child(joint, DofChild::Motion, dof, true);
        }
        true
    }

    pub fn set_triad_status(&mut self, triad: EntityKey, dof: usize, status: DofStatus) -> bool {
        let Some(t) = self.triad_mut(triad) else {
            return false;
        };
        if !t.set_status(dof, status) {
            return false;
        }
        if status == DofStatus::Prescribed {
            self.triad_child(triad, DofChild::Motion, dof, true);
        }
        true
    }

    /// Per-DOF child of a joint, created and connected on demand. Illegal
    /// DOFs have no children.
    pub fn joint_child(
        &mut self,
        joint: EntityKey,
        kind: DofChild,
        dof: usize,
        create: bool,
    ) -> Option<EntityKey> {
        let j = self.joint(joint)?;
        if !j.is_legal(dof) {
            return None;
        }
        let existing = match kind {
            DofChild::Spring => j.springs[dof],
            DofChild::Damper => j.dampers[dof],
            DofChild::Motion => j.motions[dof],
            DofChild::Load => j.loads[dof],
        };
        if existing.is_some() || !create {
            return existing;
        }

        let owner = Some(joint);
        let data: EntityData = match kind {
            DofChild::Spring => JointSpring {
                owner,
                dof,
                base: SpringBase::default(),
            }
            .into(),
            DofChild::Damper => JointDamper {
                owner,
                dof,
                base: DamperBase::default(),
            }
            .into(),
            DofChild::Motion => DofMotion {
                owner,
                dof,
                ..DofMotion::default()
            }
            .into(),
            DofChild::Load => DofLoad {
                owner,
                dof,
                ..DofLoad::default()
            }
            .into(),
        };
        let assembly = self.header(joint).and_then(|h| h.parent_assembly);
        let child = self.insert_in(data, assembly);
        let j = self.joint_mut(joint)?;
        match kind {
            DofChild::Spring => j.springs[dof] = Some(child),
            DofChild::Damper => j.dampers[dof] = Some(child),
            DofChild::Motion => j.motions[dof] = Some(child),
            DofChild::Load => j.loads[dof] = Some(child),
        }
        Some(child)
    }

    /// Load or motion child of a triad. Triads carry no springs or dampers.
    pub fn triad_child(
        &mut self,
        triad: EntityKey,
        kind: DofChild,
        dof: usize,
        create: bool,
    ) -> Option<EntityKey> {
        let t = self.triad(triad)?;
        if !t.is_legal(dof) {
            return None;
        }
        let existing = match kind {
            DofChild::Motion => t.motions[dof],
            DofChild::Load => t.loads[dof],
            DofChild::Spring | DofChild::Damper => return None,
        };
        if existing.is_some() || !create {
            return existing;
        }
        let owner = Some(triad);
        let data: EntityData = if kind == DofChild::Motion {
            DofMotion {
                owner,
                dof,
                ..DofMotion::default()
            }
            .into()
        } else {
            DofLoad {
                owner,
                dof,
                ..DofLoad::default()
            }
            .into()
        };
        let assembly = self.header(triad).and_then(|h| h.parent_assembly);
        let child = self.insert_in(data, assembly);
        let t = self.triad_mut(triad)?;
        if kind == DofChild::Motion {
            t.motions[dof] = Some(child);
        } else {
            t.loads[dof] = Some(child);
        }
        Some(child)
    }

    // -----------------------------------------------------------------------
    // Sensors
    // -----------------------------------------------------------------------

    /// The model's time sensor, created on first use.
    pub fn time_sensor(&mut self) -> EntityKey {
        let existing = self
            .entities
            .iter()
            .find(|(_, e)| e.data.as_sensor().is_some_and(Sensor::is_time) && e.is_connected())
            .map(|(k, _)| k);
        match existing {
            Some(k) => k,
            None => self.insert(Sensor::time()),
        }
    }

    /// The simple sensor measuring `measured`, created on first use.
    pub fn sensor_for(&mut self, measured: EntityKey) -> EntityKey {
        let existing = self
            .entities
            .iter()
            .find(|(_, e)| {
                e.is_connected() && e.data.as_sensor().and_then(Sensor::measured) == Some(measured)
            })
            .map(|(k, _)| k);
        match existing {
            Some(k) => k,
            None => self.insert(Sensor::measuring(measured)),
        }
    }

    /// Whether any sensor measures `key`.
    pub fn is_measured(&self, key: EntityKey) -> bool {
        self.entities
            .values()
            .any(|e| e.data.as_sensor().and_then(Sensor::measured) == Some(key))
    }

    // -----------------------------------------------------------------------
    // Erase
    // -----------------------------------------------------------------------

    /// Disconnect and destroy an entity together with everything it
    /// exclusively owns. Returns `false` for an unknown key.
    pub fn erase(&mut self, key: EntityKey) -> bool {
        if !self.entities.contains_key(key) {
            return false;
        }
        let mut erasing = BTreeSet::new();
        self.erase_guarded(key, &mut erasing);
        true
    }

    fn erase_guarded(&mut self, key: EntityKey, erasing: &mut BTreeSet<EntityKey>) {
        if !self.entities.contains_key(key) || !erasing.insert(key) {
            return;
        }
        let Some(etype) = self.entity_type(key) else {
            return;
        };

        let mut owned: Vec<EntityKey> = Vec::new();
        let mut if_unused: Vec<EntityKey> = Vec::new();
        let mut lines: Vec<EntityKey> = Vec::new();

        match etype {
            EntityType::Triad => {
                self.detach_triad(key, erasing);
                if let Some(t) = self.triad(key) {
                    owned.extend(t.loads.iter().flatten());
                    owned.extend(t.motions.iter().flatten());
                }
            }
            EntityType::Joint => {
                if let Some(j) = self.joint(key) {
                    for slots in [&j.springs, &j.dampers, &j.motions, &j.loads] {
                        owned.extend(slots.iter().flatten());
                    }
                    if_unused.extend(j.slave);
                    if j.is_line() {
                        lines.extend(j.line);
                    } else {
                        if_unused.extend(j.master);
                    }
                }
                owned.extend(self.entities.iter().filter_map(|(k, e)| {
                    let hp = e.data.as_higher_pair()?;
                    (hp.input_joint == Some(key) || hp.output_joint == Some(key)).then_some(k)
                }));
            }
            EntityType::LineMaster => {
                if let Some(l) = self.line_master(key) {
                    if_unused.extend(l.triads.iter().copied());
                }
            }
            EntityType::Engine => {
                if let Some(e) = self.engine(key) {
                    if_unused.extend(e.function);
                    if_unused.extend(e.args.iter().filter_map(|a| a.sensor));
                }
            }
            EntityType::ControlElement => {
                owned.extend(self.entities.iter().filter_map(|(k, e)| {
                    let line = e.data.as_control_line()?;
                    (line.start == Some(key) || line.end == Some(key)).then_some(k)
                }));
            }
            _ => {}
        }

        owned.extend(self.entities.iter().filter_map(|(k, e)| {
            (e.data.as_sensor()?.measured() == Some(key)).then_some(k)
        }));

        if let Some(entity) = self.entities.get(key) {
            if entity.is_connected() {
                let id = entity.header.base_id;
                if !self.registry.remove(id, key) {
                    self.registry.cancel_deferred(key);
                }
            }
        }
        self.entities.remove(key);
        for entity in self.entities.values_mut() {
            entity.data.release(key);
            if entity.header.parent_assembly == Some(key) {
                entity.header.parent_assembly = None;
            }
        }
        debug!(?key, ?etype, "erased entity");

        for k in owned {
            self.erase_guarded(k, erasing);
        }
        for line in lines {
            self.dispose_line(line, erasing);
        }
        for k in if_unused {
            if self.entities.contains_key(k) && !self.is_referenced(k) {
                self.erase_guarded(k, erasing);
            }
        }
    }

    /// Erase a line no joint uses any more, unless it still spans three or
    /// more triads.
    fn dispose_line(&mut self, line: EntityKey, erasing: &mut BTreeSet<EntityKey>) {
        let Some(l) = self.line_master(line) else {
            return;
        };
        let used = self.joints_on_line(line).next().is_some();
        if !used && l.len() <= 2 {
            self.erase_guarded(line, erasing);
        }
    }

    fn joints_on_line(&self, line: EntityKey) -> impl Iterator<Item = EntityKey> + '_ {
        self.entities
            .iter()
            .filter(move |(_, e)| e.data.as_joint().is_some_and(|j| j.line == Some(line)))
            .map(|(k, _)| k)
    }

    /// Rewire or erase the joints depending on a triad about to be erased.
    fn detach_triad(&mut self, triad: EntityKey, erasing: &mut BTreeSet<EntityKey>) {
        let triad_asm = self.header(triad).and_then(|h| h.parent_assembly);
        let joints: Vec<EntityKey> = self
            .entities
            .iter()
            .filter_map(|(k, e)| {
                let j = e.data.as_joint()?;
                let on_line = j
                    .line
                    .and_then(|l| self.line_master(l))
                    .is_some_and(|l| l.contains(triad));
                (j.slave == Some(triad) || j.master == Some(triad) || on_line).then_some(k)
            })
            .collect();

        for joint in joints {
            let Some(j) = self.joint(joint) else {
                continue;
            };
            let joint_asm = self.header(joint).and_then(|h| h.parent_assembly);
            let is_slave = j.slave == Some(triad);
            let same_asm = joint_asm == triad_asm;

            if !j.is_line() || is_slave {
                if same_asm {
                    self.erase_guarded(joint, erasing);
                } else {
                    let stand_in = self.stand_in_triad(triad, joint_asm);
                    if let Some(j) = self.joint_mut(joint) {
                        if is_slave {
                            j.slave = Some(stand_in);
                        } else {
                            j.master = Some(stand_in);
                        }
                    }
                }
                continue;
            }

            let line = j.line;
            let slave = j.slave;
            let short = line
                .and_then(|l| self.line_master(l))
                .is_none_or(|l| l.len() < 3);
            if short {
                let slave_elsewhere = slave
                    .and_then(|s| self.header(s))
                    .is_some_and(|h| h.parent_assembly != triad_asm);
                if let Some(j) = self.joint_mut(joint) {
                    j.line = None;
                    if slave_elsewhere {
                        j.slave = None;
                    }
                }
                if let Some(l) = line {
                    if self.joints_on_line(l).next().is_none() {
                        self.erase_guarded(l, erasing);
                    }
                }
                self.erase_guarded(joint, erasing);
            } else if let Some(l) = line.and_then(|l| self.line_master_mut(l)) {
                l.release_triad(triad);
            }
        }
    }

    fn stand_in_triad(&mut self, original: EntityKey, assembly: Option<EntityKey>) -> EntityKey {
        let (origin, description) = match (self.triad(original), self.header(original)) {
            (Some(t), Some(h)) => (t.placement.translation(), h.description.clone()),
            _ => (Default::default(), String::new()),
        };
        let key = self.create(Triad::at(Mat34::at(origin)));
        if let Some(h) = self.header_mut(key) {
            h.description = description;
            h.parent_assembly = assembly;
        }
        self.connect_unchecked(key);
        debug!(?original, stand_in = ?key, "replaced erased triad in joint of another assembly");
        key
    }
}

/// A DOF child pointing back at its owner does not keep the owner alive.
fn is_owner_backref(e: &Entity, owner: EntityKey) -> bool {
    let back = match &e.data {
        EntityData::JointSpring(s) => s.owner,
        EntityData::JointDamper(d) => d.owner,
        EntityData::DofLoad(l) => l.owner,
        EntityData::DofMotion(m) => m.owner,
        _ => None,
    };
    back == Some(owner)
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

macro_rules! typed_access {
    ($($get:ident, $get_mut:ident => $ty:ty, $as_ref:ident, $as_mut:ident;)*) => {
        impl Model {
            $(
                pub fn $get(&self, key: EntityKey) -> Option<&$ty> {
                    self.entities.get(key)?.data.$as_ref()
                }

                pub fn $get_mut(&mut self, key: EntityKey) -> Option<&mut $ty> {
                    self.entities.get_mut(key)?.data.$as_mut()
                }
            )*
        }
    };
}

typed_access! {
    triad, triad_mut => Triad, as_triad, as_triad_mut;
    part, part_mut => Part, as_part, as_part_mut;
    beam, beam_mut => Beam, as_beam, as_beam_mut;
    beam_property, beam_property_mut => BeamProperty, as_beam_property, as_beam_property_mut;
    joint, joint_mut => Joint, as_joint, as_joint_mut;
    line_master, line_master_mut => LineMaster, as_line_master, as_line_master_mut;
    higher_pair, higher_pair_mut => HigherPair, as_higher_pair, as_higher_pair_mut;
    joint_spring, joint_spring_mut => JointSpring, as_joint_spring, as_joint_spring_mut;
    joint_damper, joint_damper_mut => JointDamper, as_joint_damper, as_joint_damper_mut;
    axial_spring, axial_spring_mut => AxialSpring, as_axial_spring, as_axial_spring_mut;
    axial_damper, axial_damper_mut => AxialDamper, as_axial_damper, as_axial_damper_mut;
    spring_char, spring_char_mut => SpringChar, as_spring_char, as_spring_char_mut;
    friction, friction_mut => Friction, as_friction, as_friction_mut;
    load, load_mut => Load, as_load, as_load_mut;
    dof_load, dof_load_mut => DofLoad, as_dof_load, as_dof_load_mut;
    dof_motion, dof_motion_mut => DofMotion, as_dof_motion, as_dof_motion_mut;
    function, function_mut => Function, as_function, as_function_mut;
    engine, engine_mut => Engine, as_engine, as_engine_mut;
    sensor, sensor_mut => Sensor, as_sensor, as_sensor_mut;
    control_element, control_element_mut => ControlElement, as_control_element, as_control_element_mut;
    control_line, control_line_mut => ControlLine, as_control_line, as_control_line_mut;
    generic_object, generic_object_mut => GenericObject, as_generic_object, as_generic_object_mut;
    assembly, assembly_mut => Assembly, as_assembly, as_assembly_mut;
    strain_rosette, strain_rosette_mut => StrainRosette, as_strain_rosette, as_strain_rosette_mut;
    tire, tire_mut => Tire, as_tire, as_tire_mut;
    road, road_mut => Road, as_road, as_road_mut;
    user_element, user_element_mut => UserElement, as_user_element, as_user_element_mut;
    turbine, turbine_mut => Turbine, as_turbine, as_turbine_mut;
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::{X_TRANS, Z_ROT, Z_TRANS};
    use crate::function::EngineArg;
    use crate::geometry::Vec3;
    use crate::joint::JointVariant;
    use crate::line::LineKind;
    use crate::sensor::SensorEntity;

    fn triad_at(model: &mut Model, x: f64) -> EntityKey {
        model.insert(Triad::at(Mat34::at(Vec3::new(x, 0.0, 0.0))))
    }

    fn point_joint(model: &mut Model, variant: JointVariant) -> (EntityKey, EntityKey, EntityKey) {
        let slave = triad_at(model, 0.0);
        let master = triad_at(model, 0.0);
        let mut j = Joint::new(variant);
        j.slave = Some(slave);
        j.master = Some(master);
        let joint = model.insert(j);
        (joint, slave, master)
    }

    fn line_joint(model: &mut Model, n: usize) -> (EntityKey, EntityKey, EntityKey, Vec<EntityKey>) {
        let masters: Vec<EntityKey> = (0..n).map(|i| triad_at(model, i as f64)).collect();
        let line = model.insert(LineMaster::new(LineKind::Straight, masters.clone()));
        let slave = triad_at(model, 0.5);
        let mut j = Joint::new(JointVariant::Prismatic);
        j.slave = Some(slave);
        j.line = Some(line);
        let joint = model.insert(j);
        (joint, slave, line, masters)
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn fresh_entities_get_increasing_ids() {
        let mut m = Model::default();
        let a = triad_at(&mut m, 0.0);
        let b = triad_at(&mut m, 1.0);
        assert_eq!(m.base_id(a), BaseId(1));
        assert_eq!(m.base_id(b), BaseId(2));
        assert_eq!(m.user_id(b), UserId(2));
        assert_eq!(m.find_by_base_id(BaseId(2)), Some(b));
    }

    #[test]
    fn user_ids_are_per_type() {
        let mut m = Model::default();
        triad_at(&mut m, 0.0);
        let f = m.insert(Function::constant(1.0));
        assert_eq!(m.user_id(f), UserId(1));
    }

    #[test]
    fn connecting_twice_is_an_error() {
        let mut m = Model::default();
        let t = triad_at(&mut m, 0.0);
        assert!(matches!(m.connect(t), Err(ModelError::AlreadyConnected(_))));
    }

    #[test]
    fn collision_with_plain_occupant_relocates_it() {
        let mut m = Model::default();
        let f = m.insert(Function::constant(1.0));
        assert_eq!(m.base_id(f), BaseId(1));

        m.begin_load();
        let header = Header {
            base_id: BaseId(1),
            ..Header::default()
        };
        let t = m.create_with_header(header, Triad::default());
        assert_eq!(m.connect(t), Ok(BaseId(1)));
        assert!(m.finish_load().is_empty());
        assert_eq!(m.find_by_base_id(BaseId(1)), Some(t));
        assert_eq!(m.base_id(f), BaseId(2));
    }

    #[test]
    fn collision_with_result_bearing_occupant_is_deferred() {
        let mut m = Model::default();
        let a = triad_at(&mut m, 0.0);
        m.begin_load();
        let header = Header {
            base_id: BaseId(1),
            ..Header::default()
        };
        let b = m.create_with_header(header, Triad::default());
        m.connect(b).unwrap();
        let reassigned = m.finish_load();
        assert_eq!(reassigned.len(), 1);
        assert!(reassigned[0].result_bearing);
        assert_eq!(m.base_id(a), BaseId(1));
        assert_eq!(m.base_id(b), BaseId(2));
    }

    #[test]
    fn loaded_largest_ids_do_not_overflow() {
        let mut m = Model::default();
        m.begin_load();
        let header = Header {
            base_id: BaseId(i32::MAX),
            user_id: UserId(i32::MAX),
            ..Header::default()
        };
        let top = m.create_with_header(header, Triad::default());
        m.connect(top).unwrap();
        assert!(m.finish_load().is_empty());

        let a = triad_at(&mut m, 1.0);
        let b = triad_at(&mut m, 2.0);
        assert_eq!(m.base_id(a), BaseId(1));
        assert_eq!(m.base_id(b), BaseId(2));
        assert_eq!(m.base_id(top), BaseId(i32::MAX));
        assert_eq!(m.user_id(a), UserId(1));
        assert_eq!(m.user_id(b), UserId(2));
    }

    #[test]
    fn disconnect_frees_the_id() {
        let mut m = Model::default();
        let t = triad_at(&mut m, 0.0);
        m.disconnect(t).unwrap();
        assert_eq!(m.find_by_base_id(BaseId(1)), None);
        assert!(m.contains(t));
        assert_eq!(m.connect(t), Ok(BaseId(1)));
    }

    #[test]
    fn assembly_path_is_outermost_first() {
        let mut m = Model::default();
        let outer = m.insert(Assembly::default());
        let inner = m.insert_in(Assembly::default(), Some(outer));
        let t = m.insert_in(Triad::default(), Some(inner));
        assert_eq!(m.assembly_path(t), vec![1, 2]);
    }

    // -----------------------------------------------------------------------
    // DOF children
    // -----------------------------------------------------------------------

    #[test]
    fn free_dynamics_materialises_spring_and_damper() {
        let mut m = Model::default();
        let (j, _, _) = point_joint(&mut m, JointVariant::Revolute { tz_dof: false });
        assert!(m.set_joint_status(j, Z_ROT, DofStatus::FreeDynamics));
        let joint = m.joint(j).unwrap();
        assert!(joint.springs[Z_ROT].is_some());
        assert!(joint.dampers[Z_ROT].is_some());
        assert!(joint.motions[Z_ROT].is_none());
    }

    #[test]
    fn illegal_dof_status_is_refused() {
        let mut m = Model::default();
        let (j, _, _) = point_joint(&mut m, JointVariant::Revolute { tz_dof: false });
        assert!(!m.set_joint_status(j, X_TRANS, DofStatus::SpringConstrained));
        assert_eq!(m.joint_child(j, DofChild::Spring, X_TRANS, true), None);
        assert_eq!(m.joint(j).unwrap().status(X_TRANS), DofStatus::Fixed);
    }

    #[test]
    fn clearing_status_keeps_children() {
        let mut m = Model::default();
        let (j, _, _) = point_joint(&mut m, JointVariant::Free);
        m.set_joint_status(j, Z_TRANS, DofStatus::SpringConstrained);
        let spring = m.joint(j).unwrap().springs[Z_TRANS];
        m.set_joint_status(j, Z_TRANS, DofStatus::Free);
        assert_eq!(m.joint(j).unwrap().springs[Z_TRANS], spring);
    }

    #[test]
    fn children_inherit_assembly() {
        let mut m = Model::default();
        let asm = m.insert(Assembly::default());
        let j = m.insert_in(Joint::new(JointVariant::Ball), Some(asm));
        let s = m.joint_child(j, DofChild::Spring, Z_ROT, true).unwrap();
        assert_eq!(m.header(s).unwrap().parent_assembly, Some(asm));
        assert_eq!(m.joint_spring(s).unwrap().owner, Some(j));
    }

    #[test]
    fn prescribed_triad_dof_gets_motion() {
        let mut m = Model::default();
        let t = triad_at(&mut m, 0.0);
        assert!(m.set_triad_status(t, 1, DofStatus::Prescribed));
        assert!(m.triad(t).unwrap().motions[1].is_some());
        assert_eq!(m.triad_child(t, DofChild::Spring, 1, true), None);
    }

    // -----------------------------------------------------------------------
    // Erase
    // -----------------------------------------------------------------------

    #[test]
    fn erasing_joint_erases_children_and_free_triads() {
        let mut m = Model::default();
        let (j, slave, master) = point_joint(&mut m, JointVariant::Revolute { tz_dof: false });
        m.set_joint_status(j, Z_ROT, DofStatus::SpringConstrained);
        let spring = m.joint(j).unwrap().springs[Z_ROT].unwrap();
        assert!(m.erase(j));
        assert!(!m.contains(spring));
        assert!(!m.contains(slave));
        assert!(!m.contains(master));
        assert!(m.is_empty());
    }

    #[test]
    fn erasing_joint_keeps_attached_triads() {
        let mut m = Model::default();
        let (j, slave, master) = point_joint(&mut m, JointVariant::Ball);
        let part = m.insert(Part::default());
        m.triad_mut(master).unwrap().parts.push(part);
        m.erase(j);
        assert!(m.contains(master));
        assert!(!m.contains(slave));
    }

    #[test]
    fn erasing_slave_of_point_joint_in_same_assembly_erases_joint() {
        let mut m = Model::default();
        let (j, slave, master) = point_joint(&mut m, JointVariant::Ball);
        m.erase(slave);
        assert!(!m.contains(j));
        assert!(!m.contains(master));
    }

    #[test]
    fn erasing_triad_of_joint_in_other_assembly_creates_stand_in() {
        let mut m = Model::default();
        let asm = m.insert(Assembly::default());
        let slave = triad_at(&mut m, 2.0);
        m.header_mut(slave).unwrap().description = "hinge".into();
        let master = m.insert_in(Triad::default(), Some(asm));
        let mut joint = Joint::new(JointVariant::Ball);
        joint.slave = Some(slave);
        joint.master = Some(master);
        let j = m.insert_in(joint, Some(asm));

        m.erase(slave);
        let stand_in = m.joint(j).unwrap().slave.unwrap();
        assert_ne!(stand_in, slave);
        assert_eq!(m.header(stand_in).unwrap().parent_assembly, Some(asm));
        assert_eq!(m.header(stand_in).unwrap().description, "hinge");
        assert_eq!(m.triad(stand_in).unwrap().placement.translation(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn erasing_line_slave_with_two_masters_erases_everything() {
        let mut m = Model::default();
        let (j, slave, line, masters) = line_joint(&mut m, 2);
        m.erase(slave);
        assert!(!m.contains(j));
        assert!(!m.contains(line));
        assert!(masters.iter().all(|t| !m.contains(*t)));
    }

    #[test]
    fn erasing_line_slave_with_three_masters_erases_only_joint() {
        let mut m = Model::default();
        let (j, slave, line, masters) = line_joint(&mut m, 3);
        m.erase(slave);
        assert!(!m.contains(j));
        assert!(m.contains(line));
        assert!(masters.iter().all(|t| m.contains(*t)));
    }

    #[test]
    fn erasing_master_of_long_line_only_detaches_it() {
        let mut m = Model::default();
        let (j, _, line, masters) = line_joint(&mut m, 3);
        m.erase(masters[1]);
        assert!(m.contains(j));
        assert_eq!(m.line_master(line).unwrap().triads, vec![masters[0], masters[2]]);
    }

    #[test]
    fn erasing_master_of_short_line_erases_joint() {
        let mut m = Model::default();
        let (j, slave, line, masters) = line_joint(&mut m, 2);
        m.erase(masters[0]);
        assert!(!m.contains(j));
        assert!(!m.contains(line));
        assert!(!m.contains(slave));
        assert!(!m.contains(masters[1]));
    }

    #[test]
    fn erasing_engine_takes_unshared_function_and_sensor() {
        let mut m = Model::default();
        let t = triad_at(&mut m, 0.0);
        let f = m.insert(Function::constant(2.0));
        let s = m.sensor_for(t);
        let mut e = Engine::with_function(f);
        e.args.push(EngineArg::new(s, 0, SensorEntity::Pos));
        let e1 = m.insert(e.clone());
        let e2 = m.insert(Engine::with_function(f));

        m.erase(e1);
        assert!(m.contains(f));
        assert!(!m.contains(s));
        m.erase(e2);
        assert!(!m.contains(f));
        assert!(m.contains(t));
    }

    #[test]
    fn erasing_measured_entity_erases_its_sensor() {
        let mut m = Model::default();
        let t = triad_at(&mut m, 0.0);
        let s = m.sensor_for(t);
        let mut e = Engine::default();
        e.args.push(EngineArg::new(s, 0, SensorEntity::Pos));
        let engine = m.insert(e);
        m.erase(t);
        assert!(!m.contains(s));
        assert_eq!(m.engine(engine).unwrap().args[0].sensor, None);
    }

    #[test]
    fn erase_unknown_key_is_refused() {
        let mut m = Model::default();
        let t = triad_at(&mut m, 0.0);
        assert!(m.erase(t));
        assert!(!m.erase(t));
    }

    #[test]
    fn time_sensor_is_unique() {
        let mut m = Model::default();
        let a = m.time_sensor();
        let b = m.time_sensor();
        assert_eq!(a, b);
    }
}
