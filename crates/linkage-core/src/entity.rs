//! Entity header, type tags and the closed payload enum.
//!
//! Every domain object lives in the model arena as an [`Entity`]: a common
//! [`Header`] plus one [`EntityData`] variant. References between entities
//! are plain [`EntityKey`]s; the [`References`] trait lets the model walk
//! and release them without knowing the concrete payload.

use serde::{Deserialize, Serialize};

use crate::control::{ControlElement, ControlLine};
use crate::function::{Engine, Function};
use crate::id::{BaseId, EntityKey, UserId};
use crate::joint::{HigherPair, Joint};
use crate::line::LineMaster;
use crate::load::{DofLoad, DofMotion, Load};
use crate::part::{
    Assembly, Beam, BeamProperty, GenericObject, Part, Road, StrainRosette, Tire, Turbine,
    UserElement,
};
use crate::sensor::Sensor;
use crate::spring::{AxialDamper, AxialSpring, Friction, JointDamper, JointSpring, SpringChar};
use crate::triad::Triad;

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

/// Closed set of entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Triad,
    Part,
    Beam,
    BeamProperty,
    Joint,
    LineMaster,
    HigherPair,
    JointSpring,
    JointDamper,
    AxialSpring,
    AxialDamper,
    SpringChar,
    Friction,
    Load,
    DofLoad,
    DofMotion,
    Function,
    Engine,
    Sensor,
    ControlElement,
    ControlLine,
    GenericObject,
    Assembly,
    StrainRosette,
    Tire,
    Road,
    UserDefinedElement,
    Turbine,
}

impl EntityType {
    pub const ALL: [EntityType; 28] = [
        EntityType::Triad,
        EntityType::Part,
        EntityType::Beam,
        EntityType::BeamProperty,
        EntityType::Joint,
        EntityType::LineMaster,
        EntityType::HigherPair,
        EntityType::JointSpring,
        EntityType::JointDamper,
        EntityType::AxialSpring,
        EntityType::AxialDamper,
        EntityType::SpringChar,
        EntityType::Friction,
        EntityType::Load,
        EntityType::DofLoad,
        EntityType::DofMotion,
        EntityType::Function,
        EntityType::Engine,
        EntityType::Sensor,
        EntityType::ControlElement,
        EntityType::ControlLine,
        EntityType::GenericObject,
        EntityType::Assembly,
        EntityType::StrainRosette,
        EntityType::Tire,
        EntityType::Road,
        EntityType::UserDefinedElement,
        EntityType::Turbine,
    ];

    /// Whether results written by the solver are keyed on this entity's
    /// base id. Such entities are never renumbered silently.
    pub fn is_result_bearing(self) -> bool {
        matches!(
            self,
            EntityType::Triad
                | EntityType::Part
                | EntityType::Beam
                | EntityType::Joint
                | EntityType::JointSpring
                | EntityType::JointDamper
                | EntityType::AxialSpring
                | EntityType::AxialDamper
                | EntityType::Load
                | EntityType::DofLoad
                | EntityType::DofMotion
                | EntityType::Engine
                | EntityType::ControlElement
                | EntityType::StrainRosette
                | EntityType::Tire
                | EntityType::UserDefinedElement
                | EntityType::Turbine
        )
    }

    /// Block keyword in the model file.
    pub fn keyword(self) -> &'static str {
        match self {
            EntityType::Triad => "TRIAD",
            EntityType::Part => "PART",
            EntityType::Beam => "BEAM",
            EntityType::BeamProperty => "BEAM_PROPERTY",
            EntityType::Joint => "JOINT",
            EntityType::LineMaster => "LINE_MASTER",
            EntityType::HigherPair => "HIGHER_PAIR",
            EntityType::JointSpring => "JOINT_SPRING",
            EntityType::JointDamper => "JOINT_DAMPER",
            EntityType::AxialSpring => "AXIAL_SPRING",
            EntityType::AxialDamper => "AXIAL_DAMPER",
            EntityType::SpringChar => "SPRING_CHAR",
            EntityType::Friction => "FRICTION",
            EntityType::Load => "LOAD",
            EntityType::DofLoad => "DOF_LOAD",
            EntityType::DofMotion => "DOF_MOTION",
            EntityType::Function => "FUNCTION",
            EntityType::Engine => "ENGINE",
            EntityType::Sensor => "SENSOR",
            EntityType::ControlElement => "CONTROL_ELEMENT",
            EntityType::ControlLine => "CONTROL_LINE",
            EntityType::GenericObject => "GENERIC_OBJECT",
            EntityType::Assembly => "ASSEMBLY",
            EntityType::StrainRosette => "STRAIN_ROSETTE",
            EntityType::Tire => "TIRE",
            EntityType::Road => "ROAD",
            EntityType::UserDefinedElement => "USER_ELEMENT",
            EntityType::Turbine => "TURBINE",
        }
    }

    pub fn from_keyword(word: &str) -> Option<EntityType> {
        Self::ALL.into_iter().find(|t| t.keyword() == word)
    }

    /// Human-readable type name used in messages.
    pub fn ui_name(self) -> &'static str {
        match self {
            EntityType::Triad => "Triad",
            EntityType::Part => "Part",
            EntityType::Beam => "Beam",
            EntityType::BeamProperty => "Beam property",
            EntityType::Joint => "Joint",
            EntityType::LineMaster => "Line master",
            EntityType::HigherPair => "Higher pair",
            EntityType::JointSpring => "Joint spring",
            EntityType::JointDamper => "Joint damper",
            EntityType::AxialSpring => "Axial spring",
            EntityType::AxialDamper => "Axial damper",
            EntityType::SpringChar => "Spring characteristic",
            EntityType::Friction => "Friction",
            EntityType::Load => "Load",
            EntityType::DofLoad => "DOF load",
            EntityType::DofMotion => "Prescribed motion",
            EntityType::Function => "Function",
            EntityType::Engine => "Function",
            EntityType::Sensor => "Sensor",
            EntityType::ControlElement => "Control element",
            EntityType::ControlLine => "Control line",
            EntityType::GenericObject => "Generic DB-object",
            EntityType::Assembly => "Assembly",
            EntityType::StrainRosette => "Strain rosette",
            EntityType::Tire => "Tire",
            EntityType::Road => "Road",
            EntityType::UserDefinedElement => "User-defined element",
            EntityType::Turbine => "Turbine",
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle and header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Unconnected,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Fields shared by every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub base_id: BaseId,
    pub user_id: UserId,
    pub tag: String,
    pub description: String,
    pub parent_assembly: Option<EntityKey>,
    pub state: LifecycleState,
    /// Per-variable output toggles written as `saveVar`.
    pub save_vars: Vec<bool>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            base_id: BaseId::UNASSIGNED,
            user_id: UserId::default(),
            tag: String::new(),
            description: String::new(),
            parent_assembly: None,
            state: LifecycleState::Unconnected,
            save_vars: Vec::new(),
        }
    }
}

impl Header {
    /// First line of the description, as written to `extDescr`.
    pub fn first_description_line(&self) -> &str {
        self.description.lines().next().unwrap_or("")
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        has_flag(&self.description, flag)
    }

    pub fn int_after(&self, flag: &str) -> i32 {
        int_after(&self.description, flag)
    }

    pub fn double_after(&self, flag: &str) -> f64 {
        double_after(&self.description, flag)
    }
}

// ---------------------------------------------------------------------------
// Description modifiers
// ---------------------------------------------------------------------------

pub fn has_flag(text: &str, flag: &str) -> bool {
    text.contains(flag)
}

fn token_after<'a>(text: &'a str, flag: &str) -> Option<&'a str> {
    let start = text.find(flag)? + flag.len();
    text[start..].split_whitespace().next()
}

/// Integer following `flag`, or 0.
pub fn int_after(text: &str, flag: &str) -> i32 {
    token_after(text, flag)
        .and_then(|t| t.parse().ok())
        .unwrap_or(0)
}

/// Real number following `flag`, or 0.0.
pub fn double_after(text: &str, flag: &str) -> f64 {
    token_after(text, flag)
        .and_then(|t| t.parse().ok())
        .unwrap_or(0.0)
}

/// Up to `max` reals following `flag`, stopping at the first non-number.
pub fn doubles_after(text: &str, flag: &str, max: usize) -> Vec<f64> {
    let Some(pos) = text.find(flag) else {
        return Vec::new();
    };
    text[pos + flag.len()..]
        .split_whitespace()
        .map_while(|t| t.parse::<f64>().ok())
        .take(max)
        .collect()
}

/// Up to `max` integers following `flag`.
pub fn ints_after(text: &str, flag: &str, max: usize) -> Vec<i32> {
    let Some(pos) = text.find(flag) else {
        return Vec::new();
    };
    text[pos + flag.len()..]
        .split_whitespace()
        .map_while(|t| t.parse::<i32>().ok())
        .take(max)
        .collect()
}

// ---------------------------------------------------------------------------
// Reference walking
// ---------------------------------------------------------------------------

/// Outgoing references of a payload.
pub trait References {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey));

    /// Clear every reference to `gone`.
    fn release(&mut self, gone: EntityKey);
}

pub(crate) fn visit_opt(slot: &Option<EntityKey>, f: &mut dyn FnMut(EntityKey)) {
    if let Some(k) = slot {
        f(*k);
    }
}

pub(crate) fn visit_all<'a, I>(slots: I, f: &mut dyn FnMut(EntityKey))
where
    I: IntoIterator<Item = &'a Option<EntityKey>>,
{
    for slot in slots {
        visit_opt(slot, f);
    }
}

pub(crate) fn release_opt(slot: &mut Option<EntityKey>, gone: EntityKey) {
    if *slot == Some(gone) {
        *slot = None;
    }
}

pub(crate) fn release_all<'a, I>(slots: I, gone: EntityKey)
where
    I: IntoIterator<Item = &'a mut Option<EntityKey>>,
{
    for slot in slots {
        release_opt(slot, gone);
    }
}

pub(crate) fn release_vec(keys: &mut Vec<EntityKey>, gone: EntityKey) {
    keys.retain(|k| *k != gone);
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One variant per entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityData {
    Triad(Triad),
    Part(Part),
    Beam(Beam),
    BeamProperty(BeamProperty),
    Joint(Joint),
    LineMaster(LineMaster),
    HigherPair(HigherPair),
    JointSpring(JointSpring),
    JointDamper(JointDamper),
    AxialSpring(AxialSpring),
    AxialDamper(AxialDamper),
    SpringChar(SpringChar),
    Friction(Friction),
    Load(Load),
    DofLoad(DofLoad),
    DofMotion(DofMotion),
    Function(Function),
    Engine(Engine),
    Sensor(Sensor),
    ControlElement(ControlElement),
    ControlLine(ControlLine),
    GenericObject(GenericObject),
    Assembly(Assembly),
    StrainRosette(StrainRosette),
    Tire(Tire),
    Road(Road),
    UserDefinedElement(UserElement),
    Turbine(Turbine),
}

macro_rules! payloads {
    ($($variant:ident => $ty:ty, $as_ref:ident, $as_mut:ident;)*) => {
        impl EntityData {
            pub fn entity_type(&self) -> EntityType {
                match self {
                    $(EntityData::$variant(_) => EntityType::$variant,)*
                }
            }

            $(
                pub fn $as_ref(&self) -> Option<&$ty> {
                    match self {
                        EntityData::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                    match self {
                        EntityData::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            )*
        }

        impl References for EntityData {
            fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
                match self {
                    $(EntityData::$variant(v) => v.for_each_ref(f),)*
                }
            }

            fn release(&mut self, gone: EntityKey) {
                match self {
                    $(EntityData::$variant(v) => v.release(gone),)*
                }
            }
        }

        $(
            impl From<$ty> for EntityData {
                fn from(v: $ty) -> Self {
                    EntityData::$variant(v)
                }
            }
        )*
    };
}

payloads! {
    Triad => Triad, as_triad, as_triad_mut;
    Part => Part, as_part, as_part_mut;
    Beam => Beam, as_beam, as_beam_mut;
    BeamProperty => BeamProperty, as_beam_property, as_beam_property_mut;
    Joint => Joint, as_joint, as_joint_mut;
    LineMaster => LineMaster, as_line_master, as_line_master_mut;
    HigherPair => HigherPair, as_higher_pair, as_higher_pair_mut;
    JointSpring => JointSpring, as_joint_spring, as_joint_spring_mut;
    JointDamper => JointDamper, as_joint_damper, as_joint_damper_mut;
    AxialSpring => AxialSpring, as_axial_spring, as_axial_spring_mut;
    AxialDamper => AxialDamper, as_axial_damper, as_axial_damper_mut;
    SpringChar => SpringChar, as_spring_char, as_spring_char_mut;
    Friction => Friction, as_friction, as_friction_mut;
    Load => Load, as_load, as_load_mut;
    DofLoad => DofLoad, as_dof_load, as_dof_load_mut;
    DofMotion => DofMotion, as_dof_motion, as_dof_motion_mut;
    Function => Function, as_function, as_function_mut;
    Engine => Engine, as_engine, as_engine_mut;
    Sensor => Sensor, as_sensor, as_sensor_mut;
    ControlElement => ControlElement, as_control_element, as_control_element_mut;
    ControlLine => ControlLine, as_control_line, as_control_line_mut;
    GenericObject => GenericObject, as_generic_object, as_generic_object_mut;
    Assembly => Assembly, as_assembly, as_assembly_mut;
    StrainRosette => StrainRosette, as_strain_rosette, as_strain_rosette_mut;
    Tire => Tire, as_tire, as_tire_mut;
    Road => Road, as_road, as_road_mut;
    UserDefinedElement => UserElement, as_user_element, as_user_element_mut;
    Turbine => Turbine, as_turbine, as_turbine_mut;
}

/// An entity in the model arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub header: Header,
    pub data: EntityData,
}

impl Entity {
    pub fn new(data: impl Into<EntityData>) -> Self {
        Self {
            header: Header::default(),
            data: data.into(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.data.entity_type()
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.header.state,
            LifecycleState::Connected | LifecycleState::Disconnecting
        )
    }

    /// `[Type] <user id> "tag"` style identification for messages.
    pub fn id_string(&self) -> String {
        let mut s = format!("{} [{}]", self.entity_type().ui_name(), self.header.user_id.0);
        let descr = self.header.first_description_line();
        if !descr.is_empty() {
            s.push_str(&format!(" \"{descr}\""));
        }
        s
    }

    /// Outgoing references including the parent assembly.
    pub fn references(&self) -> Vec<EntityKey> {
        let mut out = Vec::new();
        if let Some(a) = self.header.parent_assembly {
            out.push(a);
        }
        self.data.for_each_ref(&mut |k| out.push(k));
        out
    }

    pub fn refers_to(&self, key: EntityKey) -> bool {
        let mut found = self.header.parent_assembly == Some(key);
        self.data.for_each_ref(&mut |k| found |= k == key);
        found
    }
}
