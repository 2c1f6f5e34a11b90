//! Serde data file structs for mechanism descriptions.
//!
//! These structs define the on-disk format of `model.{ron,toml,json}`:
//! triads, parts, joints, springs, functions, engines, loads and motions,
//! each with a unique name. Cross-references are by name and are resolved
//! into entity keys by the builder. Every struct is flat with defaults so
//! the same file reads the same way in all three formats.

use std::collections::BTreeMap;

use serde::Deserialize;

// ===========================================================================
// Model file
// ===========================================================================

/// Top-level content of a model description file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelData {
    pub parts: Vec<PartData>,
    pub triads: Vec<TriadData>,
    pub joints: Vec<JointData>,
    pub springs: Vec<SpringData>,
    pub dampers: Vec<DamperData>,
    pub functions: Vec<FunctionData>,
    pub engines: Vec<EngineData>,
    pub loads: Vec<LoadData>,
    pub motions: Vec<MotionData>,
}

// ===========================================================================
// Structure
// ===========================================================================

/// A generic part; its triads name it in their `parts` list.
#[derive(Debug, Clone, Deserialize)]
pub struct PartData {
    pub name: String,
    #[serde(default)]
    pub mass: f64,
    /// Ixx Iyy Izz.
    #[serde(default)]
    pub inertia: [f64; 3],
    #[serde(default)]
    pub suppressed: bool,
}

/// A triad. `dofs` maps DOF names (`TX` .. `RZ`) to status words
/// (`FIXED`, `PRESCRIBED`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct TriadData {
    pub name: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default)]
    pub dofs: BTreeMap<String, String>,
    #[serde(default)]
    pub add_mass: f64,
}

/// Joint kinds as written in description files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    Rigid,
    Revolute,
    Ball,
    Free,
    Prismatic,
    Cylindric,
    Cam,
}

/// A joint. Point joints name a `master` triad, line joints list the
/// master triads of their line in `line`.
#[derive(Debug, Clone, Deserialize)]
pub struct JointData {
    pub name: String,
    pub kind: JointKind,
    pub slave: String,
    #[serde(default)]
    pub master: Option<String>,
    #[serde(default)]
    pub line: Vec<String>,
    /// Makes the Z translation of a revolute joint a DOF.
    #[serde(default)]
    pub tz_dof: bool,
    #[serde(default)]
    pub dofs: BTreeMap<String, String>,
    /// Initial joint variables by DOF name.
    #[serde(default)]
    pub variables: BTreeMap<String, f64>,
}

/// Axial spring between two triads.
#[derive(Debug, Clone, Deserialize)]
pub struct SpringData {
    pub name: String,
    pub triads: [String; 2],
    #[serde(default)]
    pub stiffness: f64,
    #[serde(default)]
    pub length: f64,
    /// Stiffness function, replacing the constant.
    #[serde(default)]
    pub function: Option<String>,
}

/// Axial damper between two triads.
#[derive(Debug, Clone, Deserialize)]
pub struct DamperData {
    pub name: String,
    pub triads: [String; 2],
    #[serde(default)]
    pub coefficient: f64,
    #[serde(default)]
    pub function: Option<String>,
}

// ===========================================================================
// Functions and engines
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionType {
    Constant,
    Ramp,
    Sinusoidal,
    LinVar,
    Spline,
}

/// A function. Only the fields of its type are read.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionData {
    pub name: String,
    #[serde(rename = "type")]
    pub function_type: FunctionType,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub slope: f64,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub amplitude: f64,
    /// `(x, y)` points of tabulated functions.
    #[serde(default)]
    pub points: Vec<(f64, f64)>,
}

/// One engine argument. `measure` names a triad, joint, spring, damper or
/// engine, or is `time`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgData {
    pub measure: String,
    #[serde(default = "default_dof")]
    pub dof: String,
    #[serde(default = "default_entity")]
    pub entity: String,
}

fn default_dof() -> String {
    "TX".into()
}

fn default_entity() -> String {
    "POS".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineData {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<ArgData>,
    #[serde(default)]
    pub output: bool,
}

// ===========================================================================
// Loads and motions
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    #[default]
    Force,
    Moment,
}

/// Force or moment at a triad, acting along `direction`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadData {
    pub name: String,
    pub triad: String,
    #[serde(default, rename = "type")]
    pub load_type: LoadType,
    pub magnitude: f64,
    pub direction: [f64; 3],
    #[serde(default)]
    pub engine: Option<String>,
}

/// Prescribed motion on one DOF of a triad or joint. The DOF is made
/// PRESCRIBED.
#[derive(Debug, Clone, Deserialize)]
pub struct MotionData {
    pub owner: String,
    pub dof: String,
    #[serde(default = "default_motion_type")]
    pub motion_type: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub engine: Option<String>,
}

fn default_motion_type() -> String {
    "deflection".into()
}
