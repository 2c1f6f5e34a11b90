//! Structural members: generic parts, beams, user-defined elements,
//! tires and roads, strain rosettes, generic solver objects, assemblies
//! and the wind turbine configuration.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_all, release_opt, release_vec, visit_all, visit_opt};
use crate::geometry::{Mat34, Vec3};
use crate::id::EntityKey;

// ---------------------------------------------------------------------------
// Shared link settings
// ---------------------------------------------------------------------------

/// How the co-rotated reference system of a part or beam is positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowPosition {
    /// Triangle fit through three selected triads with unit offsets.
    #[default]
    TriangleFit,
    MassAverage,
    /// Part fixed to ground through internal nodes.
    Fixed,
}

impl ShadowPosition {
    pub fn code(self) -> i32 {
        match self {
            ShadowPosition::TriangleFit => 1,
            ShadowPosition::MassAverage => 2,
            ShadowPosition::Fixed => -1,
        }
    }
}

/// Three reference triads (as indices into the input) and their offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefPoints {
    pub nodes: [usize; 3],
    pub offsets: [Vec3; 3],
}

/// Pick the co-rotated reference points among `points` (local
/// positions): the one furthest from the centroid, the one furthest from
/// that, and the one furthest from the line through both. Coincident or
/// collinear sets get unit offsets instead.
pub fn reference_points(points: &[Vec3]) -> Option<RefPoints> {
    let first = *points.first()?;
    let min_len = 1.0e-3;
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vec3::ZERO, |acc, p| acc.add(p)).scale(1.0 / n);
    let mut offsets = [Vec3::ZERO; 3];

    let furthest = |from: &dyn Fn(&Vec3) -> f64| {
        let mut best = 0;
        let mut dist = from(&first);
        for (i, p) in points.iter().enumerate().skip(1) {
            let d = from(p);
            if d > dist {
                best = i;
                dist = d;
            }
        }
        (best, dist)
    };

    let (n1, _) = furthest(&|p| p.sub(&centroid).length());
    let p1 = points[n1];
    let (n2, d12) = furthest(&|p| p.sub(&p1).length());
    let mut v12 = points[n2].sub(&p1);
    if d12 < min_len {
        offsets[1] = Vec3::new(1.0, 0.0, 0.0);
        v12.0[0] += 1.0;
    }
    let v12 = v12.normalized();
    let (n3, d3) = furthest(&|p| v12.cross(&p.sub(&p1)).length());
    if d3 < min_len {
        let mut imin = 0;
        if v12[1].abs() < v12[imin].abs() {
            imin = 1;
        }
        if v12[2].abs() < v12[imin].abs() {
            imin = 2;
        }
        offsets[2] = match imin {
            0 => Vec3::new(v12[0], -v12[2], v12[1]),
            1 => Vec3::new(v12[2], v12[1], -v12[0]),
            _ => Vec3::new(-v12[1], v12[0], v12[2]),
        };
    }
    Some(RefPoints {
        nodes: [n1, n2, n3],
        offsets,
    })
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PartStiffness {
    Rigid,
    /// Translational and rotational stiffness at every triad.
    Nodal { kt: f64, kr: f64 },
}

/// A generic part: mass and inertia lumped at the centre of gravity,
/// connected to its triads by a rigid or nodal stiffness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub placement: Mat34,
    /// Centre of gravity relative to `placement`.
    pub cog: Mat34,
    pub mass: f64,
    /// Ixx Iyy Izz Ixy Ixz Iyz in part axes.
    pub inertia: [f64; 6],
    pub stiffness: PartStiffness,
    /// Suppressed parts are left out of the solver file.
    pub suppressed: bool,
    pub shadow: ShadowPosition,
    /// Centripetal mass correction; `None` leaves the solver default.
    pub centrip_correction: Option<bool>,
    /// Condense out the DOFs of the internal centre-of-gravity triad.
    pub condense_cog: bool,
    pub stiff_scale: f64,
    pub mass_scale: f64,
    pub alpha1: f64,
    pub alpha2: f64,
}

impl Default for Part {
    fn default() -> Self {
        Self {
            placement: Mat34::IDENTITY,
            cog: Mat34::IDENTITY,
            mass: 0.0,
            inertia: [0.0; 6],
            stiffness: PartStiffness::Nodal { kt: 1.0e9, kr: 1.0e9 },
            suppressed: false,
            shadow: ShadowPosition::default(),
            centrip_correction: None,
            condense_cog: false,
            stiff_scale: 1.0,
            mass_scale: 1.0,
            alpha1: 0.0,
            alpha2: 0.0,
        }
    }
}

impl Part {
    pub fn at(placement: Mat34) -> Self {
        Self {
            placement,
            ..Self::default()
        }
    }

    /// Global position of the centre of gravity.
    pub fn global_cog(&self) -> Mat34 {
        self.placement.compose(&self.cog)
    }
}

impl References for Part {
    fn for_each_ref(&self, _f: &mut dyn FnMut(EntityKey)) {}

    fn release(&mut self, _gone: EntityKey) {}
}

// ---------------------------------------------------------------------------
// Beams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub placement: Mat34,
    pub triads: [Option<EntityKey>; 2],
    pub property: Option<EntityKey>,
    pub shadow: ShadowPosition,
    pub stiff_scale: f64,
    pub mass_scale: f64,
    pub alpha1: f64,
    pub alpha2: f64,
}

impl Default for Beam {
    fn default() -> Self {
        Self {
            placement: Mat34::IDENTITY,
            triads: [None; 2],
            property: None,
            shadow: ShadowPosition::default(),
            stiff_scale: 1.0,
            mass_scale: 1.0,
            alpha1: 0.0,
            alpha2: 0.0,
        }
    }
}

impl References for Beam {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        for t in &self.triads {
            visit_opt(t, f);
        }
        visit_opt(&self.property, f);
    }

    fn release(&mut self, gone: EntityKey) {
        for t in &mut self.triads {
            release_opt(t, gone);
        }
        release_opt(&mut self.property, gone);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub rho: f64,
    pub e: f64,
    pub g: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrossSection {
    /// Stiffness given directly: EA, EIy, EIz, GIt, GAsy, GAsz, mass per
    /// length and polar mass inertia.
    Generic {
        ea: f64,
        ei: [f64; 2],
        git: f64,
        gas: [f64; 2],
        mass: f64,
        ro_ip: f64,
    },
    /// Geometric pipe section with a material.
    Pipe {
        area: f64,
        iy: f64,
        iz: f64,
        ip: f64,
        shear_reduction: [f64; 2],
        material: Option<Material>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamProperty {
    pub section: CrossSection,
    pub shear_centre: [f64; 2],
}

impl BeamProperty {
    pub fn pipe(area: f64, iy: f64, iz: f64, material: Option<Material>) -> Self {
        Self {
            section: CrossSection::Pipe {
                area,
                iy,
                iz,
                ip: iy + iz,
                shear_reduction: [0.0; 2],
                material,
            },
            shear_centre: [0.0; 2],
        }
    }
}

impl References for BeamProperty {
    fn for_each_ref(&self, _f: &mut dyn FnMut(EntityKey)) {}

    fn release(&mut self, _gone: EntityKey) {}
}

// ---------------------------------------------------------------------------
// User-defined elements
// ---------------------------------------------------------------------------

/// Element evaluated by a plugin library through its type id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserElement {
    pub type_id: i32,
    pub name: String,
    pub triads: Vec<EntityKey>,
    pub stiff_scale: f64,
    pub mass_scale: f64,
    pub alpha1: f64,
    pub alpha2: f64,
}

impl UserElement {
    pub fn new(type_id: i32, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: name.into(),
            triads: Vec::new(),
            stiff_scale: 1.0,
            mass_scale: 1.0,
            alpha1: 0.0,
            alpha2: 0.0,
        }
    }
}

impl References for UserElement {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        for t in &self.triads {
            f(*t);
        }
    }

    fn release(&mut self, gone: EntityKey) {
        release_vec(&mut self.triads, gone);
    }
}

// ---------------------------------------------------------------------------
// Tires and roads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tire {
    pub road: Option<EntityKey>,
    /// Revolute joint carrying the wheel.
    pub joint: Option<EntityKey>,
    pub tire_type: String,
    pub api: String,
    pub data_file: String,
    pub spindle_offset: f64,
    pub vertical_stiffness: f64,
    pub vertical_damping: f64,
}

impl Default for Tire {
    fn default() -> Self {
        Self {
            road: None,
            joint: None,
            tire_type: "MF-TYRE".into(),
            api: "STI".into(),
            data_file: String::new(),
            spindle_offset: 0.0,
            vertical_stiffness: 0.0,
            vertical_damping: 0.0,
        }
    }
}

impl References for Tire {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.road, f);
        visit_opt(&self.joint, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.road, gone);
        release_opt(&mut self.joint, gone);
    }
}

/// Road surface, either from a data file or a profile function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Road {
    pub data_file: Option<String>,
    pub function: Option<EntityKey>,
    pub x_offset: f64,
    pub z_shift: f64,
    /// Rotation about Z in degrees.
    pub z_rotation: f64,
}

impl References for Road {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.function, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.function, gone);
    }
}

// ---------------------------------------------------------------------------
// Strain rosettes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RosetteType {
    #[default]
    SingleGage,
    DoubleGage90,
    TripleGage60,
    TripleGage45,
}

impl RosetteType {
    pub fn as_str(self) -> &'static str {
        match self {
            RosetteType::SingleGage => "SINGLE_GAGE",
            RosetteType::DoubleGage90 => "DOUBLE_GAGE_90",
            RosetteType::TripleGage60 => "TRIPLE_GAGE_60",
            RosetteType::TripleGage45 => "TRIPLE_GAGE_45",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        [
            RosetteType::SingleGage,
            RosetteType::DoubleGage90,
            RosetteType::TripleGage60,
            RosetteType::TripleGage45,
        ]
        .into_iter()
        .find(|t| t.as_str() == text)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrainRosette {
    pub part: Option<EntityKey>,
    pub rosette_type: RosetteType,
    /// Remove the strains present at the start of the simulation.
    pub zero_init: bool,
    /// FE node numbers (3 or 4).
    pub nodes: Vec<i32>,
    /// Gage orientation relative to the part.
    pub placement: Mat34,
    pub z_pos: f64,
    pub e_mod: f64,
    pub nu: f64,
}

impl References for StrainRosette {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.part, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.part, gone);
    }
}

// ---------------------------------------------------------------------------
// Generic objects and assemblies
// ---------------------------------------------------------------------------

/// A solver record written verbatim: `&<object_type>` followed by
/// `definition`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenericObject {
    pub object_type: String,
    pub definition: String,
}

impl References for GenericObject {
    fn for_each_ref(&self, _f: &mut dyn FnMut(EntityKey)) {}

    fn release(&mut self, _gone: EntityKey) {}
}

/// Grouping of entities; members point at it through their header.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assembly {
    pub name: String,
}

impl References for Assembly {
    fn for_each_ref(&self, _f: &mut dyn FnMut(EntityKey)) {}

    fn release(&mut self, _gone: EntityKey) {}
}

// ---------------------------------------------------------------------------
// Wind turbine
// ---------------------------------------------------------------------------

/// Roles in [`Turbine::topology`].
pub const TOWER_TRIAD: usize = 0;
pub const NACELLE_TRIAD: usize = 1;
pub const HUB_TRIAD: usize = 2;
/// Hub apex; blade radii are measured from here.
pub const HUB: usize = 3;
pub const GENERATOR_JOINT: usize = 4;

/// Aerodynamic configuration of a wind turbine. A model holds at most one;
/// its base id keys the rotor results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turbine {
    /// Platform reference height.
    pub platform_ref: f64,
    pub hub_diameter: f64,
    pub n_blades: usize,
    pub topology: [Option<EntityKey>; 5],
    /// Revolute joints at the blade roots, in blade order.
    pub pitch_joints: Vec<EntityKey>,
    /// Aerodynamic centre of each blade segment.
    pub aero_centres: Vec<[f64; 2]>,
    /// Aerodynamic loads are computed only with wind.
    pub wind: bool,
}

impl Default for Turbine {
    fn default() -> Self {
        Self {
            platform_ref: 0.0,
            hub_diameter: 0.0,
            n_blades: 3,
            topology: [None; 5],
            pitch_joints: Vec::new(),
            aero_centres: Vec::new(),
            wind: false,
        }
    }
}

impl Turbine {
    pub fn hub_radius(&self) -> f64 {
        0.5 * self.hub_diameter
    }

    /// No topology at all: nothing to configure.
    pub fn is_empty(&self) -> bool {
        self.topology.iter().all(Option::is_none)
    }
}

impl References for Turbine {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_all(&self.topology, f);
        for j in &self.pitch_joints {
            f(*j);
        }
    }

    fn release(&mut self, gone: EntityKey) {
        release_all(&mut self.topology, gone);
        release_vec(&mut self.pitch_joints, gone);
    }
}
