//! Sensors: the quantities engines take as arguments.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_opt};
use crate::id::EntityKey;

/// What a sensor argument measures. Declaration order is the numeric
/// code used in composite sensor ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SensorEntity {
    #[default]
    Pos,
    LocalVel,
    GlobalVel,
    LocalAcc,
    GlobalAcc,
    Distance,
    Vel,
    Accel,
    RelPos,
    JsprAng,
    JsprDefl,
    JsprForce,
    JdampAng,
    JdampVel,
    JdampForce,
    Length,
    Defl,
    Force,
    LocalForce,
    GlobalForce,
    Strain,
    Stress,
}

impl SensorEntity {
    pub const ALL: [SensorEntity; 22] = [
        SensorEntity::Pos,
        SensorEntity::LocalVel,
        SensorEntity::GlobalVel,
        SensorEntity::LocalAcc,
        SensorEntity::GlobalAcc,
        SensorEntity::Distance,
        SensorEntity::Vel,
        SensorEntity::Accel,
        SensorEntity::RelPos,
        SensorEntity::JsprAng,
        SensorEntity::JsprDefl,
        SensorEntity::JsprForce,
        SensorEntity::JdampAng,
        SensorEntity::JdampVel,
        SensorEntity::JdampForce,
        SensorEntity::Length,
        SensorEntity::Defl,
        SensorEntity::Force,
        SensorEntity::LocalForce,
        SensorEntity::GlobalForce,
        SensorEntity::Strain,
        SensorEntity::Stress,
    ];

    pub fn code(self) -> i32 {
        Self::ALL.iter().position(|e| *e == self).unwrap_or(0) as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorEntity::Pos => "POS",
            SensorEntity::LocalVel => "LOCAL_VEL",
            SensorEntity::GlobalVel => "GLOBAL_VEL",
            SensorEntity::LocalAcc => "LOCAL_ACC",
            SensorEntity::GlobalAcc => "GLOBAL_ACC",
            SensorEntity::Distance => "DISTANCE",
            SensorEntity::Vel => "VEL",
            SensorEntity::Accel => "ACCEL",
            SensorEntity::RelPos => "REL_POS",
            SensorEntity::JsprAng => "JSPR_ANG",
            SensorEntity::JsprDefl => "JSPR_DEFL",
            SensorEntity::JsprForce => "JSPR_FORCE",
            SensorEntity::JdampAng => "JDAMP_ANG",
            SensorEntity::JdampVel => "JDAMP_VEL",
            SensorEntity::JdampForce => "JDAMP_FORCE",
            SensorEntity::Length => "LENGTH",
            SensorEntity::Defl => "DEFL",
            SensorEntity::Force => "FORCE",
            SensorEntity::LocalForce => "LOCAL_FORCE",
            SensorEntity::GlobalForce => "GLOBAL_FORCE",
            SensorEntity::Strain => "STRAIN",
            SensorEntity::Stress => "STRESS",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == text)
    }
}

/// Decimal concatenation of sensor id, `dof + 1` and `entity + 1`,
/// read from the left. `None` when the result does not fit an `i32`.
pub fn composite_sensor_id(sensor_id: i32, dof: usize, entity: SensorEntity) -> Option<i32> {
    let ent = i64::from(entity.code()) + 1;
    let dof = i64::try_from(dof).ok()?.checked_add(1)?;
    let id = ent
        .checked_add(dof.checked_mul(decimal_scale(ent))?)?
        .checked_add(i64::from(sensor_id).checked_mul(decimal_scale(ent) * decimal_scale(dof))?)?;
    i32::try_from(id).ok()
}

/// Smallest power of ten above `value`.
fn decimal_scale(mut value: i64) -> i64 {
    let mut d = 1;
    while value > 0 {
        value /= 10;
        d *= 10;
    }
    d
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    /// Simulation time (one per model).
    Time,
    /// A quantity of one measured entity.
    Simple { measured: Option<EntityKey> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub kind: SensorKind,
}

impl Sensor {
    pub fn time() -> Self {
        Self {
            kind: SensorKind::Time,
        }
    }

    pub fn measuring(measured: EntityKey) -> Self {
        Self {
            kind: SensorKind::Simple {
                measured: Some(measured),
            },
        }
    }

    pub fn measured(&self) -> Option<EntityKey> {
        match self.kind {
            SensorKind::Simple { measured } => measured,
            SensorKind::Time => None,
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self.kind, SensorKind::Time)
    }
}

impl References for Sensor {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        if let Some(k) = self.measured() {
            f(k);
        }
    }

    fn release(&mut self, gone: EntityKey) {
        if let SensorKind::Simple { measured } = &mut self.kind {
            release_opt(measured, gone);
        }
    }
}
