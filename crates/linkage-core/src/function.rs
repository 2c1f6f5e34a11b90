//! Math functions and the engines binding them to sensor arguments.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_opt, visit_opt};
use crate::id::EntityKey;
use crate::sensor::SensorEntity;

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionKind {
    Constant {
        value: f64,
    },
    Scale {
        factor: f64,
    },
    Ramp {
        amplitude_displacement: f64,
        slope: f64,
        delay: f64,
    },
    Sinusoidal {
        frequency: f64,
        delay: f64,
        amplitude: f64,
        amplitude_displacement: f64,
        max_time: f64,
    },
    /// Piecewise linear through `(x, y)` pairs stored flat.
    LinVar {
        values: Vec<f64>,
    },
    Spline {
        values: Vec<f64>,
    },
    /// Time history read from an external file.
    Device {
        file_name: String,
        channel: i32,
        shift: f64,
        scale: f64,
        zero_adjust: bool,
    },
    /// Value supplied by an external process at run time.
    External {
        channel: i32,
        shift: f64,
        scale: f64,
    },
    /// Evaluated by a plugin library.
    UserDefined {
        function_id: i32,
        parameters: Vec<f64>,
    },
}

impl FunctionKind {
    /// Type name written to the solver file.
    pub fn fsi_name(&self) -> &'static str {
        match self {
            FunctionKind::Constant { .. } => "CONSTANT",
            FunctionKind::Scale { .. } => "SCALE",
            FunctionKind::Ramp { .. } => "RAMP",
            FunctionKind::Sinusoidal { .. } => "SINUSOIDAL",
            FunctionKind::LinVar { .. } => "LIN_VAR",
            FunctionKind::Spline { .. } => "SPLINE",
            FunctionKind::Device { .. } => "DEVICE_FUNCTION",
            FunctionKind::External { .. } => "EXTERNAL_FUNCTION",
            FunctionKind::UserDefined { .. } => "USER_DEFINED",
        }
    }

    pub fn is_multi_var(&self) -> bool {
        matches!(self, FunctionKind::LinVar { .. } | FunctionKind::Spline { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub kind: FunctionKind,
    /// Extrapolation beyond the data range, multi-variable kinds only.
    pub extrapolation: i32,
}

impl Function {
    pub fn new(kind: FunctionKind) -> Self {
        Self {
            kind,
            extrapolation: 0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(FunctionKind::Constant { value })
    }

    pub fn extrapolation_type(&self) -> i32 {
        if self.kind.is_multi_var() {
            self.extrapolation
        } else {
            0
        }
    }
}

impl References for Function {
    fn for_each_ref(&self, _f: &mut dyn FnMut(EntityKey)) {}

    fn release(&mut self, _gone: EntityKey) {}
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// One function argument: which sensor, and what it measures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineArg {
    pub sensor: Option<EntityKey>,
    pub dof: usize,
    pub entity: SensorEntity,
}

impl EngineArg {
    pub fn new(sensor: EntityKey, dof: usize, entity: SensorEntity) -> Self {
        Self {
            sensor: Some(sensor),
            dof,
            entity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Engine {
    pub function: Option<EntityKey>,
    pub args: Vec<EngineArg>,
    /// Always evaluated, with its value exported under the entity tag.
    pub output: bool,
}

impl Engine {
    pub fn with_function(function: EntityKey) -> Self {
        Self {
            function: Some(function),
            ..Self::default()
        }
    }

    pub fn uses_sensor(&self, sensor: EntityKey) -> bool {
        self.args.iter().any(|a| a.sensor == Some(sensor))
    }
}

impl References for Engine {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.function, f);
        for arg in &self.args {
            visit_opt(&arg.sensor, f);
        }
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.function, gone);
        for arg in &mut self.args {
            release_opt(&mut arg.sensor, gone);
        }
    }
}
