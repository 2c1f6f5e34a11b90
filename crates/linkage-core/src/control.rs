//! Control-system blocks and the lines wiring them together.

use serde::{Deserialize, Serialize};

use crate::entity::{References, release_opt, visit_opt};
use crate::id::EntityKey;

/// Block kinds. `Input` reads an engine into the control system, `Output`
/// exposes a control variable to sensors; the rest are transfer elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    Input,
    Output,
    FirstOrderTf,
    SecondOrderTf,
    Adder,
    Amplifier,
    CompConjPole,
    Comparator,
    DeadZone,
    Hysteresis,
    Integrator,
    LimDerivator,
    Limitation,
    LogicalSwitch,
    Multiplier,
    PiLimD,
    Pd,
    Pi,
    Pid,
    PLimD,
    PLimI,
    PLimILimD,
    Power,
    RealPole,
    SampleHold,
    TimeDelay,
}

impl ControlKind {
    pub const ALL: [ControlKind; 26] = [
        ControlKind::Input,
        ControlKind::Output,
        ControlKind::FirstOrderTf,
        ControlKind::SecondOrderTf,
        ControlKind::Adder,
        ControlKind::Amplifier,
        ControlKind::CompConjPole,
        ControlKind::Comparator,
        ControlKind::DeadZone,
        ControlKind::Hysteresis,
        ControlKind::Integrator,
        ControlKind::LimDerivator,
        ControlKind::Limitation,
        ControlKind::LogicalSwitch,
        ControlKind::Multiplier,
        ControlKind::PiLimD,
        ControlKind::Pd,
        ControlKind::Pi,
        ControlKind::Pid,
        ControlKind::PLimD,
        ControlKind::PLimI,
        ControlKind::PLimILimD,
        ControlKind::Power,
        ControlKind::RealPole,
        ControlKind::SampleHold,
        ControlKind::TimeDelay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ControlKind::Input => "INPUT",
            ControlKind::Output => "OUTPUT",
            ControlKind::FirstOrderTf => "1ORD_TF",
            ControlKind::SecondOrderTf => "2ORD_TF",
            ControlKind::Adder => "ADDER",
            ControlKind::Amplifier => "AMPLIFIER",
            ControlKind::CompConjPole => "COMP_CONJ_POLE",
            ControlKind::Comparator => "COMPARATOR",
            ControlKind::DeadZone => "DEAD_ZONE",
            ControlKind::Hysteresis => "HYSTERESIS",
            ControlKind::Integrator => "INTEGRATOR",
            ControlKind::LimDerivator => "LIM_DERIVATOR",
            ControlKind::Limitation => "LIMITATION",
            ControlKind::LogicalSwitch => "LOGICAL_SWITCH",
            ControlKind::Multiplier => "MULTIPLIER",
            ControlKind::PiLimD => "PI_LIM_D",
            ControlKind::Pd => "PD",
            ControlKind::Pi => "PI",
            ControlKind::Pid => "PID",
            ControlKind::PLimD => "P_LIM_D",
            ControlKind::PLimI => "P_LIM_I",
            ControlKind::PLimILimD => "P_LIM_I_LIM_D",
            ControlKind::Power => "POWER",
            ControlKind::RealPole => "REAL_POLE",
            ControlKind::SampleHold => "SAMPLE_HOLD",
            ControlKind::TimeDelay => "TIME_DELAY",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == text)
    }

    pub fn is_element(self) -> bool {
        !matches!(self, ControlKind::Input | ControlKind::Output)
    }

    /// Number of input ports.
    pub fn input_ports(self) -> usize {
        match self {
            ControlKind::Input => 0,
            ControlKind::Adder | ControlKind::Comparator | ControlKind::Multiplier => 2,
            _ => 1,
        }
    }

    /// Number of internal state variables.
    pub fn state_count(self) -> usize {
        match self {
            ControlKind::FirstOrderTf | ControlKind::Pd | ControlKind::PLimD | ControlKind::PLimI => 2,
            ControlKind::SecondOrderTf => 4,
            ControlKind::CompConjPole | ControlKind::LimDerivator | ControlKind::Pi => 1,
            ControlKind::PiLimD | ControlKind::Pid | ControlKind::PLimILimD => 3,
            _ => 0,
        }
    }

    /// Number of user parameters.
    pub fn param_count(self) -> usize {
        match self {
            ControlKind::Input | ControlKind::Output => 0,
            ControlKind::Adder | ControlKind::Comparator | ControlKind::Multiplier => 0,
            ControlKind::Amplifier
            | ControlKind::Integrator
            | ControlKind::LimDerivator
            | ControlKind::Power
            | ControlKind::SampleHold
            | ControlKind::TimeDelay => 1,
            ControlKind::DeadZone
            | ControlKind::Limitation
            | ControlKind::Pd
            | ControlKind::Pi
            | ControlKind::RealPole => 2,
            ControlKind::FirstOrderTf
            | ControlKind::CompConjPole
            | ControlKind::Hysteresis
            | ControlKind::LogicalSwitch
            | ControlKind::Pid
            | ControlKind::PLimD
            | ControlKind::PLimI => 3,
            ControlKind::PiLimD => 4,
            ControlKind::SecondOrderTf | ControlKind::PLimILimD => 5,
        }
    }

    /// Solver type code and comment label, transfer elements only.
    pub fn solver_type(self) -> Option<(i32, &'static str)> {
        let entry = match self {
            ControlKind::Input | ControlKind::Output => return None,
            ControlKind::FirstOrderTf => (43, "1st order Tranfer Function"),
            ControlKind::SecondOrderTf => (44, "2nd order Tranfer Function"),
            ControlKind::Adder => (2, "Adder"),
            ControlKind::Amplifier => (3, "Amplifier"),
            ControlKind::CompConjPole => (42, "Compl. conj. pole"),
            ControlKind::Comparator => (1, "Comparator"),
            ControlKind::DeadZone => (23, "Dead Zone"),
            ControlKind::Hysteresis => (24, "Hysteresis"),
            ControlKind::Integrator => (4, "Integrator"),
            ControlKind::LimDerivator => (5, "Lim. derivator"),
            ControlKind::Limitation => (22, "Limitation"),
            ControlKind::LogicalSwitch => (21, "Logical Switch"),
            ControlKind::Multiplier => (6, "Multiplier"),
            ControlKind::PiLimD => (36, "PIlimD"),
            ControlKind::Pd => (33, "PD"),
            ControlKind::Pi => (31, "PI"),
            ControlKind::Pid => (35, "PID"),
            ControlKind::PLimD => (34, "PlimD"),
            ControlKind::PLimI => (32, "PlimI"),
            ControlKind::PLimILimD => (37, "P lim.I lim.D"),
            ControlKind::Power => (7, "Power"),
            ControlKind::RealPole => (41, "Real Pole"),
            ControlKind::SampleHold => (12, "SampleHold"),
            ControlKind::TimeDelay => (11, "Time delay"),
        };
        Some(entry)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlElement {
    pub kind: ControlKind,
    /// Parameters in solver order; missing entries read as zero.
    pub params: Vec<f64>,
    /// Engine feeding an `Input` block.
    pub engine: Option<EntityKey>,
}

impl ControlElement {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            params: vec![0.0; kind.param_count()],
            engine: None,
        }
    }

    pub fn with_params(kind: ControlKind, params: &[f64]) -> Self {
        let mut e = Self::new(kind);
        for (slot, v) in e.params.iter_mut().zip(params) {
            *slot = *v;
        }
        e
    }

    pub fn param(&self, i: usize) -> f64 {
        self.params.get(i).copied().unwrap_or(0.0)
    }
}

impl References for ControlElement {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.engine, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.engine, gone);
    }
}

/// Connection from the output of `start` to input port `port` (1-based)
/// of `end`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlLine {
    pub start: Option<EntityKey>,
    pub end: Option<EntityKey>,
    pub port: usize,
}

impl References for ControlLine {
    fn for_each_ref(&self, f: &mut dyn FnMut(EntityKey)) {
        visit_opt(&self.start, f);
        visit_opt(&self.end, f);
    }

    fn release(&mut self, gone: EntityKey) {
        release_opt(&mut self.start, gone);
        release_opt(&mut self.end, gone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_and_states() {
        assert_eq!(ControlKind::Adder.input_ports(), 2);
        assert_eq!(ControlKind::Pid.input_ports(), 1);
        assert_eq!(ControlKind::Input.input_ports(), 0);
        assert_eq!(ControlKind::SecondOrderTf.state_count(), 4);
        assert_eq!(ControlKind::PLimILimD.state_count(), 3);
        assert_eq!(ControlKind::Amplifier.state_count(), 0);
    }

    #[test]
    fn solver_codes() {
        assert_eq!(ControlKind::FirstOrderTf.solver_type(), Some((43, "1st order Tranfer Function")));
        assert_eq!(ControlKind::Comparator.solver_type().map(|t| t.0), Some(1));
        assert_eq!(ControlKind::Output.solver_type(), None);
    }

    #[test]
    fn names_round_trip() {
        for k in ControlKind::ALL {
            assert_eq!(ControlKind::parse(k.name()), Some(k));
        }
    }

    #[test]
    fn params_are_padded() {
        let e = ControlElement::with_params(ControlKind::Pid, &[2.0]);
        assert_eq!(e.params, vec![2.0, 0.0, 0.0]);
        assert_eq!(e.param(7), 0.0);
    }
}
