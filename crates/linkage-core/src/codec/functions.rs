//! Sensors, engines and the parameter objects they use: functions and
//! friction sets.

use std::collections::BTreeSet;

use super::control::output_variable;
use super::format::{clip128, e14};
use super::writer::SolverWriter;
use crate::control::ControlKind;
use crate::entity::{EntityData, EntityType};
use crate::function::{Engine, EngineArg, FunctionKind};
use crate::id::EntityKey;
use crate::model::Model;
use crate::sensor::{SensorEntity, composite_sensor_id};

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// One `SENSOR` record per distinct measured quantity. Engines share
/// sensor entities, so records are keyed on the composite id of each
/// argument and written the first time it is seen.
pub(super) fn write_sensors(w: &mut SolverWriter<'_>) {
    let model = w.model;
    let mut written = BTreeSet::new();
    let mut failed = 0;

    for ekey in model.keys_of_type(EntityType::Engine) {
        if !model.is_engine_active(ekey) {
            continue;
        }
        let Some(engine) = model.engine(ekey) else {
            continue;
        };
        let before = failed;
        for arg in &engine.args {
            let Some(sensor) = arg.sensor else {
                continue;
            };
            let Some(id) = composite_sensor_id(model.base_id(sensor).0, arg.dof, arg.entity) else {
                w.error(Some(sensor), sensor_id_overflow(model, sensor));
                failed += 1;
                continue;
            };
            if id <= 0 || !written.insert(id) {
                continue;
            }
            w.begin("SENSOR");
            put!(w, "  id = {id}\n");
            w.print_id_no_base(sensor);
            if let Err(message) = sensor_data(w, ekey, sensor, arg) {
                w.error(Some(sensor), message);
                failed += 1;
            }
            w.put("/\n\n");
        }
        if failed > before {
            w.error(Some(ekey), format!("{} is inconsistent", model.id_string(ekey)));
        }
    }

    if failed > 0 {
        tracing::error!("A total of {failed} Sensor error(s) were detected.");
    }
}

fn sensor_data(
    w: &mut SolverWriter<'_>,
    engine: EntityKey,
    sensor: EntityKey,
    arg: &EngineArg,
) -> Result<(), String> {
    let model = w.model;
    let Some(s) = model.sensor(sensor) else {
        return Err(format!("{} is not a sensor", model.id_string(sensor)));
    };
    if s.is_time() {
        if w.description(engine).contains("#NumIt") {
            w.put("  type = 'NUM_ITERATIONS'\n");
        } else {
            w.put("  type = 'TIME'\n");
        }
        return Ok(());
    }

    let Some(measured) = s.measured() else {
        return Err(format!("{} has no measured object", model.id_string(sensor)));
    };
    let Some(entity) = model.get(measured) else {
        return Err(format!("{} has no measured object", model.id_string(sensor)));
    };
    let base = model.base_id(measured).0;
    let invalid = || {
        format!(
            "Invalid entity {} for {}",
            arg.entity.as_str(),
            model.id_string(sensor)
        )
    };

    match &entity.data {
        EntityData::Engine(_) => {
            put!(w, "  type = 'ENGINE'\n  engineId = {base}\n");
        }
        EntityData::ControlElement(c) if c.kind == ControlKind::Output => {
            let var = output_variable(model, measured).unwrap_or(0);
            put!(w, "  type = 'CONTROL'\n  ctrlVarId = {var}\n");
        }
        EntityData::Triad(_) => {
            let mut dof = arg.dof + 1;
            if arg.entity == SensorEntity::Pos
                && (4..=6).contains(&dof)
                && w.description(sensor).contains("#Rodrig")
            {
                dof += 3;
            }
            let (what, system) = match arg.entity {
                SensorEntity::Pos => ("POS", "GLOBAL"),
                SensorEntity::GlobalVel => ("VEL", "GLOBAL"),
                SensorEntity::GlobalAcc => ("ACC", "GLOBAL"),
                SensorEntity::LocalVel => ("VEL", "LOCAL"),
                SensorEntity::LocalAcc => ("ACC", "LOCAL"),
                SensorEntity::LocalForce => ("FORCE", "LOCAL"),
                SensorEntity::GlobalForce => ("FORCE", "GLOBAL"),
                _ => return Err(invalid()),
            };
            put!(
                w,
                "  type = 'TRIAD'\n  triad1Id  = {base}\n  dof       = {dof}\n\
                 \x20 dofEntity = '{what}'\n  dofSystem = '{system}'\n"
            );
        }
        EntityData::AxialDamper(_) => {
            let what = match arg.entity {
                SensorEntity::Length => "LENGTH",
                SensorEntity::Vel => "VEL",
                SensorEntity::Force => "FORCE",
                _ => return Err(invalid()),
            };
            put!(w, "  type = 'DAMPER_AXIAL'\n  damperId  = {base}\n  dofEntity = '{what}'\n");
        }
        EntityData::AxialSpring(_) => {
            let what = match arg.entity {
                SensorEntity::Length => "LENGTH",
                SensorEntity::Defl => "DEFL",
                SensorEntity::Force => "FORCE",
                _ => return Err(invalid()),
            };
            put!(w, "  type = 'SPRING_AXIAL'\n  springId  = {base}\n  dofEntity = '{what}'\n");
        }
        EntityData::Joint(joint) => match arg.entity {
            SensorEntity::RelPos | SensorEntity::Vel | SensorEntity::Accel | SensorEntity::Force => {
                let what = match arg.entity {
                    SensorEntity::RelPos => "REL_POS",
                    SensorEntity::Vel => "VEL",
                    SensorEntity::Accel => "ACC",
                    _ => "FORCE",
                };
                put!(
                    w,
                    "  type = 'JOINT_VARIABLE'\n  jointId   = {base}\n  dof       = {}\n\
                     \x20 dofEntity = '{what}'\n",
                    arg.dof + 1
                );
            }
            SensorEntity::JsprAng | SensorEntity::JsprDefl | SensorEntity::JsprForce => {
                let what = match arg.entity {
                    SensorEntity::JsprAng => "LENGTH",
                    SensorEntity::JsprDefl => "DEFL",
                    _ => "FORCE",
                };
                let spring = model.id_of(joint.spring_at(arg.dof));
                put!(w, "  type = 'SPRING_JOINT'\n  springId  = {spring}\n  dofEntity = '{what}'\n");
            }
            SensorEntity::JdampAng | SensorEntity::JdampVel | SensorEntity::JdampForce => {
                let what = match arg.entity {
                    SensorEntity::JdampAng => "LENGTH",
                    SensorEntity::JdampVel => "VEL",
                    _ => "FORCE",
                };
                let damper = model.id_of(joint.damper_at(arg.dof));
                put!(w, "  type = 'DAMPER_JOINT'\n  damperId  = {damper}\n  dofEntity = '{what}'\n");
            }
            _ => return Err(invalid()),
        },
        EntityData::StrainRosette(_) => {
            let what = match arg.entity {
                SensorEntity::Strain => "STRAIN",
                SensorEntity::Stress => "STRESS",
                _ => return Err(invalid()),
            };
            put!(
                w,
                "  type = 'STRAIN_GAGE'\n  engineId  = {base}\n  dof       = {}\n  dofEntity = '{what}'\n",
                arg.dof + 1
            );
        }
        _ => {
            return Err(format!(
                "Invalid object type ({}) for {}",
                model.id_string(measured),
                model.id_string(sensor)
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

pub(super) fn write_engines(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::Engine) {
        if !model.is_engine_active(key) {
            continue;
        }
        let Some(engine) = model.engine(key) else {
            continue;
        };
        w.begin("ENGINE");
        w.print_id(key);
        let tag = model.header(key).map_or("", |h| h.tag.as_str());
        if (engine.output || is_external(w, engine)) && !tag.is_empty() {
            put!(w, "  tag = '{}'\n", clip128(tag));
        }
        if let Some(function) = engine.function {
            put!(w, "  functionId = {}\n", model.base_id(function).0);
        }
        if !engine.args.is_empty() {
            put!(w, "  nArg = {}, argSensorId =", engine.args.len());
            for arg in &engine.args {
                let id = match arg.sensor {
                    Some(s) => composite_sensor_id(model.base_id(s).0, arg.dof, arg.entity).unwrap_or_else(|| {
                        w.error(Some(key), sensor_id_overflow(model, s));
                        0
                    }),
                    None => 0,
                };
                put!(w, " {id}");
            }
            w.put("\n");
        }
        w.put("/\n\n");
    }
}

fn sensor_id_overflow(model: &Model, sensor: EntityKey) -> String {
    format!(
        "The solver sensor id of {} is out of range (base id {})",
        model.id_string(sensor),
        model.base_id(sensor).0
    )
}

fn is_external(w: &SolverWriter<'_>, engine: &Engine) -> bool {
    engine
        .function
        .and_then(|f| w.model.function(f))
        .is_some_and(|f| matches!(f.kind, FunctionKind::External { .. }))
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

pub(super) fn write_functions(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::Function) {
        let Some(function) = model.function(key) else {
            continue;
        };
        w.begin("FUNCTION");
        w.print_id(key);
        put!(w, "  type = '{}'\n", function.kind.fsi_name());
        let extrapolation = function.extrapolation_type();
        if extrapolation != 0 {
            put!(w, "  extrapolationType = {extrapolation}\n");
        }

        match &function.kind {
            FunctionKind::Constant { value } => {
                put!(w, "  realDataSize = 1\n  realData = {}\n", e14(*value));
            }
            FunctionKind::Scale { factor } => {
                put!(w, "  realDataSize = 1\n  realData = {}\n", e14(*factor));
            }
            FunctionKind::Ramp {
                amplitude_displacement,
                slope,
                delay,
            } => {
                put!(
                    w,
                    "  realDataSize = 3\n  realData= {} {} {}\n",
                    e14(*amplitude_displacement),
                    e14(*slope),
                    e14(*delay)
                );
            }
            FunctionKind::Sinusoidal {
                frequency,
                delay,
                amplitude,
                amplitude_displacement,
                max_time,
            } => {
                put!(
                    w,
                    "  realDataSize = 5\n  realData = {} {} {} {}\n             {}\n",
                    e14(*frequency),
                    e14(*delay),
                    e14(*amplitude),
                    e14(*amplitude_displacement),
                    e14(*max_time)
                );
            }
            FunctionKind::LinVar { values } | FunctionKind::Spline { values } => {
                real_data_rows(w, values);
            }
            FunctionKind::Device {
                file_name,
                channel,
                shift,
                scale,
                zero_adjust,
            } => {
                put!(w, "  fileName = '{}'\n", w.options.correct_path(file_name));
                if *channel > 0 {
                    put!(w, "  channel = {channel}\n");
                }
                put!(
                    w,
                    "  realDataSize = 3\n  realData = {} {} {}\n",
                    e14(*shift),
                    e14(*scale),
                    e14(if *zero_adjust { 1.0 } else { 0.0 })
                );
            }
            FunctionKind::External {
                channel,
                shift,
                scale,
            } => {
                put!(
                    w,
                    "  channel = {channel}\n  realDataSize = 2\n  realData = {} {}\n",
                    e14(*shift),
                    e14(*scale)
                );
            }
            FunctionKind::UserDefined {
                function_id,
                parameters,
            } => {
                put!(w, "  channel = {function_id}\n");
                real_data_rows(w, parameters);
            }
        }
        w.put("/\n\n");
    }
}

/// `realDataSize` and `realData`, six values per row.
fn real_data_rows(w: &mut SolverWriter<'_>, values: &[f64]) {
    put!(w, "  realDataSize = {}\n  realData =", values.len());
    for (k, v) in values.iter().enumerate() {
        if k > 0 && k % 6 == 0 {
            put!(w, "\n             {}", e14(*v));
        } else {
            put!(w, " {}", e14(*v));
        }
    }
    w.put("\n");
}

// ---------------------------------------------------------------------------
// Frictions
// ---------------------------------------------------------------------------

pub(super) fn write_frictions(w: &mut SolverWriter<'_>) {
    let model = w.model;
    for key in model.keys_of_type(EntityType::Friction) {
        let Some(friction) = model.friction(key) else {
            continue;
        };
        w.begin("FRICTION_SET");
        w.print_id(key);
        put!(w, "  type = '{}'\n", friction.kind.fsi_name());
        let params = friction.kind.type_dep_params();
        if !params.is_empty() {
            w.put("  typeDepParams =");
            for p in params {
                put!(w, " {}", e14(p));
            }
            w.put("\n");
        }
        put!(w, "  PrestressLoad = {}\n", e14(friction.prestress_load));
        put!(w, "  CoulombCoeff  = {}\n", e14(friction.coulomb_coeff));
        put!(w, "  StribeckMagn  = {}\n", e14(friction.stribeck_magn));
        put!(w, "  StribeckSpeed = {}\n", e14(friction.stribeck_speed));
        if friction.stick_stiffness > 0.0 {
            put!(w, "  StickStiffness = {}\n", e14(friction.stick_stiffness));
        }
        w.put("/\n\n");
    }
}
