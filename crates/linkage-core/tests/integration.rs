//! Integration tests for the linkage model.
//!
//! These tests exercise end-to-end behavior across the crate: building a
//! mechanism, validating and writing the solver input file, saving and
//! reloading the model file, and picking up solver output on disk.

use std::path::PathBuf;

use linkage_core::codec::{CodecError, emit, emit_to_string};
use linkage_core::config::EmitOptions;
use linkage_core::dof::{DofStatus, Z_ROT};
use linkage_core::entity::EntityType;
use linkage_core::model::{DofChild, Model};
use linkage_core::results::ResultTask;
use linkage_core::serialize::{load_model_file, load_model_str, save_model_file, write_model_string};
use linkage_core::test_utils::*;
use linkage_core::validation::CheckArea;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("linkage-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Pendulum driven by a chain of three engines, plus a slider.
fn driven_mechanism() -> Model {
    let mut m = Model::default();
    m.settings.model_file = "driven.fmm".into();
    let p = pendulum(&mut m);
    slider(&mut m, 3);
    let engines = engine_chain(&mut m, 3);

    m.set_joint_status(p.joint, Z_ROT, DofStatus::Prescribed);
    let motion = m.joint_child(p.joint, DofChild::Motion, Z_ROT, false).unwrap();
    m.dof_motion_mut(motion).unwrap().engine = engines.last().copied();
    m
}

// ===========================================================================
// Test 1: Solver input for a driven mechanism
// ===========================================================================

#[test]
fn driven_mechanism_writes_every_record() {
    let mut m = driven_mechanism();
    let text = emit_to_string(&mut m, &EmitOptions::default()).unwrap();

    assert!(text.starts_with("&HEADING\n  modelFile = 'driven.fmm'\n"));
    // Revolute and prismatic joints share the record type.
    assert_eq!(text.matches("&MASTERSLAVEJOINT\n").count(), 2);
    assert_eq!(text.matches("&MOTION\n").count(), 1);
    // Every engine in the chain feeds the motion, so all are written.
    assert_eq!(text.matches("&ENGINE\n").count(), 3);
    assert_eq!(text.matches("&FUNCTION\n").count(), 3);
    assert!(text.contains("type = 'TIME'"));
    assert_eq!(text.matches("type = 'ENGINE'").count(), 2);

    // Sensors come before the engines that read them.
    let sensors = text.find("&SENSOR\n").unwrap();
    let engines = text.find("&ENGINE\n").unwrap();
    assert!(sensors < engines);
}

// ===========================================================================
// Test 2: Validation gates the writer
// ===========================================================================

#[test]
fn invalid_model_leaves_no_file() {
    let dir = temp_dir("invalid");
    let path = dir.join("model.fsi");
    let mut m = driven_mechanism();
    triad_at(&mut m, 9.0, 9.0, 9.0);

    match emit(&mut m, &EmitOptions::default(), &path) {
        Err(CodecError::Validation(report)) => {
            assert_eq!(report.count(CheckArea::Triads), 1);
            assert_eq!(report.total(), 1);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(!path.exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn engine_cycle_blocks_emission() {
    let mut m = Model::default();
    let engines = engine_chain(&mut m, 2);
    let back = m.sensor_for(engines[1]);
    m.engine_mut(engines[0]).unwrap().args[0].sensor = Some(back);

    let err = emit_to_string(&mut m, &EmitOptions::default()).unwrap_err();
    match err {
        CodecError::Validation(report) => assert_eq!(report.count(CheckArea::Engines), 2),
        other => panic!("unexpected {other}"),
    }
}

// ===========================================================================
// Test 3: Model file round trip
// ===========================================================================

#[test]
fn reloaded_model_writes_the_same_solver_input() {
    let mut original = driven_mechanism();
    let saved = write_model_string(&original);
    let (mut loaded, summary) = load_model_str(&saved).unwrap();

    assert!(summary.unresolved.is_empty());
    assert!(summary.reassigned.is_empty());
    assert_eq!(loaded.len(), original.len());
    assert_eq!(write_model_string(&loaded), saved);

    let options = EmitOptions::default();
    let a = emit_to_string(&mut original, &options).unwrap();
    let b = emit_to_string(&mut loaded, &options).unwrap();
    assert_eq!(a, b);
}

#[test]
fn saved_file_reloads_from_disk() {
    let dir = temp_dir("save");
    let path = dir.join("driven.fmm");
    let m = driven_mechanism();
    let bytes = save_model_file(&m, &path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, bytes);

    let (loaded, _) = load_model_file(&path).unwrap();
    assert_eq!(loaded.keys_of_type(EntityType::Engine).len(), 3);
    assert_eq!(loaded.keys_of_type(EntityType::DofMotion).len(), 1);
    assert_eq!(loaded.settings.model_file, "driven.fmm");
    std::fs::remove_dir_all(&dir).unwrap();
}

// ===========================================================================
// Test 4: Result files on disk
// ===========================================================================

#[test]
fn run_directory_becomes_task_tree() {
    let root = temp_dir("results");
    let task_dir = root.join("response_0001");
    let sub_dir = task_dir.join("timehist_prim_0001");
    std::fs::create_dir_all(&sub_dir).unwrap();

    let mut m = driven_mechanism();
    emit(&mut m, &EmitOptions::default(), task_dir.join("driven.fsi")).unwrap();
    std::fs::write(sub_dir.join("th_p_1.frs"), b"").unwrap();
    std::fs::write(task_dir.join("notes.txt"), b"").unwrap();

    let mut task = ResultTask::default();
    let count = task.sync_from_disk(&task_dir, "response", 1, None);
    assert_eq!(count, 2);
    assert_eq!(task.name(), "response");
    assert_eq!(task.version(), 1);
    assert!(task.files().contains("driven.fsi"));
    assert!(!task.files().contains("notes.txt"));
    assert!(task.sub_task("timehist_prim").is_some());
    assert!(task.has_file_names("frs", true));

    let reparsed = ResultTask::parse(&task.to_string()).unwrap();
    assert_eq!(reparsed, task);
    std::fs::remove_dir_all(&root).unwrap();
}
