//! Stress and endurance tests for large linkage models.
//!
//! These are marked `#[ignore]` for nightly CI runs. Run with:
//!   cargo test --package linkage-core -- --ignored

use linkage_core::codec::emit_to_string;
use linkage_core::config::EmitOptions;
use linkage_core::dof::{DofStatus, Z_ROT};
use linkage_core::entity::EntityType;
use linkage_core::model::Model;
use linkage_core::serialize::{load_model_str, write_model_string};
use linkage_core::test_utils::*;
use linkage_core::validation::validate;

fn build_large_model(pendulums: usize) -> (Model, Vec<Pendulum>) {
    let mut model = Model::default();
    let all = (0..pendulums)
        .map(|i| {
            let p = pendulum(&mut model);
            if i % 3 == 0 {
                model.set_joint_status(p.joint, Z_ROT, DofStatus::FreeDynamics);
            }
            p
        })
        .collect();
    (model, all)
}

/// Two independently built 20k-pendulum models give identical solver input.
#[test]
#[ignore]
fn test_20k_pendulums_emit_deterministically() {
    let (mut a, _) = build_large_model(20_000);
    let (mut b, _) = build_large_model(20_000);
    let options = EmitOptions::default();

    let text_a = emit_to_string(&mut a, &options).unwrap();
    let text_b = emit_to_string(&mut b, &options).unwrap();
    assert_eq!(text_a.matches("&MASTERSLAVEJOINT\n").count(), 20_000);
    assert_eq!(text_a, text_b);
}

/// Save and reload the same model 100 times; the file text must not drift.
#[test]
#[ignore]
fn test_endurance_100_model_file_cycles() {
    let (model, _) = build_large_model(2_000);
    let first = write_model_string(&model);
    let mut text = first.clone();

    for cycle in 0..100 {
        let (loaded, summary) = load_model_str(&text).unwrap();
        assert!(summary.reassigned.is_empty(), "cycle {cycle} reassigned ids");
        text = write_model_string(&loaded);
    }
    assert_eq!(text, first);
}

/// Erase every other joint of a 10k-pendulum model, then validate. The
/// slaves stay attached to their parts, so the model remains clean.
#[test]
#[ignore]
fn test_mass_erase_keeps_model_valid() {
    let (mut model, pendulums) = build_large_model(10_000);

    for p in pendulums.iter().step_by(2) {
        assert!(model.erase(p.joint));
    }
    assert_eq!(model.keys_of_type(EntityType::Joint).len(), 5_000);

    let report = validate(&mut model);
    assert!(report.is_ok(), "{}", report.summary());
    let ids = model.iter().map(|(k, _)| model.base_id(k)).collect::<std::collections::BTreeSet<_>>();
    assert_eq!(ids.len(), model.len());
}
