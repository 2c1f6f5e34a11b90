//! Mechanism descriptions on disk.
//!
//! A description directory holds a `model` file naming parts, triads,
//! joints and the rest, plus optional `mechanism` settings and `emit`
//! options. [`load_mechanism`] reads all three and builds a connected
//! [`Model`] ready for validation and solver input writing.

pub mod builder;
pub mod loader;
pub mod schema;

use std::collections::HashMap;
use std::path::Path;

use linkage_core::config::{EmitOptions, MechanismSettings};
use linkage_core::id::EntityKey;
use linkage_core::model::Model;
use tracing::info;

pub use builder::{BuiltModel, TIME_NAME, build_model};
pub use loader::DataLoadError;
pub use schema::ModelData;

/// A loaded description directory.
#[derive(Debug, Clone)]
pub struct Mechanism {
    pub model: Model,
    pub options: EmitOptions,
    /// Entity keys by description name.
    pub names: HashMap<String, EntityKey>,
}

/// Load the description in `dir`.
pub fn load_mechanism(dir: &Path) -> Result<Mechanism, DataLoadError> {
    let settings: MechanismSettings = loader::deserialize_optional(dir, "mechanism")?;
    let options: EmitOptions = loader::deserialize_optional(dir, "emit")?;
    let model_path = loader::require_data_file(dir, "model")?;
    let data: ModelData = loader::deserialize_file(&model_path)?;

    let BuiltModel { model, names } = build_model(&data, settings, &model_path)?;
    info!(dir = %dir.display(), entities = model.len(), "mechanism loaded");
    Ok(Mechanism {
        model,
        options,
        names,
    })
}
