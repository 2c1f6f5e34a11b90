//! Model file persistence.
//!
//! The model file is line-oriented ASCII: a `!LINKAGE MODEL FILE <version>`
//! header followed by one block per connected entity,
//!
//! ```text
//! JOINT
//! {
//!   ID = 1;
//!   BASE_ID = 7;
//!   VARIANT = REVOLUTE;
//!   SLAVE = 3;
//! }
//! ```
//!
//! References are stored as base ids and resolved once every block has
//! been read, so blocks may refer forward. Loading goes through the
//! model's two-phase id registration: requested ids are kept where they
//! are free and conflicts are settled at the end of the load. A reference
//! to an id that is not in the file is logged and cleared.
//!
//! Files of an older version are passed through
//! [`MigrationRegistry::standard`] before decoding.

mod fields;
mod text;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use fields::{BlockReader, BlockWriter, blank, entity_fields, header_fields, settings_fields};
pub use text::{MODEL_FILE_MAGIC, RawBlock, RawModel, parse_model_text, quote, unquote};

use crate::entity::{Entity, EntityType};
use crate::id::EntityKey;
use crate::migration::{MigrationError, MigrationRegistry};
use crate::model::Model;
use crate::registry::IdReassignment;

/// Version written by this build.
pub const MODEL_FILE_VERSION: u32 = 3;

/// Keyword of the model settings block.
const SETTINGS_KEYWORD: &str = "MECHANISM";

// ---------------------------------------------------------------------------
// Errors and summary
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ModelFileError {
    #[error("not a model file: {0}")]
    Header(String),
    #[error("model file version {found} is newer than this build supports ({MODEL_FILE_VERSION})")]
    FutureVersion { found: u32 },
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("{keyword} block at line {line}: invalid {key} value `{value}`")]
    InvalidValue {
        keyword: String,
        line: usize,
        key: String,
        value: String,
    },
    #[error("{keyword} block at line {line}: {field} refers to unknown base id {id}")]
    UnresolvedReference {
        keyword: String,
        line: usize,
        field: String,
        id: i32,
    },
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A reference that pointed at a base id missing from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub keyword: String,
    pub line: usize,
    pub field: String,
    pub id: i32,
}

/// What a load did besides creating entities.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// Version found in the file header.
    pub file_version: u32,
    pub entities: usize,
    /// Blocks with an unknown keyword.
    pub skipped_blocks: usize,
    pub unresolved: Vec<UnresolvedReference>,
    /// Entities that could not keep their requested base id.
    pub reassigned: Vec<IdReassignment<EntityKey>>,
}

impl LoadSummary {
    /// Turn the first cleared reference into an error.
    pub fn into_strict(self) -> Result<Self, ModelFileError> {
        match self.unresolved.first() {
            Some(r) => Err(ModelFileError::UnresolvedReference {
                keyword: r.keyword.clone(),
                line: r.line,
                field: r.field.clone(),
                id: r.id,
            }),
            None => Ok(self),
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Render the model file for every connected entity of `model`.
pub fn write_model_string(model: &Model) -> String {
    let mut out = format!("{MODEL_FILE_MAGIC} {MODEL_FILE_VERSION}\n\n");

    let mut settings = model.settings.clone();
    let mut w = BlockWriter::new(model);
    settings_fields(&mut settings, &mut w);
    w.finish_into(SETTINGS_KEYWORD, &mut out);

    let mut blocks = 0;
    for etype in EntityType::ALL {
        for key in model.keys_of_type(etype) {
            let Some(entity) = model.get(key) else {
                continue;
            };
            // Visiting applies the written values back; work on a copy.
            let mut entity = entity.clone();
            let mut w = BlockWriter::new(model);
            header_fields(&mut entity.header, &mut w);
            entity_fields(&mut entity.data, &mut w);
            w.finish_into(etype.keyword(), &mut out);
            blocks += 1;
        }
    }
    debug!(blocks, bytes = out.len(), "model file rendered");
    out
}

/// Write the model file to `path` through a temporary file. Returns the
/// number of bytes written.
pub fn save_model_file(model: &Model, path: impl AsRef<Path>) -> Result<usize, ModelFileError> {
    let path = path.as_ref();
    let text = write_model_string(model);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    if let Err(err) = std::fs::write(&tmp, text.as_bytes()) {
        crate::fs::delete_file(&tmp);
        return Err(err.into());
    }
    if !crate::fs::rename_file(&tmp, path) {
        crate::fs::delete_file(&tmp);
        return Err(std::io::Error::other(format!("could not replace {}", path.display())).into());
    }
    info!(path = %path.display(), bytes = text.len(), "model file saved");
    Ok(text.len())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Build a new model from model file text.
pub fn load_model_str(text: &str) -> Result<(Model, LoadSummary), ModelFileError> {
    let mut model = Model::default();
    let summary = read_into(&mut model, text, true)?;
    Ok((model, summary))
}

pub fn load_model_file(path: impl AsRef<Path>) -> Result<(Model, LoadSummary), ModelFileError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let (model, summary) = load_model_str(&text)?;
    info!(path = %path.display(), entities = summary.entities, "model file loaded");
    Ok((model, summary))
}

/// Add the entities of a model file to an open model. The model's own
/// settings are kept; id conflicts with existing entities are resolved
/// in favour of the entities already present where results depend on it.
pub fn merge_model_str(model: &mut Model, text: &str) -> Result<LoadSummary, ModelFileError> {
    read_into(model, text, false)
}

fn read_into(model: &mut Model, text: &str, apply_settings: bool) -> Result<LoadSummary, ModelFileError> {
    let mut raw = parse_model_text(text)?;
    let mut summary = LoadSummary {
        file_version: raw.version,
        ..LoadSummary::default()
    };
    if raw.version > MODEL_FILE_VERSION {
        return Err(ModelFileError::FutureVersion { found: raw.version });
    }
    if raw.version < MODEL_FILE_VERSION {
        MigrationRegistry::standard().migrate(&mut raw.blocks, raw.version, MODEL_FILE_VERSION)?;
        info!(from = raw.version, to = MODEL_FILE_VERSION, "model file migrated");
    }

    let no_ids = BTreeMap::new();
    let mut settings = model.settings.clone();
    let mut pending: Vec<(EntityKey, &RawBlock)> = Vec::new();
    let mut ids: BTreeMap<i32, EntityKey> = BTreeMap::new();

    // Pass 1: one blank entity per block, keyed by the id it asks for.
    for block in &raw.blocks {
        if block.keyword == SETTINGS_KEYWORD {
            if apply_settings {
                let mut r = BlockReader::new(block, &no_ids);
                settings_fields(&mut settings, &mut r);
                r.finish()?;
            }
            continue;
        }
        let Some(etype) = EntityType::from_keyword(&block.keyword) else {
            warn!(keyword = %block.keyword, line = block.line, "unknown block skipped");
            summary.skipped_blocks += 1;
            continue;
        };
        let key = model.create(blank(etype));
        let requested = block.get("BASE_ID").and_then(|v| v.parse::<i32>().ok());
        if let Some(id) = requested.filter(|id| *id > 0) {
            if ids.contains_key(&id) {
                warn!(id, line = block.line, "base id given twice; later references go to the first");
            } else {
                ids.insert(id, key);
            }
        }
        pending.push((key, block));
    }

    // Pass 2: decode fields with every id known.
    let mut decoded: Vec<(EntityKey, Entity)> = Vec::with_capacity(pending.len());
    for (key, block) in &pending {
        let Some(entity) = model.get(*key) else {
            continue;
        };
        let mut entity = entity.clone();
        let mut r = BlockReader::new(block, &ids);
        header_fields(&mut entity.header, &mut r);
        entity_fields(&mut entity.data, &mut r);
        match r.finish() {
            Ok(unresolved) => summary.unresolved.extend(unresolved),
            Err(err) => {
                for (key, _) in &pending {
                    model.erase(*key);
                }
                return Err(err);
            }
        }
        decoded.push((*key, entity));
    }

    // Pass 3: install and register.
    model.begin_load();
    for (key, entity) in decoded {
        if let Some(slot) = model.get_mut(key) {
            *slot = entity;
        }
        if let Err(err) = model.connect(key) {
            warn!(%err, "entity from model file not connected");
            continue;
        }
        summary.entities += 1;
    }
    summary.reassigned = model.finish_load();
    if apply_settings {
        model.settings = settings;
    }

    if !summary.unresolved.is_empty() {
        warn!(count = summary.unresolved.len(), "references to missing entities were cleared");
    }
    debug!(
        entities = summary.entities,
        skipped = summary.skipped_blocks,
        reassigned = summary.reassigned.len(),
        "model file read"
    );
    Ok(summary)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::{DofStatus, Z_ROT, Z_TRANS};
    use crate::function::{Engine, EngineArg, Function, FunctionKind};
    use crate::geometry::{Mat34, Vec3};
    use crate::id::BaseId;
    use crate::joint::{Joint, JointVariant};
    use crate::part::{Part, Turbine};
    use crate::sensor::SensorEntity;
    use crate::triad::Triad;

    /// Two triads joined by a revolute joint with a spring on Z rotation,
    /// driven through an engine reading the joint.
    fn crank() -> (Model, EntityKey) {
        let mut m = Model::default();
        m.settings.model_file = "crank.fmm".into();
        let part = m.insert(Part::at(Mat34::at(Vec3::new(1.0, 0.0, 0.0))));
        let mut t1 = Triad::at(Mat34::at(Vec3::new(0.0, 0.0, 0.0)));
        t1.set_status(0, DofStatus::Fixed);
        let t1 = m.insert(t1);
        let mut t2 = Triad::at(Mat34::at(Vec3::new(0.0, 0.0, 0.0)));
        t2.parts.push(part);
        t2.set_init_vel(2, 0.25);
        let t2 = m.insert(t2);

        let mut j = Joint::new(JointVariant::Revolute { tz_dof: true });
        j.slave = Some(t2);
        j.master = Some(t1);
        j.set_joint_variable(Z_ROT, 0.5);
        j.set_init_vel(Z_TRANS, -1.5);
        let j = m.insert(j);
        m.set_joint_status(j, Z_ROT, DofStatus::SpringConstrained);

        let f = m.insert(Function::new(FunctionKind::LinVar {
            values: vec![0.0, 0.0, 1.0, 2.5e-3],
        }));
        let sensor = m.sensor_for(j);
        let mut e = Engine::with_function(f);
        e.args.push(EngineArg::new(sensor, Z_ROT, SensorEntity::RelPos));
        m.insert(e);

        if let Some(h) = m.header_mut(j) {
            h.description = "main \"crank\"\nline two".into();
            h.tag = "crank".into();
        }
        (m, j)
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    #[test]
    fn written_file_reads_back_identically() {
        let (m, _) = crank();
        let text = write_model_string(&m);
        assert!(text.starts_with("!LINKAGE MODEL FILE 3\n"));
        let (loaded, summary) = load_model_str(&text).unwrap();
        assert_eq!(summary.entities, m.len());
        assert!(summary.unresolved.is_empty());
        assert!(summary.reassigned.is_empty());
        assert_eq!(write_model_string(&loaded), text);
        assert_eq!(loaded.settings.model_file, "crank.fmm");
    }

    #[test]
    fn joint_state_survives() {
        let (m, j) = crank();
        let (loaded, _) = load_model_str(&write_model_string(&m)).unwrap();
        let key = loaded.find_by_base_id(m.base_id(j)).unwrap();
        let joint = loaded.joint(key).unwrap();
        assert_eq!(joint.variant, JointVariant::Revolute { tz_dof: true });
        assert_eq!(joint.status(Z_ROT), DofStatus::SpringConstrained);
        assert_eq!(joint.joint_variable(Z_ROT), 0.5);
        assert_eq!(joint.raw_init_vel(Z_TRANS), -1.5);
        let spring = joint.springs[Z_ROT].unwrap();
        assert_eq!(loaded.joint_spring(spring).unwrap().owner, Some(key));

        let header = loaded.header(key).unwrap();
        assert_eq!(header.description, "main \"crank\"\nline two");
        assert_eq!(header.tag, "crank");

        let slave = loaded.triad(joint.slave.unwrap()).unwrap();
        assert_eq!(slave.parts.len(), 1);
        assert_eq!(slave.init_vel(2), 0.25);
    }

    #[test]
    fn turbine_keeps_topology_and_blades() {
        let (mut m, j) = crank();
        let slave = m.joint(j).unwrap().slave;
        let turbine = m.insert(Turbine {
            hub_diameter: 2.0,
            n_blades: 1,
            topology: [slave, None, None, None, Some(j)],
            pitch_joints: vec![j],
            aero_centres: vec![[0.25, -0.5]],
            wind: true,
            ..Turbine::default()
        });
        let (loaded, summary) = load_model_str(&write_model_string(&m)).unwrap();
        assert!(summary.unresolved.is_empty());

        let key = loaded.find_by_base_id(m.base_id(turbine)).unwrap();
        let joint = loaded.find_by_base_id(m.base_id(j)).unwrap();
        let t = loaded.turbine(key).unwrap();
        assert_eq!(t.topology[0], loaded.joint(joint).unwrap().slave);
        assert!(t.topology[1..4].iter().all(Option::is_none));
        assert_eq!(t.topology[4], Some(joint));
        assert_eq!(t.pitch_joints, vec![joint]);
        assert_eq!(t.aero_centres, vec![[0.25, -0.5]]);
        assert_eq!((t.n_blades, t.hub_radius(), t.wind), (1, 1.0, true));
    }

    #[test]
    fn forward_references_resolve() {
        let text = "!LINKAGE MODEL FILE 3\n\
            JOINT\n{\n  ID = 1;\n  BASE_ID = 5;\n  VARIANT = BALL;\n  SLAVE = 9;\n}\n\
            TRIAD\n{\n  ID = 1;\n  BASE_ID = 9;\n}\n";
        let (m, summary) = load_model_str(text).unwrap();
        assert_eq!(summary.entities, 2);
        let j = m.find_by_base_id(BaseId(5)).unwrap();
        assert_eq!(m.joint(j).unwrap().slave, m.find_by_base_id(BaseId(9)));
    }

    // -----------------------------------------------------------------------
    // Failure modes
    // -----------------------------------------------------------------------

    #[test]
    fn unresolved_reference_is_cleared() {
        let text = "!LINKAGE MODEL FILE 3\nJOINT\n{\n  BASE_ID = 5;\n  VARIANT = BALL;\n  SLAVE = 42;\n}\n";
        let (m, summary) = load_model_str(text).unwrap();
        let j = m.find_by_base_id(BaseId(5)).unwrap();
        assert_eq!(m.joint(j).unwrap().slave, None);
        assert_eq!(summary.unresolved.len(), 1);
        assert_eq!(summary.unresolved[0].field, "SLAVE");
        assert_eq!(summary.unresolved[0].id, 42);
        let err = summary.into_strict().unwrap_err();
        assert!(err.to_string().contains("unknown base id 42"), "{err}");
    }

    #[test]
    fn bad_value_aborts_without_leftovers() {
        let text = "!LINKAGE MODEL FILE 3\nTRIAD\n{\n  BASE_ID = 1;\n}\nPART\n{\n  MASS = heavy;\n}\n";
        let mut m = Model::default();
        let err = merge_model_str(&mut m, text).unwrap_err();
        match err {
            ModelFileError::InvalidValue { keyword, line, key, value } => {
                assert_eq!((keyword.as_str(), line, key.as_str()), ("PART", 6, "MASS"));
                assert_eq!(value, "heavy");
            }
            other => panic!("unexpected {other}"),
        }
        assert!(m.is_empty());
    }

    #[test]
    fn newer_file_is_refused() {
        let err = load_model_str("!LINKAGE MODEL FILE 99\n").unwrap_err();
        assert!(matches!(err, ModelFileError::FutureVersion { found: 99 }));
    }

    #[test]
    fn unknown_block_is_skipped() {
        let text = "!LINKAGE MODEL FILE 3\nGIZMO\n{\n  ID = 1;\n}\nTRIAD\n{\n  ID = 1;\n}\n";
        let (m, summary) = load_model_str(text).unwrap();
        assert_eq!(summary.skipped_blocks, 1);
        assert_eq!(m.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Migration and merge
    // -----------------------------------------------------------------------

    #[test]
    fn version_one_file_is_migrated() {
        let text = "!LINKAGE MODEL FILE 1\n\
            TRIAD\n{\n  ID = 1;\n  BASE_ID = 2;\n  ADD_BND = 0 0 1 0 0 0;\n  GL_VEL = 0 3 0 0 0 0;\n}\n\
            FUNCTION\n{\n  ID = 1;\n  BASE_ID = 3;\n  TYPE = SPLINE;\n  VALS = 4 0 1 1 2;\n}\n";
        let (m, summary) = load_model_str(text).unwrap();
        assert_eq!(summary.file_version, 1);
        let t = m.triad(m.find_by_base_id(BaseId(2)).unwrap()).unwrap();
        assert_eq!(t.status(2), DofStatus::FreeDynamics);
        assert_eq!(t.init_vel(1), 3.0);
        let f = m.function(m.find_by_base_id(BaseId(3)).unwrap()).unwrap();
        let expected = FunctionKind::Spline {
            values: vec![0.0, 1.0, 1.0, 2.0],
        };
        assert_eq!(f.kind, expected);
    }

    #[test]
    fn merge_keeps_ids_unique() {
        let (mut m, _) = crank();
        let before = m.len();
        let text = write_model_string(&m);
        let summary = merge_model_str(&mut m, &text).unwrap();
        assert_eq!(m.len(), 2 * before);
        assert_eq!(summary.entities, before);
        let mut ids: Vec<i32> = m.iter().map(|(_, e)| e.header.base_id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 2 * before);
    }

    #[test]
    fn file_round_trip() {
        let dir = std::env::temp_dir().join(format!("linkage-model-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("crank.fmm");
        let (m, _) = crank();
        let bytes = save_model_file(&m, &path).unwrap();
        assert_eq!(bytes, std::fs::metadata(&path).unwrap().len() as usize);
        assert!(!dir.join("crank.fmm.tmp").exists());
        let (loaded, _) = load_model_file(&path).unwrap();
        assert_eq!(loaded.len(), m.len());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
