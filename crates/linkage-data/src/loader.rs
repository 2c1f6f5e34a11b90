//! File layer of the description loader: format detection, file discovery,
//! deserialization and name lookup.
//!
//! A description directory holds up to three files, each in RON, TOML or
//! JSON: `model`, `mechanism` and `emit`. The format follows the extension;
//! two files with one base name and different formats are an error.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a description.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required description file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A value that parses but means nothing to the model, such as an
    /// unknown DOF name.
    #[error("invalid {field} '{value}' in {file}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        value: String,
    },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const EXTENSIONS: [&'static str; 3] = ["ron", "toml", "json"];
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in Format::EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` as `format`; `path` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    path: &Path,
) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

/// Deserialize `{base_name}.*` from `dir`, or return the default when
/// there is none.
pub fn deserialize_optional<T: DeserializeOwned + Default>(
    dir: &Path,
    base_name: &str,
) -> Result<T, DataLoadError> {
    match find_data_file(dir, base_name)? {
        Some(path) => deserialize_file(&path),
        None => Ok(T::default()),
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{JointKind, ModelData};
    use linkage_core::config::{EmitOptions, MechanismSettings};
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "linkage_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("model.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("model.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("model.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["model.yaml", "model"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file / require_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found() {
        let dir = make_test_dir("find_found");
        fs::write(dir.join("emit.toml"), "").unwrap();

        let result = find_data_file(&dir, "emit").unwrap();
        assert_eq!(result, Some(dir.join("emit.toml")));
        assert_eq!(find_data_file(&dir, "model").unwrap(), None);

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("model.ron"), "()").unwrap();
        fs::write(dir.join("model.json"), "{}").unwrap();

        let result = find_data_file(&dir, "model");
        assert!(matches!(
            result,
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");

        let result = require_data_file(&dir, "model");
        match result {
            Err(DataLoadError::MissingRequired { file, .. }) => assert_eq!(file, "model"),
            other => panic!("unexpected {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn same_joint_in_every_format() {
        let ron = r#"(joints: [(name: "hinge", kind: revolute, slave: "a", master: Some("b"))])"#;
        let json = r#"{"joints": [{"name": "hinge", "kind": "revolute", "slave": "a", "master": "b"}]}"#;
        let toml = "[[joints]]\nname = \"hinge\"\nkind = \"revolute\"\nslave = \"a\"\nmaster = \"b\"\n";

        for (content, format) in [(ron, Format::Ron), (json, Format::Json), (toml, Format::Toml)] {
            let data: ModelData = deserialize_str(content, format, Path::new("model")).unwrap();
            assert_eq!(data.joints.len(), 1, "{format:?}");
            let j = &data.joints[0];
            assert_eq!(j.kind, JointKind::Revolute);
            assert_eq!(j.master.as_deref(), Some("b"));
            assert!(j.line.is_empty());
            assert!(data.triads.is_empty());
        }
    }

    #[test]
    fn settings_from_toml() {
        let dir = make_test_dir("settings_toml");
        let path = dir.join("mechanism.toml");
        fs::write(&path, "model_file = \"crank.fmm\"\ngravity = [0.0, 0.0, -1.62]\n").unwrap();

        let settings: MechanismSettings = deserialize_file(&path).unwrap();
        assert_eq!(settings.model_file, "crank.fmm");
        assert_eq!(settings.gravity.0, [0.0, 0.0, -1.62]);
        // Unlisted fields keep their defaults.
        assert_eq!(settings.position_tolerance, MechanismSettings::default().position_tolerance);

        cleanup(&dir);
    }

    #[test]
    fn missing_optional_file_gives_default() {
        let dir = make_test_dir("optional");
        let options: EmitOptions = deserialize_optional(&dir, "emit").unwrap();
        assert_eq!(options, EmitOptions::default());

        fs::write(dir.join("emit.json"), r#"{"rel_path_correction": "../data"}"#).unwrap();
        let options: EmitOptions = deserialize_optional(&dir, "emit").unwrap();
        assert_eq!(options.rel_path_correction, "../data");
        assert_eq!(options.tmp_suffix, ".tmp");

        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_parse_error() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("model.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        let result: Result<ModelData, _> = deserialize_file(&path);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    #[test]
    fn unknown_joint_kind_is_parse_error() {
        let json = r#"{"joints": [{"name": "j", "kind": "hinge", "slave": "a"}]}"#;
        let result: Result<ModelData, _> = deserialize_str(json, Format::Json, Path::new("model.json"));
        match result {
            Err(DataLoadError::Parse { detail, .. }) => assert!(detail.contains("hinge"), "{detail}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // resolve_name / check_duplicate
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_name_found_and_missing() {
        let mut map = HashMap::new();
        map.insert("crank".to_string(), 42u32);

        let val = resolve_name(&map, "crank", Path::new("model.ron"), "part").unwrap();
        assert_eq!(*val, 42);

        let result = resolve_name(&map, "rocker", Path::new("model.ron"), "part");
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "part", .. }) if name == "rocker"
        ));
    }

    #[test]
    fn check_duplicate_has_dup() {
        let mut map = HashMap::new();
        assert!(check_duplicate(&map, "crank", Path::new("model.ron")).is_ok());
        map.insert("crank".to_string(), 42u32);

        let result = check_duplicate(&map, "crank", Path::new("model.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "crank"
        ));
    }

    // -----------------------------------------------------------------------
    // Error display messages
    // -----------------------------------------------------------------------

    #[test]
    fn error_display_messages() {
        let e = DataLoadError::MissingRequired {
            file: "model".into(),
            dir: PathBuf::from("/data"),
        };
        assert_eq!(e.to_string(), "required file 'model' not found in /data");

        let e = DataLoadError::InvalidValue {
            file: PathBuf::from("model.ron"),
            field: "DOF",
            value: "TW".into(),
        };
        assert_eq!(e.to_string(), "invalid DOF 'TW' in model.ron");

        let e = DataLoadError::UnresolvedRef {
            file: PathBuf::from("model.ron"),
            name: "crank".to_string(),
            expected_kind: "part",
        };
        assert_eq!(e.to_string(), "unresolved part reference 'crank' in model.ron");

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let data_err: DataLoadError = io_err.into();
        assert!(matches!(data_err, DataLoadError::Io(_)));
        assert!(data_err.to_string().contains("file not found"));
    }
}
