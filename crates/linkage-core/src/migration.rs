//! Model-file keyword migration.
//!
//! Old model files use keywords that have since been renamed or replaced.
//! Each registered step rewrites the raw blocks of one file version into
//! the next; the registry chains steps up to the current version before
//! any field is decoded.

use std::collections::BTreeMap;

use crate::dof::{DofStatus, MAX_DOF};
use crate::entity::has_flag;
use crate::serialize::RawBlock;

/// Errors that can occur during migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no migration path from model file version {from} to version {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration from version {from} to version {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
}

/// Rewrites the blocks of version `N` into version `N + 1`.
pub type MigrationFn = fn(&mut [RawBlock]) -> Result<(), String>;

/// Registry of migration steps keyed by source version.
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// The steps needed to read every released model file version.
    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.register(1, triad_boundary_codes);
        reg.register(2, function_value_lists);
        reg
    }

    /// Register a step from `from_version` to `from_version + 1`.
    pub fn register(&mut self, from_version: u32, migrate: MigrationFn) {
        self.migrations.insert(from_version, migrate);
    }

    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        if from >= to {
            return from == to;
        }
        (from..to).all(|v| self.migrations.contains_key(&v))
    }

    /// Rewrite `blocks` from version `from` to version `to` in place.
    pub fn migrate(&self, blocks: &mut [RawBlock], from: u32, to: u32) -> Result<(), MigrationError> {
        if from == to {
            return Ok(());
        }
        if !self.can_migrate(from, to) {
            return Err(MigrationError::NoMigrationPath { from, to });
        }
        for version in from..to {
            let Some(step) = self.migrations.get(&version) else {
                return Err(MigrationError::NoMigrationPath { from, to });
            };
            step(blocks).map_err(|reason| MigrationError::MigrationFailed {
                from: version,
                to: version + 1,
                reason,
            })?;
        }
        Ok(())
    }

    pub fn step_count(&self) -> usize {
        self.migrations.len()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Version 1 to 2: triads stored additional boundary conditions as a
/// flag per DOF (`ADD_BND`) and the initial motion as `GL_VEL`/`GL_ACC`.
/// A set flag becomes FREE_DYNAMICS, or FIXED when the description carries
/// `#DynBC`.
fn triad_boundary_codes(blocks: &mut [RawBlock]) -> Result<(), String> {
    for block in blocks.iter_mut().filter(|b| b.keyword == "TRIAD") {
        block.rename("GL_VEL", "INIT_VELOCITY");
        block.rename("GL_ACC", "INIT_ACCELERATION");
        block.rename("CONNETOR_TYPE", "CONNECTOR_TYPE");

        let Some(flags) = block.remove("ADD_BND") else {
            continue;
        };
        let fixed = block.get("DESCR").is_some_and(|d| has_flag(d, "#DynBC"));
        let set_status = if fixed {
            DofStatus::Fixed
        } else {
            DofStatus::FreeDynamics
        };

        let mut statuses: Vec<String> = match block.get("DOF_STATUS") {
            Some(words) => words.split_whitespace().map(str::to_owned).collect(),
            None => Vec::new(),
        };
        for (dof, flag) in flags.split_whitespace().enumerate() {
            let on = match flag {
                "1" | "true" => true,
                "0" | "false" => false,
                other => return Err(format!("ADD_BND flag `{other}` at line {}", block.line)),
            };
            if dof >= MAX_DOF {
                return Err(format!("ADD_BND has more than {MAX_DOF} flags at line {}", block.line));
            }
            if statuses.len() <= dof {
                statuses.resize(dof + 1, DofStatus::Free.as_str().to_owned());
            }
            if on {
                statuses[dof] = set_status.as_str().to_owned();
            }
        }
        if statuses.iter().any(|s| s != DofStatus::Free.as_str()) {
            block.set("DOF_STATUS", statuses.join(" "));
        }
    }
    Ok(())
}

/// Version 2 to 3: function value lists carried their length first
/// (`VALS = n v1 .. vn`).
fn function_value_lists(blocks: &mut [RawBlock]) -> Result<(), String> {
    for block in blocks.iter_mut().filter(|b| b.keyword == "FUNCTION") {
        let Some(vals) = block.remove("VALS") else {
            continue;
        };
        let mut words = vals.split_whitespace();
        let count: usize = words
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| format!("VALS without a value count at line {}", block.line))?;
        let values: Vec<&str> = words.collect();
        if values.len() != count {
            return Err(format!(
                "VALS announces {count} values but has {} at line {}",
                values.len(),
                block.line
            ));
        }
        block.set("VALUES", values.join(" "));
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn block(keyword: &str, fields: &[(&str, &str)]) -> RawBlock {
        let mut b = RawBlock::new(keyword, 3);
        for (k, v) in fields {
            b.set(k, *v);
        }
        b
    }

    fn append_tag(blocks: &mut [RawBlock]) -> Result<(), String> {
        for b in blocks {
            let tag = b.get("TAG").unwrap_or("").to_owned();
            b.set("TAG", format!("{tag}+"));
        }
        Ok(())
    }

    fn failing(_blocks: &mut [RawBlock]) -> Result<(), String> {
        Err("broken".into())
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    #[test]
    fn registry_new_is_empty() {
        let reg = MigrationRegistry::new();
        assert_eq!(reg.step_count(), 0);
        assert!(reg.can_migrate(4, 4));
        assert!(!reg.can_migrate(1, 2));
        assert!(!reg.can_migrate(2, 1));
    }

    #[test]
    fn steps_chain_in_order() {
        let mut reg = MigrationRegistry::new();
        reg.register(1, append_tag);
        reg.register(2, append_tag);
        let mut blocks = vec![block("PART", &[("TAG", "a")])];
        reg.migrate(&mut blocks, 1, 3).unwrap();
        assert_eq!(blocks[0].get("TAG"), Some("a++"));
    }

    #[test]
    fn gap_is_no_migration_path() {
        let mut reg = MigrationRegistry::new();
        reg.register(1, append_tag);
        reg.register(3, append_tag);
        let mut blocks = vec![block("PART", &[("TAG", "a")])];
        let err = reg.migrate(&mut blocks, 1, 4).unwrap_err();
        assert!(matches!(err, MigrationError::NoMigrationPath { from: 1, to: 4 }));
        // Nothing was applied.
        assert_eq!(blocks[0].get("TAG"), Some("a"));
    }

    #[test]
    fn failing_step_names_its_versions() {
        let mut reg = MigrationRegistry::new();
        reg.register(1, append_tag);
        reg.register(2, failing);
        let err = reg.migrate(&mut [], 1, 3).unwrap_err();
        match err {
            MigrationError::MigrationFailed { from, to, reason } => {
                assert_eq!((from, to), (2, 3));
                assert_eq!(reason, "broken");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn standard_covers_all_old_versions() {
        let reg = MigrationRegistry::standard();
        assert_eq!(reg.step_count(), 2);
        assert!(reg.can_migrate(1, 3));
    }

    // -----------------------------------------------------------------------
    // Standard steps
    // -----------------------------------------------------------------------

    #[test]
    fn add_bnd_becomes_dof_status() {
        let mut blocks = vec![
            block("TRIAD", &[("ADD_BND", "1 0 0 0 0 1"), ("GL_VEL", "1 2 3 0 0 0")]),
            block("TRIAD", &[("ADD_BND", "0 1 0"), ("DESCR", "\"ground #DynBC\"")]),
            block("TRIAD", &[("ADD_BND", "0 0 0 0 0 0")]),
        ];
        triad_boundary_codes(&mut blocks).unwrap();
        assert_eq!(
            blocks[0].get("DOF_STATUS"),
            Some("FREE_DYNAMICS FREE FREE FREE FREE FREE_DYNAMICS")
        );
        assert_eq!(blocks[0].get("INIT_VELOCITY"), Some("1 2 3 0 0 0"));
        assert_eq!(blocks[0].get("ADD_BND"), None);
        assert_eq!(blocks[1].get("DOF_STATUS"), Some("FREE FIXED FREE"));
        assert_eq!(blocks[2].get("DOF_STATUS"), None);
    }

    #[test]
    fn bad_add_bnd_flag_fails() {
        let mut blocks = vec![block("TRIAD", &[("ADD_BND", "1 x")])];
        assert!(triad_boundary_codes(&mut blocks).is_err());
    }

    #[test]
    fn vals_drops_leading_count() {
        let mut blocks = vec![
            block("FUNCTION", &[("VALS", "4 0 1 2 3")]),
            block("TRIAD", &[("VALS", "untouched")]),
        ];
        function_value_lists(&mut blocks).unwrap();
        assert_eq!(blocks[0].get("VALUES"), Some("0 1 2 3"));
        assert_eq!(blocks[0].get("VALS"), None);
        assert_eq!(blocks[1].get("VALS"), Some("untouched"));

        let mut short = vec![block("FUNCTION", &[("VALS", "3 0 1")])];
        assert!(function_value_lists(&mut short).is_err());
    }
}
