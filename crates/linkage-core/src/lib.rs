//! Linkage Core -- the preprocessing model of a multibody mechanism.
//!
//! This crate holds the in-memory mechanism model (triads, parts, joints,
//! springs, loads, functions, control blocks and the rest), the rules that
//! keep it consistent while it is edited, the validation pass, the
//! fixed-format solver input writer, model file persistence and the
//! result task tree that tracks solver output on disk.
//!
//! # Model Lifecycle
//!
//! Entities live in one arena owned by [`model::Model`] and are addressed
//! by [`id::EntityKey`]. An entity is created unconnected, then connected,
//! which assigns its base id and makes it visible to lookups and to the
//! writer:
//!
//! ```rust,ignore
//! let mut model = Model::default();
//! let triad = model.insert(Triad::at(Mat34::IDENTITY));
//! model.set_triad_status(triad, dof::X_TRANS, DofStatus::Fixed);
//! ```
//!
//! Erasing an entity clears every reference to it and cascades to the
//! children it owns (DOF springs, dampers, motions and loads).
//!
//! # Writing Solver Input
//!
//! [`codec::emit`] validates the model, then writes every record in the
//! order the solver resolves ids. Nothing is written when validation or a
//! record fails.
//!
//! # Key Types
//!
//! - [`model::Model`] -- Entity arena, typed accessors and DOF child rules.
//! - [`registry::IdentityRegistry`] -- Base-id allocation with two-phase
//!   conflict resolution for loads and merges.
//! - [`joint::Joint`] -- Joint variants, legal DOF masks and joint variables.
//! - [`validation::ValidationReport`] -- Issues that block emission.
//! - [`serialize`] -- The `!LINKAGE MODEL FILE` text format.
//! - [`results::ResultTask`] -- Solver output directory tree.

pub mod codec;
pub mod config;
pub mod control;
pub mod dof;
pub mod entity;
pub mod fs;
pub mod function;
pub mod geometry;
pub mod graph;
pub mod id;
pub mod joint;
pub mod line;
pub mod load;
pub mod migration;
pub mod model;
pub mod part;
pub mod query;
pub mod registry;
pub mod results;
pub mod sensor;
pub mod serialize;
pub mod spring;
pub mod triad;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
