//! Output buffer and the helpers shared by every record writer.

use tracing::{error, warn};

use super::format::{clip128, e17, e18};
use crate::config::EmitOptions;
use crate::entity::ints_after;
use crate::geometry::Mat34;
use crate::id::EntityKey;
use crate::model::Model;

/// One problem found while writing records. Writing continues so that
/// all problems are reported together.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordError {
    pub entity: Option<EntityKey>,
    pub message: String,
}

pub(crate) struct SolverWriter<'a> {
    pub(crate) model: &'a Model,
    pub(crate) options: &'a EmitOptions,
    pub(crate) out: String,
    pub(crate) errors: Vec<RecordError>,
    /// Next unused base id, for records without a model entity.
    pub(crate) next_base_id: i32,
    pub(crate) records: usize,
}

impl<'a> SolverWriter<'a> {
    pub(crate) fn new(model: &'a Model, options: &'a EmitOptions) -> Self {
        Self {
            model,
            options,
            out: String::with_capacity(64 * 1024),
            errors: Vec::new(),
            next_base_id: model.registry().free_id().0,
            records: 0,
        }
    }

    pub(crate) fn put(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Open a namelist record: `&NAME`.
    pub(crate) fn begin(&mut self, name: &str) {
        self.records += 1;
        self.out.push('&');
        self.out.push_str(name);
        self.out.push('\n');
    }

    pub(crate) fn error(&mut self, entity: Option<EntityKey>, message: String) {
        error!(entity = ?entity, "{message}");
        self.errors.push(RecordError { entity, message });
    }

    pub(crate) fn warn_ignored(&self, key: EntityKey, flags: &str, instead: &str) {
        warn!(
            "Ignoring{flags} in the description field for {}. {instead}",
            self.model.id_string(key)
        );
    }

    pub(crate) fn description(&self, key: EntityKey) -> &'a str {
        self.model.header(key).map_or("", |h| h.description.as_str())
    }

    pub(crate) fn base(&self, key: Option<EntityKey>) -> i32 {
        self.model.id_of(key)
    }

    // -----------------------------------------------------------------------
    // Identification
    // -----------------------------------------------------------------------

    /// `id`, `extId` with the assembly path, and the clipped first
    /// description line.
    pub(crate) fn print_id(&mut self, key: EntityKey) {
        self.print_id_with(key, true);
    }

    pub(crate) fn print_id_no_base(&mut self, key: EntityKey) {
        self.print_id_with(key, false);
    }

    fn print_id_with(&mut self, key: EntityKey, with_base: bool) {
        let model = self.model;
        if with_base {
            put!(self, "  id = {}\n", model.base_id(key).0);
        }
        put!(self, "  extId = {}", model.user_id(key).0);
        for id in model.assembly_path(key) {
            put!(self, " {id}");
        }
        self.put("\n");
        let descr = model.header(key).map_or("", |h| h.first_description_line());
        if !descr.is_empty() {
            put!(self, "  extDescr = '{}'\n", clip128(descr));
        }
    }

    /// `saveVar` toggles, written only when at least one is on. A
    /// `#saveVar` list in the description is used when no toggles are
    /// stored.
    pub(crate) fn save_var(&mut self, key: EntityKey, n: usize) {
        let Some(header) = self.model.header(key) else {
            return;
        };
        let stored = n.min(header.save_vars.len());
        let mut toggles: Vec<i32> = header.save_vars[..stored]
            .iter()
            .map(|on| i32::from(*on))
            .collect();
        if header.has_flag("#saveVar") {
            if stored == 0 {
                toggles = ints_after(&header.description, "#saveVar", n);
            } else {
                warn!(
                    "Ignoring #saveVar in the description field for {}",
                    self.model.id_string(key)
                );
            }
        }
        if toggles.contains(&1) {
            self.put("  saveVar =");
            for t in toggles {
                put!(self, " {t}");
            }
            self.put("\n");
        }
    }

    // -----------------------------------------------------------------------
    // Matrices
    // -----------------------------------------------------------------------

    /// Three rows of `%17.9e` separated by single spaces, continuation
    /// rows aligned under the first value.
    pub(crate) fn matrix17(&mut self, head: &str, m: &Mat34) {
        let pad = " ".repeat(head.len());
        for r in 0..3 {
            let row = m.row(r);
            let lead = if r == 0 { head } else { pad.as_str() };
            put!(
                self,
                "{lead}{} {} {} {}\n",
                e17(row[0]),
                e17(row[1]),
                e17(row[2]),
                e17(row[3])
            );
        }
    }

    /// Three rows of packed `%18.9e`.
    pub(crate) fn matrix18(&mut self, head: &str, m: &Mat34) {
        let pad = " ".repeat(head.len());
        for r in 0..3 {
            let row = m.row(r);
            let lead = if r == 0 { head } else { pad.as_str() };
            put!(
                self,
                "{lead}{}{}{}{}\n",
                e18(row[0]),
                e18(row[1]),
                e18(row[2]),
                e18(row[3])
            );
        }
    }

    /// `BC =` followed by one status code per entry.
    pub(crate) fn int_list(&mut self, head: &str, values: &[i32]) {
        self.put(head);
        for v in values {
            put!(self, " {v}");
        }
        self.put("\n");
    }
}
