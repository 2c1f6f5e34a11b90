//! Solver input file writer.
//!
//! The solver reads one Fortran namelist record per `&NAME ... /` block.
//! Records are written in a fixed order: the solver resolves most
//! references while parsing, so an id must be defined by an earlier
//! record before another record uses it, with the exceptions the solver
//! itself patches up afterwards (engines, functions, sensors).
//!
//! Writing is all or nothing. [`crate::validation::validate`] runs first
//! and any issue aborts before a record is produced; record-level errors
//! found while writing are collected and abort the same way. The file is
//! written under a temporary name and renamed into place on success.

/// `write!` into the writer's buffer. Formatting into a `String` cannot
/// fail.
macro_rules! put {
    ($w:expr, $($arg:tt)*) => {{
        use std::fmt::Write as _;
        let _ = write!($w.out, $($arg)*);
    }};
}

pub mod format;
mod writer;

mod control;
mod functions;
mod joints;
mod lines;
mod loads;
mod springs;
mod structure;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

pub use writer::RecordError;
use writer::SolverWriter;

use crate::config::EmitOptions;
use crate::model::Model;
use crate::validation::{ValidationReport, validate};

/// Errors from writing a solver input file.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{}", .0.summary())]
    Validation(ValidationReport),
    #[error("A total of {} errors were found.", .0.len())]
    Records(Vec<RecordError>),
    #[error("failed to write solver input file: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts reported after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitSummary {
    pub records: usize,
    pub bytes: usize,
}

/// Validate `model` and render the complete solver input text.
pub fn emit_to_string(model: &mut Model, options: &EmitOptions) -> Result<String, CodecError> {
    render(model, options).map(|(text, _)| text)
}

fn render(model: &mut Model, options: &EmitOptions) -> Result<(String, usize), CodecError> {
    let report = validate(model);
    if !report.is_ok() {
        return Err(CodecError::Validation(report));
    }
    let model: &Model = model;
    let mut w = SolverWriter::new(model, options);
    write_all(&mut w);
    if !w.errors.is_empty() {
        return Err(CodecError::Records(w.errors));
    }
    debug!(records = w.records, bytes = w.out.len(), "solver input rendered");
    Ok((w.out, w.records))
}

/// Write the solver input file for `model` to `path`.
///
/// The text goes to `path` plus [`EmitOptions::tmp_suffix`] first and is
/// renamed over `path` once complete. On any failure no file is left at
/// either name.
pub fn emit(
    model: &mut Model,
    options: &EmitOptions,
    path: impl AsRef<Path>,
) -> Result<EmitSummary, CodecError> {
    let path = path.as_ref();
    let tmp = tmp_path(path, &options.tmp_suffix);
    let (text, records) = match render(model, options) {
        Ok(rendered) => rendered,
        Err(err) => {
            discard(&tmp);
            return Err(err);
        }
    };

    let written = std::fs::write(&tmp, text.as_bytes()).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(err) = written {
        discard(&tmp);
        return Err(err.into());
    }

    let summary = EmitSummary {
        records,
        bytes: text.len(),
    };
    info!(
        path = %path.display(),
        records = summary.records,
        bytes = summary.bytes,
        "solver input file written"
    );
    Ok(summary)
}

fn tmp_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(if suffix.is_empty() { ".tmp" } else { suffix });
    PathBuf::from(name)
}

fn discard(tmp: &Path) {
    if tmp.exists() {
        if let Err(err) = std::fs::remove_file(tmp) {
            warn!(path = %tmp.display(), %err, "could not remove temporary solver file");
        }
    }
}

/// Every record group, in the order the solver expects them.
fn write_all(w: &mut SolverWriter<'_>) {
    structure::write_heading(w);
    structure::write_environment(w);
    structure::write_triads(w);
    structure::write_parts(w);
    structure::write_beams(w);
    structure::write_user_elements(w);
    structure::write_tires(w);
    structure::write_roads(w);

    springs::write_spring_bases(w);
    springs::write_axial_spring_elements(w);
    springs::write_dampers(w);
    joints::write_joints(w);

    lines::write_line_masters(w);
    lines::write_higher_pairs(w);
    lines::write_generic_objects(w);
    lines::write_beam_properties(w);
    structure::write_turbine(w);

    loads::write_loads(w);
    loads::write_dof_loads(w);
    loads::write_motions(w);
    structure::write_masses(w);

    control::write_control_system(w);
    functions::write_sensors(w);
    functions::write_engines(w);
    functions::write_functions(w);
    functions::write_frictions(w);
    springs::write_spring_chars(w);
    structure::write_rosettes(w);
}
