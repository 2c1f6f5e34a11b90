//! Result task tree: the in-memory record of solver output files.
//!
//! Each simulation run writes into a versioned task directory
//! `<name>_<nnnn>` which may hold further task directories. A
//! [`ResultTask`] mirrors one such directory: the file names it holds and
//! its sub-tasks by name. [`ResultTask::sync_from_disk`] rebuilds the tree
//! from what is actually on disk after a run.
//!
//! The tree is stored in the model file in a bracketed text form:
//!
//! ```text
//! <"response",3,"model.fsi",
//!     <"timehist_prim",1,"th_p_1.frs">>
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{MAIN_SEPARATOR, Path};

use tracing::{debug, warn};

use crate::fs;

/// Extensions of the files picked up by [`ResultTask::sync_from_disk`].
pub const RESULT_EXTENSIONS: [&str; 17] = [
    "fao", "fco", "fop", "fmm", "ftl", "fsi", "fmx", "fsm", "frs", "res", "asc", "dac", "fpp",
    "fef", "ipt", "wnd", "elm",
];

/// Highest task version that fits the four-digit directory suffix.
pub const MAX_TASK_VERSION: i32 = 9999;

/// A task with this name is not yet named and owns no directory.
const UNNAMED: &str = "noname";

/// One versioned task directory.
#[derive(Debug, Clone, Default)]
pub struct ResultTask {
    /// Directory holding this task's directory.
    path: String,
    name: String,
    version: u16,
    files: BTreeSet<String>,
    sub_tasks: BTreeMap<String, ResultTask>,
}

/// Equality ignores the path, which is derived and never stored.
impl PartialEq for ResultTask {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.version != other.version {
            return false;
        }
        if self.is_empty(false) && other.is_empty(false) {
            return true;
        }
        self.files == other.files && self.sub_tasks == other.sub_tasks
    }
}

impl ResultTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// Set the task version. A value outside `0..=9999` resets it to 1 and
    /// returns false.
    pub fn set_version(&mut self, version: i32) -> bool {
        match u16::try_from(version) {
            Ok(v) if version <= MAX_TASK_VERSION => {
                self.version = v;
                true
            }
            _ => {
                warn!(version, "task version is out of valid range [0,9999], resetting to 1");
                self.version = 1;
                false
            }
        }
    }

    pub fn increment_version(&mut self) -> bool {
        self.clear();
        self.set_version(i32::from(self.version) + 1)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Move this task (and every sub-task) under `path`.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
        let full = self.dir_name(true, false);
        for sub in self.sub_tasks.values_mut() {
            sub.set_path(full.clone());
        }
    }

    /// `<name>_<nnnn>`, optionally prefixed by the path. Empty for an
    /// unnamed task; with `check_unnamed` also for the placeholder name.
    pub fn dir_name(&self, full_path: bool, check_unnamed: bool) -> String {
        if self.name.is_empty() || (check_unnamed && self.name == UNNAMED) {
            return String::new();
        }
        let dir = format!("{}_{:04}", self.name, self.version);
        if full_path { join(&self.path, &dir) } else { dir }
    }

    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    pub fn sub_tasks(&self) -> impl Iterator<Item = &ResultTask> {
        self.sub_tasks.values()
    }

    pub fn is_sub_task(&self, name: &str) -> bool {
        self.sub_tasks.contains_key(name)
    }

    pub fn sub_task(&self, name: &str) -> Option<&ResultTask> {
        self.sub_tasks.get(name)
    }

    /// Sub-task `name`, required to have `version` when one is given.
    fn sub_task_versioned(&mut self, name: &str, version: Option<i32>) -> Option<&mut ResultTask> {
        if name.is_empty() || version.is_some_and(|v| v > MAX_TASK_VERSION) {
            return None;
        }
        let sub = self.sub_tasks.get_mut(name)?;
        match version {
            Some(v) if v >= 1 && v != i32::from(sub.version) => None,
            _ => Some(sub),
        }
    }

    /// Find or create sub-task `name`, a new one at `version`. Unnamed
    /// tasks get no sub-tasks.
    fn add_sub_task(&mut self, name: &str, version: i32) -> Option<&mut ResultTask> {
        let dir = self.dir_name(true, true);
        if dir.is_empty() {
            return None;
        }
        Some(self.sub_tasks.entry(name.to_string()).or_insert_with(|| {
            let mut task = ResultTask {
                path: dir,
                name: name.to_string(),
                ..ResultTask::default()
            };
            task.set_version(version);
            task
        }))
    }

    /// Strip everything up to and including this task's directory name.
    fn relative<'f>(&self, file: &'f str, dir: &str) -> &'f str {
        match (dir.is_empty(), file.find(dir)) {
            (false, Some(p)) => file.get(p + dir.len() + 1..).unwrap_or(""),
            _ => file,
        }
    }

    // -----------------------------------------------------------------------
    // File bookkeeping
    // -----------------------------------------------------------------------

    /// Record `file`. A path through further task directories is
    /// recorded in the matching sub-tasks, created as needed. Returns
    /// false if the file was already recorded or this task is unnamed.
    pub fn add_file(&mut self, file: &str) -> bool {
        let dir = self.dir_name(false, true);
        if dir.is_empty() {
            return false;
        }
        let rest = self.relative(file, &dir);
        let Some((head, tail)) = split_first(rest) else {
            return self.files.insert(rest.to_string());
        };
        let (name, version) = split_task_dir_name(head).unwrap_or_default();
        match self.add_sub_task(&name, version) {
            Some(sub) => sub.add_file(tail),
            None => false,
        }
    }

    pub fn add_files<'f>(&mut self, files: impl IntoIterator<Item = &'f str>) {
        for file in files {
            self.add_file(file);
        }
    }

    pub fn remove_file(&mut self, file: &str) -> bool {
        let dir = self.dir_name(false, false);
        let rest = self.relative(file, &dir);
        let Some((head, tail)) = split_first(rest) else {
            return self.files.remove(rest);
        };
        let name = split_task_dir_name(head).map_or(String::new(), |(name, _)| name);
        match self.sub_task_versioned(&name, None) {
            Some(sub) => sub.remove_file(tail),
            None => false,
        }
    }

    pub fn remove_files<'f>(&mut self, files: impl IntoIterator<Item = &'f str>) {
        if self.is_empty(false) {
            return;
        }
        for file in files {
            if !self.remove_file(file) {
                warn!(file, "could not remove file from the result tree");
            }
        }
    }

    /// Forget the task holding `file` by bumping its version, so that the
    /// next run writes into a fresh directory.
    pub fn ignore_file(&mut self, file: &str) -> bool {
        let dir = self.dir_name(false, false);
        let rest = self.relative(file, &dir);
        let Some((head, tail)) = split_first(rest) else {
            let old = self.all_file_names("", true, true);
            let dir = self.dir_name(true, false);
            self.increment_version();
            log_ignored(&dir, &old);
            return true;
        };

        let (name, version) = split_task_dir_name(head).unwrap_or_default();
        if self.sub_task_versioned(&name, Some(version)).is_some() {
            return self
                .sub_task_versioned(&name, Some(version))
                .is_some_and(|sub| sub.ignore_file(tail));
        }

        // A sub-task of that name with a lower version is superseded.
        let Some(sub) = self.sub_task_versioned(&name, None) else {
            return false;
        };
        if i32::from(sub.version) > version {
            return false;
        }
        let old = sub.all_file_names("", true, true);
        let dir = sub.dir_name(true, false);
        sub.clear();
        sub.set_version(version + 1);
        log_ignored(&dir, &old);
        true
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.sub_tasks.clear();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether the tree holds no files. With `result_files_only`, only
    /// `res` and `frs` files count.
    pub fn is_empty(&self, result_files_only: bool) -> bool {
        if result_files_only {
            return !self.has_file_names("res", true) && !self.has_file_names("frs", true);
        }
        self.files.is_empty() && self.sub_tasks.values().all(|t| t.is_empty(false))
    }

    /// Whether any file matches the extension `filter` (all files when
    /// empty).
    pub fn has_file_names(&self, filter: &str, recursive: bool) -> bool {
        self.files.iter().any(|f| matches_filter(f, filter))
            || (recursive && self.sub_tasks.values().any(|t| t.has_file_names(filter, true)))
    }

    pub fn all_file_names(&self, filter: &str, with_path: bool, recursive: bool) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_file_names(&mut names, filter, with_path, recursive);
        names
    }

    fn collect_file_names(&self, names: &mut BTreeSet<String>, filter: &str, with_path: bool, recursive: bool) {
        let dir = if with_path { self.dir_name(true, false) } else { String::new() };
        for file in self.files.iter().filter(|f| matches_filter(f, filter)) {
            names.insert(if with_path { join(&dir, file) } else { file.clone() });
        }
        if recursive {
            for sub in self.sub_tasks.values() {
                sub.collect_file_names(names, filter, with_path, true);
            }
        }
    }

    /// All file names as one `;`-separated list.
    pub fn file_names(&self, filter: &str, with_path: bool, recursive: bool) -> String {
        self.all_file_names(filter, with_path, recursive)
            .into_iter()
            .collect::<Vec<_>>()
            .join(";")
    }

    /// `frs` result files, of the whole tree or of one named result group.
    pub fn frs_files(&self, group: &str) -> BTreeSet<String> {
        if self.is_empty(true) {
            debug!("empty result tree, no result groups present");
            return BTreeSet::new();
        }
        if group.is_empty() {
            return self.all_file_names("frs", true, true);
        }
        self.sub_task(group)
            .map(|t| t.all_file_names("frs", true, true))
            .unwrap_or_default()
    }

    pub fn all_dir_names(&self) -> BTreeSet<String> {
        let mut dirs = BTreeSet::new();
        self.collect_dir_names(&mut dirs);
        dirs
    }

    fn collect_dir_names(&self, dirs: &mut BTreeSet<String>) {
        dirs.insert(self.dir_name(true, false));
        for sub in self.sub_tasks.values() {
            sub.collect_dir_names(dirs);
        }
    }

    // -----------------------------------------------------------------------
    // Disk synchronisation
    // -----------------------------------------------------------------------

    /// Rebuild this task from the directory `dir`, which holds task
    /// `name` at `version`. Sub-directories named `<task>_<nnnn>` become
    /// sub-tasks. When two directories hold the same task, the one with
    /// the higher version wins and the files of the other are added to
    /// `obsolete`. Returns the number of files now in the tree.
    pub fn sync_from_disk(
        &mut self,
        dir: &Path,
        name: &str,
        version: i32,
        mut obsolete: Option<&mut BTreeSet<String>>,
    ) -> usize {
        self.clear();
        self.set_name(name);
        self.set_version(version);
        if dir.as_os_str().is_empty() {
            return 0;
        }
        if let Some(parent) = dir.parent() {
            self.set_path(parent.to_string_lossy());
        }

        let files = fs::list_files(dir, &RESULT_EXTENSIONS).unwrap_or_default();
        for file in &files {
            self.add_file(&file.to_string_lossy());
        }
        let mut count = files.len();

        let Ok(dirs) = fs::list_dirs(dir) else {
            return count;
        };
        for sub_dir in dirs {
            let Some((sub_name, sub_version)) = sub_dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(split_task_dir_name)
            else {
                continue;
            };
            let Some(sub) = self.add_sub_task(&sub_name, sub_version) else {
                continue;
            };
            if sub.is_empty(false) {
                count += sub.sync_from_disk(&sub_dir, &sub_name, sub_version, obsolete.as_deref_mut());
            } else if i32::from(sub.version) < sub_version {
                let old = sub.all_file_names("", true, true);
                debug!(task = %sub_name, files = old.len(), "superseded task version found on disk");
                count = count.saturating_sub(old.len());
                if let Some(set) = obsolete.as_deref_mut() {
                    set.extend(old);
                }
                count += sub.sync_from_disk(&sub_dir, &sub_name, sub_version, obsolete.as_deref_mut());
            }
        }
        count
    }

    // -----------------------------------------------------------------------
    // Text form
    // -----------------------------------------------------------------------

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for _ in 0..indent {
            f.write_str("    ")?;
        }
        write!(f, "<\"{}\",{}", self.name, self.version)?;
        for file in &self.files {
            write!(f, ",\"{file}\"")?;
        }
        for sub in self.sub_tasks.values() {
            f.write_str(",\n")?;
            sub.write_indented(f, indent + 1)?;
        }
        f.write_str(">")
    }

    /// Parse the bracketed text form. Anything before the first `<` must
    /// be whitespace; returns `None` on malformed input.
    pub fn parse(text: &str) -> Option<ResultTask> {
        let text = text.trim_start();
        if !text.starts_with('<') {
            return None;
        }
        let mut task = ResultTask::default();
        task.read_tokens(&tokenize(text)?);
        Some(task)
    }

    fn read_tokens(&mut self, tokens: &[String]) {
        if tokens.len() < 2 {
            warn!("syntax error in result status data");
            return;
        }
        self.set_name(tokens[0].clone());
        self.set_version(tokens[1].trim().parse().unwrap_or(0));
        let dir = self.dir_name(true, true);
        if tokens.len() == 2 || dir.is_empty() {
            return;
        }
        for token in &tokens[2..] {
            if token.starts_with('<') {
                let Some(sub_tokens) = tokenize(token) else {
                    continue;
                };
                let mut sub = ResultTask {
                    path: dir.clone(),
                    ..ResultTask::default()
                };
                sub.read_tokens(&sub_tokens);
                self.sub_tasks.insert(sub.name.clone(), sub);
            } else {
                self.files.insert(token.clone());
            }
        }
    }
}

impl fmt::Display for ResultTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Split `<name>_<nnnn>` into name and version.
pub fn split_task_dir_name(dir: &str) -> Option<(String, i32)> {
    let (name, digits) = dir.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((name.to_string(), digits.parse().ok()?))
}

fn split_first(path: &str) -> Option<(&str, &str)> {
    path.split_once(['/', MAIN_SEPARATOR])
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    if dir.ends_with(['/', MAIN_SEPARATOR]) {
        format!("{dir}{name}")
    } else {
        format!("{dir}{MAIN_SEPARATOR}{name}")
    }
}

fn matches_filter(file: &str, filter: &str) -> bool {
    filter.is_empty() || fs::has_extension(Path::new(file), &[filter])
}

fn log_ignored(dir: &str, files: &BTreeSet<String>) {
    if !files.is_empty() {
        warn!(dir, files = ?files, "ignoring existing files");
    }
}

/// Top-level comma-separated tokens of one `<...>` group. Quotes are
/// stripped from plain tokens; nested groups are kept whole.
fn tokenize(text: &str) -> Option<Vec<String>> {
    let inner = text.trim().strip_prefix('<')?;
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    for c in inner.chars() {
        match c {
            '"' if depth == 0 => in_quotes = !in_quotes,
            '<' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            '>' if !in_quotes && depth == 0 => {
                push_token(&mut tokens, &current);
                return Some(tokens);
            }
            '>' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            ',' if !in_quotes && depth == 0 => {
                push_token(&mut tokens, &current);
                current.clear();
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {}
            c => current.push(c),
        }
    }
    None
}

fn push_token(tokens: &mut Vec<String>, token: &str) {
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
}
