//! File-system helpers used by the result task tree and the model file
//! writer.
//!
//! Listing returns `io::Result`; the mutating helpers report success as a
//! `bool` and log the failure, so callers can count problems and carry on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Whether `file` has one of `extensions` (case-insensitive). An empty
/// list matches everything.
pub fn has_extension(file: &Path, extensions: &[&str]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    file.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

fn sorted_entries(dir: &Path, want_dirs: bool) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() == want_dirs {
            found.push(entry.path());
        }
    }
    found.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    Ok(found)
}

/// Regular files directly in `dir` with one of `extensions`, sorted by
/// name. Hidden files are skipped.
pub fn list_files(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir, false)?
        .into_iter()
        .filter(|p| has_extension(p, extensions))
        .collect())
}

/// All regular files below `dir`, subdirectories first.
pub fn list_files_recursive(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for sub in list_dirs(dir)? {
        found.extend(list_files_recursive(&sub)?);
    }
    found.extend(list_files(dir, &[])?);
    Ok(found)
}

/// Subdirectories of `dir`, sorted by name.
pub fn list_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    sorted_entries(dir, true)
}

pub fn delete_file(file: &Path) -> bool {
    match fs::remove_file(file) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %file.display(), %err, "could not delete file");
            false
        }
    }
}

/// Rename `from` to `to`, replacing an existing `to`.
pub fn rename_file(from: &Path, to: &Path) -> bool {
    if to.is_file() {
        delete_file(to);
    }
    match fs::rename(from, to) {
        Ok(()) => true,
        Err(err) => {
            warn!(from = %from.display(), to = %to.display(), %err, "could not rename file");
            false
        }
    }
}

/// Copy `from` to `to`. An incomplete copy is removed.
pub fn copy_file(from: &Path, to: &Path) -> bool {
    match fs::copy(from, to) {
        Ok(_) => true,
        Err(err) => {
            warn!(from = %from.display(), to = %to.display(), %err, "could not copy file");
            if to.exists() {
                let _ = fs::remove_file(to);
            }
            false
        }
    }
}

/// Whether `dir` exists as a directory, creating it (one level) when
/// `create` is set. An empty path means the working directory.
pub fn verify_directory(dir: &Path, create: bool) -> bool {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return true;
    }
    if !create || dir.exists() {
        return false;
    }
    match fs::create_dir(dir) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %dir.display(), %err, "could not create directory");
            false
        }
    }
}

/// Remove `dir` and its subdirectories. Files are deleted only with
/// `remove_files`; otherwise any file left in the tree makes the removal
/// fail. Returns the number of deleted files, or the number of entries
/// that could not be removed.
pub fn remove_dir(dir: &Path, remove_files: bool) -> Result<usize, usize> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Err(1);
    };
    let mut deleted = 0;
    let mut failed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            match remove_dir(&path, remove_files) {
                Ok(n) => deleted += n,
                Err(n) => failed += n,
            }
        } else if remove_files && delete_file(&path) {
            deleted += 1;
        } else {
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(failed);
    }
    match fs::remove_dir(dir) {
        Ok(()) => Ok(deleted),
        Err(err) => {
            warn!(path = %dir.display(), %err, "could not delete directory");
            Err(1)
        }
    }
}

/// One past the highest `_<n>` suffix among the subdirectories of `dir`
/// whose names start with `base`, or 1 when there are none.
pub fn next_dir_increment(dir: &Path, base: &str) -> u32 {
    let Ok(dirs) = list_dirs(dir) else {
        return 1;
    };
    dirs.iter()
        .filter_map(|d| d.file_name()?.to_str().map(str::to_owned))
        .filter(|name| name.starts_with(base))
        .filter_map(|name| {
            let (_, suffix) = name.rsplit_once('_')?;
            suffix.parse::<u32>().ok()
        })
        .fold(1, |next, ver| next.max(ver + 1))
}
