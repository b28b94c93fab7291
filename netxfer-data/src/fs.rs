//! File access for exchange databases, transfer files and label files.
//!
//! Every helper opens a `cap-std` directory handle with ambient authority and
//! works relative to it, so the pipeline only touches the entries it names.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir, fs_utf8::File};
use std::io;

/// A file path split into the handle of its directory and its final segment.
struct Entry {
    dir: Dir,
    name: String,
}

impl Entry {
    fn locate(path: &Utf8Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
            .to_owned();
        let dir = open_dir(path.parent().unwrap_or(Utf8Path::new("")))?;
        Ok(Self { dir, name })
    }
}

fn open_dir(path: &Utf8Path) -> io::Result<Dir> {
    let path = if path.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        path
    };
    Dir::open_ambient_dir(path, ambient_authority())
}

fn absent_as<T>(result: io::Result<T>, fallback: T) -> io::Result<T> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(fallback),
        other => other,
    }
}

/// Open a label file or transfer file for reading.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<File> {
    File::open_ambient(path, ambient_authority())
}

/// Create the directories leading up to `path`.
///
/// Absolute paths are created from their root, relative ones from the
/// working directory.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
        return Ok(());
    };
    let anchor = if parent.has_root() {
        parent.ancestors().last().unwrap_or(parent)
    } else {
        Utf8Path::new(".")
    };
    let relative = parent.strip_prefix(anchor).unwrap_or(parent);
    if relative.as_str().is_empty() {
        return Ok(());
    }
    open_dir(anchor)?.create_dir_all(relative)
}

/// Whether `path` names an existing regular file. A missing entry is `false`.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let entry = Entry::locate(path)?;
    absent_as(entry.dir.metadata(&entry.name).map(|meta| meta.is_file()), false)
}

/// Delete the file at `path`, reporting whether anything was removed.
pub fn remove_file_if_exists(path: &Utf8Path) -> io::Result<bool> {
    let entry = Entry::locate(path)?;
    absent_as(entry.dir.remove_file(&entry.name).map(|()| true), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn workspace() -> TempDir {
        tempfile::tempdir().unwrap_or_else(|err| panic!("failed to create temp dir: {err}"))
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non-UTF-8 temp dir {path:?}"))
    }

    #[rstest]
    fn creates_nested_parent_directories(workspace: TempDir) {
        let target = utf8(&workspace).join("out/nested/transfer.xtf");
        ensure_parent_dir(&target).unwrap_or_else(|err| panic!("create parents: {err}"));
        assert!(utf8(&workspace).join("out/nested").is_dir());
        ensure_parent_dir(&target).unwrap_or_else(|err| panic!("existing parents: {err}"));
    }

    #[rstest]
    fn bare_file_names_need_no_parent() {
        assert!(ensure_parent_dir(Utf8Path::new("exchange.sqlite")).is_ok());
    }

    #[rstest]
    fn reports_missing_and_present_files(workspace: TempDir) {
        let target = utf8(&workspace).join("labels.json");
        assert!(matches!(file_is_file(&target), Ok(false)));
        std::fs::write(&target, "[]").unwrap_or_else(|err| panic!("write fixture: {err}"));
        assert!(matches!(file_is_file(&target), Ok(true)));
        assert!(matches!(remove_file_if_exists(&target), Ok(true)));
        assert!(matches!(remove_file_if_exists(&target), Ok(false)));
    }

    #[rstest]
    fn directories_are_not_files(workspace: TempDir) {
        let nested = utf8(&workspace).join("nested");
        std::fs::create_dir(&nested).unwrap_or_else(|err| panic!("create dir: {err}"));
        assert!(matches!(file_is_file(&nested), Ok(false)));
    }

    #[rstest]
    fn paths_without_file_names_are_rejected() {
        assert!(file_is_file(Utf8Path::new("/")).is_err());
    }
}
