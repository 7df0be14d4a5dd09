//! Filesystem helpers for the CLI, built on `cap-std` and `camino`.
//!
//! Every operation resolves an ambient directory handle for the parent of the
//! target and works relative to it, so absolute and relative paths take the
//! same route.
#![forbid(unsafe_code)]

use std::io::{self, Read};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Read a UTF-8 text file into memory.
///
/// # Errors
/// Returns the underlying IO error when the file cannot be opened or is not
/// valid UTF-8.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = parent_and_name(path)?;
    let mut file = dir.open(name)?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(text)
}

/// Whether `path` names an existing regular file.
///
/// # Errors
/// Returns [`io::ErrorKind::NotFound`] when the path or its parent does not
/// exist, and other IO errors when it cannot be inspected.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = parent_and_name(path)?;
    Ok(dir.metadata(name)?.is_file())
}

/// Create every missing directory above `path`.
///
/// # Errors
/// Returns the underlying IO error when a directory cannot be created.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) else {
        return Ok(());
    };
    let (root, relative) = split_root(parent);
    if relative.as_str().is_empty() {
        return Ok(());
    }
    Dir::open_ambient_dir(root, ambient_authority())?.create_dir_all(relative)
}

fn parent_and_name(path: &Utf8Path) -> io::Result<(Dir, &str)> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Split `path` into the root it hangs from (a drive or `/`, or `.` for
/// relative paths) and the remainder.
fn split_root(path: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let mut root = Utf8PathBuf::new();
    let mut relative = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir => root.push(component),
            other => relative.push(other),
        }
    }
    if root.as_str().is_empty() {
        root.push(".");
    }
    (root, relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    #[rstest]
    fn nested_parents_are_created() {
        let dir = TempDir::new().expect("tempdir");
        let target = utf8_root(&dir).join("a/b/c/pois.db");
        ensure_parent_dir(&target).expect("create parents");
        assert!(target.parent().expect("parent").is_dir());
    }

    #[rstest]
    #[case("pois.db")]
    #[case("/")]
    fn paths_without_a_creatable_parent_are_left_alone(#[case] path: &str) {
        ensure_parent_dir(Utf8Path::new(path)).expect("nothing to create");
    }

    #[rstest]
    fn files_and_directories_are_told_apart() {
        let dir = TempDir::new().expect("tempdir");
        let root = utf8_root(&dir);
        let file = root.join("pois.json");
        fs::write(&file, "[]").expect("write file");
        assert!(file_is_file(&file).expect("inspect file"));
        fs::create_dir(root.join("nested")).expect("mkdir");
        assert!(!file_is_file(&root.join("nested")).expect("inspect dir"));
        let missing = file_is_file(&root.join("missing.json")).expect_err("missing file");
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[rstest]
    fn text_files_are_read_whole() {
        let dir = TempDir::new().expect("tempdir");
        let file = utf8_root(&dir).join("scoring.json");
        fs::write(&file, "{\"factors\":[]}").expect("write file");
        assert_eq!(read_to_string(&file).expect("read"), "{\"factors\":[]}");
    }

    #[rstest]
    fn roots_split_from_relative_remainders() {
        let (root, relative) = split_root(Utf8Path::new("/var/lib/vicinity"));
        assert_eq!(root, Utf8PathBuf::from("/"));
        assert_eq!(relative, Utf8PathBuf::from("var/lib/vicinity"));
        let (cwd, rest) = split_root(Utf8Path::new("data/cache"));
        assert_eq!(cwd, Utf8PathBuf::from("."));
        assert_eq!(rest, Utf8PathBuf::from("data/cache"));
    }
}
