// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for simtest-runner.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use walkdir::WalkDir;

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "artifact" if `count` is 1, otherwise "artifacts".
    pub fn artifacts_str(count: usize) -> &'static str {
        if count == 1 { "artifact" } else { "artifacts" }
    }
}

/// Returns all files under `dir` as paths relative to `dir`, sorted.
///
/// Symbolic links are followed, so a linked artifact counts as a file. A missing `dir` is treated
/// as empty.
pub(crate) fn relative_files(dir: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = utf8_path(entry.path())?;
        // strip_prefix can't fail since WalkDir yields paths under dir.
        if let Ok(relative) = path.strip_prefix(dir) {
            files.push(relative.to_owned());
        }
    }
    Ok(files)
}

/// Returns true if `dir` contains at least one file at any depth.
pub(crate) fn has_any_file(dir: &Utf8Path) -> bool {
    dir.is_dir()
        && WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| entry.file_type().is_file())
}

/// Copies the tree at `src` into `dst`, creating `dst` if necessary.
pub(crate) fn copy_tree(src: &Utf8Path, dst: &Utf8Path) -> Result<(), cp_r::Error> {
    let stats = cp_r::CopyOptions::new().copy_tree(src.as_std_path(), dst.as_std_path())?;
    tracing::debug!(
        %src,
        %dst,
        files = stats.files,
        dirs = stats.dirs,
        "copied tree"
    );
    Ok(())
}

pub(crate) fn utf8_path(path: &std::path::Path) -> io::Result<&Utf8Path> {
    Utf8Path::from_path(path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path `{}` is not valid UTF-8", path.display()),
        )
    })
}

/// Resolves a tool program against `base`.
///
/// Bare program names are left alone so they're looked up in `PATH`. Relative paths with a
/// separator are joined onto `base`.
pub(crate) fn resolve_program(base: &Utf8Path, program: &str) -> String {
    let path = Utf8Path::new(program);
    if path.is_absolute() || path.components().count() <= 1 {
        program.to_owned()
    } else {
        base.join(path).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn relative_files_sorted_and_nested() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::write(dir.path().join("b/c/z.nc"), "z").unwrap();
        std::fs::write(dir.path().join("a.nc"), "a").unwrap();
        std::fs::write(dir.path().join("b/y.nc"), "y").unwrap();

        let files = relative_files(dir.path()).expect("listed files");
        assert_eq!(
            files,
            vec![
                Utf8PathBuf::from("a.nc"),
                Utf8PathBuf::from("b/c/z.nc"),
                Utf8PathBuf::from("b/y.nc"),
            ]
        );
    }

    #[test]
    fn missing_dir_is_empty() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let missing = dir.path().join("missing");
        assert_eq!(relative_files(&missing).unwrap(), Vec::<Utf8PathBuf>::new());
        assert!(!has_any_file(&missing));
    }

    #[test]
    fn empty_tree_has_no_files() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        std::fs::create_dir_all(dir.path().join("x/y")).unwrap();
        assert!(!has_any_file(dir.path()));
        std::fs::write(dir.path().join("x/y/out.nc"), "").unwrap();
        assert!(has_any_file(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_artifacts_are_files() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let store = dir.path().join("store");
        std::fs::create_dir_all(store.join("nested")).unwrap();
        std::fs::write(store.join("big.nc"), "big").unwrap();
        std::fs::write(store.join("nested/deep.nc"), "deep").unwrap();

        let known_good = dir.path().join("knowngood");
        std::fs::create_dir(&known_good).unwrap();
        std::os::unix::fs::symlink(store.join("big.nc"), known_good.join("a.nc")).unwrap();
        std::os::unix::fs::symlink(store.join("nested"), known_good.join("linked")).unwrap();

        assert!(has_any_file(&known_good));
        assert_eq!(
            relative_files(&known_good).expect("listed files"),
            vec![
                Utf8PathBuf::from("a.nc"),
                Utf8PathBuf::from("linked/deep.nc"),
            ]
        );
    }

    #[test_case("./new-job", "/sim/./new-job" ; "dot relative")]
    #[test_case("build/nccompare.exe", "/sim/build/nccompare.exe" ; "nested relative")]
    #[test_case("nccompare", "nccompare" ; "bare name")]
    #[test_case("/usr/bin/cmp", "/usr/bin/cmp" ; "absolute")]
    fn resolve_program_cases(program: &str, expected: &str) {
        assert_eq!(resolve_program(Utf8Path::new("/sim"), program), expected);
    }
}
