// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use indoc::indoc;
use std::{fs, os::unix::fs::PermissionsExt};

/// Configures a job by writing its parameters and a `go` script into `<jobs>/<name>`.
const NEW_JOB: &str = indoc! {r#"
    #!/bin/sh
    set -e
    t100=no
    while [ $# -gt 0 ]; do
        case "$1" in
            -c|-b|-u) shift 2 ;;
            -j) jobs="$2"; shift 2 ;;
            --t100) t100=yes; shift ;;
            *) break ;;
        esac
    done
    mkdir -p "$jobs/$1"
    printf 'run_length=%s t100=%s\n' "$2" "$t100" > "$jobs/$1/params"
    cp ./go-template "$jobs/$1/go"
    chmod +x "$jobs/$1/go"
    echo "configured $1"
"#};

/// "Runs" a job: its output is its parameters, plus a listing of any restart input.
const GO: &str = indoc! {r#"
    #!/bin/sh
    set -e
    mkdir -p output
    cp params output/result.nc
    if [ -d restart ]; then ls restart > output/restart_seen.nc; fi
    echo "ran job"
"#};

/// Compares files byte-for-byte, ignoring the tolerance arguments.
const COMPARATOR: &str = indoc! {r#"
    #!/bin/sh
    exec cmp "$6" "$7"
"#};

/// Builds the comparator on demand.
const BUILD_COMPARATOR: &str = indoc! {r#"
    #!/bin/sh
    mkdir -p build
    cp ./comparator-source build/nccompare.exe
    chmod +x build/nccompare.exe
"#};

/// A simulation root with shell-script tools.
pub(crate) struct SimRoot {
    dir: Utf8TempDir,
}

impl SimRoot {
    /// Creates a root whose comparator already exists.
    pub(crate) fn new() -> Result<Self> {
        let root = Self::without_comparator()?;
        root.write_executable("build/nccompare.exe", COMPARATOR)?;
        Ok(root)
    }

    /// Creates a root whose comparator has to be built by `./build-comparator`.
    pub(crate) fn without_comparator() -> Result<Self> {
        let root = Self {
            dir: Utf8TempDir::new()?,
        };
        root.write_executable("new-job", NEW_JOB)?;
        root.write("go-template", GO)?;
        root.write("comparator-source", COMPARATOR)?;
        root.write_executable("build-comparator", BUILD_COMPARATOR)?;
        Ok(root)
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn write(&self, path: &str, contents: &str) -> Result<()> {
        let path = self.path().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    pub(crate) fn write_executable(&self, path: &str, contents: &str) -> Result<()> {
        self.write(path, contents)?;
        let path = self.path().join(path);
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions)?;
        Ok(())
    }

    /// Adds a test with a `full_config` and the given known-good artifacts.
    pub(crate) fn add_test(
        &self,
        name: &str,
        info: &str,
        known_good: &[(&str, &str)],
    ) -> Result<()> {
        self.write(&format!("tests/{name}/test_info"), info)?;
        self.write(&format!("tests/{name}/full_config"), "full")?;
        for (artifact, contents) in known_good {
            self.write(&format!("tests/{name}/knowngood/{artifact}"), contents)?;
        }
        Ok(())
    }
}
