// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-invocation batch directory and its shared log.

use crate::{catalog::TestName, errors::BatchDirError};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, TimeZone};
use std::{
    fmt,
    fs::{self, File},
    io::{self, LineWriter, Write},
};

/// A directory holding the jobs, log and summary for one batch of tests.
///
/// Named `test-YYYYMMDD-HHMMSS` after the local start time, under the jobs root.
#[derive(Clone, Debug)]
pub struct BatchDir {
    path: Utf8PathBuf,
}

impl BatchDir {
    /// The shared log that receives progress lines and all tool output.
    pub const LOG_FILE: &'static str = "test.log";

    /// The persisted summary.
    pub const SUMMARY_FILE: &'static str = "summary.txt";

    /// Returns the directory name for a batch started at `time`.
    pub fn label<Tz: TimeZone>(time: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        format!("test-{}", time.format("%Y%m%d-%H%M%S"))
    }

    /// Creates the batch directory for the current local time.
    pub fn create_now(jobs_dir: &Utf8Path) -> Result<Self, BatchDirError> {
        Self::create(jobs_dir, &Local::now())
    }

    /// Creates the batch directory for a batch started at `time`.
    ///
    /// The jobs root is created if necessary, but the batch directory itself must not already
    /// exist.
    pub fn create<Tz: TimeZone>(
        jobs_dir: &Utf8Path,
        time: &DateTime<Tz>,
    ) -> Result<Self, BatchDirError>
    where
        Tz::Offset: fmt::Display,
    {
        let path = jobs_dir.join(Self::label(time));
        fs::create_dir_all(jobs_dir)
            .and_then(|()| fs::create_dir(&path))
            .map_err(|err| BatchDirError::Create {
                path: path.clone(),
                err,
            })?;
        tracing::info!("batch directory: {path}");
        Ok(Self { path })
    }

    /// Returns the path to the batch directory.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the job workspace for a test.
    pub fn job_dir(&self, test: &TestName) -> Utf8PathBuf {
        self.path.join(test.as_path())
    }

    /// Returns the path to the shared log.
    pub fn log_path(&self) -> Utf8PathBuf {
        self.path.join(Self::LOG_FILE)
    }

    /// Returns the path to the summary.
    pub fn summary_path(&self) -> Utf8PathBuf {
        self.path.join(Self::SUMMARY_FILE)
    }

    /// Opens the shared log for appending.
    pub fn open_log(&self) -> Result<BatchLog, BatchDirError> {
        let path = self.log_path();
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| BatchDirError::OpenLog {
                path: path.clone(),
                err,
            })?;
        Ok(BatchLog {
            path,
            writer: LineWriter::new(file),
        })
    }
}

/// The batch's shared log. There is exactly one writer per batch.
#[derive(Debug)]
pub struct BatchLog {
    path: Utf8PathBuf,
    writer: LineWriter<File>,
}

impl BatchLog {
    /// Returns the path to the log.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns a handle to the log file for a tool to write its output into directly.
    ///
    /// Anything buffered is flushed first, so the tool's output lands after every line written
    /// so far. The file is opened in append mode, which the handle shares.
    pub fn tool_sink(&mut self) -> io::Result<File> {
        self.writer.flush()?;
        self.writer.get_ref().try_clone()
    }
}

impl Write for BatchLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use chrono::{FixedOffset, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn label_uses_local_fields() {
        let time = FixedOffset::east_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .unwrap();
        assert_eq!(BatchDir::label(&time), "test-20240309-070501");
    }

    #[test]
    fn create_is_not_reused() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let jobs_dir = dir.path().join("jobs");
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let batch = BatchDir::create(&jobs_dir, &time).expect("created batch dir");
        assert_eq!(batch.path(), jobs_dir.join("test-20240102-030405"));
        assert_eq!(
            batch.job_dir(&TestName::new("group/leaf").unwrap()),
            batch.path().join("group/leaf")
        );

        let err = BatchDir::create(&jobs_dir, &time).expect_err("existing dir is not reused");
        match err {
            BatchDirError::Create { err, .. } => {
                assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tool_sink_writes_after_buffered_progress() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let batch = BatchDir::create(dir.path(), &time).unwrap();

        let mut log = batch.open_log().expect("opened log");
        writeln!(log, "Running test \"base\"").unwrap();
        // A partial line sits in the line buffer until the sink is handed out.
        write!(log, "  Building and running job...").unwrap();
        let mut sink = log.tool_sink().expect("cloned log file");
        sink.write_all(b"\nstep 1\nstep 2\n").unwrap();
        drop(sink);
        writeln!(log, "  Checking results...").unwrap();
        drop(log);

        assert_eq!(
            fs::read_to_string(batch.log_path()).unwrap(),
            "Running test \"base\"\n  Building and running job...\nstep 1\nstep 2\n  Checking results...\n"
        );
    }
}
