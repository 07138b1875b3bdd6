//! Compilation jobs — collision-safe scratch naming and guaranteed cleanup.
//!
//! Every job addresses its files through a [`JobToken`] made of a millisecond
//! timestamp plus a random UUID, so concurrent requests can share one scratch
//! directory without any locking.
//!
//! # Lifecycle
//! `Created → SourceWritten → Invoked → {Succeeded, Failed} → Cleaned`
//!
//! [`CompilationJob::cleanup`] is idempotent and also runs from `Drop`, so a
//! job that is abandoned mid-flight (timeout, cancelled request, panic) still
//! ends up `Cleaned`.

use std::fmt;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

pub const SOURCE_EXT: &str = "tex";
pub const ARTIFACT_EXT: &str = "pdf";
pub const LOG_EXT: &str = "log";

/// Files pdflatex and friends may leave next to the source.
pub const AUX_EXTS: [&str; 9] = [
    "aux",
    "log",
    "out",
    "toc",
    "fls",
    "fdb_latexmk",
    "synctex.gz",
    "nav",
    "snm",
];

const DEFAULT_BASE: &str = "letter";
const MAX_BASE_LEN: usize = 24;

/// Unique name for one job's scratch files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobToken(String);

impl JobToken {
    /// Token for `base` stamped with the current time.
    pub fn generate(base: &str) -> Self {
        Self::generate_at(base, Utc::now())
    }

    /// Token for `base` stamped with `now`. The random suffix keeps tokens
    /// distinct even when `now` collides.
    pub fn generate_at(base: &str, now: DateTime<Utc>) -> Self {
        Self(format!(
            "{}_{}_{}",
            sanitize_base(base),
            now.format("%Y%m%d%H%M%S%3f"),
            Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduces caller-supplied text to `[a-z0-9-]` so it is safe inside a file name.
fn sanitize_base(base: &str) -> String {
    let mut cleaned = String::with_capacity(MAX_BASE_LEN);
    for c in base.chars() {
        if cleaned.len() >= MAX_BASE_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            cleaned.push(c.to_ascii_lowercase());
        } else if !cleaned.ends_with('-') && !cleaned.is_empty() {
            cleaned.push('-');
        }
    }
    let cleaned = cleaned.trim_end_matches('-');
    if cleaned.is_empty() {
        DEFAULT_BASE.to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    SourceWritten,
    Invoked,
    Succeeded,
    Failed,
    Cleaned,
}

/// One compilation attempt and the scratch files it owns.
#[derive(Debug)]
pub struct CompilationJob {
    token: JobToken,
    scratch_dir: PathBuf,
    state: JobState,
}

impl CompilationJob {
    pub fn new(scratch_dir: &Path, token: JobToken) -> Self {
        Self {
            token,
            scratch_dir: scratch_dir.to_path_buf(),
            state: JobState::Created,
        }
    }

    pub fn token(&self) -> &JobToken {
        &self.token
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn path_with_ext(&self, ext: &str) -> PathBuf {
        self.scratch_dir.join(format!("{}.{ext}", self.token))
    }

    pub fn source_path(&self) -> PathBuf {
        self.path_with_ext(SOURCE_EXT)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.path_with_ext(ARTIFACT_EXT)
    }

    pub fn log_path(&self) -> PathBuf {
        self.path_with_ext(LOG_EXT)
    }

    /// Every path the job may have produced: source, artifact, then auxiliaries.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        [SOURCE_EXT, ARTIFACT_EXT]
            .into_iter()
            .chain(AUX_EXTS)
            .map(|ext| self.path_with_ext(ext))
            .collect()
    }

    pub(crate) fn mark(&mut self, next: JobState) {
        debug!("Job {}: {:?} -> {:?}", self.token, self.state, next);
        self.state = next;
    }

    /// Removes every file the job may have produced.
    ///
    /// Each removal is attempted independently; a missing file is fine and any
    /// other failure is logged and skipped. Only the first call does work.
    /// Returns the number of files actually removed. Blocking; async callers
    /// use [`CompilationJob::cleanup_async`].
    pub fn cleanup(&mut self) -> usize {
        if self.state == JobState::Cleaned {
            return 0;
        }

        let mut removed = 0;
        for path in self.owned_paths() {
            if self.removal_counts(&path, std::fs::remove_file(&path)) {
                removed += 1;
            }
        }
        self.finish_cleanup(removed)
    }

    /// Same as [`CompilationJob::cleanup`], without blocking the runtime.
    pub async fn cleanup_async(&mut self) -> usize {
        if self.state == JobState::Cleaned {
            return 0;
        }

        let mut removed = 0;
        for path in self.owned_paths() {
            if self.removal_counts(&path, tokio::fs::remove_file(&path).await) {
                removed += 1;
            }
        }
        self.finish_cleanup(removed)
    }

    fn removal_counts(&self, path: &Path, result: io::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(
                    token = %self.token,
                    path = %path.display(),
                    error = %e,
                    "Failed to remove scratch file"
                );
                false
            }
        }
    }

    fn finish_cleanup(&mut self, removed: usize) -> usize {
        debug!("Job {} cleaned up ({removed} files removed)", self.token);
        self.state = JobState::Cleaned;
        removed
    }
}

impl Drop for CompilationJob {
    fn drop(&mut self) {
        if self.state != JobState::Cleaned {
            warn!(
                "Job {} dropped in state {:?}; cleaning up",
                self.token, self.state
            );
            self.cleanup();
        }
    }
}
