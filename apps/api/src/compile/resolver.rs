//! Artifact Resolver — decides the outcome from the filesystem, not the exit code.
//!
//! A job succeeded iff the compiler ran to completion and `<token>.pdf` exists
//! and is non-empty. Whatever a killed or unstartable compiler left behind is
//! discarded. Either way the job is cleaned up before this returns.

use bytes::Bytes;
use tracing::{info, warn};

use crate::compile::invoker::{InvocationError, InvocationOutput};
use crate::compile::job::{CompilationJob, JobState};
use crate::compile::{CompilationFailure, CompileError, FailureKind};

const NO_DIAGNOSTICS: &str = "compiler produced no diagnostic output";
const TRUNCATION_MARKER: &str = "\n[truncated]";
/// Excerpts never go below this, whatever the configured limit.
const MIN_EXCERPT_CHARS: usize = 64;
/// Context lines kept after each `!` error line in a TeX log.
const TEX_ERROR_CONTEXT_LINES: usize = 2;

/// Resolves a finished (or aborted) invocation into the PDF bytes or a failure.
pub async fn resolve(
    job: &mut CompilationJob,
    invocation: Result<InvocationOutput, InvocationError>,
    excerpt_limit: usize,
) -> Result<Bytes, CompileError> {
    let artifact_path = job.artifact_path();
    let artifact_len = tokio::fs::metadata(&artifact_path)
        .await
        .map(|m| m.len())
        .ok();

    if let (Ok(output), Some(len)) = (&invocation, artifact_len.filter(|len| *len > 0)) {
        let read = tokio::fs::read(&artifact_path).await;
        job.mark(JobState::Succeeded);
        job.cleanup_async().await;

        let pdf = read.map_err(|e| CompileError::resource("read compiled PDF", e))?;
        info!(
            token = %job.token(),
            artifact_bytes = len,
            exit_code = output.exit_code.unwrap_or(-1),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Compilation succeeded"
        );
        return Ok(Bytes::from(pdf));
    }

    job.mark(JobState::Failed);
    let log = tokio::fs::read(job.log_path())
        .await
        .ok()
        .map(|raw| String::from_utf8_lossy(&raw).into_owned());
    job.cleanup_async().await;

    let (kind, message) = match &invocation {
        Err(e @ InvocationError::Spawn { .. }) => (FailureKind::CompilerUnavailable, e.to_string()),
        Err(e @ InvocationError::TimedOut(_)) => (FailureKind::TimedOut, e.to_string()),
        Ok(_) if artifact_len == Some(0) => (
            FailureKind::ArtifactMissing,
            "compiler produced an empty PDF".to_string(),
        ),
        Ok(_) => (
            FailureKind::ArtifactMissing,
            "compiler did not produce a PDF".to_string(),
        ),
    };
    let diagnostic_excerpt = diagnostic_excerpt(log.as_deref(), &invocation, excerpt_limit);

    warn!(
        token = %job.token(),
        kind = ?kind,
        excerpt_chars = diagnostic_excerpt.chars().count(),
        "Compilation failed: {message}"
    );

    Err(CompileError::Failed(CompilationFailure {
        kind,
        message,
        diagnostic_excerpt,
    }))
}

/// Builds a bounded, never-empty excerpt from whatever the compiler left behind.
///
/// Preference: invocation error text, then TeX `!` error blocks from the log,
/// then the tail of stdout/stderr.
pub fn diagnostic_excerpt(
    log: Option<&str>,
    invocation: &Result<InvocationOutput, InvocationError>,
    limit: usize,
) -> String {
    let limit = limit.max(MIN_EXCERPT_CHARS);
    let mut sections: Vec<String> = Vec::new();

    if let Err(e) = invocation {
        sections.push(e.to_string());
    }

    match log.and_then(tex_error_blocks) {
        Some(errors) => sections.push(errors),
        None => {
            if let Ok(output) = invocation {
                for stream in [&output.stdout, &output.stderr] {
                    let stream = stream.trim();
                    if !stream.is_empty() {
                        sections.push(tail_chars(stream, limit).to_string());
                    }
                }
            }
        }
    }

    let text = sections.join("\n");
    if text.trim().is_empty() {
        return NO_DIAGNOSTICS.to_string();
    }
    truncate_chars(&text, limit)
}

/// Collects every `! ...` line of a TeX log plus a little context after it.
fn tex_error_blocks(log: &str) -> Option<String> {
    let lines: Vec<&str> = log.lines().collect();
    let mut picked: Vec<&str> = Vec::new();
    let mut skip_until = 0;

    for (i, line) in lines.iter().enumerate() {
        if i < skip_until || !line.starts_with('!') {
            continue;
        }
        let end = (i + 1 + TEX_ERROR_CONTEXT_LINES).min(lines.len());
        picked.extend(&lines[i..end]);
        skip_until = end;
    }

    if picked.is_empty() {
        None
    } else {
        Some(picked.join("\n"))
    }
}

/// Last `n` characters of `s`.
fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

/// Keeps `s` within `limit` characters, marking the cut.
fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let keep = limit.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
