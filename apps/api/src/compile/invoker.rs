//! Compiler Invoker — writes the source and runs the LaTeX binary against it.
//!
//! The command is always an argument vector; nothing goes through a shell, and
//! every path handed to the compiler is derived from the job token.
//! The exit status is recorded but never decides success; see `resolver`.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::compile::job::{CompilationJob, JobState};
use crate::compile::CompilerConfig;
use crate::letter::models::RenderedSource;

/// What the compiler process left behind on stdout/stderr.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// The compiler never ran to completion.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compiler did not finish within {}s and was killed", .0.as_secs())]
    TimedOut(Duration),
}

/// Writes the rendered source to `<token>.tex` inside the job's scratch directory.
pub async fn write_source(
    job: &mut CompilationJob,
    source: &RenderedSource,
) -> std::io::Result<()> {
    tokio::fs::write(job.source_path(), source.as_str()).await?;
    job.mark(JobState::SourceWritten);
    Ok(())
}

/// Argument vector for one job: leading args, batch-mode flags, pinned output
/// directory, then the source path.
pub fn compiler_args(config: &CompilerConfig, job: &CompilationJob) -> Vec<OsString> {
    let mut output_dir = OsString::from("-output-directory=");
    output_dir.push(job.scratch_dir());

    let mut args: Vec<OsString> = config.leading_args.iter().map(OsString::from).collect();
    args.extend([
        OsString::from("-interaction=nonstopmode"),
        OsString::from("-halt-on-error"),
        OsString::from("-no-shell-escape"),
        output_dir,
    ]);
    args.push(job.source_path().into_os_string());
    args
}

/// Runs the compiler and waits for it, at most `config.timeout`.
///
/// On timeout the pending future is dropped, which kills the child.
pub async fn invoke(
    config: &CompilerConfig,
    job: &mut CompilationJob,
) -> Result<InvocationOutput, InvocationError> {
    let mut cmd = Command::new(&config.program);
    cmd.args(compiler_args(config, job))
        .current_dir(job.scratch_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Keep the compiler out of the server's process group so terminal signals
    // aimed at the server do not reach it.
    #[cfg(unix)]
    cmd.process_group(0);

    debug!("Invoking {} for job {}", config.program.display(), job.token());
    let started = Instant::now();
    let result = tokio::time::timeout(config.timeout, cmd.output()).await;
    job.mark(JobState::Invoked);

    match result {
        Ok(Ok(output)) => {
            let elapsed = started.elapsed();
            let exit_code = output.status.code();
            info!(
                token = %job.token(),
                exit_code = exit_code.unwrap_or(-1),
                elapsed_ms = elapsed.as_millis() as u64,
                "Compiler finished"
            );
            Ok(InvocationOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed,
            })
        }
        Ok(Err(source)) => {
            warn!(
                token = %job.token(),
                error = %source,
                "Failed to start compiler {}",
                config.program.display()
            );
            Err(InvocationError::Spawn {
                program: config.program.display().to_string(),
                source,
            })
        }
        Err(_) => {
            warn!(
                token = %job.token(),
                timeout_secs = config.timeout.as_secs(),
                "Compiler timed out; killed"
            );
            Err(InvocationError::TimedOut(config.timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::compile::job::JobToken;

    fn config(dir: &TempDir) -> CompilerConfig {
        CompilerConfig {
            program: PathBuf::from("pdflatex"),
            leading_args: vec![],
            scratch_dir: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
            excerpt_limit: 500,
        }
    }

    #[test]
    fn test_args_are_batch_mode_with_pinned_output_dir() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut job = CompilationJob::new(dir.path(), JobToken::generate("acme"));
        let args = compiler_args(&config, &job);

        let expected_dir = format!("-output-directory={}", dir.path().display());
        assert_eq!(args[0], "-interaction=nonstopmode");
        assert!(args.contains(&OsString::from("-halt-on-error")));
        assert!(args.contains(&OsString::from("-no-shell-escape")));
        assert!(args.contains(&OsString::from(expected_dir)));
        assert_eq!(args.last(), Some(&job.source_path().into_os_string()));
        job.cleanup();
    }

    #[test]
    fn test_leading_args_come_first() {
        let dir = TempDir::new().unwrap();
        let config = CompilerConfig {
            leading_args: vec!["-pdf".to_string()],
            ..config(&dir)
        };
        let mut job = CompilationJob::new(dir.path(), JobToken::generate("acme"));
        let args = compiler_args(&config, &job);
        assert_eq!(args[0], "-pdf");
        assert_eq!(args[1], "-interaction=nonstopmode");
        job.cleanup();
    }

    #[tokio::test]
    async fn test_write_source_creates_tex_file() {
        let dir = TempDir::new().unwrap();
        let mut job = CompilationJob::new(dir.path(), JobToken::generate("acme"));
        let source = RenderedSource::new("\\begin{document}x\\end{document}".to_string());

        write_source(&mut job, &source).await.unwrap();

        assert_eq!(job.state(), JobState::SourceWritten);
        let written = std::fs::read_to_string(job.source_path()).unwrap();
        assert_eq!(written, source.as_str());
        job.cleanup();
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let config = CompilerConfig {
            program: dir.path().join("no-such-latex"),
            ..config(&dir)
        };
        let mut job = CompilationJob::new(dir.path(), JobToken::generate("acme"));

        let err = invoke(&config, &mut job).await.unwrap_err();
        assert!(matches!(err, InvocationError::Spawn { .. }), "got {err:?}");
        assert_eq!(job.state(), JobState::Invoked);
        job.cleanup();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_rejected() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake.sh");
        std::fs::write(&script, "echo out-line\necho err-line >&2\nexit 3\n").unwrap();
        let config = CompilerConfig {
            program: PathBuf::from("sh"),
            leading_args: vec![script.display().to_string()],
            ..config(&dir)
        };
        let mut job = CompilationJob::new(dir.path(), JobToken::generate("acme"));

        let output = invoke(&config, &mut job).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(output.stdout.contains("out-line"));
        assert!(output.stderr.contains("err-line"));
        job.cleanup();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_compiler_times_out() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "exec sleep 30\n").unwrap();
        let config = CompilerConfig {
            program: PathBuf::from("sh"),
            leading_args: vec![script.display().to_string()],
            timeout: Duration::from_millis(200),
            ..config(&dir)
        };
        let mut job = CompilationJob::new(dir.path(), JobToken::generate("acme"));

        let started = Instant::now();
        let err = invoke(&config, &mut job).await.unwrap_err();
        assert!(matches!(err, InvocationError::TimedOut(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
        job.cleanup();
    }
}
