// Document compilation: scratch jobs, compiler invocation, artifact resolution.
// Success is decided by the PDF on disk, never by the compiler's exit code.

pub mod invoker;
pub mod job;
pub mod resolver;

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::compile::job::{CompilationJob, JobToken};
use crate::letter::models::RenderedSource;

/// How to run the external LaTeX compiler. Injected at startup.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub program: PathBuf,
    /// Arguments placed before the standard batch-mode flags.
    pub leading_args: Vec<String>,
    /// Shared by all concurrent jobs; job tokens keep their files apart.
    pub scratch_dir: PathBuf,
    pub timeout: Duration,
    /// Upper bound on the diagnostic excerpt returned to callers, in characters.
    pub excerpt_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Compiler ran but left no usable PDF.
    ArtifactMissing,
    /// Compiler binary missing, not executable, or otherwise unstartable.
    CompilerUnavailable,
    TimedOut,
}

/// A compile that produced no usable PDF.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompilationFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Bounded, never empty.
    pub diagnostic_excerpt: String,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation failed: {0}")]
    Failed(CompilationFailure),

    #[error("scratch file error ({context}): {source}")]
    Resource {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    pub(crate) fn resource(context: &'static str, source: std::io::Error) -> Self {
        Self::Resource { context, source }
    }
}

/// Compiles rendered sources into PDFs inside a shared scratch directory.
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    config: CompilerConfig,
}

impl LatexCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Runs one full job: write source, invoke, resolve, clean up.
    ///
    /// `base_name` only flavours the scratch file names; it is sanitized and
    /// never addresses a file on its own.
    pub async fn compile(
        &self,
        source: &RenderedSource,
        base_name: &str,
    ) -> Result<Bytes, CompileError> {
        tokio::fs::create_dir_all(&self.config.scratch_dir)
            .await
            .map_err(|e| CompileError::resource("create scratch directory", e))?;

        let mut job = CompilationJob::new(&self.config.scratch_dir, JobToken::generate(base_name));

        if let Err(e) = invoker::write_source(&mut job, source).await {
            job.cleanup_async().await;
            return Err(CompileError::resource("write document source", e));
        }

        let invocation = invoker::invoke(&self.config, &mut job).await;
        resolver::resolve(&mut job, invocation, self.config.excerpt_limit).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use tempfile::TempDir;

    /// Mimics pdflatex: finds `-output-directory=` and the source path, copies
    /// the source into `<stem>.pdf`, leaves aux/log files and exits non-zero.
    const COPYING_COMPILER: &str = r#"
out=""
src=""
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) out="${arg#-output-directory=}" ;;
    -*) ;;
    *) src="$arg" ;;
  esac
done
stem=$(basename "$src" .tex)
sleep 0.1
cp "$src" "$out/$stem.pdf"
echo "aux" > "$out/$stem.aux"
echo "This is a fake log" > "$out/$stem.log"
echo "LaTeX Warning: something minor"
exit 1
"#;

    /// Prints a TeX-style error, writes a log, produces nothing, exits zero.
    const BROKEN_COMPILER: &str = r#"
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) out="${arg#-output-directory=}" ;;
    -*) ;;
    *) src="$arg" ;;
  esac
done
stem=$(basename "$src" .tex)
printf '! Undefined control sequence.\nl.7 \\oops\n' > "$out/$stem.log"
echo "! Undefined control sequence."
exit 0
"#;

    fn compiler_with_script(dir: &TempDir, script: &str) -> LatexCompiler {
        let script_path = dir.path().join("fake-latex.sh");
        std::fs::write(&script_path, script).unwrap();
        LatexCompiler::new(CompilerConfig {
            program: PathBuf::from("sh"),
            leading_args: vec![script_path.display().to_string()],
            scratch_dir: dir.path().join("scratch"),
            timeout: Duration::from_secs(10),
            excerpt_limit: 400,
        })
    }

    fn source(text: &str) -> RenderedSource {
        RenderedSource::new(format!("\\begin{{document}}{text}\\end{{document}}"))
    }

    fn scratch_entries(compiler: &LatexCompiler) -> usize {
        std::fs::read_dir(&compiler.config().scratch_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_success_despite_nonzero_exit_and_scratch_is_emptied() {
        let dir = TempDir::new().unwrap();
        let compiler = compiler_with_script(&dir, COPYING_COMPILER);

        let pdf = compiler.compile(&source("hello"), "acme").await.unwrap();

        assert_eq!(&pdf[..], source("hello").as_str().as_bytes());
        assert_eq!(scratch_entries(&compiler), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_failure_with_excerpt_and_no_source_left() {
        let dir = TempDir::new().unwrap();
        let compiler = compiler_with_script(&dir, BROKEN_COMPILER);

        let err = compiler.compile(&source("x"), "acme").await.unwrap_err();

        let CompileError::Failed(failure) = err else {
            panic!("expected compilation failure, got {err:?}");
        };
        assert_eq!(failure.kind, FailureKind::ArtifactMissing);
        assert!(!failure.diagnostic_excerpt.is_empty());
        assert!(failure.diagnostic_excerpt.contains("Undefined control sequence"));
        assert_eq!(scratch_entries(&compiler), 0);
    }

    #[tokio::test]
    async fn test_missing_binary_folds_into_failure() {
        let dir = TempDir::new().unwrap();
        let compiler = LatexCompiler::new(CompilerConfig {
            program: dir.path().join("definitely-not-pdflatex"),
            leading_args: vec![],
            scratch_dir: dir.path().join("scratch"),
            timeout: Duration::from_secs(5),
            excerpt_limit: 400,
        });

        let err = compiler.compile(&source("x"), "acme").await.unwrap_err();

        let CompileError::Failed(failure) = err else {
            panic!("expected compilation failure, got {err:?}");
        };
        assert_eq!(failure.kind, FailureKind::CompilerUnavailable);
        assert!(failure.diagnostic_excerpt.contains("definitely-not-pdflatex"));
        assert_eq!(scratch_entries(&compiler), 0);
    }

    #[tokio::test]
    async fn test_timeout_kills_compiler_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut compiler = compiler_with_script(&dir, "exec sleep 30\n");
        compiler.config.timeout = Duration::from_millis(200);

        let err = compiler.compile(&source("x"), "acme").await.unwrap_err();

        let CompileError::Failed(failure) = err else {
            panic!("expected compilation failure, got {err:?}");
        };
        assert_eq!(failure.kind, FailureKind::TimedOut);
        assert_eq!(scratch_entries(&compiler), 0);
    }

    #[tokio::test]
    async fn test_partial_pdf_from_timed_out_compiler_is_not_returned() {
        let dir = TempDir::new().unwrap();
        let script = r#"
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) out="${arg#-output-directory=}" ;;
    -*) ;;
    *) src="$arg" ;;
  esac
done
printf '%%PDF-1.5 partial page' > "$out/$(basename "$src" .tex).pdf"
exec sleep 30
"#;
        let mut compiler = compiler_with_script(&dir, script);
        compiler.config.timeout = Duration::from_millis(300);

        let err = compiler.compile(&source("x"), "acme").await.unwrap_err();

        let CompileError::Failed(failure) = err else {
            panic!("expected compilation failure, got {err:?}");
        };
        assert_eq!(failure.kind, FailureKind::TimedOut);
        assert_eq!(scratch_entries(&compiler), 0);
    }

    #[tokio::test]
    async fn test_scratch_dir_is_created_when_absent() {
        let dir = TempDir::new().unwrap();
        let compiler = compiler_with_script(&dir, COPYING_COMPILER);
        assert!(!compiler.config().scratch_dir.exists());

        compiler.compile(&source("x"), "acme").await.unwrap();
        assert!(compiler.config().scratch_dir.is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_with_same_base_name_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let compiler = compiler_with_script(&dir, COPYING_COMPILER);
        let first = source("first letter");
        let second = source("second letter");

        let (a, b) = tokio::join!(
            compiler.compile(&first, "same-name"),
            compiler.compile(&second, "same-name"),
        );

        assert_eq!(&a.unwrap()[..], first.as_str().as_bytes());
        assert_eq!(&b.unwrap()[..], second.as_str().as_bytes());
        assert_eq!(scratch_entries(&compiler), 0);
    }

    #[tokio::test]
    async fn test_many_parallel_jobs_all_resolve_independently() {
        let dir = TempDir::new().unwrap();
        let compiler = std::sync::Arc::new(compiler_with_script(&dir, COPYING_COMPILER));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let compiler = std::sync::Arc::clone(&compiler);
                tokio::spawn(async move {
                    let src = source(&format!("letter number {i}"));
                    let pdf = compiler.compile(&src, "batch").await.unwrap();
                    (src, pdf)
                })
            })
            .collect();

        for handle in handles {
            let (src, pdf) = handle.await.unwrap();
            assert_eq!(&pdf[..], src.as_str().as_bytes());
        }
        assert_eq!(scratch_entries(&compiler), 0);
    }
}
