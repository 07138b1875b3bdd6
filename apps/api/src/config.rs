use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::compile::CompilerConfig;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Compiler binary, resolved through PATH when not absolute.
    pub latex_bin: PathBuf,
    /// Shared scratch directory for every compilation job.
    pub scratch_dir: PathBuf,
    pub compile_timeout_secs: u64,
    pub diagnostic_excerpt_chars: usize,
    /// Usage counters go to Redis when set; otherwise they are only logged.
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            latex_bin: PathBuf::from(env_or("LATEX_BIN", "pdflatex")),
            scratch_dir: std::env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("coverletter-scratch")),
            compile_timeout_secs: env_or("COMPILE_TIMEOUT_SECS", "60")
                .parse::<u64>()
                .context("COMPILE_TIMEOUT_SECS must be a whole number of seconds")?,
            diagnostic_excerpt_chars: env_or("DIAGNOSTIC_EXCERPT_CHARS", "2000")
                .parse::<usize>()
                .context("DIAGNOSTIC_EXCERPT_CHARS must be a positive integer")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
        })
    }

    /// Compiler settings handed to the document pipeline at startup.
    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            program: self.latex_bin.clone(),
            leading_args: Vec::new(),
            scratch_dir: self.scratch_dir.clone(),
            timeout: Duration::from_secs(self.compile_timeout_secs),
            excerpt_limit: self.diagnostic_excerpt_chars,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
