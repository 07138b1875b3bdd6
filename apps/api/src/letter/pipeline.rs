//! Document pipeline — resolve body → render → compile.
//!
//! The generator client and compiler configuration are handed in at
//! construction; the pipeline holds no other state and can serve any number of
//! concurrent requests.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::info;

use crate::compile::{CompilationFailure, CompileError, LatexCompiler};
use crate::letter::generator::generate_body;
use crate::letter::models::{BodySource, DocumentRequest, NormalizedBody, RenderedSource};
use crate::letter::normalizer::normalize_response;
use crate::letter::template::render_letter;
use crate::llm_client::{LlmError, TextGenerator};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No body text supplied and nothing to generate one from.
    #[error("no letter body available: supply body text, generated text, or resume text")]
    BodyUnavailable,

    #[error("body generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Compilation(CompilationFailure),

    #[error("scratch file error ({context}): {source}")]
    Resource {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl From<CompileError> for PipelineError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Failed(failure) => PipelineError::Compilation(failure),
            CompileError::Resource { context, source } => {
                PipelineError::Resource { context, source }
            }
        }
    }
}

/// A compiled letter ready to hand back to the caller.
#[derive(Debug, Clone)]
pub struct CompiledLetter {
    pub pdf: Bytes,
    /// Suggested download name, safe for a Content-Disposition header.
    pub file_name: String,
}

pub struct DocumentPipeline {
    generator: Arc<dyn TextGenerator>,
    compiler: LatexCompiler,
}

impl DocumentPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, compiler: LatexCompiler) -> Self {
        Self {
            generator,
            compiler,
        }
    }

    /// Produces the body: supplied text first, then raw provider output, then
    /// a fresh generation from the resume.
    pub async fn resolve_body(
        &self,
        request: &DocumentRequest,
    ) -> Result<NormalizedBody, PipelineError> {
        match &request.body {
            Some(BodySource::Resolved(text)) => {
                NormalizedBody::new(text.as_str()).ok_or(PipelineError::BodyUnavailable)
            }
            Some(BodySource::RawGenerated(raw)) => Ok(normalize_response(raw)),
            None => {
                let resume = request.resume().ok_or(PipelineError::BodyUnavailable)?;
                Ok(generate_body(self.generator.as_ref(), request, resume).await?)
            }
        }
    }

    /// Resolves the body and renders the full document source.
    pub async fn render(&self, request: &DocumentRequest) -> Result<RenderedSource, PipelineError> {
        let body = self.resolve_body(request).await?;
        Ok(render_letter(request, &body, today()))
    }

    /// Runs the whole pipeline and returns the compiled PDF.
    pub async fn compile(&self, request: &DocumentRequest) -> Result<CompiledLetter, PipelineError> {
        let source = self.render(request).await?;
        let pdf = self.compiler.compile(&source, &request.company).await?;

        info!(
            "Compiled cover letter for {} ({} bytes)",
            request.company,
            pdf.len()
        );

        Ok(CompiledLetter {
            pdf,
            file_name: download_name(&request.company),
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `cover_letter_<company>.pdf`, keeping only ASCII alphanumerics from the company.
pub fn download_name(company: &str) -> String {
    let company: String = company
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(40)
        .collect();
    if company.is_empty() {
        "cover_letter.pdf".to_string()
    } else {
        format!("cover_letter_{company}.pdf")
    }
}
