use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the letter body comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    /// Body prose already written by the user; used as-is.
    Resolved(String),
    /// Unparsed output from the generative provider; goes through the normalizer.
    RawGenerated(String),
}

/// Everything the pipeline needs to produce one cover letter.
#[derive(Debug, Clone, Default)]
pub struct DocumentRequest {
    // identity
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub links: Vec<String>,
    // target
    pub company: String,
    pub position: String,
    pub recipient_name: Option<String>,
    // free text
    pub job_description: String,
    pub instructions: Option<String>,
    pub resume_text: Option<String>,
    /// `None` means the body has to be generated from the resume text.
    pub body: Option<BodySource>,
}

impl DocumentRequest {
    /// Resume text with surrounding whitespace removed, if any is left.
    pub fn resume(&self) -> Option<&str> {
        self.resume_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Wire shape of a cover letter request, shared by the JSON and multipart endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverLetterPayload {
    /// Only used for usage bookkeeping; identity resolution happens upstream.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub company: String,
    pub position: String,
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub job_description: String,
    pub instructions: Option<String>,
    pub resume_text: Option<String>,
    /// Body text the user already has.
    pub body_text: Option<String>,
    /// Raw provider output produced elsewhere (e.g. an earlier draft call).
    pub generated_text: Option<String>,
}

impl CoverLetterPayload {
    pub fn into_request(self) -> DocumentRequest {
        let body = match (non_blank(self.body_text), non_blank(self.generated_text)) {
            (Some(text), _) => Some(BodySource::Resolved(text)),
            (None, Some(raw)) => Some(BodySource::RawGenerated(raw)),
            (None, None) => None,
        };

        DocumentRequest {
            name: self.name,
            email: self.email,
            phone: non_blank(self.phone),
            links: self
                .links
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect(),
            company: self.company,
            position: self.position,
            recipient_name: non_blank(self.recipient_name),
            job_description: self.job_description,
            instructions: non_blank(self.instructions),
            resume_text: non_blank(self.resume_text),
            body,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Body prose ready for the template. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedBody(String);

impl NormalizedBody {
    /// Returns `None` for blank text.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A complete document source with exactly one document envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSource(String);

impl RenderedSource {
    pub(crate) fn new(source: String) -> Self {
        Self(source)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
