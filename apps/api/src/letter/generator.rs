//! Letter body generation — prompt the provider, then normalize whatever comes back.

use tracing::info;

use crate::letter::models::{DocumentRequest, NormalizedBody};
use crate::letter::normalizer::{normalize_with_stage, NormalizeStage};
use crate::letter::prompts::{
    DEFAULT_RECIPIENT, LETTER_PROMPT_TEMPLATE, LETTER_SYSTEM_TEMPLATE, NO_INSTRUCTIONS,
};
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{LlmError, TextGenerator};

/// Longest job description / resume passed to the provider, in characters.
const MAX_FIELD_CHARS: usize = 12_000;

/// Asks the provider for a body and normalizes the answer.
///
/// Only the provider call itself can fail; unusable output degrades to the
/// default body inside the normalizer.
pub async fn generate_body(
    generator: &dyn TextGenerator,
    request: &DocumentRequest,
    resume_text: &str,
) -> Result<NormalizedBody, LlmError> {
    let prompt = build_letter_prompt(request, resume_text);
    let system = LETTER_SYSTEM_TEMPLATE.replace("{json_only}", JSON_ONLY_SYSTEM);

    info!(
        "Generating cover letter body for {} at {}",
        request.position, request.company
    );
    let raw = generator.generate(&prompt, &system).await?;

    let (body, stage) = normalize_with_stage(&raw);
    if stage == NormalizeStage::Default {
        info!("Generated body unusable; default body substituted");
    }
    Ok(body)
}

/// Fills the letter prompt. All values are inserted in a single pass so text
/// from one field can never be mistaken for another field's placeholder.
pub fn build_letter_prompt(request: &DocumentRequest, resume_text: &str) -> String {
    let recipient = request
        .recipient_name
        .as_deref()
        .unwrap_or(DEFAULT_RECIPIENT);
    let instructions = request.instructions.as_deref().unwrap_or(NO_INSTRUCTIONS);
    let job_description = clip(request.job_description.trim(), MAX_FIELD_CHARS);
    let resume_text = clip(resume_text.trim(), MAX_FIELD_CHARS);

    let values: [(&str, &str); 8] = [
        ("{grounding_instruction}", GROUNDING_INSTRUCTION),
        ("{name}", request.name.trim()),
        ("{position}", request.position.trim()),
        ("{company}", request.company.trim()),
        ("{recipient}", recipient),
        ("{job_description}", job_description),
        ("{resume_text}", resume_text),
        ("{instructions}", instructions),
    ];

    let mut out = String::with_capacity(LETTER_PROMPT_TEMPLATE.len() + resume_text.len());
    let mut rest = LETTER_PROMPT_TEMPLATE;
    'scan: while let Some(pos) = rest.find('{') {
        for (key, value) in values {
            if rest[pos..].starts_with(key) {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
                continue 'scan;
            }
        }
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
    }
    out.push_str(rest);
    out
}

/// First `max` characters of `s`.
fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
