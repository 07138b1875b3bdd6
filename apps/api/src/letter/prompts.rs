// Prompt constants for cover letter body generation.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Persona for the letter writer. `{json_only}` is replaced with the JSON-only fragment.
pub const LETTER_SYSTEM_TEMPLATE: &str = "You are an experienced career coach who writes \
    concise, specific, warm cover letters for real candidates. {json_only}";

/// Body generation prompt.
/// Replace: {grounding_instruction}, {name}, {position}, {company}, {recipient},
///          {job_description}, {resume_text}, {instructions}
pub const LETTER_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Write the BODY of a cover letter for {name}, applying for the position of {position} at {company}.
The letter is addressed to: {recipient}

JOB DESCRIPTION:
{job_description}

CANDIDATE RESUME:
{resume_text}

ADDITIONAL INSTRUCTIONS FROM THE CANDIDATE:
{instructions}

Return a JSON object with this EXACT schema (no extra fields):
{
  "BodyParagraphs": "First paragraph...\n\nSecond paragraph..."
}

FORMATTING RULES for BodyParagraphs:
1. Body only: NO greeting ("Dear ..."), NO closing ("Sincerely ..."), NO signature, NO date, NO addresses
2. 3 to 4 paragraphs, separated by a blank line (two newline characters)
3. Plain prose. The ONLY markup allowed is:
   - \\ for a forced line break
   - \begin{itemize} ... \end{itemize} with \item for a short list of achievements
4. Do NOT use any other LaTeX commands, Markdown, or HTML
5. Keep it under 350 words"#;

/// Used when the candidate gave no extra instructions.
pub const NO_INSTRUCTIONS: &str = "None.";

/// Used when the letter has no named recipient.
pub const DEFAULT_RECIPIENT: &str = "the Hiring Manager";
