// Cross-cutting prompt fragments shared by every LLM call.
// Feature-specific prompts live next to the feature (see letter::prompts).

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps generated prose tied to what the candidate actually supplied.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim about the candidate must come from the resume text provided. \
    Do NOT invent employers, titles, dates, metrics, degrees, or skills. \
    If the resume does not support a claim, leave it out.";
