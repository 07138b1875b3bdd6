//! Template Renderer — fills the fixed cover letter skeleton.
//!
//! Identity and metadata slots go through [`escape_literal`]; the body slot goes
//! through [`escape_body_preserving`]. Missing optional fields render as empty
//! strings so every line of the skeleton stays in place.

use chrono::NaiveDate;

use crate::letter::escape::{escape_body_preserving, escape_literal, escape_optional};
use crate::letter::models::{DocumentRequest, NormalizedBody, RenderedSource};

const SLOT_OPEN: &str = "<<";
const SLOT_CLOSE: &str = ">>";

/// Letter skeleton. Slots are written `<<slot_name>>`.
/// Each slot line ends in `\par` so an empty slot never leaves a dangling `\\`.
pub const LETTER_TEMPLATE: &str = r"\documentclass[11pt]{article}
\usepackage[T1]{fontenc}
\usepackage[utf8]{inputenc}
\usepackage{lmodern}
\usepackage[margin=1in]{geometry}
\usepackage{enumitem}
\setlist{noitemsep, topsep=4pt}
\setlength{\parindent}{0pt}
\setlength{\parskip}{8pt}
\pagestyle{empty}

\begin{document}

\begin{flushleft}
{\Large\bfseries <<name>>}\par
<<email>>\par
<<phone>>\par
<<links>>\par
\end{flushleft}

<<date>>\par

\begin{flushleft}
<<recipient_name>>\par
<<company>>\par
\end{flushleft}

\textbf{<<subject>>}\par

<<greeting>>\par

<<body>>

Sincerely,\par
\vspace{2em}
<<name>>\par

\end{document}
";

/// Renders a complete LaTeX document for `request` with the given body.
pub fn render_letter(
    request: &DocumentRequest,
    body: &NormalizedBody,
    date: NaiveDate,
) -> RenderedSource {
    let links = request
        .links
        .iter()
        .map(|link| escape_literal(link.trim()))
        .collect::<Vec<_>>()
        .join(r" \textbar{} ");

    let greeting = match request.recipient_name.as_deref() {
        Some(recipient) => format!("Dear {},", escape_literal(recipient.trim())),
        None => "Dear Hiring Manager,".to_string(),
    };

    let subject = format!(
        "Application for {} at {}",
        escape_literal(request.position.trim()),
        escape_literal(request.company.trim())
    );

    let source = fill_slots(LETTER_TEMPLATE, |slot| match slot {
        "name" => Some(escape_literal(request.name.trim())),
        "email" => Some(escape_literal(request.email.trim())),
        "phone" => Some(escape_optional(request.phone.as_deref().map(str::trim))),
        "links" => Some(links.clone()),
        "date" => Some(date.format("%B %-d, %Y").to_string()),
        "recipient_name" => Some(escape_optional(request.recipient_name.as_deref().map(str::trim))),
        "company" => Some(escape_literal(request.company.trim())),
        "subject" => Some(subject.clone()),
        "greeting" => Some(greeting.clone()),
        "body" => Some(paragraphs(&escape_body_preserving(body.as_str()))),
        _ => None,
    });

    RenderedSource::new(source)
}

/// Replaces every `<<slot>>` in one left-to-right pass.
///
/// Substituted values are never rescanned, so user text that happens to look
/// like a slot stays literal. Unknown slots render empty.
fn fill_slots<F>(template: &str, mut value_for: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(start) = rest.find(SLOT_OPEN) {
        let after_open = &rest[start + SLOT_OPEN.len()..];
        let Some(end) = after_open.find(SLOT_CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        let slot = &after_open[..end];
        match value_for(slot) {
            Some(value) => out.push_str(&value),
            None => tracing::warn!("Unknown template slot '{slot}' rendered empty"),
        }
        rest = &after_open[end + SLOT_CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Normalises line endings and collapses runs of blank lines into single
/// paragraph breaks.
fn paragraphs(body: &str) -> String {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
