//! LaTeX escaping for untrusted text.
//!
//! Two modes:
//! - [`escape_literal`] for identity/metadata fields, which must never carry markup.
//! - [`escape_body_preserving`] for body prose, which may use a handful of
//!   allow-listed control sequences (line break and itemize lists).

/// Control sequences allowed to pass through the body unescaped.
/// `\\` goes first so that `\\\item` splits into a line break and an item marker.
pub const ALLOWED_BODY_SEQUENCES: [&str; 4] = [r"\\", r"\begin{itemize}", r"\end{itemize}", r"\item"];

// Private-use code points: never produced by escaping and not expected in prose.
const SENTINEL_OPEN: char = '\u{E000}';
const SENTINEL_CLOSE: char = '\u{E001}';

/// Escapes every character LaTeX reserves so the text always renders literally.
///
/// Works in a single pass, so replacement text (e.g. the braces of
/// `\textbackslash{}`) is never escaped a second time.
pub fn escape_literal(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for c in input.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            other => out.push(other),
        }
    }
    out
}

/// [`escape_literal`] for optional fields; `None` becomes an empty string.
pub fn escape_optional(input: Option<&str>) -> String {
    input.map(escape_literal).unwrap_or_default()
}

/// Escapes body prose while keeping [`ALLOWED_BODY_SEQUENCES`] intact.
///
/// Allow-listed sequences are swapped for sentinels, the rest is escaped with
/// [`escape_literal`], then the sentinels are swapped back. A sequence ending in
/// a letter only counts when no further letter follows, so `\items` is escaped
/// rather than passed through as an unknown control word.
///
/// Not idempotent: feed it raw text exactly once. Escaping already-escaped
/// text turns every `\&` into `\textbackslash{}\&`.
pub fn escape_body_preserving(input: &str) -> String {
    let mut escaped = escape_literal(&protect_allowed(input));
    for (index, sequence) in ALLOWED_BODY_SEQUENCES.iter().enumerate() {
        escaped = escaped.replace(&sentinel(index), sequence);
    }
    escaped
}

/// Replaces every allow-listed sequence that stands on its own with its sentinel.
fn protect_allowed(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    'scan: while let Some(c) = rest.chars().next() {
        if c == '\\' {
            for (index, sequence) in ALLOWED_BODY_SEQUENCES.iter().enumerate() {
                let Some(after) = rest.strip_prefix(sequence) else {
                    continue;
                };
                let ends_in_letter = sequence.ends_with(|ch: char| ch.is_ascii_alphabetic());
                if ends_in_letter && after.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
                    continue;
                }
                out.push_str(&sentinel(index));
                rest = after;
                continue 'scan;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn sentinel(index: usize) -> String {
    format!("{SENTINEL_OPEN}{index}{SENTINEL_CLOSE}")
}
