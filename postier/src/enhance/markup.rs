//! Post-processing of generated bodies.

/// Remove surrounding whitespace and a Markdown code fence wrapped around
/// the text. The opening fence's info string (`html`, `HTML`, `xml`...) is
/// dropped up to the end of its line.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.split_once('\n') {
            Some((_info, content)) => content,
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Whether a processed body is accepted as HTML.
pub fn looks_like_markup(body: &str) -> bool {
    body.starts_with('<')
}

/// Wrap the raw message in a single paragraph. The text is not escaped.
pub fn fallback_body(raw: &str) -> String {
    format!("<p>{raw}</p>")
}

/// Inverse of [`fallback_body`].
pub fn unwrap_fallback(body: &str) -> Option<&str> {
    body.strip_prefix("<p>")?.strip_suffix("</p>")
}
