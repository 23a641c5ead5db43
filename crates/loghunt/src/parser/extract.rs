//! Content-family pre-extraction.
//!
//! Tools often print banners, timestamps or shell prompts ahead of their
//! JSON/XML payload. These helpers narrow the content to the payload. They
//! are heuristics, not validators: a false anchor is left for the
//! downstream parser to reject.

use super::model::ContentFamily;

/// Strip everything before the first plausible JSON document.
pub fn extract_json(content: &str) -> &str {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return content;
    }

    let bytes = content.as_bytes();
    let mut line_start = 0;
    while line_start < bytes.len() {
        let b = bytes[line_start];
        if (b == b'[' || b == b'{') && is_json_follower(bytes.get(line_start + 1).copied()) {
            return &content[line_start..];
        }
        match content[line_start..].find('\n') {
            Some(offset) => line_start += offset + 1,
            None => break,
        }
    }

    content
}

fn is_json_follower(next: Option<u8>) -> bool {
    match next {
        None => true,
        Some(c) => matches!(c, b'"' | b'{' | b'[' | b']' | b'}' | b' ' | b'\t' | b'\n' | b'\r') || c.is_ascii_digit(),
    }
}

/// Strip everything before an `<?xml` declaration, or before the first
/// line that opens an element (`<` followed by a letter).
pub fn extract_xml(content: &str) -> &str {
    if let Some(pos) = content.find("<?xml") {
        return &content[pos..];
    }

    let bytes = content.as_bytes();
    let mut line_start = 0;
    while line_start < bytes.len() {
        if bytes[line_start] == b'<' && bytes.get(line_start + 1).is_some_and(u8::is_ascii_alphabetic) {
            return &content[line_start..];
        }
        match content[line_start..].find('\n') {
            Some(offset) => line_start += offset + 1,
            None => break,
        }
    }

    content
}

/// Apply the extraction matching the target parser's family.
pub fn extract_for_family(content: &str, family: ContentFamily) -> &str {
    match family {
        ContentFamily::Text => content,
        ContentFamily::Json => extract_json(content),
        ContentFamily::Xml => extract_xml(content),
    }
}
