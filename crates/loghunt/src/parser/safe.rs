//! Defensive helpers shared by every format recognizer.
//!
//! Log content is untrusted: lines can be megabytes long (minified bundles,
//! template expansion errors) and numbers can be anything. Nothing in this
//! module panics or returns an error for malformed input; failures surface
//! as `None` or a caller-supplied default.

use std::borrow::Cow;

use regex::{Captures, Regex};

/// Lines longer than this are truncated before any regex sees them.
pub const MAX_REGEX_LINE_LENGTH: usize = 2000;

/// Upper bound for the `file` segment of `file:line:col`.
pub const MAX_FILE_PATH_LENGTH: usize = 500;

const TRUNCATION_MARKER: &str = "...";

/// Convert CRLF and lone CR to LF in a single pass.
///
/// Borrows the input when it contains no carriage returns.
pub fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }

    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Report the dominant line terminator as an escaped token
/// (`"\\r\\n"`, `"\\n"`, `"\\r"`), or `""` for single-line content.
pub fn detect_line_ending(content: &str) -> &'static str {
    let bytes = content.as_bytes();
    let (mut has_cr, mut has_lf, mut has_crlf) = (false, false, false);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                has_crlf = true;
                i += 1;
            }
            b'\r' => has_cr = true,
            b'\n' => has_lf = true,
            _ => {}
        }
        i += 1;
    }

    if has_crlf {
        "\\r\\n"
    } else if has_lf {
        "\\n"
    } else if has_cr {
        "\\r"
    } else {
        ""
    }
}

/// Truncate `line` to `max_length` characters (marker included).
/// Returns `None` when the line already fits.
pub fn truncate_line(line: &str, max_length: usize) -> Option<String> {
    // byte length is an upper bound on char count
    if line.len() <= max_length || line.char_indices().nth(max_length).is_none() {
        return None;
    }

    let keep = max_length.saturating_sub(TRUNCATION_MARKER.len());
    let cut = line
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(line.len());

    let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
    out.push_str(&line[..cut]);
    out.push_str(TRUNCATION_MARKER);
    Some(out)
}

/// One line yielded by [`SafeLineReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeLine {
    pub text: String,
    /// 1-based physical line number
    pub number: i32,
    pub truncated: bool,
}

/// Forward-only line cursor with bounded line length.
///
/// Line endings are normalized up front; a trailing newline does not produce
/// an extra empty line.
pub struct SafeLineReader<'a> {
    content: Cow<'a, str>,
    pos: usize,
    line_number: i32,
    max_length: usize,
}

impl<'a> SafeLineReader<'a> {
    pub fn with_max_length(content: &'a str, max_length: usize) -> Self {
        Self {
            content: normalize_line_endings(content),
            pos: 0,
            line_number: 0,
            max_length,
        }
    }

    pub fn line_number(&self) -> i32 {
        self.line_number
    }
}

impl Iterator for SafeLineReader<'_> {
    type Item = SafeLine;

    fn next(&mut self) -> Option<SafeLine> {
        if self.pos >= self.content.len() {
            return None;
        }

        let rest = &self.content[self.pos..];
        let (raw, consumed) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], idx + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        self.line_number += 1;

        let line = match truncate_line(raw, self.max_length) {
            Some(truncated) => SafeLine { text: truncated, number: self.line_number, truncated: true },
            None => SafeLine { text: raw.to_string(), number: self.line_number, truncated: false },
        };
        Some(line)
    }
}

/// Location parsed from a `file:line[:col]` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation<'a> {
    pub file: &'a str,
    pub line: i32,
    /// `-1` when absent
    pub column: i32,
}

/// Scan `file:line[:column]` without regex backtracking.
///
/// The file part ends at the first `:` followed by a digit (a drive letter
/// like `C:` is skipped). Returns `None` on any malformed segment.
pub fn parse_file_line_column(line: &str) -> Option<FileLocation<'_>> {
    if line.is_empty() {
        return None;
    }

    let bytes = line.as_bytes();
    let search_limit = line.len().min(MAX_FILE_PATH_LENGTH + 20);

    let mut pos1 = 0;
    loop {
        if pos1 >= search_limit {
            return None;
        }
        let found = pos1 + line[pos1..].find(':')?;
        if found == 0 {
            return None;
        }
        if found == 1 && bytes[0].is_ascii_alphabetic() {
            pos1 = found + 1;
            continue;
        }
        if bytes.get(found + 1).is_some_and(u8::is_ascii_digit) {
            pos1 = found;
            break;
        }
        pos1 = found + 1;
    }

    if pos1 >= search_limit {
        return None;
    }

    let file = &line[..pos1];
    if file.len() > MAX_FILE_PATH_LENGTH {
        return None;
    }

    let pos2 = pos1 + 1 + line[pos1 + 1..].find(':')?;
    let line_num = leading_int(&line[pos1 + 1..pos2])?;

    let mut column = -1;
    if bytes.get(pos2 + 1).is_some_and(u8::is_ascii_digit) {
        if let Some(offset) = line[pos2 + 1..].find(':') {
            column = leading_int(&line[pos2 + 1..pos2 + 1 + offset]).unwrap_or(-1);
        }
    }

    Some(FileLocation { file, line: line_num, column })
}

/// `file:line:col: severity: message` as emitted by gcc/clang and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerDiagnostic<'a> {
    pub location: FileLocation<'a>,
    /// One of `error`, `warning`, `note`
    pub severity: &'static str,
    pub message: &'a str,
}

pub fn parse_compiler_diagnostic(line: &str) -> Option<CompilerDiagnostic<'_>> {
    let location = parse_file_line_column(line)?;

    let (sev_pos, severity) = [(" error:", "error"), (" warning:", "warning"), (" note:", "note")]
        .iter()
        .find_map(|(needle, sev)| line.find(needle).map(|pos| (pos, *sev)))?;

    let msg_start = sev_pos + 1 + line[sev_pos + 1..].find(':')?;
    let message = line[msg_start + 1..].trim_start_matches(|c: char| c == ' ' || c == '\t');

    Some(CompilerDiagnostic { location, severity, message })
}

/// Parse the run of leading ASCII digits. Overflow is a failure.
fn leading_int(s: &str) -> Option<i32> {
    let end = s.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}

pub fn try_parse_i32(s: &str) -> Option<i32> {
    s.trim().parse().ok()
}

pub fn try_parse_i64(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}

pub fn try_parse_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn safe_i32(s: &str, default: i32) -> i32 {
    try_parse_i32(s).unwrap_or(default)
}

pub fn safe_i64(s: &str, default: i64) -> i64 {
    try_parse_i64(s).unwrap_or(default)
}

pub fn safe_f64(s: &str, default: f64) -> f64 {
    try_parse_f64(s).unwrap_or(default)
}

/// Regex search that refuses lines over [`MAX_REGEX_LINE_LENGTH`].
pub fn safe_captures<'h>(re: &Regex, line: &'h str) -> Option<Captures<'h>> {
    if line.len() > MAX_REGEX_LINE_LENGTH {
        return None;
    }
    re.captures(line)
}

pub fn safe_is_match(re: &Regex, line: &str) -> bool {
    line.len() <= MAX_REGEX_LINE_LENGTH && re.is_match(line)
}

/// Heuristic flag for patterns that would backtrack badly in a
/// backtracking engine (negated class repeats, nested quantifiers,
/// non-trailing `.*`).
pub fn has_potential_backtracking(pattern: &str) -> bool {
    if pattern.contains("[^") && (pattern.contains("]+") || pattern.contains("]*")) {
        return true;
    }
    if pattern.contains(")+)") || pattern.contains(")*)*") || pattern.contains("+)+") {
        return true;
    }
    matches!(pattern.find(".*"), Some(idx) if idx + 2 < pattern.len())
}
