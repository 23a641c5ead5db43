//! Command-string matching used to guess a format before any output exists.

use regex::Regex;

use super::cache::RegexCache;
use super::model::{CommandPattern, PatternKind};

/// Strip the directory prefix from the executable token only.
///
/// `./node_modules/.bin/prettier --check src/a.js` becomes
/// `prettier --check src/a.js`; arguments are kept verbatim.
pub fn normalize_command(command: &str) -> String {
    let command = command.trim();
    let (exe, rest) = match command.find(char::is_whitespace) {
        Some(idx) => command.split_at(idx),
        None => (command, ""),
    };

    let exe = match exe.rfind(|c: char| c == '/' || c == '\\') {
        Some(idx) => &exe[idx + 1..],
        None => exe,
    };

    format!("{}{}", exe, rest)
}

/// Translate a SQL `LIKE` pattern into an anchored regex.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

/// A literal matches the whole command, or the command head when it is
/// followed by arguments (`pytest` matches `pytest tests/`).
fn literal_matches(command: &str, literal: &str) -> bool {
    match command.strip_prefix(literal) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// Evaluates [`CommandPattern`]s, caching compiled LIKE/regexp forms.
#[derive(Debug, Default)]
pub struct CommandMatcher {
    cache: RegexCache,
}

impl CommandMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `command` must already be normalized.
    pub fn matches(&self, command: &str, pattern: &CommandPattern) -> bool {
        match pattern.kind {
            PatternKind::Literal => literal_matches(command, &pattern.pattern),
            PatternKind::Like => {
                let key = format!("like:{}", pattern.pattern);
                self.cache
                    .get_or_build(&key, || Regex::new(&like_to_regex(&pattern.pattern)))
                    .is_some_and(|re| re.is_match(command))
            }
            PatternKind::Regexp => {
                let key = format!("re:{}", pattern.pattern);
                self.cache
                    .get_or_build(&key, || Regex::new(&pattern.pattern))
                    .is_some_and(|re| re.is_match(command))
            }
        }
    }

    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }
}
