//! Model: HuntConfig and related types.

use serde::{Deserialize, Serialize};

/// How much of the raw log is kept on each event's `log_content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    #[default]
    Full,
    None,
    /// First `content_limit` characters
    Limit,
    /// The event's lines plus surrounding context, else `Limit`
    Smart,
}

impl ContentMode {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "none" => Some(Self::None),
            "limit" => Some(Self::Limit),
            "smart" => Some(Self::Smart),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    /// Format used when the caller does not name one
    pub default_format: String,
    pub max_line_length: usize,
    /// Remove ANSI escapes before detection and parsing
    pub strip_ansi: bool,
    pub severity_threshold: String,
    pub content_mode: ContentMode,
    pub content_limit: usize,
    /// Emit non-matching lines for `regexp:` formats
    pub include_unparsed: bool,
    /// Directories whose `*.json` files are loaded as parser configs
    pub config_dirs: Vec<String>,
    pub analyze_patterns: bool,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            default_format: "auto".to_string(),
            max_line_length: 2000,
            strip_ansi: true,
            severity_threshold: "debug".to_string(),
            content_mode: ContentMode::Full,
            content_limit: 200,
            include_unparsed: false,
            config_dirs: Vec::new(),
            analyze_patterns: false,
        }
    }
}
