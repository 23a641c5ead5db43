/// ANSI escape code stripping
///
/// Compilers and test runners colorize their output when they think they
/// are attached to a terminal (`cargo`, `pytest --color=yes`, `gcc
/// -fdiagnostics-color`). The escapes break line-anchored patterns such as
/// `file:line:col: error:`, so dispatch strips them before detection.

use std::borrow::Cow;

const ESC: char = '\x1b';

/// Strip ANSI escape codes.
///
/// Handles:
/// - CSI sequences: `ESC [ ... final` (colors, cursor movement)
/// - OSC sequences: `ESC ] ... BEL` or `ESC ] ... ESC \` (hyperlinks)
/// - Two-character Fe sequences (`ESC N`)
///
/// Returns `Cow::Borrowed` if the input holds no ESC character.
pub fn strip_ansi_codes(input: &str) -> Cow<'_, str> {
    if !input.contains(ESC) {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ESC {
            output.push(c);
            continue;
        }

        match chars.peek().copied() {
            // lone trailing ESC
            None => {}
            Some('[') => {
                chars.next();
                // parameters and intermediates until a final byte in 0x40..=0x7E
                for b in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&b) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(b) = chars.next() {
                    if b == '\x07' {
                        break;
                    }
                    if b == ESC && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some(next) if ('\x40'..='\x5f').contains(&next) => {
                chars.next();
            }
            Some(_) => {}
        }
    }

    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_cow_optimization() {
        let output = strip_ansi_codes("src/main.c:3:5: error: boom");
        assert!(matches!(output, Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_simple_ansi() {
        let output = strip_ansi_codes("\x1b[31merror\x1b[0m: boom");
        assert_eq!(output, "error: boom");
    }

    #[test]
    fn test_strip_colored_gcc_diagnostic() {
        let input = "\x1b[01m\x1b[Ksrc/a.c:3:5:\x1b[m\x1b[K \x1b[01;31m\x1b[Kerror: \x1b[m\x1b[Kexpected ';'";
        assert_eq!(strip_ansi_codes(input), "src/a.c:3:5: error: expected ';'");
    }

    #[test]
    fn test_strip_pytest_summary() {
        let input = "\x1b[32m\x1b[1m3 passed\x1b[0m\x1b[32m in 0.12s\x1b[0m";
        assert_eq!(strip_ansi_codes(input), "3 passed in 0.12s");
    }

    #[test]
    fn test_only_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[0m\x1b[32m\x1b[1m"), "");
    }

    #[test]
    fn test_osc_hyperlink() {
        let input = "\x1b]8;;https://example.com\x07Link\x1b]8;;\x1b\\";
        assert_eq!(strip_ansi_codes(input), "Link");
    }

    #[test]
    fn test_lone_trailing_escape() {
        assert_eq!(strip_ansi_codes("done\x1b"), "done");
    }

    #[test]
    fn test_multibyte_text_preserved() {
        assert_eq!(strip_ansi_codes("\x1b[33m✓ ünïcode\x1b[0m"), "✓ ünïcode");
    }
}
