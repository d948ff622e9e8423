//! Normalization of untrusted strings and URLs read from archives.

use url::Url;

/// Default cap for strings rendered to a terminal.
pub const TERMINAL_MAX_CHARS: usize = 200;

/// Sanitize a string for safe terminal rendering.
///
/// Strips ANSI ESC sequences (CSI, OSC, DCS, SS2/SS3) and BEL, replaces
/// control characters other than `\n`/`\t` with `\u{FFFD}`, and caps the
/// length at [`TERMINAL_MAX_CHARS`].
pub fn sanitize_terminal(input: &str) -> String {
    clamp_text(input, TERMINAL_MAX_CHARS)
}

/// Strip escapes and controls, then truncate to `max_chars` (with "...").
pub fn clamp_text(input: &str, max_chars: usize) -> String {
    let stripped = strip_escape_sequences(input);
    let cleaned = replace_control_chars(&stripped);

    if char_len(&cleaned) > max_chars {
        let truncated: String = cleaned.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

/// Length in Unicode scalar values. All text bounds are expressed in these.
pub fn char_len(input: &str) -> usize {
    input.chars().count()
}

/// Validate and normalize a remote image URL.
///
/// Returns the trimmed URL when it parses strictly, uses `https`, has a host,
/// carries no whitespace or control characters and fits in `max_chars`.
pub fn sanitize_url(input: &str, max_chars: usize) -> Option<String> {
    let url = input.trim();
    if url.is_empty() || char_len(url) > max_chars {
        return None;
    }
    // the parser would percent-encode these instead of rejecting them
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(url.to_string()),
        _ => None,
    }
}

/// True when an archive entry name cannot escape the extraction root.
pub fn is_safe_entry_name(name: &str) -> bool {
    !(name.contains("..") || name.starts_with('/') || name.starts_with('\\'))
}

/// True when `value` has at least one non-whitespace character.
pub fn is_non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

fn strip_escape_sequences(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == 0x1b {
            i += 1;
            if i >= bytes.len() {
                break;
            }
            match bytes[i] {
                b'[' => {
                    // CSI: ends at 0x40-0x7E
                    i += 1;
                    while i < bytes.len() && !(0x40..=0x7E).contains(&bytes[i]) {
                        i += 1;
                    }
                    if i < bytes.len() {
                        i += 1;
                    }
                }
                b']' => {
                    // OSC: ends at BEL or ST
                    i += 1;
                    while i < bytes.len() {
                        if bytes[i] == 0x07 {
                            i += 1;
                            break;
                        }
                        if bytes[i] == 0x1b && i + 1 < bytes.len() && bytes[i + 1] == b'\\' {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                b'N' | b'O' => {
                    i += 1;
                    if i < bytes.len() {
                        i += 1;
                    }
                }
                b'P' => {
                    i += 1;
                    while i < bytes.len() {
                        if bytes[i] == 0x1b && i + 1 < bytes.len() && bytes[i + 1] == b'\\' {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                _ => {
                    i += 1;
                }
            }
        } else if bytes[i] == 0x07 {
            i += 1;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8_lossy(&result).to_string()
}

/// C0 (except `\n`, `\t`), DEL and C1 controls become U+FFFD.
fn replace_control_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            let code = c as u32;
            if c == '\n' || c == '\t' {
                c
            } else if code < 0x20 || code == 0x7F || (0x80..=0x9F).contains(&code) {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(sanitize_terminal("Night Drive"), "Night Drive");
    }

    #[test]
    fn test_csi_and_osc_stripped() {
        assert_eq!(sanitize_terminal("\x1b[1mPixel\x1b[0m"), "Pixel");
        let input = "\x1b]8;;https://example.com\x07click\x1b]8;;\x07";
        assert_eq!(sanitize_terminal(input), "click");
    }

    #[test]
    fn test_control_chars_replaced() {
        assert_eq!(sanitize_terminal("a\x00b"), "a\u{FFFD}b");
        assert_eq!(sanitize_terminal("a\u{009B}b"), "a\u{FFFD}b");
        assert_eq!(sanitize_terminal("line\n\tnext"), "line\n\tnext");
    }

    #[test]
    fn test_clamp_text() {
        assert_eq!(clamp_text("abcdefghij", 5), "ab...");
        assert_eq!(clamp_text("abc", 5), "abc");
        let long = "x".repeat(300);
        assert!(char_len(&sanitize_terminal(&long)) <= TERMINAL_MAX_CHARS);
    }

    #[test]
    fn test_multibyte_length() {
        assert_eq!(char_len("café"), 4);
        assert_eq!(clamp_text("日本語のテキスト", 5), "日本...");
    }

    #[test]
    fn test_sanitize_url_accepts_https() {
        assert_eq!(
            sanitize_url("  https://img.example.com/a.jpg ", 2048).as_deref(),
            Some("https://img.example.com/a.jpg")
        );
        assert!(sanitize_url("HTTPS://cdn.example.com:443/x", 2048).is_some());
    }

    #[test]
    fn test_sanitize_url_rejects() {
        assert!(sanitize_url("http://img.example.com/a.jpg", 2048).is_none());
        assert!(sanitize_url("javascript:alert(1)", 2048).is_none());
        assert!(sanitize_url("https://", 2048).is_none());
        assert!(sanitize_url("https://a.com/x y", 2048).is_none());
        assert!(sanitize_url("", 2048).is_none());
        let long = format!("https://a.com/{}", "p".repeat(100));
        assert!(sanitize_url(&long, 50).is_none());
    }

    #[test]
    fn test_sanitize_url_rejects_malformed_authority() {
        for url in [
            "https://exa<mple.com/a.jpg",
            "https://a.com:99999999/x.jpg",
            "https://%%%/x.jpg",
            "https://a.com:abc/x.jpg",
            "https://[::1/x.jpg",
        ] {
            assert!(sanitize_url(url, 2048).is_none(), "accepted {}", url);
        }
        assert!(sanitize_url("https://[::1]/x.jpg", 2048).is_some());
    }

    #[test]
    fn test_entry_names() {
        assert!(is_safe_entry_name("favorites.json"));
        assert!(!is_safe_entry_name("../../etc/passwd"));
        assert!(!is_safe_entry_name("/etc/passwd"));
        assert!(!is_safe_entry_name("\\windows\\system32"));
        assert!(!is_safe_entry_name("a/../b.json"));
    }

    #[test]
    fn test_non_blank() {
        assert!(is_non_blank("theme"));
        assert!(!is_non_blank("   "));
        assert!(!is_non_blank(""));
    }
}
