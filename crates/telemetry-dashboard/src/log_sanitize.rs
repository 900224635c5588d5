/// Default length of a logged upstream body.
pub const BODY_PREVIEW_CHARS: usize = 256;

/// Single-line, bounded view of untrusted text for logs and terminal cells.
/// Escape sequences and control characters are dropped, whitespace runs
/// collapse to one space.
pub fn sanitize_preview(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars));
    let mut in_escape = false;
    let mut pending_space = false;
    let mut count = 0usize;

    for c in input.chars() {
        if in_escape {
            // CSI/OSC bodies end on a final byte in '@'..='~' or BEL.
            if ('@'..='~').contains(&c) && c != '[' && c != ']' || c == '\x07' {
                in_escape = false;
            }
            continue;
        }
        if c == '\x1b' {
            in_escape = true;
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() || is_bidi_control(c) {
            continue;
        }
        if count >= max_chars {
            out.push_str(" ...[truncated]");
            return out;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
        count += 1;
    }
    out
}

fn is_bidi_control(c: char) -> bool {
    c == '\u{061C}'
        || c == '\u{200E}'
        || c == '\u{200F}'
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::sanitize_preview;

    #[test]
    fn strips_escapes_and_collapses_whitespace() {
        let got = sanitize_preview("{\n  \"placa\": \u{1b}[31m\"ABC\"\u{1b}[0m\t}", 100);
        assert_eq!(got, "{ \"placa\": \"ABC\" }");
    }

    #[test]
    fn truncates_long_bodies() {
        let body = "x".repeat(40);
        let got = sanitize_preview(&body, 10);
        assert_eq!(got, format!("{} ...[truncated]", "x".repeat(10)));
    }

    #[test]
    fn drops_bidi_controls() {
        assert_eq!(sanitize_preview("a\u{202e}b", 10), "ab");
    }
}
