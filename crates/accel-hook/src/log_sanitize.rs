use std::sync::LazyLock;

use regex::Regex;

const MAX_LOG_CHARS: usize = 4096;
const REDACTED: &str = "***";

static TERMINAL_ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    // CSI, OSC (BEL or ST terminated), DCS/SOS/PM/APC (ST terminated), then lone two-byte escapes.
    Regex::new(
        r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[PX^_][^\x1b]*\x1b\\|\x1b[@-Z\\-_]",
    )
    .expect("escape regex")
});

/// Strip terminal escapes and control characters from one line of child output.
pub fn sanitize_log_line(input: &str) -> String {
    let stripped = TERMINAL_ESCAPES.replace_all(input, "");
    let mut out = String::with_capacity(stripped.len().min(MAX_LOG_CHARS));
    let mut count = 0usize;
    for c in stripped.chars() {
        if count >= MAX_LOG_CHARS {
            out.push_str(" ...[truncated]");
            break;
        }
        match c {
            '\t' => out.push(' '),
            c if c.is_control() || is_bidi_control(c) => continue,
            c => out.push(c),
        }
        count += 1;
    }
    out
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

/// Copy of `argv` with the arguments at `secret_positions` masked.
pub fn redact_argv(argv: &[String], secret_positions: &[usize]) -> Vec<String> {
    argv.iter()
        .enumerate()
        .map(|(i, arg)| {
            if secret_positions.contains(&i) {
                REDACTED.to_string()
            } else {
                arg.clone()
            }
        })
        .collect()
}
