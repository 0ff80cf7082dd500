use std::{borrow::Cow, time::Duration};

/// Cut `text` down to at most `max` characters, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cut `text` to `max` characters and append `...` when anything was removed.
pub fn ellipsize(text: &str, max: usize) -> Cow<'_, str> {
    let truncated = truncate_chars(text, max);
    if truncated.len() == text.len() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{truncated}..."))
    }
}

/// Format an uptime as `1d 2h 3m 4s`, omitting leading zero units.
pub fn format_uptime(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (days, hours, minutes, seconds) =
        (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60, secs % 60);
    let mut out = String::new();
    for (value, unit) in [(days, "d"), (hours, "h"), (minutes, "m")] {
        if value > 0 || !out.is_empty() {
            out.push_str(&format!("{value}{unit} "));
        }
    }
    out.push_str(&format!("{seconds}s"));
    out
}
