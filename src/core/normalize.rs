//! Output normalization applied to both actual and expected output before comparison

const FENCE: &str = "```";

/// Canonicalize text for comparison.
///
/// Rules: CRLF becomes LF, surrounding whitespace is trimmed, and a markdown code
/// fence wrapping the whole text is removed (expected outputs are sometimes stored
/// fenced). The rules are re-applied until the text stops changing, so the result is
/// a fixed point: `normalize(normalize(s)) == normalize(s)`.
///
/// The fence rule only checks that the text starts with ```` ``` ```` and that the last
/// line contains one, so output that merely begins with a fence is stripped as well.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_once(text);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = text.replace("\r\n", "\n");
    let text = text.trim();

    let text = match strip_fence(text) {
        Some(inner) => inner,
        None => text.to_string(),
    };

    text.trim().to_string()
}

/// Interior lines of a fenced block, if `text` looks like one
fn strip_fence(text: &str) -> Option<String> {
    if !text.starts_with(FENCE) {
        return None;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    match lines.as_slice() {
        [_, inner @ .., last] if last.contains(FENCE) => Some(inner.join("\n")),
        _ => None,
    }
}
