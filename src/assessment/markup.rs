//! Removal of model reasoning blocks from generated text.

pub const REASONING_OPEN: &str = "<think>";
pub const REASONING_CLOSE: &str = "</think>";

/// Removes every `<think>...</think>` block (shortest match, spanning lines)
/// and trims the remainder.
///
/// Runs to a fixed point, so blocks exposed by an earlier removal go too and
/// applying it twice changes nothing. An opening tag without a close is left
/// in place.
pub fn strip_reasoning(text: &str) -> String {
    let mut current = remove_blocks(text);
    loop {
        let next = remove_blocks(&current);
        if next == current {
            return current.trim().to_string();
        }
        current = next;
    }
}

fn remove_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(REASONING_OPEN) {
        let after_open = &rest[start + REASONING_OPEN.len()..];
        let Some(end) = after_open.find(REASONING_CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &after_open[end + REASONING_CLOSE.len()..];
    }

    out.push_str(rest);
    out
}
