//! Removes Markdown code fences that models like to wrap JSON in even
//! when asked not to.
use super::classify::FENCE;

/// Splits text that opens with a fence marker into the interior of the
/// block and whatever follows the block's closing line. The closing
/// line is the first line after the opening one that holds only a
/// fence marker. Without one the block runs to the end of the text.
fn split_block(text: &str) -> Option<(&str, &str)> {
    let after_marker = text.strip_prefix(FENCE)?;
    let Some(newline) = after_marker.find('\n') else {
        // Everything on one line, e.g. "```json [1] ```"
        let inline = after_marker
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
            .trim_end();
        return Some((inline.strip_suffix(FENCE).unwrap_or(inline), ""));
    };

    // Drop the rest of the opening line, including any language tag
    let body = &after_marker[newline + 1..];
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim() == FENCE {
            return Some((&body[..offset], &body[offset + line.len()..]));
        }
        offset += line.len();
    }

    let body = body.trim_end();
    Some((body.strip_suffix(FENCE).unwrap_or(body), ""))
}

/// Returns the interior of a fenced block, trimmed. Text after the
/// block's closing line is dropped. Text without a leading fence is
/// returned trimmed and otherwise unchanged.
///
/// Only call this on a complete reply since the closing marker may
/// not have arrived yet on a partial one.
pub fn strip_fences(text: &str) -> String {
    let mut current = text.trim();

    // Loop so that nested fences are fully unwrapped, which keeps the
    // function idempotent.
    while let Some((interior, _)) = split_block(current) {
        current = interior.trim();
    }

    current.to_string()
}

/// True if the text opens with a fenced block and carries on after the
/// block is closed, like an example followed by an explanation.
pub fn has_text_after_fence(text: &str) -> bool {
    split_block(text.trim()).is_some_and(|(_, rest)| !rest.trim().is_empty())
}

/// True if the trimmed text opens with a fence marker.
pub fn has_fence(text: &str) -> bool {
    text.trim_start().starts_with(FENCE)
}
