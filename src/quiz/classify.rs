//! Decides from the prefix of a partially streamed reply whether it
//! might turn out to be a quiz payload.
//!
//! Incremental rendering of a reply is only allowed once this returns
//! `false`. Showing half a JSON array as prose is a bug while holding
//! back prose for a few more chunks is not, so anything that could
//! still become a structured opening is treated as structured.

pub const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// Returns true if the trimmed buffer starts like a JSON array, a
/// `json` tagged code fence, or an untagged fence whose first line is
/// an array.
pub fn looks_structured(buffer: &str) -> bool {
    let text = buffer.trim_start();
    if text.is_empty() {
        return false;
    }

    if text.starts_with('[') {
        return true;
    }

    // Still inside the fence marker itself, e.g. "`" or "``"
    if FENCE.starts_with(text) {
        return true;
    }

    let Some(after_fence) = text.strip_prefix(FENCE) else {
        return false;
    };

    // Tagged fence "```json" or a prefix of the tag still arriving
    if after_fence.starts_with(JSON_TAG) || JSON_TAG.starts_with(after_fence) {
        return true;
    }

    // Untagged fence "```\n[" or the newline still waiting on the `[`
    let after_newline = after_fence
        .strip_prefix("\r\n")
        .or_else(|| after_fence.strip_prefix('\n'));
    match after_newline {
        Some(rest) => rest.is_empty() || rest.starts_with('['),
        None => after_fence == "\r",
    }
}
