//! Markdown fence removal for model replies.
//!
//! Models asked for raw JSON still sometimes answer with
//!
//! ````text
//! ```json
//! { ... }
//! ```
//! ````
//!
//! The validator rejects that as malformed on purpose; callers that want to
//! tolerate it strip the fence here first.

const FENCE: &str = "```";

/// Drop a leading fence line (with any info string such as `json`) and a
/// closing line consisting only of a fence. Input that does not start with a
/// fence is returned unchanged.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with(FENCE) {
        return raw;
    }

    let body = match trimmed.split_once('\n') {
        Some((_, rest)) => rest.trim_end(),
        None => return "",
    };

    match body.rsplit_once('\n') {
        Some((head, last)) if last.trim() == FENCE => head,
        None if body.trim() == FENCE => "",
        _ => body,
    }
}
