//! Recovers JSON objects embedded in free-form model output.
//!
//! Grammar accepted for one block:
//!
//! ```text
//! block  := "```json" ws* object ws* "```"
//! object := "{" ... "}"   (braces balanced, braces inside JSON strings ignored)
//! ```
//!
//! Anything else between fences is skipped. A block whose object fails to
//! parse is logged and skipped; scanning continues after its closing fence,
//! or at the next ` ```json ` marker when that comes first.

use serde_json::Value;

const OPEN_FENCE: &str = "```json";
const CLOSE_FENCE: &str = "```";

/// A candidate block found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Byte offset of the opening fence
    pub offset: usize,
    /// The object text, or the raw block body when it is malformed
    pub body: &'a str,
    /// False when the braces never balance or the object is not followed by
    /// the closing fence
    pub well_formed: bool,
}

/// All ` ```json ` candidates in order of appearance.
pub fn scan_fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(OPEN_FENCE) {
        let offset = cursor + found;
        let after_marker = offset + OPEN_FENCE.len();
        let body_start = skip_whitespace(text, after_marker);

        if !text[body_start..].starts_with('{') {
            // "```json" with no object behind it, e.g. "```jsonc" or prose
            cursor = after_marker;
            continue;
        }

        let search_from = match balanced_object_end(text, body_start) {
            Some(object_end) => {
                let close_at = skip_whitespace(text, object_end);
                if text[close_at..].starts_with(CLOSE_FENCE) {
                    blocks.push(FencedBlock {
                        offset,
                        body: &text[body_start..object_end],
                        well_formed: true,
                    });
                    cursor = close_at + CLOSE_FENCE.len();
                    continue;
                }
                // Trailing junk after the object
                object_end
            }
            // Truncated object, the braces never balance
            None => body_start,
        };

        match recovery_point(text, search_from) {
            Some((body_end, resume_at)) => {
                blocks.push(FencedBlock {
                    offset,
                    body: &text[body_start..body_end],
                    well_formed: false,
                });
                cursor = resume_at;
            }
            None => {
                blocks.push(FencedBlock {
                    offset,
                    body: &text[body_start..],
                    well_formed: false,
                });
                break;
            }
        }
    }

    blocks
}

/// Parses every well-formed block, in order. Malformed blocks are logged and
/// skipped; an empty result means nothing usable was found.
pub fn extract_json_blocks(text: &str) -> Vec<Value> {
    let mut documents = Vec::new();

    for block in scan_fenced_blocks(text) {
        if !block.well_formed {
            log::warn!(
                "⚠️ Skipping malformed JSON block at byte {} ({} bytes)",
                block.offset,
                block.body.len()
            );
            continue;
        }
        match serde_json::from_str::<Value>(block.body) {
            Ok(value) => documents.push(value),
            Err(e) => {
                log::warn!("⚠️ Invalid JSON found at byte {}: {}", block.offset, e);
            }
        }
    }

    documents
}

/// Where a malformed block ends and where scanning picks up again. The next
/// fence closes the block, unless it opens another ` ```json ` block: that
/// marker is left for the scanner.
fn recovery_point(text: &str, from: usize) -> Option<(usize, usize)> {
    let close_at = from + text[from..].find(CLOSE_FENCE)?;
    if text[close_at..].starts_with(OPEN_FENCE) {
        Some((close_at, close_at))
    } else {
        Some((close_at, close_at + CLOSE_FENCE.len()))
    }
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    from + (rest.len() - rest.trim_start().len())
}

/// Byte offset just past the `}` closing the object that opens at `start`.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
