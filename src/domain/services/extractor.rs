#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;

use uuid::Uuid;

use crate::domain::models::Script;

/// Literal the model is told to put in front of its explanation.
pub const REPLY_MARKER: &str = "Reply:";

/// Reply used when the model ignored the marker.
pub const NO_REPLY_SENTINEL: &str = "No response found.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub reply: String,
    pub scripts: Vec<Script>,
}

struct Fence {
    language: String,
    lines: Vec<String>,
}

fn fallback_filename(extension: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    return format!("script_{}.{extension}", &id[..8]);
}

fn extract_reply(raw: &str) -> String {
    let start = match raw.find(REPLY_MARKER) {
        Some(idx) => idx + REPLY_MARKER.len(),
        None => return NO_REPLY_SENTINEL.to_string(),
    };

    let rest = &raw[start..];
    let end = rest.find("```").unwrap_or(rest.len());

    return rest[..end].trim().to_string();
}

fn fences(raw: &str) -> Vec<Fence> {
    let mut fences: Vec<Fence> = vec![];
    let mut current: Option<Fence> = None;

    for line in raw.split('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if let Some(fence) = current.take() {
                fences.push(fence);
            } else {
                current = Some(Fence {
                    language: trimmed.trim_start_matches('`').trim().to_string(),
                    lines: vec![],
                });
            }
            continue;
        }

        if let Some(fence) = current.as_mut() {
            fence.lines.push(line.trim_end_matches('\r').to_string());
        }
    }

    // An unterminated block at the end of the completion still counts.
    if let Some(fence) = current.take() {
        fences.push(fence);
    }

    return fences;
}

// A block with a usable header is always a script. Otherwise the fence tag
// decides, and non-source tags (json, text, ...) are skipped.
fn to_script(fence: Fence) -> Option<Script> {
    let header = fence
        .lines
        .first()
        .and_then(|line| return Script::parse_header(line));

    if let Some((filename, version)) = &header {
        if Script::is_valid_filename(filename) {
            let content = fence.lines[1..].join("\n");
            return Some(Script::new(filename, *version, &content));
        }
    }

    let extension = Script::extension_for_language(&fence.language)?;
    if let Some((filename, version)) = header {
        tracing::warn!(filename = %filename, "Model declared an unusable filename, generating one");
        let content = fence.lines[1..].join("\n");
        return Some(Script::new(&fallback_filename(&extension), version, &content));
    }

    return Some(Script::new(
        &fallback_filename(&extension),
        1,
        &fence.lines.join("\n"),
    ));
}

/// Splits a raw completion into the user facing reply and every source code
/// block, in order of appearance. Blocks without a header comment are kept
/// under a generated name.
pub fn extract(raw: &str) -> Extraction {
    let scripts = fences(raw)
        .into_iter()
        .filter_map(to_script)
        .collect::<Vec<Script>>();

    return Extraction {
        reply: extract_reply(raw),
        scripts,
    };
}
