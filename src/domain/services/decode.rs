#[cfg(test)]
#[path = "decode_test.rs"]
mod tests;

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("no JSON object found in the response")]
    NoObject,
    #[error("response is not the expected structure: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Slice from the first `{` to the last `}`.
///
/// Known limitation: only the outermost braces are located, nothing is
/// balanced. Prose after the object that itself contains a `}` extends the
/// slice past the real end and the decode fails.
pub fn outermost_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    return Some(&raw[start..=end]);
}

/// Decodes a model answer that should be a single JSON object. The whole
/// text is tried first, then the outermost brace slice.
pub fn decode_embedded<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    if let Ok(res) = serde_json::from_str::<T>(raw.trim()) {
        return Ok(res);
    }

    let slice = outermost_braces(raw).ok_or(DecodeError::NoObject)?;
    let res = serde_json::from_str::<T>(slice)?;

    return Ok(res);
}
