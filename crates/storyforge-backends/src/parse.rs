//! Response-text parsing shared by every adapter

use storyforge_utils::error::BackendError;

use crate::types::NarrativeResult;

/// Slice from the first `{` to the last `}`.
///
/// Tolerates prose or Markdown code fences around the JSON object.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse model output text into a validated narrative.
pub(crate) fn parse_narrative(text: &str, provider: &str) -> Result<NarrativeResult, BackendError> {
    let json = extract_json_object(text).ok_or_else(|| {
        BackendError::MalformedOutput(format!("{provider} response contains no JSON object"))
    })?;

    serde_json::from_str(json).map_err(|e| {
        BackendError::MalformedOutput(format!("{provider} narrative rejected: {e}"))
    })
}
