//! Helpers shared by CLI commands

use serde::de::DeserializeOwned;
use std::path::Path;

use storyforge_utils::error::StoryforgeError;

/// Read and parse a JSON input file supplied on the command line.
///
/// Both an unreadable file and invalid JSON are request errors (exit code 2).
pub(crate) fn read_json_input<T: DeserializeOwned>(
    path: &Path,
    what: &str,
) -> Result<T, StoryforgeError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StoryforgeError::InvalidRequest(format!("cannot read {what} {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        StoryforgeError::InvalidRequest(format!("{what} {} is not valid: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_reads_json_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"q1": "The sea"}"#).unwrap();

        let answers: BTreeMap<String, String> = read_json_input(&path, "answers file").unwrap();
        assert_eq!(answers["q1"], "The sea");
    }

    #[test]
    fn test_missing_file_is_invalid_request() {
        let dir = TempDir::new().unwrap();
        let err = read_json_input::<BTreeMap<String, String>>(
            &dir.path().join("absent.json"),
            "answers file",
        )
        .unwrap_err();
        match err {
            StoryforgeError::InvalidRequest(msg) => {
                assert!(msg.contains("cannot read answers file"));
            }
            other => panic!("Expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_invalid_request() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"["not", "an", "object"]"#).unwrap();

        let err = read_json_input::<BTreeMap<String, String>>(&path, "answers file").unwrap_err();
        assert!(matches!(err, StoryforgeError::InvalidRequest(_)));
    }
}
