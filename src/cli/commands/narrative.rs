//! Narrative command implementation
//!
//! Handles `storyforge narrative`.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use storyforge_backends::{ImageRequest, ImageResult, NarrativeRequest, NarrativeResult};
use storyforge_orchestrator::Orchestrator;
use storyforge_utils::error::StoryforgeError;

use super::common::read_json_input;
use super::json_emit::emit_json;

#[derive(Serialize)]
struct NarrativeWithImage<'a> {
    narrative: &'a NarrativeResult,
    image: Option<ImageResult>,
}

/// Assemble a request from an optional answers file plus `--answer` pairs.
///
/// Inline answers override file entries with the same key.
pub fn build_narrative_request(
    track_id: String,
    track_title: String,
    answers_file: Option<&Path>,
    inline: Vec<(String, String)>,
) -> Result<NarrativeRequest, StoryforgeError> {
    if track_id.trim().is_empty() {
        return Err(StoryforgeError::InvalidRequest(
            "--track-id must not be blank".to_string(),
        ));
    }

    let mut answers: BTreeMap<String, String> = match answers_file {
        Some(path) => read_json_input(path, "answers file")?,
        None => BTreeMap::new(),
    };
    answers.extend(inline);

    Ok(NarrativeRequest::new(track_id, track_title, answers))
}

/// Generate a narrative and print it as JSON.
///
/// Exhaustion surfaces as `StoryforgeError::Generation` so the caller can
/// map it to exit code 3.
pub async fn execute_narrative_command(
    orchestrator: &Orchestrator,
    request: &NarrativeRequest,
    with_image: bool,
) -> Result<()> {
    let narrative = orchestrator
        .generate_narrative(request)
        .await
        .map_err(StoryforgeError::Generation)?;

    let output = if with_image {
        let image = orchestrator
            .generate_image(&ImageRequest::from((request, &narrative)))
            .await;
        emit_json(
            &NarrativeWithImage {
                narrative: &narrative,
                image,
            },
            "narrative",
        )?
    } else {
        emit_json(&narrative, "narrative")?
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storyforge_orchestrator::testing::{ImageStep, ScriptedBackend};
    use tempfile::TempDir;

    #[test]
    fn test_inline_answers_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"q1": "from file", "q2": "kept"}"#).unwrap();

        let request = build_narrative_request(
            "ocean".to_string(),
            "Ocean".to_string(),
            Some(&path),
            vec![("q1".to_string(), "inline".to_string())],
        )
        .unwrap();

        assert_eq!(request.answers["q1"], "inline");
        assert_eq!(request.answers["q2"], "kept");
    }

    #[test]
    fn test_blank_track_id_is_rejected() {
        let err = build_narrative_request(" ".to_string(), "Ocean".to_string(), None, Vec::new())
            .unwrap_err();
        assert!(matches!(err, StoryforgeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_exhaustion_is_a_generation_error() {
        let orchestrator = Orchestrator::builder()
            .backend(Arc::new(ScriptedBackend::failing("x")))
            .build();
        let request = NarrativeRequest::new("ocean", "Ocean", BTreeMap::new());

        let err = execute_narrative_command(&orchestrator, &request, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoryforgeError>(),
            Some(StoryforgeError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_with_image_tolerates_missing_image() {
        let backend = Arc::new(
            ScriptedBackend::succeeding("text-only").with_image_default(ImageStep::Unsupported),
        );
        let orchestrator = Orchestrator::builder().backend(backend.clone()).build();
        let request = NarrativeRequest::new("ocean", "Ocean", BTreeMap::new());

        execute_narrative_command(&orchestrator, &request, true)
            .await
            .unwrap();
        assert_eq!(backend.narrative_calls(), 1);
        assert_eq!(backend.image_calls(), 1);
    }
}
