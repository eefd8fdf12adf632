//! Prompt construction for narrative and image requests

use crate::types::{ImageRequest, NarrativeRequest};

/// System and user text for one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prompt {
    pub system: String,
    pub user: String,
}

const NARRATIVE_SYSTEM: &str = "You write short, warm, reflective stories for young readers. \
Respond with a single JSON object and nothing else, using exactly these keys: \
\"title\" (3 to 6 words), \"logline\" (one sentence), \"themes\" (array of short tags), \
\"insight\" (one or two sentences), \"paragraphs\" (array of exactly 3 paragraphs).";

/// Build the narrative prompt. Blank answers are left out.
pub(crate) fn narrative_prompt(request: &NarrativeRequest) -> Prompt {
    let mut user = format!(
        "Track: {} ({})\n",
        request.track_title.trim(),
        request.track_id.trim()
    );

    let answers: Vec<String> = request
        .non_blank_answers()
        .map(|(question, answer)| format!("- {question}: {answer}"))
        .collect();

    if answers.is_empty() {
        user.push_str("The reader gave no answers; invent gentle details that fit the track.\n");
    } else {
        user.push_str("The reader answered:\n");
        user.push_str(&answers.join("\n"));
        user.push('\n');
    }
    user.push_str("Write the story now.");

    Prompt {
        system: NARRATIVE_SYSTEM.to_string(),
        user,
    }
}

/// Single descriptive prompt for image models
pub(crate) fn image_prompt(request: &ImageRequest) -> String {
    let mut prompt = format!(
        "A storybook illustration for \"{}\": {}",
        request.title.trim(),
        request.logline.trim()
    );

    let themes: Vec<&str> = request
        .themes
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !themes.is_empty() {
        prompt.push_str(&format!(" Themes: {}.", themes.join(", ")));
    }

    for paragraph in request
        .paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .take(3)
    {
        prompt.push(' ');
        prompt.push_str(paragraph);
    }

    prompt.push_str(&format!(
        " Setting inspired by the {} track. Soft colors, no text in the image.",
        request.track_title.trim()
    ));
    prompt
}
