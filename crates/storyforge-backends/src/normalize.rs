//! Field normalization for model-produced narratives
//!
//! Models decorate their output with markdown, quotes, and trailing
//! punctuation. These helpers clean each field and reject anything that is
//! still unusable afterwards.

use std::collections::HashSet;

use storyforge_utils::error::BackendError;
use unicode_normalization::UnicodeNormalization;

const TITLE_MIN_WORDS: usize = 3;
const TITLE_MAX_WORDS: usize = 6;
const PARAGRAPH_COUNT: usize = 3;

fn malformed(message: impl Into<String>) -> BackendError {
    BackendError::MalformedOutput(message.into())
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

fn is_markdown_marker(c: char) -> bool {
    matches!(c, '#' | '*' | '_' | '`')
}

fn is_trailing_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '-' | '\u{2014}' | '\u{2013}')
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word(token: &str) -> bool {
    token.chars().any(char::is_alphanumeric)
}

fn trim_title_edges(s: &str) -> &str {
    s.trim_start_matches(|c: char| is_quote(c) || c.is_whitespace())
        .trim_end_matches(|c: char| is_quote(c) || is_trailing_punctuation(c) || c.is_whitespace())
}

/// NFC, strip decoration, collapse whitespace, keep at most six words.
pub(crate) fn title(raw: &str) -> Result<String, BackendError> {
    let nfc: String = raw.nfc().collect();
    let undecorated: String = nfc.chars().filter(|c| !is_markdown_marker(*c)).collect();
    let collapsed = collapse_whitespace(trim_title_edges(&undecorated));

    // a word needs at least one letter or digit; bare dashes and dots are dropped
    let words: Vec<&str> = collapsed.split(' ').filter(|w| is_word(w)).collect();
    if words.len() < TITLE_MIN_WORDS {
        return Err(malformed(format!(
            "title must have at least {TITLE_MIN_WORDS} words, got {:?}",
            collapsed
        )));
    }

    let truncated = words[..words.len().min(TITLE_MAX_WORDS)].join(" ");
    let cleaned = trim_title_edges(&truncated).to_string();
    if cleaned.split(' ').filter(|w| is_word(w)).count() < TITLE_MIN_WORDS {
        return Err(malformed(format!(
            "title must have at least {TITLE_MIN_WORDS} words, got {:?}",
            cleaned
        )));
    }
    Ok(cleaned)
}

/// First sentence of the logline, whitespace collapsed.
pub(crate) fn logline(raw: &str) -> Result<String, BackendError> {
    let collapsed = collapse_whitespace(raw);
    if collapsed.is_empty() {
        return Err(malformed("logline is empty"));
    }

    let mut chars = collapsed.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            return Ok(collapsed[..idx + c.len_utf8()].to_string());
        }
    }
    Ok(collapsed)
}

/// Trim tags, drop empties, de-duplicate case-insensitively keeping order.
pub(crate) fn themes(raw: &[String]) -> Result<Vec<String>, BackendError> {
    let mut seen = HashSet::new();
    let themes: Vec<String> = raw
        .iter()
        .map(|t| collapse_whitespace(t.trim().trim_start_matches('#')))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect();

    if themes.is_empty() {
        return Err(malformed("themes must contain at least one tag"));
    }
    Ok(themes)
}

pub(crate) fn insight(raw: &str) -> Result<String, BackendError> {
    let collapsed = collapse_whitespace(raw);
    if collapsed.is_empty() {
        return Err(malformed("insight is empty"));
    }
    Ok(collapsed)
}

/// Exactly three non-empty paragraphs; extras are dropped.
pub(crate) fn paragraphs(raw: &[String]) -> Result<[String; PARAGRAPH_COUNT], BackendError> {
    let mut kept = raw
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    match (kept.next(), kept.next(), kept.next()) {
        (Some(first), Some(second), Some(third)) => Ok([first, second, third]),
        _ => Err(malformed(format!(
            "paragraphs must contain {PARAGRAPH_COUNT} non-empty entries, got {}",
            raw.iter().filter(|p| !p.trim().is_empty()).count()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_title_strips_decoration() {
        assert_eq!(title("**The Quiet Harbor Light**").unwrap(), "The Quiet Harbor Light");
        assert_eq!(title("\u{201C}Wind Over Salt Flats!\u{201D}").unwrap(), "Wind Over Salt Flats");
        assert_eq!(title("  A   Small  Brave  Thing... ").unwrap(), "A Small Brave Thing");
    }

    #[test]
    fn test_title_truncates_to_six_words() {
        assert_eq!(
            title("One Two Three Four Five Six Seven Eight").unwrap(),
            "One Two Three Four Five Six"
        );
        assert_eq!(
            title("One, Two, Three, Four, Five, Six, Seven").unwrap(),
            "One, Two, Three, Four, Five, Six"
        );
    }

    #[test]
    fn test_title_too_short_is_malformed() {
        assert!(matches!(title("Harbor"), Err(BackendError::MalformedOutput(_))));
        assert!(matches!(title("## \"\""), Err(BackendError::MalformedOutput(_))));
        assert!(title("").is_err());
    }

    #[test]
    fn test_title_ignores_punctuation_only_tokens() {
        assert!(matches!(title("The \u{2014} Harbor"), Err(BackendError::MalformedOutput(_))));
        assert!(matches!(title("Harbor - ... Light"), Err(BackendError::MalformedOutput(_))));
        assert_eq!(title("The Harbor \u{2014} At Night").unwrap(), "The Harbor At Night");
    }

    #[test]
    fn test_title_is_nfc() {
        // "e" + combining acute accent composes to U+00E9
        let decomposed = "Cafe\u{301} At The Corner";
        assert_eq!(title(decomposed).unwrap(), "Caf\u{e9} At The Corner");
    }

    #[test]
    fn test_logline_keeps_first_sentence() {
        assert_eq!(
            logline("A keeper relights the harbor. The ships return.").unwrap(),
            "A keeper relights the harbor."
        );
        assert_eq!(logline("Will she make it? Maybe.").unwrap(), "Will she make it?");
        assert_eq!(logline("No terminal punctuation").unwrap(), "No terminal punctuation");
        assert_eq!(logline("Version 2.5 ships today.").unwrap(), "Version 2.5 ships today.");
        assert!(logline("   ").is_err());
    }

    #[test]
    fn test_themes_dedupe_case_insensitively() {
        let raw: Vec<String> = ["Courage", " courage ", "", "#home", "HOME", "sea"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(themes(&raw).unwrap(), vec!["Courage", "home", "sea"]);
        assert!(themes(&[" ".to_string()]).is_err());
    }

    #[test]
    fn test_paragraphs_exactly_three() {
        let raw: Vec<String> = ["a", " ", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(paragraphs(&raw).unwrap(), ["a", "b", "c"].map(String::from));

        let short: Vec<String> = ["a", "b", ""].iter().map(|s| s.to_string()).collect();
        let err = paragraphs(&short).unwrap_err();
        assert!(err.to_string().contains("got 2"));
    }

    proptest! {
        #[test]
        fn prop_title_word_count_in_range(words in proptest::collection::vec("[A-Za-z]{1,8}", 3..12)) {
            let normalized = title(&words.join(" ")).unwrap();
            let count = normalized.split(' ').count();
            prop_assert!((TITLE_MIN_WORDS..=TITLE_MAX_WORDS).contains(&count));
        }
    }
}
