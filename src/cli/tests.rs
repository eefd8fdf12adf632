//! Argument parsing tests

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

use super::args::{Cli, Commands, parse_answer};

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "storyforge",
        "health",
        "--backends",
        "gemini,openai",
        "--attempt-timeout",
        "20",
        "--log-json",
        "-v",
    ])
    .unwrap();

    assert_eq!(cli.backends.as_deref(), Some("gemini,openai"));
    assert_eq!(cli.attempt_timeout, Some(20));
    assert!(cli.log_json);
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::Health { breakers: false }));
}

#[test]
fn test_narrative_collects_repeated_answers() {
    let cli = Cli::try_parse_from([
        "storyforge",
        "narrative",
        "--track-id",
        "ocean",
        "--track-title",
        "Ocean",
        "--answer",
        "q1=The sea at dawn",
        "--answer",
        "q2=a=b",
        "--answers-file",
        "answers.json",
        "--with-image",
    ])
    .unwrap();

    match cli.command {
        Commands::Narrative {
            track_id,
            track_title,
            answers,
            answers_file,
            with_image,
        } => {
            assert_eq!(track_id, "ocean");
            assert_eq!(track_title, "Ocean");
            assert_eq!(
                answers,
                vec![
                    ("q1".to_string(), "The sea at dawn".to_string()),
                    ("q2".to_string(), "a=b".to_string()),
                ]
            );
            assert_eq!(answers_file, Some(PathBuf::from("answers.json")));
            assert!(with_image);
        }
        other => panic!("Expected narrative command, got {other:?}"),
    }
}

#[test]
fn test_narrative_requires_track() {
    let err = Cli::try_parse_from(["storyforge", "narrative", "--track-id", "ocean"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[test]
fn test_malformed_answer_is_rejected_by_parser() {
    let result = Cli::try_parse_from([
        "storyforge",
        "narrative",
        "--track-id",
        "ocean",
        "--track-title",
        "Ocean",
        "--answer",
        "no-equals-sign",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_parse_answer() {
    assert_eq!(
        parse_answer(" q1 =value").unwrap(),
        ("q1".to_string(), "value".to_string())
    );
    assert_eq!(parse_answer("q1=").unwrap(), ("q1".to_string(), String::new()));
    assert!(parse_answer("=value").is_err());
    assert!(parse_answer("value").is_err());
}

#[test]
fn test_config_json_flag() {
    let cli = Cli::try_parse_from(["storyforge", "--config", "custom.toml", "config", "--json"])
        .unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    assert!(matches!(cli.command, Commands::Config { json: true }));
    assert_eq!(cli.command.name(), "config");
}
