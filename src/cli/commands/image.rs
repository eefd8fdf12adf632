//! Image command implementation
//!
//! Handles `storyforge image`. Never fails because backends are exhausted;
//! the output is `{"image": null}` instead.

use anyhow::Result;
use serde_json::json;
use std::path::Path;

use storyforge_backends::ImageRequest;
use storyforge_orchestrator::Orchestrator;

use super::common::read_json_input;
use super::json_emit::emit_json;

/// Generate an image for the request stored in `request_path`
pub async fn execute_image_command(orchestrator: &Orchestrator, request_path: &Path) -> Result<()> {
    let request: ImageRequest = read_json_input(request_path, "image request")?;
    let image = orchestrator.generate_image(&request).await;
    println!("{}", emit_json(&json!({ "image": image }), "image")?);
    Ok(())
}
