//! Health command implementation
//!
//! Handles `storyforge health`.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use storyforge_orchestrator::{BreakerSnapshot, Orchestrator};

use super::json_emit::emit_json;

#[derive(Serialize)]
struct HealthWithBreakers {
    backends: BTreeMap<String, bool>,
    images: BTreeMap<String, bool>,
    breakers: Vec<BreakerSnapshot>,
}

/// Probe every backend and print the name -> healthy map as JSON.
///
/// An unhealthy backend is reported, not treated as a command failure.
pub async fn execute_health_command(orchestrator: &Orchestrator, breakers: bool) -> Result<()> {
    let health = orchestrator.health_check().await;

    let output = if breakers {
        emit_json(
            &HealthWithBreakers {
                backends: health,
                images: orchestrator.image_support(),
                breakers: orchestrator.breaker_snapshots(),
            },
            "health",
        )?
    } else {
        emit_json(&health, "health")?
    };

    println!("{output}");
    Ok(())
}
