//! Config command implementation
//!
//! Handles `storyforge config`.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use storyforge_config::Config;

use super::json_emit::emit_json;

#[derive(Serialize)]
struct ConfigValue {
    value: String,
    source: String,
}

#[derive(Serialize)]
struct ConfigOutput {
    values: BTreeMap<String, ConfigValue>,
    warnings: Vec<String>,
}

/// Print the effective configuration with the source of each value
pub fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let output = ConfigOutput {
            values: effective
                .into_iter()
                .map(|(key, (value, source))| (key, ConfigValue { value, source }))
                .collect(),
            warnings: config.warnings.clone(),
        };
        println!("{}", emit_json(&output, "config")?);
        return Ok(());
    }

    println!("Effective configuration:");
    println!("========================");
    for (key, (value, source)) in &effective {
        println!("  {key} = {value}  ({source})");
    }

    if !config.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &config.warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
