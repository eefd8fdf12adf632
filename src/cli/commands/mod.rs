//! CLI command implementations (facade).
//!
//! Re-exports the command surface used by `run.rs`. Implementations live in
//! `commands/*`.

mod common;
mod config;
mod health;
mod image;
mod json_emit;
mod narrative;

pub use config::execute_config_command;
pub use health::execute_health_command;
pub use image::execute_image_command;
pub use narrative::{build_narrative_request, execute_narrative_command};
