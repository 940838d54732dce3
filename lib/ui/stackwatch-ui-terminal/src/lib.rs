//! Terminal front end: config discovery, rendering and the CLI.

pub mod render;
pub mod settings;

#[cfg(feature = "cli")]
pub mod cli;

pub use render::OutputFormat;
pub use settings::{Overrides, config_path};
