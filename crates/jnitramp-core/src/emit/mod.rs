//! Artifact emitters. Each takes a generated [`Bundle`](crate::table::Bundle)
//! and renders it without further validation.

pub mod c;
pub mod json;

use jnitramp_config::{OutputConfig, OutputFormat};

use crate::error::EmitError;
use crate::table::Bundle;

/// Tool name stamped into every artifact.
pub const GENERATOR: &str = concat!("jnitramp ", env!("CARGO_PKG_VERSION"));

/// Render `bundle` in the configured format.
pub fn render(bundle: &Bundle, output: &OutputConfig) -> Result<String, EmitError> {
    match output.format {
        OutputFormat::C => c::render(bundle, output),
        OutputFormat::Json => json::render(bundle),
    }
}
