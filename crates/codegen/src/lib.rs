pub mod golang;

use std::path::PathBuf;

use anyhow::Result;
use typeconv_core::{PackageArtifact, Universe};

/// Configuration for rendering artifacts to disk.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Directory the per-package output tree is created under.
    pub output_base: PathBuf,
    /// File name of the generated source file in each package directory.
    pub file_name: String,
    /// Boilerplate text injected verbatim at the top of every file
    /// (license headers and the like).
    pub header: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_base: PathBuf::from("."),
            file_name: "zz_generated_conversions.go".to_string(),
            header: None,
        }
    }
}

/// Render one package artifact and write it under the output base, mirroring
/// the package's import path. Returns the written file path.
pub fn write_artifact(
    config: &RenderConfig,
    universe: &Universe,
    artifact: &PackageArtifact,
) -> Result<PathBuf> {
    golang::write_package(config, universe, artifact)
}
