use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use typeconv_codegen::RenderConfig;
use typeconv_core::{generate_package, Options, Universe};

#[derive(Parser)]
#[command(name = "typeconv")]
#[command(about = "Generate structural type conversions between versioned API packages")]
#[command(version)]
struct Cli {
    /// Type universe JSON exported by the declaration front end
    universe: PathBuf,

    /// Package import path to generate conversions for (repeatable)
    #[arg(short, long = "package", required = true)]
    packages: Vec<String>,

    /// Directory the generated file tree is written under
    #[arg(short, long, default_value = ".")]
    output_base: PathBuf,

    /// File name of the generated source file in each package directory
    #[arg(long, default_value = "zz_generated_conversions.go")]
    output_file: String,

    /// File whose contents are injected at the top of every generated file
    #[arg(long)]
    header_file: Option<PathBuf>,

    /// Never emit unsafe reinterpretation for memory-equivalent types
    #[arg(long)]
    skip_unsafe: bool,

    /// Peer package appended to every package's own peer list (repeatable)
    #[arg(long = "base-peer-package")]
    base_peer_packages: Vec<String>,

    /// Additional peer package appended after the base list (repeatable)
    #[arg(long = "extra-peer-package")]
    extra_peer_packages: Vec<String>,

    /// Package scanned for manual conversions only (repeatable)
    #[arg(long = "extra-package")]
    extra_packages: Vec<String>,

    /// Also write each package's typed operation list as a JSON sidecar
    #[arg(long)]
    emit_ir: bool,

    /// Print generated sources to stdout instead of writing files
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for --dry-run output.
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let raw = fs::read_to_string(&cli.universe)
        .with_context(|| format!("Failed to read universe: {}", cli.universe.display()))?;
    let universe = Universe::from_json(&raw)
        .with_context(|| format!("Failed to parse universe: {}", cli.universe.display()))?;

    let options = Options {
        unsafe_reinterpret: !cli.skip_unsafe,
        base_peer_packages: cli.base_peer_packages.clone(),
        extra_peer_packages: cli.extra_peer_packages.clone(),
        extra_packages: cli.extra_packages.clone(),
    };

    let header = match &cli.header_file {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read header file: {}", path.display()))?,
        ),
        None => None,
    };
    let render_config = RenderConfig {
        output_base: cli.output_base.clone(),
        file_name: cli.output_file.clone(),
        header,
    };

    let mut processed = HashSet::new();
    for package in &cli.packages {
        if !processed.insert(package.clone()) {
            continue;
        }

        let artifact = generate_package(&universe, package, &options)
            .with_context(|| format!("Generation failed for package: {}", package))?;
        let Some(artifact) = artifact else {
            tracing::warn!(package = %package, "package carries no conversion marker, skipping");
            continue;
        };

        if cli.dry_run {
            let source = typeconv_codegen::golang::render(
                &universe,
                &artifact,
                render_config.header.as_deref(),
            )
                .with_context(|| format!("Rendering failed for package: {}", package))?;
            println!("{}", source);
            continue;
        }

        let path = typeconv_codegen::write_artifact(&render_config, &universe, &artifact)
            .with_context(|| format!("Failed to write artifact for package: {}", package))?;
        tracing::debug!(path = %path.display(), "wrote conversions");

        if cli.emit_ir {
            let ir_path = path.with_extension("json");
            let ir = serde_json::to_string_pretty(&artifact)
                .context("Failed to serialize operation list")?;
            fs::write(&ir_path, ir)
                .with_context(|| format!("Failed to write IR sidecar: {}", ir_path.display()))?;
        }
    }

    Ok(())
}
