use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::manifest::Manifest;
use crate::plan::{PlanWriter, DEFAULT_OUT_DIR};
use crate::platform_mapping::PlatformMapping;
use crate::resolver::Resolver;

pub const LOG_ENV: &str = "PACKPLAN_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "packplan")]
#[command(about = "Resolves package manifests into per-platform, dependency-ordered build plans")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve manifests into a build plan
    Resolve {
        /// Manifest files to load (repeat to merge several declarations)
        #[arg(long = "manifest", env = "PACKPLAN_MANIFEST", default_value = "Package.json")]
        manifests: Vec<PathBuf>,

        /// Only plan for these platforms
        #[arg(long)]
        platform: Vec<String>,

        /// Only plan this product
        #[arg(long)]
        product: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Directory the plan is written to with --write
        #[arg(long, env = "PACKPLAN_OUT_DIR", default_value = DEFAULT_OUT_DIR)]
        out_dir: PathBuf,

        /// Store the JSON plan in the output directory
        #[arg(long)]
        write: bool,
    },

    /// Validate manifests without producing a plan
    Check {
        /// Manifest files to load (repeat to merge several declarations)
        #[arg(long = "manifest", env = "PACKPLAN_MANIFEST", default_value = "Package.json")]
        manifests: Vec<PathBuf>,

        /// Also check that every target path exists next to its manifest
        #[arg(long)]
        verify_paths: bool,
    },

    /// Check for the external packaging tools
    Doctor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Filter for the log subscriber; unset or unparsable directives fall back to `warn`.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            manifests,
            platform,
            product,
            format,
            out_dir,
            write,
        } => resolve_command(&manifests, platform, product, format, &out_dir, write),
        Commands::Check {
            manifests,
            verify_paths,
        } => check_command(&manifests, verify_paths),
        Commands::Doctor => doctor_command(),
    }
}

fn resolve_command(
    manifest_paths: &[PathBuf],
    platforms: Vec<String>,
    product: Option<String>,
    format: OutputFormat,
    out_dir: &Path,
    write: bool,
) -> Result<()> {
    let manifest = load_manifests(manifest_paths, false)?;

    let mut resolver = Resolver::new().with_platforms(platforms);
    if let Some(product) = product {
        resolver = resolver.with_product(product);
    }

    let plan = resolver
        .resolve(&manifest)
        .with_context(|| format!("Failed to resolve package '{}'", manifest.name))?;

    info!(package = %plan.package, products = plan.products.len(), "resolved build plan");

    match format {
        OutputFormat::Text => print!("{}", plan.render_text()),
        OutputFormat::Json => println!("{}", plan.to_json_string()?),
    }

    if write {
        let plan_path = PlanWriter::with_out_dir(out_dir)
            .write_plan(&plan)
            .context("Failed to write build plan")?;

        // Path goes to stderr so JSON on stdout stays parseable
        eprintln!("Plan path: {}", plan_path.display());
    }

    Ok(())
}

fn check_command(manifest_paths: &[PathBuf], verify_paths: bool) -> Result<()> {
    let manifest = load_manifests(manifest_paths, verify_paths)?;

    println!(
        "✓ {} is valid: {} platforms, {} products, {} targets",
        manifest.name,
        manifest.platforms.len(),
        manifest.products.len(),
        manifest.targets.len()
    );

    Ok(())
}

/// Loads every manifest and folds them into one declaration.
pub fn load_manifests(paths: &[PathBuf], verify_paths: bool) -> Result<Manifest> {
    let mut merged: Option<Manifest> = None;

    for path in paths {
        let manifest = Manifest::from_path(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?;

        if verify_paths {
            let root = path.parent().unwrap_or_else(|| Path::new("."));
            manifest
                .verify_paths(root)
                .with_context(|| format!("Invalid target path in {}", path.display()))?;
        }

        merged = Some(match merged {
            Some(existing) => existing
                .merge(manifest)
                .with_context(|| format!("Failed to merge manifest {}", path.display()))?,
            None => manifest,
        });
    }

    let manifest = merged.context("No manifest given")?;
    debug!(package = %manifest.name, sources = paths.len(), "manifests loaded");

    Ok(manifest)
}

fn doctor_command() -> Result<()> {
    println!("Packplan Doctor - Checking packaging tools...\n");

    // Planning itself needs none of these; the build tool consuming the plan does.
    let tools = [
        ("xcodebuild", "Xcode build tool"),
        ("xcrun", "Xcode toolchain runner"),
        ("lipo", "Universal binary tool"),
    ];
    let missing = tools
        .iter()
        .filter(|(command, description)| !check_command_available(command, description))
        .count();

    if missing == 0 {
        println!("\nAll packaging tools found");
    } else {
        println!(
            "\n{} of {} packaging tools missing: plans can be resolved here but not built",
            missing,
            tools.len()
        );
    }

    println!("\nPlatform mapping support:");
    let mapping = PlatformMapping::new();
    for platform in mapping.supported_platforms() {
        if let Some(info) = mapping.map_platform(platform) {
            println!("    {} -> {} ({})", platform, info.sdk, info.deployment_target_var);
        }
    }

    println!("\n✓ Packplan doctor check complete");

    Ok(())
}

fn check_command_available(command: &str, description: &str) -> bool {
    match which::which(command) {
        Ok(path) => {
            println!("✓ {} found at: {}", description, path.display());
            true
        }
        Err(_) => {
            println!("✗ {} not found ({})", description, command);
            false
        }
    }
}
