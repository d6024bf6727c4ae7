//!
//! Generate job structs for the lambda jobs in a file or source tree.
//!
//! Usage: `lambdajob <path> [--config FILE] [--dry-run] [--patch]`

use clap::Parser;
use lambdajob::{GeneratedFile, GeneratorConfig, compile_source, generate_dir, output_path};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "lambdajob")]
#[command(about = "Generate job structs for Entities.ForEach and Job.WithCode lambdas")]
struct Args {
    /// Source file or directory
    path: PathBuf,

    /// YAML generator configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not emit #line directives
    #[arg(long = "no-line-directives")]
    no_line_directives: bool,

    /// Enabled-bit edges up to which chunks are walked as ranges
    #[arg(long = "edge-threshold")]
    edge_threshold: Option<u32>,

    /// Jobs without WithBurst/WithoutBurst are not Burst compiled
    #[arg(long = "no-default-burst")]
    no_default_burst: bool,

    /// Treat warnings as failures
    #[arg(long = "fail-on-warnings")]
    fail_on_warnings: bool,

    /// Report what would be written without touching the filesystem
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Also rewrite the sources, replacing each lambda job with its execute call
    #[arg(long)]
    patch: bool,
}

fn load_config(args: &Args) -> GeneratorConfig {
    let mut config = match &args.config {
        Some(path) => match GeneratorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path.display(), e);
                process::exit(2);
            }
        },
        None => GeneratorConfig::default(),
    };

    if args.no_line_directives {
        config.emit_line_directives = false;
    }
    if let Some(threshold) = args.edge_threshold {
        config.enabled_mask_edge_threshold = threshold;
    }
    if args.no_default_burst {
        config.default_burst = false;
    }
    if args.fail_on_warnings {
        config.fail_on_warnings = true;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(2);
    }
    config
}

fn generate_file(path: &Path, config: &GeneratorConfig) -> Vec<GeneratedFile> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            process::exit(1);
        }
    };

    let result = compile_source(path, &text, config);
    if result.is_failure(config) {
        error!("{}", result.format_diagnostics().trim_end());
        process::exit(1);
    }
    if !result.diagnostics.is_empty() {
        warn!("{}", result.format_diagnostics().trim_end());
    }
    if result.types.is_empty() {
        return Vec::new();
    }

    vec![GeneratedFile {
        source_path: path.to_path_buf(),
        output_path: output_path(path, &config.output_suffix),
        contents: result.generated_text(),
        patched_source: result.patched_source,
    }]
}

fn write(path: &Path, contents: &str) {
    if let Err(e) = fs::write(path, contents) {
        error!("Failed to write {}: {}", path.display(), e);
        process::exit(1);
    }
}

fn main() {
    lambdajob_tools::init_logging();

    let args = Args::parse();
    let config = load_config(&args);

    let files = if args.path.is_dir() {
        match generate_dir(&args.path, &config) {
            Ok(files) => files,
            Err(e) => {
                error!("{}", e.to_string().trim_end());
                process::exit(1);
            }
        }
    } else {
        generate_file(&args.path, &config)
    };

    if files.is_empty() {
        info!("No lambda jobs found in {}", args.path.display());
        return;
    }

    for file in &files {
        if args.dry_run {
            info!("Would write {}", file.output_path.display());
            continue;
        }
        write(&file.output_path, &file.contents);
        info!("Wrote {}", file.output_path.display());
        if args.patch {
            write(&file.source_path, &file.patched_source);
            info!("Patched {}", file.source_path.display());
        }
    }
}
