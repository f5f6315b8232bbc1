//! typst-bridge CLI - inspect package imports and manage the package cache
//!
//! Usage:
//!   typst-bridge imports <file.typ> [--output json]
//!   typst-bridge resolve <@namespace/name:version>
//!   typst-bridge packages
//!   typst-bridge config
//!
//! Examples:
//!   typst-bridge imports notes/report.typ
//!   typst-bridge resolve @preview/cetz:0.2.2
//!   RUST_LOG=debug typst-bridge resolve @preview/cetz:0.2.2

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use typst_bridge::config::Settings;
use typst_bridge::package::{parse_imports, unique_specs, PackageResolver, PackageSpec};
use typst_bridge::vfs::{LocalFs, VirtualFs};

#[derive(Parser)]
#[command(name = "typst-bridge")]
#[command(about = "typst-bridge - Typst compile plumbing for note vaults")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the standard lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List package imports in a Typst file
    Imports {
        /// Path to the .typ file
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Resolve a package, downloading it when allowed
    Resolve {
        /// Package as @namespace/name:version
        spec: String,
    },

    /// List packages installed in vault storage
    Packages,

    /// Print the effective configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One import per line
    Text,
    /// Distinct package specs as a JSON array
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Imports { file, output } => cmd_imports(file, output),
        Commands::Resolve { spec } => run_async(cmd_resolve(settings, spec)),
        Commands::Packages => run_async(cmd_packages(settings)),
        Commands::Config => cmd_config(&settings),
    }
}

fn run_async(task: impl std::future::Future<Output = ExitCode>) -> ExitCode {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(task),
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_imports(file: PathBuf, output: OutputFormat) -> ExitCode {
    let source = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let OutputFormat::Json = output {
        return match serde_json::to_string_pretty(&unique_specs(&source)) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let imports = parse_imports(&source);
    if imports.is_empty() {
        println!("No package imports in {}", file.display());
        return ExitCode::SUCCESS;
    }

    for import in imports {
        if import.scoped_imports.is_empty() {
            println!("{}", import.spec);
        } else {
            println!("{} {}", import.spec, import.scoped_imports);
        }
    }
    ExitCode::SUCCESS
}

fn build_resolver(settings: &Settings) -> Result<PackageResolver, String> {
    let root = settings.vault_root().map_err(|e| e.to_string())?;
    let vfs: Arc<dyn VirtualFs> = Arc::new(LocalFs::new(root));
    PackageResolver::from_settings(settings, vfs).map_err(|e| e.to_string())
}

async fn cmd_resolve(settings: Settings, spec: String) -> ExitCode {
    let spec: PackageSpec = match spec.parse() {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let resolver = match build_resolver(&settings) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match resolver.resolve(&spec).await {
        Ok(dir) => {
            println!("{}", dir);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {} (code {})", e, e.status_code());
            ExitCode::FAILURE
        }
    }
}

async fn cmd_packages(settings: Settings) -> ExitCode {
    let resolver = match build_resolver(&settings) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match resolver.list_installed().await {
        Ok(specs) => {
            println!("Packages in {}:", resolver.storage());
            for spec in specs {
                println!("  {}", spec);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error listing packages: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_config(settings: &Settings) -> ExitCode {
    match settings.to_toml() {
        Ok(text) => {
            print!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
