use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symdex::indexing::{FileAnalysis, NamingContext, Pipeline, PipelineConfig, index_metadata};
use symdex::package::{PackageRegistry, PipEnvironment, cache_path_for, choose_source, write_cache};
use symdex::snapshot::{self, SnapshotMode, SnapshotSuite};
use symdex::{FailurePolicy, PackageSource, ProjectIdentity, Settings, SymbolBuilder, logging};

#[derive(Parser)]
#[command(name = "symdex")]
#[command(about = "Assign SCIP symbols to analyzed source files and assemble the index")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the nearest .symdex/settings.toml)
    #[arg(long, global = true, env = "SYMDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    Config,

    /// Name every analyzed file and write the index
    Index {
        /// Directory of analyzer output (overrides config)
        #[arg(short, long)]
        analysis: Option<PathBuf>,

        /// Index file to write (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Project root (overrides config)
        #[arg(long)]
        project_root: Option<PathBuf>,

        #[arg(long)]
        project_name: Option<String>,

        #[arg(long)]
        project_version: Option<String>,

        /// Cached package environment to use instead of querying pip
        #[arg(long)]
        environment: Option<PathBuf>,

        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Stop at the first file that fails to index
        #[arg(long)]
        abort_on_error: bool,

        /// Also write a rendered snapshot of every document here
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },

    /// Check or update a snapshot suite
    Snapshot {
        /// Suite root (contains input/, analysis/, output/)
        root: PathBuf,

        /// Only run this case
        #[arg(long)]
        only: Option<String>,

        /// Compare against goldens instead of rewriting them
        #[arg(long)]
        check: bool,

        /// Cached package environment (defaults to <root>/environment.json)
        #[arg(long)]
        environment: Option<PathBuf>,

        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Query pip and write a package environment cache
    Environment {
        /// Cache file to write (defaults to the cache dir, keyed by version)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Version key for the default cache file name
        #[arg(long)]
        project_version: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let mut settings = loaded.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });
    if cli.debug {
        settings.logging.default = "debug".to_string();
    }
    logging::init_with_config(&settings.logging);

    match run(cli.command, settings) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Run one command. `Ok(false)` means it completed but found problems.
fn run(command: Commands, mut settings: Settings) -> Result<bool> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("Failed to create configuration")?;
            println!("Created configuration file at: {}", path.display());
            Ok(true)
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(true)
        }

        Commands::Index {
            analysis,
            output,
            project_root,
            project_name,
            project_version,
            environment,
            threads,
            abort_on_error,
            snapshot_dir,
        } => {
            if let Some(t) = threads {
                settings.indexing.threads = t;
            }
            if abort_on_error {
                settings.indexing.failure_policy = FailurePolicy::Abort;
            }
            let root = project_root.unwrap_or_else(|| settings.project_root());
            let identity = ProjectIdentity::resolve(
                &root,
                project_name.as_deref().or(settings.project.name.as_deref()),
                project_version
                    .as_deref()
                    .or(settings.project.version.as_deref()),
            )?;

            let environment = environment.or_else(|| settings.packages.environment.clone());
            let source = choose_source(environment.as_deref(), Box::new(pip(&settings)));
            let registry = PackageRegistry::load(source.as_ref())?;

            let analysis_dir = analysis.unwrap_or_else(|| settings.indexing.analysis_dir.clone());
            let files = FileAnalysis::load_dir(&analysis_dir)?;
            let total = files.len();
            if files.is_empty() {
                eprintln!("Warning: no analyzer output found in {}", analysis_dir.display());
            }

            let context = NamingContext::new(
                SymbolBuilder::new(settings.ecosystem()),
                settings.packages.manager.clone(),
                identity,
                root.clone(),
                Arc::new(registry),
            );
            let pipeline = Pipeline::new(context, PipelineConfig::from_settings(&settings));
            let arguments: Vec<String> = std::env::args().skip(1).collect();
            let report = pipeline.run_files(index_metadata(&root, arguments), files)?;

            for failure in &report.failures {
                eprintln!("Failed to index {}: {}", failure.path, failure.error);
            }

            let output = output.unwrap_or_else(|| settings.indexing.output.clone());
            symdex::save_index(&output, &report.index)?;
            println!(
                "Indexed {} of {} files into {} in {:?}",
                report.indexed,
                total,
                output.display(),
                report.elapsed
            );

            if let Some(dir) = snapshot_dir {
                let written = write_snapshots(&root, &dir, &report.index)?;
                println!("Wrote {written} snapshots to {}", dir.display());
            }

            Ok(report.is_clean())
        }

        Commands::Snapshot {
            root,
            only,
            check,
            environment,
            threads,
        } => {
            if let Some(t) = threads {
                settings.indexing.threads = t;
            }
            let mut suite = SnapshotSuite::new(root)
                .with_ecosystem(settings.ecosystem(), settings.packages.manager.clone())
                .with_pipeline_config(PipelineConfig::from_settings(&settings));
            if let Some(case) = only {
                suite = suite.with_only(case);
            }
            if let Some(environment) = environment {
                suite = suite.with_environment(environment);
            }

            let mode = if check {
                SnapshotMode::Check
            } else {
                SnapshotMode::Update
            };
            let report = suite.run(mode)?;

            for failure in &report.failures {
                eprintln!("Failed to index {}: {}", failure.path, failure.error);
            }
            for mismatch in &report.mismatches {
                eprintln!("{mismatch}");
            }
            match mode {
                SnapshotMode::Check => println!(
                    "Checked {} documents in {} cases: {} mismatches",
                    report.documents,
                    report.cases,
                    report.mismatches.len()
                ),
                SnapshotMode::Update => println!(
                    "Updated {} documents in {} cases",
                    report.written, report.cases
                ),
            }

            Ok(report.is_success())
        }

        Commands::Environment {
            output,
            project_version,
        } => {
            let source = pip(&settings);
            let packages = source
                .load()
                .with_context(|| format!("Failed to query {}", source.describe()))?;

            let output = output.unwrap_or_else(|| {
                let version = project_version
                    .or_else(|| settings.project.version.clone())
                    .unwrap_or_else(|| "default".to_string());
                cache_path_for(&settings.packages.cache_dir, &version)
            });
            write_cache(&output, &packages)?;
            println!("Wrote {} packages to {}", packages.len(), output.display());
            Ok(true)
        }
    }
}

fn pip(settings: &Settings) -> PipEnvironment {
    PipEnvironment::new(settings.packages.pip_command.clone())
        .with_batch_size(settings.packages.pip_batch_size)
}

fn write_snapshots(root: &Path, dir: &Path, index: &scip::types::Index) -> Result<usize> {
    let mut written = 0;
    for document in &index.documents {
        if document.relative_path.starts_with("..") {
            continue;
        }
        let input = root.join(&document.relative_path);
        let source = fs::read_to_string(&input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        snapshot::write(
            &dir.join(&document.relative_path),
            &snapshot::render(&source, document),
        )?;
        written += 1;
    }
    Ok(written)
}
