use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use qgis_bundler::{PackageReport, Packager, PackagerConfig, ProjectDocument, QgisProject};

#[derive(Parser, Debug)]
#[command(
    name = "qgis-bundler",
    version,
    about = "Collect every data source of a QGIS project into one portable package"
)]
struct Cli {
    #[arg(help = "Project file to package (.qgs or .qgz)")]
    project: PathBuf,
    #[arg(long, short, help = "Directory receiving the package (defaults to the project directory)")]
    output: Option<PathBuf>,
    #[arg(long, help = "Configuration file (defaults to qgis_bundler.config.json next to the project)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Number of ancestor directories searched for moved files")]
    search_depth: Option<usize>,
    #[arg(long, default_value_t = false, help = "Leave the package directory unzipped")]
    no_archive: bool,
    #[arg(long, default_value_t = false, help = "Exit with status 2 when any layer could not be packaged")]
    strict: bool,
    #[arg(long, default_value_t = false, help = "Output machine-readable JSON")]
    json: bool,
    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli, doc: &QgisProject) -> Result<PackagerConfig> {
    let mut config = match &cli.config {
        Some(path) => PackagerConfig::load(path)?,
        None => PackagerConfig::discover(&doc.project_directory()),
    };
    if let Some(depth) = cli.search_depth {
        config.search.ancestor_depth = depth;
    }
    if cli.no_archive {
        config.create_archive = false;
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<PackageReport> {
    let mut doc = QgisProject::open(&cli.project)
        .with_context(|| format!("failed to open {}", cli.project.display()))?;
    let config = load_config(cli, &doc)?;
    let output_root = cli.output.clone().unwrap_or_else(|| doc.project_directory());

    let create_archive = config.create_archive;
    let packager = Packager::new(config);
    if create_archive {
        packager.package_and_archive(&mut doc, &output_root)
    } else {
        packager.package(&mut doc, &output_root)
    }
}

fn print_report(report: &PackageReport) {
    println!(
        "Processed: {} layers | Skipped: {} layers | Failed: {} layers",
        report.succeeded,
        report.skipped.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  missing: {} ({})", failure.layer_name, failure.recorded_path);
    }
    println!("Output directory: {}", report.package_dir.display());
    if let Some(archive) = &report.archive {
        println!("Package created: {}", archive.display());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let report = match run(&cli) {
        Ok(report) => report,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!("failed to serialise report: {err}");
                return ExitCode::from(1);
            }
        }
    } else {
        print_report(&report);
    }

    if cli.strict && !report.is_complete() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
