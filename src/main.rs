use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use package_lens::catalog::PackageRepository;
use package_lens::config::{self, Config};
use package_lens::logging::{self, LogOptions};
use package_lens::resolver::{DependencyGraphResolver, Resolution};

#[derive(Parser)]
#[command(name = "package-lens")]
#[command(version, about = "Inspect remote NuGet packages without downloading them")]
struct Cli {
    /// Config file (defaults to $PACKAGE_LENS_CONFIG, then the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List published versions
    Versions { id: String },
    /// List the files inside a package
    Files {
        id: String,
        #[arg(default_value = "")]
        version: String,
    },
    /// List target frameworks with their assemblies and dependencies
    Frameworks {
        id: String,
        #[arg(default_value = "")]
        version: String,
    },
    /// Find the package and assembly that define a symbol
    Resolve {
        id: String,
        version: String,
        framework: String,
        symbol: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = cli.log_file.as_ref().map(|path| {
        if path.as_os_str().is_empty() {
            config::log_path()
        } else {
            path.clone()
        }
    });
    let _guard = logging::init(LogOptions {
        json: cli.log_json,
        file: log_file.as_deref(),
    })?;

    let config = Config::load(cli.config.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let repository = Arc::new(
        PackageRepository::from_config(&config).context("failed to build HTTP client")?,
    );

    match command {
        Command::Versions { id } => {
            let versions = repository.versions(&id).await?;
            for version in versions.versions() {
                println!("{}", version);
            }
        }
        Command::Files { id, version } => {
            let catalog = repository.resolve_catalog(&id, &version).await?;
            println!("{} ({} bytes)", catalog.identity, catalog.archive_size);
            for file in &catalog.files {
                println!("{:>10}  {}", file.uncompressed_size, file.full_path);
            }
        }
        Command::Frameworks { id, version } => {
            let catalog = repository.resolve_catalog(&id, &version).await?;
            println!("{}", catalog.identity);
            if let Some(authors) = catalog.metadata.authors_or_owners() {
                println!("by {}", authors);
            }
            for framework in catalog.frameworks.values() {
                println!("{}", framework.moniker);
                for assembly in &framework.assemblies {
                    println!("  {}", assembly.entry.full_path);
                }
                for dependency in &framework.dependencies {
                    println!("  -> {} {}", dependency.package_id, dependency.version_spec);
                }
            }
        }
        Command::Resolve {
            id,
            version,
            framework,
            symbol,
        } => {
            let resolver = DependencyGraphResolver::new(
                repository,
                config.resolver.reserved_prefixes.clone(),
                config.cache.resolution_ttl(),
            );
            match resolver
                .resolve_package(&id, &version, &framework, &symbol)
                .await
            {
                Resolution::Found(assembly) => {
                    println!("{}", assembly);
                    println!("{}", assembly.archive_url);
                }
                Resolution::NotFound => {
                    anyhow::bail!("{} not found in {} or its dependencies", symbol, id)
                }
                Resolution::Failed(failures) => {
                    for failure in &failures {
                        eprintln!("{}", failure);
                    }
                    anyhow::bail!(
                        "{} not found; {} package(s) could not be searched",
                        symbol,
                        failures.len()
                    );
                }
            }
        }
    }

    Ok(())
}
