//! Tabby Catalog CLI
//!
//! Command-line tool for turning tabby documents into catalog records
//! and registering subdatasets with their parent.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tabby_catalog::fetch::DEFAULT_CACHE_TTL;
use tabby_catalog::{
    assemble, load_document, to_json_string, AssembleOptions, CacheConfig, CachedFetcher,
    CatalogError, DatasetType, DocumentSource, HttpFetcher, IdScheme, IdentityPolicy,
    NoOpFetcher, SubdatasetReference, SubdatasetRegistry,
};

#[derive(Parser)]
#[command(name = "tabby-catalog")]
#[command(about = "Turn tabby dataset descriptions into data catalog records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble dataset and file records from a document
    Extract(ExtractArgs),
    /// Register a document's dataset as a subdataset of a parent
    Register(RegisterArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum IdSource {
    /// Mint a deterministic id from the document's name
    Mint,
    /// Use the document's name as the id
    Direct,
    /// Use --dataset-id and --dataset-version
    External,
}

#[derive(Clone, Copy, ValueEnum)]
enum DatasetKind {
    Datalad,
    Other,
}

impl From<DatasetKind> for DatasetType {
    fn from(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Datalad => DatasetType::Datalad,
            DatasetKind::Other => DatasetType::Other,
        }
    }
}

#[derive(Args)]
struct LookupArgs {
    /// Don't contact the ontology service
    #[arg(long)]
    offline: bool,

    /// File to persist lookup responses in
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Seconds a cached response stays valid
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_CACHE_TTL.as_secs())]
    cache_ttl: u64,

    /// Base URL of the ontology lookup API
    #[arg(long, value_name = "URL")]
    ontology_api: Option<String>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Path or URL to the expanded tabby document (JSON)
    document: String,

    /// Where dataset id and version come from
    #[arg(long, value_enum, default_value = "mint")]
    id_source: IdSource,

    /// Dataset id for --id-source external
    #[arg(long)]
    dataset_id: Option<String>,

    /// Dataset version for --id-source external
    #[arg(long)]
    dataset_version: Option<String>,

    /// Organisational root for minted ids
    #[arg(long, value_name = "ROOT")]
    id_namespace: Option<String>,

    /// Template for minted ids, containing {name}
    #[arg(long, value_name = "FMT")]
    id_format: Option<String>,

    /// Complete publications carrying a DOI from Crossref
    #[arg(long)]
    resolve_dois: bool,

    #[command(flatten)]
    lookup: LookupArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct RegisterArgs {
    /// Path or URL to the subdataset's expanded tabby document (JSON)
    document: String,

    /// Parent's subdataset registry (TSV); created if missing
    #[arg(long, value_name = "FILE")]
    registry: PathBuf,

    /// Path of the subdataset relative to the parent
    #[arg(long, value_name = "SUBDIR")]
    path: String,

    /// Whether the subdataset is a DataLad dataset
    #[arg(long, value_enum, default_value = "other")]
    dataset_type: DatasetKind,

    #[command(flatten)]
    lookup: LookupArgs,
}

/// Run an assembly with the configured fetcher stack
fn assemble_with(
    document: &serde_json::Value,
    policy: &IdentityPolicy,
    lookup: &LookupArgs,
    options: &AssembleOptions,
) -> Result<tabby_catalog::AssembleResult, CatalogError> {
    if lookup.offline {
        return assemble(document, policy, &NoOpFetcher, options);
    }

    let cache = CacheConfig {
        path: lookup.cache.clone(),
        ttl: Duration::from_secs(lookup.cache_ttl),
    };
    let fetcher = CachedFetcher::new(HttpFetcher::new()?, &cache);
    let result = assemble(document, policy, &fetcher, options)?;
    fetcher.flush()?;
    Ok(result)
}

fn base_options(lookup: &LookupArgs) -> AssembleOptions {
    let mut options = AssembleOptions {
        enrich_terms: !lookup.offline,
        ..AssembleOptions::default()
    };
    if let Some(api) = &lookup.ontology_api {
        options.ontology.api_base = api.clone();
    }
    options
}

/// Write output to file or stdout
fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), CatalogError> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            info!("Wrote records to {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<(), CatalogError> {
    let document = load_document(&DocumentSource::parse(&args.document))?;

    let policy = match args.id_source {
        IdSource::Mint => IdentityPolicy::MintFromName,
        IdSource::Direct => IdentityPolicy::UseNameDirectly,
        IdSource::External => match (args.dataset_id, args.dataset_version) {
            (Some(dataset_id), Some(dataset_version)) => IdentityPolicy::External {
                dataset_id,
                dataset_version,
            },
            _ => {
                return Err(CatalogError::MalformedInput(
                    "--id-source external requires --dataset-id and --dataset-version"
                        .to_string(),
                ))
            }
        },
    };

    let mut options = base_options(&args.lookup);
    options.resolve_dois = args.resolve_dois && !args.lookup.offline;
    if args.id_namespace.is_some() || args.id_format.is_some() {
        let default = IdScheme::default();
        options.id_scheme = IdScheme::new(
            args.id_namespace.unwrap_or(default.namespace_root),
            args.id_format.unwrap_or(default.format),
        )?;
    }

    let result = assemble_with(&document, &policy, &args.lookup, &options)?;

    info!(
        "Produced 1 dataset and {} file records ({} terms enriched, {} lookups failed)",
        result.stats.files, result.stats.enriched_terms, result.stats.failed_lookups
    );

    let output = to_json_string(&result, args.pretty)?;
    write_output(&output, args.output.as_ref())
}

fn run_register(args: RegisterArgs) -> Result<(), CatalogError> {
    let document = load_document(&DocumentSource::parse(&args.document))?;
    let dataset_type = DatasetType::from(args.dataset_type);

    // DataLad datasets carry their own id; others get one minted
    let policy = match dataset_type {
        DatasetType::Datalad => IdentityPolicy::UseNameDirectly,
        DatasetType::Other => IdentityPolicy::MintFromName,
    };

    let options = base_options(&args.lookup);
    let result = assemble_with(&document, &policy, &args.lookup, &options)?;
    let reference =
        SubdatasetReference::from_dataset_record(&result.dataset, &args.path, dataset_type)?;

    let mut registry = SubdatasetRegistry::load(&args.registry)?;
    let outcome = registry.reconcile(reference.clone())?;

    if outcome.changed() {
        registry.save(&args.registry)?;
        info!(
            "Registered {}@{} at {} ({:?})",
            reference.identifier, reference.version, reference.path_posix, outcome
        );
    } else {
        info!(
            "{}@{} at {} is already registered",
            reference.identifier, reference.version, reference.path_posix
        );
    }

    println!("{}", serde_json::json!({ "changed": outcome.changed(), "subdataset": reference }));
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tabby_catalog=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Register(args) => run_register(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
