use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bia_catalog_tools::biostudies::BiostudiesHttpClient;
use bia_catalog_tools::cache::ZipCache;
use bia_catalog_tools::config::{ConfigLoader, ResolvedConfig};
use bia_catalog_tools::error::BiaError;
use bia_catalog_tools::http::HttpClient;
use bia_catalog_tools::output::{JsonOutput, TsvOutput};
use bia_catalog_tools::resolver::PathResolver;
use bia_catalog_tools::splitter::{self, RemoteImageZipSplitter};
use bia_catalog_tools::store::{LocalStudyStore, StudyStore};
use bia_catalog_tools::study::Representation;
use bia_catalog_tools::summary::{
    StudySummaryPipeline, SummaryReport, ZipFailurePolicy, parse_accession_list,
};
use bia_catalog_tools::zip_index::ZipIndexer;

#[derive(Parser)]
#[command(name = "bia-tools")]
#[command(about = "Filetype summaries and zip introspection for BioStudies image studies")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (defaults to ./bia-tools.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Summarise declared filetypes, zip contents included, per accession")]
    Summarise(SummariseArgs),
    #[command(about = "Export a summary report as one TSV row per accession")]
    TsvAccessions(TsvArgs),
    #[command(about = "Export a summary report as one TSV row per filetype")]
    TsvFiletypes(TsvArgs),
    #[command(about = "Register the image members of an archive file as study images")]
    IndexZip(IndexZipArgs),
    #[command(about = "Download an archive file of a study into the local cache")]
    FetchZip(FetchZipArgs),
    #[command(about = "Attach a representation to an existing image")]
    RegisterRepresentation(RegisterRepresentationArgs),
}

#[derive(Args)]
struct SummariseArgs {
    #[arg(
        short = 'a',
        long,
        conflicts_with = "accessions_file",
        required_unless_present = "accessions_file"
    )]
    accession: Option<String>,

    /// File with one accession per line
    #[arg(short = 'i', long)]
    accessions_file: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Leave unreadable archives out instead of dropping the accession
    #[arg(long)]
    skip_unreadable_zips: bool,
}

#[derive(Args)]
struct TsvArgs {
    /// Summary report written by `summarise`
    input: PathBuf,

    /// Defaults to the input path with a .tsv extension
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct IndexZipArgs {
    accession: String,
    zipfile_id: String,

    /// Download the archive to the cache and list it locally
    #[arg(long)]
    local: bool,
}

#[derive(Args)]
struct FetchZipArgs {
    accession: String,
    archive_id: String,
}

#[derive(Args)]
struct RegisterRepresentationArgs {
    accession: String,
    image_id: String,
    #[arg(value_name = "TYPE")]
    rep_type: String,
    size: u64,
    uri: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<BiaError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BiaError) -> u8 {
    match error {
        BiaError::MalformedAccession(_)
        | BiaError::NotFound { .. }
        | BiaError::StudyNotFound(_)
        | BiaError::ArchiveFileNotFound { .. }
        | BiaError::ImageNotFound { .. }
        | BiaError::MissingRepresentation(_)
        | BiaError::ConfigRead(_)
        | BiaError::ConfigParse(_)
        | BiaError::ReportParse(_) => 2,
        BiaError::ZipUnavailable(_)
        | BiaError::CatalogueFetch(_)
        | BiaError::CatalogueStatus { .. }
        | BiaError::Http(_)
        | BiaError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Summarise(args) => run_summarise(args, &config),
        Commands::TsvAccessions(args) => {
            run_tsv(args, |report, out| TsvOutput::write_accessions(report, out))
        }
        Commands::TsvFiletypes(args) => {
            run_tsv(args, |report, out| TsvOutput::write_filetypes(report, out))
        }
        Commands::IndexZip(args) => run_index_zip(args, &config),
        Commands::FetchZip(args) => run_fetch_zip(args, &config),
        Commands::RegisterRepresentation(args) => run_register_representation(args, &config),
    }
}

fn run_summarise(args: SummariseArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let accessions = match (args.accession, args.accessions_file) {
        (Some(accession), _) => vec![accession],
        (None, Some(path)) => {
            let content = fs::read_to_string(&path)
                .map_err(|err| BiaError::Filesystem(format!("{}: {err}", path.display())))?;
            parse_accession_list(&content)
        }
        (None, None) => {
            return Err(miette::Report::msg(
                "an accession or accession list is required",
            ));
        }
    };

    let http = HttpClient::new(config.http_timeout)?;
    let catalogue = BiostudiesHttpClient::new(http, config.biostudies_api.clone());
    let policy = if args.skip_unreadable_zips {
        ZipFailurePolicy::SkipArchive
    } else {
        ZipFailurePolicy::DropAccession
    };
    let pipeline = StudySummaryPipeline::new(catalogue, PathResolver::new(config.storage.clone()))
        .with_zip_policy(policy);

    let report = pipeline.summarise_batch(&accessions);
    info!(
        requested = accessions.len(),
        summarised = report.summaries.len(),
        "summary complete"
    );

    match args.output {
        Some(path) => {
            let mut out = create_output(&path)?;
            JsonOutput::write_json(&report, &mut out).into_diagnostic()?;
            out.flush().into_diagnostic()?;
            info!(path = %path.display(), "wrote summary report");
        }
        None => JsonOutput::print_report(&report).into_diagnostic()?,
    }
    Ok(())
}

fn run_tsv<F>(args: TsvArgs, write: F) -> miette::Result<()>
where
    F: Fn(&SummaryReport, &mut BufWriter<fs::File>) -> io::Result<()>,
{
    let content = fs::read_to_string(&args.input)
        .map_err(|err| BiaError::Filesystem(format!("{}: {err}", args.input.display())))?;
    let report = SummaryReport::from_json(&content)?;
    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("tsv"));

    let mut out = create_output(&output)?;
    write(&report, &mut out).into_diagnostic()?;
    out.flush().into_diagnostic()?;
    info!(path = %output.display(), rows = report.summaries.len(), "wrote tsv");
    Ok(())
}

fn run_index_zip(args: IndexZipArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let store = LocalStudyStore::new(config.store_root.clone());
    let mut study = store.load_study(&args.accession)?;
    let http = HttpClient::new(config.http_timeout)?;

    let images = if args.local {
        let zipfile = splitter::find_archive(&study, &args.zipfile_id)?;
        let uri = zipfile
            .representations
            .first()
            .map(|rep| rep.uri.clone())
            .ok_or_else(|| BiaError::MissingRepresentation(format!("archive {}", zipfile.id)))?;
        let cache = ZipCache::new(config.cache_dir.clone(), http);
        let path = cache.fetch(&uri)?;
        let members = ZipIndexer::list_members_local(path.as_std_path())?;
        splitter::register_members(&mut study, &args.zipfile_id, &members, &config.image_extensions)?
    } else {
        let zip_splitter =
            RemoteImageZipSplitter::new(ZipIndexer::new(http), config.fire_ftp_endpoint.clone());
        zip_splitter.split(&mut study, &args.zipfile_id, &config.image_extensions)?
    };

    store.persist_study(&study)?;
    JsonOutput::print_images(images.values()).into_diagnostic()?;
    Ok(())
}

fn run_fetch_zip(args: FetchZipArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let store = LocalStudyStore::new(config.store_root.clone());
    let study = store.load_study(&args.accession)?;
    let archive = splitter::find_archive(&study, &args.archive_id)?;
    let uri = archive
        .representations
        .first()
        .map(|rep| rep.uri.as_str())
        .ok_or_else(|| BiaError::MissingRepresentation(format!("archive {}", archive.id)))?;

    let cache = ZipCache::new(config.cache_dir.clone(), HttpClient::new(config.http_timeout)?);
    let path = cache.fetch(uri)?;
    println!("{path}");
    Ok(())
}

fn run_register_representation(
    args: RegisterRepresentationArgs,
    config: &ResolvedConfig,
) -> miette::Result<()> {
    let store = LocalStudyStore::new(config.store_root.clone());
    let rep = Representation {
        accession_id: args.accession,
        image_id: args.image_id,
        rep_type: args.rep_type,
        uri: args.uri,
        size: args.size,
        dimensions: None,
        attributes: Default::default(),
    };
    store.persist_image_representation(&rep)?;
    info!(accession = %rep.accession_id, image = %rep.image_id, "registered representation");
    JsonOutput::print_representation(&rep).into_diagnostic()?;
    Ok(())
}

fn create_output(path: &Path) -> miette::Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    let file = fs::File::create(path)
        .map_err(|err| BiaError::Filesystem(format!("{}: {err}", path.display())))?;
    Ok(BufWriter::new(file))
}
