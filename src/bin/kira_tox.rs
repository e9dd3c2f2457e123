use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use kira_toxflow::app::{App, MaterializeOptions};
use kira_toxflow::catalog::EdelweissHttpClient;
use kira_toxflow::config::{ConfigLoader, PipelineConfig};
use kira_toxflow::enrichr::EnrichrHttpClient;
use kira_toxflow::error::KiraError;
use kira_toxflow::output::{ConsoleOutput, JsonOutput, OutputMode, Summary};
use kira_toxflow::store::Store;

#[derive(Parser)]
#[command(name = "kira-tox")]
#[command(about = "Checkpointed temposeq pipeline: download, DEG/pathway enrichment, verification, parquet build")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch and filter the dataset catalog into the overview table")]
    Download(DownloadArgs),
    #[command(about = "Download every dataset listed in the overview table")]
    Materialize(MaterializeArgs),
    #[command(about = "Extract DEGs and enrich them against the gene set library")]
    Process(RootArgs),
    #[command(about = "Check that every stage produced one artifact per dataset")]
    Verify(RootArgs),
    #[command(about = "Convert verified tables to parquet")]
    Build(RootArgs),
    #[command(about = "Run all stages in order")]
    Run(RunArgs),
}

#[derive(Args, Clone, Default)]
struct RootArgs {
    #[arg(long)]
    download_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    process_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    verify_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    build_dir: Option<Utf8PathBuf>,
}

#[derive(Args, Clone)]
struct DownloadArgs {
    filter_word: Option<String>,

    #[command(flatten)]
    roots: RootArgs,
}

#[derive(Args, Clone)]
struct MaterializeArgs {
    #[arg(long)]
    resume: bool,

    #[command(flatten)]
    roots: RootArgs,
}

#[derive(Args, Clone)]
struct RunArgs {
    filter_word: Option<String>,

    #[arg(long)]
    resume: bool,

    #[command(flatten)]
    roots: RootArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::ConfigRead(_) | KiraError::ConfigParse(_) | KiraError::InvalidConfig(_) => 2,
        KiraError::CatalogHttp(_)
        | KiraError::CatalogStatus { .. }
        | KiraError::CatalogResponse(_)
        | KiraError::EnrichrHttp(_)
        | KiraError::EnrichrStatus { .. }
        | KiraError::EnrichrResponse(_) => 3,
        KiraError::CountMismatch { .. } | KiraError::MissingManifest(_) => 4,
        KiraError::VerificationMissing(_) => 5,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Download(args) => {
            apply_overrides(&mut config, args.filter_word, &args.roots)?;
            let app = build_app(config)?;
            report(output_mode, |sink| app.download(sink))
        }
        Commands::Materialize(args) => {
            apply_overrides(&mut config, None, &args.roots)?;
            let app = build_app(config)?;
            let options = MaterializeOptions {
                resume: args.resume,
            };
            report(output_mode, |sink| app.materialize(options, sink))
        }
        Commands::Process(roots) => {
            apply_overrides(&mut config, None, &roots)?;
            let app = build_app(config)?;
            report(output_mode, |sink| app.process(sink))
        }
        Commands::Verify(roots) => {
            apply_overrides(&mut config, None, &roots)?;
            let app = build_app(config)?;
            report(output_mode, |sink| app.verify(sink))
        }
        Commands::Build(roots) => {
            apply_overrides(&mut config, None, &roots)?;
            let app = build_app(config)?;
            report(output_mode, |sink| app.build(sink))
        }
        Commands::Run(args) => {
            apply_overrides(&mut config, args.filter_word, &args.roots)?;
            let app = build_app(config)?;
            let options = MaterializeOptions {
                resume: args.resume,
            };
            report(output_mode, |sink| app.run(options, sink))
        }
    }
}

fn apply_overrides(
    config: &mut PipelineConfig,
    filter_word: Option<String>,
    roots: &RootArgs,
) -> miette::Result<()> {
    if let Some(word) = filter_word {
        config.filter_word = word;
    }
    if let Some(dir) = &roots.download_dir {
        config.paths.download = dir.clone();
    }
    if let Some(dir) = &roots.process_dir {
        config.paths.process = dir.clone();
    }
    if let Some(dir) = &roots.verify_dir {
        config.paths.verify = dir.clone();
    }
    if let Some(dir) = &roots.build_dir {
        config.paths.build = dir.clone();
    }
    let validated = ConfigLoader::resolve_config(config.clone())?;
    *config = validated;
    Ok(())
}

fn build_app(config: PipelineConfig) -> miette::Result<App<EdelweissHttpClient, EnrichrHttpClient>> {
    let catalog = EdelweissHttpClient::new(&config.catalog.base_url, config.catalog.page_size)?;
    let enrichr = EnrichrHttpClient::new(
        &config.enrichment.base_url,
        Duration::from_millis(config.enrichment.poll_delay_ms),
    )?;
    let store = Store::new(&config.paths);
    Ok(App::new(config, store, catalog, enrichr))
}

fn report<T, F>(output_mode: OutputMode, stage: F) -> miette::Result<()>
where
    T: Serialize + Summary,
    F: FnOnce(&dyn kira_toxflow::app::ProgressSink) -> Result<T, KiraError>,
{
    match output_mode {
        OutputMode::NonInteractive => {
            let result = stage(&JsonOutput)?;
            JsonOutput::print(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = stage(&ConsoleOutput)?;
            ConsoleOutput::print_summary(&result);
        }
    }
    Ok(())
}
