use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use images::config::Config;
use images::dispatch::{
    parse_tags, AggregatedError, CopyRequest, DispatchResult, Dispatcher, TagMode,
};
use images::output::{self, OutputMode};
use images::provider::client::RestRegionClient;
use images::provider::http::{format_api_error, HttpClient};
use images::provider::image::ListFilter;
use images::provider::regions::RegionRegistry;
use images::VERSION;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage machine images across regions
#[derive(Parser, Debug)]
#[command(name = "images", version = VERSION, about, long_about = None)]
struct Args {
    /// Regions to operate on, comma separated, or "all"
    #[arg(short, long, global = true, value_delimiter = ',')]
    regions: Vec<String>,

    /// Regions to leave out after expanding "all"
    #[arg(long, global = true, value_delimiter = ',')]
    regions_exclude: Vec<String>,

    /// Endpoint template, e.g. https://images.{region}.example.com
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Output mode for listings
    #[arg(short, long, global = true, value_enum)]
    output: Option<OutputMode>,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List owned images in every region
    List {
        /// Only show these image ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Create or delete image tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Deregister images
    Delete {
        /// Image ids to deregister
        #[arg(long, required = true, value_delimiter = ',')]
        ids: Vec<String>,

        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Copy an image into other regions
    Copy {
        /// Source image id
        #[arg(long)]
        image: String,

        /// Destination regions
        #[arg(long, required = true, value_delimiter = ',')]
        to: Vec<String>,

        /// Description of the copies, defaults to the source description
        #[arg(long, default_value = "")]
        desc: String,

        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TagAction {
    /// Add or overwrite tags
    Create(TagArgs),
    /// Remove tags; a bare key removes the tag whatever its value
    Delete(TagArgs),
}

#[derive(clap::Args, Debug)]
struct TagArgs {
    /// Tags as key=value pairs separated by commas
    #[arg(long)]
    tags: String,

    /// Image ids to tag
    #[arg(long, required = true, value_delimiter = ',')]
    ids: Vec<String>,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("images {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("images").join("images.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".images").join("images.log");
    }
    PathBuf::from("images.log")
}

/// Config layers plus command line flags
fn load_config(args: &Args) -> Result<Config> {
    let flags = Config {
        regions: args.regions.clone(),
        regions_exclude: args.regions_exclude.clone(),
        endpoint: args.endpoint.clone(),
        output: args.output,
        ..Config::default()
    };

    let config = Config::load()?.merge(flags);
    config.validate()?;
    Ok(config)
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher<RestRegionClient>> {
    let http = HttpClient::new(config.credentials()?, config.request_timeout())?;
    let endpoint = config.endpoint()?;

    let registry = RegionRegistry::from_spec(
        config.regions.as_slice(),
        config.regions_exclude.as_slice(),
        &config.catalog(),
        |region| RestRegionClient::with_http(region, endpoint, http.clone()),
    )?;

    if registry.is_empty() {
        bail!("No regions left after exclusions. Please check your configuration");
    }

    tracing::info!("Using regions: {:?}", registry.names());
    Ok(Dispatcher::new(registry))
}

fn confirm(ids: &[String]) -> Result<bool> {
    print!(
        "Do you really want to deregister {} image(s) {:?}? Type 'yes' to continue: ",
        ids.len(),
        ids
    );
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim() == "yes")
}

/// Print the aggregate and turn it into a failing exit code
fn report(errors: &AggregatedError) -> ExitCode {
    eprintln!("{}", errors);

    for error in errors {
        if let (Some(region), Some(source)) = (error.region(), error.backend_error()) {
            eprintln!("{}: {}", region, format_api_error(source));
        }
    }
    ExitCode::FAILURE
}

fn finish(result: DispatchResult) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => report(&errors),
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;
    let dispatcher = build_dispatcher(&config)?;

    match args.command {
        Command::List { ids } => {
            let filter = if ids.is_empty() {
                ListFilter::owned()
            } else {
                ListFilter::owned().with_ids(ids)
            };

            let (directory, errors) = dispatcher.list(&filter).await;

            match output::render(&directory, config.output_mode()) {
                Ok(rendered) => print!("{}", rendered),
                Err(e) => eprintln!("{}", e),
            }

            match errors {
                Some(errors) => {
                    tracing::error!("{} regions failed to list", errors.len());
                    Ok(report(&errors))
                }
                None => Ok(ExitCode::SUCCESS),
            }
        }
        Command::Tag { action } => {
            let (mode, tag_args) = match action {
                TagAction::Create(tag_args) => (TagMode::Create, tag_args),
                TagAction::Delete(tag_args) => (TagMode::Delete, tag_args),
            };
            let tags = parse_tags(&tag_args.tags, mode)?;

            let result = match mode {
                TagMode::Create => {
                    dispatcher
                        .create_tags(&tags, tag_args.dry_run, &tag_args.ids)
                        .await
                }
                TagMode::Delete => {
                    dispatcher
                        .delete_tags(&tags, tag_args.dry_run, &tag_args.ids)
                        .await
                }
            };
            Ok(finish(result))
        }
        Command::Delete { ids, dry_run, force } => {
            if !force && !dry_run && !confirm(&ids)? {
                println!("Aborted");
                return Ok(ExitCode::SUCCESS);
            }
            Ok(finish(dispatcher.deregister(dry_run, &ids).await))
        }
        Command::Copy {
            image,
            to,
            desc,
            dry_run,
        } => {
            let request = CopyRequest {
                source_id: image,
                destinations: to,
                description: desc,
                dry_run,
            };

            let (copies, errors) = dispatcher.copy(&request).await;
            for (region, image_id) in &copies {
                println!("{}: {}", region, image_id);
            }

            Ok(errors.map_or(ExitCode::SUCCESS, |errors| report(&errors)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    run(args).await
}
