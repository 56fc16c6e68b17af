use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trackr::config::Config;
use trackr::tracker::{self, Credentials, Fallback, FetchAllOptions, GetOptions};

#[derive(Parser, Debug)]
#[command(name = "trackr")]
#[command(about = "Signed, cached client for an issue-tracking API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/trackr/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Primary project to scope requests to
  #[arg(short, long)]
  project: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every issue in the collection
  List {
    /// Search all accessible projects
    #[arg(long)]
    global: bool,
    /// Page size
    #[arg(long, default_value_t = tracker::issues::DEFAULT_PAGE_LIMIT)]
    limit: u32,
    /// Fetch only the page starting at this offset
    #[arg(long)]
    offset: Option<u64>,
    /// Ignore the memoized listing
    #[arg(long)]
    force: bool,
  },
  /// Show one issue by reference, e.g. ABC-1234
  Get {
    reference: String,
    #[arg(long)]
    global: bool,
    /// Include comments
    #[arg(long)]
    comments: bool,
    /// Walk the whole collection when no linkage is cached
    #[arg(long)]
    scan: bool,
    /// Include raw remote payloads
    #[arg(long)]
    verbose: bool,
  },
  /// Remove every cached entry
  ClearCache,
}

fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  let filter = EnvFilter::try_from_env("TRACKR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging();

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  let mut credentials = Credentials::from_env()?;

  // Override project if specified on command line
  if let Some(project) = args.project {
    credentials.project = Some(project.clone());
    config.api.project = Some(project);
  }

  if let Command::Get { verbose: true, .. } = args.command {
    config.verbose = true;
  }

  let issues = tracker::connect(&config, credentials)?;

  match args.command {
    Command::List {
      global,
      limit,
      offset,
      force,
    } => {
      let options = FetchAllOptions {
        force,
        offset,
        limit,
        global,
        ..FetchAllOptions::default()
      }
      .on_progress(|count| info!(count, "fetched issues so far"));

      for issue in issues.fetch_all(options).await? {
        println!("{}\t{}\t{}", issue.reference, issue.status, issue.title);
      }
    }
    Command::Get {
      reference,
      global,
      comments,
      scan,
      ..
    } => {
      let options = GetOptions {
        global,
        comments,
        fallback: if scan {
          Fallback::FetchAll
        } else {
          Fallback::Search
        },
      };

      let issue = issues.get(&reference, options).await?;
      println!("{}", serde_json::to_string_pretty(&issue)?);
    }
    Command::ClearCache => {
      issues.clear_cache()?;
      println!("Cache cleared ({})", config.cache.namespace);
    }
  }

  Ok(())
}
