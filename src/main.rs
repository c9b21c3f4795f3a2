//! Crawl-Conductor main entry point
//!
//! This is the command-line interface for submitting and monitoring crawl jobs.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crawl_conductor::config::{load_config_with_hash, Config};
use crawl_conductor::storage::{read_lines, write_lines, ContentStore, SqliteContentStore};
use crawl_conductor::watcher::WatchOutcome;
use crawl_conductor::{
    ClientSettings, CrawlClient, CrawlOptions, Document, EventKind, JobHandle, JobState,
    MapOptions, ScrapeOptions, WatchEvent,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Crawl-Conductor: submit and track remote crawl jobs
///
/// Jobs are either polled until they finish or watched live over the job's
/// event stream. Results can be written to a SQLite content store and to
/// JSON-lines files.
#[derive(Parser, Debug)]
#[command(name = "crawl-conductor")]
#[command(version)]
#[command(about = "Submit and track remote crawl jobs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Bearer token for the crawl service
    #[arg(long, env = "CRAWL_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Override the service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and wait for the results
    Crawl(CrawlArgs),

    /// Show the current status of a job
    Status {
        /// Job ID returned at submission
        id: String,
    },

    /// Cancel a running job
    Cancel {
        /// Job ID returned at submission
        id: String,
    },

    /// Scrape a single page
    Scrape {
        url: String,

        /// Output formats (e.g. markdown, html)
        #[arg(long = "format")]
        formats: Vec<String>,
    },

    /// List the URLs reachable from a site
    Map {
        url: String,

        /// Only return links related to this search term
        #[arg(long)]
        search: Option<String>,

        /// Include links on subdomains
        #[arg(long)]
        include_subdomains: bool,

        /// Maximum number of links
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Load a JSON-lines export into the content store
    Import {
        /// JSON-lines file, one document per line
        path: PathBuf,

        /// Job the documents belong to
        #[arg(long)]
        job: String,

        /// URL the job crawled
        #[arg(long, default_value = "")]
        url: String,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Root URL to crawl
    url: String,

    /// Follow the job's event stream instead of polling
    #[arg(long)]
    watch: bool,

    /// Maximum number of pages to crawl
    #[arg(long)]
    limit: Option<u32>,

    /// Maximum link depth from the root URL
    #[arg(long)]
    max_depth: Option<u32>,

    /// Output formats for each page (e.g. markdown, html)
    #[arg(long = "format")]
    formats: Vec<String>,

    /// Seconds between status polls (minimum 2)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Idempotency key for the submission
    #[arg(long)]
    idempotency_key: Option<String>,

    /// Write the documents to this JSON-lines file
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let mut settings = ClientSettings::from(&config);
    if let Some(key) = cli.api_key {
        settings.api_key = Some(key);
    }
    if let Some(base_url) = cli.base_url {
        settings = settings.with_base_url(base_url);
    }

    // Import works offline, so only the remote commands need a key
    match cli.command {
        Command::Import { path, job, url } => handle_import(&config, &path, &job, &url),
        Command::Crawl(args) => {
            let client = CrawlClient::new(settings)?;
            if args.watch {
                handle_watch(&client, &config, args).await
            } else {
                handle_crawl(&client, &config, args).await
            }
        }
        Command::Status { id } => handle_status(&CrawlClient::new(settings)?, &id).await,
        Command::Cancel { id } => handle_cancel(&CrawlClient::new(settings)?, &id).await,
        Command::Scrape { url, formats } => {
            handle_scrape(&CrawlClient::new(settings)?, &url, formats).await
        }
        Command::Map {
            url,
            search,
            include_subdomains,
            limit,
        } => {
            let options = MapOptions {
                search,
                include_subdomains: include_subdomains.then_some(true),
                limit,
                ..MapOptions::default()
            };
            handle_map(&CrawlClient::new(settings)?, &url, &options).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_conductor=info,warn"),
            1 => EnvFilter::new("crawl_conductor=debug,info"),
            2 => EnvFilter::new("crawl_conductor=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn crawl_options(args: &CrawlArgs) -> CrawlOptions {
    let mut options = CrawlOptions::default();
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }
    if let Some(depth) = args.max_depth {
        options = options.with_max_depth(depth);
    }
    if !args.formats.is_empty() {
        options = options.with_formats(args.formats.iter().cloned());
    }
    options
}

fn open_store(config: &Config) -> anyhow::Result<Option<SqliteContentStore>> {
    match &config.store.database_path {
        Some(path) => {
            let store = SqliteContentStore::new(Path::new(path))
                .with_context(|| format!("Failed to open content store {}", path))?;
            Ok(Some(store))
        }
        None => Ok(None),
    }
}

fn persist(
    config: &Config,
    job: &JobHandle,
    url: &str,
    status: JobState,
    documents: &[Document],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(mut store) = open_store(config)? {
        store.record_job(job, url, status)?;
        let stored = store.insert_records(job, documents)?;
        tracing::info!("Stored {} documents for job {}", stored, job);
    }

    if let Some(path) = output {
        write_lines(path, documents)?;
        tracing::info!("Wrote {} documents to {}", documents.len(), path.display());
    }

    Ok(())
}

/// Handles `crawl`: submit, then poll until the job finishes
async fn handle_crawl(client: &CrawlClient, config: &Config, args: CrawlArgs) -> anyhow::Result<()> {
    let options = crawl_options(&args);
    let interval = Duration::from_secs(args.poll_interval.unwrap_or(config.poll.interval_secs));

    let job = client
        .async_crawl_url(&args.url, &options, args.idempotency_key.as_deref())
        .await?;
    if let Some(mut store) = open_store(config)? {
        store.record_job(&job, &args.url, JobState::Queued)?;
    }

    let result = tokio::select! {
        result = client.wait_for_job(&job, interval) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling job {}", job);
            client.cancel_crawl(job.id()).await?;
            return Ok(());
        }
    };

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            if let Some(mut store) = open_store(config)? {
                store.update_job_status(&job, JobState::Failed)?;
            }
            return Err(e.into());
        }
    };

    persist(
        config,
        &job,
        &args.url,
        result.state,
        &result.documents,
        args.output.as_deref(),
    )?;

    println!(
        "Job {} {}: {} documents ({} of {} pages, credits used: {})",
        job,
        result.state,
        result.documents.len(),
        result.completed_count,
        result.total_expected,
        result
            .credits_used
            .as_ref()
            .map_or_else(|| "n/a".to_string(), |c| c.to_string())
    );
    Ok(())
}

/// Handles `crawl --watch`: submit, then follow the event stream
async fn handle_watch(client: &CrawlClient, config: &Config, args: CrawlArgs) -> anyhow::Result<()> {
    let options = crawl_options(&args);
    let mut watcher = client
        .crawl_url_and_watch(&args.url, &options, args.idempotency_key.as_deref())
        .await?;
    let job = watcher.job().clone();

    let received = Arc::new(AtomicUsize::new(0));
    {
        let received = Arc::clone(&received);
        watcher.on(EventKind::Document, move |event| {
            if let WatchEvent::Document(document) = event {
                let n = received.fetch_add(1, Ordering::Relaxed) + 1;
                println!("[{}] {}", n, document.source_url().unwrap_or("<unknown url>"));
            }
        });
    }
    watcher.on(EventKind::Error, |event| {
        if let WatchEvent::Error { error, .. } = event {
            eprintln!("Crawl failed: {}", error);
        }
    });

    let outcome = tokio::select! {
        outcome = watcher.connect() => outcome?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, closing event stream for job {}", job);
            WatchOutcome::Disconnected
        }
    };

    let session = watcher.session();
    persist(
        config,
        &job,
        &args.url,
        session.status(),
        session.documents(),
        args.output.as_deref(),
    )?;

    match outcome {
        WatchOutcome::Completed => {
            println!("Job {} completed: {} documents", job, session.documents().len());
            Ok(())
        }
        WatchOutcome::Failed => anyhow::bail!(
            "Job {} failed: {}",
            job,
            session.error().unwrap_or("no error message provided")
        ),
        WatchOutcome::Disconnected => {
            println!(
                "Event stream for job {} ended while '{}' ({} documents so far)",
                job,
                session.status(),
                session.documents().len()
            );
            Ok(())
        }
    }
}

/// Handles `status`
async fn handle_status(client: &CrawlClient, id: &str) -> anyhow::Result<()> {
    let snapshot = client.check_crawl_status(id).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Handles `cancel`
async fn handle_cancel(client: &CrawlClient, id: &str) -> anyhow::Result<()> {
    let response = client.cancel_crawl(id).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Handles `scrape`
async fn handle_scrape(client: &CrawlClient, url: &str, formats: Vec<String>) -> anyhow::Result<()> {
    let options = ScrapeOptions {
        formats: (!formats.is_empty()).then_some(formats),
        ..ScrapeOptions::default()
    };
    let document = client.scrape_url(url, &options).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Handles `map`: one link per line
async fn handle_map(client: &CrawlClient, url: &str, options: &MapOptions) -> anyhow::Result<()> {
    let links = client.map_url(url, options).await?;
    tracing::info!("Found {} links on {}", links.len(), url);
    for link in links {
        println!("{}", link);
    }
    Ok(())
}

/// Handles `import`: JSON-lines file into the content store
fn handle_import(config: &Config, path: &Path, job: &str, url: &str) -> anyhow::Result<()> {
    let mut store = open_store(config)?
        .context("import needs [store] database-path in the configuration")?;

    let documents = read_lines(path)?;
    let job = JobHandle::new(job);
    store.record_job(&job, url, JobState::Completed)?;
    let stored = store.insert_records(&job, &documents)?;

    println!(
        "Imported {} documents into job {} ({} stored in total)",
        stored,
        job,
        store.count_records()?
    );
    Ok(())
}
