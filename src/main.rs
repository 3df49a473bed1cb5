//! Sitegraph main entry point
//!
//! This is the command-line interface for the sitegraph crawler daemon and its
//! administrative actions.

use clap::Parser;
use std::path::{Path, PathBuf};
use sitegraph::config::{load_config_with_hash, Config};
use sitegraph::crawler::run_crawler;
use sitegraph::model::{ContentCategory, SiteKind};
use sitegraph::output::{load_statistics, print_statistics, Indexer, LinkGraphExport};
use sitegraph::storage::{into_shared, open_storage, NewSite, SiteUpdate, SqliteStorage, Storage};
use sitegraph::url::{classify_site, normalize};
use tracing_subscriber::EnvFilter;

/// Sitegraph: a polling site crawler and link-graph builder
///
/// Sitegraph discovers sites through a search API, fetches them and their
/// pages on a refresh cadence, merges duplicate records and relates sites to
/// each other through links and subdomains.
#[derive(Parser, Debug)]
#[command(name = "sitegraph")]
#[command(version)]
#[command(about = "A polling site crawler and link-graph builder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run one full cycle and the maintenance jobs, then exit
    #[arg(long, group = "mode")]
    once: bool,

    /// Validate config and show the work that is due without fetching anything
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// Write the current link graph as JSON to PATH and exit; --kind with
    /// --category keeps only edges leaving sites of that kind and category
    #[arg(long, value_name = "PATH", group = "mode")]
    export_links: Option<PathBuf>,

    /// Add a site by URL and exit
    #[arg(long, value_name = "URL", group = "mode")]
    add_site: Option<String>,

    /// Delete a site with its pages, content and edges, and exit
    #[arg(long, value_name = "ID", group = "mode")]
    delete_site: Option<i64>,

    /// Update a site and exit; combine with --url, --kind, --category, --refresh-hours
    #[arg(long, value_name = "ID", group = "mode")]
    update_site: Option<i64>,

    /// New URL for --update-site
    #[arg(long, requires = "update_site")]
    url: Option<String>,

    /// Site kind for --add-site, --update-site or --export-links (domestic, foreign, redirect, indexing-service)
    #[arg(long)]
    kind: Option<SiteKind>,

    /// Content category for --add-site, --update-site or --export-links (news, social-media, uncategorized)
    #[arg(long)]
    category: Option<ContentCategory>,

    /// Refresh interval in hours for --add-site or --update-site
    #[arg(long)]
    refresh_hours: Option<u32>,

    /// Add a search term for discovery and exit
    #[arg(long, value_name = "TERM", group = "mode")]
    add_search_term: Option<String>,

    /// Mark a search term resolved so discovery moves on, and exit
    #[arg(long, value_name = "ID", group = "mode")]
    resolve_search_term: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_links {
        handle_export_links(&config, &cli, path).await?;
    } else if let Some(url) = &cli.add_site {
        handle_add_site(&config, &cli, url)?;
    } else if let Some(id) = cli.delete_site {
        handle_delete_site(&config, id)?;
    } else if let Some(id) = cli.update_site {
        handle_update_site(&config, &cli, id)?;
    } else if let Some(term) = &cli.add_search_term {
        handle_add_search_term(&config, term)?;
    } else if let Some(id) = cli.resolve_search_term {
        handle_resolve_search_term(&config, id)?;
    } else {
        handle_crawl(config, cli.once).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitegraph=info,warn"),
            1 => EnvFilter::new("sitegraph=debug,info"),
            2 => EnvFilter::new("sitegraph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> Result<SqliteStorage, Box<dyn std::error::Error>> {
    Ok(open_storage(Path::new(&config.output.database_path))?)
}

/// Handles the --dry-run mode: validates config and shows what is due
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sitegraph Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Site batch size: {}", config.crawler.site_batch_size);
    println!("  Page batch size: {}", config.crawler.page_batch_size);
    println!(
        "  Page freshness: {} minutes",
        config.crawler.page_freshness_minutes
    );
    println!(
        "  Jitter: {}-{}ms",
        config.crawler.jitter_min_ms, config.crawler.jitter_max_ms
    );
    println!(
        "  Concurrent partitions: {}",
        config.crawler.max_concurrent_partitions
    );
    println!("  Cycle interval: {}s", config.crawler.cycle_interval_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(path) = &config.output.link_graph_path {
        println!("  Link graph: {}", path);
    }

    println!("\nSearch discovery: {}", enabled(config.search.enabled));
    println!("Jobs:");
    println!("  Fetch content: {}", enabled(config.jobs.fetch_content));
    println!("  Process websites: {}", enabled(config.jobs.process_websites));
    println!("  Fix duplicates: {}", enabled(config.jobs.fix_duplicates));
    println!("  Build subdomains: {}", enabled(config.jobs.build_subdomains));
    println!("Ignore patterns: {}", config.links.ignore.len());

    let storage = open_database(config)?;
    let now = chrono::Utc::now();
    let sites = storage.get_sites_due_for_fetch(now, config.crawler.site_batch_size)?;
    let pages = storage.get_pages_due_for_fetch(
        now,
        config.crawler.page_freshness_minutes,
        config.crawler.page_batch_size,
    )?;
    let content = storage.get_content_due_for_processing(config.crawler.site_batch_size)?;

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Next cycle would fetch {} sites and {} pages and process {} documents",
        sites.len(),
        pages.len(),
        content.len()
    );

    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --export-links: writes the link graph, optionally filtered
async fn handle_export_links(
    config: &Config,
    cli: &Cli,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match (cli.kind, cli.category) {
        (Some(kind), Some(category)) => Some((kind, category)),
        (None, None) => None,
        _ => return Err("--export-links filters on --kind and --category together".into()),
    };

    let storage = into_shared(open_database(config)?);
    let export = LinkGraphExport::new(path).with_filter(filter);
    let report = export.index(&storage).await?;

    println!(
        "✓ Exported {} sites, {} links and {} subdomain edges to {}",
        report.sites,
        report.links,
        report.subdomains,
        path.display()
    );
    Ok(())
}

/// Handles --add-site: classification flags override the built-in table
fn handle_add_site(config: &Config, cli: &Cli, raw_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = normalize(raw_url);
    if url.is_empty() {
        return Err(format!("'{}' is not a usable site URL", raw_url).into());
    }

    let mut storage = open_database(config)?;
    if let Some(existing) = storage.get_site_by_url(&url)? {
        println!("Site {} already exists with id {}", url, existing.id);
        return Ok(());
    }

    let (kind, category) = classify_site(&url);
    let site = NewSite {
        url,
        title: None,
        kind: cli.kind.unwrap_or(kind),
        category: cli.category.unwrap_or(category),
        refresh_interval_hours: cli
            .refresh_hours
            .unwrap_or(config.crawler.default_refresh_hours),
    };
    let id = storage.insert_site(&site, chrono::Utc::now())?;

    println!(
        "✓ Added site {} (id {}, {}, {})",
        site.url, id, site.kind, site.category
    );
    Ok(())
}

fn handle_delete_site(config: &Config, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_database(config)?;
    let site = storage.get_site(id)?;
    let pages = storage.delete_pages_for_site(id)?;
    storage.delete_site(id)?;

    println!("✓ Deleted site {} ({}) with {} pages", id, site.url, pages);
    Ok(())
}

fn handle_update_site(config: &Config, cli: &Cli, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let update = SiteUpdate {
        url: cli.url.as_deref().map(normalize),
        kind: cli.kind,
        category: cli.category,
        refresh_interval_hours: cli.refresh_hours,
    };
    if update.is_empty() {
        return Err("--update-site needs at least one of --url, --kind, --category, --refresh-hours".into());
    }

    let mut storage = open_database(config)?;
    storage.update_site(id, &update)?;

    let site = storage.get_site(id)?;
    let pages = storage.get_pages_for_site(id)?.len();
    println!(
        "✓ Updated site {}: {} ({}, {}, every {}h, {} pages)",
        id, site.url, site.kind, site.category, site.refresh_interval_hours, pages
    );
    Ok(())
}

fn handle_add_search_term(config: &Config, term: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_database(config)?;
    let id = storage.insert_search_term(term, chrono::Utc::now())?;

    println!("✓ Search term '{}' has id {}", term.trim(), id);
    Ok(())
}

fn handle_resolve_search_term(config: &Config, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_database(config)?;
    storage.resolve_search_term(id)?;

    println!("✓ Search term {} resolved", id);
    Ok(())
}

/// Handles the crawl: the daemon, or a single cycle with --once
async fn handle_crawl(config: Config, once: bool) -> Result<(), Box<dyn std::error::Error>> {
    if once {
        tracing::info!("Running a single cycle");
    } else {
        tracing::info!("Starting daemon, press Ctrl-C to stop");
    }

    match run_crawler(config, once).await {
        Ok(()) => {
            tracing::info!("Crawler finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawler failed: {}", e);
            Err(e.into())
        }
    }
}
