use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use sitescope_core::RunProgressCallback;
use sitescope_core::check::{CheckOptions, execute_link_check, generate_broken_link_report};
use sitescope_core::crawl::{CrawlOptions, execute_crawl, generate_crawl_report};
use sitescope_core::model::AnalyzerConfig;
use sitescope_core::report::{ReportFormat, load_dataset, render_report, save_report};
use sitescope_core::sitemap::{SitemapOptions, execute_sitemap_audit, find_sitemap};
use sitescope_scanner::{Dataset, FetchConfig, UrlMetadata};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// Load and parse URLs from a file, one per line
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read URL file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Build an unchecked dataset from a newline-delimited URL file
pub fn dataset_from_url_list(path: &PathBuf) -> Result<Dataset, String> {
    let urls = load_urls_from_file(path)?;
    let mut dataset = Dataset::default();
    for url in &urls {
        dataset.add_url(url, UrlMetadata::default());
    }
    Ok(dataset)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some_and(|h| !h.is_empty() && !h.contains(' '))
    {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Log level for the number of `-v` flags given
pub fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Install the stderr log subscriber. Safe to call more than once.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Expand `~` and environment variables in an output path
pub fn expand_output_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

/// HTTP settings from the shared `--timeout` and `--user-agent` flags.
///
/// `--timeout` sets the page fetch timeout; HEAD checks never wait longer.
pub fn fetch_config_from_args(args: &ArgMatches) -> FetchConfig {
    let mut config = FetchConfig::default();
    if let Some(&seconds) = args.get_one::<u64>("timeout") {
        let timeout = Duration::from_secs(seconds.max(1));
        config.get_timeout = timeout;
        config.head_timeout = config.head_timeout.min(timeout);
        config.document_timeout = config.document_timeout.max(timeout);
    }
    if let Some(agent) = args.get_one::<String>("user-agent") {
        config.user_agent = agent.clone();
    }
    config
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn quiet(args: &ArgMatches) -> bool {
    args.get_flag("quiet")
}

fn status_printer(quiet: bool) -> Option<RunProgressCallback> {
    (!quiet).then(|| {
        Arc::new(|msg: String| {
            println!("{} {}", "→".blue(), msg);
        }) as RunProgressCallback
    })
}

/// Save the dataset in the requested format, or print it.
///
/// Text on screen uses `screen_report`; every other combination renders
/// through the report module.
fn emit_report(
    dataset: &Dataset,
    args: &ArgMatches,
    screen_report: impl FnOnce(&Dataset) -> String,
) -> Result<()> {
    let format = report_format(args);

    match args.get_one::<PathBuf>("output") {
        Some(output) => {
            let path = expand_output_path(output);
            let content = render_report(dataset, format, AnalyzerConfig::default())
                .map_err(|e| anyhow!(e))?;
            save_report(&content, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet(args) {
                println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None if format == ReportFormat::Text => print!("{}", screen_report(dataset)),
        None => {
            let content = render_report(dataset, format, AnalyzerConfig::default())
                .map_err(|e| anyhow!(e))?;
            print!("{}", content);
        }
    }

    Ok(())
}

fn exit_on_error(result: Result<()>) {
    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub async fn handle_crawl(sub_matches: &ArgMatches) {
    exit_on_error(run_crawl(sub_matches).await);
}

async fn run_crawl(args: &ArgMatches) -> Result<()> {
    let url = args
        .get_one::<Url>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let quiet = quiet(args);

    let mut options = CrawlOptions::new(url.as_str());
    if let Some(&max_pages) = args.get_one::<usize>("max-pages") {
        options.max_pages = max_pages;
    }
    if let Some(&threads) = args.get_one::<usize>("threads") {
        options.workers = threads;
    }
    if let Some(&delay) = args.get_one::<u64>("delay") {
        options.delay = Duration::from_millis(delay);
    }
    options.fetch = fetch_config_from_args(args);
    options.show_progress_bars = !quiet;

    if !quiet {
        println!(
            "\n🕷️  Crawling {}",
            url.host_str().unwrap_or("unknown").bright_white()
        );
        println!("Workers: {}", options.workers);
        println!("Max pages: {}\n", options.max_pages);
    }

    let dataset = execute_crawl(options, status_printer(quiet))
        .await
        .map_err(|e| anyhow!(e))?;

    if !quiet {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
    }

    emit_report(&dataset, args, generate_crawl_report)
}

pub async fn handle_sitemap(sub_matches: &ArgMatches) {
    exit_on_error(run_sitemap(sub_matches).await);
}

async fn run_sitemap(args: &ArgMatches) -> Result<()> {
    let quiet = quiet(args);
    let fetch = fetch_config_from_args(args);

    let sitemap_url = match (args.get_one::<Url>("url"), args.get_one::<String>("domain")) {
        (Some(url), _) => url.to_string(),
        (None, Some(domain)) => {
            let domain = parse_url_line(domain)
                .ok_or_else(|| anyhow!("Invalid domain '{}'", domain))?;
            let found = find_sitemap(&domain, fetch.clone())
                .await
                .map_err(|e| anyhow!(e))?;
            if !quiet {
                println!("{} Found sitemap: {}", "✓".green().bold(), found.bright_white());
            }
            found
        }
        (None, None) => return Err(anyhow!("Either --url or --domain must be provided")),
    };

    let mut options = SitemapOptions::new(sitemap_url);
    if let Some(&depth) = args.get_one::<usize>("max-depth") {
        options.max_depth = depth;
    }
    if let Some(&threads) = args.get_one::<usize>("threads") {
        options.workers = threads;
    }
    options.check_links = args.get_flag("check-links");
    options.trace_referrers = !args.get_flag("no-trace");
    options.fetch = fetch;
    options.show_progress_bars = !quiet;

    let audit = execute_sitemap_audit(options, status_printer(quiet))
        .await
        .map_err(|e| anyhow!(e))?;

    if !quiet {
        let stats = &audit.stats;
        println!(
            "\n{} {} URLs from {} documents ({} indexes, {} failed, {} cycles skipped, {} too deep)",
            "✓".green().bold(),
            audit.dataset.len().to_string().cyan(),
            stats.documents_fetched,
            stats.indexes,
            stats.failed_documents,
            stats.cycles_skipped,
            stats.depth_pruned
        );
        if let Some(ref probe) = audit.probe {
            println!(
                "{} {} checked, {} broken, {} unreachable",
                "✓".green().bold(),
                probe.checked,
                probe.broken.to_string().yellow(),
                probe.transport_errors.to_string().red()
            );
        }
        if let Some(ref trace) = audit.trace {
            println!(
                "{} {} pages scanned, {} referrers found",
                "✓".green().bold(),
                trace.pages_scanned,
                trace.referrers_added
            );
        }
        println!();
    }

    let checked = audit.probe.is_some();
    emit_report(&audit.dataset, args, |dataset| {
        let text = render_report(dataset, ReportFormat::Text, AnalyzerConfig::default())
            .unwrap_or_default();
        if checked {
            format!("{}\n{}", text, generate_broken_link_report(dataset))
        } else {
            text
        }
    })
}

pub async fn handle_check(sub_matches: &ArgMatches) {
    exit_on_error(run_check(sub_matches).await);
}

async fn run_check(args: &ArgMatches) -> Result<()> {
    let quiet = quiet(args);
    let (mut dataset, source) = match (
        args.get_one::<PathBuf>("input"),
        args.get_one::<PathBuf>("url-list"),
    ) {
        (Some(input), _) => (
            load_dataset(&expand_output_path(input)).map_err(|e| anyhow!(e))?,
            input,
        ),
        (None, Some(list)) => (
            dataset_from_url_list(&expand_output_path(list)).map_err(|e| anyhow!(e))?,
            list,
        ),
        (None, None) => return Err(anyhow!("Either --input or --url-list must be provided")),
    };
    if !quiet {
        println!(
            "{} Loaded {} URLs from {}",
            "✓".green().bold(),
            dataset.len().to_string().cyan(),
            source.display()
        );
    }

    let mut options = CheckOptions {
        trace_referrers: !args.get_flag("no-trace"),
        fetch: fetch_config_from_args(args),
        show_progress_bars: !quiet,
        ..CheckOptions::default()
    };
    if let Some(&threads) = args.get_one::<usize>("threads") {
        options.workers = threads;
    }

    let outcome = execute_link_check(&mut dataset, options)
        .await
        .map_err(|e| anyhow!(e))?;

    if !quiet {
        println!(
            "{} {} checked, {} broken, {} unreachable\n",
            "✓".green().bold(),
            outcome.probe.checked,
            outcome.probe.broken.to_string().yellow(),
            outcome.probe.transport_errors.to_string().red()
        );
    }

    emit_report(&dataset, args, generate_broken_link_report)
}

pub fn handle_report(sub_matches: &ArgMatches) {
    exit_on_error(run_report(sub_matches));
}

fn run_report(args: &ArgMatches) -> Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow!("--input is required"))?;
    let dataset = load_dataset(&expand_output_path(input)).map_err(|e| anyhow!(e))?;

    emit_report(&dataset, args, |dataset| {
        render_report(dataset, ReportFormat::Text, AnalyzerConfig::default()).unwrap_or_default()
    })
}
