use crate::map::status_label;
use crate::{RunProgressCallback, progress_bar, scanner_progress};
use sitescope_scanner::{Crawler, Dataset, FetchConfig, Fetcher, UrlRecord};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub url: String,
    pub max_pages: usize,
    pub workers: usize,
    /// Politeness delay before each page fetch
    pub delay: Duration,
    pub fetch: FetchConfig,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_pages: 500,
            workers: 10,
            delay: Duration::from_millis(100),
            fetch: FetchConfig::default(),
            show_progress_bars: true,
        }
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options
/// Returns the populated dataset
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<RunProgressCallback>,
) -> Result<Dataset, String> {
    let CrawlOptions {
        url,
        max_pages,
        workers,
        delay,
        fetch,
        show_progress_bars,
    } = options;

    let fetcher =
        Fetcher::with_config(fetch).map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Crawling {} with {} workers (max {} pages)",
            url, workers, max_pages
        ));
    }

    let pb = show_progress_bars.then(|| progress_bar(max_pages as u64, "Crawling"));

    let mut crawler = Crawler::new(fetcher)
        .with_max_pages(max_pages)
        .with_workers(workers)
        .with_delay(delay);
    if let Some(ref pb) = pb {
        crawler = crawler.with_progress_callback(scanner_progress(pb));
    }

    let result = crawler.crawl(&url).await;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let dataset = result.map_err(|e| format!("Failed to crawl {}: {}", url, e))?;
    info!(url = %url, pages = dataset.len(), "Crawl finished");

    if let Some(ref callback) = progress_callback {
        callback(format!("Crawl complete! {} pages recorded", dataset.len()));
    }

    Ok(dataset)
}

/// Generate a crawl report from a dataset: a summary, then every page
/// grouped by host with its status.
pub fn generate_crawl_report(dataset: &Dataset) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages recorded: {}\n", dataset.len()));

    let total_links: usize = dataset.records().iter().map(|r| r.in_degree).sum();
    report.push_str(&format!("  Internal links found: {}\n", total_links));

    let errors = dataset
        .records()
        .iter()
        .filter(|r| r.is_broken() || r.is_transport_error())
        .count();
    report.push_str(&format!("  Errors: {}\n", errors));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Group records by host
    let mut by_host: BTreeMap<String, Vec<&UrlRecord>> = BTreeMap::new();
    for record in dataset.records() {
        if let Ok(url) = Url::parse(&record.url)
            && let Some(host) = url.host_str()
        {
            by_host.entry(host.to_string()).or_default().push(record);
        }
    }

    for (host, host_records) in by_host.iter() {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages found\n\n", host_records.len()));

        for record in host_records {
            let path = extract_url_path(&record.url);
            let line = format!(
                "  {} {} ({} in)",
                colored_status(record.status_code),
                path,
                record.in_degree
            );
            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    report
}

/// Status code colored by class, for terminal output.
pub(crate) fn colored_status(status: Option<u16>) -> String {
    use colored::Colorize;

    let Some(code) = status else {
        return "---".dimmed().to_string();
    };
    let label = status_label(code);
    match code {
        100..=199 => label.white().to_string(),
        200..=299 => label.green().to_string(),
        300..=399 => label.cyan().to_string(),
        400..=499 => label.yellow().to_string(),
        500..=599 => label.red().to_string(),
        _ => label.red().bold().to_string(),
    }
}
