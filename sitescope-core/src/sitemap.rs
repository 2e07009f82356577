use crate::RunProgressCallback;
use crate::check::{CheckOptions, check_with_fetcher};
use indicatif::{ProgressBar, ProgressStyle};
use sitescope_scanner::{
    Dataset, FetchConfig, Fetcher, ProbeSummary, ResolveStats, SitemapResolver, TraceSummary,
    discover_sitemap,
};
use std::time::Duration;
use tracing::info;

/// Options for configuring a sitemap audit
pub struct SitemapOptions {
    pub sitemap_url: String,
    pub max_depth: usize,
    /// Pause after each sitemap document
    pub document_delay: Duration,
    pub check_links: bool,
    pub trace_referrers: bool,
    pub workers: usize,
    pub probe_delay: Duration,
    pub fetch: FetchConfig,
    pub show_progress_bars: bool,
}

impl SitemapOptions {
    pub fn new(sitemap_url: impl Into<String>) -> Self {
        Self {
            sitemap_url: sitemap_url.into(),
            max_depth: 10,
            document_delay: Duration::from_millis(500),
            check_links: false,
            trace_referrers: true,
            workers: 10,
            probe_delay: Duration::from_millis(100),
            fetch: FetchConfig::default(),
            show_progress_bars: true,
        }
    }
}

/// Result of a sitemap audit
#[derive(Debug, Clone, Default)]
pub struct SitemapAudit {
    pub dataset: Dataset,
    pub stats: ResolveStats,
    pub probe: Option<ProbeSummary>,
    pub trace: Option<TraceSummary>,
}

/// Find the sitemap of a domain from its well-known locations or robots.txt
pub async fn find_sitemap(domain: &str, fetch: FetchConfig) -> Result<String, String> {
    let fetcher =
        Fetcher::with_config(fetch).map_err(|e| format!("Failed to create HTTP client: {}", e))?;
    discover_sitemap(&fetcher, domain)
        .await
        .ok_or_else(|| format!("Could not find a sitemap for {}", domain))
}

/// Resolve a sitemap into a dataset, optionally checking every URL.
///
/// An unreadable root sitemap is not an error: the audit comes back with an
/// empty dataset.
pub async fn execute_sitemap_audit(
    options: SitemapOptions,
    progress_callback: Option<RunProgressCallback>,
) -> Result<SitemapAudit, String> {
    let fetcher = Fetcher::with_config(options.fetch.clone())
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    if let Some(ref callback) = progress_callback {
        callback(format!("Resolving sitemap {}", options.sitemap_url));
    }

    let spinner = if options.show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Reading sitemap documents...");
        Some(pb)
    } else {
        None
    };

    let resolution = SitemapResolver::new(fetcher.clone())
        .with_max_depth(options.max_depth)
        .with_delay(options.document_delay)
        .resolve(&options.sitemap_url)
        .await;

    if let Some(ref pb) = spinner {
        pb.finish_and_clear();
    }

    info!(
        url = %options.sitemap_url,
        urls = resolution.dataset.len(),
        documents = resolution.stats.documents_fetched,
        "Sitemap resolved"
    );

    let mut audit = SitemapAudit {
        dataset: resolution.dataset,
        stats: resolution.stats,
        ..SitemapAudit::default()
    };

    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Found {} URLs in {} sitemap documents",
            audit.dataset.len(),
            audit.stats.documents_fetched
        ));
    }

    if options.check_links && !audit.dataset.is_empty() {
        if let Some(ref callback) = progress_callback {
            callback(format!("Checking {} URLs", audit.dataset.len()));
        }

        let check_options = CheckOptions {
            workers: options.workers,
            delay: options.probe_delay,
            trace_referrers: options.trace_referrers,
            fetch: options.fetch,
            show_progress_bars: options.show_progress_bars,
        };
        let outcome = check_with_fetcher(fetcher, &mut audit.dataset, &check_options).await;
        audit.probe = Some(outcome.probe);
        audit.trace = outcome.trace;
    }

    Ok(audit)
}
