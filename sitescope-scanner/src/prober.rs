use crate::ProgressCallback;
use crate::dataset::{Dataset, TRANSPORT_ERROR};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::links::{extract_links, normalize};
use crate::pool::spawn_pool;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome counts of a status probing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub checked: usize,
    pub broken: usize,
    pub transport_errors: usize,
}

/// Outcome counts of a referrer back-trace pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub pages_scanned: usize,
    pub referrers_added: usize,
}

/// Parallel HTTP status verification of every URL in a dataset.
pub struct StatusProber {
    fetcher: Fetcher,
    workers: usize,
    delay: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl StatusProber {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            workers: 10,
            delay: Duration::from_millis(100),
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Per-worker pause before each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Probe every record and store its status. HTTP error codes are stored
    /// as is; transport failures store [`TRANSPORT_ERROR`].
    pub async fn probe(&self, dataset: &mut Dataset) -> ProbeSummary {
        let urls: Vec<String> = dataset.records().iter().map(|r| r.url.clone()).collect();
        let total = urls.len();
        info!("Probing {} URLs with {} workers", total, self.workers);

        let fetcher = self.fetcher.clone();
        let (mut rx, handles) = spawn_pool(urls, self.workers, self.delay, move |url: String| {
            let fetcher = fetcher.clone();
            async move { fetcher.probe_status(&url).await }
        });

        let mut summary = ProbeSummary::default();
        while let Some((url, outcome)) = rx.recv().await {
            let status = match outcome {
                Ok(status) => status,
                Err(e) => {
                    warn!(url = %url, "Connection error: {}", e);
                    summary.transport_errors += 1;
                    TRANSPORT_ERROR
                }
            };
            if status >= 400 {
                warn!(url = %url, status, "Broken link");
                summary.broken += 1;
            }
            dataset.set_status(&url, status);

            summary.checked += 1;
            if let Some(ref callback) = self.progress_callback {
                callback(summary.checked, total);
            }
        }
        join_workers(handles).await;

        summary
    }

    /// Find the pages that link to broken URLs.
    ///
    /// Every record with status 200 whose URL looks like an HTML page (ends
    /// in `.html` or `/`) is fetched again and its links are matched against
    /// the broken set. A page that cannot be fetched contributes nothing.
    pub async fn trace_referrers(&self, dataset: &mut Dataset) -> TraceSummary {
        // normalized form -> stored form
        let broken: HashMap<String, String> = dataset
            .records()
            .iter()
            .filter(|r| r.is_broken())
            .map(|r| (normalize(&r.url), r.url.clone()))
            .collect();
        if broken.is_empty() {
            debug!("No broken URLs, skipping referrer trace");
            return TraceSummary::default();
        }

        let pages: Vec<String> = dataset
            .records()
            .iter()
            .filter(|r| r.status_code == Some(200) && looks_like_page(&r.url))
            .map(|r| r.url.clone())
            .collect();
        let total = pages.len();
        info!(
            "Scanning {} pages for links to {} broken URLs",
            total,
            broken.len()
        );

        let fetcher = self.fetcher.clone();
        let targets: Arc<HashSet<String>> = Arc::new(broken.keys().cloned().collect());
        let (mut rx, handles) = spawn_pool(pages, self.workers, self.delay, move |page: String| {
            let fetcher = fetcher.clone();
            let targets = targets.clone();
            async move { scan_page_for_links(&fetcher, &page, &targets).await }
        });

        let mut summary = TraceSummary::default();
        while let Some((page, outcome)) = rx.recv().await {
            match outcome {
                Ok(found) => {
                    for target in found {
                        if let Some(stored) = broken.get(&target) {
                            let before = dataset.get(stored).map(|r| r.in_degree).unwrap_or(0);
                            dataset.add_referrer(stored, &page);
                            let after = dataset.get(stored).map(|r| r.in_degree).unwrap_or(0);
                            summary.referrers_added += after - before;
                        }
                    }
                }
                Err(e) => debug!(url = %page, "Skipping page in referrer trace: {}", e),
            }

            summary.pages_scanned += 1;
            if let Some(ref callback) = self.progress_callback {
                callback(summary.pages_scanned, total);
            }
        }
        join_workers(handles).await;

        summary
    }
}

fn looks_like_page(url: &str) -> bool {
    url.ends_with(".html") || url.ends_with('/')
}

/// Links on `page_url` that are in `targets` (normalized form).
async fn scan_page_for_links(
    fetcher: &Fetcher,
    page_url: &str,
    targets: &HashSet<String>,
) -> Result<Vec<String>> {
    let (status, body) = fetcher.get_text(page_url).await?;
    if status != 200 {
        return Ok(Vec::new());
    }

    let found = extract_links(&body, page_url)?
        .into_iter()
        .map(|link| normalize(&link))
        .filter(|link| targets.contains(link))
        .collect();
    Ok(found)
}

async fn join_workers(handles: Vec<tokio::task::JoinHandle<()>>) {
    for result in join_all(handles).await {
        if let Err(e) = result {
            warn!("Probe worker failed: {}", e);
        }
    }
}
