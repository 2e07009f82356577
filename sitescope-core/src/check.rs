// Link checking over an existing dataset

use crate::map::{broken_links, status_label};
use crate::{progress_bar, scanner_progress};
use sitescope_scanner::{Dataset, FetchConfig, Fetcher, ProbeSummary, StatusProber, TraceSummary};
use std::time::Duration;
use tracing::info;

/// Options for configuring a link check
pub struct CheckOptions {
    pub workers: usize,
    /// Per-worker delay before each request
    pub delay: Duration,
    /// Re-fetch healthy pages to find who links to broken URLs
    pub trace_referrers: bool,
    pub fetch: FetchConfig,
    pub show_progress_bars: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            delay: Duration::from_millis(100),
            trace_referrers: true,
            fetch: FetchConfig::default(),
            show_progress_bars: true,
        }
    }
}

/// Summary of one link check run
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    pub probe: ProbeSummary,
    /// Present when the referrer trace ran
    pub trace: Option<TraceSummary>,
}

/// Probe every URL of `dataset`, then optionally trace the referrers of the
/// broken ones. Statuses and referrers are written into the dataset.
pub async fn execute_link_check(
    dataset: &mut Dataset,
    options: CheckOptions,
) -> Result<CheckOutcome, String> {
    let fetcher = Fetcher::with_config(options.fetch.clone())
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    Ok(check_with_fetcher(fetcher, dataset, &options).await)
}

pub(crate) async fn check_with_fetcher(
    fetcher: Fetcher,
    dataset: &mut Dataset,
    options: &CheckOptions,
) -> CheckOutcome {
    let pb = options
        .show_progress_bars
        .then(|| progress_bar(dataset.len() as u64, "Checking links"));

    let mut prober = StatusProber::new(fetcher)
        .with_workers(options.workers)
        .with_delay(options.delay);
    if let Some(ref pb) = pb {
        prober = prober.with_progress_callback(scanner_progress(pb));
    }

    let probe = prober.probe(dataset).await;
    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }
    info!(
        checked = probe.checked,
        broken = probe.broken,
        transport_errors = probe.transport_errors,
        "Link check finished"
    );

    let trace = if options.trace_referrers && probe.broken > 0 {
        let pb = options
            .show_progress_bars
            .then(|| progress_bar(0, "Tracing referrers"));
        let prober = match pb {
            Some(ref pb) => prober.with_progress_callback(scanner_progress(pb)),
            None => prober,
        };

        let trace = prober.trace_referrers(dataset).await;
        if let Some(ref pb) = pb {
            pb.finish_and_clear();
        }
        Some(trace)
    } else {
        None
    };

    CheckOutcome { probe, trace }
}

/// Generate a report of broken URLs and the pages that link to them
pub fn generate_broken_link_report(dataset: &Dataset) -> String {
    let broken = broken_links(dataset);

    let mut report = String::new();
    report.push_str("═══════════════════════════════════════════════════════════════════════════════\n");
    report.push_str("                            BROKEN LINKS\n");
    report.push_str("═══════════════════════════════════════════════════════════════════════════════\n\n");

    report.push_str(&format!("URLs checked:  {}\n", dataset.len()));
    report.push_str(&format!("Broken links:  {}\n\n", broken.len()));

    if broken.is_empty() {
        report.push_str("No broken links found.\n\n");
    }

    for link in &broken {
        report.push_str(&format!("[{}] {}\n", status_label(link.status_code), link.url));
        if link.referrers.is_empty() {
            report.push_str("  Referenced from: (no referring page found)\n");
        } else {
            report.push_str("  Referenced from:\n");
            for referrer in &link.referrers {
                report.push_str(&format!("    - {}\n", referrer));
            }
        }
        report.push_str("───────────────────────────────────────────────────────────────────────────────\n");
    }

    report.push_str("═══════════════════════════════════════════════════════════════════════════════\n");
    report.push_str("                            End of Report\n");
    report.push_str("═══════════════════════════════════════════════════════════════════════════════\n");

    report
}
