use crate::ProgressCallback;
use crate::dataset::{Dataset, TRANSPORT_ERROR, UrlMetadata};
use crate::error::{Result, ScanError};
use crate::fetch::{Fetcher, content_type, is_html};
use crate::links::{SiteScope, extract_links};
use reqwest::StatusCode;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// State shared by the coordinator and every fetch task of one crawl.
///
/// The record store, the visited set and the frontier sit behind one lock so
/// that "check visited, mark, enqueue" is a single step for each worker.
struct CrawlState {
    dataset: Dataset,
    frontier: VecDeque<(String, Option<String>)>,
    visited: HashSet<String>,
    max_pages: usize,
}

impl CrawlState {
    fn new(seed: &str, max_pages: usize) -> Self {
        let mut dataset = Dataset::new(seed);
        dataset.add_url(seed, UrlMetadata::default());

        let mut visited = HashSet::new();
        visited.insert(seed.to_string());

        let mut frontier = VecDeque::new();
        frontier.push_back((seed.to_string(), None));

        Self {
            dataset,
            frontier,
            visited,
            max_pages,
        }
    }

    /// Merge one fetched page: its status and the in-scope links found on it.
    fn apply(&mut self, outcome: PageOutcome) {
        self.dataset.set_status(&outcome.url, outcome.status);

        for link in outcome.links {
            if !self.visited.contains(&link) {
                if self.visited.len() >= self.max_pages {
                    continue;
                }
                self.visited.insert(link.clone());
                self.dataset
                    .add_url(&link, UrlMetadata::default().with_discovery_parent(&outcome.url));
                self.frontier.push_back((link.clone(), Some(outcome.url.clone())));
            }
            self.dataset.add_referrer(&link, &outcome.url);
        }
    }
}

/// Result of fetching one page.
#[derive(Debug)]
struct PageOutcome {
    url: String,
    status: u16,
    links: Vec<String>,
}

impl PageOutcome {
    fn leaf(url: String, status: u16) -> Self {
        Self {
            url,
            status,
            links: Vec::new(),
        }
    }
}

/// Breadth-first crawler confined to the seed's host.
pub struct Crawler {
    fetcher: Fetcher,
    max_pages: usize,
    workers: usize,
    delay: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            max_pages: 500,
            workers: 10,
            delay: Duration::from_millis(100),
            progress_callback: None,
        }
    }

    /// Upper bound on the number of pages recorded (and fetched).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Politeness delay applied before each page fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn crawl(&self, start_url: &str) -> Result<Dataset> {
        let mut seed_url = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("Invalid URL: {}", e)))?;
        seed_url.set_fragment(None);
        let scope = SiteScope::from_url(&seed_url)
            .ok_or_else(|| ScanError::InvalidUrl(format!("No host in {}", start_url)))?;
        let seed = seed_url.to_string();

        info!(
            "Starting crawl of {} with {} workers (max {} pages)",
            seed, self.workers, self.max_pages
        );

        let state = Arc::new(Mutex::new(CrawlState::new(&seed, self.max_pages)));
        let scope = Arc::new(scope);
        let permits = Arc::new(Semaphore::new(self.workers));
        let in_flight_cap = self.workers * 2;

        let mut tasks = JoinSet::new();
        let mut completed = 0usize;

        loop {
            while tasks.len() < in_flight_cap {
                let Some((url, parent)) = state.lock().await.frontier.pop_front() else {
                    break;
                };
                debug!(url = %url, parent = ?parent, "Dispatching");

                let fetcher = self.fetcher.clone();
                let scope = scope.clone();
                let permits = permits.clone();
                let state = state.clone();
                let delay = self.delay;

                tasks.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let outcome = Self::fetch_page(&fetcher, &scope, url).await;
                    state.lock().await.apply(outcome);
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            if let Err(e) = joined {
                warn!("Crawl task failed: {}", e);
            }

            completed += 1;
            if let Some(ref callback) = self.progress_callback {
                callback(completed, self.max_pages);
            }
        }

        let mut dataset = std::mem::take(&mut state.lock().await.dataset);
        dataset.mark_fetched();
        info!("Crawl complete. Recorded {} pages", dataset.len());

        Ok(dataset)
    }

    /// Fetch one page and pull out its in-scope links. Never fails: transport
    /// errors become [`TRANSPORT_ERROR`] leaves.
    async fn fetch_page(fetcher: &Fetcher, scope: &SiteScope, url: String) -> PageOutcome {
        let head = match fetcher.head(&url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, "HEAD failed: {}", e);
                return PageOutcome::leaf(url, TRANSPORT_ERROR);
            }
        };

        // Servers that reject HEAD get a full fetch; the GET tells us the type.
        if head.status() != StatusCode::METHOD_NOT_ALLOWED
            && !is_html(content_type(&head).as_deref())
        {
            debug!(url = %url, "Not HTML, recording as leaf");
            return PageOutcome::leaf(url, head.status().as_u16());
        }

        let response = match fetcher.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, "GET failed: {}", e);
                return PageOutcome::leaf(url, TRANSPORT_ERROR);
            }
        };
        let status = response.status().as_u16();
        if status != 200 || !is_html(content_type(&response).as_deref()) {
            return PageOutcome::leaf(url, status);
        }
        // Relative links resolve against the page we landed on after redirects.
        let base = response.url().to_string();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, "Reading body failed: {}", e);
                return PageOutcome::leaf(url, status);
            }
        };

        let links = match extract_links(&body, &base) {
            Ok(links) => links
                .into_iter()
                .filter(|link| scope.accepts(link))
                .collect(),
            Err(e) => {
                warn!(url = %url, "Link extraction failed: {}", e);
                Vec::new()
            }
        };
        debug!(url = %url, "Found {} in-scope links", links.len());

        PageOutcome { url, status, links }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn crawler() -> Crawler {
        Crawler::new(Fetcher::new().unwrap())
            .with_workers(4)
            .with_delay(Duration::ZERO)
    }

    /// Serve an HTML page on both HEAD and GET.
    async fn mount_page(server: &MockServer, page_path: &str, body: String) {
        Mock::given(method("HEAD"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    fn links_html(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|href| format!(r#"<a href="{}">link</a>"#, href))
            .collect();
        format!("<html><body>{}</body></html>", anchors)
    }

    #[tokio::test]
    async fn test_shared_link_is_recorded_once_with_full_in_degree() {
        let mock_server = MockServer::start().await;

        mount_page(&mock_server, "/", links_html(&["/p1", "/p2", "/p3"])).await;
        mount_page(&mock_server, "/p1", links_html(&["/a"])).await;
        mount_page(&mock_server, "/p2", links_html(&["/a"])).await;
        mount_page(&mock_server, "/p3", links_html(&["/a#details"])).await;
        mount_page(&mock_server, "/a", links_html(&[])).await;

        let dataset = crawler().crawl(&mock_server.uri()).await.unwrap();

        assert_eq!(dataset.len(), 5);
        let a = dataset.get(&format!("{}/a", mock_server.uri())).unwrap();
        assert_eq!(a.in_degree, 3);
        assert_eq!(a.status_code, Some(200));
        assert!(a.discovery_parent.is_some());

        let a_count = dataset
            .records()
            .iter()
            .filter(|r| r.url.ends_with("/a"))
            .count();
        assert_eq!(a_count, 1);
        assert!(dataset.fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_self_link_is_not_a_referrer() {
        let mock_server = MockServer::start().await;

        mount_page(&mock_server, "/", links_html(&["/", "/about"])).await;
        mount_page(&mock_server, "/about", links_html(&["/about", "/"])).await;

        let dataset = crawler().crawl(&mock_server.uri()).await.unwrap();

        let root = dataset.get(&format!("{}/", mock_server.uri())).unwrap();
        assert_eq!(root.referrers, vec![format!("{}/about", mock_server.uri())]);
        let about = dataset.get(&format!("{}/about", mock_server.uri())).unwrap();
        assert_eq!(about.referrers, vec![format!("{}/", mock_server.uri())]);
        assert_eq!(about.in_degree, 1);
    }

    #[tokio::test]
    async fn test_page_cap_bounds_records_and_fetches() {
        let mock_server = MockServer::start().await;

        let hrefs: Vec<String> = (0..50).map(|i| format!("/page{}", i)).collect();
        let href_refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        mount_page(&mock_server, "/", links_html(&href_refs)).await;
        for href in &hrefs {
            mount_page(&mock_server, href, links_html(&["/"])).await;
        }

        let progress = Arc::new(AtomicUsize::new(0));
        let progress_clone = progress.clone();
        let dataset = crawler()
            .with_max_pages(5)
            .with_progress_callback(Arc::new(move |done, _total| {
                progress_clone.store(done, Ordering::SeqCst);
            }))
            .crawl(&mock_server.uri())
            .await
            .unwrap();

        assert_eq!(dataset.len(), 5);
        assert_eq!(progress.load(Ordering::SeqCst), 5);

        let requests = mock_server.received_requests().await.unwrap();
        let gets = requests
            .iter()
            .filter(|r| r.method.as_str() == "GET")
            .count();
        assert_eq!(gets, 5);
    }

    #[tokio::test]
    async fn test_links_resolve_against_redirect_target() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        Mock::given(path("/docs"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/docs/", base)),
            )
            .mount(&mock_server)
            .await;
        mount_page(&mock_server, "/docs/", links_html(&["guide"])).await;
        mount_page(&mock_server, "/docs/guide", links_html(&[])).await;

        let dataset = crawler().crawl(&format!("{}/docs", base)).await.unwrap();

        assert!(dataset.contains(&format!("{}/docs/guide", base)));
        assert!(!dataset.contains(&format!("{}/guide", base)));
    }

    #[tokio::test]
    async fn test_non_html_page_is_a_leaf() {
        let mock_server = MockServer::start().await;

        mount_page(&mock_server, "/", links_html(&["/report"])).await;
        Mock::given(method("HEAD"))
            .and(path("/report"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/pdf"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/report"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_string(r#"<a href="/hidden">not a link</a>"#),
            )
            .expect(0)
            .mount(&mock_server)
            .await;

        let dataset = crawler().crawl(&mock_server.uri()).await.unwrap();

        assert_eq!(dataset.len(), 2);
        let report = dataset.get(&format!("{}/report", mock_server.uri())).unwrap();
        assert_eq!(report.status_code, Some(200));
        assert!(!dataset.contains(&format!("{}/hidden", mock_server.uri())));
    }

    #[tokio::test]
    async fn test_error_pages_are_recorded_without_extraction() {
        let mock_server = MockServer::start().await;

        mount_page(&mock_server, "/", links_html(&["/missing"])).await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).insert_header("content-type", "text/html"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "text/html")
                    .set_body_string(links_html(&["/from-error-page"])),
            )
            .mount(&mock_server)
            .await;

        let dataset = crawler().crawl(&mock_server.uri()).await.unwrap();

        assert_eq!(dataset.len(), 2);
        let missing = dataset.get(&format!("{}/missing", mock_server.uri())).unwrap();
        assert_eq!(missing.status_code, Some(404));
        assert!(!dataset.contains(&format!("{}/from-error-page", mock_server.uri())));
    }

    #[tokio::test]
    async fn test_scope_and_denylist_filter_links() {
        let mock_server = MockServer::start().await;

        mount_page(
            &mock_server,
            "/",
            links_html(&[
                "/docs/",
                "https://elsewhere.example/",
                "/logo.png",
                "/style.css",
                "/manual.pdf",
                "mailto:someone@example.com",
            ]),
        )
        .await;
        mount_page(&mock_server, "/docs/", links_html(&[])).await;

        let dataset = crawler().crawl(&mock_server.uri()).await.unwrap();

        let urls: Vec<&str> = dataset.records().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}/", mock_server.uri()),
                format!("{}/docs/", mock_server.uri())
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_seed_is_recorded_as_transport_error() {
        let dataset = crawler().crawl("http://127.0.0.1:1/").await.unwrap();

        assert_eq!(dataset.len(), 1);
        assert!(dataset.records()[0].is_transport_error());
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected() {
        let result = crawler().crawl("not a url").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
    }
}
