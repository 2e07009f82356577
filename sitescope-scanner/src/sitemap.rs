//! Recursive sitemap resolution.
//!
//! A root sitemap document is fetched and classified by its root element.
//! `<sitemapindex>` documents fan out to their child sitemaps; `<urlset>`
//! documents contribute their `<url>` entries to the dataset. Each document
//! is visited at most once per [`SitemapResolver::resolve`] call and descent
//! stops at the configured depth.

use crate::dataset::{Dataset, UrlMetadata};
use crate::error::{Result, ScanError};
use crate::fetch::Fetcher;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Well-known sitemap locations tried by [`discover_sitemap`], in order.
pub const COMMON_SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap1.xml",
    "/sitemaps/sitemap.xml",
];

/// One `<url>` entry of a urlset document.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f64>,
}

/// A parsed sitemap document, classified by its root element.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// Child sitemap locations of a `<sitemapindex>`.
    Index(Vec<String>),
    /// Page entries of a `<urlset>`.
    UrlSet(Vec<SitemapEntry>),
    /// Any other root element (local name).
    Unrecognized(String),
}

/// Counters describing one resolve run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub documents_fetched: usize,
    pub indexes: usize,
    pub urlsets: usize,
    pub cycles_skipped: usize,
    pub depth_pruned: usize,
    pub failed_documents: usize,
    pub urls_extracted: usize,
}

/// Output of [`SitemapResolver::resolve`].
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub dataset: Dataset,
    pub stats: ResolveStats,
}

pub struct SitemapResolver {
    fetcher: Fetcher,
    max_depth: usize,
    delay: Duration,
}

impl SitemapResolver {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            max_depth: 10,
            delay: Duration::from_millis(500),
        }
    }

    /// Deepest index nesting followed; the root document is depth 0.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Pause after each document fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Resolve `root_url` into a dataset of page URLs.
    ///
    /// Failures below the root prune only their own branch. A root document
    /// that cannot be fetched or parsed yields an empty dataset.
    pub async fn resolve(&self, root_url: &str) -> Resolution {
        info!("Resolving sitemap {} (max depth {})", root_url, self.max_depth);

        let mut dataset = Dataset::new(root_url);
        let mut stats = ResolveStats::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<(String, usize)> = vec![(root_url.to_string(), 0)];

        while let Some((document_url, depth)) = stack.pop() {
            if depth > self.max_depth {
                warn!(url = %document_url, depth, "Maximum sitemap depth exceeded, skipping branch");
                stats.depth_pruned += 1;
                continue;
            }
            if !visited.insert(document_url.clone()) {
                warn!(url = %document_url, "Sitemap already processed, skipping");
                stats.cycles_skipped += 1;
                continue;
            }

            let document = match self.fetch_document(&document_url).await {
                Ok(document) => {
                    stats.documents_fetched += 1;
                    document
                }
                Err(e) => {
                    stats.failed_documents += 1;
                    if depth == 0 {
                        error!(url = %document_url, "Could not read root sitemap: {}", e);
                    } else {
                        warn!(url = %document_url, "Skipping sitemap: {}", e);
                    }
                    continue;
                }
            };

            match document {
                SitemapDocument::Index(children) => {
                    stats.indexes += 1;
                    debug!(url = %document_url, "Sitemap index with {} children", children.len());
                    for child in children.into_iter().rev() {
                        stack.push((child, depth + 1));
                    }
                }
                SitemapDocument::UrlSet(entries) => {
                    stats.urlsets += 1;
                    let count = entries.len();
                    for entry in entries {
                        let metadata = UrlMetadata {
                            lastmod: entry.lastmod,
                            changefreq: entry.changefreq,
                            priority: entry.priority,
                            ..UrlMetadata::default()
                        }
                        .with_source_sitemap(&document_url);
                        if dataset.add_url(&entry.loc, metadata) {
                            stats.urls_extracted += 1;
                        }
                    }
                    info!(url = %document_url, "Extracted {} URLs", count);
                }
                SitemapDocument::Unrecognized(root) => {
                    stats.failed_documents += 1;
                    warn!(url = %document_url, root = %root, "Unrecognized sitemap root element");
                }
            }
        }

        dataset.mark_fetched();
        info!(
            "Sitemap resolution complete: {} URLs from {} documents",
            dataset.len(),
            stats.documents_fetched
        );

        Resolution { dataset, stats }
    }

    async fn fetch_document(&self, url: &str) -> Result<SitemapDocument> {
        let (content_type, body) = self.fetcher.get_document(url).await?;

        if let Some(ref ct) = content_type {
            let ct = ct.to_ascii_lowercase();
            if !ct.contains("xml") && !ct.contains("text") {
                warn!(url = %url, content_type = %ct, "Unexpected sitemap content type");
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        parse_document(&body)
    }
}

/// Classify and parse a sitemap document.
///
/// The root element is matched by local name, so namespaced and prefixed
/// documents parse the same. Only direct children of `<url>` and `<sitemap>`
/// are read; extension elements such as `<image:loc>` are ignored. `<url>`
/// entries without a `<loc>` are dropped and a priority that is not a number
/// in `[0.0, 1.0]` is treated as absent.
pub fn parse_document(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut children: Vec<String> = Vec::new();
    let mut entries: Vec<SitemapEntry> = Vec::new();

    let mut current: Option<SitemapEntry> = None;
    // Local names of the open elements, root first.
    let mut open: Vec<String> = Vec::new();

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ScanError::ParseError(format!("XML parse error: {e}")))?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(name.clone());
                } else if open.len() == 1 && name == "url" {
                    current = Some(SitemapEntry {
                        loc: String::new(),
                        lastmod: None,
                        changefreq: None,
                        priority: None,
                    });
                }
                open.push(name);
            }
            Event::Empty(e) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_string());
                }
            }
            Event::End(_) => {
                let closed = open.pop();
                if open.len() == 1
                    && closed.as_deref() == Some("url")
                    && let Some(entry) = current.take()
                {
                    if entry.loc.is_empty() {
                        debug!("Dropping <url> entry without <loc>");
                    } else {
                        entries.push(entry);
                    }
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| ScanError::ParseError(e.to_string()))?;
                apply_text(text.trim(), &open, current.as_mut(), &mut children);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).to_string();
                apply_text(text.trim(), &open, current.as_mut(), &mut children);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("sitemapindex") => Ok(SitemapDocument::Index(children)),
        Some("urlset") => Ok(SitemapDocument::UrlSet(entries)),
        Some(other) => Ok(SitemapDocument::Unrecognized(other.to_string())),
        None => Err(ScanError::ParseError("Empty XML document".to_string())),
    }
}

/// Store `text` when the innermost open element is a field of a top-level
/// `<url>` or `<sitemap>`.
fn apply_text(
    text: &str,
    open: &[String],
    entry: Option<&mut SitemapEntry>,
    children: &mut Vec<String>,
) {
    if text.is_empty() || open.len() != 3 {
        return;
    }
    let (parent, element) = (open[1].as_str(), open[2].as_str());
    match (parent, element, entry) {
        ("url", "loc", Some(entry)) => entry.loc = text.to_string(),
        ("url", "lastmod", Some(entry)) => entry.lastmod = Some(text.to_string()),
        ("url", "changefreq", Some(entry)) => entry.changefreq = Some(text.to_string()),
        ("url", "priority", Some(entry)) => entry.priority = parse_priority(text),
        ("sitemap", "loc", _) => children.push(text.to_string()),
        _ => {}
    }
}

fn parse_priority(s: &str) -> Option<f64> {
    s.parse::<f64>()
        .ok()
        .filter(|p| (0.0..=1.0).contains(p))
}

/// Look for a site's sitemap: the common locations first (HEAD, status 200),
/// then `Sitemap:` lines in robots.txt. Bare domains are taken as https.
pub async fn discover_sitemap(fetcher: &Fetcher, domain: &str) -> Option<String> {
    let with_scheme = if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    let base = parsed.origin().ascii_serialization();
    info!("Looking for a sitemap on {}", base);

    for candidate_path in COMMON_SITEMAP_PATHS {
        let candidate = format!("{}{}", base, candidate_path);
        match fetcher.head(&candidate).await {
            Ok(response) if response.status().as_u16() == 200 => {
                info!("Found sitemap at {}", candidate);
                return Some(candidate);
            }
            Ok(response) => debug!(url = %candidate, status = %response.status(), "No sitemap"),
            Err(e) => debug!(url = %candidate, "Probe failed: {}", e),
        }
    }

    let robots_url = format!("{}/robots.txt", base);
    match fetcher.get_text(&robots_url).await {
        Ok((200, body)) => {
            if let Some(found) = sitemap_from_robots(&body) {
                info!("Found sitemap in robots.txt: {}", found);
                return Some(found);
            }
        }
        Ok((status, _)) => debug!(url = %robots_url, status, "No robots.txt"),
        Err(e) => debug!(url = %robots_url, "Fetching robots.txt failed: {}", e),
    }

    warn!("No sitemap found for {}", base);
    None
}

/// The first `Sitemap:` directive of a robots.txt body.
pub fn sitemap_from_robots(robots: &str) -> Option<String> {
    robots.lines().find_map(|line| {
        let line = line.trim();
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("sitemap") && !value.trim().is_empty() {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}
