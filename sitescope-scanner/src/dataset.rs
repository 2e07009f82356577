use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status recorded when a fetch failed before any HTTP response arrived
/// (DNS, connect, timeout). Never a real HTTP status code.
pub const TRANSPORT_ERROR: u16 = 0;

/// One observed URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    #[serde(default)]
    pub lastmod: Option<String>,
    #[serde(default)]
    pub changefreq: Option<String>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub source_sitemap: Option<String>,
    #[serde(default)]
    pub discovery_parent: Option<String>,
    #[serde(default)]
    pub referrers: Vec<String>,
    #[serde(default)]
    pub in_degree: usize,
}

impl UrlRecord {
    fn new(url: String, metadata: UrlMetadata) -> Self {
        Self {
            url,
            lastmod: metadata.lastmod,
            changefreq: metadata.changefreq,
            priority: metadata.priority,
            status_code: metadata.status_code,
            source_sitemap: metadata.source_sitemap,
            discovery_parent: metadata.discovery_parent,
            referrers: Vec::new(),
            in_degree: 0,
        }
    }

    /// True when the probe/fetch failed at the transport level.
    pub fn is_transport_error(&self) -> bool {
        self.status_code == Some(TRANSPORT_ERROR)
    }

    /// True for HTTP error responses (status >= 400).
    pub fn is_broken(&self) -> bool {
        matches!(self.status_code, Some(code) if code >= 400)
    }
}

/// Optional attributes supplied when a URL is first added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlMetadata {
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f64>,
    pub status_code: Option<u16>,
    pub source_sitemap: Option<String>,
    pub discovery_parent: Option<String>,
}

impl UrlMetadata {
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_source_sitemap(mut self, sitemap: impl Into<String>) -> Self {
        self.source_sitemap = Some(sitemap.into());
        self
    }

    pub fn with_discovery_parent(mut self, parent: impl Into<String>) -> Self {
        self.discovery_parent = Some(parent.into());
        self
    }
}

/// Strip the `#fragment` part of a URL string, leaving everything else as is.
pub fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

/// The record store for one resolve or crawl run.
///
/// Records keep insertion order; the index maps each URL to its position.
/// All mutation goes through `add_url`, `add_referrer` and `set_status`, so
/// the invariants hold as long as callers serialize access (the crawler and
/// prober hold it behind a single lock or a single writer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StoredDataset")]
pub struct Dataset {
    pub source_url: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    urls: Vec<UrlRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct StoredDataset {
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    urls: Vec<UrlRecord>,
}

impl From<StoredDataset> for Dataset {
    fn from(stored: StoredDataset) -> Self {
        Dataset::from_records(stored.source_url, stored.fetched_at, stored.urls)
    }
}

impl Dataset {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: Some(source_url.into()),
            ..Self::default()
        }
    }

    /// Rebuild a dataset from previously stored records.
    ///
    /// Duplicate URLs keep their first occurrence, referrer lists are
    /// deduplicated and stripped of self references, and in-degree is
    /// recomputed rather than trusted.
    pub fn from_records(
        source_url: Option<String>,
        fetched_at: Option<DateTime<Utc>>,
        records: Vec<UrlRecord>,
    ) -> Self {
        let mut dataset = Self {
            source_url,
            fetched_at,
            ..Self::default()
        };

        for mut record in records {
            record.url = strip_fragment(&record.url).to_string();
            if dataset.index.contains_key(&record.url) {
                continue;
            }
            let mut referrers: Vec<String> = Vec::with_capacity(record.referrers.len());
            for referrer in record.referrers.drain(..) {
                if referrer != record.url && !referrers.contains(&referrer) {
                    referrers.push(referrer);
                }
            }
            record.in_degree = referrers.len();
            record.referrers = referrers;
            dataset.index.insert(record.url.clone(), dataset.urls.len());
            dataset.urls.push(record);
        }

        dataset
    }

    /// Insert a record for `url` unless one exists. Returns whether a record
    /// was inserted; an existing record's metadata is never overwritten.
    pub fn add_url(&mut self, url: &str, metadata: UrlMetadata) -> bool {
        let url = strip_fragment(url);
        if self.index.contains_key(url) {
            return false;
        }
        self.index.insert(url.to_string(), self.urls.len());
        self.urls.push(UrlRecord::new(url.to_string(), metadata));
        true
    }

    /// Record `referrer` as linking to `target`. No-op when the target is
    /// unknown, the referrer is already listed, or both are the same URL.
    pub fn add_referrer(&mut self, target: &str, referrer: &str) {
        let target = strip_fragment(target);
        let referrer = strip_fragment(referrer);
        if target == referrer {
            return;
        }
        let Some(&position) = self.index.get(target) else {
            return;
        };
        let record = &mut self.urls[position];
        if !record.referrers.iter().any(|r| r == referrer) {
            record.referrers.push(referrer.to_string());
            record.in_degree = record.referrers.len();
        }
    }

    /// Set the status of an existing record. Unknown URLs are ignored.
    pub fn set_status(&mut self, url: &str, status_code: u16) {
        if let Some(&position) = self.index.get(strip_fragment(url)) {
            self.urls[position].status_code = Some(status_code);
        }
    }

    pub fn get(&self, url: &str) -> Option<&UrlRecord> {
        self.index
            .get(strip_fragment(url))
            .map(|&position| &self.urls[position])
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(strip_fragment(url))
    }

    pub fn records(&self) -> &[UrlRecord] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Stamp the completion time of the run.
    pub fn mark_fetched(&mut self) {
        self.fetched_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_url_is_idempotent() {
        let mut dataset = Dataset::new("https://example.com/");

        let first = dataset.add_url(
            "https://example.com/a",
            UrlMetadata::default().with_source_sitemap("https://example.com/sitemap.xml"),
        );
        let second = dataset.add_url(
            "https://example.com/a",
            UrlMetadata::default().with_status(500),
        );

        assert!(first);
        assert!(!second);
        assert_eq!(dataset.len(), 1);

        let record = dataset.get("https://example.com/a").unwrap();
        assert_eq!(record.status_code, None);
        assert_eq!(
            record.source_sitemap.as_deref(),
            Some("https://example.com/sitemap.xml")
        );
    }

    #[test]
    fn test_fragment_is_stripped_before_storage() {
        let mut dataset = Dataset::new("https://example.com/");
        dataset.add_url("https://example.com/page#top", UrlMetadata::default());

        assert!(dataset.add_url("https://example.com/other", UrlMetadata::default()));
        assert!(!dataset.add_url("https://example.com/page#bottom", UrlMetadata::default()));
        assert_eq!(dataset.records()[0].url, "https://example.com/page");
    }

    #[test]
    fn test_in_degree_tracks_distinct_referrers() {
        let mut dataset = Dataset::new("https://example.com/");
        dataset.add_url("https://example.com/a", UrlMetadata::default());

        dataset.add_referrer("https://example.com/a", "https://example.com/");
        dataset.add_referrer("https://example.com/a", "https://example.com/b");
        dataset.add_referrer("https://example.com/a", "https://example.com/b");
        dataset.add_referrer("https://example.com/a", "https://example.com/c#frag");

        let record = dataset.get("https://example.com/a").unwrap();
        assert_eq!(
            record.referrers,
            vec![
                "https://example.com/",
                "https://example.com/b",
                "https://example.com/c"
            ]
        );
        assert_eq!(record.in_degree, 3);
    }

    #[test]
    fn test_self_referrer_is_ignored() {
        let mut dataset = Dataset::new("https://example.com/");
        dataset.add_url("https://example.com/a", UrlMetadata::default());

        dataset.add_referrer("https://example.com/a", "https://example.com/a");
        dataset.add_referrer("https://example.com/a", "https://example.com/a#section");

        let record = dataset.get("https://example.com/a").unwrap();
        assert!(record.referrers.is_empty());
        assert_eq!(record.in_degree, 0);
    }

    #[test]
    fn test_unknown_targets_are_ignored() {
        let mut dataset = Dataset::new("https://example.com/");
        dataset.add_referrer("https://example.com/missing", "https://example.com/");
        dataset.set_status("https://example.com/missing", 404);

        assert!(dataset.is_empty());
        assert!(!dataset.contains("https://example.com/missing"));
    }

    #[test]
    fn test_set_status_and_flags() {
        let mut dataset = Dataset::new("https://example.com/");
        dataset.add_url("https://example.com/gone", UrlMetadata::default());
        dataset.add_url("https://example.com/down", UrlMetadata::default());

        dataset.set_status("https://example.com/gone", 410);
        dataset.set_status("https://example.com/down", TRANSPORT_ERROR);

        let gone = dataset.get("https://example.com/gone").unwrap();
        assert!(gone.is_broken());
        assert!(!gone.is_transport_error());

        let down = dataset.get("https://example.com/down").unwrap();
        assert!(!down.is_broken());
        assert!(down.is_transport_error());
    }

    #[test]
    fn test_loading_stored_json_restores_invariants() {
        let json = r#"{
            "source_url": "https://example.com/",
            "fetched_at": "2024-05-01T10:00:00Z",
            "total_urls": 3,
            "urls": [
                {"url": "https://example.com/", "status_code": 200},
                {"url": "https://example.com/a", "referrers": [
                    "https://example.com/", "https://example.com/", "https://example.com/a"
                ], "in_degree": 7},
                {"url": "https://example.com/a", "status_code": 404}
            ]
        }"#;

        let dataset: Dataset = serde_json::from_str(json).unwrap();

        assert_eq!(dataset.len(), 2);
        assert!(dataset.fetched_at.is_some());
        let record = dataset.get("https://example.com/a").unwrap();
        assert_eq!(record.referrers, vec!["https://example.com/"]);
        assert_eq!(record.in_degree, 1);
        assert_eq!(record.status_code, None);
    }
}
