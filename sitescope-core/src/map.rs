//! Link graph analysis over a finished dataset.
//!
//! Everything here is a pure function of the [`Dataset`]: nothing is
//! fetched and the dataset is never modified.

use crate::model::{
    AnalyzerConfig, BrokenLink, CanonicalGroup, GlobalNavEntry, GraphEdge, GraphNode,
    IsolatedPage, LinkGraph, PathTree, SiteAnalysis, SiteStatistics, TOP_PAGE_LABEL,
};
use sitescope_scanner::{Dataset, UrlRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use url::Url;

/// Path segments of a URL; an empty path is the single segment `"root"`.
pub fn path_segments(url: &str) -> Vec<String> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return vec!["root".to_string()];
    }
    trimmed.split('/').map(|s| s.to_string()).collect()
}

/// First path segment, or [`TOP_PAGE_LABEL`] for the top page.
pub fn category_of(url: &str) -> String {
    let segments = path_segments(url);
    match segments.first() {
        Some(first) if segments.len() == 1 && first == "root" => TOP_PAGE_LABEL.to_string(),
        Some(first) => first.clone(),
        None => TOP_PAGE_LABEL.to_string(),
    }
}

/// The URL without query string or fragment.
pub fn canonical_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    }
}

/// Rendered size of a graph node: grows with the log of its in-degree and
/// saturates at `cap_size`.
pub fn node_size(in_degree: usize, config: &AnalyzerConfig) -> f64 {
    let size = config.base_size + config.scale_factor * ((in_degree as f64) + 1.0).ln();
    size.min(config.cap_size)
}

/// Short node label: last non-empty path segment.
fn display_name(canonical: &str, is_seed: bool) -> String {
    if is_seed {
        return TOP_PAGE_LABEL.to_string();
    }
    let path = Url::parse(canonical)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => TOP_PAGE_LABEL.to_string(),
    }
}

pub struct LinkGraphAnalyzer<'a> {
    dataset: &'a Dataset,
    config: AnalyzerConfig,
}

impl<'a> LinkGraphAnalyzer<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self::with_config(dataset, AnalyzerConfig::default())
    }

    pub fn with_config(dataset: &'a Dataset, config: AnalyzerConfig) -> Self {
        Self { dataset, config }
    }

    /// Run every analysis.
    pub fn analyze(&self) -> SiteAnalysis {
        SiteAnalysis {
            statistics: self.statistics(),
            global_navigation: self.global_navigation(),
            isolated_pages: self.isolated_pages(),
            graph: self.graph(),
            path_tree: self.path_tree(),
            broken_links: self.broken_links(),
        }
    }

    pub fn categories(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.dataset.records() {
            *counts.entry(category_of(&record.url)).or_insert(0) += 1;
        }
        counts
    }

    pub fn statistics(&self) -> SiteStatistics {
        let mut changefreq_distribution = BTreeMap::new();
        let mut priority_distribution = BTreeMap::new();
        let mut status_distribution = BTreeMap::new();

        for record in self.dataset.records() {
            if let Some(ref changefreq) = record.changefreq {
                *changefreq_distribution.entry(changefreq.clone()).or_insert(0) += 1;
            }
            if let Some(priority) = record.priority {
                *priority_distribution
                    .entry(format!("{:.1}", priority))
                    .or_insert(0) += 1;
            }
            if let Some(status) = record.status_code {
                *status_distribution.entry(status_label(status)).or_insert(0) += 1;
            }
        }

        SiteStatistics {
            total_urls: self.dataset.len(),
            categories: self.categories(),
            changefreq_distribution,
            priority_distribution,
            status_distribution,
            source_url: self.dataset.source_url.clone(),
            fetched_at: self.dataset.fetched_at,
        }
    }

    fn is_excluded_asset(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        self.config
            .excluded_extensions
            .iter()
            .any(|extension| lower.ends_with(extension.as_str()))
    }

    /// Records grouped by canonical URL, in first-seen order. Binary assets
    /// are left out.
    pub fn canonical_groups(&self) -> Vec<CanonicalGroup> {
        let mut groups: Vec<CanonicalGroup> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in self.dataset.records() {
            if self.is_excluded_asset(&record.url) {
                continue;
            }
            let canonical = canonical_url(&record.url);
            match positions.get(&canonical) {
                Some(&position) => {
                    let group = &mut groups[position];
                    group.members.push(record.url.clone());
                    group.in_degree += record.in_degree;
                }
                None => {
                    positions.insert(canonical.clone(), groups.len());
                    groups.push(CanonicalGroup {
                        category: category_of(&record.url),
                        url: canonical,
                        members: vec![record.url.clone()],
                        in_degree: record.in_degree,
                    });
                }
            }
        }

        groups
    }

    fn global_nav_threshold(&self) -> Option<f64> {
        let total = self.dataset.len();
        (total > 0).then(|| total as f64 * self.config.global_nav_ratio)
    }

    fn is_global_nav(&self, record: &UrlRecord, threshold: f64) -> bool {
        record.in_degree as f64 >= threshold
    }

    /// URLs linked from at least `global_nav_ratio` of all pages, most
    /// linked first.
    pub fn global_navigation(&self) -> Vec<GlobalNavEntry> {
        let Some(threshold) = self.global_nav_threshold() else {
            return Vec::new();
        };
        let total = self.dataset.len() as f64;

        let mut entries: Vec<GlobalNavEntry> = self
            .dataset
            .records()
            .iter()
            .filter(|record| self.is_global_nav(record, threshold))
            .map(|record| GlobalNavEntry {
                url: record.url.clone(),
                in_degree: record.in_degree,
                percent: record.in_degree as f64 / total * 100.0,
            })
            .collect();
        entries.sort_by(|a, b| b.in_degree.cmp(&a.in_degree));
        entries
    }

    /// Index-like pages (`/` or `index.html`) with few referrers, least
    /// linked first.
    pub fn isolated_pages(&self) -> Vec<IsolatedPage> {
        let mut pages: Vec<IsolatedPage> = self
            .dataset
            .records()
            .iter()
            .filter(|record| record.url.ends_with('/') || record.url.ends_with("index.html"))
            .filter(|record| record.in_degree <= self.config.isolated_max_in_degree)
            .map(|record| IsolatedPage {
                url: record.url.clone(),
                in_degree: record.in_degree,
                category: category_of(&record.url),
                sitemap_hint: record.url.contains("sitemap"),
            })
            .collect();
        pages.sort_by_key(|page| page.in_degree);
        pages
    }

    /// Canonical node/edge graph. Groups containing a global navigation URL
    /// are dropped, except the seed's own group.
    pub fn graph(&self) -> LinkGraph {
        let categories: Vec<String> = self
            .dataset
            .records()
            .iter()
            .map(|record| category_of(&record.url))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let category_index: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let seed = self.dataset.source_url.as_deref().map(canonical_url);
        let threshold = self.global_nav_threshold();

        let groups = self.canonical_groups();
        let mut nodes = Vec::new();
        let mut retained: HashSet<String> = HashSet::new();

        for group in &groups {
            let is_seed = seed.as_deref() == Some(group.url.as_str());
            let has_global_nav = threshold.is_some_and(|threshold| {
                group.members.iter().any(|member| {
                    self.dataset
                        .get(member)
                        .is_some_and(|record| self.is_global_nav(record, threshold))
                })
            });
            if has_global_nav && !is_seed {
                continue;
            }

            let size = if is_seed {
                self.config.seed_size
            } else {
                node_size(group.in_degree, &self.config)
            };
            let category = category_index
                .get(group.category.as_str())
                .copied()
                .unwrap_or(0);

            retained.insert(group.url.clone());
            nodes.push(GraphNode {
                id: group.url.clone(),
                name: display_name(&group.url, is_seed),
                in_degree: group.in_degree,
                size,
                show_label: size > self.config.label_min_size,
                category,
                category_name: group.category.clone(),
            });
        }

        // full URL -> canonical URL, non-asset records only
        let canonical_of: HashMap<&str, &str> = groups
            .iter()
            .flat_map(|group| {
                group
                    .members
                    .iter()
                    .map(move |member| (member.as_str(), group.url.as_str()))
            })
            .collect();

        let mut edges = Vec::new();
        let mut seen: HashSet<GraphEdge> = HashSet::new();
        for record in self.dataset.records() {
            let Some(&target) = canonical_of.get(record.url.as_str()) else {
                continue;
            };
            if !retained.contains(target) {
                continue;
            }
            for referrer in &record.referrers {
                let Some(&source) = canonical_of.get(referrer.as_str()) else {
                    continue;
                };
                if source == target || !retained.contains(source) {
                    continue;
                }
                let edge = GraphEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                };
                if seen.insert(edge.clone()) {
                    edges.push(edge);
                }
            }
        }

        LinkGraph {
            categories,
            nodes,
            edges,
        }
    }

    pub fn path_tree(&self) -> PathTree {
        let mut tree = PathTree::new("root");
        for record in self.dataset.records() {
            tree.insert(&path_segments(&record.url), &record.url);
        }
        tree
    }

    /// Records with an HTTP error status or a transport failure.
    pub fn broken_links(&self) -> Vec<BrokenLink> {
        broken_links(self.dataset)
    }
}

/// Records with an HTTP error status or a transport failure, in dataset order.
pub fn broken_links(dataset: &Dataset) -> Vec<BrokenLink> {
    dataset
        .records()
        .iter()
        .filter(|record| record.is_broken() || record.is_transport_error())
        .filter_map(|record| {
            record.status_code.map(|status_code| BrokenLink {
                url: record.url.clone(),
                status_code,
                referrers: record.referrers.clone(),
            })
        })
        .collect()
}

/// Status code as text, `"Error"` for the transport failure sentinel.
pub fn status_label(status: u16) -> String {
    if status == sitescope_scanner::TRANSPORT_ERROR {
        "Error".to_string()
    } else {
        status.to_string()
    }
}
