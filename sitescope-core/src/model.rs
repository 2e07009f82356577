use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for the category and graph name of a site's top page.
pub const TOP_PAGE_LABEL: &str = "Top Page";

/// Tunable heuristics of the link graph analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Share of all pages a URL must be linked from to count as global navigation.
    pub global_nav_ratio: f64,
    /// Index pages with at most this many referrers are reported as isolated.
    pub isolated_max_in_degree: usize,
    /// URL suffixes left out of the graph (compared lowercase).
    pub excluded_extensions: Vec<String>,
    pub base_size: f64,
    pub scale_factor: f64,
    pub cap_size: f64,
    /// Size of the seed node, whatever its in-degree.
    pub seed_size: f64,
    /// Labels are shown for nodes strictly larger than this.
    pub label_min_size: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            global_nav_ratio: 0.05,
            isolated_max_in_degree: 2,
            excluded_extensions: [".pdf", ".png", ".jpg", ".jpeg", ".gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            base_size: 10.0,
            scale_factor: 5.0,
            cap_size: 50.0,
            seed_size: 60.0,
            label_min_size: 20.0,
        }
    }
}

/// Counts and distributions over a whole dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteStatistics {
    pub total_urls: usize,
    pub categories: BTreeMap<String, usize>,
    pub changefreq_distribution: BTreeMap<String, usize>,
    pub priority_distribution: BTreeMap<String, usize>,
    /// Keyed by status code as text; `"Error"` for transport failures.
    pub status_distribution: BTreeMap<String, usize>,
    pub source_url: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Records merged under one query-less URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGroup {
    pub url: String,
    pub members: Vec<String>,
    /// Sum of the members' in-degrees.
    pub in_degree: usize,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalNavEntry {
    pub url: String,
    pub in_degree: usize,
    /// In-degree as a percentage of all pages.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolatedPage {
    pub url: String,
    pub in_degree: usize,
    pub category: String,
    /// The URL mentions "sitemap"; likely a human-readable sitemap page.
    pub sitemap_hint: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Canonical URL.
    pub id: String,
    pub name: String,
    pub in_degree: usize,
    pub size: f64,
    pub show_label: bool,
    /// Index into [`LinkGraph::categories`].
    pub category: usize,
    pub category_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

/// Renderer-agnostic node/edge view of the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkGraph {
    pub categories: Vec<String>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// URLs grouped by path segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathTree {
    pub name: String,
    pub children: BTreeMap<String, PathTree>,
    /// URLs whose path ends at this node.
    pub urls: Vec<String>,
}

impl PathTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, segments: &[String], url: &str) {
        let mut node = self;
        for segment in segments {
            node = node
                .children
                .entry(segment.clone())
                .or_insert_with(|| PathTree::new(segment.clone()));
        }
        node.urls.push(url.to_string());
    }

    /// URLs in this subtree, this node included.
    pub fn url_count(&self) -> usize {
        self.urls.len()
            + self
                .children
                .values()
                .map(PathTree::url_count)
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub url: String,
    pub status_code: u16,
    pub referrers: Vec<String>,
}

/// Everything the analyzer derives from a finished dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteAnalysis {
    pub statistics: SiteStatistics,
    pub global_navigation: Vec<GlobalNavEntry>,
    pub isolated_pages: Vec<IsolatedPage>,
    pub graph: LinkGraph,
    pub path_tree: PathTree,
    pub broken_links: Vec<BrokenLink>,
}
