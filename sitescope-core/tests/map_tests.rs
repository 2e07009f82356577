// Tests for link graph analysis

use sitescope_core::map::{
    LinkGraphAnalyzer, broken_links, canonical_url, category_of, node_size, path_segments,
    status_label,
};
use sitescope_core::model::{AnalyzerConfig, TOP_PAGE_LABEL};
use sitescope_scanner::{Dataset, UrlMetadata, UrlRecord};

fn record(url: &str, referrers: &[&str]) -> UrlRecord {
    UrlRecord {
        url: url.to_string(),
        lastmod: None,
        changefreq: None,
        priority: None,
        status_code: Some(200),
        source_sitemap: None,
        discovery_parent: None,
        referrers: referrers.iter().map(|r| r.to_string()).collect(),
        in_degree: 0,
    }
}

fn dataset(records: Vec<UrlRecord>) -> Dataset {
    Dataset::from_records(Some("https://ex.com/".to_string()), None, records)
}

/// No URL ever reaches the global navigation threshold.
fn no_global_nav() -> AnalyzerConfig {
    AnalyzerConfig {
        global_nav_ratio: 100.0,
        ..AnalyzerConfig::default()
    }
}

/// 100 pages: /nav is linked from 6 of them, /popular from 4.
fn hundred_page_site() -> Dataset {
    let mut records = vec![record("https://ex.com/", &[])];
    let nav_referrers: Vec<String> = (10..16).map(|i| format!("https://ex.com/page{}", i)).collect();
    let popular_referrers: Vec<String> =
        (20..24).map(|i| format!("https://ex.com/page{}", i)).collect();
    records.push(record(
        "https://ex.com/nav",
        &nav_referrers.iter().map(String::as_str).collect::<Vec<_>>(),
    ));
    records.push(record(
        "https://ex.com/popular",
        &popular_referrers.iter().map(String::as_str).collect::<Vec<_>>(),
    ));
    for i in 0..97 {
        records.push(record(&format!("https://ex.com/page{}", i), &[]));
    }
    dataset(records)
}

// ============================================================================
// URL Helper Tests
// ============================================================================

#[test]
fn test_path_segments_root() {
    assert_eq!(path_segments("https://ex.com/"), vec!["root"]);
    assert_eq!(path_segments("https://ex.com"), vec!["root"]);
}

#[test]
fn test_path_segments_nested() {
    assert_eq!(
        path_segments("https://ex.com/blog/2024/post/"),
        vec!["blog", "2024", "post"]
    );
}

#[test]
fn test_category_of() {
    assert_eq!(category_of("https://ex.com/"), TOP_PAGE_LABEL);
    assert_eq!(category_of("https://ex.com/blog/post"), "blog");
    assert_eq!(category_of("https://ex.com/about"), "about");
}

#[test]
fn test_canonical_url_strips_query_and_fragment() {
    assert_eq!(
        canonical_url("https://ex.com/list?page=2#top"),
        "https://ex.com/list"
    );
    assert_eq!(canonical_url("https://ex.com/list"), "https://ex.com/list");
}

#[test]
fn test_node_size_grows_and_caps() {
    let config = AnalyzerConfig::default();
    assert!((node_size(0, &config) - 10.0).abs() < 1e-9);
    let one = node_size(1, &config);
    assert!((one - (10.0 + 5.0 * 2f64.ln())).abs() < 1e-9);
    assert!(node_size(100, &config) > one);
    assert_eq!(node_size(1_000_000_000, &config), 50.0);
}

#[test]
fn test_status_label() {
    assert_eq!(status_label(404), "404");
    assert_eq!(status_label(0), "Error");
}

// ============================================================================
// Statistics Tests
// ============================================================================

#[test]
fn test_statistics_distributions() {
    let mut site = Dataset::new("https://ex.com/");
    site.add_url(
        "https://ex.com/",
        UrlMetadata {
            changefreq: Some("daily".to_string()),
            priority: Some(1.0),
            ..UrlMetadata::default()
        }
        .with_status(200),
    );
    site.add_url(
        "https://ex.com/blog/a",
        UrlMetadata {
            changefreq: Some("weekly".to_string()),
            priority: Some(0.5),
            ..UrlMetadata::default()
        }
        .with_status(404),
    );
    site.add_url("https://ex.com/blog/b", UrlMetadata::default().with_status(0));

    let stats = LinkGraphAnalyzer::new(&site).statistics();
    assert_eq!(stats.total_urls, 3);
    assert_eq!(stats.categories.get("blog"), Some(&2));
    assert_eq!(stats.categories.get(TOP_PAGE_LABEL), Some(&1));
    assert_eq!(stats.changefreq_distribution.get("weekly"), Some(&1));
    assert_eq!(stats.priority_distribution.get("0.5"), Some(&1));
    assert_eq!(stats.priority_distribution.get("1.0"), Some(&1));
    assert_eq!(stats.status_distribution.get("Error"), Some(&1));
    assert_eq!(stats.status_distribution.get("404"), Some(&1));
    assert_eq!(stats.source_url.as_deref(), Some("https://ex.com/"));
}

// ============================================================================
// Canonical Grouping Tests
// ============================================================================

#[test]
fn test_canonical_groups_sum_in_degree() {
    let site = dataset(vec![
        record("https://ex.com/", &[]),
        record("https://ex.com/a", &[]),
        record("https://ex.com/b", &[]),
        record("https://ex.com/c", &[]),
        record(
            "https://ex.com/list?page=1",
            &["https://ex.com/a", "https://ex.com/b"],
        ),
        record(
            "https://ex.com/list?page=2",
            &["https://ex.com/a", "https://ex.com/b", "https://ex.com/c"],
        ),
    ]);

    let groups = LinkGraphAnalyzer::new(&site).canonical_groups();
    let list = groups
        .iter()
        .find(|g| g.url == "https://ex.com/list")
        .expect("list group");
    assert_eq!(list.members.len(), 2);
    assert_eq!(list.in_degree, 5);
    assert_eq!(list.category, "list");
}

#[test]
fn test_canonical_groups_skip_assets() {
    let site = dataset(vec![
        record("https://ex.com/", &[]),
        record("https://ex.com/files/report.PDF", &[]),
        record("https://ex.com/img/logo.png", &[]),
    ]);

    let groups = LinkGraphAnalyzer::new(&site).canonical_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].url, "https://ex.com/");
}

// ============================================================================
// Global Navigation Tests
// ============================================================================

#[test]
fn test_global_navigation_threshold() {
    let site = hundred_page_site();
    assert_eq!(site.len(), 100);

    let nav = LinkGraphAnalyzer::new(&site).global_navigation();
    assert_eq!(nav.len(), 1);
    assert_eq!(nav[0].url, "https://ex.com/nav");
    assert_eq!(nav[0].in_degree, 6);
    assert!((nav[0].percent - 6.0).abs() < 1e-9);
}

#[test]
fn test_global_navigation_empty_dataset() {
    let site = Dataset::default();
    assert!(LinkGraphAnalyzer::new(&site).global_navigation().is_empty());
}

#[test]
fn test_graph_drops_global_navigation() {
    let site = hundred_page_site();
    let graph = LinkGraphAnalyzer::new(&site).graph();

    assert!(!graph.nodes.iter().any(|n| n.id == "https://ex.com/nav"));
    assert!(graph.nodes.iter().any(|n| n.id == "https://ex.com/popular"));
    assert!(
        !graph
            .edges
            .iter()
            .any(|e| e.target == "https://ex.com/nav" || e.source == "https://ex.com/nav")
    );
}

#[test]
fn test_graph_keeps_seed_even_when_global() {
    let referrers: Vec<String> = (0..10).map(|i| format!("https://ex.com/p{}", i)).collect();
    let mut records = vec![record(
        "https://ex.com/",
        &referrers.iter().map(String::as_str).collect::<Vec<_>>(),
    )];
    for referrer in &referrers {
        records.push(record(referrer, &[]));
    }
    let site = dataset(records);

    let analyzer = LinkGraphAnalyzer::new(&site);
    assert!(
        analyzer
            .global_navigation()
            .iter()
            .any(|e| e.url == "https://ex.com/")
    );

    let graph = analyzer.graph();
    let seed = graph
        .nodes
        .iter()
        .find(|n| n.id == "https://ex.com/")
        .expect("seed node");
    assert_eq!(seed.name, TOP_PAGE_LABEL);
    assert_eq!(seed.size, 60.0);
    assert!(seed.show_label);
    assert_eq!(graph.edges.len(), 10);
}

// ============================================================================
// Graph Tests
// ============================================================================

#[test]
fn test_graph_edges_are_canonical_and_deduplicated() {
    let site = dataset(vec![
        record("https://ex.com/", &[]),
        record(
            "https://ex.com/a",
            &["https://ex.com/", "https://ex.com/b?x=1"],
        ),
        record("https://ex.com/b?x=1", &["https://ex.com/a"]),
        record(
            "https://ex.com/b?x=2",
            &["https://ex.com/a", "https://ex.com/b?x=1"],
        ),
    ]);

    let graph = LinkGraphAnalyzer::with_config(&site, no_global_nav()).graph();
    assert_eq!(graph.nodes.len(), 3);

    let mut edges: Vec<(String, String)> = graph
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();
    edges.sort();
    assert_eq!(
        edges,
        vec![
            ("https://ex.com/".to_string(), "https://ex.com/a".to_string()),
            ("https://ex.com/a".to_string(), "https://ex.com/b".to_string()),
            ("https://ex.com/b".to_string(), "https://ex.com/a".to_string()),
        ]
    );
    assert!(graph.edges.iter().all(|e| e.source != e.target));
}

#[test]
fn test_graph_categories_and_labels() {
    let site = dataset(vec![
        record("https://ex.com/", &[]),
        record("https://ex.com/blog/first", &["https://ex.com/"]),
        record("https://ex.com/docs/", &["https://ex.com/"]),
    ]);

    let graph = LinkGraphAnalyzer::with_config(&site, no_global_nav()).graph();
    assert_eq!(graph.categories, vec![TOP_PAGE_LABEL, "blog", "docs"]);

    let post = graph
        .nodes
        .iter()
        .find(|n| n.id == "https://ex.com/blog/first")
        .expect("post node");
    assert_eq!(post.name, "first");
    assert_eq!(post.category_name, "blog");
    assert_eq!(graph.categories[post.category], "blog");
    assert!(!post.show_label);

    let docs = graph
        .nodes
        .iter()
        .find(|n| n.id == "https://ex.com/docs/")
        .expect("docs node");
    assert_eq!(docs.name, "docs");
}

// ============================================================================
// Isolated Page Tests
// ============================================================================

#[test]
fn test_isolated_pages() {
    let site = dataset(vec![
        record("https://ex.com/", &[]),
        record("https://ex.com/a", &[]),
        record("https://ex.com/b", &[]),
        record("https://ex.com/c", &[]),
        record("https://ex.com/docs/", &[]),
        record("https://ex.com/sitemap/", &["https://ex.com/a"]),
        record(
            "https://ex.com/x/index.html",
            &["https://ex.com/a", "https://ex.com/b", "https://ex.com/c"],
        ),
        record("https://ex.com/plain-page", &[]),
    ]);

    let isolated = LinkGraphAnalyzer::new(&site).isolated_pages();
    let urls: Vec<&str> = isolated.iter().map(|p| p.url.as_str()).collect();

    assert!(urls.contains(&"https://ex.com/docs/"));
    assert!(urls.contains(&"https://ex.com/sitemap/"));
    assert!(!urls.contains(&"https://ex.com/x/index.html"));
    assert!(!urls.contains(&"https://ex.com/plain-page"));
    assert!(isolated.windows(2).all(|w| w[0].in_degree <= w[1].in_degree));

    let sitemap_page = isolated
        .iter()
        .find(|p| p.url == "https://ex.com/sitemap/")
        .expect("sitemap page");
    assert!(sitemap_page.sitemap_hint);
    assert_eq!(sitemap_page.in_degree, 1);
}

// ============================================================================
// Path Tree and Broken Link Tests
// ============================================================================

#[test]
fn test_path_tree_counts() {
    let site = dataset(vec![
        record("https://ex.com/", &[]),
        record("https://ex.com/blog/a", &[]),
        record("https://ex.com/blog/b", &[]),
        record("https://ex.com/blog/", &[]),
        record("https://ex.com/about", &[]),
    ]);

    let tree = LinkGraphAnalyzer::new(&site).path_tree();
    assert_eq!(tree.url_count(), 5);

    let blog = tree.children.get("blog").expect("blog subtree");
    assert_eq!(blog.url_count(), 3);
    assert_eq!(blog.urls, vec!["https://ex.com/blog/"]);
    assert!(tree.children.contains_key("root"));
}

#[test]
fn test_broken_links_include_transport_errors() {
    let mut site = Dataset::new("https://ex.com/");
    site.add_url("https://ex.com/", UrlMetadata::default().with_status(200));
    site.add_url("https://ex.com/gone", UrlMetadata::default().with_status(404));
    site.add_url("https://ex.com/down", UrlMetadata::default().with_status(0));
    site.add_url("https://ex.com/moved", UrlMetadata::default().with_status(301));
    site.add_url("https://ex.com/unchecked", UrlMetadata::default());
    site.add_referrer("https://ex.com/gone", "https://ex.com/");

    let broken = broken_links(&site);
    assert_eq!(broken.len(), 2);
    assert_eq!(broken[0].url, "https://ex.com/gone");
    assert_eq!(broken[0].status_code, 404);
    assert_eq!(broken[0].referrers, vec!["https://ex.com/"]);
    assert_eq!(broken[1].url, "https://ex.com/down");
    assert_eq!(broken[1].status_code, 0);
}

#[test]
fn test_analyze_does_not_modify_dataset() {
    let site = hundred_page_site();
    let before = site.records().to_vec();
    let _ = LinkGraphAnalyzer::new(&site).analyze();
    assert_eq!(site.records(), before.as_slice());
}
