// Report rendering and persistence

use crate::crawl::extract_url_path;
use crate::map::{LinkGraphAnalyzer, category_of, status_label};
use crate::model::{AnalyzerConfig, PathTree, SiteAnalysis};
use serde::{Deserialize, Serialize};
use sitescope_scanner::{Dataset, UrlRecord};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "html" => Some(ReportFormat::Html),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
        }
    }
}

/// Analyze `dataset` and render it in `format`.
pub fn render_report(
    dataset: &Dataset,
    format: ReportFormat,
    config: AnalyzerConfig,
) -> Result<String, String> {
    let analysis = LinkGraphAnalyzer::with_config(dataset, config).analyze();
    match format {
        ReportFormat::Text => Ok(generate_text_report(dataset, &analysis)),
        ReportFormat::Json => generate_json_report(dataset, &analysis)
            .map_err(|e| format!("Failed to serialize report: {}", e)),
        ReportFormat::Csv => {
            generate_csv_report(dataset).map_err(|e| format!("Failed to write CSV: {}", e))
        }
        ReportFormat::Html => generate_html_report(dataset, &analysis)
            .map_err(|e| format!("Failed to serialize graph data: {}", e)),
    }
}

/// Full record dump plus derived statistics and analysis. The output loads
/// back with [`load_dataset`].
pub fn generate_json_report(
    dataset: &Dataset,
    analysis: &SiteAnalysis,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "source_url": dataset.source_url,
        "fetched_at": dataset.fetched_at,
        "total_urls": dataset.len(),
        "urls": dataset.records(),
        "statistics": analysis.statistics,
        "analysis": {
            "global_navigation": analysis.global_navigation,
            "isolated_pages": analysis.isolated_pages,
            "broken_links": analysis.broken_links,
            "graph": analysis.graph,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub const CSV_HEADER: &str =
    "url,lastmod,changefreq,priority,category,status_code,source_sitemap,discovery_parent,in_degree";

/// One row per record; referrer lists are not part of the CSV.
pub fn generate_csv_report(dataset: &Dataset) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER.split(','))?;

    for record in dataset.records() {
        writer.write_record([
            record.url.clone(),
            record.lastmod.clone().unwrap_or_default(),
            record.changefreq.clone().unwrap_or_default(),
            record.priority.map(|p| p.to_string()).unwrap_or_default(),
            category_of(&record.url),
            record.status_code.map(|s| s.to_string()).unwrap_or_default(),
            record.source_sitemap.clone().unwrap_or_default(),
            record.discovery_parent.clone().unwrap_or_default(),
            record.in_degree.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');
}

pub fn generate_text_report(dataset: &Dataset, analysis: &SiteAnalysis) -> String {
    let mut report = String::new();
    let stats = &analysis.statistics;

    report.push_str(RULE);
    report.push_str("                          SITESCOPE SITE STRUCTURE REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!(
        "Source:       {}\n",
        stats.source_url.as_deref().unwrap_or("unknown")
    ));
    if let Some(fetched_at) = stats.fetched_at {
        report.push_str(&format!(
            "Fetched:      {}\n",
            fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    report.push_str(&format!("Total URLs:   {}\n", stats.total_urls));
    if !stats.status_distribution.is_empty() {
        let statuses: Vec<String> = stats
            .status_distribution
            .iter()
            .map(|(status, count)| format!("{}: {}", status, count))
            .collect();
        report.push_str(&format!("Statuses:     {}\n", statuses.join(", ")));
    }
    report.push('\n');

    section(&mut report, "CATEGORIES");
    let mut categories: Vec<(&String, &usize)> = stats.categories.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (category, count) in categories {
        report.push_str(&format!("  {:>6}  {}\n", count, category));
    }
    report.push('\n');

    section(&mut report, "GLOBAL NAVIGATION");
    if analysis.global_navigation.is_empty() {
        report.push_str("  (none)\n");
    }
    for entry in &analysis.global_navigation {
        report.push_str(&format!(
            "  {:>6} ({:>5.1}%)  {}\n",
            entry.in_degree, entry.percent, entry.url
        ));
    }
    report.push('\n');

    section(&mut report, "ISOLATED PAGES");
    if analysis.isolated_pages.is_empty() {
        report.push_str("  (none)\n");
    }
    for page in &analysis.isolated_pages {
        let hint = if page.sitemap_hint { "  [check sitemap]" } else { "" };
        report.push_str(&format!("  {:>6}  {}{}\n", page.in_degree, page.url, hint));
    }
    report.push('\n');

    section(&mut report, "BROKEN LINKS");
    if analysis.broken_links.is_empty() {
        report.push_str("  (none)\n");
    }
    for link in &analysis.broken_links {
        report.push_str(&format!("  [{}] {}\n", status_label(link.status_code), link.url));
        for referrer in &link.referrers {
            report.push_str(&format!("         <- {}\n", referrer));
        }
    }
    report.push('\n');

    section(&mut report, "SITE TREE");
    report.push_str(&generate_path_tree(&analysis.path_tree));
    report.push('\n');

    section(&mut report, "PAGES BY HOST");
    let mut by_host: BTreeMap<String, Vec<&UrlRecord>> = BTreeMap::new();
    for record in dataset.records() {
        let host = Url::parse(&record.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "(unknown host)".to_string());
        by_host.entry(host).or_default().push(record);
    }
    for (host, records) in &by_host {
        report.push_str(&format!("## {} ({} pages)\n", host, records.len()));
        for record in records {
            let status = record
                .status_code
                .map(status_label)
                .unwrap_or_else(|| "---".to_string());
            report.push_str(&format!(
                "  [{:>5}] {}\n",
                status,
                extract_url_path(&record.url)
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str(&format!(
        "Graph: {} nodes, {} edges\n",
        analysis.graph.nodes.len(),
        analysis.graph.edges.len()
    ));
    report.push_str(&format!("Pages listed: {}\n", dataset.len()));
    report.push_str(RULE);

    report
}

/// Tree view of the path hierarchy with per-subtree URL counts.
pub fn generate_path_tree(tree: &PathTree) -> String {
    fn walk(node: &PathTree, prefix: &str, out: &mut String) {
        let children: Vec<&PathTree> = node.children.values().collect();
        for (i, child) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            let branch = if is_last { "└── " } else { "├── " };
            out.push_str(&format!(
                "{}{}{} ({})\n",
                prefix,
                branch,
                child.name,
                child.url_count()
            ));
            let next_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            walk(child, &next_prefix, out);
        }
    }

    if tree.url_count() == 0 {
        return "  (empty)\n".to_string();
    }
    let mut out = String::new();
    walk(tree, "  ", &mut out);
    out
}

/// Escape text for HTML element content and attribute values.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn status_class(status: Option<u16>) -> &'static str {
    match status {
        Some(200..=299) => "s2xx",
        Some(300..=399) => "s3xx",
        Some(400..=499) => "s4xx",
        Some(500..=599) => "s5xx",
        Some(_) => "serr",
        None => "snone",
    }
}

fn html_tree(node: &PathTree, out: &mut String) {
    if node.children.is_empty() && node.urls.is_empty() {
        return;
    }
    out.push_str("<ul>");
    for child in node.children.values() {
        out.push_str(&format!(
            "<li><span class=\"dir\">{}</span> <small>({} URLs)</small>",
            escape_html(&child.name),
            child.url_count()
        ));
        html_tree(child, out);
        out.push_str("</li>");
    }
    for url in &node.urls {
        out.push_str(&format!(
            "<li><a href=\"{0}\">{0}</a></li>",
            escape_html(url)
        ));
    }
    out.push_str("</ul>");
}

fn html_url_row(record: &UrlRecord) -> String {
    let status = record
        .status_code
        .map(status_label)
        .unwrap_or_else(|| "N/A".to_string());
    let referrers = if record.referrers.is_empty() {
        "N/A".to_string()
    } else {
        let shown: Vec<String> = record
            .referrers
            .iter()
            .take(3)
            .map(|r| format!("<a href=\"{0}\">{0}</a>", escape_html(r)))
            .collect();
        let more = record.referrers.len().saturating_sub(3);
        if more > 0 {
            format!("{}<br>... {} more", shown.join("<br>"), more)
        } else {
            shown.join("<br>")
        }
    };

    format!(
        "<tr><td><a href=\"{url}\">{url}</a></td><td>{category}</td><td><span class=\"badge {class}\">{status}</span></td><td>{in_degree}</td><td>{referrers}</td><td>{lastmod}</td><td>{changefreq}</td><td>{priority}</td></tr>\n",
        url = escape_html(&record.url),
        category = escape_html(&category_of(&record.url)),
        class = status_class(record.status_code),
        status = status,
        in_degree = record.in_degree,
        referrers = referrers,
        lastmod = escape_html(record.lastmod.as_deref().unwrap_or("N/A")),
        changefreq = escape_html(record.changefreq.as_deref().unwrap_or("N/A")),
        priority = record
            .priority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    )
}

const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 2em; color: #2d3748; }
h1 { margin-bottom: 0.2em; }
section { margin: 2em 0; }
table { border-collapse: collapse; width: 100%; font-size: 0.9em; }
th, td { border-bottom: 1px solid #e2e8f0; padding: 4px 8px; text-align: left; vertical-align: top; }
.cards { display: flex; flex-wrap: wrap; gap: 1em; }
.card { border-left: 4px solid #4299e1; padding: 0.5em 1em; background: #f7fafc; }
.badge { padding: 2px 6px; border-radius: 4px; font-size: 0.85em; }
.s2xx { background: #c6f6d5; } .s3xx { background: #bee3f8; }
.s4xx { background: #feebc8; } .s5xx, .serr { background: #fed7d7; } .snone { background: #edf2f7; }
.dir { font-weight: bold; }
"#;

/// Self-contained HTML page. The graph is embedded as JSON for any renderer.
pub fn generate_html_report(
    dataset: &Dataset,
    analysis: &SiteAnalysis,
) -> Result<String, serde_json::Error> {
    let stats = &analysis.statistics;
    // '<' only occurs inside JSON strings, where \u003c is equivalent
    let graph_json = serde_json::to_string(&analysis.graph)?.replace('<', "\\u003c");

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Sitescope Report</title>\n");
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", HTML_STYLE));

    html.push_str("<h1>Site Structure Report</h1>\n");
    html.push_str(&format!(
        "<p>Source: {} &middot; Fetched: {} &middot; {} URLs</p>\n",
        escape_html(stats.source_url.as_deref().unwrap_or("unknown")),
        stats
            .fetched_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        stats.total_urls
    ));

    html.push_str("<section><h2>Categories</h2><div class=\"cards\">\n");
    let mut categories: Vec<(&String, &usize)> = stats.categories.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (category, count) in categories {
        html.push_str(&format!(
            "<div class=\"card\"><div>{}</div><strong>{}</strong></div>\n",
            escape_html(category),
            count
        ));
    }
    html.push_str("</div></section>\n");

    html.push_str("<section><h2>Global Navigation</h2>\n");
    if analysis.global_navigation.is_empty() {
        html.push_str("<p>None</p>\n");
    } else {
        html.push_str("<table><tr><th>URL</th><th>In-degree</th><th>Share</th></tr>\n");
        for entry in &analysis.global_navigation {
            html.push_str(&format!(
                "<tr><td><a href=\"{0}\">{0}</a></td><td>{1}</td><td>{2:.1}%</td></tr>\n",
                escape_html(&entry.url),
                entry.in_degree,
                entry.percent
            ));
        }
        html.push_str("</table>\n");
    }
    html.push_str("</section>\n");

    html.push_str("<section><h2>Isolated Pages</h2>\n");
    if analysis.isolated_pages.is_empty() {
        html.push_str("<p>None</p>\n");
    } else {
        html.push_str("<table><tr><th>URL</th><th>In-degree</th><th>Category</th></tr>\n");
        for page in &analysis.isolated_pages {
            let note = if page.sitemap_hint {
                " <span class=\"badge s3xx\">Check Sitemap</span>"
            } else {
                ""
            };
            html.push_str(&format!(
                "<tr><td><a href=\"{0}\">{0}</a>{1}</td><td>{2}</td><td>{3}</td></tr>\n",
                escape_html(&page.url),
                note,
                page.in_degree,
                escape_html(&page.category)
            ));
        }
        html.push_str("</table>\n");
    }
    html.push_str("</section>\n");

    html.push_str("<section><h2>Site Tree</h2>\n");
    html_tree(&analysis.path_tree, &mut html);
    html.push_str("\n</section>\n");

    html.push_str("<section><h2>URLs</h2>\n<table>\n");
    html.push_str("<tr><th>URL</th><th>Category</th><th>Status</th><th>In-degree</th><th>Referrers</th><th>Last modified</th><th>Change freq.</th><th>Priority</th></tr>\n");
    for record in dataset.records() {
        html.push_str(&html_url_row(record));
    }
    html.push_str("</table>\n</section>\n");

    html.push_str(&format!(
        "<script type=\"application/json\" id=\"link-graph\">{}</script>\n",
        graph_json
    ));
    html.push_str("</body>\n</html>\n");

    Ok(html)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Load a dataset saved as a JSON report
pub fn load_dataset(path: &Path) -> Result<Dataset, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read dataset {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse dataset {}: {}", path.display(), e))
}
