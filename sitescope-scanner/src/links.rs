use crate::error::{Result, ScanError};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Path suffixes that never hold crawlable content.
pub const NON_CONTENT_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".css", ".js", ".ico", ".pdf",
];

/// Extract every `<a href>` target of an HTML page as an absolute,
/// fragment-free URL. Order of first appearance is kept; duplicates are
/// dropped.
pub fn extract_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(page_url)
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", page_url, e)))?;
    let selector =
        Selector::parse("a[href]").map_err(|e| ScanError::ParseError(e.to_string()))?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href")
            && let Some(absolute_url) = resolve_url(&base, href)
            && seen.insert(absolute_url.clone())
        {
            links.push(absolute_url);
        }
    }

    Ok(links)
}

/// Resolve `href` against `base`, dropping the fragment. Empty, anchor-only
/// and non-navigational schemes yield `None`.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);

    Some(url.to_string())
}

/// Whether the URL's path ends in one of the non-content extensions.
pub fn has_non_content_extension(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    NON_CONTENT_EXTENSIONS
        .iter()
        .any(|extension| path.ends_with(extension))
}

/// Parse a URL and re-serialize it, so that textual variants of the same
/// address compare equal. Unparseable input is returned unchanged.
pub fn normalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => crate::dataset::strip_fragment(url).to_string(),
    }
}

/// The network host a crawl is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    host: String,
    port: Option<u16>,
}

impl SiteScope {
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default(),
        })
    }

    pub fn contains(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| host.eq_ignore_ascii_case(&self.host))
            .unwrap_or(false)
            && url.port_or_known_default() == self.port
    }

    /// Whether a discovered link should be crawled: same host, content path.
    pub fn accepts(&self, link: &str) -> bool {
        match Url::parse(link) {
            Ok(url) => self.contains(&url) && !has_non_content_extension(&url),
            Err(_) => false,
        }
    }
}
