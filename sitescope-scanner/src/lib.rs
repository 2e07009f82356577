pub mod crawler;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod links;
mod pool;
pub mod prober;
pub mod sitemap;

pub use crawler::Crawler;
pub use dataset::{Dataset, TRANSPORT_ERROR, UrlMetadata, UrlRecord};
pub use error::ScanError;
pub use fetch::{FetchConfig, Fetcher};
pub use prober::{ProbeSummary, StatusProber, TraceSummary};
pub use sitemap::{Resolution, ResolveStats, SitemapResolver, discover_sitemap};

use std::sync::Arc;

/// Progress reporting hook: `(done, total)` where `total` is the known
/// workload or the configured limit.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;
