// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    dataset_from_url_list, expand_output_path, fetch_config_from_args, init_logging,
    load_urls_from_file, log_level, parse_url_line,
};

pub use sitescope_core::crawl::{CrawlOptions, execute_crawl, extract_url_path, generate_crawl_report};
pub use sitescope_core::report::{ReportFormat, load_dataset, render_report, save_report};
