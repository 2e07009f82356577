pub mod check;
pub mod crawl;
pub mod map;
pub mod model;
pub mod report;
pub mod sitemap;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// Callback for human-readable run status messages
pub type RunProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

pub fn print_banner() {
    let banner = r#"
     _ _
 ___(_) |_ ___  ___  ___ ___  _ __   ___
/ __| | __/ _ \/ __|/ __/ _ \| '_ \ / _ \
\__ \ | ||  __/\__ \ (_| (_) | |_) |  __/
|___/_|\__\___||___/\___\___/| .__/ \___|
                             |_|"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "map a website from its sitemaps and its live links".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

/// A counting progress bar in the style shared by every run.
pub(crate) fn progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Adapt a progress bar to the scanner's `(done, total)` callback.
pub(crate) fn scanner_progress(pb: &ProgressBar) -> sitescope_scanner::ProgressCallback {
    let pb = pb.clone();
    Arc::new(move |done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
}
