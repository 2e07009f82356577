use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

const FORMATS: [&str; 4] = ["text", "json", "csv", "html"];

/// Flags every subcommand that writes a report shares.
fn with_output_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, csv, html")
            .value_parser(FORMATS)
            .default_value("text"),
    )
}

/// Flags of subcommands that talk to the network.
fn with_fetch_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-t --"threads" <NUM_WORKERS>)
            .required(false)
            .help("The number of async workers in the worker pool.")
            .value_parser(clap::value_parser!(usize))
            .default_value("10"),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Page fetch timeout in seconds (default 10; HEAD checks stay at 5 or less)")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"user-agent" <AGENT>)
            .required(false)
            .help("User-Agent header sent with every request"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitescope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitescope")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress bars and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" ... "Log more detail to stderr (-v info, -vv debug)")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(with_output_args(with_fetch_args(
            command!("crawl")
                .about("Crawl a site from a seed URL, recording every internal link.")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The seed URL to crawl")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"max-pages" <COUNT>)
                        .required(false)
                        .help("Stop discovering new pages after this many")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("500"),
                )
                .arg(
                    arg!(--"delay" <MILLIS>)
                        .required(false)
                        .help("Per-worker delay before each page fetch, in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("100"),
                ),
        )))
        .subcommand(with_output_args(with_fetch_args(
            command!("sitemap")
                .about("Resolve a sitemap (and nested sitemap indexes) into a URL list.")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The sitemap URL")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("domain"),
                )
                .arg(
                    arg!(-d --"domain" <DOMAIN>)
                        .required(false)
                        .help("Find the sitemap of this domain via well-known paths and robots.txt")
                        .conflicts_with("url"),
                )
                .group(
                    clap::ArgGroup::new("source")
                        .args(["url", "domain"])
                        .required(true),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum sitemap index nesting to follow")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"check-links")
                        .required(false)
                        .help("Probe every URL found for its HTTP status")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-trace")
                        .required(false)
                        .help("Skip searching pages for links to broken URLs")
                        .action(clap::ArgAction::SetTrue),
                ),
        )))
        .subcommand(with_output_args(with_fetch_args(
            command!("check")
                .about("Re-check the status of every URL in a saved JSON dataset.")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("A dataset saved with --format json")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url-list"),
                )
                .arg(
                    arg!(-U --"url-list" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to check")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("input"),
                )
                .group(
                    clap::ArgGroup::new("source")
                        .args(["input", "url-list"])
                        .required(true),
                )
                .arg(
                    arg!(--"no-trace")
                        .required(false)
                        .help("Skip searching pages for links to broken URLs")
                        .action(clap::ArgAction::SetTrue),
                ),
        )))
        .subcommand(with_output_args(
            command!("report")
                .about("Render a saved JSON dataset in another format.")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("A dataset saved with --format json")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        ))
}
