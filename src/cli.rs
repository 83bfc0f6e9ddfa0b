//! Command-line interface definitions for the news corpus crawler.
//!
//! All options can be provided via command-line flags, and the paths also via
//! environment variables.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments of the crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl every configured site into ./data
/// news_corpus_crawler
///
/// # Crawl two sites with a custom configuration
/// news_corpus_crawler -c crawler.yaml -o /srv/corpus -s Politika -s Kurir
///
/// # Fetch every article again even when its document exists
/// news_corpus_crawler --refetch
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for per-site output
    #[arg(short, long, env = "CRAWLER_OUTPUT_DIR", default_value = "data")]
    pub output_dir: PathBuf,

    /// Site to crawl; repeat for several. Defaults to every configured site
    #[arg(short, long = "site")]
    pub sites: Vec<String>,

    /// Fetch articles again even when their document already exists
    #[arg(long)]
    pub refetch: bool,
}

impl Cli {
    /// Names of the sites to crawl, every configured site by name when none were given.
    pub fn site_names(&self, config: &Config) -> Vec<String> {
        if self.sites.is_empty() {
            config.sites.keys().cloned().collect()
        } else {
            self.sites.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["news_corpus_crawler"]);

        assert!(cli.sites.is_empty());
        assert!(!cli.refetch);
        assert_eq!(cli.site_names(&Config::default()).len(), Config::default().sites.len());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "news_corpus_crawler",
            "-c",
            "/etc/crawler.yaml",
            "-o",
            "/tmp/corpus",
            "-s",
            "Politika",
            "-s",
            "Kurir",
            "--refetch",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/crawler.yaml")));
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/corpus"));
        assert!(cli.refetch);
        assert_eq!(cli.site_names(&Config::default()), vec!["Politika", "Kurir"]);
    }
}
