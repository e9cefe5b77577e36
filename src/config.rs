use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;

use crate::retry::RetryPolicy;

pub const DEFAULT_SOURCE_URL: &str = "https://movie.douban.com/top250";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/toplist.sqlite3?mode=rwc";

/// Highest rank the source publishes; bounds both `--limit` and pagination.
pub const SOURCE_MAX_RANK: u32 = 250;
pub const PAGE_SIZE: u32 = 25;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Crawl a ranked movie listing and store it in a relational database.
#[derive(Debug, Parser)]
#[command(name = "toplist-crawler", version, about)]
pub struct Cli {
    /// Database URL, e.g. sqlite://movies.db?mode=rwc
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// SQLite database file; its parent directory is created if missing
    #[arg(long, env = "DATABASE_PATH", conflicts_with = "database_url")]
    pub database: Option<PathBuf>,

    /// Create the schema if it does not exist yet
    #[arg(long, env = "INIT_DB")]
    pub init_db: bool,

    /// Maximum number of movies to persist
    #[arg(
        long,
        env = "CRAWL_LIMIT",
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..=SOURCE_MAX_RANK as i64)
    )]
    pub limit: u32,

    /// Seconds to wait between consecutive requests
    #[arg(long, env = "CRAWL_DELAY", default_value_t = 0.5, value_parser = parse_delay)]
    pub delay: f64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "SOURCE_URL", default_value = DEFAULT_SOURCE_URL)]
    pub source_url: String,

    /// Attempts per page before the run is aborted
    #[arg(
        long,
        env = "FETCH_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", env = "FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Print the run summary as a JSON line on stdout
    #[arg(long)]
    pub summary_json: bool,
}

fn parse_delay(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw.parse().map_err(|_| format!("`{raw}` is not a number"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err("delay must be a finite number of seconds >= 0".to_string());
    }
    Ok(secs)
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub init_db: bool,
    pub log_level: String,
    pub summary_json: bool,
    pub crawl: CrawlConfig,
}

#[derive(Clone, Debug)]
pub struct CrawlConfig {
    pub source_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub limit: u32,
    pub delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Config {
    /// Loads `.env`, then parses flags (which fall back to the environment).
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let database_url = match &cli.database {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                format!("sqlite://{}?mode=rwc", path.display())
            },
            None => cli.database_url,
        };

        Ok(Self {
            database_url,
            init_db: cli.init_db,
            log_level: cli.log_level,
            summary_json: cli.summary_json,
            crawl: CrawlConfig {
                source_url: cli.source_url,
                page_size: PAGE_SIZE,
                max_pages: SOURCE_MAX_RANK.div_ceil(PAGE_SIZE),
                limit: cli.limit,
                delay: Duration::from_secs_f64(cli.delay),
                timeout: Duration::from_secs(cli.timeout_secs),
                user_agent: USER_AGENT.to_string(),
                retry: RetryPolicy { max_attempts: cli.max_attempts, ..RetryPolicy::default() },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("toplist-crawler").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_resolve() {
        let config = Config::from_cli(parse(&[]).unwrap()).unwrap();
        assert_eq!(config.crawl.limit, 100);
        assert_eq!(config.crawl.delay, Duration::from_millis(500));
        assert_eq!(config.crawl.max_pages, 10);
        assert_eq!(config.crawl.retry.max_attempts, 3);
        assert!(!config.init_db);
    }

    #[test]
    fn limit_is_bounded() {
        assert!(parse(&["--limit", "0"]).is_err());
        assert!(parse(&["--limit", "251"]).is_err());
        assert_eq!(parse(&["--limit", "250"]).unwrap().limit, 250);
        assert_eq!(parse(&["--limit", "50"]).unwrap().limit, 50);
    }

    #[test]
    fn delay_must_be_non_negative() {
        assert!(parse(&["--delay", "-1"]).is_err());
        assert!(parse(&["--delay", "soon"]).is_err());
        assert!(parse(&["--delay", "inf"]).is_err());
        let cli = parse(&["--delay", "0"]).unwrap();
        assert_eq!(Config::from_cli(cli).unwrap().crawl.delay, Duration::ZERO);
    }

    #[test]
    fn database_path_becomes_sqlite_url() {
        let cli = parse(&["--database", "movies.sqlite3", "--init-db"]).unwrap();
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.database_url, "sqlite://movies.sqlite3?mode=rwc");
        assert!(config.init_db);
    }

    #[test]
    fn database_path_conflicts_with_url() {
        assert!(parse(&["--database", "a.db", "--database-url", "sqlite::memory:"]).is_err());
    }
}
