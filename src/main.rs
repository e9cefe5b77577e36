mod config;
mod db;
mod entities;
mod error;
mod fetcher;
mod models;
mod normalizer;
mod orchestrator;
mod parser;
mod repository;
mod retry;
#[cfg(test)]
mod testing;

use anyhow::{Context, bail};
use tracing::info;

use crate::{
    config::Config,
    fetcher::{Fetcher, WreqTransport},
    orchestrator::Orchestrator,
    parser::ListingParser,
    repository::MovieRepository,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            format!("{},sqlx=warn,sea_orm_migration=warn", config.log_level)
        }))
        .init();

    let db = db::connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;
    let repo = MovieRepository::new(db);

    if config.init_db {
        repo.ensure_schema().await.context("initializing schema")?;
    } else if !repo.schema_ready().await.context("inspecting schema")? {
        bail!("database schema is missing; run with --init-db to create it");
    }

    let crawl = &config.crawl;
    info!(source = %crawl.source_url, limit = crawl.limit, delay = ?crawl.delay, "starting crawl");

    let transport = WreqTransport::new(crawl).context("building http client")?;
    let fetcher = Fetcher::from_config(transport, crawl);
    let orchestrator = Orchestrator::new(fetcher, ListingParser::new(), repo, crawl.limit, crawl.max_pages);

    let summary = orchestrator.run().await?;
    info!(%summary, limit_reached = summary.limit_reached, "crawl finished");

    if config.summary_json {
        println!("{}", serde_json::to_string(&summary)?);
    }

    Ok(())
}
