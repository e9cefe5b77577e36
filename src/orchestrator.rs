use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    error::{RunError, ValidationError},
    fetcher::{Fetcher, Transport},
    models::{ParsedEntry, RunSummary},
    normalizer,
    parser::ListingParser,
    repository::MovieStore,
};

/// Drives fetch → parse → normalize → persist across listing pages.
pub struct Orchestrator<T, S> {
    fetcher: Fetcher<T>,
    parser: ListingParser,
    store: S,
    limit: u32,
    max_pages: u32,
}

impl<T: Transport, S: MovieStore> Orchestrator<T, S> {
    pub fn new(fetcher: Fetcher<T>, parser: ListingParser, store: S, limit: u32, max_pages: u32) -> Self {
        Self { fetcher, parser, store, limit, max_pages }
    }

    /// Crawls until `limit` movies are persisted, a page has no valid
    /// entries, or the page cap is hit. A fetch failure or a lost store
    /// connection ends the run with an error.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();
        let mut seen = HashSet::new();

        for page in 0..self.max_pages {
            if summary.limit_reached {
                break;
            }

            let html = self.fetcher.fetch(page).await?;
            summary.pages_fetched += 1;

            // Extract everything up front; the parsed document is not kept
            // across awaits.
            let entries: Vec<Result<ParsedEntry, ValidationError>> =
                match self.parser.parse(&html, page) {
                    Ok(listing) => listing.entries().collect(),
                    Err(err) => {
                        warn!(page = page, error = %err, "skipping unparseable page");
                        summary.pages_unparseable += 1;
                        continue;
                    },
                };
            debug!(page = page, entries = entries.len(), "parsed listing page");

            let mut valid_on_page = 0;
            for entry in entries {
                if summary.persisted >= self.limit {
                    summary.limit_reached = true;
                    break;
                }
                summary.fetched += 1;

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(page = err.page, row = err.row, field = %err.field, reason = %err.reason, "skipping invalid entry");
                        summary.skipped_validation += 1;
                        continue;
                    },
                };
                valid_on_page += 1;
                summary.parsed += 1;

                let record = &entry.record;
                if !seen.insert(record.external_id.clone()) {
                    warn!(external_id = %record.external_id, rank = record.rank, "entry already seen in this run");
                    summary.skipped_duplicate += 1;
                    continue;
                }

                let names = normalizer::normalize(&entry.attributes);
                match self.store.persist(record, &names).await {
                    Ok(_) => summary.persisted += 1,
                    Err(err) if err.is_connection_level() => return Err(RunError::Connection(err)),
                    Err(err) => {
                        warn!(external_id = %err.external_id, error = %err.source, "failed to persist movie");
                        summary.persist_failed += 1;
                    },
                }
            }
            summary.limit_reached |= summary.persisted >= self.limit;

            info!(page = page, valid = valid_on_page, persisted = summary.persisted, "processed listing page");

            if valid_on_page == 0 {
                info!(page = page, "no valid entries on page, source exhausted");
                break;
            }
        }

        if summary.pages_fetched > 0 && summary.pages_unparseable == summary.pages_fetched {
            return Err(RunError::NoParseablePages { pages: summary.pages_fetched });
        }

        Ok(summary)
    }
}
