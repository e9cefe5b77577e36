use sea_orm::DbErr;
use thiserror::Error;

use crate::{models::Field, retry::Transient};

/// Why a single request attempt for a listing page failed.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("transport error: {0}")]
    Transport(#[from] wreq::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

impl Transient for FetchCause {
    fn is_transient(&self) -> bool {
        match self {
            // Builder and URL errors repeat on every attempt.
            FetchCause::Transport(err) => err.is_timeout() || err.is_connect() || err.is_body(),
            FetchCause::Status(code) => {
                matches!(code, 408 | 429) || (500..600).contains(code)
            },
        }
    }
}

#[derive(Debug, Error)]
#[error("fetching page {page} failed after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    pub page: u32,
    pub attempts: u32,
    #[source]
    pub cause: FetchCause,
}

/// A listing entry rejected because a required field is missing or a field
/// is malformed. Never fatal; the entry is skipped.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("page {page} row {row}: {field}: {reason}")]
pub struct ValidationError {
    pub page: u32,
    pub row: usize,
    pub field: Field,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("page {page}: listing container not found")]
    MissingListing { page: u32 },
}

#[derive(Debug, Error)]
#[error("persisting movie {external_id} failed: {source}")]
pub struct PersistError {
    pub external_id: String,
    #[source]
    pub source: DbErr,
}

impl PersistError {
    /// The store itself is gone, as opposed to one record being rejected.
    pub fn is_connection_level(&self) -> bool {
        matches!(self.source, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
    }
}

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("store connection lost: {0}")]
    Connection(#[source] PersistError),
    #[error("none of the {pages} fetched page(s) could be parsed")]
    NoParseablePages { pages: u32 },
}
