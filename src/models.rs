use std::fmt;

use serde::Serialize;

/// One ranked entry of the listing, as extracted from a page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieRecord {
    pub external_id: String,
    pub rank: u16,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i16>,
    pub rating: Rating,
    pub review_count: u32,
    pub quote: Option<String>,
    pub detail_url: String,
    pub poster_url: Option<String>,
}

/// A score on the source's 0.0..=10.0 scale, kept as tenths.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct Rating(u8);

impl Rating {
    pub const MAX_TENTHS: u8 = 100;

    pub fn from_tenths(tenths: u8) -> Option<Self> {
        (tenths <= Self::MAX_TENTHS).then_some(Self(tenths))
    }

    pub fn tenths(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum EntityKind {
    Region,
    Genre,
    Director,
    Actor,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] =
        [EntityKind::Region, EntityKind::Genre, EntityKind::Director, EntityKind::Actor];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Region => "region",
            EntityKind::Genre => "genre",
            EntityKind::Director => "director",
            EntityKind::Actor => "actor",
        }
    }

    /// Tables backing this kind: the lookup table and the movie link table.
    pub fn tables(self) -> (&'static str, &'static str) {
        match self {
            EntityKind::Region => ("region", "movie_region"),
            EntityKind::Genre => ("genre", "movie_genre"),
            EntityKind::Director => ("director", "movie_director"),
            EntityKind::Actor => ("actor", "movie_actor"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delimiter-joined attribute strings exactly as they appear on the page.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RawAttributes {
    pub regions: Option<String>,
    pub genres: Option<String>,
    pub directors: Option<String>,
    pub actors: Option<String>,
}

impl RawAttributes {
    pub fn get(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Region => self.regions.as_deref(),
            EntityKind::Genre => self.genres.as_deref(),
            EntityKind::Director => self.directors.as_deref(),
            EntityKind::Actor => self.actors.as_deref(),
        }
    }
}

/// Canonical entity names per kind, deduplicated within one record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EntityNames {
    pub region: Vec<String>,
    pub genre: Vec<String>,
    pub director: Vec<String>,
    pub actor: Vec<String>,
}

impl EntityNames {
    pub fn get(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Region => &self.region,
            EntityKind::Genre => &self.genre,
            EntityKind::Director => &self.director,
            EntityKind::Actor => &self.actor,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut Vec<String> {
        match kind {
            EntityKind::Region => &mut self.region,
            EntityKind::Genre => &mut self.genre,
            EntityKind::Director => &mut self.director,
            EntityKind::Actor => &mut self.actor,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedEntry {
    pub record: MovieRecord,
    pub attributes: RawAttributes,
}

/// Fields the parser validates; named in validation failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Field {
    ExternalId,
    Rank,
    Title,
    DetailUrl,
    Rating,
    ReviewCount,
    Year,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::ExternalId => "external id",
            Field::Rank => "rank",
            Field::Title => "title",
            Field::DetailUrl => "detail url",
            Field::Rating => "rating",
            Field::ReviewCount => "review count",
            Field::Year => "year",
        };
        f.write_str(name)
    }
}

/// End-of-run counts. `fetched` is every entry examined, so
/// `fetched == persisted + skipped()` always holds.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunSummary {
    pub pages_fetched: u32,
    pub pages_unparseable: u32,
    pub fetched: u32,
    pub parsed: u32,
    pub skipped_validation: u32,
    pub skipped_duplicate: u32,
    pub persisted: u32,
    pub persist_failed: u32,
    pub limit_reached: bool,
}

impl RunSummary {
    pub fn skipped(&self) -> u32 {
        self.skipped_validation + self.skipped_duplicate + self.persist_failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched, {} persisted, {} skipped: {} validation, {} persist, {} duplicate",
            self.fetched,
            self.persisted,
            self.skipped(),
            self.skipped_validation,
            self.persist_failed,
            self.skipped_duplicate,
        )
    }
}
