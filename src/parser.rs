use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::{
    config::SOURCE_MAX_RANK,
    error::{ParseError, ValidationError},
    models::{Field, MovieRecord, ParsedEntry, RawAttributes, Rating},
};

/// The first feature film; anything earlier is a parsing accident.
const MIN_YEAR: i16 = 1888;
const MAX_REVIEW_COUNT: u32 = 100_000_000;

static LISTING: LazyLock<Selector> = LazyLock::new(|| selector(".grid_view"));
static ITEM: LazyLock<Selector> = LazyLock::new(|| selector(".grid_view > li"));
static RANK: LazyLock<Selector> = LazyLock::new(|| selector(".pic em"));
static POSTER: LazyLock<Selector> = LazyLock::new(|| selector(".pic img"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".info .hd .title"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector(".info .hd a"));
static RATING: LazyLock<Selector> = LazyLock::new(|| selector(".star .rating_num"));
static STAR_SPANS: LazyLock<Selector> = LazyLock::new(|| selector(".star span"));
static QUOTE: LazyLock<Selector> = LazyLock::new(|| selector(".inq"));
static INFO: LazyLock<Selector> = LazyLock::new(|| selector(".info .bd p"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Outcome of extracting one field from an entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Extracted<T> {
    Valid(T),
    Absent,
    Invalid(String),
}

type FieldResult<T> = Result<T, (Field, String)>;

impl<T> Extracted<T> {
    fn from_option(value: Option<T>) -> Self {
        value.map_or(Extracted::Absent, Extracted::Valid)
    }

    fn and_then<U>(self, f: impl FnOnce(T) -> Extracted<U>) -> Extracted<U> {
        match self {
            Extracted::Valid(v) => f(v),
            Extracted::Absent => Extracted::Absent,
            Extracted::Invalid(reason) => Extracted::Invalid(reason),
        }
    }

    fn required(self, field: Field) -> FieldResult<T> {
        match self {
            Extracted::Valid(v) => Ok(v),
            Extracted::Absent => Err((field, "missing".to_string())),
            Extracted::Invalid(reason) => Err((field, reason)),
        }
    }

    fn into_option(self) -> Option<T> {
        match self {
            Extracted::Valid(v) => Some(v),
            Extracted::Absent | Extracted::Invalid(_) => None,
        }
    }

    fn optional(self, field: Field) -> FieldResult<Option<T>> {
        match self {
            Extracted::Valid(v) => Ok(Some(v)),
            Extracted::Absent => Ok(None),
            Extracted::Invalid(reason) => Err((field, reason)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListingParser {
    max_year: i16,
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingParser {
    /// Accepts release years up to next year.
    pub fn new() -> Self {
        let this_year = jiff::Zoned::now().year();
        Self::with_max_year(this_year.saturating_add(1))
    }

    pub fn with_max_year(max_year: i16) -> Self {
        Self { max_year }
    }

    pub fn parse(&self, html: &str, page: u32) -> Result<ListingPage, ParseError> {
        let doc = Html::parse_document(html);
        if doc.select(&LISTING).next().is_none() {
            return Err(ParseError::MissingListing { page });
        }
        Ok(ListingPage { doc, page, max_year: self.max_year })
    }
}

/// A structurally valid listing page. Entries are extracted on demand.
pub struct ListingPage {
    doc: Html,
    page: u32,
    max_year: i16,
}

impl ListingPage {
    /// One item per listing row, in page order. Calling it again starts over.
    pub fn entries(&self) -> impl Iterator<Item = Result<ParsedEntry, ValidationError>> + '_ {
        self.doc.select(&ITEM).enumerate().map(move |(row, item)| {
            extract_entry(item, self.max_year).map_err(|(field, reason)| ValidationError {
                page: self.page,
                row,
                field,
                reason,
            })
        })
    }
}

fn extract_entry(item: ElementRef<'_>, max_year: i16) -> FieldResult<ParsedEntry> {
    let rank = text_of(item, &RANK).and_then(|t| parse_rank(&t)).required(Field::Rank)?;

    let link = item.select(&LINK).next();
    let detail_url = Extracted::from_option(
        link.and_then(|a| a.value().attr("href")).map(str::trim).filter(|s| !s.is_empty()),
    )
    .and_then(parse_url)
    .required(Field::DetailUrl)?;
    let external_id = external_id_from_url(&detail_url).required(Field::ExternalId)?;

    let mut titles = item.select(&TITLE).map(element_text);
    let title = Extracted::from_option(
        titles
            .next()
            .filter(|t| !t.is_empty())
            .or_else(|| link.map(element_text).filter(|t| !t.is_empty())),
    )
    .required(Field::Title)?;
    let original_title = titles
        .next()
        .map(|t| t.trim_start_matches(|c: char| c == '/' || c.is_whitespace()).to_string())
        .filter(|t| !t.is_empty());

    let poster_url = item
        .select(&POSTER)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let rating = text_of(item, &RATING).and_then(|t| parse_rating(&t)).required(Field::Rating)?;

    let review_count = item
        .select(&STAR_SPANS)
        .last()
        .map_or(Extracted::Absent, |span| parse_review_count(&element_text(span)))
        .optional(Field::ReviewCount)?
        .unwrap_or(0);

    let quote = text_of(item, &QUOTE).into_option();

    let lines = info_lines(item);
    let (directors, actors) = lines.first().map(|l| split_credits(l)).unwrap_or_default();
    let meta = lines.get(1).map(|l| split_meta(l)).unwrap_or_default();
    let year = meta
        .year
        .as_deref()
        .map_or(Extracted::Absent, |part| parse_year(part, max_year))
        .optional(Field::Year)?;

    Ok(ParsedEntry {
        record: MovieRecord {
            external_id,
            rank,
            title,
            original_title,
            year,
            rating,
            review_count,
            quote,
            detail_url,
            poster_url,
        },
        attributes: RawAttributes { regions: meta.regions, genres: meta.genres, directors, actors },
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn text_of(item: ElementRef<'_>, selector: &Selector) -> Extracted<String> {
    Extracted::from_option(item.select(selector).next().map(element_text).filter(|t| !t.is_empty()))
}

/// Non-empty lines of the info paragraph: credits first, then year/region/genre.
fn info_lines(item: ElementRef<'_>) -> Vec<String> {
    let Some(p) = item.select(&INFO).next() else {
        return Vec::new();
    };
    p.text()
        .flat_map(|t| t.split('\n'))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Splits `s` around `label` and the colon following it (ASCII or full width).
fn split_at_label<'a>(s: &'a str, label: &str) -> Option<(&'a str, &'a str)> {
    let (before, after) = s.split_once(label)?;
    let after = after.trim_start();
    let after = after.strip_prefix(':').or_else(|| after.strip_prefix('：')).unwrap_or(after);
    Some((before, after))
}

fn split_credits(line: &str) -> (Option<String>, Option<String>) {
    let rest = split_at_label(line, "导演").map_or(line, |(_, r)| r);
    match split_at_label(rest, "主演") {
        Some((directors, actors)) => (non_empty(directors), non_empty(actors)),
        None => (non_empty(strip_cut_actor_label(rest)), None),
    }
}

/// Long credit lines are cut inside the actor label, leaving
/// `<directors>\u{a0}\u{a0}\u{a0}主...`. Removes that tail so the last
/// director is not mistaken for a truncated name.
fn strip_cut_actor_label(directors: &str) -> &str {
    let trimmed = directors.trim_end();
    let Some(body) = trimmed.strip_suffix("...").or_else(|| trimmed.strip_suffix('…')) else {
        return directors;
    };
    let body = body.strip_suffix('主').unwrap_or(body);
    if body.ends_with(char::is_whitespace) { body.trim_end() } else { directors }
}

#[derive(Debug, Default, PartialEq)]
struct MetaParts {
    year: Option<String>,
    regions: Option<String>,
    genres: Option<String>,
}

/// `<year>[ / <year>...] / <regions> / <genres>`. Re-release years add parts at
/// the front, so regions and genres are read from the end.
fn split_meta(line: &str) -> MetaParts {
    let parts: Vec<&str> = line.split('/').map(str::trim).filter(|p| !p.is_empty()).collect();
    let year = parts.first().map(|p| p.to_string());
    match parts.len() {
        0 | 1 => MetaParts { year, ..Default::default() },
        2 => MetaParts { year, regions: non_empty(parts[1]), genres: None },
        n => MetaParts { year, regions: non_empty(parts[n - 2]), genres: non_empty(parts[n - 1]) },
    }
}

fn parse_rank(text: &str) -> Extracted<u16> {
    match text.trim().parse::<u16>() {
        Ok(rank) if (1..=SOURCE_MAX_RANK).contains(&u32::from(rank)) => Extracted::Valid(rank),
        Ok(rank) => Extracted::Invalid(format!("{rank} is outside 1..={SOURCE_MAX_RANK}")),
        Err(_) => Extracted::Invalid(format!("`{text}` is not an integer")),
    }
}

fn parse_url(url: &str) -> Extracted<String> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Extracted::Valid(url.to_string())
    } else {
        Extracted::Invalid(format!("`{url}` is not an absolute http(s) url"))
    }
}

fn external_id_from_url(url: &str) -> Extracted<String> {
    let id: String = url
        .split_once("/subject/")
        .map(|(_, rest)| rest.chars().take_while(char::is_ascii_digit).collect())
        .unwrap_or_default();
    if id.is_empty() {
        Extracted::Invalid(format!("no subject id in `{url}`"))
    } else {
        Extracted::Valid(id)
    }
}

/// Accepts `9`, `9.7`, `10.0`; at most one fractional digit.
fn parse_rating(text: &str) -> Extracted<Rating> {
    let text = text.trim();
    let (whole, frac) = text.split_once('.').unwrap_or((text, "0"));
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !is_digits(frac) || frac.len() != 1 {
        return Extracted::Invalid(format!("`{text}` is not a one-decimal number"));
    }

    let tenths = whole
        .parse::<u8>()
        .ok()
        .and_then(|w| w.checked_mul(10))
        .and_then(|w| w.checked_add(frac.as_bytes()[0] - b'0'))
        .and_then(Rating::from_tenths);
    match tenths {
        Some(rating) => Extracted::Valid(rating),
        None => Extracted::Invalid(format!("`{text}` is outside 0.0..=10.0")),
    }
}

/// `2,963,431人评价` → 2963431. No digits at all (e.g. too few ratings to
/// publish a count) is absent rather than invalid.
fn parse_review_count(text: &str) -> Extracted<u32> {
    let digits: String = text
        .chars()
        .filter(|c| *c != ',')
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Extracted::Absent;
    }
    match digits.parse::<u32>() {
        Ok(count) if count <= MAX_REVIEW_COUNT => Extracted::Valid(count),
        _ => Extracted::Invalid(format!("{digits} exceeds {MAX_REVIEW_COUNT}")),
    }
}

fn parse_year(part: &str, max_year: i16) -> Extracted<i16> {
    let digits: String = part
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Extracted::Absent;
    }
    match digits.parse::<i16>() {
        Ok(year) if digits.len() == 4 && (MIN_YEAR..=max_year).contains(&year) => {
            Extracted::Valid(year)
        },
        _ => Extracted::Invalid(format!("`{digits}` is not a year in {MIN_YEAR}..={max_year}")),
    }
}
