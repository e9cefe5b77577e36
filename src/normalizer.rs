use std::collections::HashSet;

use crate::models::{EntityKind, EntityNames, RawAttributes};

/// Separators between names of any kind.
const NAME_SEPARATORS: [char; 4] = ['/', '、', ',', '，'];
/// Markers the source appends when it cuts a list short.
const TRUNCATION_MARKERS: [&str; 2] = ["...", "…"];

pub fn normalize(raw: &RawAttributes) -> EntityNames {
    let mut names = EntityNames::default();
    for kind in EntityKind::ALL {
        if let Some(value) = raw.get(kind) {
            *names.get_mut(kind) = split_names(kind, value);
        }
    }
    names
}

/// Splits one delimiter-joined attribute string into distinct names, in
/// first-seen order. People's names keep their inner spaces; regions and
/// genres are also separated by whitespace.
pub fn split_names(kind: EntityKind, raw: &str) -> Vec<String> {
    let splits_on_space = matches!(kind, EntityKind::Region | EntityKind::Genre);
    let is_separator =
        |c: char| NAME_SEPARATORS.contains(&c) || (splits_on_space && c.is_whitespace());

    let mut seen = HashSet::new();
    raw.split(is_separator)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        // A name ending in a truncation marker is a fragment of a longer one.
        .filter(|name| !TRUNCATION_MARKERS.iter().any(|m| name.ends_with(m)))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
