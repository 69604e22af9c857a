//! Mapping of fuzzy, human-entered filter values onto discover parameters.

use std::cmp::Ordering;

use super::client::Params;
use super::tmdb::TmdbPerson;

/// Genre names accepted by discovery, with their catalog ids.
pub const GENRES: &[(&str, i64)] = &[
    ("Action", 28),
    ("Adventure", 12),
    ("Animation", 16),
    ("Comedy", 35),
    ("Crime", 80),
    ("Documentary", 99),
    ("Drama", 18),
    ("Family", 10751),
    ("Fantasy", 14),
    ("History", 36),
    ("Horror", 27),
    ("Music", 10402),
    ("Mystery", 9648),
    ("Romance", 10749),
    ("Sci-Fi", 878),
    ("Thriller", 53),
    ("War", 10752),
    ("Western", 37),
];

pub const CERTIFICATION_COUNTRY: &str = "US";

/// Look a genre name up in [`GENRES`], ignoring case and surrounding space.
pub fn genre_id(name: &str) -> Option<i64> {
    let name = name.trim();
    GENRES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, id)| id)
}

/// Runtime bounds in minutes. Both `None` means unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl RuntimeRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn apply(&self, params: &mut Params) {
        params.set_opt("with_runtime.gte", self.min);
        params.set_opt("with_runtime.lte", self.max);
    }
}

/// Parse a runtime bucket label. Unknown labels constrain nothing.
pub fn runtime_bucket(label: &str) -> RuntimeRange {
    match label.trim().to_ascii_lowercase().as_str() {
        "under 90 minutes" => RuntimeRange {
            min: None,
            max: Some(90),
        },
        "90-120 minutes" => RuntimeRange {
            min: Some(90),
            max: Some(120),
        },
        "over 120 minutes" => RuntimeRange {
            min: Some(120),
            max: None,
        },
        _ => RuntimeRange::default(),
    }
}

/// Credit role a person filter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Actor,
    Director,
    Writer,
    Producer,
}

impl Role {
    /// `known_for_department` value that marks a good match.
    pub fn department(&self) -> &'static str {
        match self {
            Role::Actor => "Acting",
            Role::Director => "Directing",
            Role::Writer => "Writing",
            Role::Producer => "Production",
        }
    }
}

/// Most popular candidate, preferring those whose known department
/// matches `department`.
pub fn pick_person(candidates: &[TmdbPerson], department: Option<&str>) -> Option<i64> {
    let mut sorted: Vec<&TmdbPerson> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        let (a, b) = (a.popularity.unwrap_or(0.0), b.popularity.unwrap_or(0.0));
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });

    let matches_department = |p: &&&TmdbPerson| match (department, p.known_for_department.as_deref()) {
        (Some(want), Some(known)) => known.to_lowercase().contains(&want.to_lowercase()),
        _ => false,
    };

    sorted
        .iter()
        .find(matches_department)
        .or_else(|| sorted.first())
        .map(|p| p.id)
}

/// Parameters every discover call starts from.
pub fn base_discover_params(language: &str) -> Params {
    Params::new()
        .with("sort_by", "popularity.desc")
        .with("include_adult", false)
        .with("language", language)
}

/// Upper-bound certification filter, scoped to the US rating board.
pub fn apply_certification(params: &mut Params, rating: &str) {
    let rating = rating.trim();
    if rating.is_empty() {
        return;
    }
    params.set("certification_country", CERTIFICATION_COUNTRY);
    params.set("certification.lte", rating);
}

/// Add `id` to a comma-separated id list parameter.
pub fn push_id(params: &mut Params, key: &str, id: i64) {
    let value = match params.get(key) {
        Some(existing) if !existing.is_empty() => format!("{existing},{id}"),
        _ => id.to_string(),
    };
    params.set(key, value);
}
