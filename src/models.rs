use serde::{Deserialize, Serialize};

// ── Movie ───────────────────────────────────────────────

/// A fully hydrated movie.
///
/// `rating` stays on the upstream 0-10 scale; star conversion belongs to
/// whoever renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub id: Option<i64>,
    pub title: String,
    pub poster_url: String,
    pub backdrop_url: Option<String>,
    pub description: String,
    pub actors: Vec<String>,
    pub director: String,
    pub writers: Vec<String>,
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub release_year: Option<String>,
    pub certification: Option<String>,
    pub production_companies: Vec<String>,
    pub rating: Option<f64>,
    pub vote_count: Option<u64>,
    pub tagline: Option<String>,
    pub trailer_url: Option<String>,
    pub cast: Vec<CastMember>,
    pub watch_providers: Vec<WatchProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastMember {
    pub id: Option<i64>,
    pub name: String,
    pub character: Option<String>,
    pub profile_url: Option<String>,
    pub tmdb_url: Option<String>,
}

// ── Watch providers ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchProviderType {
    Stream,
    Rent,
    Buy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchProvider {
    pub name: String,
    pub logo_url: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: WatchProviderType,
    pub link: Option<String>,
}

// ── Summaries ───────────────────────────────────────────

/// Lightweight list-view shape returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
    pub poster_url: String,
    pub description: String,
    pub rating: Option<f64>,
    pub release_year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub movies: Vec<MovieSummary>,
    pub total_results: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

// ── Criteria ────────────────────────────────────────────

/// Fuzzy multi-field criteria for discovery. Empty or missing fields
/// mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    pub genre: Option<String>,
    pub actor: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub producer: Option<String>,
    pub production_house: Option<String>,
    pub release_year: Option<String>,
    pub runtime: Option<String>,
    pub rating: Option<String>,
}

/// Filters for the search orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub min_rating: Option<f64>,
    pub runtime: Option<String>,
    pub min_runtime: Option<u32>,
    pub max_runtime: Option<u32>,
    pub rating: Option<String>,
    pub actor: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub producer: Option<String>,
    pub production_house: Option<String>,
}

impl SearchFilters {
    /// True when any person or company filter carries a value.
    pub fn has_people_or_company(&self) -> bool {
        [
            &self.actor,
            &self.director,
            &self.writer,
            &self.producer,
            &self.production_house,
        ]
        .iter()
        .any(|f| non_empty(f).is_some())
    }
}

/// Trimmed value of an optional field, `None` when blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ── Curation ────────────────────────────────────────────

/// One entry of a rerank result: an index into the candidate list and the
/// score the curation service gave it (absent on fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub index: usize,
    pub score: Option<f64>,
}
