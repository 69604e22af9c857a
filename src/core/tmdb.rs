use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::client::{CatalogClient, Params};
use crate::error::Result;

pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const PROFILE_BASE_URL: &str = "https://image.tmdb.org/t/p/w185";
pub const PROVIDER_LOGO_BASE_URL: &str = "https://image.tmdb.org/t/p/w92";
pub const PERSON_PAGE_URL: &str = "https://www.themoviedb.org/person";
pub const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";
pub const PLACEHOLDER_POSTER_URL: &str = "https://picsum.photos/400/600?random=";

/// Upstream refuses pages beyond this.
pub const MAX_PAGES: u32 = 500;

pub const LIST_TTL: Duration = Duration::from_secs(60);
pub const DETAILS_TTL: Duration = Duration::from_secs(10 * 60);
pub const LOOKUP_TTL: Duration = Duration::from_secs(30);
pub const GENRES_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ── Response types ──────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

impl<T> Paged<T> {
    /// Total pages clamped to `1..=MAX_PAGES`.
    pub fn page_span(&self) -> u32 {
        self.total_pages.clamp(1, MAX_PAGES)
    }
}

/// Movie entry of a list, discover or search page.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieResult {
    pub id: i64,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

impl TmdbMovieResult {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPerson {
    pub id: i64,
    pub name: Option<String>,
    pub popularity: Option<f64>,
    pub known_for_department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCompany {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPersonCredits {
    #[serde(default)]
    pub crew: Vec<TmdbCrewCredit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCrewCredit {
    pub id: Option<i64>,
    pub job: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenreList {
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

/// Movie details with `credits,images,videos,releases` appended. Every
/// field is optional; the hydrator decides what absence means.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbMovieDetails {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub genres: Vec<TmdbGenre>,
    pub runtime: Option<u32>,
    pub release_date: Option<String>,
    pub production_companies: Vec<TmdbCompany>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub tagline: Option<String>,
    pub credits: Option<TmdbCredits>,
    pub videos: Option<TmdbVideos>,
    pub releases: Option<TmdbReleases>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbCredits {
    pub cast: Vec<TmdbCastCredit>,
    pub crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastCredit {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCrewMember {
    pub name: Option<String>,
    pub job: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbVideos {
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbVideo {
    pub key: Option<String>,
    pub site: Option<String>,
    #[serde(rename = "type")]
    pub video_type: Option<String>,
    pub official: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbReleases {
    pub countries: Vec<TmdbReleaseCountry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbReleaseCountry {
    pub iso_3166_1: Option<String>,
    pub certification: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbWatchProviders {
    pub results: BTreeMap<String, TmdbRegionProviders>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbRegionProviders {
    pub link: Option<String>,
    pub flatrate: Vec<TmdbProvider>,
    pub rent: Vec<TmdbProvider>,
    pub buy: Vec<TmdbProvider>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProvider {
    pub provider_id: i64,
    pub provider_name: Option<String>,
    pub logo_path: Option<String>,
}

// ── Feeds ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Popular,
    TopRated,
    NowPlaying,
}

impl Feed {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Feed::Popular => "movie/popular",
            Feed::TopRated => "movie/top_rated",
            Feed::NowPlaying => "movie/now_playing",
        }
    }
}

// ── Endpoint wrappers ───────────────────────────────────

/// Typed wrappers over the catalog endpoints this crate consumes.
#[derive(Debug, Clone)]
pub struct TmdbApi {
    client: CatalogClient,
    language: String,
}

impl TmdbApi {
    pub fn new(client: CatalogClient, language: impl Into<String>) -> Self {
        Self {
            client,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn base_params(&self) -> Params {
        Params::new().with("language", &self.language)
    }

    /// One page of a fixed list feed.
    pub async fn feed_page(
        &self,
        feed: Feed,
        page: u32,
        ttl: Option<Duration>,
    ) -> Result<Paged<TmdbMovieResult>> {
        let params = self.base_params().with("page", page);
        self.client.get(feed.endpoint(), &params, ttl).await
    }

    /// One page of `discover/movie` for a fully built filter set.
    pub async fn discover_page(
        &self,
        filters: &Params,
        page: u32,
        ttl: Option<Duration>,
    ) -> Result<Paged<TmdbMovieResult>> {
        let mut params = filters.clone();
        params.set("page", page);
        if !params.contains("language") {
            params.set("language", &self.language);
        }
        self.client.get("discover/movie", &params, ttl).await
    }

    pub async fn search_movie_page(&self, query: &str, page: u32) -> Result<Paged<TmdbMovieResult>> {
        let params = self
            .base_params()
            .with("query", query.trim())
            .with("page", page)
            .with("include_adult", false);
        self.client.get("search/movie", &params, Some(LOOKUP_TTL)).await
    }

    pub async fn search_person(&self, name: &str) -> Result<Vec<TmdbPerson>> {
        let params = self
            .base_params()
            .with("query", name.trim())
            .with("page", 1);
        let page: Paged<TmdbPerson> = self
            .client
            .get("search/person", &params, Some(LOOKUP_TTL))
            .await?;
        debug!("person search '{}': {} results", name, page.results.len());
        Ok(page.results)
    }

    pub async fn search_company(&self, name: &str) -> Result<Vec<TmdbCompany>> {
        let params = Params::new().with("query", name.trim()).with("page", 1);
        let page: Paged<TmdbCompany> = self
            .client
            .get("search/company", &params, Some(LOOKUP_TTL))
            .await?;
        Ok(page.results)
    }

    /// Ids of movies where `person_id` is credited with exactly `job`,
    /// in upstream order.
    pub async fn person_movie_ids_by_job(&self, person_id: i64, job: &str) -> Result<Vec<i64>> {
        let credits: TmdbPersonCredits = self
            .client
            .get(
                &format!("person/{person_id}/movie_credits"),
                &self.base_params(),
                Some(LOOKUP_TTL),
            )
            .await?;
        Ok(credits
            .crew
            .into_iter()
            .filter(|c| c.job.as_deref() == Some(job))
            .filter_map(|c| c.id)
            .collect())
    }

    pub async fn genre_list(&self) -> Result<Vec<TmdbGenre>> {
        let list: TmdbGenreList = self
            .client
            .get("genre/movie/list", &self.base_params(), Some(GENRES_TTL))
            .await?;
        Ok(list.genres)
    }

    pub async fn movie_details(&self, movie_id: i64) -> Result<TmdbMovieDetails> {
        let params = self
            .base_params()
            .with("append_to_response", "credits,images,videos,releases");
        self.client
            .get(&format!("movie/{movie_id}"), &params, Some(DETAILS_TTL))
            .await
    }

    pub async fn watch_providers(&self, movie_id: i64) -> Result<TmdbWatchProviders> {
        self.client
            .get(
                &format!("movie/{movie_id}/watch/providers"),
                &self.base_params(),
                Some(DETAILS_TTL),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::testing::client;
    use crate::core::transport::fake::{ok, FakeTransport};
    use serde_json::json;

    #[test]
    fn test_page_span_clamped() {
        let page = |total| Paged::<TmdbMovieResult> {
            page: 1,
            results: vec![],
            total_pages: total,
            total_results: 0,
        };
        assert_eq!(page(0).page_span(), 1);
        assert_eq!(page(42).page_span(), 42);
        assert_eq!(page(38_000).page_span(), MAX_PAGES);
    }

    #[test]
    fn test_details_tolerate_missing_blocks() {
        let details: TmdbMovieDetails =
            serde_json::from_value(json!({"id": 603, "title": "The Matrix"})).unwrap();
        assert_eq!(details.id, Some(603));
        assert!(details.credits.is_none());
        assert!(details.genres.is_empty());
    }

    #[test]
    fn test_missing_results_defaults_empty() {
        let page: Paged<TmdbMovieResult> = serde_json::from_value(json!({"page": 1})).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.page_span(), 1);
    }

    #[tokio::test]
    async fn test_person_movie_ids_filter_by_job() {
        let transport = FakeTransport::sequence(vec![ok(json!({
            "crew": [
                {"id": 1, "job": "Director"},
                {"id": 2, "job": "Writer"},
                {"id": null, "job": "Director"},
                {"id": 3, "job": "Director"}
            ]
        }))]);
        let api = TmdbApi::new(client(&transport), "en-US");
        let ids = api.person_movie_ids_by_job(525, "Director").await.unwrap();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(transport.requests()[0].url, "https://api.test/3/person/525/movie_credits");
    }

    #[tokio::test]
    async fn test_discover_page_sets_page_and_language() {
        let transport = FakeTransport::sequence(vec![ok(json!({"page": 7, "results": []}))]);
        let api = TmdbApi::new(client(&transport), "en-US");
        let filters = Params::new().with("with_genres", 28);
        api.discover_page(&filters, 7, None).await.unwrap();

        let req = &transport.requests()[0];
        assert_eq!(req.param("page"), Some("7"));
        assert_eq!(req.param("language"), Some("en-US"));
        assert_eq!(req.param("with_genres"), Some("28"));
    }
}
