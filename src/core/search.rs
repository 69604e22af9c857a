//! Filtered, paginated movie search returning list-view summaries.

use tracing::{debug, warn};

use super::client::Params;
use super::filters::{self, RuntimeRange};
use super::hydrate;
use super::tmdb::{Paged, TmdbApi, TmdbMovieResult, LOOKUP_TTL, MAX_PAGES};
use crate::error::Result;
use crate::models::{non_empty, SearchFilters, SearchPage};

/// Summaries returned per page, at most.
pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    api: TmdbApi,
}

impl SearchOrchestrator {
    pub fn new(api: TmdbApi) -> Self {
        Self { api }
    }

    /// Search one page.
    ///
    /// Person or company filters route through discover with resolved ids;
    /// otherwise a text query goes to movie search with genre, year and
    /// minimum rating applied to the returned page; otherwise plain discover.
    pub async fn search(&self, filters: &SearchFilters, page: u32) -> Result<SearchPage> {
        let page = page.clamp(1, MAX_PAGES);

        let data = if filters.has_people_or_company() {
            debug!("search: people/company branch, page {}", page);
            let mut params = self.discover_params(filters).await?;
            self.apply_people(filters, &mut params).await;
            self.api.discover_page(&params, page, Some(LOOKUP_TTL)).await?
        } else if let Some(query) = non_empty(&filters.query) {
            debug!("search: text branch '{}', page {}", query, page);
            let mut data = self.api.search_movie_page(query, page).await?;
            let genre = match non_empty(&filters.genre) {
                Some(name) => self.genre_id(name).await?,
                None => None,
            };
            data.results
                .retain(|r| matches_post_filters(r, genre, filters.year, filters.min_rating));
            data
        } else {
            debug!("search: discover branch, page {}", page);
            let params = self.discover_params(filters).await?;
            self.api.discover_page(&params, page, Some(LOOKUP_TTL)).await?
        };

        Ok(to_search_page(data))
    }

    /// Discover parameters for genre, year, rating and runtime constraints.
    async fn discover_params(&self, filters: &SearchFilters) -> Result<Params> {
        let mut params = filters::base_discover_params(self.api.language());
        if let Some(name) = non_empty(&filters.genre) {
            params.set_opt("with_genres", self.genre_id(name).await?);
        }
        params.set_opt("primary_release_year", filters.year);
        params.set_opt("vote_average.gte", filters.min_rating.filter(|r| *r > 0.0));
        runtime_range(filters).apply(&mut params);
        if let Some(rating) = non_empty(&filters.rating) {
            filters::apply_certification(&mut params, rating);
        }
        Ok(params)
    }

    async fn apply_people(&self, filters: &SearchFilters, params: &mut Params) {
        if let Some(id) = self.first_person(&filters.actor).await {
            params.set("with_cast", id);
        }
        if let Some(id) = self.first_person(&filters.director).await {
            params.set("with_crew", id);
        }
        if let Some(id) = self.first_person(&filters.writer).await {
            params.set("with_people", id);
        }
        if let Some(id) = self.first_person(&filters.producer).await {
            if !params.contains("with_crew") {
                params.set("with_crew", id);
            }
        }
        if let Some(name) = non_empty(&filters.production_house) {
            match self.api.search_company(name).await {
                Ok(companies) => {
                    if let Some(company) = companies.first() {
                        params.set("with_companies", company.id);
                    }
                }
                Err(e) => warn!("Company lookup for '{}' failed: {}", name, e),
            }
        }
    }

    /// First person search hit. Lookup failures drop the filter.
    async fn first_person(&self, name: &Option<String>) -> Option<i64> {
        let name = non_empty(name)?;
        match self.api.search_person(name).await {
            Ok(people) => people.first().map(|p| p.id),
            Err(e) => {
                warn!("Person lookup for '{}' failed: {}", name, e);
                None
            }
        }
    }

    /// Static table first, then the upstream genre list by name.
    async fn genre_id(&self, name: &str) -> Result<Option<i64>> {
        if let Some(id) = filters::genre_id(name) {
            return Ok(Some(id));
        }
        let genres = self.api.genre_list().await?;
        Ok(genres
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
            .map(|g| g.id))
    }
}

/// Explicit bounds win over the bucket label.
fn runtime_range(filters: &SearchFilters) -> RuntimeRange {
    let bucket = non_empty(&filters.runtime)
        .map(filters::runtime_bucket)
        .unwrap_or_default();
    RuntimeRange {
        min: filters.min_runtime.filter(|m| *m > 0).or(bucket.min),
        max: filters.max_runtime.filter(|m| *m > 0).or(bucket.max),
    }
}

fn matches_post_filters(
    result: &TmdbMovieResult,
    genre: Option<i64>,
    year: Option<i32>,
    min_rating: Option<f64>,
) -> bool {
    if let Some(genre) = genre {
        if !result.genre_ids.contains(&genre) {
            return false;
        }
    }
    if let Some(year) = year {
        let prefix = year.to_string();
        if !result
            .release_date
            .as_deref()
            .is_some_and(|d| d.starts_with(&prefix))
        {
            return false;
        }
    }
    if let Some(min) = min_rating.filter(|r| *r > 0.0) {
        if result.vote_average.unwrap_or(0.0) < min {
            return false;
        }
    }
    true
}

fn to_search_page(data: Paged<TmdbMovieResult>) -> SearchPage {
    SearchPage {
        movies: data
            .results
            .iter()
            .take(PAGE_SIZE)
            .map(hydrate::summary)
            .collect(),
        total_results: data.total_results,
        total_pages: u64::from(data.total_pages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::testing::client;
    use crate::core::transport::fake::{ok, status, FakeTransport};
    use serde_json::{json, Value};

    fn results(n: i64) -> Value {
        let results: Vec<Value> = (1..=n)
            .map(|id| json!({"id": id, "title": format!("Movie {id}"), "poster_path": null}))
            .collect();
        json!({"page": 1, "results": results, "total_pages": 4, "total_results": 75})
    }

    fn orchestrator(transport: &FakeTransport) -> SearchOrchestrator {
        SearchOrchestrator::new(TmdbApi::new(client(transport), "en-US"))
    }

    fn discover_request(transport: &FakeTransport) -> crate::core::transport::HttpRequest {
        transport
            .requests()
            .into_iter()
            .find(|r| r.url.ends_with("/discover/movie"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_people_branch_uses_discover() {
        let transport = FakeTransport::new(|req| {
            if req.url.ends_with("/search/person") {
                let id = match req.param("query") {
                    Some("Tom Hanks") => 31,
                    Some("Ron Howard") => 6159,
                    Some("Writer") => 77,
                    _ => 88,
                };
                Ok(ok(json!({"results": [{"id": id}, {"id": 1}]})))
            } else if req.url.ends_with("/search/company") {
                Ok(status(500, "Internal Server Error"))
            } else {
                Ok(ok(results(25)))
            }
        });
        let filters = SearchFilters {
            query: Some("ignored".into()),
            actor: Some("Tom Hanks".into()),
            director: Some("Ron Howard".into()),
            writer: Some("Writer".into()),
            producer: Some("Producer".into()),
            production_house: Some("Imagine".into()),
            year: Some(1995),
            min_rating: Some(7.0),
            runtime: Some("over 120 minutes".into()),
            max_runtime: Some(150),
            ..Default::default()
        };
        let page = orchestrator(&transport).search(&filters, 2).await.unwrap();

        assert_eq!(page.movies.len(), PAGE_SIZE);
        assert_eq!(page.total_results, 75);
        assert_eq!(page.total_pages, 4);
        assert_eq!(transport.count_path("/search/movie"), 0);

        let req = discover_request(&transport);
        assert_eq!(req.param("with_cast"), Some("31"));
        assert_eq!(req.param("with_crew"), Some("6159"));
        assert_eq!(req.param("with_people"), Some("77"));
        assert_eq!(req.param("with_companies"), None);
        assert_eq!(req.param("primary_release_year"), Some("1995"));
        assert_eq!(req.param("vote_average.gte"), Some("7"));
        assert_eq!(req.param("with_runtime.gte"), Some("120"));
        assert_eq!(req.param("with_runtime.lte"), Some("150"));
        assert_eq!(req.param("page"), Some("2"));
    }

    #[tokio::test]
    async fn test_producer_fills_crew_when_no_director() {
        let transport = FakeTransport::new(|req| {
            if req.url.ends_with("/search/person") {
                Ok(ok(json!({"results": [{"id": 88}]})))
            } else {
                Ok(ok(results(1)))
            }
        });
        let filters = SearchFilters {
            producer: Some("Kathleen Kennedy".into()),
            ..Default::default()
        };
        orchestrator(&transport).search(&filters, 1).await.unwrap();
        assert_eq!(discover_request(&transport).param("with_crew"), Some("88"));
    }

    #[tokio::test]
    async fn test_text_branch_post_filters() {
        let transport = FakeTransport::new(|req| {
            assert!(req.url.ends_with("/search/movie"));
            Ok(ok(json!({
                "page": 1,
                "total_pages": 1,
                "total_results": 4,
                "results": [
                    {"id": 1, "title": "A", "genre_ids": [878], "release_date": "1999-03-31", "vote_average": 8.7},
                    {"id": 2, "title": "B", "genre_ids": [18], "release_date": "1999-05-01", "vote_average": 8.0},
                    {"id": 3, "title": "C", "genre_ids": [878], "release_date": "2003-05-15", "vote_average": 7.0},
                    {"id": 4, "title": "D", "genre_ids": [878], "release_date": "1999-11-11", "vote_average": 5.0}
                ]
            })))
        });
        let filters = SearchFilters {
            query: Some(" matrix ".into()),
            genre: Some("Sci-Fi".into()),
            year: Some(1999),
            min_rating: Some(6.0),
            ..Default::default()
        };
        let page = orchestrator(&transport).search(&filters, 1).await.unwrap();

        let ids: Vec<i64> = page.movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(page.total_results, 4);
        assert_eq!(transport.requests()[0].param("query"), Some("matrix"));
        assert_eq!(page.movies[0].release_year.as_deref(), Some("1999"));
    }

    #[tokio::test]
    async fn test_plain_discover_with_upstream_genre() {
        let transport = FakeTransport::new(|req| {
            if req.url.ends_with("/genre/movie/list") {
                Ok(ok(json!({"genres": [{"id": 10770, "name": "TV Movie"}]})))
            } else {
                Ok(ok(results(3)))
            }
        });
        let filters = SearchFilters {
            genre: Some("tv movie".into()),
            rating: Some("R".into()),
            runtime: Some("under 90 minutes".into()),
            ..Default::default()
        };
        let page = orchestrator(&transport).search(&filters, 0).await.unwrap();
        assert_eq!(page.movies.len(), 3);
        assert_eq!(
            page.movies[0].poster_url,
            "https://picsum.photos/400/600?random=Movie%201"
        );

        let req = discover_request(&transport);
        assert_eq!(req.param("with_genres"), Some("10770"));
        assert_eq!(req.param("certification.lte"), Some("R"));
        assert_eq!(req.param("with_runtime.lte"), Some("90"));
        assert_eq!(req.param("page"), Some("1"));
        assert_eq!(req.param("sort_by"), Some("popularity.desc"));
    }

    #[tokio::test]
    async fn test_discover_failure_propagates() {
        let transport = FakeTransport::sequence(vec![status(401, "Unauthorized")]);
        let err = orchestrator(&transport)
            .search(&SearchFilters::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::CatalogError::Upstream { status: 401, .. }));
    }

    #[test]
    fn test_explicit_runtime_overrides_bucket() {
        let filters = SearchFilters {
            runtime: Some("90-120 minutes".into()),
            min_runtime: Some(100),
            ..Default::default()
        };
        assert_eq!(
            runtime_range(&filters),
            RuntimeRange { min: Some(100), max: Some(120) }
        );
    }
}
