//! The catalog facade handed to UI collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::cache::ResponseCache;
use crate::core::client::CatalogClient;
use crate::core::curation::Curator;
use crate::core::discovery::DiscoveryEngine;
use crate::core::generation::{Generation, Ticket};
use crate::core::hydrate::Hydrator;
use crate::core::rate_limiter::RateLimiter;
use crate::core::search::SearchOrchestrator;
use crate::core::tmdb::{Feed, TmdbApi, LIST_TTL};
use crate::core::transport::{ReqwestTransport, Transport};
use crate::error::{CatalogError, Result};
use crate::models::{Genre, MovieRecord, RankedCandidate, SearchCriteria, SearchFilters, SearchPage};

/// Earliest year a year spotlight picks.
pub const SPOTLIGHT_FIRST_YEAR: i32 = 1970;
/// Smallest candidate pool fetched before curation.
pub const MIN_CURATION_POOL: usize = 30;

/// Every catalog operation behind one handle. Clones share the cache,
/// rate limiter and random source.
#[derive(Debug, Clone)]
pub struct Catalog {
    api: TmdbApi,
    hydrator: Hydrator,
    discovery: Arc<DiscoveryEngine>,
    search: SearchOrchestrator,
    curator: Curator,
}

impl Catalog {
    /// Build a catalog talking HTTP through `reqwest`.
    ///
    /// # Errors
    /// Fails only if an HTTP client cannot be constructed. A missing API
    /// key surfaces later, on the first call.
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog_transport =
            ReqwestTransport::new(Duration::from_secs(config.catalog.timeout_secs))?;
        let curation_transport =
            ReqwestTransport::new(Duration::from_secs(config.curation.timeout_secs))?;
        Ok(Self::with_transports(
            config,
            Arc::new(catalog_transport),
            Arc::new(curation_transport),
            None,
        ))
    }

    /// Build a catalog over arbitrary transports. `seed` fixes the random
    /// source used for sampling.
    pub fn with_transports(
        config: &Config,
        catalog_transport: Arc<dyn Transport>,
        curation_transport: Arc<dyn Transport>,
        seed: Option<u64>,
    ) -> Self {
        let client = CatalogClient::new(
            catalog_transport,
            config.catalog.base_url.as_str(),
            config.catalog.api_key.clone(),
            Arc::new(ResponseCache::new(config.cache.capacity)),
            Arc::new(RateLimiter::new(
                config.rate_limit.max_requests,
                config.rate_limit_interval(),
            )),
            config.retry.policy(),
        );
        let api = TmdbApi::new(client, config.catalog.language.as_str());
        let hydrator = Hydrator::new(
            api.clone(),
            config.catalog.region.as_str(),
            config.hydration.concurrency,
        );
        let discovery = match seed {
            Some(seed) => DiscoveryEngine::seeded(api.clone(), hydrator.clone(), seed),
            None => DiscoveryEngine::new(api.clone(), hydrator.clone()),
        };
        let curator = Curator::new(
            curation_transport,
            config.curation.endpoint.clone(),
            config.curation.api_key.clone(),
            config.curation.synopsis_limit,
            config.curation.max_candidates,
        );

        Self {
            search: SearchOrchestrator::new(api.clone()),
            discovery: Arc::new(discovery),
            api,
            hydrator,
            curator,
        }
    }

    pub async fn list_popular(&self, count: usize) -> Result<Vec<MovieRecord>> {
        self.list_feed(Feed::Popular, count).await
    }

    pub async fn list_top_rated(&self, count: usize) -> Result<Vec<MovieRecord>> {
        self.list_feed(Feed::TopRated, count).await
    }

    pub async fn list_now_playing(&self, count: usize) -> Result<Vec<MovieRecord>> {
        self.list_feed(Feed::NowPlaying, count).await
    }

    /// Hydrate the first `count` entries of page 1 of `feed`, in feed order.
    async fn list_feed(&self, feed: Feed, count: usize) -> Result<Vec<MovieRecord>> {
        let page = self.api.feed_page(feed, 1, Some(LIST_TTL)).await?;
        let ids: Vec<i64> = page.results.iter().take(count).map(|r| r.id).collect();
        debug!("{}: hydrating {} movies", feed.endpoint(), ids.len());
        Ok(self.hydrator.hydrate_many(&ids, true).await)
    }

    pub async fn discover(
        &self,
        criteria: &SearchCriteria,
        count: usize,
        mainstream_only: bool,
    ) -> Result<Vec<MovieRecord>> {
        self.discovery.discover(criteria, count, mainstream_only).await
    }

    pub async fn search(&self, filters: &SearchFilters, page: u32) -> Result<SearchPage> {
        self.search.search(filters, page).await
    }

    /// Full record for one movie, `None` when the catalog does not know it.
    ///
    /// # Errors
    /// Any failure other than a 404 from the details call.
    pub async fn get_details(&self, movie_id: i64) -> Result<Option<MovieRecord>> {
        match self.hydrator.try_hydrate(movie_id).await {
            Err(CatalogError::Upstream { status: 404, .. }) => Ok(None),
            other => other,
        }
    }

    /// Rerank `candidates` through the curation service. Falls back to the
    /// first `count` in original order whenever curation is unavailable.
    pub async fn rerank(
        &self,
        criteria: &SearchCriteria,
        candidates: &[MovieRecord],
        count: usize,
    ) -> Vec<RankedCandidate> {
        self.curator.rerank(criteria, candidates, count).await
    }

    pub fn curation_enabled(&self) -> bool {
        self.curator.is_enabled()
    }

    pub async fn genres(&self) -> Result<Vec<Genre>> {
        Ok(self
            .api
            .genre_list()
            .await?
            .into_iter()
            .map(|g| Genre { id: g.id, name: g.name })
            .collect())
    }

    /// Mainstream discovery for a random genre.
    pub async fn spotlight_random_genre(&self, count: usize) -> Result<(String, Vec<MovieRecord>)> {
        let genre = self.discovery.random_genre().to_string();
        info!("Spotlight genre: {}", genre);
        let criteria = SearchCriteria {
            genre: Some(genre.clone()),
            ..Default::default()
        };
        let movies = self.discover(&criteria, count, true).await?;
        Ok((genre, movies))
    }

    /// Mainstream discovery for a random release year since 1970.
    pub async fn spotlight_random_year(&self, count: usize) -> Result<(i32, Vec<MovieRecord>)> {
        let this_year = chrono::Local::now().year();
        let year = self.discovery.random_year(SPOTLIGHT_FIRST_YEAR, this_year);
        info!("Spotlight year: {}", year);
        let criteria = SearchCriteria {
            release_year: Some(year.to_string()),
            ..Default::default()
        };
        let movies = self.discover(&criteria, count, true).await?;
        Ok((year, movies))
    }

    /// Discover a pool of `max(30, 3 * count)` movies and keep the best
    /// `count`, reranked when `curate` is set.
    pub async fn curated_discover(
        &self,
        criteria: &SearchCriteria,
        count: usize,
        mainstream_only: bool,
        curate: bool,
    ) -> Result<Vec<MovieRecord>> {
        let pool_size = MIN_CURATION_POOL.max(count.saturating_mul(3));
        let mut pool = self.discover(criteria, pool_size, mainstream_only).await?;

        if !curate {
            pool.truncate(count);
            return Ok(pool);
        }
        let ranking = self.rerank(criteria, &pool, count).await;
        Ok(ranking
            .into_iter()
            .filter_map(|r| pool.get(r.index).cloned())
            .collect())
    }
}

/// Runs searches for one interactive surface. Starting a call supersedes
/// every call still in flight; superseded calls resolve to `Ok(None)`.
#[derive(Debug, Clone)]
pub struct SearchSession {
    catalog: Catalog,
    generation: Generation,
}

impl SearchSession {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            generation: Generation::new(),
        }
    }

    pub async fn search(&self, filters: &SearchFilters, page: u32) -> Result<Option<SearchPage>> {
        let ticket = self.generation.begin();
        let result = self.catalog.search(filters, page).await;
        Self::settle(&ticket, result)
    }

    pub async fn discover(
        &self,
        criteria: &SearchCriteria,
        count: usize,
        mainstream_only: bool,
    ) -> Result<Option<Vec<MovieRecord>>> {
        let ticket = self.generation.begin();
        let result = self.catalog.discover(criteria, count, mainstream_only).await;
        Self::settle(&ticket, result)
    }

    fn settle<T>(ticket: &Ticket, result: Result<T>) -> Result<Option<T>> {
        if !ticket.is_current() {
            debug!("Dropping superseded result (request {})", ticket.id());
            return Ok(None);
        }
        result.map(Some)
    }
}
