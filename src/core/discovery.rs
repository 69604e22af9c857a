//! Randomized discovery over the catalog's discover endpoint.
//!
//! Fuzzy criteria are resolved to ids, then pages are sampled at random
//! down a ladder of vote-count floors until enough movies are hydrated.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::client::Params;
use super::filters::{self, Role};
use super::hydrate::Hydrator;
use super::tmdb::{Feed, TmdbApi, TmdbMovieResult, LIST_TTL, LOOKUP_TTL};
use crate::error::Result;
use crate::models::{non_empty, MovieRecord, SearchCriteria};

/// Minimum vote counts tried in order when sampling mainstream titles.
pub const VOTE_LADDER: [u64; 4] = [5000, 2000, 1000, 0];
pub const ATTEMPTS_PER_TIER: usize = 5;

/// Criteria resolved to discover parameters.
#[derive(Debug, Clone)]
struct DiscoverPlan {
    params: Params,
    /// Movies the requested director is credited as "Director" on. `Some`
    /// only when a director filter resolved, and then never empty.
    director_movies: Option<Vec<i64>>,
}

impl DiscoverPlan {
    fn director_set(&self) -> Option<HashSet<i64>> {
        self.director_movies
            .as_ref()
            .map(|ids| ids.iter().copied().collect())
    }
}

#[derive(Debug)]
pub struct DiscoveryEngine {
    api: TmdbApi,
    hydrator: Hydrator,
    rng: Mutex<StdRng>,
    /// Cache lifetime of sampled discover pages.
    page_ttl: Option<Duration>,
}

impl DiscoveryEngine {
    pub fn new(api: TmdbApi, hydrator: Hydrator) -> Self {
        Self::with_rng(api, hydrator, StdRng::from_os_rng())
    }

    /// Engine with a fixed seed, for reproducible sampling.
    pub fn seeded(api: TmdbApi, hydrator: Hydrator, seed: u64) -> Self {
        Self::with_rng(api, hydrator, StdRng::seed_from_u64(seed))
    }

    fn with_rng(api: TmdbApi, hydrator: Hydrator, rng: StdRng) -> Self {
        Self {
            api,
            hydrator,
            rng: Mutex::new(rng),
            page_ttl: Some(LOOKUP_TTL),
        }
    }

    /// Uniform page index in `1..=span`.
    fn random_page(&self, span: u32) -> u32 {
        self.rng.lock().random_range(1..=span.max(1))
    }

    /// A random genre name from the static table.
    pub fn random_genre(&self) -> &'static str {
        let i = self.rng.lock().random_range(0..filters::GENRES.len());
        filters::GENRES[i].0
    }

    /// A random year in `from..=to`.
    pub fn random_year(&self, from: i32, to: i32) -> i32 {
        self.rng.lock().random_range(from..=to.max(from))
    }

    /// Up to `count` distinct movies matching `criteria`.
    ///
    /// Returns fewer when the catalog runs dry. A director filter whose
    /// person has no directing credits yields an empty list without
    /// querying discover at all.
    ///
    /// # Errors
    /// Any failed lookup or page fetch aborts the whole call; movies
    /// gathered up to that point are discarded.
    pub async fn discover(
        &self,
        criteria: &SearchCriteria,
        count: usize,
        mainstream_only: bool,
    ) -> Result<Vec<MovieRecord>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let Some(plan) = self.resolve(criteria).await? else {
            info!("Director has no directing credits, nothing to discover");
            return Ok(Vec::new());
        };
        let director_set = plan.director_set();

        let tiers: Vec<Option<u64>> = if mainstream_only {
            VOTE_LADDER.iter().map(|&v| Some(v)).collect()
        } else {
            vec![None]
        };

        let mut collected = Vec::new();
        let mut seen = HashSet::new();

        'ladder: for threshold in tiers {
            for attempt in 0..ATTEMPTS_PER_TIER {
                if collected.len() >= count {
                    break 'ladder;
                }
                let page = self.sample_page(&plan.params, threshold).await?;
                if page.is_empty() {
                    debug!("Tier {:?} exhausted after {} attempts", threshold, attempt);
                    break;
                }
                let needed = count - collected.len();
                let chosen = select_candidates(
                    page,
                    &mut seen,
                    director_set.as_ref(),
                    needed.saturating_mul(2),
                );
                self.collect(&chosen, count, &mut collected).await;
            }
        }

        if collected.len() < count {
            self.fill(&plan, count, &mut seen, &mut collected).await?;
        }

        collected.truncate(count);
        debug!("Discovered {} of {} requested", collected.len(), count);
        Ok(collected)
    }

    async fn resolve(&self, criteria: &SearchCriteria) -> Result<Option<DiscoverPlan>> {
        let mut director_movies = None;
        if let Some(name) = non_empty(&criteria.director) {
            if let Some(person) = self.person_id(name, Role::Director).await? {
                let ids = self.api.person_movie_ids_by_job(person, "Director").await?;
                if ids.is_empty() {
                    return Ok(None);
                }
                director_movies = Some(ids);
            }
        }

        let mut params = filters::base_discover_params(self.api.language());

        if let Some(name) = non_empty(&criteria.actor) {
            if let Some(id) = self.person_id(name, Role::Actor).await? {
                filters::push_id(&mut params, "with_cast", id);
            }
        }
        for (value, role) in [
            (&criteria.writer, Role::Writer),
            (&criteria.producer, Role::Producer),
        ] {
            if let Some(name) = non_empty(value) {
                if let Some(id) = self.person_id(name, role).await? {
                    filters::push_id(&mut params, "with_crew", id);
                }
            }
        }
        if let Some(name) = non_empty(&criteria.production_house) {
            if let Some(company) = self.api.search_company(name).await?.first() {
                params.set("with_companies", company.id);
            }
        }

        if let Some(id) = non_empty(&criteria.genre).and_then(filters::genre_id) {
            params.set("with_genres", id);
        }
        if let Some(year) = non_empty(&criteria.release_year) {
            params.set("primary_release_year", year);
        }
        if let Some(bucket) = non_empty(&criteria.runtime) {
            filters::runtime_bucket(bucket).apply(&mut params);
        }
        if let Some(rating) = non_empty(&criteria.rating) {
            filters::apply_certification(&mut params, rating);
        }

        Ok(Some(DiscoverPlan {
            params,
            director_movies,
        }))
    }

    async fn person_id(&self, name: &str, role: Role) -> Result<Option<i64>> {
        let people = self.api.search_person(name).await?;
        Ok(filters::pick_person(&people, Some(role.department())))
    }

    /// Fetch page 1 for the page count, then a uniformly random page,
    /// reusing page 1 when the draw lands on it.
    async fn sample_page(
        &self,
        base: &Params,
        threshold: Option<u64>,
    ) -> Result<Vec<TmdbMovieResult>> {
        let mut params = base.clone();
        params.set_opt("vote_count.gte", threshold);

        let first = self.api.discover_page(&params, 1, self.page_ttl).await?;
        if first.results.is_empty() {
            return Ok(Vec::new());
        }
        let page = self.random_page(first.page_span());
        debug!("Sampling discover page {} of {}", page, first.page_span());
        if page == 1 {
            return Ok(first.results);
        }
        Ok(self
            .api
            .discover_page(&params, page, self.page_ttl)
            .await?
            .results)
    }

    async fn collect(&self, ids: &[i64], count: usize, collected: &mut Vec<MovieRecord>) {
        if ids.is_empty() {
            return;
        }
        for record in self.hydrator.hydrate_many(ids, false).await {
            if collected.len() >= count {
                break;
            }
            collected.push(record);
        }
    }

    /// Top up from the director's unseen credits, or from a random page of
    /// the popular feed when no director filter is active.
    async fn fill(
        &self,
        plan: &DiscoverPlan,
        count: usize,
        seen: &mut HashSet<i64>,
        collected: &mut Vec<MovieRecord>,
    ) -> Result<()> {
        let missing = count - collected.len();

        let picks: Vec<i64> = if let Some(director_movies) = &plan.director_movies {
            let mut unseen: Vec<i64> = director_movies
                .iter()
                .copied()
                .filter(|id| !seen.contains(id))
                .collect();
            unseen.shuffle(&mut *self.rng.lock());
            unseen
                .into_iter()
                .filter(|id| seen.insert(*id))
                .take(missing.saturating_mul(2))
                .collect()
        } else {
            let first = self.api.feed_page(Feed::Popular, 1, Some(LIST_TTL)).await?;
            if first.results.is_empty() {
                return Ok(());
            }
            let page = self.random_page(first.page_span());
            let results = if page == 1 {
                first.results
            } else {
                self.api
                    .feed_page(Feed::Popular, page, Some(LIST_TTL))
                    .await?
                    .results
            };
            results
                .into_iter()
                .map(|r| r.id)
                .filter(|id| seen.insert(*id))
                .take(missing.saturating_mul(2))
                .collect()
        };

        debug!("Fallback fill: {} candidates for {} slots", picks.len(), missing);
        self.collect(&picks, count, collected).await;
        Ok(())
    }
}

/// Order a page by vote count then popularity (both descending), drop ids
/// already seen or outside `allowed`, and take up to `limit`. Taken ids are
/// added to `seen`.
fn select_candidates(
    mut page: Vec<TmdbMovieResult>,
    seen: &mut HashSet<i64>,
    allowed: Option<&HashSet<i64>>,
    limit: usize,
) -> Vec<i64> {
    page.sort_by(|a, b| {
        b.vote_count
            .unwrap_or(0)
            .cmp(&a.vote_count.unwrap_or(0))
            .then_with(|| {
                b.popularity
                    .unwrap_or(0.0)
                    .partial_cmp(&a.popularity.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
    });

    let mut chosen = Vec::new();
    for result in page {
        if chosen.len() >= limit {
            break;
        }
        if allowed.is_some_and(|set| !set.contains(&result.id)) {
            continue;
        }
        if seen.insert(result.id) {
            chosen.push(result.id);
        }
    }
    chosen
}
