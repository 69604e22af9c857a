//! Turns bare catalog ids into [`MovieRecord`]s.
//!
//! The mapping is a set of pure functions over [`TmdbMovieDetails`]; the
//! [`Hydrator`] only adds fetching and bounded fan-out on top.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::tmdb::{
    TmdbApi, TmdbCastCredit, TmdbCrewMember, TmdbMovieDetails, TmdbMovieResult, TmdbRegionProviders,
    TmdbReleases, TmdbVideo, TmdbWatchProviders, IMAGE_BASE_URL, PERSON_PAGE_URL,
    PLACEHOLDER_POSTER_URL, PROFILE_BASE_URL, PROVIDER_LOGO_BASE_URL, YOUTUBE_WATCH_URL,
};
use crate::error::Result;
use crate::models::{CastMember, MovieRecord, MovieSummary, WatchProvider, WatchProviderType};

pub const NO_DIRECTOR: &str = "N/A";
pub const MAX_CAST: usize = 10;
pub const MAX_ACTORS: usize = 4;
pub const MAX_WRITERS: usize = 2;
const FALLBACK_REGION: &str = "CA";

// ── Derivation rules ────────────────────────────────────

pub fn director(crew: &[TmdbCrewMember]) -> String {
    crew.iter()
        .find(|c| c.job.as_deref() == Some("Director"))
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| NO_DIRECTOR.to_string())
}

pub fn writers(crew: &[TmdbCrewMember]) -> Vec<String> {
    crew.iter()
        .filter(|c| c.department.as_deref() == Some("Writing"))
        .filter_map(|c| c.name.clone())
        .take(MAX_WRITERS)
        .collect()
}

pub fn cast(credits: &[TmdbCastCredit]) -> Vec<CastMember> {
    credits
        .iter()
        .take(MAX_CAST)
        .filter_map(|c| {
            Some(CastMember {
                id: c.id,
                name: c.name.clone()?,
                character: c.character.clone().filter(|s| !s.is_empty()),
                profile_url: c.profile_path.as_deref().map(|p| format!("{PROFILE_BASE_URL}{p}")),
                tmdb_url: c.id.map(|id| format!("{PERSON_PAGE_URL}/{id}")),
            })
        })
        .collect()
}

pub fn actors(cast: &[CastMember]) -> Vec<String> {
    cast.iter().take(MAX_ACTORS).map(|c| c.name.clone()).collect()
}

/// CDN poster URL, or a placeholder keyed by title so the same movie
/// always gets the same stand-in.
pub fn poster_url(poster_path: Option<&str>, title: &str) -> String {
    match poster_path {
        Some(path) if !path.is_empty() => format!("{IMAGE_BASE_URL}{path}"),
        _ => format!("{PLACEHOLDER_POSTER_URL}{}", urlencoding::encode(title)),
    }
}

pub fn backdrop_url(backdrop_path: Option<&str>) -> Option<String> {
    backdrop_path
        .filter(|p| !p.is_empty())
        .map(|p| format!("{IMAGE_BASE_URL}{p}"))
}

/// Certification of the US release; an empty string counts as none.
pub fn certification(releases: Option<&TmdbReleases>) -> Option<String> {
    releases?
        .countries
        .iter()
        .find(|c| c.iso_3166_1.as_deref() == Some("US"))
        .and_then(|c| c.certification.clone())
        .filter(|c| !c.trim().is_empty())
}

pub fn trailer_url(videos: &[TmdbVideo]) -> Option<String> {
    let is_trailer = |v: &&TmdbVideo| {
        v.site.as_deref() == Some("YouTube") && v.video_type.as_deref() == Some("Trailer")
    };
    videos
        .iter()
        .filter(is_trailer)
        .find(|v| v.official == Some(true))
        .or_else(|| videos.iter().find(is_trailer))
        .and_then(|v| v.key.as_deref())
        .map(|key| format!("{YOUTUBE_WATCH_URL}{key}"))
}

pub fn release_year(release_date: Option<&str>) -> Option<String> {
    release_date
        .filter(|d| d.len() >= 4)
        .and_then(|d| d.get(..4))
        .map(str::to_string)
}

/// Region block to read providers from: `region`, then Canada, then
/// whichever region sorts first.
fn provider_region<'a>(
    providers: &'a TmdbWatchProviders,
    region: &str,
) -> Option<&'a TmdbRegionProviders> {
    providers
        .results
        .get(region)
        .or_else(|| providers.results.get(FALLBACK_REGION))
        .or_else(|| providers.results.values().next())
}

/// Stream, rent and buy offers of one region, deduplicated by
/// (type, provider id). First occurrence wins.
pub fn watch_providers(providers: &TmdbWatchProviders, region: &str) -> Vec<WatchProvider> {
    let Some(block) = provider_region(providers, region) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let groups = [
        (WatchProviderType::Stream, &block.flatrate),
        (WatchProviderType::Rent, &block.rent),
        (WatchProviderType::Buy, &block.buy),
    ];
    for (kind, list) in groups {
        for p in list {
            if !seen.insert((kind, p.provider_id)) {
                continue;
            }
            out.push(WatchProvider {
                name: p.provider_name.clone().unwrap_or_default(),
                logo_url: p
                    .logo_path
                    .as_deref()
                    .map(|l| format!("{PROVIDER_LOGO_BASE_URL}{l}")),
                provider_type: kind,
                link: block.link.clone(),
            });
        }
    }
    out
}

/// Build a record from a details payload. `None` when the payload carries
/// no title, which is how the upstream answers for unknown ids.
pub fn movie_record(
    details: TmdbMovieDetails,
    providers: Option<&TmdbWatchProviders>,
    region: &str,
) -> Option<MovieRecord> {
    let title = details.title.filter(|t| !t.trim().is_empty())?;
    let credits = details.credits.unwrap_or_default();
    let cast = cast(&credits.cast);
    let videos = details.videos.unwrap_or_default();

    Some(MovieRecord {
        id: details.id,
        poster_url: poster_url(details.poster_path.as_deref(), &title),
        backdrop_url: backdrop_url(details.backdrop_path.as_deref()),
        description: details.overview.unwrap_or_default(),
        actors: actors(&cast),
        director: director(&credits.crew),
        writers: writers(&credits.crew),
        genres: details.genres.into_iter().map(|g| g.name).collect(),
        runtime_minutes: details.runtime.filter(|&r| r > 0),
        release_year: release_year(details.release_date.as_deref()),
        certification: certification(details.releases.as_ref()),
        production_companies: details
            .production_companies
            .into_iter()
            .filter_map(|c| c.name)
            .collect(),
        rating: details.vote_average,
        vote_count: details.vote_count,
        tagline: details.tagline.filter(|t| !t.trim().is_empty()),
        trailer_url: trailer_url(&videos.results),
        cast,
        watch_providers: providers
            .map(|p| watch_providers(p, region))
            .unwrap_or_default(),
        title,
    })
}

/// List-view shape of a page entry.
pub fn summary(result: &TmdbMovieResult) -> MovieSummary {
    let title = result.display_title().to_string();
    MovieSummary {
        id: result.id,
        poster_url: poster_url(result.poster_path.as_deref(), &title),
        description: result.overview.clone().unwrap_or_default(),
        rating: result.vote_average,
        release_year: release_year(result.release_date.as_deref()),
        title,
    }
}

// ── Fetching ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Hydrator {
    api: TmdbApi,
    region: String,
    concurrency: usize,
}

impl Hydrator {
    pub fn new(api: TmdbApi, region: impl Into<String>, concurrency: usize) -> Self {
        Self {
            api,
            region: region.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch details and providers for one id. A providers failure only
    /// empties the provider list.
    ///
    /// # Errors
    /// Propagates a failed details call.
    pub async fn try_hydrate(&self, movie_id: i64) -> Result<Option<MovieRecord>> {
        let (details, providers) = tokio::join!(
            self.api.movie_details(movie_id),
            self.api.watch_providers(movie_id)
        );

        let details = details?;
        let providers = providers
            .inspect_err(|e| debug!("No watch providers for movie {}: {}", movie_id, e))
            .ok();

        let record = movie_record(details, providers.as_ref(), &self.region);
        if record.is_none() {
            warn!("Movie {} returned an empty payload", movie_id);
        }
        Ok(record)
    }

    /// Like [`try_hydrate`](Self::try_hydrate), with failures logged and
    /// turned into `None`.
    pub async fn hydrate(&self, movie_id: i64) -> Option<MovieRecord> {
        self.try_hydrate(movie_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Hydration failed for movie {}: {}", movie_id, e);
                None
            })
    }

    /// Hydrate `ids` with at most `concurrency` fetches in flight, dropping
    /// gaps. With `preserve_order` the output follows `ids`; otherwise it
    /// follows completion order.
    pub async fn hydrate_many(&self, ids: &[i64], preserve_order: bool) -> Vec<MovieRecord> {
        let fetches = stream::iter(ids.iter().copied()).map(|id| self.hydrate(id));
        let results: Vec<Option<MovieRecord>> = if preserve_order {
            fetches.buffered(self.concurrency).collect().await
        } else {
            fetches.buffer_unordered(self.concurrency).collect().await
        };
        results.into_iter().flatten().collect()
    }
}
