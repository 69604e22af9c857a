//! Best-effort reranking of candidates through an external curation service.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::retry::{self, RetryPolicy};
use super::transport::{HttpRequest, Transport};
use crate::error::{CatalogError, Result};
use crate::models::{MovieRecord, RankedCandidate, SearchCriteria};

const MAX_ACTORS_SENT: usize = 4;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    criteria: &'a SearchCriteria,
    candidates: Vec<CandidatePayload<'a>>,
}

#[derive(Debug, Serialize)]
struct CandidatePayload<'a> {
    idx: usize,
    title: &'a str,
    description: String,
    actors: &'a [String],
    director: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RerankResponse {
    ranked: Vec<RankEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankEntry {
    pub idx: Option<i64>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Curator {
    transport: Arc<dyn Transport>,
    endpoint: Option<String>,
    api_key: Option<String>,
    synopsis_limit: usize,
    max_candidates: usize,
    retry: RetryPolicy,
}

impl Curator {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: Option<String>,
        api_key: Option<String>,
        synopsis_limit: usize,
        max_candidates: usize,
    ) -> Self {
        let non_blank = |s: String| (!s.trim().is_empty()).then_some(s);
        Self {
            transport,
            endpoint: endpoint.and_then(non_blank),
            api_key: api_key.and_then(non_blank),
            synopsis_limit,
            max_candidates: max_candidates.max(1),
            retry: RetryPolicy::none(),
        }
    }

    /// Curation runs only with both an endpoint and a credential.
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }

    /// Rank `candidates` for `criteria`, best first, keeping at most
    /// `count` entries. Never fails: any problem with the service yields
    /// the first `count` candidates in their original order.
    pub async fn rerank(
        &self,
        criteria: &SearchCriteria,
        candidates: &[MovieRecord],
        count: usize,
    ) -> Vec<RankedCandidate> {
        let sent = candidates.len().min(self.max_candidates);
        if !self.is_enabled() || sent == 0 {
            return original_order(candidates.len(), count);
        }

        match self.request_ranking(criteria, &candidates[..sent]).await {
            Ok(ranked) => apply_ranking(&ranked, sent, count),
            Err(e) => {
                warn!("Curation unavailable, keeping original order: {}", e);
                original_order(candidates.len(), count)
            }
        }
    }

    async fn request_ranking(
        &self,
        criteria: &SearchCriteria,
        candidates: &[MovieRecord],
    ) -> Result<Vec<RankEntry>> {
        let (Some(endpoint), Some(api_key)) = (&self.endpoint, &self.api_key) else {
            return Err(CatalogError::Config("curation not configured".into()));
        };

        let payload = RerankRequest {
            criteria,
            candidates: candidates
                .iter()
                .enumerate()
                .map(|(idx, c)| CandidatePayload {
                    idx,
                    title: &c.title,
                    description: truncate_chars(&c.description, self.synopsis_limit),
                    actors: &c.actors[..c.actors.len().min(MAX_ACTORS_SENT)],
                    director: &c.director,
                })
                .collect(),
        };
        let request = HttpRequest::post_json(endpoint.as_str(), serde_json::to_value(&payload)?)
            .with_header("authorization", &format!("Bearer {api_key}"));

        let response = retry::execute(
            &self.retry,
            "rerank",
            |_| {
                let request = request.clone();
                async move {
                    let resp = self.transport.send(request).await?;
                    if resp.is_success() {
                        Ok(resp)
                    } else {
                        Err(CatalogError::Upstream {
                            status: resp.status,
                            status_text: resp.status_text,
                            body: resp.body,
                        })
                    }
                }
            },
            CatalogError::is_transient,
        )
        .await?;

        let parsed: RerankResponse = serde_json::from_str(&response.body)?;
        debug!("Curation ranked {} of {} candidates", parsed.ranked.len(), candidates.len());
        Ok(parsed.ranked)
    }
}

/// First `count` of `len` candidates, unscored.
pub fn original_order(len: usize, count: usize) -> Vec<RankedCandidate> {
    (0..len.min(count))
        .map(|index| RankedCandidate { index, score: None })
        .collect()
}

/// Sort by descending score, dropping out-of-range and repeated indices.
/// Falls back to [`original_order`] when nothing usable remains.
pub fn apply_ranking(ranked: &[RankEntry], len: usize, count: usize) -> Vec<RankedCandidate> {
    let mut seen = HashSet::new();
    let mut kept: Vec<RankedCandidate> = ranked
        .iter()
        .filter_map(|r| {
            let index = usize::try_from(r.idx?).ok().filter(|&i| i < len)?;
            seen.insert(index).then_some(RankedCandidate {
                index,
                score: r.score,
            })
        })
        .collect();

    // Unscored entries sink; ties keep service order.
    kept.sort_by(|a, b| match (a.score, b.score) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    kept.truncate(count);

    if kept.is_empty() {
        return original_order(len, count);
    }
    kept
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::fake::{ok, status, FakeTransport};
    use crate::core::transport::{HttpResponse, Method};
    use serde_json::json;

    fn movie(title: &str) -> MovieRecord {
        MovieRecord {
            id: None,
            title: title.into(),
            poster_url: String::new(),
            backdrop_url: None,
            description: "x".repeat(500),
            actors: vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
            director: "Dir".into(),
            writers: vec![],
            genres: vec![],
            runtime_minutes: None,
            release_year: None,
            certification: None,
            production_companies: vec![],
            rating: None,
            vote_count: None,
            tagline: None,
            trailer_url: None,
            cast: vec![],
            watch_providers: vec![],
        }
    }

    fn candidates(n: usize) -> Vec<MovieRecord> {
        (0..n).map(|i| movie(&format!("Movie {i}"))).collect()
    }

    fn curator(transport: &FakeTransport) -> Curator {
        Curator::new(
            Arc::new(transport.clone()),
            Some("http://curation.test/api/rerank".into()),
            Some("secret".into()),
            280,
            60,
        )
    }

    fn indices(ranked: &[RankedCandidate]) -> Vec<usize> {
        ranked.iter().map(|r| r.index).collect()
    }

    #[tokio::test]
    async fn test_unavailable_service_keeps_order() {
        let transport = FakeTransport::sequence(vec![status(503, "Service Unavailable")]);
        let ranked = curator(&transport)
            .rerank(&SearchCriteria::default(), &candidates(5), 5)
            .await;
        assert_eq!(indices(&ranked), vec![0, 1, 2, 3, 4]);
        assert!(ranked.iter().all(|r| r.score.is_none()));
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn test_non_json_response_keeps_order() {
        let transport = FakeTransport::sequence(vec![HttpResponse {
            status: 200,
            status_text: "OK".into(),
            body: "<html>".into(),
        }]);
        let ranked = curator(&transport)
            .rerank(&SearchCriteria::default(), &candidates(4), 2)
            .await;
        assert_eq!(indices(&ranked), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_sorted_by_score_out_of_range_dropped() {
        let transport = FakeTransport::sequence(vec![ok(json!({
            "ranked": [
                {"idx": 0, "score": 0.2},
                {"idx": 9, "score": 0.99},
                {"idx": 2, "score": 0.9},
                {"idx": -1, "score": 0.95},
                {"idx": 1, "score": 0.5},
                {"idx": 2, "score": 0.1}
            ]
        }))]);
        let ranked = curator(&transport)
            .rerank(&SearchCriteria::default(), &candidates(3), 2)
            .await;
        assert_eq!(indices(&ranked), vec![2, 1]);
        assert_eq!(ranked[0].score, Some(0.9));
    }

    #[tokio::test]
    async fn test_payload_truncated_and_authorized() {
        let transport = FakeTransport::sequence(vec![ok(json!({"ranked": []}))]);
        let criteria = SearchCriteria {
            genre: Some("Drama".into()),
            ..Default::default()
        };
        let ranked = curator(&transport).rerank(&criteria, &candidates(2), 5).await;
        assert_eq!(indices(&ranked), vec![0, 1]);

        let req = &transport.requests()[0];
        assert_eq!(req.method, Method::Post);
        assert!(req
            .headers
            .contains(&("authorization".to_string(), "Bearer secret".to_string())));
        let body = req.body.as_ref().unwrap();
        assert_eq!(body["criteria"]["genre"], "Drama");
        let first = &body["candidates"][0];
        assert_eq!(first["idx"], 0);
        assert_eq!(first["description"].as_str().unwrap().chars().count(), 280);
        assert_eq!(first["actors"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_credential_is_noop() {
        let transport = FakeTransport::sequence(vec![ok(json!({"ranked": [{"idx": 1, "score": 1.0}]}))]);
        let curator = Curator::new(
            Arc::new(transport.clone()),
            Some("http://curation.test/api/rerank".into()),
            Some(" ".into()),
            280,
            60,
        );
        assert!(!curator.is_enabled());
        let ranked = curator.rerank(&SearchCriteria::default(), &candidates(3), 3).await;
        assert_eq!(indices(&ranked), vec![0, 1, 2]);
        assert_eq!(transport.count(), 0);
    }

    #[test]
    fn test_apply_ranking_empty_falls_back() {
        let junk = vec![RankEntry { idx: Some(7), score: Some(1.0) }];
        assert_eq!(indices(&apply_ranking(&junk, 3, 2)), vec![0, 1]);
        assert_eq!(indices(&apply_ranking(&[], 0, 5)), Vec::<usize>::new());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
