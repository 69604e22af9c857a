pub mod cache;
pub mod client;
pub mod curation;
pub mod discovery;
pub mod filters;
pub mod generation;
pub mod hydrate;
pub mod rate_limiter;
pub mod retry;
pub mod search;
pub mod tmdb;
pub mod transport;
