pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod service;

pub use crate::config::Config;
pub use crate::error::{CatalogError, Result};
pub use crate::service::{Catalog, SearchSession};
