use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use cinescout::models::{SearchCriteria, SearchFilters};
use cinescout::{Catalog, Config};

#[derive(Parser)]
#[command(name = "cinescout", version, about = "Movie discovery over the TMDB catalog")]
struct Cli {
    /// Config file (defaults to $CINESCOUT_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Popular movies, in feed order
    Popular {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Top rated movies, in feed order
    TopRated {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Movies now in theaters, in feed order
    NowPlaying {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Random movies matching fuzzy criteria
    Discover {
        #[command(flatten)]
        criteria: CriteriaArgs,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// Do not prefer titles with many votes
        #[arg(long)]
        no_mainstream: bool,
        /// Rerank a larger pool through the curation service
        #[arg(long)]
        curate: bool,
    },
    /// One page of filtered search results
    Search(SearchArgs),
    /// Full record for one movie id
    Details { id: i64 },
    /// Discovery for a random genre or year
    Spotlight {
        #[command(subcommand)]
        kind: SpotlightKind,
        #[arg(short = 'n', long, default_value_t = 10, global = true)]
        count: usize,
    },
    /// Genre list from the catalog
    Genres,
}

#[derive(Subcommand)]
enum SpotlightKind {
    Genre,
    Year,
}

#[derive(Args)]
struct CriteriaArgs {
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    actor: Option<String>,
    #[arg(long)]
    director: Option<String>,
    #[arg(long)]
    writer: Option<String>,
    #[arg(long)]
    producer: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    year: Option<String>,
    /// "under 90 minutes", "90-120 minutes" or "over 120 minutes"
    #[arg(long)]
    runtime: Option<String>,
    /// Certification upper bound, e.g. PG-13
    #[arg(long)]
    rating: Option<String>,
}

impl From<CriteriaArgs> for SearchCriteria {
    fn from(a: CriteriaArgs) -> Self {
        SearchCriteria {
            genre: a.genre,
            actor: a.actor,
            director: a.director,
            writer: a.writer,
            producer: a.producer,
            production_house: a.company,
            release_year: a.year,
            runtime: a.runtime,
            rating: a.rating,
        }
    }
}

#[derive(Args)]
struct SearchArgs {
    /// Free-text title query
    query: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    min_rating: Option<f64>,
    #[arg(long)]
    runtime: Option<String>,
    #[arg(long)]
    min_runtime: Option<u32>,
    #[arg(long)]
    max_runtime: Option<u32>,
    #[arg(long)]
    rating: Option<String>,
    #[arg(long)]
    actor: Option<String>,
    #[arg(long)]
    director: Option<String>,
    #[arg(long)]
    writer: Option<String>,
    #[arg(long)]
    producer: Option<String>,
    #[arg(long)]
    company: Option<String>,
}

impl From<SearchArgs> for SearchFilters {
    fn from(a: SearchArgs) -> Self {
        SearchFilters {
            query: a.query,
            genre: a.genre,
            year: a.year,
            min_rating: a.min_rating,
            runtime: a.runtime,
            min_runtime: a.min_runtime,
            max_runtime: a.max_runtime,
            rating: a.rating,
            actor: a.actor,
            director: a.director,
            writer: a.writer,
            producer: a.producer,
            production_house: a.company,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("cinescout starting...");

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let catalog = Catalog::from_config(&config).context("building catalog client")?;

    match cli.command {
        Command::Popular { count } => print_json(&catalog.list_popular(count).await?),
        Command::TopRated { count } => print_json(&catalog.list_top_rated(count).await?),
        Command::NowPlaying { count } => print_json(&catalog.list_now_playing(count).await?),
        Command::Discover {
            criteria,
            count,
            no_mainstream,
            curate,
        } => {
            let criteria = SearchCriteria::from(criteria);
            let movies = if curate {
                if !catalog.curation_enabled() {
                    tracing::warn!("Curation not configured, keeping discovery order");
                }
                catalog
                    .curated_discover(&criteria, count, !no_mainstream, true)
                    .await?
            } else {
                catalog.discover(&criteria, count, !no_mainstream).await?
            };
            print_json(&movies)
        }
        Command::Search(args) => {
            let page = args.page;
            let filters = SearchFilters::from(args);
            print_json(&catalog.search(&filters, page).await?)
        }
        Command::Details { id } => match catalog.get_details(id).await? {
            Some(movie) => print_json(&movie),
            None => anyhow::bail!("movie {id} not found"),
        },
        Command::Spotlight { kind, count } => match kind {
            SpotlightKind::Genre => {
                let (genre, movies) = catalog.spotlight_random_genre(count).await?;
                print_json(&json!({ "genre": genre, "movies": movies }))
            }
            SpotlightKind::Year => {
                let (year, movies) = catalog.spotlight_random_year(count).await?;
                print_json(&json!({ "year": year, "movies": movies }))
            }
        },
        Command::Genres => print_json(&catalog.genres().await?),
    }
}
