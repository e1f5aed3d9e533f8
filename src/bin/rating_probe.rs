//! rating-probe: exercise the rating cache against a live recipe backend.
//!
//! Useful for checking what screens will see: which ids resolve, which
//! fall back to "no ratings", and how the bulk preload behaves.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use recipe_ratings::config::ProbeConfig;
use recipe_ratings::{RatingAggregate, RatingCache};

/// Probe the recipe backend through the rating cache.
#[derive(Parser)]
#[command(name = "rating-probe")]
#[command(version)]
#[command(about = "Inspect recipe ratings through the client cache")]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file).
    #[arg(long, env = "RECIPE_RATINGS_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load ratings for the given recipes concurrently.
    Get {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Run the bulk preload, then print the given recipes.
    All { ids: Vec<String> },
    /// Force a fresh fetch of one recipe.
    Refresh { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ProbeConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.base_url {
        config.backend.base_url = url;
    }
    info!(base_url = %config.backend.base_url, "rating-probe starting");

    let cache = config.build_cache()?;

    match cli.command {
        Command::Get { ids } => {
            cache.load_multiple_ratings(&ids).await;
            print_ratings(&cache, &ids);
        }
        Command::All { ids } => {
            cache.load_all_ratings().await;
            println!(
                "{} recipes rated ({} cached)",
                cache.rated_len(),
                cache.len()
            );
            print_ratings(&cache, &ids);
        }
        Command::Refresh { id } => {
            let rating = cache.load_and_update_rating(&id).await;
            println!("{id}\t{}", describe(rating));
        }
    }

    Ok(())
}

fn print_ratings(cache: &RatingCache, ids: &[String]) {
    for id in ids {
        match cache.get_rating(id) {
            Some(rating) => println!("{id}\t{}", describe(rating)),
            None => println!("{id}\tunknown"),
        }
    }
}

fn describe(rating: RatingAggregate) -> String {
    match rating.stars() {
        Some(average) => format!("{average:.2} ({} votes)", rating.vote_count),
        None => "no ratings yet".to_string(),
    }
}
