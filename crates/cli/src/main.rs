//! Shop Scout CLI - favorites and reviews from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # List favorite shops
//! ss-cli favorites list
//!
//! # Favorite or unfavorite a shop
//! ss-cli favorites toggle shop-1
//!
//! # List a shop's reviews, most liked first
//! ss-cli reviews list shop-1 --sort most-liked
//!
//! # Like or unlike a review
//! ss-cli reviews like shop-1 review-7
//!
//! # Write a review with two photos
//! ss-cli reviews add shop-1 --rating 5 --content "Great espresso" \
//!     --attach front.jpg --attach menu.png
//!
//! # Try everything without touching the backend
//! ss-cli --demo favorites toggle shop-1
//! ```
//!
//! Configuration is read from the environment (see
//! [`shop_scout_client::config`]).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shop_scout_client::ClientConfig;
use shop_scout_core::ReviewSortOrder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "ss-cli")]
#[command(author, version, about = "Shop Scout CLI")]
struct Cli {
    /// Keep every change local, never send mutations to the backend
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage favorite shops
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Read and write shop reviews
    Reviews {
        #[command(subcommand)]
        action: ReviewsAction,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List favorite shops
    List,
    /// Favorite a shop, or unfavorite it if it already is one
    Toggle {
        /// Shop ID
        shop_id: String,
    },
}

#[derive(Subcommand)]
enum ReviewsAction {
    /// List a shop's reviews
    List {
        /// Shop ID
        shop_id: String,

        /// Sort order (`newest`, `oldest`, `most-liked`, `highest-rated`)
        #[arg(short, long, default_value = "newest")]
        sort: ReviewSortOrder,
    },
    /// List your own reviews
    Mine,
    /// Like a review, or unlike it if you already do
    Like {
        /// Shop ID
        shop_id: String,
        /// Review ID
        review_id: String,
    },
    /// Write a review
    Add {
        /// Shop ID
        shop_id: String,

        /// Star rating (1-5)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,

        /// Review text
        #[arg(short, long)]
        content: String,

        /// File to attach (repeatable)
        #[arg(short, long = "attach")]
        attach: Vec<PathBuf>,
    },
}

/// Initialize Sentry error tracking if `SENTRY_DSN` is configured.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry needs the DSN from config and must be up before the subscriber
    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shop_scout_client=info,shop_scout_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(mut config) => {
            config.demo_mode |= cli.demo;
            run(cli.command, &config).await
        }
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // Flush pending Sentry events before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::Context::new(config)?;

    match command {
        Commands::Favorites { action } => match action {
            FavoritesAction::List => commands::favorites::list(&ctx).await?,
            FavoritesAction::Toggle { shop_id } => {
                commands::favorites::toggle(&ctx, &shop_id).await?;
            }
        },
        Commands::Reviews { action } => match action {
            ReviewsAction::List { shop_id, sort } => {
                commands::reviews::list(&ctx, &shop_id, sort).await?;
            }
            ReviewsAction::Mine => commands::reviews::mine(&ctx).await?,
            ReviewsAction::Like { shop_id, review_id } => {
                commands::reviews::like(&ctx, &shop_id, &review_id).await?;
            }
            ReviewsAction::Add {
                shop_id,
                rating,
                content,
                attach,
            } => {
                commands::reviews::add(&ctx, &shop_id, rating, content, &attach).await?;
            }
        },
    }
    Ok(())
}
