//! TaskTunes - a self-hosted to-do list and music playlist server

mod api;
mod config;
mod core;
mod db;
mod errors;
mod models;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::api::AppContext;
use crate::core::revocation::InMemoryRevocationStore;
use crate::core::spotify::SpotifyClient;

/// TaskTunes - self-hosted tasks and music
#[derive(Parser, Debug)]
#[command(name = "tasktunes")]
#[command(version)]
#[command(about = "A self-hosted to-do list and music playlist server")]
struct Args {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    // lofty is chatty about malformed tags in otherwise fine files
    let filter =
        tracing_subscriber::EnvFilter::new(format!("{log_level},lofty=error,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("TaskTunes v{} starting...", env!("CARGO_PKG_VERSION"));

    let paths = config::Paths::init(args.config)?;
    info!("Config directory: {:?}", paths.config_dir());

    let settings = config::Settings::load()?;
    if settings.spotify_client_id.is_empty() {
        tracing::warn!(
            "Spotify credentials not configured. \
             Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET to enable search and import."
        );
    }

    db::setup_sqlite().await?;

    let spotify = SpotifyClient::new(
        non_empty(&settings.spotify_client_id),
        non_empty(&settings.spotify_client_secret),
    );
    let cors_origins = settings.cors_origins.clone();
    let context = web::Data::new(AppContext {
        settings,
        revocations: Arc::new(InMemoryRevocationStore::new()),
        spotify,
    });

    let addr = format!("{}:{}", args.host, args.port);
    info!("Server listening on http://{}", addr);

    HttpServer::new(move || {
        let mut cors = if cors_origins.is_empty() {
            Cors::default().allow_any_origin()
        } else {
            Cors::default()
        };
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }
        let cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(context.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(api::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
