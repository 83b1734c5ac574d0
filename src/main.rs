//! GIKonnect Backend
//!
//! Campus REST backend: role-aware events calendar, food venues with the
//! budget genie, mess feedback, cohort timetables and OTP email onboarding,
//! on SQLite persistence.

mod api;
mod auth;
mod calendar;
mod config;
mod db;
mod errors;
mod feed;
mod genie;
mod menu;
mod models;
mod otp;
mod visibility;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use feed::EventFeed;
use menu::Catalog;
use otp::{Mailer, OtpService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub feed: EventFeed,
    pub otp: Arc<OtpService>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, catalog: Catalog) -> Self {
        let mailer = Mailer::from_config(&config);
        let otp = Arc::new(OtpService::new(repo.clone(), mailer, &config));
        Self {
            repo,
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            feed: EventFeed::new(),
            otp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!("Starting GIKonnect Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (GIK_API_PSK). Authentication is disabled!");
    }
    if config.mail_webhook.is_none() {
        tracing::warn!("No mail relay configured (GIK_MAIL_WEBHOOK). OTP codes go to the log");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let catalog = Catalog::load(config.menu_path.as_deref())?;
    tracing::info!(
        "Menu catalog loaded with {} venues and {} items",
        catalog.venues().len(),
        catalog.item_count()
    );

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, config, catalog);
    // Events written before this start count as seen at the current revision
    state.feed.publish(state.repo.get_revision_id().await?);
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Users and onboarding
        .route("/users", post(api::create_user))
        .route("/users/me", get(api::get_me).put(api::update_me))
        .route("/users/{uid}", get(api::get_user))
        .route("/users/{uid}/role", put(api::set_user_role))
        .route("/otp/send", post(api::send_otp))
        .route("/otp/verify", post(api::verify_otp))
        // Events
        .route("/events", get(api::list_events).post(api::create_event))
        .route("/events/upcoming", get(api::upcoming_events))
        .route("/events/calendar", get(api::month_calendar))
        .route("/events/day", get(api::day_events))
        .route("/events/watch", get(api::watch_events))
        .route("/events/{id}", get(api::get_event))
        .route("/events/{id}", delete(api::delete_event))
        // Food
        .route("/venues", get(api::list_venues))
        .route("/venues/{id}", get(api::get_venue))
        .route("/reviews", get(api::list_reviews).post(api::create_review))
        .route("/reviews/{id}", delete(api::delete_review))
        .route("/genie", get(api::genie_recommend))
        // Mess
        .route(
            "/mess/comments",
            get(api::list_mess_comments).post(api::create_mess_comment),
        )
        .route("/mess/comments/{id}", delete(api::delete_mess_comment))
        // Timetable
        .route(
            "/timetable",
            get(api::get_timetable).put(api::update_timetable),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
