use crate::auth::{echo, health, login};
use crate::config::Config;
use crate::error::SeedError;
use crate::identity::Accounts;
use crate::polls::{close_poll, list_closed_polls, list_open_polls, poll_results, vote_on_poll};
use crate::seed::Seed;
use crate::voting::VotingService;
use axum::{
    Router,
    extract::Extension,
    http::{
        Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::{any::Any, sync::Arc};
use tokio::time::{Duration, interval};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub voting: Arc<VotingService>,
    pub accounts: Arc<Accounts>,
}

impl AppState {
    pub fn new(accounts: Accounts, voting: VotingService) -> Self {
        AppState {
            voting: Arc::new(voting),
            accounts: Arc::new(accounts),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, SeedError> {
        let seed = Seed::load(config.seed_file.as_deref())?;
        let (accounts, voting) = seed.build(&config.admins).await?;
        let state = AppState::new(accounts, voting);

        if config.auto_close {
            spawn_poll_closer(Arc::clone(&state.voting), config.close_interval);
        }

        Ok(state)
    }
}

/// Periodically closes polls whose closing time has passed.
fn spawn_poll_closer(voting: Arc<VotingService>, period: Duration) {
    info!("Closing expired polls every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut interval = interval(period);
        loop {
            interval.tick().await;
            let now = chrono::Local::now().naive_local();
            for poll_id in voting.store().close_expired(now).await {
                info!("Poll {poll_id} reached its closing time and was closed");
            }
        }
    });
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/usuarios/api/login/", post(login))
        .route("/usuarios/api/test/", post(echo))
        .route("/votaciones/api/v1/abiertas/", get(list_open_polls))
        .route("/votaciones/api/v1/cerradas/", get(list_closed_polls))
        .route("/votaciones/api/v1/:id/votar/", post(vote_on_poll))
        .route("/votaciones/api/v1/:id/resultados/", get(poll_results))
        .route("/votaciones/api/v1/:id/cerrar/", post(close_poll))
        .fallback(handler_404)
        .layer(Extension(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION]),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

fn handle_panic(_: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
