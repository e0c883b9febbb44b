use crate::config::Config;
use crate::startup::{AppState, router};
use std::net::SocketAddr;

#[macro_use]
extern crate tracing;

mod auth;
mod config;
mod error;
mod identity;
mod polls;
mod seed;
mod startup;
mod store;
mod voting;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    // initialize tracing
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let app_state = AppState::from_config(&config).await?;
    let app = router(app_state);

    let addr = SocketAddr::from((config.bind_addr, config.port));
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
