use tracing_subscriber::EnvFilter;

use lasertag_server::config::ServerConfig;
use lasertag_server::{build_app, clock};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();
    let addr = config.listen_addr.clone();

    let (app, state) = build_app(config);
    clock::spawn_game_clock(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        },
    };
    tracing::info!(%addr, "laser tag server listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
    }
}
