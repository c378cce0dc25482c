use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use search_rag::core::config::AppPaths;
use search_rag::core::logging;
use search_rag::rag::TracingNotifier;
use search_rag::server;
use search_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths).await?;

    let query = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !query.trim().is_empty() {
        let outcome = state
            .pipeline
            .run(query.trim(), &TracingNotifier)
            .await
            .context("Search round failed")?;
        println!("{}", outcome.answer);
        return Ok(());
    }

    let server_settings = &state.settings.server;
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(server_settings.port);
    let bind_addr = format!("{}:{}", server_settings.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("SEARCH_RAG_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
