use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use shared::config::LiveConfig;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub mod database;
pub mod handlers;

use handlers::http::{Router, build_router};
use handlers::sse::ClientRegistry;

/// Everything a request handler can reach. Cheap to clone; every field is
/// a shared handle.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: LiveConfig,
    pub db: SqlitePool,
    /// Open SSE subscribers for this server instance.
    pub registry: Arc<ClientRegistry>,
    /// Unix seconds at startup.
    pub started_at: i64,
}

impl AppState {
    pub fn new(config: LiveConfig, db: SqlitePool) -> Self {
        Self {
            config,
            db,
            registry: Arc::new(ClientRegistry::new()),
            started_at: Utc::now().timestamp(),
        }
    }
}

/// Accept connections until the task is dropped.
///
/// Each connection runs on its own task and holds one permit from a
/// semaphore sized by `server.max_connections`; once the permits run out,
/// new sockets wait in the accept backlog.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let max_connections = state.config.read().await.server.max_connections;
    let permits = Arc::new(Semaphore::new(max_connections.max(1)));
    let router = Arc::new(build_router());

    info!(
        "Listening on http://{} (max {} connections)",
        listener.local_addr()?,
        max_connections
    );

    loop {
        let permit = permits.clone().acquire_owned().await?;

        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        debug!("Connection from {}", peer);

        let io = TokioIo::new(stream);
        let router = router.clone();
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let router: Arc<Router> = router.clone();
                let state = state.clone();
                async move { router.handle(req, state).await }
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection from {}: {:?}", peer, err);
            }
            drop(permit);
        });
    }
}
