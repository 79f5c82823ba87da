//! HTTP server for the web API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;
use crate::config::Config;
use crate::{Result, TrendError};

/// Seconds between sweeps of idle rate limiters.
const LIMITER_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    limiter: Arc<RateLimitState>,
    cors_origins: Vec<String>,
}

impl WebServer {
    pub fn new(config: &Config, app_state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| TrendError::Config(format!("invalid server address: {e}")))?;
        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            limiter: Arc::new(RateLimitState::new(config.web.rate_limit_per_minute)),
            cors_origins: config.web.cors_origins.clone(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn start_limiter_cleanup_task(limiter: Arc<RateLimitState>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(LIMITER_CLEANUP_INTERVAL_SECS));
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let router = create_router(self.app_state, self.limiter.clone(), &self.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_limiter_cleanup_task(self.limiter);
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;
        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Serve in the background and return the bound address.
    ///
    /// Binding port 0 picks a free port.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = create_router(self.app_state, self.limiter, &self.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("Web server error: {}", e);
            }
        });
        Ok(local_addr)
    }
}
