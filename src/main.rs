use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use trendfeed::sources::{EnrichmentSettings, HttpFetcher};
use trendfeed::{
    AppState, Config, ConfigResolver, Database, DefaultAdapterFactory, FeedService,
    FreshnessOrchestrator, MemoryCache, Scheduler, WebServer,
};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = trendfeed::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        trendfeed::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> trendfeed::Result<()> {
    config.validate()?;
    info!("trendfeed starting");

    let db = Database::open(&config.database.path).await?;
    let http = HttpFetcher::new(&config.fetch)?;
    let factory = Arc::new(DefaultAdapterFactory::new(
        http,
        EnrichmentSettings::from(&config.fetch),
    ));

    let resolver = ConfigResolver::new(db.clone(), MemoryCache::new());
    let orchestrator = FreshnessOrchestrator::from_config(db.clone(), factory, &config);
    let feed = FeedService::from_config(resolver.clone(), orchestrator.clone(), &config);
    let tasks = orchestrator.tasks().clone();

    let shutdown = CancellationToken::new();
    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = Scheduler::from_config(resolver, orchestrator, &config);
        let token = shutdown.clone();
        Some(tokio::spawn(async move { scheduler.run(token).await }))
    } else {
        info!("Background scheduler disabled");
        None
    };

    let server = WebServer::new(&config, AppState::new(db, feed))?;
    info!("Serving on {}", server.addr());

    let token = shutdown.clone();
    let signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown requested");
        token.cancel();
    };
    server.run(signal).await?;

    shutdown.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    info!(pending = tasks.pending(), "Waiting for background tasks");
    tasks.wait_idle().await;
    info!("trendfeed stopped");
    Ok(())
}
