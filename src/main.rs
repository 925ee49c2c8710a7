use std::{process, sync::Arc};

use skillbridge::{
    application::{error::AppError, rank::RankService, shortage::ShortageService},
    cache::{Cache, CacheAdmin, InMemoryStore, SharedStore, SingleFlight},
    config::{self, StoreBackend},
    infra::{
        db::{self, PgRankSource, PgShortageSource},
        error::InfraError,
        http::{self, AdminState, ApiState},
        redis::RedisStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Cache(args) => run_cache(settings, args).await,
    }
}

async fn connect_store(settings: &config::Settings) -> Result<Arc<dyn SharedStore>, AppError> {
    match settings.store.backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&settings.store.redis_url)
                .await
                .map_err(|err| {
                    AppError::from(InfraError::configuration(format!(
                        "shared store unreachable: {err}"
                    )))
                })?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; single-flight covers this process only");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = connect_store(&settings).await?;
    let cache = Cache::new(store.clone());
    let single_flight = SingleFlight::new(cache.clone(), settings.cache.clone());

    let database_url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url is required for serve",
        ))
    })?;
    let pool = db::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let shortage = Arc::new(ShortageService::new(
        cache.clone(),
        single_flight.clone(),
        Arc::new(PgShortageSource::new(pool.clone())),
    ));
    let rank = Arc::new(RankService::new(
        cache.clone(),
        Arc::new(PgRankSource::new(pool)),
    ));

    let api_state = ApiState {
        shortage: shortage.clone(),
        rank,
    };
    let admin_state = AdminState {
        cache_admin: CacheAdmin::new(store),
        shortage,
        secret: settings.admin.secret.as_deref().map(Arc::from),
        purge_batch: settings.cache.purge_batch_non_zero(),
    };
    if admin_state.secret.is_none() {
        warn!("No admin secret configured; the admin surface is disabled");
    }

    let router = http::build_router(api_state, admin_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_cache(settings: config::Settings, args: config::CacheArgs) -> Result<(), AppError> {
    let store = connect_store(&settings).await?;
    let admin = CacheAdmin::new(store);

    match args.command {
        config::CacheCommand::Purge(purge) => {
            let batch = purge
                .batch
                .unwrap_or_else(|| settings.cache.purge_batch_non_zero());
            let deleted = admin
                .del_by_pattern(&purge.pattern, batch)
                .await
                .map_err(skillbridge::cache::CacheError::from)?;
            info!(pattern = %purge.pattern, deleted, "Purge finished");
        }
        config::CacheCommand::Flush(flush) => {
            if !flush.yes {
                return Err(AppError::unexpected(
                    "cache flush wipes the entire shared store; re-run with --yes to confirm",
                ));
            }
            admin
                .flush_all()
                .await
                .map_err(skillbridge::cache::CacheError::from)?;
            info!("Shared store flushed");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to install shutdown signal handler");
        return;
    }
    info!("Shutdown signal received");
}
