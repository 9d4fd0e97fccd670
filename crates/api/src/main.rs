//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::seed::SeedData;
use saga::{InMemoryDriverDirectory, InMemoryVehicleDirectory, spawn_reconciler};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryAssignmentStore, InMemoryBookingStore, InMemoryRoutePool, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build stores; the directories stay in memory in both modes
    let drivers = InMemoryDriverDirectory::new();
    let vehicles = InMemoryVehicleDirectory::new();
    let seed = config.seed_path.as_deref().map(|path| {
        SeedData::from_path(path).unwrap_or_else(|e| panic!("failed to load seed file: {e}"))
    });

    let state = if let Some(url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .expect("failed to connect to database");
        let store = Arc::new(PostgresStore::new(pool));
        store
            .run_migrations()
            .await
            .expect("failed to run migrations");
        tracing::info!("using PostgreSQL stores");

        if let Some(seed) = seed {
            seed.apply(&*store, &*store, &drivers, &vehicles)
                .await
                .expect("failed to apply seed data");
        }
        api::create_state(
            store.clone(),
            store.clone(),
            store,
            Arc::new(drivers),
            Arc::new(vehicles),
            config.retry_policy(),
        )
    } else {
        let bookings = InMemoryBookingStore::new();
        let pool = InMemoryRoutePool::new();
        tracing::info!("using in-memory stores");

        if let Some(seed) = seed {
            seed.apply(&bookings, &pool, &drivers, &vehicles)
                .await
                .expect("failed to apply seed data");
        }
        api::create_state(
            Arc::new(bookings),
            Arc::new(pool),
            Arc::new(InMemoryAssignmentStore::new()),
            Arc::new(drivers),
            Arc::new(vehicles),
            config.retry_policy(),
        )
    };

    // 4. Finish interrupted sagas in the background
    let reconciler = config.reconcile_interval.map(|period| {
        tracing::info!(?period, "starting reconciler");
        spawn_reconciler(state.orchestrator.clone(), period)
    });

    // 5. Build the application and start the server
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Some(handle) = reconciler {
        handle.abort();
    }
    tracing::info!("server shut down gracefully");
}
