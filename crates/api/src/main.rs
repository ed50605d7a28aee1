//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config};
use broker::{DeliveryPolicy, KafkaPublisher, KafkaSubscriber};
use domain::{OrderService, PostgresStore};
use event_log::PostgresEventLog;
use saga::{EventPublisher, PublishWorkerPool, RetrySweeper, all_handlers, spawn_consumers};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
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
    let config = Config::from_env().expect("invalid configuration");

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let events = PostgresEventLog::new(db.clone());
    events
        .run_migrations()
        .await
        .expect("failed to run migrations");
    let store = PostgresStore::new(db);

    let producer = KafkaPublisher::new(&config.broker).expect("failed to create Kafka producer");
    let workers = PublishWorkerPool::new(
        EventPublisher::new(events.clone(), producer, config.publish_retry),
        config.publish_concurrency,
    );

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    let sweeper = RetrySweeper::new(events.clone(), workers.clone(), config.sweeper);
    tasks.push(tokio::spawn(sweeper.run(cancel.clone())));

    if config.run_consumers {
        let subscriber = Arc::new(KafkaSubscriber::new(
            config.broker.clone(),
            DeliveryPolicy::default(),
        ));
        tasks.extend(spawn_consumers(
            subscriber,
            all_handlers(store.clone()),
            cancel.clone(),
        ));
    } else {
        tracing::info!("consumers disabled");
    }

    let orders = OrderService::new(store, Arc::new(workers.clone()));
    let state = Arc::new(AppState::new(orders, events));
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

    cancel.cancel();
    futures_util::future::join_all(tasks).await;
    workers.shutdown().await;

    tracing::info!("server shut down gracefully");
}
