#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use parley_server::api::{self, AppState};
use parley_server::config::Config;
use parley_server::delivery::{DeliveryBus, RedisBus};
use parley_server::services::{
    AuthService, ContactService, DeliveryService, HealthService, MessageService,
};
use parley_server::storage::contact_repo::ContactRepository;
use parley_server::storage::message_repo::MessageRepository;
use parley_server::storage::user_repo::UserRepository;
use parley_server::workers::{FanoutWorker, MessagePurgeWorker};
use parley_server::{storage, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (listener, app, shutdown_tx, shutdown_rx, worker_tasks) = async {
        // Phase 1: Infrastructure
        let pool = storage::init_pool(&config.database).await?;
        sqlx::migrate!().run(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_handler(shutdown_tx.clone());

        let bus: Arc<dyn DeliveryBus> =
            RedisBus::new(&config.delivery, shutdown_rx.clone()).await?;

        // Phase 2: Component wiring
        let users = UserRepository::new();
        let messages = MessageRepository::new();
        let contacts = ContactRepository::new();

        let delivery_service = DeliveryService::new(Arc::clone(&bus), &config.delivery);
        let auth_service = AuthService::new(config.auth.clone(), pool.clone(), users.clone());
        let message_service = MessageService::new(
            pool.clone(),
            messages.clone(),
            contacts.clone(),
            users.clone(),
            delivery_service.clone(),
            config.messaging.clone(),
        );
        let contact_service = ContactService::new(
            pool.clone(),
            users,
            contacts,
            messages.clone(),
            delivery_service.clone(),
            config.messaging.clone(),
        );
        let health_service = HealthService::new(pool.clone(), Arc::clone(&bus));

        let state = AppState {
            config: config.clone(),
            auth_service,
            message_service,
            contact_service,
            delivery_service: delivery_service.clone(),
            health_service,
            shutdown_rx: shutdown_rx.clone(),
        };
        let app = api::app_router(state);

        // Phase 3: Background workers
        let fanout = FanoutWorker::new(Arc::clone(&bus), delivery_service, config.delivery.clone());
        let purge = MessagePurgeWorker::new(pool, messages, config.messaging.clone());

        let worker_tasks = vec![
            tokio::spawn(fanout.run(shutdown_rx.clone())),
            tokio::spawn(purge.run(shutdown_rx.clone())),
        ];

        // Phase 4: Listener
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "listening");

        Ok::<_, anyhow::Error>((listener, app, shutdown_tx, shutdown_rx, worker_tasks))
    }
    .instrument(boot_span)
    .await?;

    let mut serve_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = serve_rx.wait_for(|&s| s).await;
        });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "Server error");
    }

    // Graceful shutdown of background workers
    let _ = shutdown_tx.send(true);
    tokio::select! {
        () = async {
            futures::future::join_all(worker_tasks).await;
        } => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
