use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use slotbook_api::catalog::InMemoryCatalog;
use slotbook_api::services::checkout::{CheckoutOrchestrator, InProcessGateway};
use slotbook_api::services::{
    AvailabilityExpander, BookingWindowPolicy, CapacityTracker, CouponValidator,
};
use slotbook_api::{config, events, handlers, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let (event_sender, receiver) = events::channel(cfg.event_buffer);
    tokio::spawn(events::process_events(receiver));

    let catalog = InMemoryCatalog::new();
    let catalog_service: Arc<dyn slotbook_api::catalog::CatalogService> = catalog.clone();
    let identity: Arc<dyn slotbook_api::catalog::IdentityService> = catalog;
    let capacity = Arc::new(CapacityTracker::new());
    let policy = BookingWindowPolicy::new(cfg.advance_horizon_days);
    let checkout = Arc::new(CheckoutOrchestrator::new(
        catalog_service.clone(),
        capacity.clone(),
        policy,
        Arc::new(InProcessGateway),
        event_sender.clone(),
        cfg.payment_wait_secs,
        cfg.utc_offset_minutes,
        cfg.currency.clone(),
    ));

    // Background sweep for checkouts stuck awaiting payment.
    let sweeper = checkout.clone();
    let sweep_interval = Duration::from_secs(cfg.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let swept = sweeper.expire_stale_sessions(chrono::Utc::now()).await;
            if swept > 0 {
                info!(swept, "expired stale checkout sessions");
            }
        }
    });

    let state = AppState {
        config: cfg.clone(),
        event_sender,
        catalog: catalog_service.clone(),
        identity,
        expander: AvailabilityExpander::new(),
        policy,
        capacity,
        coupons: Arc::new(CouponValidator::new(catalog_service)),
        checkout,
    };

    let app = handlers::routes(state);
    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
