use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use notice_desk::config::AppConfig;
use notice_desk::error::AppError;
use notice_desk::notices::SystemClock;
use notice_desk::telemetry;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{build_notice_api, AppState};
use crate::routes::with_notice_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let api = build_notice_api(&config, Arc::new(SystemClock), args.seed_csv.as_deref())?;
    if config.payments.webhook_token.is_none() {
        tracing::warn!("payment webhook accepts unsigned calls; set NOTICE_PAYMENT_WEBHOOK_TOKEN");
    }

    let app = with_notice_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        grace_days = config.publication.grace_period_days,
        "notice desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
