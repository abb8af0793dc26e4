use crate::cli::ServeArgs;
use crate::infra::{demo_clients, AppState};
use crate::routes::with_questionnaire_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use comply_ai::config::AppConfig;
use comply_ai::error::AppError;
use comply_ai::telemetry;
use comply_ai::workflows::questionnaire::{
    InMemoryQuestionnaireRepository, PollPolicy, QuestionnaireService,
};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryQuestionnaireRepository::default());
    let (_portal, clients) = demo_clients();
    let policy = PollPolicy::from(&config.generation);
    let service = Arc::new(QuestionnaireService::new(repository, clients, policy));

    let app = with_questionnaire_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "questionnaire workflow orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
