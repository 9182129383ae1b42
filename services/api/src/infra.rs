use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use notice_desk::config::AppConfig;
use notice_desk::error::AppError;
use notice_desk::notices::{
    CallerIdentity, Clock, InMemoryNoticeRepository, NoticeApi, NoticeImporter, NoticeLifecycle,
    PublicScope, PublicationPolicy, PublicationQueryEngine, ReferenceAllocator,
};
use tracing::info;

/// Identity used when replaying a CSV backlog.
pub(crate) const SEED_MODERATOR: &str = "seed-import";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type MemoryNoticeApi = NoticeApi<InMemoryNoticeRepository>;

/// Wire the lifecycle and query engine over one shared in-memory store.
pub(crate) fn build_notice_api(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    seed_csv: Option<&Path>,
) -> Result<Arc<MemoryNoticeApi>, AppError> {
    let policy = PublicationPolicy::from(&config.publication);
    let repository = Arc::new(InMemoryNoticeRepository::default());
    let queries =
        PublicationQueryEngine::new(repository.clone(), clock.clone(), policy.max_page_size);
    let lifecycle =
        NoticeLifecycle::with_parts(repository, ReferenceAllocator::random(), clock, policy);

    if let Some(path) = seed_csv {
        let summary = NoticeImporter::from_path(
            path,
            &lifecycle,
            &CallerIdentity::moderator(SEED_MODERATOR),
        )?;
        info!(
            path = %path.display(),
            submitted = summary.submitted,
            "seeded notice store"
        );
    }

    let api = NoticeApi::new(lifecycle, queries)
        .with_webhook_token(config.payments.webhook_token.clone());
    Ok(Arc::new(api))
}

pub(crate) fn parse_scope(raw: &str) -> Result<PublicScope, String> {
    PublicScope::parse(raw).map_err(|err| format!("{err}; expected 'confirmed' or 'published'"))
}
