use std::{sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use tokio::{task::JoinHandle, time::timeout};

use crate::{
    backend::{AnalysisBackend, ImageBackendClient, TextBackendClient},
    config::{AppConfig, BackendConfig},
    domain::ContentType,
    infrastructure::{
        directories::ResolvedPaths,
        shutdown::{Shutdown, ShutdownReason},
    },
    processing::ProcessingOrchestrator,
    scheduler::SchedulerPool,
    store::{self, ResultCache, SettingsStore},
};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct ModerationApp {
    _paths: ResolvedPaths,
    orchestrator: Arc<ProcessingOrchestrator>,
    settings: SettingsStore,
    image_worker: JoinHandle<()>,
    text_worker: JoinHandle<()>,
    shutdown: Shutdown,
}

impl ModerationApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = store::init_pool(&paths.db_path).await?;
        let settings = SettingsStore::new(pool, config.ttl.settings);
        let cache = Arc::new(ResultCache::new(config.ttl.result_cache));

        let image_backend: Arc<dyn AnalysisBackend> = Arc::new(ImageBackendClient::new(
            build_http_client(&config.image_backend)?,
            config.image_backend.clone(),
            config.retry.clone(),
            config.limits.max_image_bytes,
        ));
        let text_backend: Arc<dyn AnalysisBackend> = Arc::new(TextBackendClient::new(
            build_http_client(&config.text_backend)?,
            config.text_backend.clone(),
            config.retry.clone(),
            config.limits.max_text_chars,
            config.limits.text_threshold,
        ));

        for backend in [&image_backend, &text_backend] {
            let info = backend.info().await;
            tracing::info!(
                target: "app",
                name = info.name,
                base_url = %info.base_url,
                model_version = %info.model_version,
                reachable = info.reachable,
                "AI 백엔드 어댑터 준비 완료"
            );
        }

        let image_pool = SchedulerPool::new(
            ContentType::Image,
            image_backend.clone(),
            config.scheduler.queue_capacity,
        );
        let text_pool = SchedulerPool::new(
            ContentType::Text,
            text_backend.clone(),
            config.scheduler.queue_capacity,
        );
        let image_worker = image_pool.spawn_worker(shutdown.subscribe());
        let text_worker = text_pool.spawn_worker(shutdown.subscribe());

        let orchestrator = Arc::new(ProcessingOrchestrator::new(
            image_pool,
            image_backend,
            config.image_backend.model_version.clone(),
            text_pool,
            text_backend,
            config.text_backend.model_version.clone(),
            settings.clone(),
            cache,
        ));

        Ok(Self {
            _paths: paths,
            orchestrator,
            settings,
            image_worker,
            text_worker,
            shutdown,
        })
    }

    /// 처리 진입점. 전송 계층 어댑터가 이 핸들을 들고 요청을 넘긴다.
    pub fn orchestrator(&self) -> Arc<ProcessingOrchestrator> {
        self.orchestrator.clone()
    }

    pub async fn run(self) -> Result<()> {
        let ModerationApp {
            _paths: _,
            orchestrator,
            settings,
            image_worker,
            text_worker,
            shutdown,
        } = self;

        tracing::info!("컨텐츠 모더레이션 코어 시작");

        let mut shutdown_listener = shutdown.subscribe();
        let shutdown_timeout = Duration::from_secs(5);
        let mut status_interval = tokio::time::interval(STATUS_LOG_INTERVAL);
        status_interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_listener.notified() => {
                    let reason = shutdown_listener
                        .reason()
                        .unwrap_or(ShutdownReason::Drain);
                    tracing::info!(%reason, "종료 신호 감지, 드레인을 시작합니다");
                    break;
                }
                _ = status_interval.tick() => {
                    for status in orchestrator.pool_statuses() {
                        tracing::info!(
                            target: "scheduler",
                            content_type = %status.content_type,
                            queued = status.queued,
                            queued_high = status.queued_high,
                            gate_held = status.gate_held,
                            total_processed = status.total_processed,
                            average_latency_ms = status.average_latency_ms,
                            "풀 상태"
                        );
                    }
                    let evicted = orchestrator.evict_expired_cache();
                    let cache = orchestrator.cache_stats();
                    tracing::info!(
                        target: "cache",
                        entries = cache.entries,
                        hits = cache.hits,
                        misses = cache.misses,
                        evicted,
                        "캐시 상태"
                    );
                }
            }
        }

        shutdown.trigger(ShutdownReason::Drain);

        for (name, worker) in [("image", image_worker), ("text", text_worker)] {
            match timeout(shutdown_timeout, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_panic() => {
                    tracing::error!(target: "scheduler", pool = name, "워커가 패닉으로 종료되었습니다");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(
                        target: "scheduler",
                        pool = name,
                        "워커 종료가 {:?} 내에 완료되지 않았습니다",
                        shutdown_timeout
                    );
                }
            }
        }

        if timeout(shutdown_timeout, settings.close()).await.is_err() {
            tracing::warn!(
                target: "settings",
                "설정 저장소 정리가 {:?} 내에 완료되지 않았습니다",
                shutdown_timeout
            );
        }

        tracing::info!("컨텐츠 모더레이션 코어 종료 완료");
        Ok(())
    }
}

fn build_http_client(backend: &BackendConfig) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(format!("cleanweb-core/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(backend.connect_timeout)
        .build()?)
}
