use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::backend::AnalysisBackend;
use crate::domain::{
    AnalysisResult, ContentType, ErrorInfo, ProcessingRequest, ProcessingResult, UserSettings,
};
use crate::scheduler::{PoolStatus, ProcessingError, SchedulerPool};
use crate::store::{ResultCache, SettingsStore};

use super::dispatch::{DirectDispatch, Dispatcher, SchedulerDispatch};
use super::{post, pre};

/// 타입별 처리 경로. 스케줄러 경유와 직접 호출 중 하나를
/// 호출 시점의 풀 헬스 판정으로 고른다.
struct Route {
    pool: Arc<SchedulerPool>,
    scheduled: SchedulerDispatch,
    direct: DirectDispatch,
    model_version: String,
}

impl Route {
    fn new(
        pool: Arc<SchedulerPool>,
        backend: Arc<dyn AnalysisBackend>,
        model_version: String,
    ) -> Self {
        Self {
            scheduled: SchedulerDispatch::new(pool.clone()),
            direct: DirectDispatch::new(backend),
            pool,
            model_version,
        }
    }

    fn pick(&self) -> &dyn Dispatcher {
        if self.pool.is_healthy() {
            &self.scheduled
        } else {
            tracing::warn!(
                target: "orchestrator",
                content_type = %self.pool.content_type(),
                "스케줄러 풀이 비정상 상태, 직접 호출로 우회합니다"
            );
            &self.direct
        }
    }
}

/// 전송 계층이 부르는 단일 동기 진입점.
///
/// `process`는 절대 실패를 밖으로 던지지 않는다. 검증 실패든 백엔드
/// 장애든 스케줄링 오류든 전부 `ProcessingResult.error`로 실어 나른다.
pub struct ProcessingOrchestrator {
    image: Route,
    text: Route,
    settings: SettingsStore,
    cache: Arc<ResultCache>,
}

impl ProcessingOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        image_pool: Arc<SchedulerPool>,
        image_backend: Arc<dyn AnalysisBackend>,
        image_model_version: String,
        text_pool: Arc<SchedulerPool>,
        text_backend: Arc<dyn AnalysisBackend>,
        text_model_version: String,
        settings: SettingsStore,
        cache: Arc<ResultCache>,
    ) -> Self {
        debug_assert!(image_backend.supports(ContentType::Image));
        debug_assert!(text_backend.supports(ContentType::Text));
        Self {
            image: Route::new(image_pool, image_backend, image_model_version),
            text: Route::new(text_pool, text_backend, text_model_version),
            settings,
            cache,
        }
    }

    pub async fn process(&self, request: ProcessingRequest) -> ProcessingResult {
        let started = Instant::now();
        let request_id = request.request_id().to_string();
        let content_type = request.content_type();
        let session_id = request.session_id().to_string();

        tracing::info!(
            target: "orchestrator",
            request_id = %request_id,
            content_type = %content_type,
            items = request.item_count(),
            session_id = %session_id,
            "배치 처리 시작"
        );

        let settings = self.settings.get(&session_id).await;
        let route = self.route(content_type);
        let cache_key = pre::cache_key(&request, &route.model_version);

        // 캐시는 설정 적용 이전의 원본 결과를 담는다. 히트여도 현재
        // 세션의 설정으로 후처리를 다시 거친다.
        if let Some(key) = cache_key.as_deref() {
            if let Some(raw) = self.cache.get(key) {
                return self.finish(request_id, raw, settings.as_ref(), started, true);
            }
        }

        // 텍스트 백엔드는 추론 중에 필터 맵을 쓰므로 설정을 호출 전에
        // 넘긴다. 이미지 설정은 후처리에서만 쓰인다.
        let dispatch_settings = match content_type {
            ContentType::Text => settings.clone(),
            ContentType::Image => None,
        };

        let dispatcher = route.pick();
        match dispatcher.dispatch(request, dispatch_settings).await {
            Ok(raw) => {
                if let Some(key) = cache_key {
                    self.cache.put(key, raw.clone(), route.model_version.clone());
                }
                self.finish(request_id, raw, settings.as_ref(), started, false)
            }
            Err(err) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::error!(
                    target: "orchestrator",
                    request_id = %request_id,
                    content_type = %content_type,
                    path = dispatcher.name(),
                    elapsed_ms,
                    error = %err,
                    "배치 처리 실패"
                );
                ProcessingResult {
                    request_id,
                    success: false,
                    completed_at: Utc::now(),
                    analysis: None,
                    payload: None,
                    error: Some(error_info(&err)),
                    processing_time_ms: elapsed_ms,
                    from_cache: false,
                }
            }
        }
    }

    fn finish(
        &self,
        request_id: String,
        raw: AnalysisResult,
        settings: Option<&UserSettings>,
        started: Instant,
        from_cache: bool,
    ) -> ProcessingResult {
        let applied = post::apply_settings(&raw, settings);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let payload = post::build_payload(&applied, elapsed_ms);

        tracing::info!(
            target: "orchestrator",
            request_id = %request_id,
            content_type = %applied.content_type,
            flagged = applied.stats.flagged,
            elapsed_ms,
            from_cache,
            "배치 처리 완료"
        );

        ProcessingResult {
            request_id,
            success: true,
            completed_at: Utc::now(),
            analysis: Some(applied),
            payload: Some(payload),
            error: None,
            processing_time_ms: elapsed_ms,
            from_cache,
        }
    }

    fn route(&self, content_type: ContentType) -> &Route {
        match content_type {
            ContentType::Image => &self.image,
            ContentType::Text => &self.text,
        }
    }

    /// 큐에서 아직 나가지 않은 요청을 취소한다. 이미 백엔드로 나간
    /// 호출은 중단하지 않는다.
    pub fn cancel(&self, content_type: ContentType, request_id: &str) -> bool {
        self.route(content_type).pool.cancel(request_id)
    }

    pub fn is_system_healthy(&self) -> bool {
        self.image.pool.is_healthy() && self.text.pool.is_healthy()
    }

    pub fn pool_statuses(&self) -> [PoolStatus; 2] {
        [self.image.pool.status(), self.text.pool.status()]
    }

    pub fn cache_stats(&self) -> crate::store::CacheStats {
        self.cache.stats()
    }

    pub fn evict_expired_cache(&self) -> usize {
        self.cache.evict_expired()
    }
}

fn error_info(err: &ProcessingError) -> ErrorInfo {
    ErrorInfo {
        code: err.code().to_string(),
        message: err.to_string(),
        category: err.category().to_string(),
    }
}
