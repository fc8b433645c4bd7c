use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::AnalysisBackend;
use crate::domain::{AnalysisResult, ProcessingRequest, UserSettings};
use crate::scheduler::{ProcessingError, SchedulerPool};

/// 디스패치 전략. 스케줄러 경유와 직접 호출이 같은 인터페이스 뒤에 있어,
/// 오케스트레이터는 호출 시점의 헬스 판정으로 하나를 고르기만 한다.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(
        &self,
        request: ProcessingRequest,
        settings: Option<UserSettings>,
    ) -> Result<AnalysisResult, ProcessingError>;

    fn name(&self) -> &'static str;
}

/// 우선순위 큐와 admission 게이트를 거치는 기본 경로.
pub struct SchedulerDispatch {
    pool: Arc<SchedulerPool>,
}

impl SchedulerDispatch {
    pub fn new(pool: Arc<SchedulerPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Dispatcher for SchedulerDispatch {
    async fn dispatch(
        &self,
        request: ProcessingRequest,
        settings: Option<UserSettings>,
    ) -> Result<AnalysisResult, ProcessingError> {
        self.pool.schedule_and_process(request, settings).await
    }

    fn name(&self) -> &'static str {
        "scheduler"
    }
}

/// 큐를 우회해 어댑터를 바로 부르는 fallback 경로.
pub struct DirectDispatch {
    backend: Arc<dyn AnalysisBackend>,
}

impl DirectDispatch {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Dispatcher for DirectDispatch {
    async fn dispatch(
        &self,
        request: ProcessingRequest,
        settings: Option<UserSettings>,
    ) -> Result<AnalysisResult, ProcessingError> {
        let content_type = request.content_type();
        self.backend
            .analyze(&request, settings.as_ref())
            .await
            .map_err(|source| ProcessingError::Analysis {
                content_type,
                source,
            })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
