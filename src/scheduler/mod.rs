use thiserror::Error;

use crate::backend::AnalysisError;
use crate::domain::ContentType;

pub mod pool;

pub use pool::SchedulerPool;

/// 스케줄러 경로에서 나오는 오류. 분석 오류는 원인 그대로 싣고
/// 발생한 컨텐츠 타입을 붙여 전달한다.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("{content_type} 분석 실패: {source}")]
    Analysis {
        content_type: ContentType,
        #[source]
        source: AnalysisError,
    },
    #[error("{content_type} 대기열이 가득 찼습니다 (depth {depth})")]
    QueueFull {
        content_type: ContentType,
        depth: usize,
    },
    #[error("요청이 취소되었습니다: {request_id}")]
    Cancelled {
        content_type: ContentType,
        request_id: String,
    },
    #[error("{content_type} 스케줄러 워커가 응답하지 않습니다")]
    SchedulerUnavailable { content_type: ContentType },
}

impl ProcessingError {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Analysis { content_type, .. }
            | Self::QueueFull { content_type, .. }
            | Self::Cancelled { content_type, .. }
            | Self::SchedulerUnavailable { content_type } => *content_type,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Analysis { source, .. } => source.code(),
            Self::QueueFull { .. } | Self::Cancelled { .. } | Self::SchedulerUnavailable { .. } => {
                "SCHEDULER_ERROR"
            }
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Analysis { source, .. } => source.category(),
            Self::QueueFull { .. } | Self::Cancelled { .. } | Self::SchedulerUnavailable { .. } => {
                "스케줄링 오류"
            }
        }
    }
}

/// 풀 하나의 상태 조회 결과.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub content_type: ContentType,
    pub queued: usize,
    pub queued_high: usize,
    pub queued_normal: usize,
    pub gate_held: bool,
    pub total_processed: u64,
    pub average_latency_ms: u64,
}
