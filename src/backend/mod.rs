use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{AnalysisResult, ContentType, ProcessingRequest, UserSettings};

pub mod image;
pub mod retry;
pub mod text;

pub use image::ImageBackendClient;
pub use text::TextBackendClient;

/// AI 컨테이너 호출에서 나올 수 있는 오류 분류.
///
/// `Server`/`Transport`만 재시도 대상이다. `Validation`과 `Client`(4xx)는
/// 다시 보내도 같은 답이 돌아오므로 즉시 실패로 확정한다.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("요청 검증 실패: {0}")]
    Validation(String),
    #[error("AI 백엔드 4xx 응답: {status} {body}")]
    Client { status: u16, body: String },
    #[error("AI 백엔드 5xx 응답: {status} {body}")]
    Server { status: u16, body: String },
    #[error("AI 백엔드 통신 오류: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("재시도 {attempts}회 모두 실패: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Transport(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Client { .. } => "CLIENT_ERROR",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Exhausted { .. } => "RETRY_EXHAUSTED",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "검증 오류",
            Self::Client { .. } => "클라이언트 오류",
            Self::Server { .. } => "서버 오류",
            Self::Transport(_) | Self::Exhausted { .. } => "통신 오류",
        }
    }
}

/// 어댑터 설명 레코드. 상태 조회와 기동 로그에 쓰인다.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub name: &'static str,
    pub base_url: String,
    pub model_version: String,
    pub read_timeout_ms: u64,
    pub reachable: bool,
}

/// 컨텐츠 타입별 AI 컨테이너 어댑터.
///
/// 텍스트 컨테이너는 추론 단계에서 카테고리 필터를 직접 적용하므로 호출 전에
/// 사용자 설정이 필요하고, 이미지 컨테이너는 설정과 무관하게 분석한다.
/// `settings`는 그래서 선택 인자다.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(
        &self,
        request: &ProcessingRequest,
        settings: Option<&UserSettings>,
    ) -> Result<AnalysisResult, AnalysisError>;

    async fn is_healthy(&self) -> bool;

    fn supports(&self, content_type: ContentType) -> bool;

    async fn info(&self) -> BackendInfo;
}

/// 응답 상태를 오류 분류에 맞춰 해석하고 본문을 JSON으로 읽는다.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AnalysisError> {
    let status = response.status();
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnalysisError::Client {
            status: status.as_u16(),
            body,
        });
    }
    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnalysisError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_and_transport_errors_are_retryable() {
        assert!(AnalysisError::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!AnalysisError::Client {
            status: 422,
            body: String::new()
        }
        .is_retryable());
        assert!(!AnalysisError::Validation("empty".into()).is_retryable());
        assert!(!AnalysisError::Exhausted {
            attempts: 3,
            source: Box::new(AnalysisError::Server {
                status: 500,
                body: String::new()
            }),
        }
        .is_retryable());
    }

    #[test]
    fn error_codes_match_taxonomy() {
        assert_eq!(AnalysisError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(
            AnalysisError::Client { status: 400, body: String::new() }.code(),
            "CLIENT_ERROR"
        );
        assert_eq!(
            AnalysisError::Exhausted {
                attempts: 3,
                source: Box::new(AnalysisError::Server { status: 500, body: String::new() }),
            }
            .code(),
            "RETRY_EXHAUSTED"
        );
    }
}
