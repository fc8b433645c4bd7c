use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{BackendConfig, RetryConfig};
use crate::domain::{
    AnalysisResult, ContentType, ImageCategory, ImageFinding, ImageItem, ProcessingRequest,
    ProcessingStats, UserSettings,
};

use super::retry::with_retry;
use super::{read_json, AnalysisBackend, AnalysisError, BackendInfo};

/// 이미지 AI 컨테이너 어댑터.
///
/// 배치를 multipart form으로 변환해 `POST /predict/batch`로 보낸다.
/// part key가 곧 element id이고, 각 part는 파일명과 MIME 타입을 가진다.
pub struct ImageBackendClient {
    http: Client,
    config: BackendConfig,
    retry: RetryConfig,
    max_image_bytes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictBatchResponse {
    #[serde(default)]
    results: Vec<PredictItem>,
    image_count: Option<ImageCount>,
}

#[derive(Debug, Deserialize)]
struct PredictItem {
    id: String,
    #[allow(dead_code)]
    filename: Option<String>,
    label: Option<String>,
    prob: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageCount {
    processed_images: usize,
    skipped_images: usize,
}

impl ImageBackendClient {
    pub fn new(http: Client, config: BackendConfig, retry: RetryConfig, max_image_bytes: u64) -> Self {
        Self {
            http,
            config,
            retry,
            max_image_bytes,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 전송 전 사전 검증. 실패는 재시도하지 않는 검증 오류로 즉시 확정된다.
    fn validate(&self, items: &[ImageItem]) -> Result<(), AnalysisError> {
        if items.is_empty() {
            return Err(AnalysisError::Validation(
                "이미지 배치가 비어 있습니다".into(),
            ));
        }
        for item in items {
            if !item.is_supported_format() {
                return Err(AnalysisError::Validation(format!(
                    "지원하지 않는 이미지 형식: {} ({})",
                    item.mime_type, item.element_id
                )));
            }
            if !item.is_valid_size(self.max_image_bytes) {
                return Err(AnalysisError::Validation(format!(
                    "이미지 크기 제한 초과: {} bytes ({})",
                    item.size, item.element_id
                )));
            }
        }
        Ok(())
    }

    /// multipart form은 재사용이 안 되므로 시도마다 새로 만든다.
    async fn call_backend(
        &self,
        request_id: &str,
        items: &[ImageItem],
    ) -> Result<PredictBatchResponse, AnalysisError> {
        let mut form = Form::new();
        for (index, item) in items.iter().enumerate() {
            let part = Part::bytes(item.data.clone())
                .file_name(item.resolved_file_name(index))
                .mime_str(&item.mime_type)
                .map_err(|_| {
                    AnalysisError::Validation(format!("잘못된 MIME 타입: {}", item.mime_type))
                })?;
            form = form.part(item.resolved_element_id(request_id, index), part);
        }

        let response = self
            .http
            .post(self.endpoint("/predict/batch"))
            .multipart(form)
            .timeout(self.config.read_timeout)
            .send()
            .await?;

        read_json(response).await
    }

    fn convert(&self, response: PredictBatchResponse, items: &[ImageItem]) -> AnalysisResult {
        let findings: Vec<ImageFinding> = response
            .results
            .iter()
            .map(|item| {
                let category = item
                    .label
                    .as_deref()
                    .map(ImageCategory::from_code)
                    .unwrap_or(ImageCategory::Clean);
                ImageFinding {
                    element_id: item.id.clone(),
                    hateful: !category.is_clean(),
                    confidence: item.prob,
                    categories: vec![category],
                    regions: vec![],
                }
            })
            .collect();

        let requested = items.len();
        let succeeded = response
            .image_count
            .as_ref()
            .map(|c| c.processed_images)
            .unwrap_or(findings.len());
        let failed = response
            .image_count
            .as_ref()
            .map(|c| c.skipped_images)
            .unwrap_or_else(|| requested.saturating_sub(findings.len()));
        let flagged = findings.iter().filter(|f| f.hateful).count();

        AnalysisResult {
            success: true,
            content_type: ContentType::Image,
            image_findings: findings,
            text_findings: vec![],
            stats: ProcessingStats {
                requested,
                succeeded,
                failed,
                flagged,
            },
        }
    }
}

#[async_trait]
impl AnalysisBackend for ImageBackendClient {
    async fn analyze(
        &self,
        request: &ProcessingRequest,
        _settings: Option<&UserSettings>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let ProcessingRequest::ImageBatch { head, items } = request else {
            return Err(AnalysisError::Validation(
                "이미지 어댑터가 처리할 수 없는 요청 타입입니다".into(),
            ));
        };

        self.validate(items)?;

        tracing::info!(
            target: "backend",
            request_id = %head.request_id,
            images = items.len(),
            "이미지 AI 분석 시작"
        );

        let response = with_retry(&self.retry, "이미지 AI", |_| {
            self.call_backend(&head.request_id, items)
        })
        .await?;

        let result = self.convert(response, items);
        tracing::info!(
            target: "backend",
            request_id = %head.request_id,
            flagged = result.stats.flagged,
            succeeded = result.stats.succeeded,
            "이미지 AI 분석 완료"
        );
        Ok(result)
    }

    async fn is_healthy(&self) -> bool {
        match self
            .http
            .get(self.endpoint("/health"))
            .timeout(self.config.connect_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn supports(&self, content_type: ContentType) -> bool {
        content_type == ContentType::Image
    }

    async fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "image-ai",
            base_url: self.config.base_url.clone(),
            model_version: self.config.model_version.clone(),
            read_timeout_ms: self.config.read_timeout.as_millis() as u64,
            reachable: self.is_healthy().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::{Priority, RequestHead};

    use super::*;

    fn client(max_bytes: u64) -> ImageBackendClient {
        ImageBackendClient::new(
            Client::new(),
            BackendConfig {
                base_url: "http://localhost:8001".into(),
                connect_timeout: Duration::from_secs(1),
                read_timeout: Duration::from_secs(1),
                model_version: "v1.0".into(),
            },
            RetryConfig {
                max_attempts: 1,
                backoff: Duration::from_millis(1),
                jitter: 0.0,
            },
            max_bytes,
        )
    }

    fn png_item(element_id: &str, size: u64) -> ImageItem {
        ImageItem {
            element_id: element_id.into(),
            data: vec![0u8; size as usize],
            mime_type: "image/png".into(),
            size,
            file_name: None,
            metadata: None,
        }
    }

    #[test]
    fn empty_batch_is_a_validation_error() {
        let err = client(1024).validate(&[]).unwrap_err();
        assert!(matches!(err, AnalysisError::Validation(_)));
    }

    #[test]
    fn oversized_and_unsupported_items_fail_validation() {
        let client = client(16);
        assert!(client.validate(&[png_item("a", 32)]).is_err());

        let mut svg = png_item("b", 8);
        svg.mime_type = "image/svg+xml".into();
        assert!(client.validate(&[svg]).is_err());

        assert!(client.validate(&[png_item("c", 8)]).is_ok());
    }

    #[test]
    fn gore_response_becomes_a_flagged_finding() {
        let response = PredictBatchResponse {
            results: vec![PredictItem {
                id: "img-1".into(),
                filename: Some("image_0.png".into()),
                label: Some("gore".into()),
                prob: 0.9,
            }],
            image_count: Some(ImageCount {
                processed_images: 1,
                skipped_images: 0,
            }),
        };
        let items = vec![png_item("img-1", 8)];
        let result = client(1024).convert(response, &items);

        assert!(result.success);
        let finding = &result.image_findings[0];
        assert!(finding.hateful);
        assert_eq!(finding.confidence, 0.9);
        assert_eq!(finding.categories, vec![ImageCategory::Gore]);
        assert_eq!(result.stats.requested, 1);
        assert_eq!(result.stats.flagged, 1);
    }

    #[test]
    fn unknown_label_maps_to_clean_not_error() {
        let response = PredictBatchResponse {
            results: vec![PredictItem {
                id: "img-1".into(),
                filename: None,
                label: Some("mystery".into()),
                prob: 0.4,
            }],
            image_count: None,
        };
        let items = vec![png_item("img-1", 8)];
        let result = client(1024).convert(response, &items);
        assert!(!result.image_findings[0].hateful);
        assert_eq!(result.stats.flagged, 0);
    }

    #[tokio::test]
    async fn text_batch_is_rejected_without_a_network_call() {
        let request = ProcessingRequest::TextBatch {
            head: RequestHead::new(Priority::Normal, "s-1", "https://example.com"),
            items: vec![],
        };
        let err = client(1024).analyze(&request, None).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Validation(_)));
    }
}
