use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, RetryConfig};
use crate::domain::{
    AnalysisResult, ContentType, FlaggedRange, ProcessingRequest, ProcessingStats, TextCategory,
    TextFinding, TextItem, UserSettings, FILTERABLE_TEXT_CATEGORIES,
};

use super::retry::with_retry;
use super::{read_json, AnalysisBackend, AnalysisError, BackendInfo};

/// 텍스트 AI 컨테이너 어댑터.
///
/// 배치를 JSON 문서 하나로 변환해 `POST /filter_page`로 보낸다. 세션의
/// 카테고리 필터 맵을 요청에 실어 보내므로 컨테이너가 추론 단계에서
/// 바로 필터를 적용한다.
pub struct TextBackendClient {
    http: Client,
    config: BackendConfig,
    retry: RetryConfig,
    max_text_chars: usize,
    default_threshold: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterPageRequest {
    page_url: String,
    text_elements: Vec<TextElement>,
    text_filter_category: BTreeMap<&'static str, bool>,
    threshold: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextElement {
    element_id: String,
    texts: Vec<TextSpan>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextSpan {
    text: String,
    s_idx: usize,
    e_idx: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterPageResponse {
    #[allow(dead_code)]
    page_url: Option<String>,
    #[serde(default)]
    filtered_elements: Vec<FilteredElement>,
    #[allow(dead_code)]
    processing_time: Option<f64>,
    #[allow(dead_code)]
    total_texts: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilteredElement {
    element_id: String,
    #[serde(default)]
    filtered_texts: Vec<FilteredText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilteredText {
    #[allow(dead_code)]
    text: Option<String>,
    s_idx: usize,
    e_idx: usize,
    #[serde(default)]
    detected_labels: Vec<String>,
    #[serde(default)]
    confidence: HashMap<String, f64>,
}

impl TextBackendClient {
    pub fn new(
        http: Client,
        config: BackendConfig,
        retry: RetryConfig,
        max_text_chars: usize,
        default_threshold: f64,
    ) -> Self {
        Self {
            http,
            config,
            retry,
            max_text_chars,
            default_threshold,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn validate(&self, items: &[TextItem]) -> Result<(), AnalysisError> {
        if items.is_empty() {
            return Err(AnalysisError::Validation(
                "텍스트 배치가 비어 있습니다".into(),
            ));
        }
        for item in items {
            if !item.has_content() {
                return Err(AnalysisError::Validation(format!(
                    "빈 텍스트가 포함되어 있습니다 ({})",
                    item.element_id
                )));
            }
            if !item.is_valid_length(self.max_text_chars) {
                return Err(AnalysisError::Validation(format!(
                    "텍스트 길이 제한 초과 ({})",
                    item.element_id
                )));
            }
        }
        Ok(())
    }

    /// 세션 설정을 컨테이너가 이해하는 코드→bool 맵으로 해석한다.
    /// 설정이 없으면 전 카테고리를 켠다.
    /// 분류되지 않은 사용자에게는 노출보다 차단이 안전하다.
    fn filter_map(&self, settings: Option<&UserSettings>) -> BTreeMap<&'static str, bool> {
        let mut map: BTreeMap<&'static str, bool> = FILTERABLE_TEXT_CATEGORIES
            .iter()
            .filter_map(|category| category.backend_code())
            .map(|code| (code, true))
            .collect();

        if let Some(block) = settings.and_then(|s| s.active_text_filter()) {
            for value in map.values_mut() {
                *value = false;
            }
            for category in &block.enabled_categories {
                if let Some(code) = category.backend_code() {
                    map.insert(code, true);
                }
            }
        }
        map
    }

    fn threshold(&self, settings: Option<&UserSettings>) -> f64 {
        settings
            .and_then(|s| s.active_text_filter())
            .map(|block| block.sensitivity)
            .unwrap_or(self.default_threshold)
    }

    fn build_request(
        &self,
        page_url: &str,
        items: &[TextItem],
        settings: Option<&UserSettings>,
    ) -> FilterPageRequest {
        FilterPageRequest {
            page_url: page_url.to_string(),
            text_elements: items
                .iter()
                .map(|item| TextElement {
                    element_id: item.element_id.clone(),
                    texts: vec![TextSpan {
                        text: item.content.clone(),
                        s_idx: 0,
                        e_idx: item.content.chars().count(),
                    }],
                })
                .collect(),
            text_filter_category: self.filter_map(settings),
            threshold: self.threshold(settings),
        }
    }

    async fn call_backend(
        &self,
        request: &FilterPageRequest,
    ) -> Result<FilterPageResponse, AnalysisError> {
        let response = self
            .http
            .post(self.endpoint("/filter_page"))
            .json(request)
            .timeout(self.config.read_timeout)
            .send()
            .await?;

        read_json(response).await
    }

    fn convert(&self, response: FilterPageResponse, items: &[TextItem]) -> AnalysisResult {
        let lengths: HashMap<&str, usize> = items
            .iter()
            .map(|item| (item.element_id.as_str(), item.content.chars().count()))
            .collect();

        let findings: Vec<TextFinding> = response
            .filtered_elements
            .into_iter()
            .map(|element| {
                let ranges = element
                    .filtered_texts
                    .iter()
                    .map(|text| FlaggedRange {
                        start: text.s_idx,
                        end: text.e_idx,
                        categories: text
                            .detected_labels
                            .iter()
                            .map(|label| TextCategory::from_code(label))
                            .collect(),
                        // 여러 카테고리 중 가장 높은 신뢰도를 대표값으로 쓴다.
                        confidence: text
                            .confidence
                            .values()
                            .copied()
                            .fold(0.0_f64, f64::max),
                    })
                    .collect();
                let original_length = lengths.get(element.element_id.as_str()).copied().unwrap_or(0);
                TextFinding {
                    element_id: element.element_id,
                    ranges,
                    original_length,
                }
            })
            .collect();

        let requested = items.len();
        let flagged = findings.iter().filter(|f| !f.ranges.is_empty()).count();

        AnalysisResult {
            success: true,
            content_type: ContentType::Text,
            image_findings: vec![],
            text_findings: findings,
            stats: ProcessingStats {
                requested,
                // 응답에는 플래그된 요소만 실려 온다. 배치 호출이 성공했으면
                // 깨끗한 요소도 분석을 통과한 것이므로 전부 succeeded다.
                succeeded: requested,
                failed: 0,
                flagged,
            },
        }
    }
}

#[async_trait]
impl AnalysisBackend for TextBackendClient {
    async fn analyze(
        &self,
        request: &ProcessingRequest,
        settings: Option<&UserSettings>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let ProcessingRequest::TextBatch { head, items } = request else {
            return Err(AnalysisError::Validation(
                "텍스트 어댑터가 처리할 수 없는 요청 타입입니다".into(),
            ));
        };

        self.validate(items)?;

        tracing::info!(
            target: "backend",
            request_id = %head.request_id,
            texts = items.len(),
            has_settings = settings.is_some(),
            "텍스트 AI 분석 시작"
        );

        let wire_request = self.build_request(&head.page_url, items, settings);
        let response = with_retry(&self.retry, "텍스트 AI", |_| {
            self.call_backend(&wire_request)
        })
        .await?;

        let result = self.convert(response, items);
        tracing::info!(
            target: "backend",
            request_id = %head.request_id,
            flagged = result.stats.flagged,
            succeeded = result.stats.succeeded,
            "텍스트 AI 분석 완료"
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
        content_type == ContentType::Text
    }

    async fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "text-ai",
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

    use crate::domain::{DisplayOption, FilterBlock};

    use super::*;

    fn client() -> TextBackendClient {
        TextBackendClient::new(
            Client::new(),
            BackendConfig {
                base_url: "http://localhost:8002".into(),
                connect_timeout: Duration::from_secs(1),
                read_timeout: Duration::from_secs(1),
                model_version: "v1.0".into(),
            },
            RetryConfig {
                max_attempts: 1,
                backoff: Duration::from_millis(1),
                jitter: 0.0,
            },
            10_000,
            0.5,
        )
    }

    fn text_item(element_id: &str, content: &str) -> TextItem {
        TextItem {
            element_id: element_id.into(),
            content: content.into(),
            page_url: None,
            metadata: None,
        }
    }

    fn settings_with(categories: Vec<TextCategory>) -> UserSettings {
        UserSettings {
            session_id: "s-1".into(),
            image_filter: None,
            text_filter: Some(FilterBlock {
                enabled: true,
                sensitivity: 0.7,
                enabled_categories: categories,
                display: DisplayOption::Blur,
            }),
        }
    }

    #[test]
    fn default_filter_map_enables_every_category() {
        let map = client().filter_map(None);
        assert_eq!(map.len(), 5);
        assert!(map.values().all(|enabled| *enabled));
    }

    #[test]
    fn user_settings_restrict_the_filter_map() {
        let settings = settings_with(vec![TextCategory::Sexual]);
        let map = client().filter_map(Some(&settings));
        assert_eq!(map.get("SE"), Some(&true));
        assert_eq!(map.get("IN"), Some(&false));
        assert_eq!(map.get("PO"), Some(&false));
    }

    #[test]
    fn threshold_follows_user_sensitivity() {
        let client = client();
        assert_eq!(client.threshold(None), 0.5);
        let settings = settings_with(vec![TextCategory::Insult]);
        assert_eq!(client.threshold(Some(&settings)), 0.7);
    }

    #[test]
    fn wire_request_carries_offsets_and_filter_map() {
        let items = vec![text_item("el-1", "some text here")];
        let request = client().build_request("https://example.com", &items, None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["pageUrl"], "https://example.com");
        assert_eq!(json["textElements"][0]["elementId"], "el-1");
        assert_eq!(json["textElements"][0]["texts"][0]["sIdx"], 0);
        assert_eq!(json["textElements"][0]["texts"][0]["eIdx"], 14);
        assert_eq!(json["textFilterCategory"]["VI"], true);
        assert_eq!(json["threshold"], 0.5);
    }

    #[test]
    fn flagged_offsets_convert_to_canonical_ranges() {
        let items = vec![text_item("el-1", "0123456789 insulting text here")];
        let response = FilterPageResponse {
            page_url: None,
            filtered_elements: vec![FilteredElement {
                element_id: "el-1".into(),
                filtered_texts: vec![FilteredText {
                    text: None,
                    s_idx: 10,
                    e_idx: 20,
                    detected_labels: vec!["IN".into()],
                    confidence: HashMap::from([("IN".to_string(), 0.92)]),
                }],
            }],
            processing_time: None,
            total_texts: None,
        };
        let result = client().convert(response, &items);

        let finding = &result.text_findings[0];
        assert_eq!(finding.original_length, 30);
        let range = &finding.ranges[0];
        assert_eq!((range.start, range.end), (10, 20));
        assert_eq!(range.categories, vec![TextCategory::Insult]);
        assert_eq!(range.confidence, 0.92);
        assert_eq!(result.stats.flagged, 1);
    }

    #[test]
    fn clean_elements_still_count_as_succeeded() {
        // 응답이 플래그된 요소만 돌려줘도 나머지는 실패로 집계하지 않는다.
        let items = vec![
            text_item("el-1", "totally fine sentence"),
            text_item("el-2", "0123456789 insulting text here"),
        ];
        let response = FilterPageResponse {
            page_url: None,
            filtered_elements: vec![FilteredElement {
                element_id: "el-2".into(),
                filtered_texts: vec![FilteredText {
                    text: None,
                    s_idx: 10,
                    e_idx: 20,
                    detected_labels: vec!["IN".into()],
                    confidence: HashMap::from([("IN".to_string(), 0.92)]),
                }],
            }],
            processing_time: None,
            total_texts: None,
        };
        let result = client().convert(response, &items);

        assert_eq!(result.stats.requested, 2);
        assert_eq!(result.stats.succeeded, 2);
        assert_eq!(result.stats.failed, 0);
        assert_eq!(result.stats.flagged, 1);
    }

    #[test]
    fn empty_and_oversized_texts_fail_validation() {
        let client = client();
        assert!(client.validate(&[]).is_err());
        assert!(client.validate(&[text_item("a", "   ")]).is_err());
        let oversized = "x".repeat(10_001);
        assert!(client.validate(&[text_item("b", &oversized)]).is_err());
        assert!(client.validate(&[text_item("c", "fine")]).is_ok());
    }
}
