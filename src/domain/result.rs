use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::{ImageCategory, TextCategory};
use super::request::ContentType;

/// AI 백엔드 한 번의 호출에서 만들어지는 정규화된 분석 결과.
/// 어댑터가 생성한 뒤로는 변경하지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_findings: Vec<ImageFinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_findings: Vec<TextFinding>,
    pub stats: ProcessingStats,
}

impl AnalysisResult {
    pub fn flagged_count(&self) -> usize {
        let images = self.image_findings.iter().filter(|f| f.hateful).count();
        let texts = self
            .text_findings
            .iter()
            .filter(|f| !f.ranges.is_empty())
            .count();
        images + texts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFinding {
    pub element_id: String,
    pub hateful: bool,
    pub confidence: f64,
    pub categories: Vec<ImageCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<Region>,
}

/// 혐오 판정 영역(선택). 이미지 좌상단 기준 비율 좌표.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFinding {
    pub element_id: String,
    pub ranges: Vec<FlaggedRange>,
    pub original_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedRange {
    pub start: usize,
    pub end: usize,
    pub categories: Vec<TextCategory>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub flagged: usize,
}

/// 오케스트레이터의 최종 출력. 전송 계층이 보는 유일한 타입이며
/// 실패 역시 예외가 아니라 `error` 필드로 전달된다.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub request_id: String,
    pub success: bool,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<AckPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub processing_time_ms: u64,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub category: String,
}

/// 전송 계층 ack에 실리는, 사용자 설정이 이미 반영된 클라이언트 페이로드.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AckPayload {
    Image(ImageAnalysisAck),
    Text(TextAnalysisAck),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisAck {
    pub processing_time: u64,
    pub processed_at: String,
    pub results: Vec<ImageAckItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAckItem {
    pub element_id: String,
    pub should_blur: bool,
    pub confidence: f64,
    /// shouldBlur가 true일 때만 채워진다. false면 명시적으로 null.
    pub primary_category: Option<ImageCategory>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysisAck {
    pub processing_time: u64,
    pub processed_at: String,
    pub results: Vec<TextAckItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAckItem {
    pub element_id: String,
    pub filtered_indexes: Vec<FilteredIndex>,
    pub original_length: usize,
    pub processing_time: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredIndex {
    pub start: usize,
    pub end: usize,
    /// 텍스트 AI 컨테이너의 짧은 코드 그대로 내려간다 (예: "IN").
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_category_serializes_as_null_when_absent() {
        let item = ImageAckItem {
            element_id: "img-1".into(),
            should_blur: false,
            confidence: 0.9,
            primary_category: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("primaryCategory").unwrap().is_null());
        assert_eq!(json["shouldBlur"], false);
    }

    #[test]
    fn filtered_index_uses_type_field() {
        let index = FilteredIndex {
            start: 10,
            end: 20,
            kind: vec!["IN".into()],
            confidence: 0.92,
        };
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["type"][0], "IN");
        assert_eq!(json["start"], 10);
        assert_eq!(json["end"], 20);
    }

    #[test]
    fn flagged_count_covers_both_modalities() {
        let result = AnalysisResult {
            success: true,
            content_type: ContentType::Image,
            image_findings: vec![
                ImageFinding {
                    element_id: "a".into(),
                    hateful: true,
                    confidence: 0.8,
                    categories: vec![ImageCategory::Gore],
                    regions: vec![],
                },
                ImageFinding {
                    element_id: "b".into(),
                    hateful: false,
                    confidence: 0.1,
                    categories: vec![ImageCategory::Clean],
                    regions: vec![],
                },
            ],
            text_findings: vec![],
            stats: ProcessingStats::default(),
        };
        assert_eq!(result.flagged_count(), 1);
    }
}
