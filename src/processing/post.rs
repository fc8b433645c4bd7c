use chrono::Utc;

use crate::domain::{
    AckPayload, AnalysisResult, ContentType, FilteredIndex, ImageAckItem, ImageAnalysisAck,
    ImageCategory, TextAckItem, TextAnalysisAck, UserSettings,
};

/// 분석 결과에 세션 설정을 적용한다. 순수 함수, I/O 없음.
///
/// 설정이 아예 없는 세션은 default-deny다: 백엔드가 유해 판정한 항목을
/// 전부 유지한다. 설정이 있으면 사용자가 켜 둔 카테고리만 남긴다.
/// 필터 블록을 명시적으로 꺼 둔 사용자는 해당 타입의 차단을 원치 않는
/// 것이므로 모든 판정을 해제한다.
pub fn apply_settings(result: &AnalysisResult, settings: Option<&UserSettings>) -> AnalysisResult {
    let mut applied = result.clone();

    match result.content_type {
        ContentType::Image => {
            let filter = settings.map(|s| s.active_image_filter());
            for finding in &mut applied.image_findings {
                if !finding.hateful {
                    continue;
                }
                finding.hateful = match filter {
                    // 설정 없음: 백엔드 판정 그대로.
                    None => true,
                    // 필터를 꺼 둔 세션: 차단하지 않는다.
                    Some(None) => false,
                    Some(Some(block)) => finding
                        .categories
                        .iter()
                        .any(|category| block.allows(category)),
                };
            }
        }
        ContentType::Text => {
            let filter = settings.map(|s| s.active_text_filter());
            for finding in &mut applied.text_findings {
                match filter {
                    None => {}
                    Some(None) => finding.ranges.clear(),
                    Some(Some(block)) => finding.ranges.retain(|range| {
                        range
                            .categories
                            .iter()
                            .any(|category| block.allows(category))
                    }),
                }
            }
        }
    }

    applied.stats.flagged = applied.flagged_count();
    applied
}

/// 설정이 반영된 결과를 전송 계층 ack 페이로드로 변환한다.
pub fn build_payload(result: &AnalysisResult, elapsed_ms: u64) -> AckPayload {
    let processed_at = Utc::now().to_rfc3339();
    match result.content_type {
        ContentType::Image => AckPayload::Image(ImageAnalysisAck {
            processing_time: elapsed_ms,
            processed_at,
            results: result
                .image_findings
                .iter()
                .map(|finding| ImageAckItem {
                    element_id: finding.element_id.clone(),
                    should_blur: finding.hateful,
                    confidence: finding.confidence,
                    primary_category: finding
                        .hateful
                        .then(|| primary_category(&finding.categories))
                        .flatten(),
                })
                .collect(),
        }),
        ContentType::Text => AckPayload::Text(TextAnalysisAck {
            processing_time: elapsed_ms,
            processed_at,
            results: result
                .text_findings
                .iter()
                .map(|finding| TextAckItem {
                    element_id: finding.element_id.clone(),
                    filtered_indexes: finding
                        .ranges
                        .iter()
                        .map(|range| FilteredIndex {
                            start: range.start,
                            end: range.end,
                            kind: range
                                .categories
                                .iter()
                                .filter_map(|c| c.backend_code())
                                .map(str::to_string)
                                .collect(),
                            confidence: range.confidence,
                        })
                        .collect(),
                    original_length: finding.original_length,
                    processing_time: elapsed_ms,
                })
                .collect(),
        }),
    }
}

fn primary_category(categories: &[ImageCategory]) -> Option<ImageCategory> {
    categories
        .iter()
        .copied()
        .find(|c| *c != ImageCategory::Clean)
}
