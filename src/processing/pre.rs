use sha2::{Digest, Sha256};

use crate::domain::ProcessingRequest;

/// 캐시 키를 만든다. 이미지 배치만 대상이다.
///
/// 텍스트 분석은 세션 필터 맵이 추론 단계에 반영되므로 결과가 콘텐츠만으로
/// 결정되지 않는다. 키에 모델 버전을 섞어 모델 교체 시 자연 미스가 나게 한다.
pub fn cache_key(request: &ProcessingRequest, model_version: &str) -> Option<String> {
    let ProcessingRequest::ImageBatch { items, .. } = request else {
        return None;
    };
    if items.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(model_version.as_bytes());
    for item in items {
        hasher.update(item.mime_type.as_bytes());
        hasher.update((item.data.len() as u64).to_le_bytes());
        hasher.update(&item.data);
    }
    Some(format!("img:{model_version}:{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use crate::domain::{ImageItem, Priority, RequestHead, TextItem};

    use super::*;

    fn image_request(data: &[u8]) -> ProcessingRequest {
        ProcessingRequest::ImageBatch {
            head: RequestHead::new(Priority::Normal, "s-1", "https://example.com"),
            items: vec![ImageItem {
                element_id: "img-0".into(),
                data: data.to_vec(),
                mime_type: "image/png".into(),
                size: data.len() as u64,
                file_name: None,
                metadata: None,
            }],
        }
    }

    #[test]
    fn same_content_same_model_yields_same_key() {
        let a = cache_key(&image_request(b"pixels"), "v1.0").unwrap();
        let b = cache_key(&image_request(b"pixels"), "v1.0").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn model_version_changes_the_key() {
        let a = cache_key(&image_request(b"pixels"), "v1.0").unwrap();
        let b = cache_key(&image_request(b"pixels"), "v2.0").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_content_yields_different_keys() {
        let a = cache_key(&image_request(b"pixels"), "v1.0").unwrap();
        let b = cache_key(&image_request(b"other"), "v1.0").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn text_batches_are_never_cached() {
        let request = ProcessingRequest::TextBatch {
            head: RequestHead::new(Priority::Normal, "s-1", "https://example.com"),
            items: vec![TextItem {
                element_id: "t-0".into(),
                content: "내용".into(),
                page_url: None,
                metadata: None,
            }],
        };
        assert!(cache_key(&request, "v1.0").is_none());
    }
}
