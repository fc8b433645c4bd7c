use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 요청 우선순위. `High`는 뷰포트 안에 보이는 컨텐츠, `Normal`은 그 외.
/// 파생된 `Ord`는 선언 순서를 따르므로 `High < Normal`이고,
/// 스케줄러 큐에서는 작은 쪽이 먼저 나간다.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Image,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Text => "TEXT",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 배치 공통 헤더. requestId는 전송 계층이 주지 않으면 여기서 생성한다.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub request_id: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub page_url: String,
}

impl RequestHead {
    pub fn new(priority: Priority, session_id: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            priority,
            timestamp: Utc::now(),
            session_id: session_id.into(),
            page_url: page_url.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// 이미지 배치의 개별 항목.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub element_id: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
    pub file_name: Option<String>,
    pub metadata: Option<Value>,
}

const SUPPORTED_IMAGE_MIME_TYPES: [&str; 8] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/avif",
    "image/bmp",
    "image/tiff",
    "image/x-icon",
];

impl ImageItem {
    pub fn is_supported_format(&self) -> bool {
        SUPPORTED_IMAGE_MIME_TYPES.contains(&self.mime_type.as_str())
    }

    pub fn is_valid_size(&self, max_bytes: u64) -> bool {
        self.size > 0 && self.size <= max_bytes
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => ".png",
            "image/gif" => ".gif",
            "image/webp" => ".webp",
            "image/avif" => ".avif",
            "image/bmp" => ".bmp",
            "image/tiff" => ".tiff",
            "image/x-icon" => ".ico",
            _ => ".jpg",
        }
    }

    /// AI 컨테이너 multipart part의 파일명. 원본 파일명이 없으면 MIME 기반으로 생성.
    pub fn resolved_file_name(&self, index: usize) -> String {
        match &self.file_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("image_{}{}", index, self.file_extension()),
        }
    }

    /// part key로 쓰이는 element id. 비어 있으면 requestId 기반으로 생성.
    pub fn resolved_element_id(&self, request_id: &str, index: usize) -> String {
        if self.element_id.trim().is_empty() {
            format!("{request_id}-img-{index}")
        } else {
            self.element_id.clone()
        }
    }
}

/// 텍스트 배치의 개별 항목.
#[derive(Debug, Clone)]
pub struct TextItem {
    pub element_id: String,
    pub content: String,
    pub page_url: Option<String>,
    pub metadata: Option<Value>,
}

impl TextItem {
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn is_valid_length(&self, max_chars: usize) -> bool {
        self.has_content() && self.content.chars().count() <= max_chars
    }
}

/// 처리 요청. 타입 태그가 곧 라우팅 기준이다.
#[derive(Debug, Clone)]
pub enum ProcessingRequest {
    ImageBatch { head: RequestHead, items: Vec<ImageItem> },
    TextBatch { head: RequestHead, items: Vec<TextItem> },
}

impl ProcessingRequest {
    pub fn head(&self) -> &RequestHead {
        match self {
            Self::ImageBatch { head, .. } | Self::TextBatch { head, .. } => head,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::ImageBatch { .. } => ContentType::Image,
            Self::TextBatch { .. } => ContentType::Text,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.head().request_id
    }

    pub fn priority(&self) -> Priority {
        self.head().priority
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.head().timestamp
    }

    pub fn session_id(&self) -> &str {
        &self.head().session_id
    }

    pub fn item_count(&self) -> usize {
        match self {
            Self::ImageBatch { items, .. } => items.len(),
            Self::TextBatch { items, .. } => items.len(),
        }
    }

    /// 스케줄러 전체 순서: 우선순위 먼저, 같은 우선순위면 먼저 들어온(타임스탬프가 빠른) 요청 먼저.
    pub fn sort_key(&self) -> (Priority, DateTime<Utc>) {
        (self.priority(), self.timestamp())
    }
}
