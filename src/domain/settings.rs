use serde::{Deserialize, Serialize};

use super::category::{ImageCategory, TextCategory};

/// 세션 단위 필터 설정. 설정 갱신 경로에서만 쓰이고 코어는 읽기 전용으로 다룬다.
/// 설정이 아예 없는 세션도 유효한 상태다. 그 경우 기본 차단 정책이 적용된다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_filter: Option<FilterBlock<ImageCategory>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_filter: Option<FilterBlock<TextCategory>>,
}

impl UserSettings {
    /// 활성화된 이미지 필터 블록. 꺼져 있으면 없는 것과 같다.
    pub fn active_image_filter(&self) -> Option<&FilterBlock<ImageCategory>> {
        self.image_filter.as_ref().filter(|block| block.enabled)
    }

    pub fn active_text_filter(&self) -> Option<&FilterBlock<TextCategory>> {
        self.text_filter.as_ref().filter(|block| block.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterBlock<C> {
    pub enabled: bool,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    // `default = "Vec::new"` 로 `C: Default` 바운드 없이 빈 목록을 기본값으로 쓴다.
    #[serde(default = "Vec::new")]
    pub enabled_categories: Vec<C>,
    #[serde(default)]
    pub display: DisplayOption,
}

impl<C: PartialEq> FilterBlock<C> {
    pub fn allows(&self, category: &C) -> bool {
        self.enabled_categories.contains(category)
    }
}

fn default_sensitivity() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayOption {
    #[default]
    Blur,
    Replace,
}

/// 전송 계층에서 들어오는 설정 문서 (`user-settings` / `settings-update` 이벤트).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdateDoc {
    pub session_id: String,
    #[serde(default)]
    pub image_filter: Option<FilterBlock<ImageCategory>>,
    #[serde(default)]
    pub text_filter: Option<FilterBlock<TextCategory>>,
}

impl SettingsUpdateDoc {
    pub fn into_settings(self) -> UserSettings {
        UserSettings {
            session_id: self.session_id,
            image_filter: self.image_filter,
            text_filter: self.text_filter,
        }
    }
}

/// 설정 저장 완료 ack.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSavedAck {
    pub session_id: String,
    pub saved: bool,
    pub applied_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_block_is_not_active() {
        let settings = UserSettings {
            session_id: "s-1".into(),
            image_filter: Some(FilterBlock {
                enabled: false,
                sensitivity: 0.5,
                enabled_categories: vec![ImageCategory::Gore],
                display: DisplayOption::Blur,
            }),
            text_filter: None,
        };
        assert!(settings.active_image_filter().is_none());
        assert!(settings.active_text_filter().is_none());
    }

    #[test]
    fn omitted_categories_deserialize_to_an_empty_list() {
        let settings: UserSettings = serde_json::from_str(
            r#"{
                "sessionId": "s-3",
                "imageFilter": { "enabled": true },
                "textFilter": { "enabled": true }
            }"#,
        )
        .unwrap();
        assert!(settings.image_filter.unwrap().enabled_categories.is_empty());
        assert!(settings.text_filter.unwrap().enabled_categories.is_empty());
    }

    #[test]
    fn settings_doc_round_trips_through_json() {
        let doc: SettingsUpdateDoc = serde_json::from_str(
            r#"{
                "sessionId": "s-2",
                "textFilter": {
                    "enabled": true,
                    "enabledCategories": ["INSULT", "POLITICS"]
                }
            }"#,
        )
        .unwrap();
        let settings = doc.into_settings();
        let block = settings.active_text_filter().unwrap();
        assert!(block.allows(&TextCategory::Insult));
        assert!(!block.allows(&TextCategory::Sexual));
        // 명시하지 않은 필드는 기본값으로 채워진다.
        assert_eq!(block.sensitivity, 0.5);
        assert_eq!(block.display, DisplayOption::Blur);
    }
}
