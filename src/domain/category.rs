use serde::{Deserialize, Serialize};

/// 이미지 분석 결과의 정규화된 카테고리.
///
/// AI 컨테이너는 짧은 코드("GO")나 전체 이름("GORE")을 섞어 보내므로
/// [`ImageCategory::from_code`]로 항상 정규화한다. 알 수 없는 라벨은
/// 오류가 아니라 `Clean`으로 취급한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageCategory {
    Crime,
    Accident,
    Horror,
    Gore,
    Sexual,
    Clean,
}

impl ImageCategory {
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "CR" | "CRIME" => Self::Crime,
            "AC" | "ACCIDENT" | "DI" | "DISASTER" => Self::Accident,
            "HO" | "HORROR" => Self::Horror,
            "GO" | "GORE" => Self::Gore,
            "SE" | "SEXUAL" => Self::Sexual,
            _ => Self::Clean,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crime => "CRIME",
            Self::Accident => "ACCIDENT",
            Self::Horror => "HORROR",
            Self::Gore => "GORE",
            Self::Sexual => "SEXUAL",
            Self::Clean => "CLEAN",
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// 텍스트 분석 결과의 정규화된 카테고리.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextCategory {
    Insult,
    Violence,
    Sexual,
    Ad,
    Politics,
    Clean,
}

impl TextCategory {
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "IN" | "INSULT" => Self::Insult,
            "VI" | "VIOLENCE" => Self::Violence,
            "SE" | "SEXUAL" => Self::Sexual,
            "AD" | "ADVERTISEMENT" => Self::Ad,
            "PO" | "POLITICS" => Self::Politics,
            _ => Self::Clean,
        }
    }

    /// 텍스트 AI 컨테이너가 필터 맵과 응답에 사용하는 짧은 코드.
    /// `Clean`은 필터 대상이 아니므로 코드가 없다.
    pub fn backend_code(&self) -> Option<&'static str> {
        match self {
            Self::Insult => Some("IN"),
            Self::Violence => Some("VI"),
            Self::Sexual => Some("SE"),
            Self::Ad => Some("AD"),
            Self::Politics => Some("PO"),
            Self::Clean => None,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// 필터링 가능한 텍스트 카테고리 전체. 사용자 설정이 없을 때의 기본 필터 맵 구성에 쓰인다.
pub const FILTERABLE_TEXT_CATEGORIES: [TextCategory; 5] = [
    TextCategory::Insult,
    TextCategory::Violence,
    TextCategory::Sexual,
    TextCategory::Ad,
    TextCategory::Politics,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_codes_map_to_canonical_labels() {
        assert_eq!(ImageCategory::from_code("GO"), ImageCategory::Gore);
        assert_eq!(ImageCategory::from_code("gore"), ImageCategory::Gore);
        assert_eq!(ImageCategory::from_code(" CR "), ImageCategory::Crime);
        assert_eq!(ImageCategory::from_code("DISASTER"), ImageCategory::Accident);
        assert_eq!(ImageCategory::from_code("NORMAL"), ImageCategory::Clean);
    }

    #[test]
    fn unknown_codes_fall_back_to_clean() {
        assert_eq!(ImageCategory::from_code("???"), ImageCategory::Clean);
        assert_eq!(TextCategory::from_code(""), TextCategory::Clean);
        assert_eq!(TextCategory::from_code("XX"), TextCategory::Clean);
    }

    #[test]
    fn text_mapping_is_idempotent() {
        for raw in ["IN", "insult", "VI", "violence", "AD", "po", "clean", "??"] {
            let once = TextCategory::from_code(raw);
            let twice = TextCategory::from_code(once.backend_code().unwrap_or("CLEAN"));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn backend_codes_round_trip() {
        for category in FILTERABLE_TEXT_CATEGORIES {
            let code = category.backend_code().expect("filterable category has a code");
            assert_eq!(TextCategory::from_code(code), category);
        }
        assert_eq!(TextCategory::Clean.backend_code(), None);
    }
}
