use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;

use crate::domain::{SettingsSavedAck, SettingsUpdateDoc, UserSettings};

/// 세션별 필터 설정 저장소.
///
/// 설정은 TTL을 갖고, 만료된 행은 조회 시점에 걸러진다. 조회 실패는
/// "설정 없음"으로 degrade한다. 처리 파이프라인은 설정이 없으면
/// 기본 차단 정책으로 동작하므로 저장소 장애가 요청을 실패시키지 않는다.
#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SettingsStore {
    pub fn new(pool: SqlitePool, ttl: std::time::Duration) -> Self {
        Self {
            pool,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(24)),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 세션 설정을 조회한다. 없거나 만료됐거나 읽기에 실패하면 None.
    pub async fn get(&self, session_id: &str) -> Option<UserSettings> {
        let row: Option<(String, DateTime<Utc>)> = match sqlx::query_as(
            r#"SELECT payload, expires_at FROM user_settings WHERE session_id = ?1"#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(target: "settings", session_id, error = %err, "설정 조회 실패, 기본 정책으로 진행합니다");
                return None;
            }
        };

        let (payload, expires_at) = row?;
        if expires_at <= Utc::now() {
            tracing::debug!(target: "settings", session_id, "만료된 설정, 무시합니다");
            let _ = self.delete(session_id).await;
            return None;
        }

        match serde_json::from_str(&payload) {
            Ok(settings) => Some(settings),
            Err(err) => {
                tracing::warn!(target: "settings", session_id, error = %err, "설정 역직렬화 실패");
                None
            }
        }
    }

    /// 설정을 저장하거나 교체한다. TTL이 갱신된다.
    pub async fn put(&self, settings: &UserSettings) -> Result<()> {
        let payload = serde_json::to_string(settings)?;
        let expires_at = Utc::now() + self.ttl;
        sqlx::query(
            r#"INSERT OR REPLACE INTO user_settings (session_id, payload, updated_at, expires_at)
                VALUES (?1, ?2, CURRENT_TIMESTAMP, ?3)"#,
        )
        .bind(&settings.session_id)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        let affected = sqlx::query(r#"DELETE FROM user_settings WHERE session_id = ?1"#)
            .bind(session_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    /// 전송 계층에서 받은 설정 문서를 적용하고 ack를 만든다.
    pub async fn apply_update(&self, doc: SettingsUpdateDoc) -> SettingsSavedAck {
        let settings = doc.into_settings();
        let session_id = settings.session_id.clone();
        let saved = match self.put(&settings).await {
            Ok(()) => {
                tracing::info!(target: "settings", session_id = %session_id, "세션 설정 저장 완료");
                true
            }
            Err(err) => {
                tracing::error!(target: "settings", session_id = %session_id, error = %err, "세션 설정 저장 실패");
                false
            }
        };
        SettingsSavedAck {
            session_id,
            saved,
            applied_at: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{DisplayOption, FilterBlock, ImageCategory};

    use super::*;

    async fn store() -> (SettingsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::store::init_pool(&dir.path().join("test.db"))
            .await
            .unwrap();
        (
            SettingsStore::new(pool, std::time::Duration::from_secs(3600)),
            dir,
        )
    }

    fn sample(session_id: &str) -> UserSettings {
        UserSettings {
            session_id: session_id.to_string(),
            image_filter: Some(FilterBlock {
                enabled: true,
                sensitivity: 0.7,
                enabled_categories: vec![ImageCategory::Gore, ImageCategory::Sexual],
                display: DisplayOption::Blur,
            }),
            text_filter: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (store, _dir) = store().await;
        store.put(&sample("s-1")).await.unwrap();

        let loaded = store.get("s-1").await.unwrap();
        let block = loaded.active_image_filter().unwrap();
        assert_eq!(block.sensitivity, 0.7);
        assert!(block.allows(&ImageCategory::Gore));
    }

    #[tokio::test]
    async fn missing_session_yields_none() {
        let (store, _dir) = store().await;
        assert!(store.get("unknown").await.is_none());
    }

    #[tokio::test]
    async fn expired_settings_are_dropped_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::store::init_pool(&dir.path().join("test.db"))
            .await
            .unwrap();
        let store = SettingsStore::new(pool, std::time::Duration::from_secs(0));
        store.put(&sample("s-2")).await.unwrap();

        assert!(store.get("s-2").await.is_none());
        // 만료 시 행 자체가 제거된다.
        assert!(!store.delete("s-2").await.unwrap());
    }

    #[tokio::test]
    async fn apply_update_acks_success() {
        let (store, _dir) = store().await;
        let doc: SettingsUpdateDoc = serde_json::from_str(
            r#"{"sessionId": "s-3", "imageFilter": {"enabled": true, "enabledCategories": ["GORE"]}}"#,
        )
        .unwrap();

        let ack = store.apply_update(doc).await;
        assert!(ack.saved);
        assert_eq!(ack.session_id, "s-3");
        assert!(store.get("s-3").await.is_some());
    }
}
