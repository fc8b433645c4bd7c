use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::AnalysisResult;

/// 이미지 분석 결과의 인메모리 캐시.
///
/// 키는 콘텐츠 해시와 모델 버전으로 만들어지므로, 모델이 바뀌면 기존
/// 항목은 자연히 미스가 된다. 저장 내용은 설정 적용 이전의 원본 분석
/// 결과다. 히트 시에도 현재 세션의 설정으로 후처리를 다시 한다.
pub struct ResultCache {
    entries: Mutex<HashMap<String, CachedEntry>>,
    ttl: chrono::Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct CachedEntry {
    result: AnalysisResult,
    model_version: String,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    hits: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(30)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<AnalysisResult> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > Utc::now() => {
                entry.hits += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: "cache",
                    key,
                    model_version = %entry.model_version,
                    age_s = (Utc::now() - entry.cached_at).num_seconds(),
                    entry_hits = entry.hits,
                    "캐시 히트"
                );
                Some(entry.result.clone())
            }
            Some(_) => {
                // 만료된 항목은 읽는 김에 치운다.
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, result: AnalysisResult, model_version: impl Into<String>) {
        let now = Utc::now();
        self.entries.lock().insert(
            key,
            CachedEntry {
                result,
                model_version: model_version.into(),
                cached_at: now,
                expires_at: now + self.ttl,
                hits: 0,
            },
        );
    }

    /// 만료 항목을 일괄 제거한다. 제거한 개수를 돌려준다.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
