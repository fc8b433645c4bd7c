use std::{future::Future, time::Duration};

use rand::Rng;
use tokio::time::sleep;

use crate::config::RetryConfig;

use super::AnalysisError;

/// 고정 지연 + 지터 재시도로 비동기 호출을 감싼다.
///
/// `max_attempts`는 첫 시도를 포함한 전체 횟수다. 재시도는
/// [`AnalysisError::is_retryable`]이 참인 오류(5xx, 통신 오류)에만 적용되고,
/// 한도를 소진하면 마지막 오류를 `Exhausted`로 감싸 반환한다.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    label: &str,
    mut op: F,
) -> Result<T, AnalysisError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = jittered_delay(policy);
                tracing::warn!(
                    target: "backend",
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "{label} 호출 실패, 재시도 대기"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) if err.is_retryable() => {
                return Err(AnalysisError::Exhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

/// 재시도 폭주를 피하려고 고정 지연에 ±jitter 비율의 난수를 섞는다.
fn jittered_delay(policy: &RetryConfig) -> Duration {
    let base = policy.backoff.as_millis() as f64;
    let factor = if policy.jitter > 0.0 {
        1.0 + rand::thread_rng().gen_range(-policy.jitter..policy.jitter)
    } else {
        1.0
    };
    Duration::from_millis((base * factor).max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff: Duration::from_millis(1),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn server_errors_use_every_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AnalysisError::Server {
                    status: 503,
                    body: String::new(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(AnalysisError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_errors_are_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AnalysisError::Client {
                    status: 400,
                    body: String::new(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AnalysisError::Client { .. })));
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(AnalysisError::Server {
                        status: 502,
                        body: String::new(),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_errors_short_circuit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AnalysisError::Validation("empty batch".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AnalysisError::Validation(_))));
    }
}
