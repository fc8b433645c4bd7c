use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::backend::AnalysisBackend;
use crate::domain::{AnalysisResult, ContentType, Priority, ProcessingRequest, UserSettings};
use crate::infrastructure::shutdown::ShutdownListener;

use super::{PoolStatus, ProcessingError};

type ReplySender = oneshot::Sender<Result<AnalysisResult, ProcessingError>>;

/// 우선순위 큐 항목. `(priority, timestamp, seq)` 순서로 꺼낸다.
/// HIGH 먼저, 같은 우선순위면 먼저 들어온 요청 먼저.
struct QueuedJob {
    seq: u64,
    request: ProcessingRequest,
    settings: Option<UserSettings>,
    reply: ReplySender,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // BinaryHeap은 max-heap이므로 "먼저 처리할 것"이 Greater가 되도록 뒤집는다.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .request
            .sort_key()
            .cmp(&self.request.sort_key())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// 컨텐츠 타입 하나의 admission 풀.
///
/// AI 컨테이너는 동시 추론 한 건만 감당한다고 가정하므로, 풀마다 워커
/// 하나가 우선순위 큐에서 요청을 꺼내 게이트를 잡은 채 백엔드를 호출한다.
/// 이미지 풀과 텍스트 풀은 완전히 독립이라 서로 다른 타입의 요청은
/// 병렬로 진행된다.
pub struct SchedulerPool {
    content_type: ContentType,
    backend: Arc<dyn AnalysisBackend>,
    queue: Mutex<BinaryHeap<QueuedJob>>,
    capacity: usize,
    wakeup: Notify,
    gate: tokio::sync::Mutex<()>,
    seq: AtomicU64,
    worker_alive: AtomicBool,
    total_processed: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl SchedulerPool {
    pub fn new(
        content_type: ContentType,
        backend: Arc<dyn AnalysisBackend>,
        capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            content_type,
            backend,
            queue: Mutex::new(BinaryHeap::new()),
            capacity,
            wakeup: Notify::new(),
            gate: tokio::sync::Mutex::new(()),
            seq: AtomicU64::new(0),
            worker_alive: AtomicBool::new(false),
            total_processed: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
        })
    }

    /// 풀 워커를 기동한다. 종료 신호가 오면 루프를 빠져나가고
    /// 그 시점부터 `is_healthy()`는 false가 된다.
    pub fn spawn_worker(self: &Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        self.worker_alive.store(true, AtomicOrdering::SeqCst);
        let pool = self.clone();
        tokio::spawn(async move {
            pool.run_loop(&mut shutdown).await;
        })
    }

    /// 요청을 큐에 넣고 처리 결과를 기다린다.
    ///
    /// 텍스트 요청은 컨테이너가 추론 중에 필터를 적용할 수 있도록
    /// 호출자가 미리 조회한 사용자 설정을 함께 싣는다.
    pub async fn schedule_and_process(
        &self,
        request: ProcessingRequest,
        settings: Option<UserSettings>,
    ) -> Result<AnalysisResult, ProcessingError> {
        let request_id = request.request_id().to_string();
        let priority = request.priority();
        let (reply, receiver) = oneshot::channel();

        {
            let mut queue = self.queue.lock();
            // 락 안에서 확인해야 워커 종료 시 drain과 경합하지 않는다.
            if !self.worker_alive.load(AtomicOrdering::SeqCst) {
                return Err(ProcessingError::SchedulerUnavailable {
                    content_type: self.content_type,
                });
            }
            if queue.len() >= self.capacity {
                return Err(ProcessingError::QueueFull {
                    content_type: self.content_type,
                    depth: queue.len(),
                });
            }
            queue.push(QueuedJob {
                seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
                request,
                settings,
                reply,
            });
            tracing::debug!(
                target: "scheduler",
                content_type = %self.content_type,
                request_id = %request_id,
                ?priority,
                depth = queue.len(),
                "요청 큐 추가"
            );
        }
        self.wakeup.notify_one();

        match receiver.await {
            Ok(result) => result,
            // 워커가 응답 없이 사라진 경우.
            Err(_) => Err(ProcessingError::SchedulerUnavailable {
                content_type: self.content_type,
            }),
        }
    }

    /// 비동기 변형: 결과를 기다리는 대신 핸들을 돌려준다.
    pub fn schedule(
        self: &Arc<Self>,
        request: ProcessingRequest,
        settings: Option<UserSettings>,
    ) -> JoinHandle<Result<AnalysisResult, ProcessingError>> {
        let pool = self.clone();
        tokio::spawn(async move { pool.schedule_and_process(request, settings).await })
    }

    /// 큐에서 대기 중인 요청을 제거한다. 이미 백엔드로 나간 호출은
    /// 중단하지 않는다.
    pub fn cancel(&self, request_id: &str) -> bool {
        let mut queue = self.queue.lock();
        let jobs = std::mem::take(&mut *queue).into_vec();
        let mut cancelled = false;
        for job in jobs {
            if job.request.request_id() == request_id {
                cancelled = true;
                let _ = job.reply.send(Err(ProcessingError::Cancelled {
                    content_type: self.content_type,
                    request_id: request_id.to_string(),
                }));
            } else {
                queue.push(job);
            }
        }
        if cancelled {
            tracing::info!(
                target: "scheduler",
                content_type = %self.content_type,
                request_id,
                "대기 중 요청 취소"
            );
        }
        cancelled
    }

    pub fn status(&self) -> PoolStatus {
        let (queued, queued_high) = {
            let queue = self.queue.lock();
            let high = queue
                .iter()
                .filter(|job| job.request.priority() == Priority::High)
                .count();
            (queue.len(), high)
        };
        let total_processed = self.total_processed.load(AtomicOrdering::Relaxed);
        let average_latency_ms = if total_processed > 0 {
            self.total_latency_ms.load(AtomicOrdering::Relaxed) / total_processed
        } else {
            0
        };
        PoolStatus {
            content_type: self.content_type,
            queued,
            queued_high,
            queued_normal: queued - queued_high,
            gate_held: self.gate.try_lock().is_err(),
            total_processed,
            average_latency_ms,
        }
    }

    /// 풀이 admission 경로를 감당할 수 있는 상태인지.
    ///
    /// 워커가 살아 있고 큐에 여유가 있으면 건강한 것으로 본다. 백엔드
    /// 도달성은 여기서 묻지 않는다. 장애는 해당 호출의 재시도 실패로
    /// 드러나는 것이지 스케줄러 전체를 내릴 이유가 아니다.
    pub fn is_healthy(&self) -> bool {
        self.worker_alive.load(AtomicOrdering::SeqCst) && self.queue.lock().len() < self.capacity
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    async fn run_loop(&self, shutdown: &mut ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let job = self.queue.lock().pop();
            let Some(job) = job else {
                tokio::select! {
                    _ = self.wakeup.notified() => {}
                    _ = shutdown.notified() => break,
                }
                continue;
            };

            let request_id = job.request.request_id().to_string();
            let started = Instant::now();

            // 게이트는 scope 종료 시 무조건 풀린다. 실패 경로 포함.
            let result = {
                let _gate = self.gate.lock().await;
                self.backend
                    .analyze(&job.request, job.settings.as_ref())
                    .await
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            self.total_processed.fetch_add(1, AtomicOrdering::Relaxed);
            self.total_latency_ms
                .fetch_add(elapsed_ms, AtomicOrdering::Relaxed);

            let mapped = result.map_err(|source| ProcessingError::Analysis {
                content_type: self.content_type,
                source,
            });

            if job.reply.send(mapped).is_err() {
                tracing::warn!(
                    target: "scheduler",
                    content_type = %self.content_type,
                    request_id = %request_id,
                    "호출자가 결과를 기다리지 않아 응답을 버립니다"
                );
            }
        }

        // worker_alive 플립과 drain은 같은 락 아래에서 묶는다. 이후 들어오는
        // 요청은 push 전에 SchedulerUnavailable로 거절되므로 큐에 잡이 남지 않는다.
        let stranded = {
            let mut queue = self.queue.lock();
            self.worker_alive.store(false, AtomicOrdering::SeqCst);
            std::mem::take(&mut *queue).into_vec()
        };
        let stranded_count = stranded.len();
        for job in stranded {
            let _ = job.reply.send(Err(ProcessingError::SchedulerUnavailable {
                content_type: self.content_type,
            }));
        }
        tracing::info!(
            target: "scheduler",
            content_type = %self.content_type,
            stranded = stranded_count,
            "스케줄러 워커 종료"
        );
    }
}
