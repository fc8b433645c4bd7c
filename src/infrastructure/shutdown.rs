use std::fmt;

use tokio::sync::watch;

/// 종료 사유. 드레인 로그와 상태 보고에 같이 실린다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    Sigterm,
    /// 시그널 외 경로 (초기화 실패, 런 루프 종료 등).
    Drain,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CtrlC => write!(f, "ctrl-c"),
            Self::Sigterm => write!(f, "sigterm"),
            Self::Drain => write!(f, "drain"),
        }
    }
}

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<Option<ShutdownReason>>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<Option<ShutdownReason>>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(None);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// 종료를 시작한다. 먼저 도착한 사유가 유지된다.
    pub fn trigger(&self, reason: ShutdownReason) {
        self.sender.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        if self.receiver.borrow().is_some() {
            return;
        }
        let _ = self.receiver.changed().await;
    }

    pub fn is_triggered(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.receiver.borrow()
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "shutdown", "Ctrl-C 수신, 종료를 시작합니다");
            ctrlc.trigger(ShutdownReason::CtrlC);
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                tracing::info!(target: "shutdown", "SIGTERM 수신, 종료를 시작합니다");
                term.trigger(ShutdownReason::Sigterm);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_sees_the_first_reason() {
        let (shutdown, mut listener) = Shutdown::new();
        assert!(!listener.is_triggered());
        assert_eq!(listener.reason(), None);

        shutdown.trigger(ShutdownReason::Sigterm);
        shutdown.trigger(ShutdownReason::CtrlC);

        listener.notified().await;
        assert!(listener.is_triggered());
        assert_eq!(listener.reason(), Some(ShutdownReason::Sigterm));
    }

    #[tokio::test]
    async fn notified_returns_immediately_after_trigger() {
        let (shutdown, _) = Shutdown::new();
        shutdown.trigger(ShutdownReason::Drain);
        // trigger 이후에 구독해도 바로 깨어난다.
        let mut late = shutdown.subscribe();
        late.notified().await;
        assert_eq!(late.reason(), Some(ShutdownReason::Drain));
    }
}
