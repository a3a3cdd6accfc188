//! 에이전트 라이프사이클.
//!
//! 종료 흐름: OS 시그널 또는 내부 요청 → 종료 신호(watch) → 메트릭 수집 취소 →
//! 호스트 루프 종료 대기. 종료 신호는 한 번만 발송된다.

use std::fmt;
use tokio::sync::watch;
use tracing::{error, info};

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// 프로세스 내부에서 `shutdown` 호출
    Requested,
    /// 시그널 핸들러 등록 실패
    SignalError,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Requested => "내부 요청",
            Self::SignalError => "시그널 대기 실패",
        };
        f.write_str(text)
    }
}

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }

    /// 종료 신호 수신기 (호스트 루프용)
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// 종료 신호 발송 (이미 종료 중이면 `false`)
    pub fn shutdown(&self, reason: ShutdownReason) -> bool {
        let sent = self.shutdown_tx.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
        if sent {
            info!("종료 신호 발송: {reason}");
        }
        sent
    }

    /// 시그널 또는 내부 종료 요청까지 대기한 뒤 종료 신호 발송
    ///
    /// 시그널 등록에 실패하면 바로 종료한다.
    pub async fn run_until_shutdown(&self) -> ShutdownReason {
        if self.is_shutting_down() {
            return ShutdownReason::Requested;
        }

        let reason = tokio::select! {
            signal = wait_for_signal() => match signal {
                Ok(reason) => reason,
                Err(e) => {
                    error!(error = &e as &dyn std::error::Error, "시그널 대기 실패");
                    ShutdownReason::SignalError
                }
            },
            _ = stop_requested(self.subscribe()) => ShutdownReason::Requested,
        };

        self.shutdown(reason);
        reason
    }
}

/// OS 시그널 대기 (SIGINT, SIGTERM)
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let reason = tokio::select! {
        _ = sigint.recv() => ShutdownReason::Interrupt,
        _ = sigterm.recv() => ShutdownReason::Terminate,
    };
    Ok(reason)
}

/// OS 시그널 대기 (Ctrl+C)
#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<ShutdownReason> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownReason::Interrupt)
}

async fn stop_requested(mut shutdown_rx: watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_running() {
        let lm = LifecycleManager::new();
        assert!(!*lm.subscribe().borrow());
        assert!(!lm.is_shutting_down());
    }

    #[tokio::test]
    async fn shutdown_wakes_subscribers_once() {
        let lm = LifecycleManager::new();
        let mut rx = lm.subscribe();

        assert!(lm.shutdown(ShutdownReason::Terminate));
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(lm.is_shutting_down());

        assert!(!lm.shutdown(ShutdownReason::Requested));
    }

    #[tokio::test]
    async fn run_until_shutdown_ends_on_internal_request() {
        let lm = Arc::new(LifecycleManager::new());
        let waiter = {
            let lm = lm.clone();
            tokio::spawn(async move { lm.run_until_shutdown().await })
        };

        tokio::task::yield_now().await;
        lm.shutdown(ShutdownReason::Requested);

        assert_eq!(waiter.await.unwrap(), ShutdownReason::Requested);
        assert!(lm.is_shutting_down());
    }

    #[tokio::test]
    async fn run_until_shutdown_returns_at_once_when_already_stopping() {
        let lm = LifecycleManager::new();
        lm.shutdown(ShutdownReason::Requested);
        assert_eq!(lm.run_until_shutdown().await, ShutdownReason::Requested);
    }

    #[test]
    fn reason_display() {
        assert_eq!(ShutdownReason::Terminate.to_string(), "SIGTERM");
        assert_eq!(ShutdownReason::Requested.to_string(), "내부 요청");
    }
}
