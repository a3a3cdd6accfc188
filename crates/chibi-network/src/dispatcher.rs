//! 재시도 디스패처.
//!
//! `send()`는 호출자를 막지 않는다. 전송은 tokio 런타임에서 진행되고
//! 일시적 실패 후의 재시도는 호스트의 지연 작업 스케줄러로 예약한다 (sleep 없음).
//! 호출마다 자신의 `DispatchAttempt`만 가지므로 호출 간 공유 가변 상태가 없다.

use crate::transport::{MutationTransport, TransportError};
use chibi_core::config::TelemetryConfig;
use chibi_core::error::CoreError;
use chibi_core::models::dispatch::{DispatchRequest, GraphQlResponse};
use chibi_core::ports::dispatch::MutationSender;
use chibi_core::ports::task::TaskScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// 재시도 정책 (고정 백오프)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    /// 일시적 실패 후 다음 시도까지 대기 시간
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// 전송 시도 1회
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchAttempt {
    /// 1부터 시작하는 시도 번호
    pub number: u32,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl DispatchAttempt {
    /// 첫 시도
    pub fn first(policy: &RetryPolicy) -> Self {
        Self {
            number: 1,
            max_attempts: policy.max_attempts.max(1),
            backoff: policy.backoff,
        }
    }

    /// 다음 시도 (최대 횟수에 도달했으면 `None`)
    pub fn next(&self) -> Option<Self> {
        (self.number < self.max_attempts).then(|| Self {
            number: self.number + 1,
            ..*self
        })
    }
}

/// 전송 1건의 최종 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// HTTP 200 응답 수신 (`errors` 배열 항목 수 포함)
    Delivered { attempts: u32, app_errors: usize },
    /// 200이 아닌 완료 응답: 재시도하지 않음
    Rejected {
        attempts: u32,
        status: u16,
        app_errors: usize,
    },
    /// 영구 전송 실패: 재시도하지 않음
    Failed { attempts: u32, reason: String },
    /// 일시적 실패로 최대 시도 횟수 소진
    Exhausted { attempts: u32, reason: String },
}

/// 비동기 mutation 디스패처: `MutationSender` 구현
///
/// 복제 비용이 작으며 복제본은 같은 전송/스케줄러를 공유한다.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    transport: Arc<dyn MutationTransport>,
    scheduler: Arc<dyn TaskScheduler>,
    policy: RetryPolicy,
    runtime: Handle,
}

impl Dispatcher {
    /// 현재 tokio 런타임에서 디스패처 생성
    pub fn new(
        transport: Arc<dyn MutationTransport>,
        scheduler: Arc<dyn TaskScheduler>,
        policy: RetryPolicy,
    ) -> Result<Self, CoreError> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::Internal(format!("tokio 런타임 없음: {e}")))?;
        Ok(Self::with_runtime(transport, scheduler, policy, runtime))
    }

    /// 지정한 런타임 핸들로 디스패처 생성
    pub fn with_runtime(
        transport: Arc<dyn MutationTransport>,
        scheduler: Arc<dyn TaskScheduler>,
        policy: RetryPolicy,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                scheduler,
                policy,
                runtime,
            }),
        }
    }

    /// 전송 시작 후 최종 결과 수신기 반환
    ///
    /// 수신기를 버려도 전송은 계속된다.
    pub fn send_tracked(&self, request: DispatchRequest) -> oneshot::Receiver<DispatchOutcome> {
        debug_assert!(
            request.parameters_match(),
            "mutation 파라미터와 변수 키 불일치: {:?}",
            request.variables.keys().collect::<Vec<_>>()
        );

        let (reply, outcome) = oneshot::channel();
        match serde_json::to_vec(&request) {
            Ok(body) => {
                let attempt = DispatchAttempt::first(&self.inner.policy);
                spawn_attempt(self.inner.clone(), Arc::new(body), attempt, reply);
            }
            Err(e) => {
                error!("mutation 직렬화 실패: {e}");
                let _ = reply.send(DispatchOutcome::Failed {
                    attempts: 0,
                    reason: e.to_string(),
                });
            }
        }
        outcome
    }
}

impl MutationSender for Dispatcher {
    fn send(&self, request: DispatchRequest) {
        drop(self.send_tracked(request));
    }
}

fn spawn_attempt(
    inner: Arc<DispatcherInner>,
    body: Arc<Vec<u8>>,
    attempt: DispatchAttempt,
    reply: oneshot::Sender<DispatchOutcome>,
) {
    let runtime = inner.runtime.clone();
    runtime.spawn(run_attempt(inner, body, attempt, reply));
}

async fn run_attempt(
    inner: Arc<DispatcherInner>,
    body: Arc<Vec<u8>>,
    attempt: DispatchAttempt,
    reply: oneshot::Sender<DispatchOutcome>,
) {
    let result = inner.transport.post(&body).await;
    let outcome = match result {
        Ok(resp) => {
            let app_errors = log_graphql_errors(&resp.body);
            if resp.status == 200 {
                debug!(
                    "mutation 전송 완료 (시도 {}/{}, 애플리케이션 에러 {}건)",
                    attempt.number, attempt.max_attempts, app_errors
                );
                DispatchOutcome::Delivered {
                    attempts: attempt.number,
                    app_errors,
                }
            } else {
                warn!("mutation 응답 상태 {}: {}", resp.status, resp.body);
                DispatchOutcome::Rejected {
                    attempts: attempt.number,
                    status: resp.status,
                    app_errors,
                }
            }
        }
        Err(TransportError::Terminated(reason)) => match attempt.next() {
            Some(next) => {
                warn!(
                    "일시적 전송 실패 (시도 {}/{}): {reason}, {:?} 후 재시도",
                    attempt.number, attempt.max_attempts, attempt.backoff
                );
                let retry_inner = inner.clone();
                inner.scheduler.schedule_delayed(
                    attempt.backoff,
                    Box::new(move || spawn_attempt(retry_inner, body, next, reply)),
                );
                return;
            }
            None => {
                warn!(
                    "mutation 영구 실패: 재시도 {}회 소진 ({reason})",
                    attempt.max_attempts
                );
                DispatchOutcome::Exhausted {
                    attempts: attempt.number,
                    reason,
                }
            }
        },
        Err(TransportError::Failed(reason)) => {
            error!(
                "mutation 전송 실패 (시도 {}/{}): {reason}",
                attempt.number, attempt.max_attempts
            );
            DispatchOutcome::Failed {
                attempts: attempt.number,
                reason,
            }
        }
    };

    let _ = reply.send(outcome);
}

/// 응답 본문의 `errors` 배열 항목마다 경고 1줄 기록, 항목 수 반환
///
/// JSON이 아니거나 `errors`가 없으면 0.
pub fn log_graphql_errors(body: &str) -> usize {
    let Ok(response) = serde_json::from_str::<GraphQlResponse>(body) else {
        return 0;
    };

    for entry in &response.errors {
        let message = entry.message.as_deref().unwrap_or("<no message>");
        let code = entry.code().unwrap_or_else(|| "-".to_string());
        let ext = entry
            .extensions
            .as_ref()
            .map(|ext| serde_json::Value::Object(ext.clone()).to_string())
            .unwrap_or_else(|| "-".to_string());
        warn!("GraphQL 에러: {message} | code={code} | ext={ext}");
    }

    response.errors.len()
}
