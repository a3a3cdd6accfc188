//! 디스패처 테스트용 가짜 협력자.

use crate::transport::{MutationTransport, TransportError, TransportResponse};
use async_trait::async_trait;
use chibi_core::ports::task::{DelayedTask, RepeatingTask, TaskHandle, TaskScheduler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// 미리 정한 결과를 순서대로 돌려주는 전송
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MutationTransport for ScriptedTransport {
    async fn post(&self, _body: &[u8]) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Failed("스크립트 소진".to_string())))
    }
}

pub(crate) fn ok(status: u16, body: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        body: body.to_string(),
    })
}

/// 피어의 GOAWAY로 끝난 요청 (hyper/h2 에러 체인 텍스트)
pub(crate) fn goaway() -> Result<TransportResponse, TransportError> {
    Err(TransportError::classify(
        "error sending request for url (http://127.0.0.1:8080/v1/graphql): client error (SendRequest): http2 error: connection error received: not a result of an error",
    ))
}

/// 피어의 RST_STREAM으로 끝난 요청
pub(crate) fn stream_reset() -> Result<TransportResponse, TransportError> {
    Err(TransportError::classify(
        "error sending request for url (http://127.0.0.1:8080/v1/graphql): client error (SendRequest): http2 error: stream error received: stream no longer needed",
    ))
}

/// 지연 작업을 즉시 실행하고 요청된 지연 시간만 기록하는 스케줄러
#[derive(Default)]
pub(crate) struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

impl TaskScheduler for RecordingScheduler {
    fn schedule_repeating(&self, _interval_ticks: u32, _task: RepeatingTask) -> TaskHandle {
        TaskHandle::new()
    }

    fn schedule_delayed(&self, delay: Duration, task: DelayedTask) {
        self.delays.lock().push(delay);
        task();
    }
}

/// 수집된 로그 이벤트 1건
#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub(crate) level: Level,
    pub(crate) message: String,
}

/// 이벤트를 메모리에 모으는 tracing 레이어
#[derive(Clone, Default)]
pub(crate) struct CollectingLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CollectingLayer {
    pub(crate) fn events_at(&self, level: Level) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CollectingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.0,
        });
    }
}
