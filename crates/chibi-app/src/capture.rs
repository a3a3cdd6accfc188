//! 에러 로그 예외 수집.
//!
//! `ExceptionCaptureLayer`는 전역 tracing 구독자에 한 번 등록되는 레이어다.
//! `error` 필드에 에러가 첨부된 ERROR 레벨 이벤트만 `ExceptionReport`로 만들어
//! mutation으로 전송한다. 전송 경로 자신의 로그는 수집하지 않는다.
//!
//! ```rust,ignore
//! tracing::error!(error = &err as &dyn std::error::Error, "청크 로드 실패");
//! ```

use chibi_core::models::exception::ExceptionReport;
use chibi_core::ports::dispatch::MutationSender;
use chibi_core::ports::host::Clock;
use chibi_network::mutation::build_exception_mutation;
use std::cell::Cell;
use std::error::Error;
use std::fmt;
use std::panic::PanicHookInfo;
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{error, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// 수집하지 않는 이벤트 target 접두사 (전송 경로 및 수집기 자신)
const EXCLUDED_TARGETS: &[&str] = &["chibi_network", "chibi_app::capture"];

/// 패닉 이벤트의 target
pub const PANIC_TARGET: &str = "panic";

thread_local! {
    static IN_CAPTURE: Cell<bool> = const { Cell::new(false) };
}

/// 수집 중 플래그: 수집 경로에서 다시 로그가 발생해도 재수집하지 않는다
struct ReentrancyGuard;

impl ReentrancyGuard {
    fn enter() -> Option<Self> {
        IN_CAPTURE.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        IN_CAPTURE.with(|flag| flag.set(false));
    }
}

/// 에러와 원인 체인을 여러 줄 텍스트로 렌더링
pub fn render_error_chain(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    if source.is_some() {
        text.push_str("\n\n원인:");
    }
    let mut depth = 0;
    while let Some(cause) = source {
        text.push_str(&format!("\n    {depth}: {cause}"));
        depth += 1;
        source = cause.source();
    }
    text
}

fn is_excluded(target: &str) -> bool {
    EXCLUDED_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

/// 예외 리포트 생성 및 전송
pub struct ExceptionCapture {
    sender: Arc<dyn MutationSender>,
    clock: Arc<dyn Clock>,
    exception_table: String,
}

impl ExceptionCapture {
    pub fn new(
        sender: Arc<dyn MutationSender>,
        clock: Arc<dyn Clock>,
        exception_table: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            clock,
            exception_table: exception_table.into(),
        }
    }

    /// 첨부된 에러로 리포트 생성
    ///
    /// 로그 메시지가 비어 있으면 에러 메시지를 쓴다.
    pub fn build_report(
        &self,
        source_name: &str,
        message: Option<&str>,
        error_message: &str,
        stacktrace: String,
    ) -> ExceptionReport {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(error_message);

        ExceptionReport {
            timestamp: self.clock.now_utc(),
            level: Level::ERROR.to_string(),
            source_name: source_name.to_string(),
            thread_name: std::thread::current()
                .name()
                .unwrap_or("<unnamed>")
                .to_string(),
            message: (!message.is_empty()).then(|| message.to_string()),
            stacktrace,
        }
    }

    /// 리포트를 mutation으로 전송
    pub fn dispatch(&self, report: &ExceptionReport) {
        self.sender
            .send(build_exception_mutation(report, &self.exception_table));
    }

    /// 이 수집기에 연결된 레이어 생성
    pub fn layer(self: &Arc<Self>) -> ExceptionCaptureLayer {
        let layer = ExceptionCaptureLayer::default();
        layer.attach(self.clone());
        layer
    }
}

/// ERROR 이벤트 필드 수집기
#[derive(Default)]
struct ErrorEventVisitor {
    message: Option<String>,
    error_message: Option<String>,
    stacktrace: Option<String>,
}

impl Visit for ErrorEventVisitor {
    fn record_error(&mut self, _field: &Field, value: &(dyn Error + 'static)) {
        if self.stacktrace.is_none() {
            self.error_message = Some(value.to_string());
            self.stacktrace = Some(render_error_chain(value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

/// `ExceptionCapture`를 tracing 구독자에 연결하는 레이어
///
/// 구독자는 디스패처보다 먼저 설치되므로 수집기는 나중에 `attach`로 연결한다.
/// 연결 전의 이벤트는 무시된다.
#[derive(Clone, Default)]
pub struct ExceptionCaptureLayer {
    capture: Arc<OnceLock<Arc<ExceptionCapture>>>,
}

impl ExceptionCaptureLayer {
    /// 수집기 연결 (이미 연결되어 있으면 `false`)
    pub fn attach(&self, capture: Arc<ExceptionCapture>) -> bool {
        self.capture.set(capture).is_ok()
    }

    pub fn is_attached(&self) -> bool {
        self.capture.get().is_some()
    }
}

impl<S: Subscriber> Layer<S> for ExceptionCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(capture) = self.capture.get() else {
            return;
        };
        let metadata = event.metadata();
        if *metadata.level() != Level::ERROR || is_excluded(metadata.target()) {
            return;
        }
        let Some(_guard) = ReentrancyGuard::enter() else {
            return;
        };

        let mut visitor = ErrorEventVisitor::default();
        event.record(&mut visitor);
        let (Some(error_message), Some(stacktrace)) = (visitor.error_message, visitor.stacktrace)
        else {
            return;
        };

        let report = capture.build_report(
            metadata.target(),
            visitor.message.as_deref(),
            &error_message,
            stacktrace,
        );
        capture.dispatch(&report);
    }
}

/// 패닉을 나타내는 에러 (원인은 패닉 위치와 백트레이스)
#[derive(Debug)]
struct PanicError {
    payload: String,
    trace: PanicTrace,
}

#[derive(Debug)]
struct PanicTrace(String);

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "패닉: {}", self.payload)
    }
}

impl Error for PanicError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.trace)
    }
}

impl fmt::Display for PanicTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for PanicTrace {}

fn panic_payload(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// 패닉을 에러 로그로 남기는 훅 설치
///
/// 기존 훅은 그대로 호출된다. 패닉은 `panic` target의 ERROR 이벤트가 되어
/// 일반 에러 로그와 같은 경로로 수집된다.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();
        let err = PanicError {
            payload: panic_payload(info),
            trace: PanicTrace(format!("위치 {location}\n{backtrace}")),
        };

        error!(
            target: PANIC_TARGET,
            error = &err as &(dyn Error + 'static),
            "{}",
            err.payload
        );
        previous(info);
    }));
}
