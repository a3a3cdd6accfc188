//! 수집 → mutation → HTTP 전송 통합 테스트.
//!
//! 호스트 루프 틱과 에러 로그가 mockito GraphQL 서버까지 도달하는지 확인한다.

use async_trait::async_trait;
use chibi_app::capture::ExceptionCapture;
use chibi_app::host_loop::{HostLoop, HostStatus};
use chibi_app::scheduler::MetricsScheduler;
use chibi_core::config::TelemetryConfig;
use chibi_core::error::CoreError;
use chibi_core::models::metrics::MemoryCounters;
use chibi_core::ports::dispatch::MutationSender;
use chibi_core::ports::host::{Clock, ProcessProbe};
use chibi_monitor::clock::SystemClock;
use chibi_monitor::sampler::MetricsSampler;
use chibi_monitor::tick_rate::TickRateTracker;
use chibi_network::dispatcher::{Dispatcher, DispatchOutcome, RetryPolicy};
use chibi_network::mutation::build_metrics_mutation;
use chibi_network::transport::{HttpTransport, MutationTransport, TransportError, TransportResponse};
use mockito::Matcher;
use serde_json::json;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing_subscriber::layer::SubscriberExt;

struct FixedProbe;

impl ProcessProbe for FixedProbe {
    fn cpu_time_nanos(&self) -> Result<u64, CoreError> {
        Ok(0)
    }

    fn available_cores(&self) -> usize {
        4
    }

    fn memory_counters(&self) -> Result<MemoryCounters, CoreError> {
        Ok(MemoryCounters {
            total_bytes: 256 * 1024 * 1024,
            free_bytes: 0,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("청크 로드 실패")]
struct ChunkError;

fn config_for(server: &mockito::ServerGuard) -> TelemetryConfig {
    TelemetryConfig {
        endpoint: format!("{}/v1/graphql", server.url()),
        admin_secret: "s3cret".to_string(),
        retry_backoff_ms: 10,
        ..TelemetryConfig::default()
    }
}

fn host_loop() -> Arc<HostLoop> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    Arc::new(HostLoop::new(
        Arc::new(TickRateTracker::new(20.0)),
        clock,
        Handle::current(),
    ))
}

fn dispatcher(config: &TelemetryConfig, host: Arc<HostLoop>) -> Dispatcher {
    let transport = Arc::new(HttpTransport::from_config(config).unwrap());
    Dispatcher::new(transport, host, RetryPolicy::from_config(config)).unwrap()
}

async fn wait_until_matched(mock: &mockito::Mock) {
    for _ in 0..250 {
        if mock.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("mock 요청이 도착하지 않음");
}

#[tokio::test]
async fn host_tick_ships_metrics_row() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/graphql")
        .match_header("x-hasura-admin-secret", "s3cret")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "variables": { "memory": 256.0, "onlineUsers": 2, "tps1": 20.0 }
        })))
        .with_status(200)
        .with_body(r#"{"data":{"insert_minecraft_metrics":{"affected_rows":1}}}"#)
        .expect(1)
        .create_async()
        .await;

    let config = config_for(&server);
    let host = host_loop();
    let status = Arc::new(HostStatus::new(Arc::new(TickRateTracker::new(20.0))));
    let sender: Arc<dyn MutationSender> = Arc::new(dispatcher(&config, host.clone()));

    let mut sampler = MetricsSampler::new(
        Arc::new(FixedProbe),
        Arc::new(SystemClock::new()),
        status.clone(),
    );
    sampler.init();
    let mut metrics = MetricsScheduler::new();
    metrics.schedule(
        host.as_ref(),
        sampler,
        sender,
        config.metrics_table.clone(),
        config.interval_ticks,
    );

    // 임베딩 호스트가 수집 시작 후 접속자 수를 갱신
    status.set_online_players(2);

    // 첫 틱에 1회, 다음 실행은 200틱 뒤
    for _ in 0..10 {
        host.tick();
    }

    wait_until_matched(&mock).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn tracked_send_reports_rejection() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/graphql")
        .with_status(401)
        .with_body("invalid admin secret")
        .create_async()
        .await;

    let config = config_for(&server);
    let dispatcher = dispatcher(&config, host_loop());
    let snapshot = chibi_core::models::metrics::MetricsSnapshot {
        timestamp: chrono::Utc::now(),
        tick_rates: chibi_core::models::metrics::TickRates {
            one_minute: 20.0,
            five_minutes: 20.0,
            fifteen_minutes: 20.0,
        },
        cpu_usage_percent: 1.0,
        memory_used_mb: 10.0,
        online_players: 0,
    };

    let outcome = dispatcher
        .send_tracked(build_metrics_mutation(&snapshot, &config.metrics_table))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Rejected { status: 401, attempts: 1, .. }
    ));
}

#[tokio::test]
async fn logged_error_ships_exception_row() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/graphql")
        .match_body(Matcher::PartialJson(json!({
            "variables": {
                "level": "ERROR",
                "logger": "server::world",
                "message": "월드 저장 중단"
            }
        })))
        .with_status(200)
        // 애플리케이션 에러 응답 → 디스패처 경고가 다시 수집되면 안 됨
        .with_body(r#"{"errors":[{"message":"bad input","extensions":{"code":"VALIDATION"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let config = config_for(&server);
    let sender: Arc<dyn MutationSender> = Arc::new(dispatcher(&config, host_loop()));
    let capture = Arc::new(ExceptionCapture::new(
        sender,
        Arc::new(SystemClock::new()),
        config.exception_table.clone(),
    ));
    let subscriber = tracing_subscriber::registry().with(capture.layer());
    let _guard = tracing::subscriber::set_default(subscriber);

    let err = ChunkError;
    tracing::error!(target: "server::world", error = &err as &dyn Error, "월드 저장 중단");

    wait_until_matched(&mock).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    mock.assert_async().await;
}

/// 항상 영구 실패하는 전송 (호출 수 기록)
#[derive(Default)]
struct FailingTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl MutationTransport for FailingTransport {
    async fn post(&self, _body: &[u8]) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::classify("dns error: no such host"))
    }
}

#[tokio::test]
async fn dispatcher_failure_logs_are_not_recaptured() {
    let transport = Arc::new(FailingTransport::default());
    let dispatcher = Dispatcher::new(transport.clone(), host_loop(), RetryPolicy::default()).unwrap();
    let capture = Arc::new(ExceptionCapture::new(
        Arc::new(dispatcher),
        Arc::new(SystemClock::new()),
        "exception_logs",
    ));
    let subscriber = tracing_subscriber::registry().with(capture.layer());
    let _guard = tracing::subscriber::set_default(subscriber);

    let err = ChunkError;
    tracing::error!(target: "server::world", error = &err as &dyn Error, "월드 저장 중단");

    // 디스패처의 영구 실패 ERROR 로그가 재수집되면 호출 수가 계속 늘어난다
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}
