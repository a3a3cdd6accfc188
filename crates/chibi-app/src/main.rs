//! # chibi-telemetry
//!
//! 텔레메트리 바이너리 진입점.
//! 설정 로드, 어댑터 조립(DI), 호스트 루프/메트릭 수집/예외 수집 시작, 종료 처리.

use anyhow::{Context, Result};
use chibi_app::capture::{install_panic_hook, ExceptionCapture, ExceptionCaptureLayer};
use chibi_app::debug_trigger::{self, TestException};
use chibi_app::host_loop::{HostLoop, HostStatus};
use chibi_app::lifecycle::LifecycleManager;
use chibi_app::scheduler::MetricsScheduler;
use chibi_core::config::TICKS_PER_SECOND;
use chibi_core::config_manager::ConfigManager;
use chibi_core::ports::dispatch::MutationSender;
use chibi_core::ports::host::Clock;
use chibi_monitor::clock::SystemClock;
use chibi_monitor::process::SysInfoProbe;
use chibi_monitor::sampler::MetricsSampler;
use chibi_monitor::tick_rate::TickRateTracker;
use chibi_network::dispatcher::{Dispatcher, RetryPolicy};
use chibi_network::transport::HttpTransport;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// 서버 상태 메트릭/예외 텔레메트리 에이전트
#[derive(Parser, Debug)]
#[command(name = "chibi-telemetry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// GraphQL 엔드포인트 URL 덮어쓰기
    #[arg(long, short = 'e')]
    endpoint: Option<String>,

    /// 메트릭 수집 간격 덮어쓰기 (틱, 20틱 = 1초)
    #[arg(long)]
    interval_ticks: Option<u32>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 시작 후 테스트 예외 발생 (1: 잘못된 상태, 2: 값 없음)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    throw_exception: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let capture_layer = ExceptionCaptureLayer::default();
    init_tracing(&args.log_level, capture_layer.clone());

    // 설정
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("설정 로드 실패")?
    .with_env_overrides()
    .with_overrides(args.endpoint.clone(), None);

    let mut config = manager.get();
    if let Some(interval_ticks) = args.interval_ticks {
        config.interval_ticks = interval_ticks;
    }
    config.validate().context("설정 검증 실패")?;

    info!(
        "chibi-telemetry 시작: endpoint={}, 간격={}틱 ({:?}), 설정={}",
        config.endpoint,
        config.interval_ticks,
        config.sampling_period(),
        manager.config_path().display()
    );

    // 호스트 협력자
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let tracker = Arc::new(TickRateTracker::new(f64::from(TICKS_PER_SECOND)));
    let host = Arc::new(HostLoop::new(tracker.clone(), clock.clone(), Handle::current()));
    // 접속자 수는 임베딩 호스트가 갱신한다 (단독 실행 시 0)
    let status = Arc::new(HostStatus::new(tracker));
    let probe = Arc::new(SysInfoProbe::new().context("프로세스 프로브 생성 실패")?);

    // 전송
    let transport = Arc::new(HttpTransport::from_config(&config).context("HTTP 전송 생성 실패")?);
    let dispatcher: Arc<dyn MutationSender> = Arc::new(
        Dispatcher::new(transport, host.clone(), RetryPolicy::from_config(&config))
            .context("디스패처 생성 실패")?,
    );

    // 예외 수집
    if config.capture_exceptions {
        let capture = Arc::new(ExceptionCapture::new(
            dispatcher.clone(),
            clock.clone(),
            config.exception_table.clone(),
        ));
        capture_layer.attach(capture);
        install_panic_hook();
        info!("예외 수집 활성화: {}", config.exception_table);
    }

    // 메트릭 수집
    let mut sampler = MetricsSampler::new(probe, clock, status);
    sampler.init();
    let mut metrics = MetricsScheduler::new();
    metrics.schedule(
        host.as_ref(),
        sampler,
        dispatcher,
        config.metrics_table.clone(),
        config.interval_ticks,
    );

    // 라이프사이클
    let lifecycle = Arc::new(LifecycleManager::new());
    let host_task = {
        let host = host.clone();
        let shutdown_rx = lifecycle.subscribe();
        tokio::spawn(async move { host.run(shutdown_rx).await })
    };

    if let Some(exception) = args.throw_exception.and_then(TestException::from_kind) {
        debug_trigger::throw(exception);
    }

    let reason = lifecycle.run_until_shutdown().await;
    info!("종료 시작: {reason}");

    metrics.cancel();
    if let Err(e) = host_task.await {
        error!(error = &e as &dyn std::error::Error, "호스트 루프 태스크 비정상 종료");
    }

    info!("chibi-telemetry 종료");
    Ok(())
}

/// tracing 구독자 설치 (EnvFilter + fmt + 예외 수집)
///
/// `RUST_LOG`가 있으면 우선한다. 예외 수집 레이어는 로그 필터와 무관하게 ERROR 이벤트를 모두 본다.
fn init_tracing(log_level: &str, capture_layer: ExceptionCaptureLayer) {
    let log_filter = format!(
        "chibi_telemetry={log_level},chibi_app={log_level},chibi_core={log_level},chibi_monitor={log_level},chibi_network={log_level},panic={log_level}"
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(env_filter))
        .with(capture_layer.with_filter(LevelFilter::ERROR))
        .init();
}
