//! 메트릭 수집 스케줄러.
//!
//! 호스트 반복 작업으로 `sample → build_metrics_mutation → send`를 실행한다.
//! 샘플러는 반복 작업 클로저가 단독 소유하므로 CPU 기준점의 쓰기 주체는 하나뿐이다.

use chibi_core::ports::dispatch::MutationSender;
use chibi_core::ports::task::{TaskHandle, TaskScheduler};
use chibi_monitor::sampler::MetricsSampler;
use chibi_network::mutation::build_metrics_mutation;
use std::sync::Arc;
use tracing::{info, warn};

/// 메트릭 스케줄러 (등록 핸들만 보관)
#[derive(Default)]
pub struct MetricsScheduler {
    handle: Option<TaskHandle>,
}

impl MetricsScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 반복 작업 등록
    ///
    /// 이미 등록된 작업이 있으면 취소하고 새로 등록한다.
    /// 샘플링 실패는 이번 주기만 건너뛰고 등록은 유지된다.
    pub fn schedule(
        &mut self,
        scheduler: &dyn TaskScheduler,
        mut sampler: MetricsSampler,
        sender: Arc<dyn MutationSender>,
        metrics_table: String,
        interval_ticks: u32,
    ) -> TaskHandle {
        self.cancel();

        let handle = scheduler.schedule_repeating(
            interval_ticks,
            Box::new(move || match sampler.sample() {
                Ok(snapshot) => sender.send(build_metrics_mutation(&snapshot, &metrics_table)),
                Err(e) => warn!("메트릭 샘플링 실패, 이번 주기 건너뜀: {e}"),
            }),
        );
        info!("메트릭 수집 등록: {interval_ticks}틱 간격");

        self.handle = Some(handle.clone());
        handle
    }

    /// 등록된 작업 취소
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            info!("메트릭 수집 중지");
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_cancelled())
    }
}
