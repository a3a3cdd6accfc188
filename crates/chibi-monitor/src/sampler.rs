//! 메트릭 샘플러.
//!
//! 호스트 카운터(CPU 시간, 단조 시계, 코어 수, 틱 레이트, 접속자 수, 메모리)를
//! 읽어 `MetricsSnapshot`을 만든다. CPU 사용률은 직전 샘플 대비 델타로 계산한다.

use chibi_core::error::CoreError;
use chibi_core::models::metrics::MetricsSnapshot;
use chibi_core::ports::host::{Clock, ProcessProbe, ServerStatus};
use std::sync::Arc;
use tracing::{debug, warn};

/// CPU 델타 기준점
///
/// 샘플러 인스턴스가 단독 소유하며 `sample()`에서만 갱신된다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSampleState {
    last_cpu_time_nanos: Option<u64>,
    last_wall_time_nanos: Option<u64>,
}

impl CpuSampleState {
    /// 기준점 없는 상태
    pub fn new() -> Self {
        Self::default()
    }

    /// 직전 샘플의 프로세스 CPU 시간
    pub fn last_cpu_time_nanos(&self) -> Option<u64> {
        self.last_cpu_time_nanos
    }

    /// 직전 샘플의 단조 시각
    pub fn last_wall_time_nanos(&self) -> Option<u64> {
        self.last_wall_time_nanos
    }

    /// 기준점 덮어쓰기
    pub fn reset(&mut self, cpu_time_nanos: u64, wall_time_nanos: u64) {
        self.last_cpu_time_nanos = Some(cpu_time_nanos);
        self.last_wall_time_nanos = Some(wall_time_nanos);
    }

    /// 새 관측값으로 CPU 사용률 계산 후 기준점 갱신
    ///
    /// - 기준점이 없으면 0을 반환하고 기준점만 기록한다.
    /// - 경과 시간이 0이면 0을 반환하고 기준점을 유지한다.
    pub fn advance(&mut self, cpu_time_nanos: u64, wall_time_nanos: u64, cores: usize) -> f64 {
        let (Some(last_cpu), Some(last_wall)) =
            (self.last_cpu_time_nanos, self.last_wall_time_nanos)
        else {
            self.reset(cpu_time_nanos, wall_time_nanos);
            return 0.0;
        };

        let elapsed = wall_time_nanos.saturating_sub(last_wall);
        if elapsed == 0 {
            return 0.0;
        }

        let cpu_delta = cpu_time_nanos.saturating_sub(last_cpu);
        self.reset(cpu_time_nanos, wall_time_nanos);
        cpu_usage_percent(cpu_delta, elapsed, cores)
    }
}

/// `(cpu_delta / (elapsed × cores)) × 100`
///
/// 경과 시간이나 코어 수가 0이면 나누지 않고 0을 반환한다.
pub fn cpu_usage_percent(cpu_delta_nanos: u64, elapsed_nanos: u64, cores: usize) -> f64 {
    if elapsed_nanos == 0 || cores == 0 {
        return 0.0;
    }
    (cpu_delta_nanos as f64 / (elapsed_nanos as f64 * cores as f64)) * 100.0
}

/// 메트릭 샘플러
pub struct MetricsSampler {
    probe: Arc<dyn ProcessProbe>,
    clock: Arc<dyn Clock>,
    status: Arc<dyn ServerStatus>,
    cpu_state: CpuSampleState,
}

impl MetricsSampler {
    /// 새 샘플러 생성 (기준점 없음)
    pub fn new(
        probe: Arc<dyn ProcessProbe>,
        clock: Arc<dyn Clock>,
        status: Arc<dyn ServerStatus>,
    ) -> Self {
        Self {
            probe,
            clock,
            status,
            cpu_state: CpuSampleState::new(),
        }
    }

    /// CPU 기준점 기록
    ///
    /// CPU 시간을 읽지 못하면 경고만 남기고 기준점 없이 둔다.
    /// 이 경우 첫 `sample()`이 기준점을 잡는다.
    pub fn init(&mut self) {
        match self.probe.cpu_time_nanos() {
            Ok(cpu) => {
                let wall = self.clock.monotonic_nanos();
                self.cpu_state.reset(cpu, wall);
                debug!("CPU 기준점 기록: cpu={cpu}ns, wall={wall}ns");
            }
            Err(e) => warn!("CPU 기준점 기록 실패: {e}"),
        }
    }

    /// 현재 CPU 기준점
    pub fn cpu_state(&self) -> &CpuSampleState {
        &self.cpu_state
    }

    /// 스냅샷 1개 수집
    pub fn sample(&mut self) -> Result<MetricsSnapshot, CoreError> {
        let cpu_now = self.probe.cpu_time_nanos()?;
        let wall_now = self.clock.monotonic_nanos();
        let memory = self.probe.memory_counters()?;

        let cores = self.probe.available_cores();
        let cpu_usage_percent = self.cpu_state.advance(cpu_now, wall_now, cores);

        let snapshot = MetricsSnapshot {
            timestamp: self.clock.now_utc(),
            tick_rates: self.status.tick_rates(),
            cpu_usage_percent,
            memory_used_mb: memory.used_mb(),
            online_players: self.status.online_players(),
        };

        debug!(
            "메트릭 샘플: TPS {:.2}/{:.2}/{:.2}, CPU {:.2}%, 메모리 {:.1}MB, 접속자 {}",
            snapshot.tick_rates.one_minute,
            snapshot.tick_rates.five_minutes,
            snapshot.tick_rates.fifteen_minutes,
            snapshot.cpu_usage_percent,
            snapshot.memory_used_mb,
            snapshot.online_players
        );

        Ok(snapshot)
    }
}
