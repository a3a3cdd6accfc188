//! 서버 상태 메트릭 모델.
//!
//! 틱 레이트, CPU/메모리 사용량, 접속자 수 등 한 시점의 서버 상태를 표현.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 메트릭 스냅샷 (수집 주기마다 1개 생성, 불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// 수집 시각
    pub timestamp: DateTime<Utc>,
    /// 1/5/15분 틱 레이트
    pub tick_rates: TickRates,
    /// 프로세스 CPU 사용률 (0.0 ~ 100.0 × 코어 수 기준 정규화)
    pub cpu_usage_percent: f64,
    /// 사용 중 메모리 (MB)
    pub memory_used_mb: f64,
    /// 접속 중 플레이어 수
    pub online_players: u32,
}

/// 1/5/15분 평균 틱 레이트 (TPS)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickRates {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
}

/// 호스트 런타임 메모리 카운터 (바이트)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryCounters {
    /// 할당 가능한 전체 메모리
    pub total_bytes: u64,
    /// 그 중 비어 있는 메모리
    pub free_bytes: u64,
}

impl MemoryCounters {
    /// 사용 중 메모리 (MB), `(total − free) / 1024²`
    pub fn used_mb(&self) -> f64 {
        self.total_bytes.saturating_sub(self.free_bytes) as f64 / (1024.0 * 1024.0)
    }
}
