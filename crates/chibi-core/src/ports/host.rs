//! 호스트 협력자 포트.
//!
//! 구현: `chibi-monitor` crate (sysinfo, 단조 시계, 틱 레이트 추적기)
//! 및 `chibi-app`의 호스트 루프.

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::metrics::{MemoryCounters, TickRates};

/// 프로세스 자원 카운터
pub trait ProcessProbe: Send + Sync {
    /// 프로세스 누적 CPU 시간 (나노초)
    fn cpu_time_nanos(&self) -> Result<u64, CoreError>;

    /// 논리 프로세서 수
    fn available_cores(&self) -> usize;

    /// 런타임 메모리 카운터
    fn memory_counters(&self) -> Result<MemoryCounters, CoreError>;
}

/// 시계
pub trait Clock: Send + Sync {
    /// 단조 증가 시각 (나노초, 기준점은 구현 정의)
    fn monotonic_nanos(&self) -> u64;

    /// 현재 UTC 시각
    fn now_utc(&self) -> DateTime<Utc>;
}

/// 서버 상태 (틱 레이트, 접속자 수)
pub trait ServerStatus: Send + Sync {
    /// 1/5/15분 평균 틱 레이트
    fn tick_rates(&self) -> TickRates;

    /// 접속 중 플레이어 수
    fn online_players(&self) -> u32;
}
