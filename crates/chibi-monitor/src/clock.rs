//! 단조 시계: `Clock` 포트 구현.

use chibi_core::ports::host::Clock;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// `Instant` 기준점으로부터의 경과 시간을 나노초로 반환하는 시계
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_nanos(&self) -> u64 {
        u64::try_from(self.anchor.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
