//! 호스트 작업 스케줄러 포트.
//!
//! 반복 작업은 호스트 루프의 틱에 맞춰 실행되고,
//! 지연 작업은 호스트 루프를 막지 않고 한 번 실행된다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 반복 작업 콜백
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// 지연 작업 콜백
pub type DelayedTask = Box<dyn FnOnce() + Send + 'static>;

/// 호스트 작업 등록 인터페이스
pub trait TaskScheduler: Send + Sync {
    /// `interval_ticks` 틱마다 `task` 실행 (등록 직후 첫 틱에 1회 실행)
    fn schedule_repeating(&self, interval_ticks: u32, task: RepeatingTask) -> TaskHandle;

    /// `delay` 후 `task`를 한 번 실행
    fn schedule_delayed(&self, delay: Duration, task: DelayedTask);
}

/// 반복 작업 등록 핸들
///
/// 복제본끼리 취소 상태를 공유한다.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// 새 핸들 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 작업 취소 (이후 틱부터 실행되지 않음)
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// 취소 여부
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
