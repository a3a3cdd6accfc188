//! 호스트 루프.
//!
//! 초당 20틱으로 돌며 매 틱마다 틱 레이트를 기록하고 실행 시점이 된 반복 작업을 실행한다.
//! `TaskScheduler` 포트를 구현한다. 지연 작업은 루프 밖 tokio 태스크에서 실행된다.

use chibi_core::config::TICKS_PER_SECOND;
use chibi_core::models::metrics::TickRates;
use chibi_core::ports::host::{Clock, ServerStatus};
use chibi_core::ports::task::{DelayedTask, RepeatingTask, TaskHandle, TaskScheduler};
use chibi_monitor::tick_rate::TickRateTracker;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// 틱 1회 길이 (50ms)
pub const TICK_DURATION: Duration = Duration::from_millis(1_000 / TICKS_PER_SECOND as u64);

struct ScheduledTask {
    interval_ticks: u64,
    next_tick: u64,
    handle: TaskHandle,
    task: RepeatingTask,
}

/// 호스트 루프: `TaskScheduler` 포트 구현
pub struct HostLoop {
    tasks: Mutex<Vec<ScheduledTask>>,
    tracker: Arc<TickRateTracker>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    current_tick: AtomicU64,
}

impl HostLoop {
    pub fn new(tracker: Arc<TickRateTracker>, clock: Arc<dyn Clock>, runtime: Handle) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            tracker,
            clock,
            runtime,
            current_tick: AtomicU64::new(0),
        }
    }

    /// 지금까지 실행한 틱 수
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// 등록된 (취소되지 않은) 반복 작업 수
    pub fn task_count(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// 틱 1회 실행
    pub fn tick(&self) {
        let tick = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;
        self.tracker.record_tick(self.clock.monotonic_nanos());

        // 작업 실행 중 새 작업 등록이 가능하도록 잠금 밖에서 실행
        let mut due = std::mem::take(&mut *self.tasks.lock());
        due.retain(|t| !t.handle.is_cancelled());

        for entry in due.iter_mut().filter(|t| t.next_tick <= tick) {
            entry.next_tick = tick + entry.interval_ticks;
            if panic::catch_unwind(AssertUnwindSafe(|| (entry.task)())).is_err() {
                error!("반복 작업 패닉 (틱 {tick}), 다음 주기에 계속 실행");
            }
        }

        let mut tasks = self.tasks.lock();
        due.append(&mut tasks);
        *tasks = due;
    }

    /// 종료 신호까지 20 TPS로 루프 실행
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("호스트 루프 시작: {}ms/틱", TICK_DURATION.as_millis());

        let mut interval = tokio::time::interval(TICK_DURATION);
        // 밀린 틱은 몰아서 실행하지 않는다 (지연이 틱 레이트에 반영됨)
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("호스트 루프 종료 (틱 {})", self.current_tick());
                        break;
                    }
                }
            }
        }
    }
}

impl TaskScheduler for HostLoop {
    fn schedule_repeating(&self, interval_ticks: u32, task: RepeatingTask) -> TaskHandle {
        let handle = TaskHandle::new();
        let interval_ticks = u64::from(interval_ticks.max(1));
        self.tasks.lock().push(ScheduledTask {
            interval_ticks,
            next_tick: self.current_tick() + 1,
            handle: handle.clone(),
            task,
        });
        debug!("반복 작업 등록: {interval_ticks}틱 간격");
        handle
    }

    fn schedule_delayed(&self, delay: Duration, task: DelayedTask) {
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

/// 서버 상태: `ServerStatus` 포트 구현
///
/// 틱 레이트는 추적기에서 읽는다. 접속자 수는 이 크레이트를 임베딩한 호스트가
/// 접속/퇴장 시 `set_online_players`로 갱신하는 카운터이며, 단독 실행 바이너리에는
/// 접속자 개념이 없으므로 0으로 보고된다.
pub struct HostStatus {
    tracker: Arc<TickRateTracker>,
    online_players: AtomicU32,
}

impl HostStatus {
    pub fn new(tracker: Arc<TickRateTracker>) -> Self {
        Self {
            tracker,
            online_players: AtomicU32::new(0),
        }
    }

    /// 접속자 수 갱신 (다음 수집부터 반영)
    pub fn set_online_players(&self, count: u32) {
        self.online_players.store(count, Ordering::Relaxed);
    }
}

impl ServerStatus for HostStatus {
    fn tick_rates(&self) -> TickRates {
        self.tracker.rates()
    }

    fn online_players(&self) -> u32 {
        self.online_players.load(Ordering::Relaxed)
    }
}
