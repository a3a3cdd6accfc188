//! 틱 레이트 추적기.
//!
//! 호스트 루프의 틱 시각을 받아 1/5/15분 지수 이동 평균 TPS를 유지한다.
//! 20틱마다 구간 TPS를 계산해 평균에 반영하며, 목표 TPS를 넘지 않는다.

use chibi_core::models::metrics::TickRates;
use parking_lot::Mutex;

/// 구간 TPS를 계산하는 틱 수
const WINDOW_TICKS: u32 = 20;

const ONE_MINUTE_SECS: f64 = 60.0;
const FIVE_MINUTES_SECS: f64 = 300.0;
const FIFTEEN_MINUTES_SECS: f64 = 900.0;

#[derive(Debug)]
struct TrackerState {
    window_start_nanos: Option<u64>,
    ticks_in_window: u32,
    rates: TickRates,
}

/// 틱 레이트 추적기 (여러 스레드에서 읽기 가능)
#[derive(Debug)]
pub struct TickRateTracker {
    target_tps: f64,
    state: Mutex<TrackerState>,
}

impl TickRateTracker {
    /// 목표 TPS로 초기화된 추적기 생성
    pub fn new(target_tps: f64) -> Self {
        Self {
            target_tps,
            state: Mutex::new(TrackerState {
                window_start_nanos: None,
                ticks_in_window: 0,
                rates: TickRates {
                    one_minute: target_tps,
                    five_minutes: target_tps,
                    fifteen_minutes: target_tps,
                },
            }),
        }
    }

    /// 틱 1회 기록 (`now_nanos`는 단조 시각)
    pub fn record_tick(&self, now_nanos: u64) {
        let mut state = self.state.lock();

        let Some(start) = state.window_start_nanos else {
            state.window_start_nanos = Some(now_nanos);
            state.ticks_in_window = 0;
            return;
        };

        state.ticks_in_window += 1;
        if state.ticks_in_window < WINDOW_TICKS {
            return;
        }

        let elapsed_nanos = now_nanos.saturating_sub(start);
        let ticks = state.ticks_in_window;
        state.window_start_nanos = Some(now_nanos);
        state.ticks_in_window = 0;

        if elapsed_nanos == 0 {
            return;
        }

        let elapsed_secs = elapsed_nanos as f64 / 1_000_000_000.0;
        let tps = (f64::from(ticks) / elapsed_secs).min(self.target_tps);

        let rates = &mut state.rates;
        rates.one_minute = ewma(rates.one_minute, tps, elapsed_secs, ONE_MINUTE_SECS);
        rates.five_minutes = ewma(rates.five_minutes, tps, elapsed_secs, FIVE_MINUTES_SECS);
        rates.fifteen_minutes = ewma(rates.fifteen_minutes, tps, elapsed_secs, FIFTEEN_MINUTES_SECS);
    }

    /// 현재 1/5/15분 평균
    pub fn rates(&self) -> TickRates {
        self.state.lock().rates
    }
}

fn ewma(previous: f64, sample: f64, elapsed_secs: f64, window_secs: f64) -> f64 {
    let decay = (-elapsed_secs / window_secs).exp();
    previous * decay + sample * (1.0 - decay)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    fn run(tracker: &TickRateTracker, start: u64, ticks: u64, tick_nanos: u64) -> u64 {
        let mut now = start;
        for _ in 0..ticks {
            tracker.record_tick(now);
            now += tick_nanos;
        }
        now
    }

    #[test]
    fn starts_at_target() {
        let tracker = TickRateTracker::new(20.0);
        let rates = tracker.rates();
        assert_eq!(rates.one_minute, 20.0);
        assert_eq!(rates.fifteen_minutes, 20.0);
    }

    #[test]
    fn steady_full_speed_stays_at_target() {
        let tracker = TickRateTracker::new(20.0);
        run(&tracker, 0, 20 * 120, 50 * MS);
        let rates = tracker.rates();
        assert!((rates.one_minute - 20.0).abs() < 1e-9);
        assert!((rates.five_minutes - 20.0).abs() < 1e-9);
    }

    #[test]
    fn fast_ticks_are_capped() {
        let tracker = TickRateTracker::new(20.0);
        run(&tracker, 0, 20 * 60, 10 * MS);
        assert!(tracker.rates().one_minute <= 20.0);
    }

    #[test]
    fn slow_ticks_pull_short_window_first() {
        let tracker = TickRateTracker::new(20.0);
        // 10 TPS로 15분
        run(&tracker, 0, 10 * 900, 100 * MS);
        let rates = tracker.rates();
        assert!(rates.one_minute < 10.5);
        assert!(rates.five_minutes < rates.fifteen_minutes);
        assert!(rates.fifteen_minutes < 20.0);
    }
}
