//! # chibi-monitor
//!
//! 서버 상태 샘플링 어댑터.
//! 프로세스 CPU 시간/메모리 카운터(sysinfo), 단조 시계, 틱 레이트 추적기를 제공하고
//! 이를 묶어 `MetricsSnapshot`을 만드는 `MetricsSampler`를 구현한다.

pub mod clock;
pub mod process;
pub mod sampler;
pub mod tick_rate;
