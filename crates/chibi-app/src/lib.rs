//! # chibi-app
//!
//! chibi-telemetry 호스트 측 구성 요소.
//! 20 TPS 호스트 루프, 메트릭 스케줄러, 에러 로그 예외 수집, 라이프사이클 관리.
//! 바이너리(`chibi-telemetry`)는 `main.rs`에서 이들을 조립한다.

pub mod capture;
pub mod debug_trigger;
pub mod host_loop;
pub mod lifecycle;
pub mod scheduler;
