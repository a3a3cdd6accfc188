//! chibi-telemetry 도메인 모델.
//!
//! 샘플러, 페이로드 빌더, 디스패처가 주고받는 데이터 구조체를 정의한다.

pub mod dispatch;
pub mod exception;
pub mod metrics;
