//! # chibi-core
//!
//! chibi-telemetry 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 도메인 데이터 구조체 (메트릭 스냅샷, 예외 리포트, 전송 요청)
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (호스트 협력자, 스케줄러, 전송)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 텔레메트리 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
