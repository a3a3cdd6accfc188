//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 각 어댑터 crate가 이 trait들을 구현하며,
//! `chibi-app`에서 `Arc<dyn T>`로 와이어링한다.

pub mod dispatch;
pub mod host;
pub mod task;
