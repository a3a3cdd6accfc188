//! chibi-telemetry 핵심 에러 타입.
//!
//! 어댑터 crate는 자체 에러 타입을 두더라도 경계에서는 `CoreError`로 변환한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 유효성 검증, 샘플링 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 네트워크 에러 (클라이언트 생성 실패 등)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 호스트 카운터 읽기 실패 (CPU 시간, 메모리)
    #[error("샘플링 에러: {0}")]
    Sampling(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}
