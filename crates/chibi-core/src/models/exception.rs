//! 예외 리포트 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 에러 로그에서 수집한 예외 1건 (불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionReport {
    /// 수집 시각
    pub timestamp: DateTime<Utc>,
    /// 로그 레벨 (항상 "ERROR")
    pub level: String,
    /// 로그를 남긴 소스 (tracing target)
    pub source_name: String,
    /// 로그를 남긴 스레드 이름
    pub thread_name: String,
    /// 로그 메시지 또는 에러 메시지
    pub message: Option<String>,
    /// 에러 원인 체인 + 백트레이스 텍스트
    pub stacktrace: String,
}
