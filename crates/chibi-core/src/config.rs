//! 텔레메트리 설정 구조체.
//!
//! GraphQL 엔드포인트, 관리자 시크릿, 샘플링 주기, 대상 테이블, 재시도 정책 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// 호스트 루프의 초당 틱 수 (틱 → 시간 환산 기준)
pub const TICKS_PER_SECOND: u32 = 20;

/// 텔레메트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// GraphQL 엔드포인트 URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 관리자 시크릿 (공유 비밀값)
    #[serde(default)]
    pub admin_secret: String,
    /// 관리자 시크릿을 싣는 헤더 이름
    #[serde(default = "default_admin_secret_header")]
    pub admin_secret_header: String,
    /// 메트릭 수집 간격 (틱)
    #[serde(default = "default_interval_ticks")]
    pub interval_ticks: u32,
    /// 메트릭 insert 대상 테이블
    #[serde(default = "default_metrics_table")]
    pub metrics_table: String,
    /// 예외 insert 대상 테이블
    #[serde(default = "default_exception_table")]
    pub exception_table: String,
    /// 전송 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 일시적 실패 후 재시도까지 대기 시간 (밀리초)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// HTTP 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 에러 로그의 예외 수집 여부
    #[serde(default = "default_true")]
    pub capture_exceptions: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            admin_secret: String::new(),
            admin_secret_header: default_admin_secret_header(),
            interval_ticks: default_interval_ticks(),
            metrics_table: default_metrics_table(),
            exception_table: default_exception_table(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            capture_exceptions: true,
        }
    }
}

impl TelemetryConfig {
    /// 재시도 백오프 Duration 변환
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// HTTP 요청 타임아웃 Duration 변환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 수집 간격을 실제 시간으로 환산
    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.interval_ticks) * 1_000 / u64::from(TICKS_PER_SECOND))
    }

    /// 설정값 유효성 검증
    ///
    /// 테이블 이름은 mutation 텍스트에 직접 들어가는 유일한 값이므로
    /// GraphQL 식별자 규칙을 만족해야 한다.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.endpoint.trim().is_empty() {
            return Err(validation("endpoint", "엔드포인트가 비어 있음"));
        }
        url::Url::parse(&self.endpoint)
            .map_err(|e| validation("endpoint", &format!("URL 파싱 실패: {e}")))?;

        if self.interval_ticks == 0 {
            return Err(validation("interval_ticks", "0보다 커야 함"));
        }
        if self.max_attempts == 0 {
            return Err(validation("max_attempts", "0보다 커야 함"));
        }
        if self.admin_secret_header.trim().is_empty() {
            return Err(validation("admin_secret_header", "헤더 이름이 비어 있음"));
        }

        for (field, table) in [
            ("metrics_table", &self.metrics_table),
            ("exception_table", &self.exception_table),
        ] {
            if !is_graphql_identifier(table) {
                return Err(validation(
                    field,
                    &format!("GraphQL 식별자가 아님: {table:?}"),
                ));
            }
        }

        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*` 형식인지 확인
pub fn is_graphql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validation(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn default_endpoint() -> String {
    "https://graphql.chibi.art".to_string()
}
fn default_admin_secret_header() -> String {
    "x-hasura-admin-secret".to_string()
}
fn default_interval_ticks() -> u32 {
    200
}
fn default_metrics_table() -> String {
    "minecraft_metrics".to_string()
}
fn default_exception_table() -> String {
    "exception_logs".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TelemetryConfig::default().validate().is_ok());
    }

    #[test]
    fn sampling_period_from_ticks() {
        let config = TelemetryConfig::default();
        assert_eq!(config.sampling_period(), Duration::from_secs(10));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"admin_secret":"s3cret","interval_ticks":40}"#).unwrap();
        assert_eq!(config.admin_secret, "s3cret");
        assert_eq!(config.interval_ticks, 40);
        assert_eq!(config.endpoint, "https://graphql.chibi.art");
        assert_eq!(config.admin_secret_header, "x-hasura-admin-secret");
    }

    #[test]
    fn rejects_injected_table_name() {
        let config = TelemetryConfig {
            metrics_table: "metrics(objects: {}) { x } } mutation { drop".to_string(),
            ..TelemetryConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "metrics_table"));
    }

    #[test]
    fn rejects_zero_interval_and_attempts() {
        let config = TelemetryConfig {
            interval_ticks: 0,
            ..TelemetryConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TelemetryConfig {
            max_attempts: 0,
            ..TelemetryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_endpoint() {
        let config = TelemetryConfig {
            endpoint: "not a url".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn identifier_rules() {
        assert!(is_graphql_identifier("minecraft_metrics"));
        assert!(is_graphql_identifier("_private1"));
        assert!(!is_graphql_identifier(""));
        assert!(!is_graphql_identifier("1metrics"));
        assert!(!is_graphql_identifier("exception-logs"));
    }
}
