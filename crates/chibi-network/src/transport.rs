//! mutation HTTP 전송.
//!
//! `MutationTransport`는 본문 1개를 POST하고 완료된 응답(상태 코드 + 본문)을 돌려준다.
//! 요청 자체가 끝나지 못한 경우만 `TransportError`이며,
//! 에러 체인의 h2/hyper/io 에러로 일시적(연결/스트림 종료)/영구 실패를 구분한다.

use async_trait::async_trait;
use chibi_core::config::TelemetryConfig;
use chibi_core::error::CoreError;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 연결/스트림 종료를 나타내는 사유 문자열 (소문자 비교)
///
/// h2는 피어가 보낸 GOAWAY/RST_STREAM을 "connection error received" /
/// "stream error received"로 표시한다.
const TERMINATION_MARKERS: &[&str] = &[
    "connection error received",
    "stream error received",
    "connection reset",
    "connection closed",
    "broken pipe",
    "stream closed",
    "unexpected eof",
];

/// 완료된 HTTP 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// 요청이 완료되지 못한 전송 실패
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// 피어가 연결/스트림을 끊음: 재시도 대상
    #[error("연결/스트림 종료: {0}")]
    Terminated(String),

    /// 그 밖의 실패 (DNS, 연결 거부, 타임아웃 등): 재시도하지 않음
    #[error("전송 실패: {0}")]
    Failed(String),
}

impl TransportError {
    /// 에러와 `source()` 체인으로 분류
    ///
    /// 체인에 피어 종료를 나타내는 에러가 있으면 일시적 실패, 없으면 텍스트로 판단한다.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let reason = error_chain_text(err);
        if is_peer_termination(err) {
            Self::Terminated(reason)
        } else {
            Self::classify(reason)
        }
    }

    /// 사유 텍스트로 분류
    pub fn classify(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let lower = reason.to_lowercase();
        if TERMINATION_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Terminated(reason)
        } else {
            Self::Failed(reason)
        }
    }

    /// 재시도 가능한 실패인지
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    /// 원래 사유 텍스트
    pub fn reason(&self) -> &str {
        match self {
            Self::Terminated(reason) | Self::Failed(reason) => reason,
        }
    }
}

/// 체인 안에 피어의 GOAWAY/RST_STREAM, 응답 도중 끊긴 연결이 있는지
fn is_peer_termination(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(h2_err) = e.downcast_ref::<h2::Error>() {
            if h2_err.is_remote() && (h2_err.is_go_away() || h2_err.is_reset()) {
                return true;
            }
        }
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// 에러와 `source()` 체인 전체를 `a: b: c` 형식으로 연결
///
/// reqwest 에러의 최상위 메시지에는 GOAWAY 같은 하위 사유가 나타나지 않는다.
pub fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// mutation 본문 전송 포트
#[async_trait]
pub trait MutationTransport: Send + Sync {
    /// JSON 본문 POST 후 응답 대기
    async fn post(&self, body: &[u8]) -> Result<TransportResponse, TransportError>;
}

/// reqwest 기반 HTTP 전송: `MutationTransport` 구현
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    secret_header: HeaderName,
    secret_value: HeaderValue,
}

impl HttpTransport {
    /// 새 HTTP 전송 생성
    pub fn new(
        endpoint: &str,
        secret_header: &str,
        admin_secret: &str,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {}", e)))?;

        Self::with_client(client, endpoint, secret_header, admin_secret)
    }

    /// 이미 구성된 reqwest 클라이언트로 생성
    pub fn with_client(
        client: reqwest::Client,
        endpoint: &str,
        secret_header: &str,
        admin_secret: &str,
    ) -> Result<Self, CoreError> {
        let secret_header = HeaderName::from_bytes(secret_header.as_bytes())
            .map_err(|e| CoreError::Config(format!("잘못된 시크릿 헤더 이름: {e}")))?;
        let mut secret_value = HeaderValue::from_str(admin_secret)
            .map_err(|e| CoreError::Config(format!("잘못된 시크릿 헤더 값: {e}")))?;
        secret_value.set_sensitive(true);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            secret_header,
            secret_value,
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, CoreError> {
        Self::new(
            &config.endpoint,
            &config.admin_secret_header,
            &config.admin_secret,
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl MutationTransport for HttpTransport {
    async fn post(&self, body: &[u8]) -> Result<TransportResponse, TransportError> {
        debug!("mutation POST: {} ({} bytes)", self.endpoint, body.len());

        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(self.secret_header.clone(), self.secret_value.clone())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| TransportError::from_error(&e))?;

        let status = resp.status().as_u16();
        // 본문 수신 중 스트림이 끊기는 경우도 전송 실패로 본다
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_error(&e))?;

        Ok(TransportResponse { status, body })
    }
}
