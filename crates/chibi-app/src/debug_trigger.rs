//! 테스트 예외 트리거 (`--throw-exception <1|2>`).
//!
//! 수집 경로 점검용. 1번은 잘못된 상태 에러를 에러 로그로 남기고,
//! 2번은 이름 붙은 스레드에서 값 없음 패닉을 일으킨다.

use thiserror::Error;
use tracing::{error, info, warn};

/// 테스트 예외 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestException {
    IllegalState,
    MissingValue,
}

impl TestException {
    pub fn from_kind(kind: u8) -> Option<Self> {
        match kind {
            1 => Some(Self::IllegalState),
            2 => Some(Self::MissingValue),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("테스트 예외: 잘못된 상태 (kind=1)")]
pub struct IllegalStateError;

/// 예외 발생
///
/// 값 없음 패닉은 별도 스레드에서 일어나며 호출자는 계속 실행된다.
pub fn throw(exception: TestException) {
    info!("테스트 예외 발생: {exception:?}");
    match exception {
        TestException::IllegalState => {
            let err = IllegalStateError;
            error!(error = &err as &dyn std::error::Error, "테스트 명령 실행 실패");
        }
        TestException::MissingValue => {
            let result = std::thread::Builder::new()
                .name("debug-trigger".to_string())
                .spawn(|| {
                    let value: Option<&str> = None;
                    match value {
                        Some(v) => v.len(),
                        None => panic!("테스트 예외: 값 없음 (kind=2)"),
                    }
                })
                .map(|handle| handle.join());

            match result {
                Ok(Err(_)) => info!("테스트 패닉 스레드 종료"),
                Ok(Ok(_)) => warn!("테스트 패닉이 발생하지 않음"),
                Err(e) => warn!("테스트 스레드 생성 실패: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_exceptions() {
        assert_eq!(TestException::from_kind(1), Some(TestException::IllegalState));
        assert_eq!(TestException::from_kind(2), Some(TestException::MissingValue));
        assert_eq!(TestException::from_kind(3), None);
    }

    #[test]
    fn missing_value_does_not_unwind_into_caller() {
        throw(TestException::MissingValue);
    }
}
