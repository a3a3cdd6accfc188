//! mutation 전송 포트.
//!
//! 구현: `chibi-network` crate (`Dispatcher`)

use crate::models::dispatch::DispatchRequest;

/// fire-and-forget mutation 전송
///
/// 호출자를 막지 않으며 결과는 로그로만 관찰된다.
/// 여러 스레드에서 동시에 호출될 수 있다.
pub trait MutationSender: Send + Sync {
    /// 요청 전송 시작
    fn send(&self, request: DispatchRequest);
}
