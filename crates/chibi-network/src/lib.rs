//! # chibi-network
//!
//! GraphQL mutation 전송 어댑터.
//! 스냅샷/예외 리포트를 mutation 요청으로 만들고, HTTP POST로 전송하며
//! 연결/스트림 종료 같은 일시적 실패는 고정 백오프로 재시도한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use chibi_network::dispatcher::{Dispatcher, RetryPolicy};
//! use chibi_network::mutation::build_metrics_mutation;
//! use chibi_network::transport::HttpTransport;
//!
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let dispatcher = Dispatcher::new(transport, scheduler, RetryPolicy::from_config(&config))?;
//! dispatcher.send(build_metrics_mutation(&snapshot, &config.metrics_table));
//! ```

pub mod dispatcher;
pub mod mutation;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;
