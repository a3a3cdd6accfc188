//! GraphQL mutation 페이로드 빌더.
//!
//! 순수 함수만 둔다 (I/O 없음, 실패 없음).
//! 값은 모두 `variables`로 전달하고, 쿼리 텍스트에는 테이블 이름만 들어간다.
//! 테이블 이름은 설정 로드 시 식별자 검증을 거친다.

use chibi_core::models::dispatch::DispatchRequest;
use chibi_core::models::exception::ExceptionReport;
use chibi_core::models::metrics::MetricsSnapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// `timestamptz` 변수용 RFC 3339 문자열 (`2024-01-01T00:00:00Z`)
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// 메트릭 1행 insert mutation
pub fn build_metrics_mutation(snapshot: &MetricsSnapshot, metrics_table: &str) -> DispatchRequest {
    let query = format!(
        "mutation InsertMetrics($time: timestamptz!, $tps1: float8!, $tps5: float8!, $tps15: float8!, \
         $cpu: float8!, $memory: float8!, $onlineUsers: Int!) {{ \
         insert_{metrics_table}(objects: {{ \
         time: $time, tps_1min: $tps1, tps_5min: $tps5, tps_15min: $tps15, \
         cpu_usage: $cpu, memory_usage: $memory, online_users: $onlineUsers \
         }}) {{ affected_rows }} }}"
    );

    let mut variables = Map::new();
    variables.insert("time".into(), json!(format_timestamp(&snapshot.timestamp)));
    variables.insert("tps1".into(), json!(snapshot.tick_rates.one_minute));
    variables.insert("tps5".into(), json!(snapshot.tick_rates.five_minutes));
    variables.insert("tps15".into(), json!(snapshot.tick_rates.fifteen_minutes));
    variables.insert("cpu".into(), json!(snapshot.cpu_usage_percent));
    variables.insert("memory".into(), json!(snapshot.memory_used_mb));
    variables.insert("onlineUsers".into(), json!(snapshot.online_players));

    DispatchRequest::new(query, variables)
}

/// 예외 1행 insert mutation
///
/// 메시지가 없으면 키를 생략하지 않고 `null`로 보낸다.
pub fn build_exception_mutation(report: &ExceptionReport, exception_table: &str) -> DispatchRequest {
    let query = format!(
        "mutation InsertException($time: timestamptz!, $level: String!, $logger: String, \
         $thread: String, $message: String, $stacktrace: String) {{ \
         insert_{exception_table}(objects: {{ \
         time: $time, level: $level, logger: $logger, thread: $thread, \
         message: $message, stacktrace: $stacktrace \
         }}) {{ affected_rows }} }}"
    );

    let mut variables = Map::new();
    variables.insert("time".into(), json!(format_timestamp(&report.timestamp)));
    variables.insert("level".into(), json!(report.level));
    variables.insert("logger".into(), json!(report.source_name));
    variables.insert("thread".into(), json!(report.thread_name));
    variables.insert(
        "message".into(),
        report.message.clone().map(Value::String).unwrap_or(Value::Null),
    );
    variables.insert("stacktrace".into(), json!(report.stacktrace));

    DispatchRequest::new(query, variables)
}
