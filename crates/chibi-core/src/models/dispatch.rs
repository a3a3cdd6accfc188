//! GraphQL 전송 요청/응답 모델.
//!
//! 요청 본문은 `{"query": ..., "variables": {...}}` 형식이다.
//! 변수 값은 항상 `variables` 매핑으로 전달하고 쿼리 텍스트에 넣지 않는다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// 전송 단위: mutation 텍스트 + 변수 매핑
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    /// 이름 있는 파라미터를 선언한 mutation 텍스트
    pub query: String,
    /// 파라미터 이름 → 값 (키 중복 불가)
    pub variables: Map<String, Value>,
}

impl DispatchRequest {
    /// 새 전송 요청 생성
    pub fn new(query: impl Into<String>, variables: Map<String, Value>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }

    /// mutation 헤더에 선언된 `$name: Type` 파라미터 이름 목록
    ///
    /// 본문의 `field: $name` 참조는 뒤에 `:`가 없으므로 제외된다.
    pub fn declared_parameters(&self) -> BTreeSet<String> {
        let bytes = self.query.as_bytes();
        let mut params = BTreeSet::new();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }
            let mut next = end;
            while next < bytes.len() && bytes[next].is_ascii_whitespace() {
                next += 1;
            }
            if end > start && next < bytes.len() && bytes[next] == b':' {
                params.insert(self.query[start..end].to_string());
            }
            i = end.max(start);
        }

        params
    }

    /// 선언된 파라미터와 변수 키가 정확히 일치하는지 확인
    pub fn parameters_match(&self) -> bool {
        let keys: BTreeSet<String> = self.variables.keys().cloned().collect();
        keys == self.declared_parameters()
    }
}

/// GraphQL 응답 본문 (`data`/`errors`는 모두 선택)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// 응답에 포함된 애플리케이션 레벨 에러 1건
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQlError {
    /// `extensions.code` (문자열이 아니면 JSON 표현)
    pub fn code(&self) -> Option<String> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .map(|code| match code {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(query: &str, keys: &[&str]) -> DispatchRequest {
        let variables = keys
            .iter()
            .map(|k| (k.to_string(), Value::Null))
            .collect::<Map<_, _>>();
        DispatchRequest::new(query, variables)
    }

    #[test]
    fn declared_parameters_skip_references() {
        let req = request(
            "mutation($time: timestamptz!, $cpu: float8!) { insert_t(objects: { time: $time, cpu_usage: $cpu }) { affected_rows } }",
            &["time", "cpu"],
        );
        let params = req.declared_parameters();
        assert_eq!(params.len(), 2);
        assert!(params.contains("time"));
        assert!(params.contains("cpu"));
        assert!(req.parameters_match());
    }

    #[test]
    fn parameters_mismatch_detected() {
        let req = request("mutation($time: timestamptz!) { x(t: $time) }", &["time", "extra"]);
        assert!(!req.parameters_match());
    }

    #[test]
    fn body_serializes_query_and_variables() {
        let mut variables = Map::new();
        variables.insert("cpu".to_string(), json!(23.57));
        let req = DispatchRequest::new("mutation($cpu: float8!) { x }", variables);

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["query"], "mutation($cpu: float8!) { x }");
        assert_eq!(body["variables"]["cpu"], json!(23.57));
    }

    #[test]
    fn response_errors_parse_leniently() {
        let resp: GraphQlResponse = serde_json::from_str(
            r#"{"errors":[{"message":"bad input","extensions":{"code":"VALIDATION","path":"$"}},{}]}"#,
        )
        .unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.errors.len(), 2);
        assert_eq!(resp.errors[0].code().as_deref(), Some("VALIDATION"));
        assert!(resp.errors[1].message.is_none());
        assert!(resp.errors[1].code().is_none());
    }
}
