//! 메트릭 내보내기.
//!
//! 전체 집계 + 세션 이력을 JSON 문서 또는 세션별 CSV 행으로 변환한다.

use agentic_core::error::CoreError;
use agentic_core::models::performance::{GlobalMetrics, MetricsSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// 내보내기 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// 구조화 JSON 문서
    Json,
    /// 세션당 1행 CSV
    Csv,
}

impl ExportFormat {
    /// 형식 문자열 파싱 (대소문자 무시)
    pub fn parse(format: &str) -> Result<Self, CoreError> {
        match format.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(CoreError::UnsupportedFormat(format.to_string())),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// JSON 내보내기 문서
#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub global_metrics: GlobalMetrics,
    pub session_history: BTreeMap<String, MetricsSnapshot>,
    /// 내보내기 시각 (RFC3339)
    pub export_timestamp: String,
}

/// CSV 세션 행
#[derive(Debug, Serialize)]
pub struct SessionRow<'a> {
    pub session_id: &'a str,
    #[serde(flatten)]
    pub metrics: &'a MetricsSnapshot,
}

impl ExportDocument {
    /// 지정한 형식으로 렌더링
    pub fn render(&self, format: ExportFormat) -> Result<String, CoreError> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ExportFormat::Csv => {
                let rows: Vec<SessionRow<'_>> = self
                    .session_history
                    .iter()
                    .map(|(session_id, metrics)| SessionRow {
                        session_id,
                        metrics,
                    })
                    .collect();
                records_to_csv(&rows, "session_id")
            }
        }
    }
}

/// 레코드를 CSV 문자열로 변환
///
/// 헤더는 첫 레코드의 키에서 추출하며 `key_column`을 맨 앞에 둔다.
pub fn records_to_csv<T: Serialize>(records: &[T], key_column: &str) -> Result<String, CoreError> {
    if records.is_empty() {
        return Ok(String::new());
    }

    // JSON 값을 사용하여 CSV 생성
    let json_values: Vec<serde_json::Value> = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    // 헤더 추출
    let mut headers: Vec<String> = json_values
        .first()
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.keys()
                .filter(|k| k.as_str() != key_column)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    headers.insert(0, key_column.to_string());

    let mut csv = headers.join(",") + "\n";

    // 데이터 행 추가
    for value in &json_values {
        if let Some(obj) = value.as_object() {
            let row: Vec<String> = headers
                .iter()
                .map(|h| obj.get(h).map(csv_cell).unwrap_or_default())
                .collect();
            csv.push_str(&row.join(","));
            csv.push('\n');
        }
    }

    Ok(csv)
}

fn csv_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => {
            // CSV 이스케이프 (쌍따옴표, 쉼표, 줄바꿈 포함 시)
            if s.contains(',') || s.contains('"') || s.contains('\n') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.clone()
            }
        }
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
