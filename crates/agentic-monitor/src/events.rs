//! 성능 메트릭 로그 이벤트.
//!
//! 세션 종료 시 `performance` 타깃으로 구조화된 이벤트를 남긴다.

use agentic_core::models::performance::MetricsSnapshot;
use tracing::{info, warn};

/// 세션 메트릭을 `performance` 타깃으로 기록
pub fn log_performance_metrics(component: &str, metrics: &MetricsSnapshot) {
    let payload = match serde_json::to_string(metrics) {
        Ok(json) => json,
        Err(e) => {
            warn!("성능 메트릭 직렬화 실패 ({component}): {e}");
            String::new()
        }
    };

    info!(
        target: "performance",
        component = %component,
        metrics = %payload,
        duration = metrics.duration.unwrap_or_default(),
        average_cpu = metrics.average_cpu,
        peak_memory = metrics.peak_memory,
        success_rate = metrics.success_rate,
        "성능 메트릭: {component}"
    );
}
