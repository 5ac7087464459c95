//! 시스템 메트릭 모델.
//!
//! 프로세스 단위 샘플과 호스트 용량 정보를 표현.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 바이트 → MB 변환 계수
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 바이트 → GB 변환 계수
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// 현재 프로세스 리소스 샘플 (보조 샘플 로그 단위)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// 수집 시각
    pub timestamp: DateTime<Utc>,
    /// 프로세스 CPU 사용률 (코어 합산, 0.0 ~ 100.0 × 코어 수)
    pub cpu_percent: f64,
    /// 상주 메모리 (MB)
    pub memory_mb: f64,
}

/// 호스트 용량 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// 논리 CPU 수
    pub cpu_count: usize,
    /// 전체 물리 메모리 (바이트)
    pub memory_total_bytes: u64,
}

impl HostInfo {
    /// 전체 메모리 (GB)
    pub fn memory_total_gb(&self) -> f64 {
        self.memory_total_bytes as f64 / BYTES_PER_GB
    }
}
