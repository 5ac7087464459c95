//! 성능 메트릭 모델.
//!
//! 모니터링 세션 하나의 수명 동안 누적되는 샘플과 작업 카운터,
//! 호출자에게 반환되는 불변 스냅샷, 전체 세션 집계를 정의한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::system::HostInfo;

/// 세션별 성능 메트릭 (모니터 내부 소유)
///
/// 파생 필드(`duration`, `peak_memory`, `average_cpu`)는 증분 갱신하지 않고
/// [`PerformanceMetrics::finalize`] 시점에만 계산한다.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    /// 세션 시작 시각 (생성 후 불변)
    pub start_time: DateTime<Utc>,
    /// 세션 종료 시각 (종료 시 1회 설정)
    pub end_time: Option<DateTime<Utc>>,
    /// 실행 시간 (초)
    pub duration: Option<f64>,
    /// CPU 사용률 샘플 (%)
    pub cpu_usage: Vec<f64>,
    /// 상주 메모리 샘플 (MB)
    pub memory_usage: Vec<f64>,
    /// 최대 메모리 (MB)
    pub peak_memory: f64,
    /// 평균 CPU 사용률 (%)
    pub average_cpu: f64,
    /// 전체 작업 수
    pub total_tasks: u64,
    /// 완료 작업 수
    pub completed_tasks: u64,
    /// 실패 작업 수
    pub failed_tasks: u64,
}

impl PerformanceMetrics {
    /// 새 메트릭 생성
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            duration: None,
            cpu_usage: Vec::new(),
            memory_usage: Vec::new(),
            peak_memory: 0.0,
            average_cpu: 0.0,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
        }
    }

    /// 파생 필드 계산
    pub fn finalize(&mut self) {
        self.duration = self.end_time.map(|end| elapsed_secs(self.start_time, end));

        self.average_cpu = if self.cpu_usage.is_empty() {
            0.0
        } else {
            self.cpu_usage.iter().sum::<f64>() / self.cpu_usage.len() as f64
        };

        self.peak_memory = self.memory_usage.iter().copied().fold(0.0, f64::max);
    }

    /// 작업 성공률 (completed / max(total, 1))
    pub fn success_rate(&self) -> f64 {
        self.completed_tasks as f64 / self.total_tasks.max(1) as f64
    }

    /// 불변 스냅샷 생성
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            average_cpu: self.average_cpu,
            peak_memory: self.peak_memory,
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            failed_tasks: self.failed_tasks,
            success_rate: self.success_rate(),
            cpu_samples: self.cpu_usage.len(),
            memory_samples: self.memory_usage.len(),
        }
    }
}

/// 두 시각 사이의 경과 시간 (초). 역전된 구간은 0.
pub fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// 세션 메트릭 스냅샷 (호출자 반환용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// 세션 시작 시각
    pub start_time: DateTime<Utc>,
    /// 세션 종료 시각 (활성 세션은 조회 시각)
    pub end_time: Option<DateTime<Utc>>,
    /// 실행 시간 (초)
    pub duration: Option<f64>,
    /// 평균 CPU 사용률 (%)
    pub average_cpu: f64,
    /// 최대 메모리 (MB)
    pub peak_memory: f64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// 작업 성공률 (0.0 ~ 1.0)
    pub success_rate: f64,
    /// CPU 샘플 수
    pub cpu_samples: usize,
    /// 메모리 샘플 수
    pub memory_samples: usize,
}

/// 전체 세션 집계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    /// 전체 세션 수 (이력 + 활성)
    pub total_sessions: usize,
    /// 활성 세션 수
    pub active_sessions: usize,
    /// 완료 세션 수
    pub completed_sessions: usize,
    /// 평균 실행 시간 (초)
    pub average_duration: f64,
    /// 평균 CPU 사용률 (%)
    pub average_cpu_usage: f64,
    /// 평균 최대 메모리 (MB)
    pub average_peak_memory: f64,
    /// 논리 CPU 수
    pub system_cpu_count: usize,
    /// 전체 물리 메모리 (GB)
    pub system_memory_total: f64,
}

impl GlobalMetrics {
    /// 완료 세션 메트릭으로부터 평균 계산
    ///
    /// 실행 시간은 정의된 값만, CPU/메모리는 0보다 큰 값만 평균에 포함한다.
    pub fn aggregate<'a, I>(history: I, active_sessions: usize, host: HostInfo) -> Self
    where
        I: IntoIterator<Item = &'a PerformanceMetrics>,
    {
        let mut durations = Vec::new();
        let mut cpu_averages = Vec::new();
        let mut memory_peaks = Vec::new();
        let mut completed_sessions = 0;

        for m in history {
            completed_sessions += 1;
            if let Some(d) = m.duration {
                durations.push(d);
            }
            if m.average_cpu > 0.0 {
                cpu_averages.push(m.average_cpu);
            }
            if m.peak_memory > 0.0 {
                memory_peaks.push(m.peak_memory);
            }
        }

        Self {
            total_sessions: completed_sessions + active_sessions,
            active_sessions,
            completed_sessions,
            average_duration: mean(&durations),
            average_cpu_usage: mean(&cpu_averages),
            average_peak_memory: mean(&memory_peaks),
            system_cpu_count: host.cpu_count,
            system_memory_total: host.memory_total_gb(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
