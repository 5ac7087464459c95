//! 모의 작업 실행기.
//!
//! 파이프라인 대신 일정 시간 동안 작업을 순차 처리하며
//! 작업 카운터를 모니터에 보고한다.

use agentic_monitor::PerformanceMonitor;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// 작업 계획
#[derive(Debug, Clone)]
pub struct WorkloadPlan {
    /// 전체 작업 수
    pub total_tasks: u64,
    /// 실패로 처리할 작업 수 (마지막 작업부터)
    pub failed_tasks: u64,
    /// 전체 실행 시간
    pub duration: Duration,
}

/// 작업 실행 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadOutcome {
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// 종료 신호로 중단되었는지
    pub interrupted: bool,
}

/// 작업 순차 실행
///
/// 작업 하나가 끝날 때마다 카운터를 갱신한다. 종료 신호를 받으면 즉시 중단.
pub async fn run_workload(
    monitor: &PerformanceMonitor,
    session_id: &str,
    plan: &WorkloadPlan,
    mut shutdown_rx: watch::Receiver<bool>,
) -> WorkloadOutcome {
    let total = plan.total_tasks;
    let failed_budget = plan.failed_tasks.min(total);
    let step = plan.duration / u32::try_from(total.max(1)).unwrap_or(u32::MAX);

    monitor.update_task_metrics(session_id, Some(total), Some(0), Some(0));
    info!("작업 시작 ({session_id}): {total}개, 단계당 {}ms", step.as_millis());

    let mut outcome = WorkloadOutcome {
        completed_tasks: 0,
        failed_tasks: 0,
        interrupted: false,
    };

    for index in 0..total.max(1) {
        tokio::select! {
            _ = tokio::time::sleep(step) => {}
            _ = shutdown_rx.changed() => {
                outcome.interrupted = true;
                info!("작업 중단 ({session_id}): {index}/{total}");
                break;
            }
        }

        if total == 0 {
            break;
        }
        burn_cpu(index);

        if index < total - failed_budget {
            outcome.completed_tasks += 1;
        } else {
            outcome.failed_tasks += 1;
        }
        monitor.update_task_metrics(
            session_id,
            None,
            Some(outcome.completed_tasks),
            Some(outcome.failed_tasks),
        );
        debug!(
            "작업 진행 ({session_id}): {}/{total}",
            outcome.completed_tasks + outcome.failed_tasks
        );
    }

    outcome
}

/// 샘플에 CPU 부하가 드러나도록 짧게 연산
fn burn_cpu(seed: u64) -> u64 {
    let mut acc = seed;
    for i in 0..200_000u64 {
        acc = acc.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(i);
    }
    std::hint::black_box(acc)
}
