//! # agentic-app
//!
//! agentic-perf 바이너리 진입점.
//! 설정 로드, 로깅 초기화, 모니터 와이어링, 라이프사이클 관리.

mod lifecycle;
mod workload;

use agentic_core::config::AppConfig;
use agentic_core::config_manager::ConfigManager;
use agentic_core::models::performance::MetricsSnapshot;
use agentic_monitor::PerformanceMonitor;
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;
use crate::workload::{run_workload, WorkloadOutcome, WorkloadPlan};

/// 에이전트 파이프라인 성능 모니터
#[derive(Parser, Debug)]
#[command(name = "agentic-perf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 로그 레벨 (trace, debug, info, warn, error). 미지정 시 설정 파일 값
    #[arg(long, short = 'l', global = true)]
    log_level: Option<String>,

    /// 설정 파일 경로 (JSON). 없으면 기본 설정 생성
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 샘플링 간격 (밀리초)
    #[arg(long, global = true)]
    sample_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 모의 작업을 세션으로 모니터링하고 결과 출력
    Run(RunArgs),
    /// 유효 설정과 호스트 용량(CPU 수, 총 메모리) 출력
    Status,
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// 세션 ID
    #[arg(long, short = 's', default_value = "default")]
    session: String,

    /// 작업 실행 시간 (초)
    #[arg(long, default_value = "3")]
    duration_secs: u64,

    /// 전체 작업 수
    #[arg(long, default_value = "4")]
    total_tasks: u64,

    /// 실패로 처리할 작업 수
    #[arg(long, default_value = "0")]
    failed_tasks: u64,

    /// 메트릭 내보내기 경로
    #[arg(long)]
    export: Option<PathBuf>,

    /// 내보내기 형식 (json, csv). 미지정 시 설정 파일 값
    #[arg(long)]
    format: Option<String>,
}

/// `run` 결과 보고서
#[derive(Serialize)]
struct RunReport<'a> {
    session_id: &'a str,
    workload: WorkloadOutcome,
    performance: Option<MetricsSnapshot>,
}

/// `status` 결과 보고서 (설정 + 호스트 용량)
#[derive(Serialize)]
struct StatusReport {
    config_file: Option<PathBuf>,
    monitoring_enabled: bool,
    sample_interval_ms: u64,
    stop_timeout_ms: u64,
    default_export_format: String,
    system_cpu_count: usize,
    system_memory_total_gb: f64,
}

/// 설정 출처
#[derive(Debug)]
enum ConfigSource {
    /// ConfigManager가 관리하는 설정 파일
    File(PathBuf),
    /// 기본 경로 사용 불가, 내장 기본값 (사유)
    Defaults(String),
}

impl ConfigSource {
    fn path(&self) -> Option<PathBuf> {
        match self {
            Self::File(path) => Some(path.clone()),
            Self::Defaults(_) => None,
        }
    }
}

/// 설정 로드 후 CLI 오버라이드 적용
///
/// `--config`가 없으면 플랫폼 기본 경로의 설정 파일을 쓰고,
/// 그 경로를 쓸 수 없으면 내장 기본값으로 진행한다.
fn load_config(args: &Args) -> Result<(AppConfig, ConfigSource)> {
    let (mut config, source) = match &args.config {
        Some(path) => {
            let manager = ConfigManager::with_path(path.clone())
                .with_context(|| format!("설정 로드 실패: {}", path.display()))?;
            let source = ConfigSource::File(manager.config_path().to_path_buf());
            (manager.get(), source)
        }
        None => match ConfigManager::new() {
            Ok(manager) => {
                let source = ConfigSource::File(manager.config_path().to_path_buf());
                (manager.get(), source)
            }
            Err(e) => (AppConfig::default_config(), ConfigSource::Defaults(e.to_string())),
        },
    };

    if let Some(ms) = args.sample_interval_ms {
        config.monitor.sample_interval_ms = ms;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok((config, source))
}

/// tracing 초기화 (RUST_LOG가 있으면 우선)
fn init_tracing(level: &str) {
    let log_filter = format!(
        "agentic_perf={level},agentic_app={level},agentic_core={level},agentic_monitor={level},performance={level}"
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();
}

async fn run_command(
    config: &AppConfig,
    monitor: &PerformanceMonitor,
    lifecycle: &LifecycleManager,
    run: &RunArgs,
) -> Result<()> {
    let plan = WorkloadPlan {
        total_tasks: run.total_tasks,
        failed_tasks: run.failed_tasks,
        duration: Duration::from_secs(run.duration_secs),
    };

    let work = run_workload(monitor, &run.session, &plan, lifecycle.subscribe());
    let (workload, performance) = if config.monitor.enabled {
        monitor.monitor_scope(&run.session, work).await
    } else {
        warn!("모니터링 비활성화 상태, 작업만 실행");
        (work.await, None)
    };

    let report = RunReport {
        session_id: &run.session,
        workload,
        performance,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &run.export {
        let format = run
            .format
            .as_deref()
            .unwrap_or(config.export.default_format.as_str());
        monitor.export_metrics(path, format)?;
    }

    Ok(())
}

fn status_report(
    config: &AppConfig,
    source: &ConfigSource,
    monitor: &PerformanceMonitor,
) -> StatusReport {
    let host = monitor.get_global_metrics();
    StatusReport {
        config_file: source.path(),
        monitoring_enabled: config.monitor.enabled,
        sample_interval_ms: config.monitor.sample_interval_ms,
        stop_timeout_ms: config.monitor.stop_timeout_ms,
        default_export_format: config.export.default_format.clone(),
        system_cpu_count: host.system_cpu_count,
        system_memory_total_gb: host.system_memory_total,
    }
}

fn status_command(
    config: &AppConfig,
    source: &ConfigSource,
    monitor: &PerformanceMonitor,
) -> Result<()> {
    let report = status_report(config, source, monitor);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, source) = load_config(&args)?;

    init_tracing(&config.logging.level);
    info!("agentic-perf 시작");
    match &source {
        ConfigSource::File(path) => info!("설정 파일: {}", path.display()),
        ConfigSource::Defaults(reason) => {
            warn!("설정 관리자 초기화 실패, 기본 설정 사용: {reason}")
        }
    }

    let monitor = PerformanceMonitor::new(&config.monitor);
    let lifecycle = Arc::new(LifecycleManager::new());

    let signal_task = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.wait_for_signal().await })
    };

    let result = match &args.command {
        Command::Run(run) => run_command(&config, &monitor, &lifecycle, run).await,
        Command::Status => status_command(&config, &source, &monitor),
    };

    monitor.shutdown().await;
    signal_task.abort();
    info!("agentic-perf 종료");

    result
}
