//! 성능 모니터 (세션 테이블 + 세션별 샘플러 관리).
//!
//! 세션 시작 시 샘플링 태스크를 띄우고, 종료 시 통계를 확정하여
//! 이력 테이블로 옮긴다. 활성/이력 테이블과 보조 샘플 로그는
//! 하나의 뮤텍스로 보호되며, 샘플러는 이 뮤텍스를 잡지 않는다.

use agentic_core::config::MonitorConfig;
use agentic_core::error::CoreError;
use agentic_core::models::performance::{GlobalMetrics, MetricsSnapshot, PerformanceMetrics};
use agentic_core::models::system::ResourceSample;
use agentic_core::ports::probe::ResourceProbe;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::events::log_performance_metrics;
use crate::export::{ExportDocument, ExportFormat};
use crate::probe::SysInfoProbe;
use crate::sampler::{spawn_sampler, SamplerHandle};

/// 활성 세션 (메트릭 레코드 + 샘플러)
struct ActiveSession {
    metrics: PerformanceMetrics,
    sampler: SamplerHandle,
}

/// 모니터 공유 상태
#[derive(Default)]
struct MonitorState {
    active: HashMap<String, ActiveSession>,
    history: HashMap<String, PerformanceMetrics>,
    /// 종료 처리 중인 세션 ID (이력 기록 전까지 같은 ID 재시작 불가)
    stopping: HashSet<String>,
    /// 세션 ID별 타임스탬프 샘플 (종료된 세션분)
    sample_log: HashMap<String, Vec<ResourceSample>>,
}

impl MonitorState {
    fn is_claimed(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id) || self.stopping.contains(session_id)
    }
}

/// 종료 처리 중 표시. `stop_monitoring`이 중간에 취소돼도 해제 시 표시를 지운다.
struct StoppingMark<'a> {
    state: &'a Mutex<MonitorState>,
    session_id: &'a str,
    armed: bool,
}

impl StoppingMark<'_> {
    /// 이력 기록과 같은 잠금 구간에서 표시 해제
    fn release(mut self, state: &mut MonitorState) {
        state.stopping.remove(self.session_id);
        self.armed = false;
    }
}

impl Drop for StoppingMark<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().stopping.remove(self.session_id);
        }
    }
}

/// 세션 단위 성능 모니터
pub struct PerformanceMonitor {
    sample_interval: Duration,
    stop_timeout: Duration,
    probe: Arc<dyn ResourceProbe>,
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    /// sysinfo 기반 모니터 생성
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_probe(config, Arc::new(SysInfoProbe::new()))
    }

    /// 지정한 조회기로 모니터 생성
    pub fn with_probe(config: &MonitorConfig, probe: Arc<dyn ResourceProbe>) -> Self {
        info!(
            "성능 모니터 초기화: 샘플 주기 {}ms, 종료 대기 {}ms",
            config.sample_interval_ms, config.stop_timeout_ms
        );
        Self {
            sample_interval: config.sample_interval().max(Duration::from_millis(1)),
            stop_timeout: config.stop_timeout(),
            probe,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// 세션 모니터링 시작
    ///
    /// 같은 ID의 세션이 활성 상태이거나 아직 종료 처리 중이면 경고만 남기고
    /// 기존 세션을 유지한다. 새 세션을 시작했으면 `true`.
    /// tokio 런타임 안에서 호출해야 한다.
    pub fn start_monitoring(&self, session_id: &str) -> bool {
        if session_id.is_empty() {
            warn!("빈 세션 ID로 모니터링 시작 요청 무시");
            return false;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("tokio 런타임 밖에서 모니터링 시작 불가: {session_id}");
            return false;
        }
        if self.state.lock().is_claimed(session_id) {
            warn!("세션 {session_id}은(는) 이미 모니터링 중");
            return false;
        }

        // 프로세스 조회는 잠금 밖에서
        let sampler = match self.probe.open_sampler() {
            Ok(sampler) => sampler,
            Err(e) => {
                warn!("세션 {session_id} 샘플러 생성 실패: {e}");
                return false;
            }
        };

        // start_time <= 첫 샘플 시각
        let metrics = PerformanceMetrics::new(Utc::now());
        let sampler = spawn_sampler(session_id, sampler, self.sample_interval);

        let mut state = self.state.lock();
        if state.is_claimed(session_id) {
            drop(state);
            sampler.cancel();
            warn!("세션 {session_id}은(는) 이미 모니터링 중");
            return false;
        }
        state
            .active
            .insert(session_id.to_string(), ActiveSession { metrics, sampler });
        drop(state);

        info!("세션 모니터링 시작: {session_id}");
        true
    }

    /// 세션 모니터링 종료 및 확정 메트릭 반환
    ///
    /// 활성 세션이 없으면 경고 후 `None`. 샘플러 종료는 최대
    /// `stop_timeout`까지만 기다린다. 이력에 기록될 때까지 같은 ID로는
    /// 새 세션을 시작할 수 없다.
    pub async fn stop_monitoring(&self, session_id: &str) -> Option<MetricsSnapshot> {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.active.remove(session_id);
            if removed.is_some() {
                state.stopping.insert(session_id.to_string());
            }
            removed
        };
        let Some(ActiveSession {
            mut metrics,
            sampler,
        }) = removed
        else {
            warn!("세션 {session_id}은(는) 모니터링 중이 아님");
            return None;
        };
        let mark = StoppingMark {
            state: &self.state,
            session_id,
            armed: true,
        };

        let buffer = sampler.stop(self.stop_timeout).await;

        metrics.end_time = Some(Utc::now());
        metrics.cpu_usage = buffer.cpu_usage;
        metrics.memory_usage = buffer.memory_usage;
        metrics.finalize();
        let snapshot = metrics.snapshot();

        {
            let mut state = self.state.lock();
            state.history.insert(session_id.to_string(), metrics);
            state
                .sample_log
                .entry(session_id.to_string())
                .or_default()
                .extend(buffer.samples);
            mark.release(&mut state);
        }

        log_performance_metrics(session_id, &snapshot);
        info!("세션 모니터링 종료: {session_id}");
        Some(snapshot)
    }

    /// 활성 세션의 작업 카운터 갱신
    ///
    /// 지정한 값만 덮어쓴다. 활성 세션이 아니면 무시.
    pub fn update_task_metrics(
        &self,
        session_id: &str,
        total_tasks: Option<u64>,
        completed_tasks: Option<u64>,
        failed_tasks: Option<u64>,
    ) {
        let mut state = self.state.lock();
        let Some(session) = state.active.get_mut(session_id) else {
            return;
        };

        let metrics = &mut session.metrics;
        if let Some(total) = total_tasks {
            metrics.total_tasks = total;
        }
        if let Some(completed) = completed_tasks {
            metrics.completed_tasks = completed;
        }
        if let Some(failed) = failed_tasks {
            metrics.failed_tasks = failed;
        }
        debug!(
            "작업 카운터 갱신 ({session_id}): {}/{} 완료, {} 실패",
            metrics.completed_tasks, metrics.total_tasks, metrics.failed_tasks
        );
    }

    /// 세션 메트릭 조회
    ///
    /// 활성 세션은 현재 시각 기준 임시 스냅샷을, 종료된 세션은 확정 스냅샷을 반환.
    pub fn get_session_metrics(&self, session_id: &str) -> Option<MetricsSnapshot> {
        let state = self.state.lock();

        if let Some(session) = state.active.get(session_id) {
            let mut temp = session.metrics.clone();
            session.sampler.read(|buf| {
                temp.cpu_usage = buf.cpu_usage.clone();
                temp.memory_usage = buf.memory_usage.clone();
            });
            temp.end_time = Some(Utc::now());
            temp.finalize();
            return Some(temp.snapshot());
        }

        state.history.get(session_id).map(PerformanceMetrics::snapshot)
    }

    /// 전체 세션 집계
    pub fn get_global_metrics(&self) -> GlobalMetrics {
        let host = self.probe.host_info();
        let state = self.state.lock();
        GlobalMetrics::aggregate(state.history.values(), state.active.len(), host)
    }

    /// 종료된 세션 이력 (시점 복사본)
    pub fn get_session_history(&self) -> HashMap<String, MetricsSnapshot> {
        self.state
            .lock()
            .history
            .iter()
            .map(|(id, m)| (id.clone(), m.snapshot()))
            .collect()
    }

    /// 이력 및 보조 샘플 로그 삭제 (활성 세션은 유지)
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.history.clear();
        state.sample_log.clear();
        info!("성능 이력 삭제");
    }

    /// 활성 세션 ID 목록 (정렬)
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 세션 ID별 타임스탬프 샘플 로그
    ///
    /// 종료된 세션분에 이어 같은 ID의 활성 세션 샘플을 덧붙인다.
    pub fn sample_log(&self, session_id: &str) -> Vec<ResourceSample> {
        let state = self.state.lock();
        let mut samples = state
            .sample_log
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        if let Some(session) = state.active.get(session_id) {
            session
                .sampler
                .read(|buf| samples.extend_from_slice(&buf.samples));
        }
        samples
    }

    /// 메트릭을 파일로 내보내기 (json, csv)
    pub fn export_metrics(&self, path: impl AsRef<Path>, format: &str) -> Result<(), CoreError> {
        let format = ExportFormat::parse(format)?;
        let path = path.as_ref();

        let document = ExportDocument {
            global_metrics: self.get_global_metrics(),
            session_history: self.get_session_history().into_iter().collect::<BTreeMap<_, _>>(),
            export_timestamp: Utc::now().to_rfc3339(),
        };

        std::fs::write(path, document.render(format)?)?;
        info!("메트릭 내보내기 완료: {}", path.display());
        Ok(())
    }

    /// 작업을 세션으로 감싸 실행
    ///
    /// 세션을 새로 시작한 경우에만 종료하고 메트릭을 반환한다.
    /// 같은 ID가 이미 모니터링 중이면 기존 세션은 건드리지 않는다.
    pub async fn monitor_scope<F, T>(
        &self,
        session_id: &str,
        work: F,
    ) -> (T, Option<MetricsSnapshot>)
    where
        F: Future<Output = T>,
    {
        let started = self.start_monitoring(session_id);
        let output = work.await;
        let metrics = if started {
            self.stop_monitoring(session_id).await
        } else {
            None
        };
        (output, metrics)
    }

    /// 모든 활성 세션 종료 (이력으로 확정)
    pub async fn shutdown(&self) {
        let ids = self.active_sessions();
        if !ids.is_empty() {
            info!("활성 세션 {}개 종료", ids.len());
        }
        for id in ids {
            self.stop_monitoring(&id).await;
        }
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (session_id, session) in state.active.drain() {
            warn!("모니터 해제 시 활성 세션 중단: {session_id}");
            session.sampler.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_core::models::performance::elapsed_secs;
    use agentic_core::models::system::HostInfo;
    use agentic_core::ports::probe::ProcessSampler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::test_support::EventCapture;

    /// 고정 시퀀스를 반복 반환하는 조회기
    struct ScriptedProbe {
        cpu: Vec<f64>,
        memory: Vec<f64>,
        opened: AtomicUsize,
        sampled: Arc<AtomicUsize>,
    }

    impl ScriptedProbe {
        fn new(cpu: Vec<f64>, memory: Vec<f64>) -> Arc<Self> {
            Arc::new(Self {
                cpu,
                memory,
                opened: AtomicUsize::new(0),
                sampled: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    struct ScriptedSampler {
        cpu: Vec<f64>,
        memory: Vec<f64>,
        next: usize,
        sampled: Arc<AtomicUsize>,
    }

    impl ProcessSampler for ScriptedSampler {
        fn sample(&mut self) -> Result<ResourceSample, CoreError> {
            self.sampled.fetch_add(1, Ordering::SeqCst);
            let i = self.next % self.cpu.len();
            self.next += 1;
            Ok(ResourceSample {
                timestamp: Utc::now(),
                cpu_percent: self.cpu[i],
                memory_mb: self.memory[i],
            })
        }
    }

    impl ResourceProbe for ScriptedProbe {
        fn open_sampler(&self) -> Result<Box<dyn ProcessSampler>, CoreError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSampler {
                cpu: self.cpu.clone(),
                memory: self.memory.clone(),
                next: 0,
                sampled: self.sampled.clone(),
            }))
        }

        fn host_info(&self) -> HostInfo {
            HostInfo {
                cpu_count: 4,
                memory_total_bytes: 8 * 1024 * 1024 * 1024,
            }
        }
    }

    /// 항상 실패하는 조회기
    struct FailingProbe;

    struct FailingSampler;

    impl ProcessSampler for FailingSampler {
        fn sample(&mut self) -> Result<ResourceSample, CoreError> {
            Err(CoreError::Internal("접근 거부".to_string()))
        }
    }

    impl ResourceProbe for FailingProbe {
        fn open_sampler(&self) -> Result<Box<dyn ProcessSampler>, CoreError> {
            Ok(Box::new(FailingSampler))
        }

        fn host_info(&self) -> HostInfo {
            HostInfo {
                cpu_count: 1,
                memory_total_bytes: 0,
            }
        }
    }

    /// 첫 조회 이후 매 조회가 `block`만큼 멈추는 조회기
    struct StallingProbe {
        block: Duration,
    }

    struct StallingSampler {
        calls: usize,
        block: Duration,
    }

    impl ProcessSampler for StallingSampler {
        fn sample(&mut self) -> Result<ResourceSample, CoreError> {
            self.calls += 1;
            if self.calls > 1 {
                std::thread::sleep(self.block);
            }
            Ok(ResourceSample {
                timestamp: Utc::now(),
                cpu_percent: 20.0,
                memory_mb: 80.0,
            })
        }
    }

    impl ResourceProbe for StallingProbe {
        fn open_sampler(&self) -> Result<Box<dyn ProcessSampler>, CoreError> {
            Ok(Box::new(StallingSampler {
                calls: 0,
                block: self.block,
            }))
        }

        fn host_info(&self) -> HostInfo {
            HostInfo {
                cpu_count: 2,
                memory_total_bytes: 0,
            }
        }
    }

    fn config(interval_ms: u64) -> MonitorConfig {
        MonitorConfig {
            enabled: true,
            sample_interval_ms: interval_ms,
            stop_timeout_ms: 1_000,
        }
    }

    fn scripted_monitor(interval_ms: u64) -> PerformanceMonitor {
        PerformanceMonitor::with_probe(
            &config(interval_ms),
            ScriptedProbe::new(vec![10.0, 30.0], vec![100.0, 140.0]),
        )
    }

    #[tokio::test]
    async fn metrics_available_immediately_after_start() {
        let monitor = scripted_monitor(60_000);
        assert!(monitor.start_monitoring("A"));

        let snap = monitor.get_session_metrics("A").unwrap();
        assert!(snap.duration.unwrap() < 1.0);
        assert!(snap.cpu_samples <= 1);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_start_keeps_original_session() {
        let probe = ScriptedProbe::new(vec![1.0], vec![1.0]);
        let monitor = PerformanceMonitor::with_probe(&config(60_000), probe.clone());

        assert!(monitor.start_monitoring("A"));
        let before = monitor.get_session_metrics("A").unwrap();

        assert!(!monitor.start_monitoring("A"));
        let after = monitor.get_session_metrics("A").unwrap();

        assert_eq!(before.start_time, after.start_time);
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.active_sessions(), vec!["A".to_string()]);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn empty_session_id_is_rejected() {
        let monitor = scripted_monitor(1_000);
        assert!(!monitor.start_monitoring(""));
        assert!(monitor.active_sessions().is_empty());
    }

    #[test]
    fn start_outside_runtime_is_noop() {
        let monitor = scripted_monitor(1_000);
        assert!(!monitor.start_monitoring("A"));
        assert!(monitor.get_session_metrics("A").is_none());
    }

    #[tokio::test]
    async fn stop_finalizes_statistics() {
        let monitor = scripted_monitor(20);
        monitor.start_monitoring("A");
        monitor.update_task_metrics("A", Some(4), Some(3), Some(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let snap = monitor.stop_monitoring("A").await.unwrap();

        let end = snap.end_time.unwrap();
        assert_eq!(snap.duration, Some(elapsed_secs(snap.start_time, end)));
        assert!(snap.cpu_samples >= 2);
        assert_eq!(snap.cpu_samples, snap.memory_samples);
        assert_eq!(snap.peak_memory, 140.0);
        assert!(snap.average_cpu >= 10.0 && snap.average_cpu <= 20.0);
        assert!((snap.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(snap.failed_tasks, 1);

        // 종료 후에는 이력에서 동일 스냅샷
        assert_eq!(monitor.get_session_metrics("A"), Some(snap.clone()));
        assert_eq!(monitor.get_session_history().get("A"), Some(&snap));
    }

    #[tokio::test]
    async fn average_matches_recorded_samples() {
        let monitor = scripted_monitor(10);
        monitor.start_monitoring("A");
        tokio::time::sleep(Duration::from_millis(80)).await;
        let snap = monitor.stop_monitoring("A").await.unwrap();

        let log = monitor.sample_log("A");
        assert_eq!(log.len(), snap.cpu_samples);
        let mean = log.iter().map(|s| s.cpu_percent).sum::<f64>() / log.len() as f64;
        assert!((snap.average_cpu - mean).abs() < 1e-9);
        assert!(log.iter().all(|s| s.timestamp >= snap.start_time));
        assert!(log.iter().all(|s| Some(s.timestamp) <= snap.end_time));
    }

    #[tokio::test]
    async fn stop_unknown_session_returns_none() {
        let monitor = scripted_monitor(1_000);
        assert!(monitor.stop_monitoring("missing").await.is_none());
    }

    #[tokio::test]
    async fn second_stop_is_noop() {
        let monitor = scripted_monitor(1_000);
        monitor.start_monitoring("A");
        assert!(monitor.stop_monitoring("A").await.is_some());
        assert!(monitor.stop_monitoring("A").await.is_none());
    }

    #[tokio::test]
    async fn update_only_touches_given_counters() {
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("A");
        monitor.update_task_metrics("A", Some(5), None, Some(2));
        monitor.update_task_metrics("A", None, Some(3), None);

        let snap = monitor.get_session_metrics("A").unwrap();
        assert_eq!(snap.total_tasks, 5);
        assert_eq!(snap.completed_tasks, 3);
        assert_eq!(snap.failed_tasks, 2);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn update_inactive_session_is_ignored() {
        let monitor = scripted_monitor(60_000);
        monitor.update_task_metrics("never", Some(1), Some(1), None);
        assert!(monitor.get_session_metrics("never").is_none());

        monitor.start_monitoring("A");
        monitor.update_task_metrics("A", Some(2), Some(1), None);
        let stopped = monitor.stop_monitoring("A").await.unwrap();

        monitor.update_task_metrics("A", Some(10), Some(10), Some(10));
        assert_eq!(monitor.get_session_metrics("A"), Some(stopped));
    }

    #[tokio::test]
    async fn global_metrics_without_sessions() {
        let monitor = scripted_monitor(1_000);
        let g = monitor.get_global_metrics();

        assert_eq!(g.total_sessions, 0);
        assert_eq!(g.active_sessions, 0);
        assert_eq!(g.completed_sessions, 0);
        assert_eq!(g.average_duration, 0.0);
        assert_eq!(g.average_cpu_usage, 0.0);
        assert_eq!(g.average_peak_memory, 0.0);
        assert_eq!(g.system_cpu_count, 4);
        assert!((g.system_memory_total - 8.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn global_metrics_count_active_but_average_history() {
        let monitor = scripted_monitor(10);
        monitor.start_monitoring("done");
        tokio::time::sleep(Duration::from_millis(30)).await;
        let done = monitor.stop_monitoring("done").await.unwrap();
        monitor.start_monitoring("running");

        let g = monitor.get_global_metrics();
        assert_eq!(g.total_sessions, 2);
        assert_eq!(g.active_sessions, 1);
        assert_eq!(g.completed_sessions, 1);
        assert_eq!(g.average_duration, done.duration.unwrap());
        assert_eq!(g.average_peak_memory, done.peak_memory);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn sampling_failures_are_swallowed() {
        let monitor = PerformanceMonitor::with_probe(&config(10), Arc::new(FailingProbe));
        monitor.start_monitoring("A");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snap = monitor.stop_monitoring("A").await.unwrap();
        assert_eq!(snap.cpu_samples, 0);
        assert_eq!(snap.average_cpu, 0.0);
        assert_eq!(snap.peak_memory, 0.0);
        assert!(snap.duration.is_some());
    }

    #[tokio::test]
    async fn reused_id_gets_fresh_record() {
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("A");
        monitor.update_task_metrics("A", Some(3), Some(3), None);
        let first = monitor.stop_monitoring("A").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(monitor.start_monitoring("A"));
        let live = monitor.get_session_metrics("A").unwrap();
        assert!(live.start_time > first.start_time);
        assert_eq!(live.total_tasks, 0);

        // 새 세션 종료 전까지는 이전 이력 유지
        assert_eq!(monitor.get_session_history().get("A"), Some(&first));

        let second = monitor.stop_monitoring("A").await.unwrap();
        assert_eq!(monitor.get_session_history().get("A"), Some(&second));
        assert_ne!(first.start_time, second.start_time);
    }

    #[tokio::test]
    async fn clear_history_keeps_active_sessions() {
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("old");
        monitor.stop_monitoring("old").await;
        monitor.start_monitoring("live");

        monitor.clear_history();

        assert!(monitor.get_session_history().is_empty());
        assert!(monitor.sample_log("old").is_empty());
        assert!(monitor.get_session_metrics("live").is_some());
        assert_eq!(monitor.get_global_metrics().total_sessions, 1);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn sample_log_accumulates_across_reused_ids() {
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("A");
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.stop_monitoring("A").await;
        let first_len = monitor.sample_log("A").len();

        monitor.start_monitoring("A");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let live_len = monitor.sample_log("A").len();
        assert!(live_len > first_len);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn export_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.xml");
        let monitor = scripted_monitor(1_000);

        let err = monitor.export_metrics(&path, "xml").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFormat(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn export_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("A");
        monitor.stop_monitoring("A").await;

        let json_path = dir.path().join("metrics.json");
        monitor.export_metrics(&json_path, "json").unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert!(value["global_metrics"].is_object());
        assert!(value["session_history"]["A"].is_object());
        assert!(value["export_timestamp"].is_string());

        let csv_path = dir.path().join("metrics.csv");
        monitor.export_metrics(&csv_path, "CSV").unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("session_id,"));
    }

    #[tokio::test]
    async fn monitor_scope_wraps_work() {
        let monitor = scripted_monitor(10);
        let (value, metrics) = monitor
            .monitor_scope("crew", async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                42
            })
            .await;

        assert_eq!(value, 42);
        let metrics = metrics.unwrap();
        assert!(metrics.duration.unwrap() >= 0.03);
        assert!(monitor.active_sessions().is_empty());
    }

    #[tokio::test]
    async fn monitor_scope_leaves_existing_session_alone() {
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("crew");

        let (_, metrics) = monitor.monitor_scope("crew", async {}).await;
        assert!(metrics.is_none());
        assert_eq!(monitor.active_sessions(), vec!["crew".to_string()]);

        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_moves_active_sessions_to_history() {
        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("A");
        monitor.start_monitoring("B");

        monitor.shutdown().await;

        assert!(monitor.active_sessions().is_empty());
        let history = monitor.get_session_history();
        assert!(history.contains_key("A"));
        assert!(history.contains_key("B"));
    }

    #[tokio::test]
    async fn drop_cancels_running_samplers() {
        let probe = ScriptedProbe::new(vec![1.0], vec![1.0]);
        let monitor = PerformanceMonitor::with_probe(&config(5), probe.clone());
        monitor.start_monitoring("A");
        monitor.start_monitoring("B");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(probe.sampled.load(Ordering::SeqCst) >= 2);

        drop(monitor);
        // 진행 중이던 조회가 끝날 시간
        tokio::time::sleep(Duration::from_millis(20)).await;
        let settled = probe.sampled.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(probe.sampled.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn stop_returns_while_read_is_stalled() {
        let monitor = PerformanceMonitor::with_probe(
            &MonitorConfig {
                enabled: true,
                sample_interval_ms: 20,
                stop_timeout_ms: 100,
            },
            Arc::new(StallingProbe {
                block: Duration::from_millis(800),
            }),
        );
        monitor.start_monitoring("A");
        tokio::time::sleep(Duration::from_millis(80)).await;

        let started = std::time::Instant::now();
        let snap = monitor.stop_monitoring("A").await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(snap.cpu_samples, 1);
        assert_eq!(snap.peak_memory, 80.0);
        assert!(monitor.get_session_history().contains_key("A"));
    }

    #[tokio::test]
    async fn restart_waits_until_previous_stop_is_recorded() {
        let monitor = Arc::new(scripted_monitor(60_000));
        assert!(monitor.start_monitoring("A"));

        let first_stop = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.stop_monitoring("A").await }
        });

        let restarted_at = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if monitor.start_monitoring("A") {
                    // 재시작이 허용된 시점에는 이전 세션이 이미 이력에 있다
                    assert!(monitor.get_session_history().contains_key("A"));
                    return monitor.get_session_metrics("A").unwrap().start_time;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let first = first_stop.await.unwrap().unwrap();
        let second = monitor.stop_monitoring("A").await.unwrap();

        assert_eq!(second.start_time, restarted_at);
        assert!(second.start_time >= first.start_time);
        assert_eq!(monitor.get_session_history().get("A"), Some(&second));
    }

    #[tokio::test]
    async fn stop_emits_performance_event() {
        let capture = EventCapture::default();
        let _guard = capture.install();

        let monitor = scripted_monitor(60_000);
        monitor.start_monitoring("crew-7");
        monitor.update_task_metrics("crew-7", Some(2), Some(1), None);
        let snap = monitor.stop_monitoring("crew-7").await.unwrap();

        let events = capture.events_for("performance");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fields["component"], "crew-7");
        assert_eq!(events[0].fields["success_rate"], "0.5");

        let metrics: serde_json::Value =
            serde_json::from_str(&events[0].fields["metrics"]).unwrap();
        assert_eq!(metrics["completed_tasks"], 1);
        assert_eq!(metrics["cpu_samples"], snap.cpu_samples);
    }
}
