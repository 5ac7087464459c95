//! 세션별 샘플링 태스크.
//!
//! 세션마다 독립된 tokio 태스크가 주기적으로 프로세스 샘플을 수집한다.
//! 샘플 버퍼의 유일한 쓰기 주체는 해당 태스크이며, 호출자는
//! `watch` 수신기를 통해 읽기 전용 복사본만 얻는다.
//!
//! 프로세스 조회는 블로킹 I/O이므로 매 틱마다 `spawn_blocking`으로 실행한다.
//! 조회가 끝나지 않아도 정지 신호가 오면 루프는 즉시 빠져나가며,
//! 그 조회 결과는 버려진다.

use agentic_core::models::system::ResourceSample;
use agentic_core::ports::probe::ProcessSampler;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// 세션 샘플 버퍼
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    /// CPU 사용률 샘플 (%)
    pub cpu_usage: Vec<f64>,
    /// 상주 메모리 샘플 (MB)
    pub memory_usage: Vec<f64>,
    /// 타임스탬프 포함 원본 샘플
    pub samples: Vec<ResourceSample>,
}

impl SampleBuffer {
    fn push(&mut self, sample: ResourceSample) {
        self.cpu_usage.push(sample.cpu_percent);
        self.memory_usage.push(sample.memory_mb);
        self.samples.push(sample);
    }
}

/// 실행 중인 샘플링 태스크 핸들
pub struct SamplerHandle {
    session_id: String,
    stop_tx: watch::Sender<bool>,
    buffer_rx: watch::Receiver<SampleBuffer>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// 현재 버퍼를 잠시 빌려 읽기
    pub fn read<R>(&self, f: impl FnOnce(&SampleBuffer) -> R) -> R {
        f(&self.buffer_rx.borrow())
    }

    /// 정지 신호 발송 후 태스크 종료 대기 (최대 `timeout`)
    ///
    /// 제한 시간 내 종료되지 않으면 태스크를 중단하고 그대로 진행한다.
    /// 반환되는 버퍼는 이 시점의 복사본이며 이후 변경되지 않는다.
    pub async fn stop(self, timeout: Duration) -> SampleBuffer {
        let _ = self.stop_tx.send(true);

        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => debug!("샘플러 종료: {}", self.session_id),
            Ok(Err(e)) => warn!("샘플러 비정상 종료 ({}): {e}", self.session_id),
            Err(_) => {
                warn!(
                    "샘플러가 {}ms 내에 종료되지 않아 중단: {}",
                    timeout.as_millis(),
                    self.session_id
                );
                task.abort();
            }
        }

        let buffer = self.buffer_rx.borrow().clone();
        buffer
    }

    /// 대기 없이 즉시 중단 (모니터 해제 시)
    pub fn cancel(self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

/// 샘플링 태스크 시작
///
/// 첫 샘플은 즉시 수집하고 이후 `interval`마다 수집한다.
/// 현재 tokio 런타임 컨텍스트 안에서 호출해야 한다.
pub fn spawn_sampler(
    session_id: &str,
    mut sampler: Box<dyn ProcessSampler>,
    interval: Duration,
) -> SamplerHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let (buffer_tx, buffer_rx) = watch::channel(SampleBuffer::default());
    let session = session_id.to_string();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                // 정지 신호 또는 송신측 해제
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
            }

            let read = tokio::task::spawn_blocking(move || {
                let result = sampler.sample();
                (sampler, result)
            });

            let (returned, result) = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                joined = read => match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("샘플링 스레드 비정상 종료 ({session}): {e}");
                        break;
                    }
                },
            };
            sampler = returned;

            match result {
                Ok(sample) => buffer_tx.send_modify(|buf| buf.push(sample)),
                Err(e) => warn!("성능 샘플링 실패 ({session}): {e}"),
            }
        }

        debug!("샘플링 루프 종료: {session}");
    });

    SamplerHandle {
        session_id: session_id.to_string(),
        stop_tx,
        buffer_rx,
        task,
    }
}
