//! 프로세스/호스트 리소스 조회.
//!
//! `ResourceProbe` 포트 구현. sysinfo 기반 현재 프로세스 CPU/메모리 수집.

use agentic_core::error::CoreError;
use agentic_core::models::system::{HostInfo, ResourceSample, BYTES_PER_MB};
use agentic_core::ports::probe::{ProcessSampler, ResourceProbe};
use chrono::Utc;
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System,
};
use tracing::debug;

/// sysinfo 기반 리소스 조회기: `ResourceProbe` 포트 구현
pub struct SysInfoProbe {
    pid: Pid,
}

impl SysInfoProbe {
    /// 현재 프로세스 대상 조회기 생성
    pub fn new() -> Self {
        Self::for_pid(std::process::id())
    }

    /// 지정한 PID 대상 조회기 생성
    pub fn for_pid(pid: u32) -> Self {
        Self {
            pid: Pid::from_u32(pid),
        }
    }
}

impl Default for SysInfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysInfoProbe {
    fn open_sampler(&self) -> Result<Box<dyn ProcessSampler>, CoreError> {
        let mut sampler = SysInfoSampler {
            sys: System::new(),
            pid: self.pid,
        };
        // CPU 사용률 기준점 확보 (첫 refresh는 항상 0%)
        sampler.refresh();
        Ok(Box::new(sampler))
    }

    fn host_info(&self) -> HostInfo {
        let sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );

        let cpu_count = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };

        HostInfo {
            cpu_count,
            memory_total_bytes: sys.total_memory(),
        }
    }
}

/// 세션 전용 sysinfo 샘플러
struct SysInfoSampler {
    sys: System,
    pid: Pid,
}

impl SysInfoSampler {
    /// 대상 프로세스만 갱신, 갱신된 프로세스 수 반환
    fn refresh(&mut self) -> usize {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        )
    }
}

impl ProcessSampler for SysInfoSampler {
    fn sample(&mut self) -> Result<ResourceSample, CoreError> {
        let updated = self.refresh();
        let process = self
            .sys
            .process(self.pid)
            .filter(|_| updated > 0)
            .ok_or_else(|| CoreError::NotFound {
                resource_type: "Process".to_string(),
                id: self.pid.to_string(),
            })?;

        let sample = ResourceSample {
            timestamp: Utc::now(),
            cpu_percent: f64::from(process.cpu_usage()),
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
        };

        debug!(
            "프로세스 샘플: pid={}, CPU {:.1}%, 메모리 {:.1}MB",
            self.pid, sample.cpu_percent, sample.memory_mb
        );
        Ok(sample)
    }
}
