//! # agentic-monitor
//!
//! 성능 모니터.
//! 세션 단위로 현재 프로세스의 CPU/메모리 사용량을 주기적으로 샘플링하고,
//! 세션 종료 시 통계를 확정하여 이력으로 보관한다.
//! 프로세스/호스트 조회는 sysinfo 기반 어댑터를 통해 구현.

pub mod events;
pub mod export;
pub mod monitor;
pub mod probe;
pub mod sampler;

#[cfg(test)]
mod test_support;

pub use monitor::PerformanceMonitor;
