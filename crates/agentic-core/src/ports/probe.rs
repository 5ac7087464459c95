//! 프로세스/호스트 조회 포트.
//!
//! 구현: `agentic-monitor` crate (sysinfo)

use crate::error::CoreError;
use crate::models::system::{HostInfo, ResourceSample};

/// 리소스 조회 기능 (세션별 샘플러 생성 + 호스트 정보)
pub trait ResourceProbe: Send + Sync {
    /// 세션 전용 프로세스 샘플러 생성
    ///
    /// CPU 사용률은 직전 샘플과의 차이로 계산되므로
    /// 샘플러는 세션마다 독립된 기준점을 가진다.
    fn open_sampler(&self) -> Result<Box<dyn ProcessSampler>, CoreError>;

    /// 호스트 용량 정보 조회 (호출 시점 기준)
    fn host_info(&self) -> HostInfo;
}

/// 현재 프로세스 샘플러 (샘플링 태스크가 단독 소유)
pub trait ProcessSampler: Send {
    /// CPU/메모리 1회 측정
    ///
    /// 프로세스 핸들이 무효화되었거나 접근이 거부되면 에러를 반환한다.
    /// 호출자는 해당 틱을 건너뛴다.
    fn sample(&mut self) -> Result<ResourceSample, CoreError>;
}
