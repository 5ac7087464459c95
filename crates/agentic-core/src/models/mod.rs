//! agentic-perf 도메인 모델.
//!
//! 모니터와 호출자 간에 주고받는 데이터 구조체를 정의한다.
//! 호출자에게 노출되는 모델은 모두 `serde` Serialize/Deserialize를 구현한다.

pub mod performance;
pub mod system;
