//! # agentic-core
//!
//! agentic-perf 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모니터 어댑터와 CLI가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 성능 메트릭 데이터 구조체 (serde Serialize/Deserialize)
//! - [`ports`]: 프로세스/호스트 조회 포트 인터페이스
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 애플리케이션 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
