//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! `agentic-monitor`가 sysinfo 기반 어댑터를 구현하며,
//! 테스트는 스크립트형 구현을 `Arc<dyn T>`로 주입한다.

pub mod probe;
