//! 애플리케이션 설정 구조체.
//!
//! 샘플링 주기, 종료 대기 시간, 로그 레벨, 기본 내보내기 형식 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 성능 모니터링 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 내보내기 설정
    #[serde(default)]
    pub export: ExportConfig,
}

// ============================================================
// 모니터링 설정
// ============================================================

/// 성능 모니터링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 모니터링 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 샘플링 주기 (밀리초)
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// 세션 종료 시 샘플러 대기 한도 (밀리초)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl MonitorConfig {
    /// 샘플링 주기
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// 종료 대기 한도
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_ms: default_sample_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

fn default_sample_interval_ms() -> u64 {
    1_000
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

// ============================================================
// 로깅 설정
// ============================================================

/// 로깅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================
// 내보내기 설정
// ============================================================

/// 메트릭 내보내기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// 기본 내보내기 형식 (json, csv)
    #[serde(default = "default_export_format")]
    pub default_format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: default_export_format(),
        }
    }
}

fn default_export_format() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
            export: ExportConfig::default(),
        }
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.monitor.sample_interval_ms == 0 {
            return Err(CoreError::Validation {
                field: "monitor.sample_interval_ms".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        if self.monitor.stop_timeout_ms == 0 {
            return Err(CoreError::Validation {
                field: "monitor.stop_timeout_ms".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
