//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 설정을 저장/로드한다.
//! 엔드포인트와 관리자 시크릿은 환경 변수로 덮어쓸 수 있다.

use crate::config::TelemetryConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 앱 디렉토리 이름
const APP_DIR_NAME: &str = "chibi-telemetry";

/// 엔드포인트 덮어쓰기 환경 변수
pub const ENV_ENDPOINT: &str = "CHIBI_TELEMETRY_ENDPOINT";

/// 관리자 시크릿 덮어쓰기 환경 변수
pub const ENV_ADMIN_SECRET: &str = "CHIBI_TELEMETRY_ADMIN_SECRET";

/// 설정 관리자
///
/// 시작 시 한 번 로드하고, 이후 값은 복제본으로 전달한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TelemetryConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// 기본 경로에서 설정 로드
    ///
    /// 설정 파일이 없으면 기본 설정을 생성하고 저장한다.
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE_NAME);
        Self::with_path(config_path)
    }

    /// 지정된 경로로 설정 관리자 생성
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                info!("설정 디렉토리 생성: {}", parent.display());
            }
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = TelemetryConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            info!("기본 설정 파일 생성: {}", config_path.display());
            default_config
        };

        Ok(Self {
            config,
            config_path,
        })
    }

    /// 환경 변수 덮어쓰기 적용
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_ENDPOINT).ok(),
            std::env::var(ENV_ADMIN_SECRET).ok(),
        )
    }

    /// 엔드포인트/시크릿 덮어쓰기 (빈 값은 무시)
    pub fn with_overrides(mut self, endpoint: Option<String>, admin_secret: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|v| !v.trim().is_empty()) {
            debug!("엔드포인트 덮어쓰기: {endpoint}");
            self.config.endpoint = endpoint;
        }
        if let Some(secret) = admin_secret.filter(|v| !v.is_empty()) {
            debug!("관리자 시크릿 덮어쓰기");
            self.config.admin_secret = secret;
        }
        self
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> TelemetryConfig {
        self.config.clone()
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 플랫폼별 설정 디렉토리 경로
    ///
    /// - Linux: `~/.config/chibi-telemetry/`
    /// - macOS: `~/Library/Application Support/art.chibi.chibi-telemetry/`
    /// - Windows: `%APPDATA%\chibi\chibi-telemetry\config\`
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        ProjectDirs::from("art", "chibi", APP_DIR_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))
    }

    /// 파일에서 설정 로드
    fn load_from_file(path: &Path) -> Result<TelemetryConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
        })?;

        let config: TelemetryConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
        })?;

        debug!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    /// 파일에 설정 저장
    fn save_to_file(path: &Path, config: &TelemetryConfig) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::Config(format!("설정 직렬화 실패: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("설정 파일 저장 실패: {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}
