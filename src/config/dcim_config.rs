use crate::utils::error::{DcimError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 指定設定檔路徑的環境變數
pub const CONFIG_ENV_VAR: &str = "DCIM_CONFIG";

const USER_CONFIG_FILE: &str = ".dcim.toml";
const SYSTEM_CONFIG_FILES: [&str; 2] = ["/etc/dcim.toml", "/usr/local/etc/dcim.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcimConfig {
    pub dcim: ServerConfig,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub baseurl: String,
    pub username: String,
    pub password: String,
    pub ssl_verify: Option<bool>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
    pub ttl_seconds: Option<u64>,
}

impl DcimConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DcimError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DCIM_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DcimError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("dcim.baseurl", &self.dcim.baseurl)?;
        validation::validate_non_empty_string("dcim.username", &self.dcim.username)?;

        if let Some(timeout) = self.dcim.timeout_seconds {
            validation::validate_range("dcim.timeout_seconds", timeout, 1, 3600)?;
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn baseurl(&self) -> &str {
        self.dcim.baseurl.trim_end_matches('/')
    }

    pub fn ssl_verify(&self) -> bool {
        self.dcim.ssl_verify.unwrap_or(true)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.dcim.timeout_seconds.unwrap_or(30))
    }

    /// 未設定 [cache] 時預設啟用、不過期
    pub fn cache_enabled(&self) -> bool {
        self.cache
            .as_ref()
            .and_then(|c| c.enabled)
            .unwrap_or(true)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache
            .as_ref()
            .and_then(|c| c.ttl_seconds)
            .map(Duration::from_secs)
    }
}

impl Validate for DcimConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Config files looked at when no path is given, in order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(USER_CONFIG_FILE));
    }
    paths.extend(SYSTEM_CONFIG_FILES.iter().map(PathBuf::from));
    paths
}

fn discover(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<PathBuf> {
    // 明確指定的路徑不存在時直接報錯，不往下找
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(DcimError::ConfigError {
                message: format!("config file {} does not exist", path.display()),
            })
        };
    }

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| DcimError::MissingConfigError {
            field: format!(
                "no config file found (looked at {})",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

/// Resolve the client configuration once at startup.
///
/// Order: `explicit` (the `--config` flag), `$DCIM_CONFIG`, `~/.dcim.toml`,
/// `/etc/dcim.toml`, `/usr/local/etc/dcim.toml`.
pub fn resolve_config(explicit: Option<&Path>) -> Result<DcimConfig> {
    let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let explicit = explicit.or(from_env.as_deref());

    let path = discover(explicit, &default_config_paths())?;
    tracing::debug!("Loading configuration from {}", path.display());

    let config = DcimConfig::from_file(&path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const BASIC: &str = r#"
[dcim]
baseurl = "https://dcim.example.org/"
username = "dcim"
password = "secret"
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = DcimConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.baseurl(), "https://dcim.example.org");
        assert_eq!(config.dcim.username, "dcim");
        assert!(config.ssl_verify());
        assert!(config.cache_enabled());
        assert_eq!(config.cache_ttl(), None);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_optional_sections() {
        let config = DcimConfig::from_toml_str(
            r#"
[dcim]
baseurl = "http://localhost:8080"
username = "dcim"
password = "secret"
ssl_verify = false
timeout_seconds = 5

[cache]
enabled = false
ttl_seconds = 120
"#,
        )
        .unwrap();

        assert!(!config.ssl_verify());
        assert!(!config.cache_enabled());
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(120)));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DCIM_TEST_PASSWORD", "from-env");

        let config = DcimConfig::from_toml_str(
            r#"
[dcim]
baseurl = "https://dcim.example.org"
username = "dcim"
password = "${DCIM_TEST_PASSWORD}"
"#,
        )
        .unwrap();
        assert_eq!(config.dcim.password, "from-env");

        std::env::remove_var("DCIM_TEST_PASSWORD");
    }

    #[test]
    fn test_config_validation() {
        let config = DcimConfig::from_toml_str(
            r#"
[dcim]
baseurl = "dcim.example.org"
username = "dcim"
password = "secret"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_section_is_config_error() {
        let err = DcimConfig::from_toml_str("[other]\nkey = 1\n").unwrap_err();
        assert!(matches!(err, DcimError::ConfigError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = DcimConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.dcim.password, "secret");
    }

    #[test]
    fn test_discover_order() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let system = dir.path().join("system.toml");
        std::fs::write(&system, BASIC).unwrap();

        let candidates = vec![user.clone(), system.clone()];
        assert_eq!(discover(None, &candidates).unwrap(), system);

        std::fs::write(&user, BASIC).unwrap();
        assert_eq!(discover(None, &candidates).unwrap(), user);

        assert_eq!(discover(Some(&system), &candidates).unwrap(), system);
    }

    #[test]
    fn test_discover_failures() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");

        assert!(matches!(
            discover(None, &[missing.clone()]),
            Err(DcimError::MissingConfigError { .. })
        ));
        assert!(matches!(
            discover(Some(&missing), &[]),
            Err(DcimError::ConfigError { .. })
        ));
    }
}
