use crate::core::dhcp::ParseError;
use crate::core::label::InvalidLabelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DcimError {
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("DHCP config parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Invalid label: {0}")]
    LabelError(#[from] InvalidLabelError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Authentication with the OpenDCIM server failed")]
    Authentication,

    #[error("{what} was not found")]
    NotFound { what: String },

    #[error("OpenDCIM returned HTTP {status} for {path}")]
    HttpStatus { status: u16, path: String },

    #[error("OpenDCIM API error: {message}")]
    Api { message: String },
}

impl DcimError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn unexpected_response(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::Api {
            message: format!("unexpected response for {}: {}", path, reason),
        }
    }

    /// 給終端使用者看的訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Authentication => AUTH_ERROR_MSG.to_string(),
            Self::MissingConfigError { .. } => format!(
                "{}. Create ~/.dcim.toml or /etc/dcim.toml, or pass --config.",
                self
            ),
            Self::RequestError(e) if e.is_connect() || e.is_timeout() => {
                format!("Could not reach the OpenDCIM server: {}", e)
            }
            _ => self.to_string(),
        }
    }

    /// 依錯誤類型決定 CLI 的結束碼
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } | Self::Authentication => 1,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => 2,
            Self::ParseError(_) | Self::LabelError(_) => 3,
            _ => 4,
        }
    }
}

pub const AUTH_ERROR_MSG: &str = "\
OpenDCIM server authentication failed. Check your ~/.dcim.toml file or
the system /etc/dcim.toml file to ensure that a valid OpenDCIM host
url and credentials have been set.";

pub type Result<T> = std::result::Result<T, DcimError>;
