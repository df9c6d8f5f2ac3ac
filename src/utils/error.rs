use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// 請求同時缺少 query 與 image 時回傳給呼叫端的訊息
pub const MISSING_INPUT_MESSAGE: &str = "Either query or image must be provided";

/// 非預期錯誤時對外的通用訊息
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to identify product";

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Upstream model failure: {message}")]
    UpstreamFailure { message: String },

    #[error("Upstream model rate limited: {message}")]
    RateLimited { message: String },

    #[error("Schema violation at {field}: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("Unexpected failure: {message}")]
    UnexpectedFailure { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation error for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Upstream,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FinderError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            message: message.into(),
        }
    }

    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FinderError::InvalidRequest { .. } => ErrorCategory::Request,
            FinderError::ApiError(_)
            | FinderError::UpstreamFailure { .. }
            | FinderError::RateLimited { .. }
            | FinderError::SchemaViolation { .. } => ErrorCategory::Upstream,
            FinderError::ConfigError { .. }
            | FinderError::ConfigValidationError { .. }
            | FinderError::InvalidConfigValueError { .. }
            | FinderError::MissingConfigError { .. } => ErrorCategory::Configuration,
            FinderError::IoError(_)
            | FinderError::SerializationError(_)
            | FinderError::UnexpectedFailure { .. } => ErrorCategory::System,
        }
    }

    /// 錯誤種類的名稱，用於標記備援結果
    pub fn kind(&self) -> &'static str {
        match self {
            FinderError::ApiError(_) => "ApiError",
            FinderError::IoError(_) => "IoError",
            FinderError::SerializationError(_) => "SerializationError",
            FinderError::InvalidRequest { .. } => "InvalidRequest",
            FinderError::UpstreamFailure { .. } => "UpstreamFailure",
            FinderError::RateLimited { .. } => "RateLimited",
            FinderError::SchemaViolation { .. } => "SchemaViolation",
            FinderError::UnexpectedFailure { .. } => "UnexpectedFailure",
            FinderError::ConfigError { .. } => "ConfigError",
            FinderError::ConfigValidationError { .. } => "ConfigValidationError",
            FinderError::InvalidConfigValueError { .. } => "InvalidConfigValueError",
            FinderError::MissingConfigError { .. } => "MissingConfigError",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Request => "Provide a product description, an image, or both",
            ErrorCategory::Upstream => {
                "Check the model endpoint and API key; results fall back to sample data meanwhile"
            }
            ErrorCategory::Configuration => "Review the command-line flags or the TOML config file",
            ErrorCategory::System => "Retry the request; inspect the logs if the problem persists",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            FinderError::InvalidRequest { message } => message.clone(),
            FinderError::ConfigValidationError { field, message } => {
                format!("設定錯誤 {}: {}", field, message)
            }
            FinderError::InvalidConfigValueError { field, reason, .. } => {
                format!("設定值無效 {}: {}", field, reason)
            }
            FinderError::MissingConfigError { field } => format!("缺少必要設定: {}", field),
            FinderError::ConfigError { message } => format!("設定錯誤: {}", message),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// 命令列程式的退出碼，依嚴重程度決定
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 4,      // 輸入錯誤
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 設定或處理錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        }
    }

    /// HTTP 對應：只有請求驗證錯誤是 400，其餘一律 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            FinderError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FinderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            FinderError::InvalidRequest { message } => message.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("❌ Error identifying product: {}", self);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, FinderError>;
