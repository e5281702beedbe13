use dotpack_proto::ErrorInfo;
use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, one per [`AppError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    ApiError,
    RateLimit,
    AuthRequired,
    ParseError,
    Cancelled,
    Timeout,
    NotFound,
    Validation,
    CliError,
    ProjectNotFound,
    DotnetNotFound,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::ApiError => "API_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::ParseError => "PARSE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::CliError => "CLI_ERROR",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::DotnetNotFound => "DOTNET_NOT_FOUND",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure a host operation can report.
///
/// The variant decides which optional fields are meaningful; nothing else
/// carries a status code, a retry delay or a stderr capture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("network error: {message}")]
    Network {
        message: String,
        cause: Option<String>,
    },

    #[error("feed returned an error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("rate limited by feed: {message}")]
    RateLimit {
        message: String,
        /// Seconds the feed asked us to wait.
        retry_after: Option<u64>,
    },

    #[error("authentication required: {message}")]
    AuthRequired {
        message: String,
        hint: Option<String>,
    },

    #[error("failed to parse response: {message}")]
    Parse {
        message: String,
        raw: Option<String>,
    },

    #[error("{message}")]
    Cancelled { message: String },

    #[error("{message}")]
    Timeout {
        message: String,
        timeout_ms: Option<u64>,
    },

    #[error("not found: {message}")]
    NotFound {
        message: String,
        resource: Option<String>,
    },

    #[error("invalid request: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("dotnet CLI failed: {message}")]
    Cli {
        message: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("project not found: {message}")]
    ProjectNotFound {
        message: String,
        project_path: Option<String>,
    },

    #[error("{message}")]
    DotnetNotFound { message: String },

    #[error("{message}")]
    Unknown {
        message: String,
        cause: Option<String>,
    },
}

impl AppError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Api { .. } => ErrorKind::ApiError,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::AuthRequired { .. } => ErrorKind::AuthRequired,
            Self::Parse { .. } => ErrorKind::ParseError,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Cli { .. } => ErrorKind::CliError,
            Self::ProjectNotFound { .. } => ErrorKind::ProjectNotFound,
            Self::DotnetNotFound { .. } => ErrorKind::DotnetNotFound,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            cause: None,
        }
    }

    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn rate_limit(retry_after: Option<u64>) -> Self {
        let message = match retry_after {
            Some(secs) => format!("retry after {secs}s"),
            None => "too many requests".to_string(),
        };
        Self::RateLimit {
            message,
            retry_after,
        }
    }

    pub fn auth_required(hint: impl Into<String>) -> Self {
        let hint = hint.into();
        Self::AuthRequired {
            message: "the package source rejected the request".to_string(),
            hint: Some(hint),
        }
    }

    pub fn parse(message: impl Into<String>, raw: Option<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw,
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::Cancelled {
            message: "operation cancelled".to_string(),
        }
    }

    #[must_use]
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout {
            message: format!("operation timed out after {timeout_ms}ms"),
            timeout_ms: Some(timeout_ms),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::NotFound {
            message: resource.clone(),
            resource: Some(resource),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn cli(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        let message = match exit_code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        };
        Self::Cli {
            message,
            exit_code,
            stderr: Some(stderr),
        }
    }

    pub fn project_not_found(project_path: impl Into<String>) -> Self {
        let project_path = project_path.into();
        Self::ProjectNotFound {
            message: project_path.clone(),
            project_path: Some(project_path),
        }
    }

    #[must_use]
    pub fn dotnet_not_found() -> Self {
        Self::DotnetNotFound {
            message: "the dotnet CLI was not found on PATH".to_string(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            cause: None,
        }
    }

    /// Attach an underlying cause to variants that carry one.
    pub fn with_cause(self, cause: impl std::fmt::Display) -> Self {
        match self {
            Self::Network { message, .. } => Self::Network {
                message,
                cause: Some(cause.to_string()),
            },
            Self::Unknown { message, .. } => Self::Unknown {
                message,
                cause: Some(cause.to_string()),
            },
            other => other,
        }
    }

    /// Wire form of this error.
    #[must_use]
    pub fn to_info(&self) -> ErrorInfo {
        let mut info = ErrorInfo {
            kind: self.kind().as_str().to_string(),
            message: self.to_string(),
            ..ErrorInfo::default()
        };

        match self {
            Self::Network { cause, .. } | Self::Unknown { cause, .. } => {
                info.cause.clone_from(cause);
            }
            Self::Api { status_code, .. } => info.status_code = *status_code,
            Self::RateLimit { retry_after, .. } => info.retry_after = *retry_after,
            Self::AuthRequired { hint, .. } => info.hint.clone_from(hint),
            Self::Parse { raw, .. } => info.raw.clone_from(raw),
            Self::Timeout { timeout_ms, .. } => info.timeout_ms = *timeout_ms,
            Self::NotFound { resource, .. } => info.resource.clone_from(resource),
            Self::Validation { field, .. } => info.field.clone_from(field),
            Self::Cli {
                exit_code, stderr, ..
            } => {
                info.exit_code = *exit_code;
                info.stderr.clone_from(stderr);
            }
            Self::ProjectNotFound { project_path, .. } => {
                info.project_path.clone_from(project_path);
            }
            Self::Cancelled { .. } | Self::DotnetNotFound { .. } => {}
        }

        info
    }
}

impl From<&AppError> for ErrorInfo {
    fn from(err: &AppError) -> Self {
        err.to_info()
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}
