//! Error types for Packwright

use thiserror::Error;

use crate::platform::Platform;

/// Result type alias for Packwright operations
pub type PackwrightResult<T> = Result<T, PackwrightError>;

/// Main error type for Packwright
#[derive(Error, Debug)]
pub enum PackwrightError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{platform} error: {message}")]
    Platform { platform: Platform, message: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Version not found: {package}@{version}")]
    VersionNotFound { package: String, version: String },

    #[error("Version {version} of {package} has no downloadable files")]
    NoFiles { package: String, version: String },

    #[error("Nothing to install: the install plan is empty")]
    EmptyPlan,

    #[error("Failed to download {file}: {reason}")]
    DownloadFailed { file: String, reason: String },

    #[error("Integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Path escapes the instance directory: {0}")]
    PathTraversal(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Invalid modpack: {0}")]
    InvalidModpack(String),

    #[error("Modpack archive for {0} cannot be downloaded automatically")]
    ModpackUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: operation took too long")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("User input error: {0}")]
    Dialoguer(String),

    #[error("{0}")]
    Other(String),
}

impl From<dialoguer::Error> for PackwrightError {
    fn from(err: dialoguer::Error) -> Self {
        PackwrightError::Dialoguer(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PackwrightError {
    fn from(err: tokio::task::JoinError) -> Self {
        PackwrightError::Other(format!("Background task failed: {}", err))
    }
}

impl PackwrightError {
    /// Create a generic error from a string
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PackwrightError::Other(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PackwrightError::Config(msg.into())
    }

    /// Create a platform error
    pub fn platform<S: Into<String>>(platform: Platform, msg: S) -> Self {
        PackwrightError::Platform {
            platform,
            message: msg.into(),
        }
    }

    /// Create a download failure for a named file
    pub fn download<F: Into<String>, R: ToString>(file: F, reason: R) -> Self {
        PackwrightError::DownloadFailed {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid modpack error
    pub fn modpack<S: Into<String>>(msg: S) -> Self {
        PackwrightError::InvalidModpack(msg.into())
    }

    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            PackwrightError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PackwrightError::Network(_) | PackwrightError::Timeout => true,
            _ => false,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PackwrightError::PackageNotFound(_) => 2,
            PackwrightError::VersionNotFound { .. } => 2,
            PackwrightError::InstanceNotFound(_) => 2,
            PackwrightError::IntegrityCheckFailed { .. } => 3,
            PackwrightError::DownloadFailed { .. } => 4,
            PackwrightError::EmptyPlan | PackwrightError::NoFiles { .. } => 5,
            PackwrightError::Cancelled => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_message() {
        let err = PackwrightError::download("sodium.jar", "HTTP 503");
        assert_eq!(err.to_string(), "Failed to download sodium.jar: HTTP 503");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_platform_error_message() {
        let err = PackwrightError::platform(Platform::CurseForge, "HTTP 403");
        assert_eq!(err.to_string(), "curseforge error: HTTP 403");
    }

    #[test]
    fn test_transient_classification() {
        assert!(PackwrightError::Timeout.is_transient());
        assert!(PackwrightError::Network("reset".into()).is_transient());
        assert!(!PackwrightError::EmptyPlan.is_transient());
    }
}
