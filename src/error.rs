//! Error types for the prerendering pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while prerendering
///
/// `Setup` and `Config` errors are fatal for the run. An `Engine` error is
/// locale-scoped on its own; when the engine fails to launch, the pipeline
/// wraps it in `Setup`, which is what makes that case fatal. Everything else
/// is recorded in the run summary instead of being propagated.
#[derive(Error, Debug)]
pub enum Error {
    /// Staging, locale enumeration or server bind failed
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The rendering engine could not be launched or stopped responding
    #[error("Engine error: {0}")]
    Engine(String),

    /// The application did not populate its root node in time
    #[error("Application not ready after {timeout_ms}ms (selector `{selector}`)")]
    ReadinessTimeout { selector: String, timeout_ms: u64 },

    /// Navigation to the locale URL failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Markup capture or post-capture verification failed
    #[error("Rendering failed: {0}")]
    Render(String),

    /// The HTML rewriter rejected the captured markup
    #[error("Sanitization failed: {0}")]
    Sanitize(String),

    /// Persisting an artifact failed
    #[error("Write failed for {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Capturing the verification screenshot failed
    #[error("Screenshot failed: {0}")]
    Screenshot(String),
}

impl Error {
    /// Whether this error aborts the whole run rather than a single locale.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Setup(_) | Error::Config(_))
    }

    /// Short stable name used in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Setup(_) => "FatalSetupError",
            Error::Config(_) => "ConfigError",
            Error::Engine(_) => "EngineError",
            Error::ReadinessTimeout { .. } => "ReadinessTimeout",
            Error::Navigation(_) => "NavigationError",
            Error::Render(_) => "RenderError",
            Error::Sanitize(_) => "SanitizeError",
            Error::Write { .. } => "WriteError",
            Error::Screenshot(_) => "ScreenshotError",
        }
    }

    pub(crate) fn write(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Error::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Engine(err.to_string())
    }
}
